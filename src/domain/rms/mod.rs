pub mod reservation_interface;
pub mod simulated_backend;

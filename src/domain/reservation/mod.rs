pub mod node;
pub mod reservation;
pub mod reservation_request;
pub mod reservation_wait;

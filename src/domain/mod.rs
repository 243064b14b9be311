pub mod reservation;
pub mod rms;
pub mod utils;

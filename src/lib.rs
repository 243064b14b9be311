use crate::api::config_dto::ReserveConfigDto;
use crate::domain::rms::simulated_backend::SimulatedBackend;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

pub use crate::domain::reservation::node::{Node, NodeId};
pub use crate::domain::reservation::reservation::Reservation;
pub use crate::domain::reservation::reservation_request::{
    ReservationRequest, ReservationRequestKind, ReservationRequestTrait, TimeSlotReservationRequest,
};
pub use crate::domain::reservation::reservation_wait::{ReservationStatus, ReservationWait, WaitSettings};
pub use crate::domain::rms::reservation_interface::ReservationInterface;

/// Loads a reservation config file and builds the simulated backend it
/// describes. The request and wait settings are returned alongside.
pub fn load_simulated_setup(file_path: &str) -> Result<(SimulatedBackend, ReservationRequestKind, WaitSettings)> {
    let config: ReserveConfigDto = parse_json_file(file_path)?;
    log::info!("Config file '{}' parsed successfully.", file_path);

    let backend = SimulatedBackend::try_from(config.backend)?;
    log::info!("Simulated backend {} constructed with {} node(s).", backend.id(), backend.total_nodes());

    Ok((backend, config.request, config.wait))
}

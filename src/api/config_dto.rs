use serde::{Deserialize, Serialize};

use crate::api::rms_config_dto::rms_dto::SimulatedBackendDto;
use crate::domain::reservation::reservation_request::ReservationRequestKind;
use crate::domain::reservation::reservation_wait::WaitSettings;

/// Root of the JSON file driving the `metareserve` binary.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveConfigDto {
    pub backend: SimulatedBackendDto,
    pub request: ReservationRequestKind,
    #[serde(default)]
    pub wait: WaitSettings,
}

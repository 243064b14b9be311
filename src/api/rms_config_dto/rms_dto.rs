use serde::{Deserialize, Serialize};

use crate::domain::reservation::node::Node;

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedBackendDto {
    pub id: String,
    /// Time every allocation takes before nodes are handed out.
    #[serde(default)]
    pub allocation_delay_ms: u64,
    /// Upper bound of a random delay added on top of `allocation_delay_ms`.
    #[serde(default)]
    pub allocation_jitter_ms: u64,
    pub nodes: Vec<PoolNodeDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolNodeDto {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub location: String,
}

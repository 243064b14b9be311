use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The fields shared by every kind of reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequestBase {
    /// Number of nodes to reserve.
    pub num_nodes: usize,

    /// Location for the reserved nodes. Empty means "anywhere".
    #[serde(default)]
    pub location: String,

    /// Free-form backend specific settings.
    #[serde(default)]
    pub extra_info: BTreeMap<String, String>,
}

impl ReservationRequestBase {
    fn validate(&self) -> Result<()> {
        if self.num_nodes == 0 {
            return Err(Error::InvalidArgument("A reservation request must ask for at least one node.".to_string()));
        }
        Ok(())
    }
}

pub trait ReservationRequestTrait: std::fmt::Debug + Send + Sync {
    fn get_base(&self) -> &ReservationRequestBase;

    /// Checks the request for caller misuse before any backend work begins.
    fn validate(&self) -> Result<()>;

    fn num_nodes(&self) -> usize {
        self.get_base().num_nodes
    }

    fn location(&self) -> &str {
        &self.get_base().location
    }

    fn extra_info(&self) -> &BTreeMap<String, String> {
        &self.get_base().extra_info
    }
}

/// Regular reservation request: nodes for a number of minutes, starting as
/// soon as the backend can grant them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    #[serde(flatten)]
    pub base: ReservationRequestBase,

    pub duration_minutes: u64,
}

impl ReservationRequest {
    pub fn new(num_nodes: usize, duration_minutes: u64) -> Self {
        ReservationRequest { base: ReservationRequestBase { num_nodes, location: String::new(), extra_info: BTreeMap::new() }, duration_minutes }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.base.location = location.into();
        self
    }

    pub fn with_extra_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.extra_info.insert(key.into(), value.into());
        self
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_minutes
    }
}

impl ReservationRequestTrait for ReservationRequest {
    fn get_base(&self) -> &ReservationRequestBase {
        &self.base
    }

    fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.duration_minutes == 0 {
            return Err(Error::InvalidArgument("A reservation request must last at least one minute.".to_string()));
        }
        Ok(())
    }
}

/// Time slot reservation request: nodes from `duration_start` until
/// `duration_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotReservationRequest {
    #[serde(flatten)]
    pub base: ReservationRequestBase,

    pub duration_start: DateTime<Utc>,
    pub duration_end: DateTime<Utc>,
}

impl TimeSlotReservationRequest {
    pub fn new(num_nodes: usize, duration_start: DateTime<Utc>, duration_end: DateTime<Utc>) -> Self {
        TimeSlotReservationRequest {
            base: ReservationRequestBase { num_nodes, location: String::new(), extra_info: BTreeMap::new() },
            duration_start,
            duration_end,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.base.location = location.into();
        self
    }

    pub fn with_extra_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.extra_info.insert(key.into(), value.into());
        self
    }

    pub fn duration_start(&self) -> DateTime<Utc> {
        self.duration_start
    }

    pub fn duration_end(&self) -> DateTime<Utc> {
        self.duration_end
    }
}

impl ReservationRequestTrait for TimeSlotReservationRequest {
    fn get_base(&self) -> &ReservationRequestBase {
        &self.base
    }

    fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.duration_end <= self.duration_start {
            return Err(Error::InvalidArgument(format!(
                "Time slot end {} must lie after its start {}.",
                self.duration_end, self.duration_start
            )));
        }
        Ok(())
    }
}

/// Any request a backend's `reserve` accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReservationRequestKind {
    TimeSlot(TimeSlotReservationRequest),
    Duration(ReservationRequest),
}

impl ReservationRequestKind {
    pub fn as_request(&self) -> &dyn ReservationRequestTrait {
        match self {
            ReservationRequestKind::Duration(request) => request,
            ReservationRequestKind::TimeSlot(request) => request,
        }
    }
}

impl From<ReservationRequest> for ReservationRequestKind {
    fn from(request: ReservationRequest) -> Self {
        ReservationRequestKind::Duration(request)
    }
}

impl From<TimeSlotReservationRequest> for ReservationRequestKind {
    fn from(request: TimeSlotReservationRequest) -> Self {
        ReservationRequestKind::TimeSlot(request)
    }
}

//! Client → Server requests

use serde::{Deserialize, Serialize};

use crate::types::ZoneId;

/// HTTP endpoints exposed by the controller, relative to the API base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Status,
    Zones,
    Start,
    Stop,
    LastSprinklerRun,
    LastScheduleRun,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::Zones => "sprinklers/",
            Endpoint::Start => "sprinklers/start",
            Endpoint::Stop => "sprinklers/stop",
            Endpoint::LastSprinklerRun => "system/last-sprinkler-run",
            Endpoint::LastScheduleRun => "system/last-schedule-run",
        }
    }
}

/// Body of `POST sprinklers/start`. The duration is in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub zone: ZoneId,
    pub duration: u64,
}

impl StartRequest {
    /// Operators enter minutes; the controller expects seconds.
    pub fn from_minutes(zone: ZoneId, minutes: u32) -> Self {
        Self {
            zone,
            duration: u64::from(minutes) * 60,
        }
    }
}

//! Core types shared across the protocol

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Wall-clock time in milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Irrigation zone identifier (a small positive integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ZoneId(u32);

impl ZoneId {
    /// Returns `None` for `0`, which the controller uses to mean "no zone".
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ZoneId> for u32 {
    fn from(id: ZoneId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidZoneId;

impl fmt::Display for InvalidZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("zone id must be a positive integer")
    }
}

impl std::error::Error for InvalidZoneId {}

impl TryFrom<u32> for ZoneId {
    type Error = InvalidZoneId;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        ZoneId::new(raw).ok_or(InvalidZoneId)
    }
}

/// A zone as listed by `GET sprinklers/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "zone")]
    pub id: ZoneId,
    pub name: String,
}

/// Remote system state reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    Active,
    Inactive,
    Error,
}

/// Zone fields on the wire use `null` or `0` when nothing is running.
pub(crate) fn lenient_zone<'de, D>(deserializer: D) -> Result<Option<ZoneId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<u32>::deserialize(deserializer)?;
    Ok(raw.and_then(ZoneId::new))
}

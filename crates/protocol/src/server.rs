//! Server → Client responses

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{lenient_zone, SystemState, ZoneId};

/// `systemStatus` as sent by the controller.
///
/// Older backends send a bare string; newer ones send `{status, message}`.
/// The nested form is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusField {
    Nested(StatusDetail),
    Flat(SystemState),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetail {
    pub status: SystemState,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusField {
    pub fn state(&self) -> SystemState {
        match self {
            StatusField::Nested(detail) => detail.status,
            StatusField::Flat(state) => *state,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            StatusField::Nested(detail) => detail.message.as_deref(),
            StatusField::Flat(_) => None,
        }
    }
}

/// Body of `GET status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "systemStatus")]
    pub system_status: StatusField,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "active_zone", deserialize_with = "lenient_zone")]
    pub zone: Option<ZoneId>,
    /// Seconds remaining on the current run
    #[serde(default, deserialize_with = "lenient_secs")]
    pub duration: Option<u64>,
}

/// Normalized status snapshot, independent of which wire shape was received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub state: SystemState,
    pub message: Option<String>,
    pub zone: Option<ZoneId>,
    pub duration_secs: Option<u64>,
}

impl From<StatusResponse> for RemoteStatus {
    fn from(resp: StatusResponse) -> Self {
        let message = resp
            .system_status
            .message()
            .map(str::to_string)
            .or(resp.message);
        RemoteStatus {
            state: resp.system_status.state(),
            message,
            zone: resp.zone,
            duration_secs: resp.duration,
        }
    }
}

/// Body of a successful `POST sprinklers/start`.
///
/// Some backends only send `message`; `zone`/`duration` are then taken from
/// the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    #[serde(rename = "systemStatus", default)]
    pub system_status: Option<StatusField>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "active_zone", deserialize_with = "lenient_zone")]
    pub zone: Option<ZoneId>,
    #[serde(default, deserialize_with = "lenient_secs")]
    pub duration: Option<u64>,
}

/// Body of a successful `POST sprinklers/stop`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopResponse {
    #[serde(rename = "systemStatus", default)]
    pub system_status: Option<StatusField>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body sent with non-2xx responses: `{"detail": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: Detail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    List(Vec<DetailItem>),
    Single(String),
}

/// Either a plain message or a framework validation record carrying `msg`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailItem {
    Text(String),
    Structured { msg: String },
}

impl DetailItem {
    fn text(&self) -> &str {
        match self {
            DetailItem::Text(text) => text,
            DetailItem::Structured { msg } => msg,
        }
    }
}

impl ErrorBody {
    /// First detail message, if it is non-empty.
    pub fn first_message(&self) -> Option<&str> {
        let first = match &self.detail {
            Detail::List(items) => items.first().map(DetailItem::text),
            Detail::Single(text) => Some(text.as_str()),
        }?;
        let trimmed = first.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Body of `GET system/last-sprinkler-run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSprinklerRun {
    pub zone: ZoneId,
    /// Unix epoch seconds (fractional)
    pub timestamp: f64,
}

/// Body of `GET system/last-schedule-run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastScheduleRun {
    pub name: String,
    pub timestamp: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Durations occasionally arrive as floats; negative values mean "none".
fn lenient_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.floor() as u64))
}

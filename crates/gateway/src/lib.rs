//! Sprinklr Gateway
//!
//! Remote operations against the irrigation controller. Every call is bounded
//! by a single timeout and resolves to either a success payload or a
//! [`GatewayError`] from a fixed taxonomy; callers never see transport errors.
//! No retries happen here.

use std::future::Future;
use std::time::Duration;

use sprinklr_protocol::{RemoteStatus, Zone, ZoneId};
use thiserror::Error;

pub mod http;

pub use http::{GatewayConfig, HttpGateway};

/// Default request ceiling
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Failure categories surfaced to the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport rejected the request (DNS, connection refused, reset)
    NetworkFailure,
    /// No response before the deadline
    Timeout,
    /// Non-2xx with a structured `detail` body
    ValidationFailure,
    /// 5xx, or non-2xx without a parseable detail, or a malformed body
    ServerFailure,
    /// The backend could not drive the valve hardware
    HardwareFailure,
}

/// Normalized gateway failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: FailureKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NetworkFailure, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!(
                "Request timed out after {}s, the controller is not responding",
                after.as_secs_f64()
            ),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ValidationFailure, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerFailure, message)
    }

    pub fn hardware(message: impl Into<String>) -> Self {
        Self::new(FailureKind::HardwareFailure, message)
    }
}

/// Acknowledgement of a start call.
///
/// `zone` may differ from the requested zone when the controller was already
/// running something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAck {
    pub zone: ZoneId,
    pub duration_secs: u64,
    pub message: Option<String>,
}

/// Acknowledgement of a stop call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopAck {
    pub message: Option<String>,
}

/// The remote operations the session controller depends on.
pub trait SessionGateway: Send + Sync + 'static {
    fn query_status(&self) -> impl Future<Output = Result<RemoteStatus, GatewayError>> + Send;

    fn list_zones(&self) -> impl Future<Output = Result<Vec<Zone>, GatewayError>> + Send;

    /// `minutes` is the operator's input; the wire payload is seconds.
    fn start(
        &self,
        zone: ZoneId,
        minutes: u32,
    ) -> impl Future<Output = Result<StartAck, GatewayError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<StopAck, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_deadline() {
        let err = GatewayError::timeout(Duration::from_secs(8));
        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(err.to_string().contains("timed out after 8s"));
    }

    #[test]
    fn display_is_the_message() {
        let err = GatewayError::validation("Zone 9 not found");
        assert_eq!(err.to_string(), "Zone 9 not found");
    }
}

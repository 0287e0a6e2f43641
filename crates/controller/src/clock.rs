//! Wall-clock source injected into the controller.

use sprinklr_protocol::EpochMillis;

pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> EpochMillis;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub use manual::ManualClock;

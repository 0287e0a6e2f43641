//! The controller's canonical view of the irrigation run.

use sprinklr_protocol::{EpochMillis, ZoneId};

use crate::countdown::{self, Remaining};

pub const MSG_WAITING: &str = "Waiting for controller...";
pub const MSG_IDLE: &str = "System is idle";
pub const MSG_ACTIVE: &str = "System active";
pub const MSG_STOPPING: &str = "Stopping system...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Active,
    Error,
}

/// Single source of truth for "is a zone running, and until when".
///
/// `zone` and `end_timestamp` are set while Active. An Error keeps the last
/// known values so the operator can still see what was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub status: SessionStatus,
    pub message: String,
    pub zone: Option<ZoneId>,
    pub end_timestamp: Option<EpochMillis>,
}

impl Session {
    pub fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            message: MSG_WAITING.to_string(),
            zone: None,
            end_timestamp: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Remaining run time, only while Active.
    pub fn remaining(&self, now: EpochMillis) -> Option<Remaining> {
        match (self.status, self.end_timestamp) {
            (SessionStatus::Active, Some(end)) => Some(countdown::remaining(now, end)),
            _ => None,
        }
    }

    pub(crate) fn set_idle(&mut self) {
        self.status = SessionStatus::Idle;
        self.message = MSG_IDLE.to_string();
        self.zone = None;
        self.end_timestamp = None;
    }

    pub(crate) fn set_loading(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Loading;
        self.message = message.into();
        self.zone = None;
        self.end_timestamp = None;
    }

    pub(crate) fn set_active(
        &mut self,
        zone: ZoneId,
        end_timestamp: EpochMillis,
        message: impl Into<String>,
    ) {
        self.status = SessionStatus::Active;
        self.message = message.into();
        self.zone = Some(zone);
        self.end_timestamp = Some(end_timestamp);
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>, last_known: LastKnown) {
        self.status = SessionStatus::Error;
        self.message = message.into();
        self.zone = last_known.zone;
        self.end_timestamp = last_known.end_timestamp;
    }

    pub(crate) fn last_known(&self) -> LastKnown {
        LastKnown {
            zone: self.zone,
            end_timestamp: self.end_timestamp,
        }
    }
}

/// Zone and end time captured before an optimistic transition, restored on
/// failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastKnown {
    pub zone: Option<ZoneId>,
    pub end_timestamp: Option<EpochMillis>,
}

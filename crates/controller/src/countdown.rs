//! Countdown clock: remaining run time derived from a fixed end timestamp.
//!
//! [`remaining`] is a pure function of `(now, end)`. [`Ticker`] re-evaluates
//! it on a fixed period and only runs while armed.

use std::fmt;
use std::time::Duration;

use sprinklr_protocol::EpochMillis;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub minutes: u64,
    pub seconds: u64,
}

impl Remaining {
    pub const ZERO: Remaining = Remaining {
        minutes: 0,
        seconds: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// `max(0, end - now)` split into whole minutes and whole seconds.
pub fn remaining(now: EpochMillis, end: EpochMillis) -> Remaining {
    let left = end.saturating_sub(now).max(0) as u64;
    Remaining {
        minutes: left / 60_000,
        seconds: (left / 1_000) % 60,
    }
}

/// Periodic tick source. Arming again replaces the running task, so a new end
/// timestamp restarts the period instead of inheriting the old phase.
pub struct Ticker {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// Start ticking. `on_tick` returns `false` to stop the ticker.
    pub fn arm<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.disarm();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));
    }

    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.disarm();
    }
}

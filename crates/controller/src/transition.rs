//! Pure state transition function
//!
//! All session business logic lives here as a pure, synchronous function:
//! `transition(state, input, now) -> (state, effects)`. No IO, no async, no
//! locking. The controller actor feeds it user commands, gateway
//! completions and countdown ticks through one channel and executes the
//! returned effects.

use sprinklr_gateway::{GatewayError, StartAck, StopAck};
use sprinklr_protocol::{EpochMillis, RemoteStatus, SystemState, Zone, ZoneId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::countdown::{self, Remaining};
use crate::input::{DurationError, RunMinutes};
use crate::session::{LastKnown, Session, SessionStatus, MSG_ACTIVE, MSG_STOPPING, MSG_WAITING};
use crate::zones::ZoneDirectory;

pub const MSG_INVALID_DURATION: &str = "Controller reported an invalid duration";

// ---------------------------------------------------------------------------
// TransitionState
// ---------------------------------------------------------------------------

/// The remote call currently outstanding. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InFlight {
    Query {
        prior: LastKnown,
    },
    Start {
        zone: ZoneId,
        minutes: RunMinutes,
        prior: LastKnown,
    },
    Stop {
        prior: LastKnown,
    },
    /// Stop issued locally when the countdown reached zero
    ExpiryStop {
        prior: LastKnown,
    },
}

#[derive(Debug, Clone)]
pub struct TransitionState {
    pub session: Session,
    pub in_flight: Option<InFlight>,
    pub zones: Option<ZoneDirectory>,
    /// Zone list request outstanding; tracked apart from `in_flight`
    pub zones_loading: bool,
}

impl TransitionState {
    pub fn new() -> Self {
        Self {
            session: Session::loading(),
            in_flight: None,
            zones: None,
            zones_loading: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

impl Default for TransitionState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Input {
    // -- Operator commands (admitted by `check_command` first) --
    Start { zone: ZoneId, minutes: RunMinutes },
    Stop,
    /// Query status again; also the initial load
    Refresh,

    // -- Countdown --
    Tick,

    // -- Gateway completions --
    StatusLoaded(Result<RemoteStatus, GatewayError>),
    ZonesLoaded(Result<Vec<Zone>, GatewayError>),
    StartCompleted(Result<StartAck, GatewayError>),
    StopCompleted(Result<StopAck, GatewayError>),
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    QueryStatus,
    LoadZones,
    CallStart { zone: ZoneId, minutes: u32 },
    CallStop,
    ArmCountdown { end_timestamp: EpochMillis },
    DisarmCountdown,
    Emit(SessionEvent),
}

/// Broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Changed(Session),
    Countdown { zone: ZoneId, remaining: Remaining },
    ZonesLoaded(ZoneDirectory),
}

// ---------------------------------------------------------------------------
// Command admission
// ---------------------------------------------------------------------------

/// Why an operator command was refused without touching the Session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejected {
    #[error("{0}")]
    InvalidDuration(#[from] DurationError),

    #[error("Select a zone first")]
    NoZoneSelected,

    #[error("Another command is still in progress")]
    Busy,

    #[error("Zone {0} is already running, stop it first")]
    AlreadyRunning(ZoneId),

    #[error("Still waiting for the controller")]
    Loading,

    #[error("Nothing is running")]
    NotRunning,

    #[error("Controller has shut down")]
    Closed,
}

/// Guard for operator commands. Only one Start/Stop may be outstanding and
/// a second command is refused rather than queued.
pub fn check_command(state: &TransitionState, input: &Input) -> Result<(), CommandRejected> {
    let session = &state.session;
    match input {
        Input::Start { .. } => {
            if state.is_busy() {
                return Err(CommandRejected::Busy);
            }
            match session.status {
                SessionStatus::Idle | SessionStatus::Error => Ok(()),
                SessionStatus::Active => match session.zone {
                    Some(zone) => Err(CommandRejected::AlreadyRunning(zone)),
                    None => Err(CommandRejected::Busy),
                },
                SessionStatus::Loading => Err(CommandRejected::Loading),
            }
        }
        Input::Stop => {
            if state.is_busy() {
                return Err(CommandRejected::Busy);
            }
            match session.status {
                SessionStatus::Active => Ok(()),
                SessionStatus::Error if session.zone.is_some() => Ok(()),
                SessionStatus::Loading => Err(CommandRejected::Loading),
                _ => Err(CommandRejected::NotRunning),
            }
        }
        Input::Refresh => {
            if state.is_busy() {
                Err(CommandRejected::Busy)
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// transition(), the pure core
// ---------------------------------------------------------------------------

/// Pure, synchronous state transition.
///
/// Given the current state, an input and the wall-clock time at which the
/// input is processed, returns the new state and the effects to execute.
pub fn transition(
    mut state: TransitionState,
    input: Input,
    now: EpochMillis,
) -> (TransitionState, Vec<Effect>) {
    let before = state.session.clone();
    let mut effects: Vec<Effect> = Vec::new();

    match input {
        // -- Operator commands ---------------------------------------------
        Input::Refresh => {
            if state.is_busy() {
                debug!(component = "transition", "Refresh ignored, call outstanding");
            } else {
                let prior = state.session.last_known();
                state.session.set_loading(MSG_WAITING);
                state.in_flight = Some(InFlight::Query { prior });
                effects.push(Effect::QueryStatus);
                if state.zones.is_none() && !state.zones_loading {
                    state.zones_loading = true;
                    effects.push(Effect::LoadZones);
                }
            }
        }

        Input::Start { zone, minutes } => {
            if check_command(&state, &Input::Start { zone, minutes }).is_ok() {
                let prior = state.session.last_known();
                state
                    .session
                    .set_loading(format!("Starting zone {zone} for {minutes} min..."));
                state.in_flight = Some(InFlight::Start {
                    zone,
                    minutes,
                    prior,
                });
                effects.push(Effect::CallStart {
                    zone,
                    minutes: minutes.get(),
                });
            }
        }

        Input::Stop => {
            if check_command(&state, &Input::Stop).is_ok() {
                let prior = state.session.last_known();
                state.session.set_loading(MSG_STOPPING);
                state.in_flight = Some(InFlight::Stop { prior });
                effects.push(Effect::CallStop);
            }
        }

        // -- Countdown -------------------------------------------------------
        Input::Tick => {
            // Re-read the live status: a stop confirmation may have landed
            // between the tick being scheduled and processed.
            if let (SessionStatus::Active, Some(zone), Some(end)) = (
                state.session.status,
                state.session.zone,
                state.session.end_timestamp,
            ) {
                if end - now <= 0 {
                    info!(
                        component = "transition",
                        event = "session.expired",
                        zone = %zone,
                    );
                    let prior = state.session.last_known();
                    state.session.set_idle();
                    state.in_flight = Some(InFlight::ExpiryStop { prior });
                    effects.push(Effect::CallStop);
                } else {
                    effects.push(Effect::Emit(SessionEvent::Countdown {
                        zone,
                        remaining: countdown::remaining(now, end),
                    }));
                }
            }
        }

        // -- Gateway completions --------------------------------------------
        Input::StatusLoaded(result) => match state.in_flight.take() {
            Some(InFlight::Query { prior }) => match result {
                Ok(status) => apply_remote_status(&mut state.session, status, prior, now),
                Err(err) => state.session.set_error(err.message, prior),
            },
            other => {
                warn!(
                    component = "transition",
                    "Status result with no query outstanding, dropped"
                );
                state.in_flight = other;
            }
        },

        Input::ZonesLoaded(result) => {
            state.zones_loading = false;
            match result {
                Ok(zones) => {
                    let directory = ZoneDirectory::new(zones);
                    state.zones = Some(directory.clone());
                    effects.push(Effect::Emit(SessionEvent::ZonesLoaded(directory)));
                }
                Err(err) => {
                    warn!(
                        component = "transition",
                        event = "zones.load_failed",
                        error = %err,
                    );
                    let last_known = state.session.last_known();
                    state.session.set_error(err.message, last_known);
                }
            }
        }

        Input::StartCompleted(result) => match state.in_flight.take() {
            Some(InFlight::Start {
                zone,
                minutes,
                prior,
            }) => match result {
                Ok(ack) if ack.zone == zone => {
                    state
                        .session
                        .set_active(zone, now + minutes.as_millis(), MSG_ACTIVE);
                }
                Ok(ack) => {
                    // The controller is genuinely running, just not what we asked for.
                    let end = if ack.duration_secs > 0 {
                        end_after(now, ack.duration_secs)
                    } else {
                        Some(now + minutes.as_millis())
                    };
                    warn!(
                        component = "transition",
                        event = "session.zone_conflict",
                        requested = %zone,
                        running = %ack.zone,
                    );
                    match end {
                        Some(end) => state.session.set_active(
                            ack.zone,
                            end,
                            format!("Error, system already active on zone {}", ack.zone),
                        ),
                        None => reject_duration(&mut state.session, ack.duration_secs, prior),
                    }
                }
                Err(err) => state.session.set_error(err.message, prior),
            },
            other => {
                warn!(
                    component = "transition",
                    "Start result with no start outstanding, dropped"
                );
                state.in_flight = other;
            }
        },

        Input::StopCompleted(result) => match state.in_flight.take() {
            Some(InFlight::Stop { prior }) => match result {
                Ok(_) => state.session.set_idle(),
                Err(err) => state.session.set_error(err.message, prior),
            },
            Some(InFlight::ExpiryStop { prior }) => {
                // Already Idle locally; only a failure changes anything.
                if let Err(err) = result {
                    state.session.set_error(err.message, prior);
                }
            }
            other => {
                warn!(
                    component = "transition",
                    "Stop result with no stop outstanding, dropped"
                );
                state.in_flight = other;
            }
        },
    }

    // -- Derived effects -----------------------------------------------------
    let after = &state.session;
    let was_timed = before.status == SessionStatus::Active;
    let is_timed = after.status == SessionStatus::Active;
    match (was_timed, is_timed, after.end_timestamp) {
        (_, true, Some(end)) if !was_timed || before.end_timestamp != Some(end) => {
            effects.push(Effect::ArmCountdown { end_timestamp: end });
        }
        (true, false, _) => effects.push(Effect::DisarmCountdown),
        _ => {}
    }

    if *after != before {
        debug!(
            component = "transition",
            event = "session.changed",
            from = ?before.status,
            to = ?after.status,
            message = %after.message,
        );
        effects.push(Effect::Emit(SessionEvent::Changed(after.clone())));
    }

    (state, effects)
}

/// Translate a status snapshot into the session.
fn apply_remote_status(
    session: &mut Session,
    status: RemoteStatus,
    prior: LastKnown,
    now: EpochMillis,
) {
    match status.state {
        SystemState::Inactive => session.set_idle(),
        SystemState::Error => session.set_error(
            status
                .message
                .unwrap_or_else(|| "Controller reported an error".to_string()),
            prior,
        ),
        SystemState::Active => match (status.zone, status.duration_secs) {
            (Some(zone), Some(secs)) if secs > 0 => match end_after(now, secs) {
                // Started elsewhere (or before this client existed): adopt it.
                Some(end) => session.set_active(zone, end, MSG_ACTIVE),
                None => reject_duration(session, secs, prior),
            },
            (Some(zone), duration_secs) => {
                warn!(
                    component = "transition",
                    event = "session.active_without_time",
                    zone = %zone,
                    duration_secs = ?duration_secs,
                    "Controller reports an active zone with no time left, treating as idle"
                );
                session.set_idle();
            }
            (None, _) => session.set_error("Controller reported an active run without a zone", prior),
        },
    }
}

/// `now + secs` in epoch millis, or `None` when the remote value cannot be
/// represented.
fn end_after(now: EpochMillis, secs: u64) -> Option<EpochMillis> {
    i64::try_from(secs)
        .ok()?
        .checked_mul(1_000)?
        .checked_add(now)
}

fn reject_duration(session: &mut Session, secs: u64, prior: LastKnown) {
    warn!(
        component = "transition",
        event = "session.invalid_duration",
        duration_secs = secs,
    );
    session.set_error(MSG_INVALID_DURATION, prior);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

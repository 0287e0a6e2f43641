//! Sprinklr
//!
//! Client-side session controller for a home irrigation system: one zone
//! runs at a time, for a fixed number of minutes, and the remaining time is
//! counted down locally against an end timestamp.

pub mod clock;
pub mod config;
pub mod controller;
pub mod controller_command;
pub mod countdown;
pub mod input;
pub mod logging;
pub mod paths;
pub mod session;
pub mod transition;
pub mod zones;

pub use controller::{ControllerHandle, ControllerOptions, Snapshot};
pub use session::{Session, SessionStatus};
pub use transition::{CommandRejected, SessionEvent};

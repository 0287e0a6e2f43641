//! Sprinklr Protocol
//!
//! Shared types for communication between the Sprinklr client and the
//! irrigation controller backend. These types are serialized as JSON over HTTP.

pub mod client;
pub mod server;
pub mod types;

pub use client::{Endpoint, StartRequest};
pub use server::{
    ErrorBody, LastScheduleRun, LastSprinklerRun, RemoteStatus, StartResponse, StatusResponse,
    StopResponse,
};
pub use types::*;

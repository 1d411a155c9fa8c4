//! Roll Protocol - wire protocol for daemon communication
//!
//! This crate provides the message types exchanged between clients and
//! the roll daemon. Messages are newline-delimited JSON; the same
//! contract serves both persistent push-style connections and one-shot
//! request/response calls.

pub mod message;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, RequestType};
pub use version::ProtocolVersion;

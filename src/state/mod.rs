//! Domain state types for the veild daemon.
//!
//! This module contains the core state types separated by domain:
//! - `connection`: tunnel connection state machine and state events
//! - `protocol`: tunnel protocol types

mod connection;
mod protocol;

// Re-export all types for easy access
pub use connection::{StateEvent, TunnelState};
pub use protocol::Protocol;

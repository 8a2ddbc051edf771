//! `wa-relay` - device-linked chat relay with a pairing status page.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Backend question/answer client.
pub mod backend;
/// Relay configuration loading.
pub mod config;
/// Credential directory handling.
pub mod credentials;
/// Relay errors.
pub mod error;
/// Pairing code rendering.
pub mod pairing;
/// Inbound message relay.
pub mod relay;
/// Session supervisor.
pub mod session;
/// Connection lifecycle state machine.
pub mod status;
/// Messaging transport seam and the stdio bridge implementation.
pub mod transport;
/// Embedded status page server.
pub mod web;

pub use session::SessionManager;
pub use status::{ConnectionStatus, LinkState, SharedLinkState};

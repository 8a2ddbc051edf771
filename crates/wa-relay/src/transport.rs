//! Messaging transport seam.
//!
//! The messaging protocol is not implemented here. A [`Transport`] opens one
//! session at a time and reports everything that happens on it as
//! [`SessionEvent`]s on a channel; the returned [`SessionHandle`] is the only
//! way to send messages back out.

#![allow(missing_docs)]

use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::Deserialize;

use crate::credentials::CredentialStore;
use crate::error::RelayError;
use crate::status::CloseReason;

mod bridge;

pub use bridge::{parse_bridge_line, BridgeOptions, BridgeTransport};

/// JID of the broadcast/status channel.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// Everything a session reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connecting,
    PairingCode(String),
    Open,
    Closed(CloseReason),
    Messages(MessageUpsert),
}

/// Outbound side of an open session.
pub trait SessionHandle: Send + Sync {
    fn send_text(&self, jid: &str, text: &str) -> Result<(), RelayError>;

    /// Tears the session down. Further events from it are ignored.
    fn close(&self);
}

pub trait Transport: Send + Sync {
    /// Opens a session backed by `credentials`, delivering its events on `events`.
    ///
    /// A transport that loses its session without reporting a close must drop
    /// `events` so the supervisor notices.
    fn open(
        &self,
        credentials: &CredentialStore,
        events: Sender<SessionEvent>,
    ) -> Result<Arc<dyn SessionHandle>, RelayError>;
}

/// Batch of messages delivered together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageUpsert {
    /// `notify` for new messages, `append` for history sync.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl MessageUpsert {
    #[must_use]
    pub fn is_notify(&self) -> bool {
        self.kind == "notify"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WireMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub extended_text_message: Option<TextPayload>,
    #[serde(default)]
    pub image_message: Option<MediaPayload>,
    #[serde(default)]
    pub video_message: Option<MediaPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub caption: Option<String>,
}

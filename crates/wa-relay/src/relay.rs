//! Inbound message relay.
//!
//! One inbound chat message becomes one backend call becomes one reply.
//! Backend failures never reach the sender as errors; they get the fallback
//! apology instead.

#![allow(missing_docs)]

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::error::RelayError;
use crate::transport::{MessageUpsert, SessionHandle, WireMessage, STATUS_BROADCAST_JID};

/// Sender identity and text of a message worth answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
}

/// What [`MessageRelay::handle`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Ignored,
    Answered,
    /// The backend failed and the fallback reply was sent.
    Apologized,
}

pub struct MessageRelay {
    backend: Arc<dyn Backend>,
    fallback_message: String,
}

impl std::fmt::Debug for MessageRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRelay")
            .field("fallback_message", &self.fallback_message)
            .finish_non_exhaustive()
    }
}

impl MessageRelay {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, fallback_message: impl Into<String>) -> Self {
        Self {
            backend,
            fallback_message: fallback_message.into(),
        }
    }

    /// Answers the first message of a `notify` batch through `session`.
    ///
    /// Only a failure to send the reply itself is returned as an error.
    pub fn handle(
        &self,
        upsert: &MessageUpsert,
        session: &dyn SessionHandle,
    ) -> Result<RelayOutcome, RelayError> {
        let Some(inbound) = inbound_message(upsert) else {
            return Ok(RelayOutcome::Ignored);
        };
        info!(sender = %inbound.sender, text = %inbound.text, "message received");

        match self.backend.ask(&inbound.text, &inbound.sender) {
            Ok(answer) => {
                session.send_text(&inbound.sender, &answer)?;
                Ok(RelayOutcome::Answered)
            }
            Err(err) => {
                error!(
                    sender = %inbound.sender,
                    error = %err,
                    status = ?err.status(),
                    body = ?err.body(),
                    "backend call failed"
                );
                session.send_text(&inbound.sender, &self.fallback_message)?;
                Ok(RelayOutcome::Apologized)
            }
        }
    }
}

/// Picks the message to answer out of a batch, if any.
#[must_use]
pub fn inbound_message(upsert: &MessageUpsert) -> Option<InboundMessage> {
    if !upsert.is_notify() {
        return None;
    }
    let message = upsert.messages.first()?;
    if message.key.from_me {
        return None;
    }
    let sender = message.key.remote_jid.as_deref()?;
    if sender == STATUS_BROADCAST_JID {
        return None;
    }
    let text = extract_text(message)?;
    Some(InboundMessage {
        sender: sender.to_string(),
        text: text.to_string(),
    })
}

/// First non-empty of: plain body, extended text, image caption, video caption.
#[must_use]
pub fn extract_text(message: &WireMessage) -> Option<&str> {
    let content = message.message.as_ref()?;
    let candidates = [
        content.conversation.as_deref(),
        content
            .extended_text_message
            .as_ref()
            .and_then(|payload| payload.text.as_deref()),
        content
            .image_message
            .as_ref()
            .and_then(|payload| payload.caption.as_deref()),
        content
            .video_message
            .as_ref()
            .and_then(|payload| payload.caption.as_deref()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
}

/// Runs [`MessageRelay::handle`] and logs a failed reply instead of returning it.
pub fn relay_and_log(relay: &MessageRelay, upsert: &MessageUpsert, session: &dyn SessionHandle) {
    if let Err(err) = relay.handle(upsert, session) {
        warn!(%err, "failed to send reply");
    }
}

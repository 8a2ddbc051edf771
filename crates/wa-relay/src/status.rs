//! Connection lifecycle state machine.
//!
//! The link status is driven entirely by lifecycle signals coming from the
//! messaging transport. [`LinkState::transition`] is pure: it maps the current
//! state and one [`LifecycleEvent`] to the next state plus the side effects the
//! session supervisor must carry out.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use smol_str::SmolStr;

/// Status code the messaging library reports when the device was logged out.
pub const LOGGED_OUT_STATUS_CODE: u16 = 401;

/// Link status exposed on the status page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Opening (or re-opening) a session.
    #[default]
    Connecting,
    /// A pairing code was issued and the device is not linked yet.
    AwaitingPairing,
    /// Session open.
    Connected,
    /// Logged out; only a reset leaves this state.
    Failed,
}

impl ConnectionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingPairing => "awaiting-pairing",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The device was unlinked; stored credentials are no longer valid.
    LoggedOut,
    /// Any other disconnect. Recoverable by opening a new session.
    Disconnected {
        status_code: Option<u16>,
        message: SmolStr,
    },
}

impl CloseReason {
    /// Classifies a close report by its status code.
    #[must_use]
    pub fn from_status(status_code: Option<u16>, message: impl Into<SmolStr>) -> Self {
        if status_code == Some(LOGGED_OUT_STATUS_CODE) {
            Self::LoggedOut
        } else {
            Self::Disconnected {
                status_code,
                message: message.into(),
            }
        }
    }

    #[must_use]
    pub fn is_logout(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => f.write_str("logged out"),
            Self::Disconnected {
                status_code: Some(code),
                message,
            } => write!(f, "disconnected ({code}): {message}"),
            Self::Disconnected {
                status_code: None,
                message,
            } => write!(f, "disconnected: {message}"),
        }
    }
}

/// Lifecycle signals consumed by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connecting,
    /// Raw pairing code issued by the transport.
    PairingCode(String),
    /// Image rendered for a previously issued pairing code.
    PairingImageRendered(String),
    Closed(CloseReason),
    Open,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Render the pairing code and feed it back as
    /// [`LifecycleEvent::PairingImageRendered`].
    RenderPairingImage(String),
    /// Drop the current session and open a new one.
    Reconnect,
    /// Stop supervising; no new session is opened.
    Halt,
}

/// Status plus the pairing image shown while awaiting pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    pub status: ConnectionStatus,
    /// `data:` URI of the current pairing code. Only set while awaiting pairing.
    pub pairing_image: Option<String>,
}

impl LinkState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transition(&self, event: &LifecycleEvent) -> (LinkState, Vec<Effect>) {
        if self.status.is_terminal() {
            return (self.clone(), Vec::new());
        }
        match event {
            LifecycleEvent::Connecting => (Self::with_status(ConnectionStatus::Connecting), Vec::new()),
            LifecycleEvent::PairingCode(code) => {
                // Keep the previous image until the new one is rendered.
                let pairing_image = match self.status {
                    ConnectionStatus::AwaitingPairing => self.pairing_image.clone(),
                    _ => None,
                };
                (
                    LinkState {
                        status: ConnectionStatus::AwaitingPairing,
                        pairing_image,
                    },
                    vec![Effect::RenderPairingImage(code.clone())],
                )
            }
            LifecycleEvent::PairingImageRendered(image) => {
                if self.status == ConnectionStatus::AwaitingPairing {
                    (
                        LinkState {
                            status: ConnectionStatus::AwaitingPairing,
                            pairing_image: Some(image.clone()),
                        },
                        Vec::new(),
                    )
                } else {
                    (self.clone(), Vec::new())
                }
            }
            LifecycleEvent::Closed(reason) if reason.is_logout() => {
                (Self::with_status(ConnectionStatus::Failed), vec![Effect::Halt])
            }
            LifecycleEvent::Closed(_) => (
                Self::with_status(ConnectionStatus::Connecting),
                vec![Effect::Reconnect],
            ),
            LifecycleEvent::Open => (Self::with_status(ConnectionStatus::Connected), Vec::new()),
        }
    }

    fn with_status(status: ConnectionStatus) -> Self {
        Self {
            status,
            pairing_image: None,
        }
    }
}

/// Process-wide link state shared by the session supervisor and the web server.
#[derive(Debug, Clone, Default)]
pub struct SharedLinkState {
    inner: Arc<Mutex<LinkState>>,
}

impl SharedLinkState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> LinkState {
        self.inner.lock().clone()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status
    }

    /// Applies one event and returns the effects the caller must run.
    pub fn apply(&self, event: &LifecycleEvent) -> Vec<Effect> {
        let mut guard = self.inner.lock();
        let (next, effects) = guard.transition(event);
        *guard = next;
        effects
    }

    /// Back to `Connecting` with no pairing image.
    pub fn reset(&self) {
        *self.inner.lock() = LinkState::new();
    }
}

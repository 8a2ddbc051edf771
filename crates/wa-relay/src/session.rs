//! Session supervisor.
//!
//! Opens one session at a time, feeds its lifecycle events through the state
//! machine and carries out the resulting effects. Inbound messages are handed
//! to the relay on their own worker thread so a slow backend never holds up
//! lifecycle handling.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::RelayError;
use crate::pairing::{render_pairing_image, render_pairing_terminal};
use crate::relay::{relay_and_log, MessageRelay};
use crate::status::{CloseReason, Effect, LifecycleEvent, SharedLinkState};
use crate::transport::{MessageUpsert, SessionEvent, SessionHandle, Transport};

/// Supervisor tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Also draw pairing codes into the log output.
    pub print_qr_in_terminal: bool,
    /// Pause before opening a replacement session. Zero reconnects immediately.
    pub reconnect_delay: Duration,
}

/// Slot holding the session a manager currently has open.
///
/// Shared with whoever must tear the session down from outside the
/// supervisor, such as the exit path after a reset.
#[derive(Clone, Default)]
pub struct ActiveSession {
    slot: Arc<Mutex<Option<Arc<dyn SessionHandle>>>>,
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("open", &self.is_open())
            .finish()
    }
}

impl ActiveSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Closes and forgets the held session. Returns whether there was one.
    pub fn close(&self) -> bool {
        let session = self.slot.lock().take();
        match session {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    fn set(&self, session: Arc<dyn SessionHandle>) {
        *self.slot.lock() = Some(session);
    }

    fn clear(&self) {
        self.slot.lock().take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Reconnect,
    Halt,
}

/// Owns the single messaging session and the link state it drives.
pub struct SessionManager {
    state: SharedLinkState,
    credentials: CredentialStore,
    transport: Arc<dyn Transport>,
    relay: Arc<MessageRelay>,
    options: SessionOptions,
    active: ActiveSession,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        state: SharedLinkState,
        credentials: CredentialStore,
        transport: Arc<dyn Transport>,
        relay: Arc<MessageRelay>,
    ) -> Self {
        Self {
            state,
            credentials,
            transport,
            relay,
            options: SessionOptions::default(),
            active: ActiveSession::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn state(&self) -> &SharedLinkState {
        &self.state
    }

    /// Handle on the session this manager has open, for closing it from outside.
    #[must_use]
    pub fn active_session(&self) -> ActiveSession {
        self.active.clone()
    }

    /// Keeps a session open until the device is logged out.
    ///
    /// Every recoverable close opens a new session right away (or after
    /// `reconnect_delay`), with no attempt limit. Returns once the link has
    /// failed; a transport that cannot open a session at all is an error.
    pub fn run(&self) -> Result<(), RelayError> {
        loop {
            match self.start()? {
                SessionEnd::Reconnect => {
                    if !self.options.reconnect_delay.is_zero() {
                        thread::sleep(self.options.reconnect_delay);
                    }
                }
                SessionEnd::Halt => return Ok(()),
            }
        }
    }

    /// Deletes stored credentials and returns the link to its initial state.
    ///
    /// The running session is left alone; callers restart the process.
    pub fn reset(&self) -> Result<(), RelayError> {
        reset_link(&self.state, &self.credentials)
    }

    fn start(&self) -> Result<SessionEnd, RelayError> {
        self.credentials.ensure()?;
        let (events_tx, events) = crossbeam_channel::unbounded();
        let session = self.transport.open(&self.credentials, events_tx)?;
        self.active.set(session.clone());
        debug!(auth_dir = %self.credentials.root().display(), "session opened");

        let end = loop {
            let event = match events.recv() {
                Ok(event) => event,
                Err(_) => {
                    // Transport went away without reporting a close.
                    let reason = CloseReason::from_status(None, "session ended unexpectedly");
                    break self
                        .on_lifecycle(&LifecycleEvent::Closed(reason))
                        .unwrap_or(SessionEnd::Halt);
                }
            };
            let lifecycle = match event {
                SessionEvent::Messages(upsert) => {
                    self.dispatch(upsert, &session);
                    continue;
                }
                SessionEvent::Connecting => LifecycleEvent::Connecting,
                SessionEvent::PairingCode(code) => LifecycleEvent::PairingCode(code),
                SessionEvent::Open => LifecycleEvent::Open,
                SessionEvent::Closed(reason) => LifecycleEvent::Closed(reason),
            };
            if let Some(end) = self.on_lifecycle(&lifecycle) {
                break end;
            }
        };
        self.active.clear();
        session.close();
        Ok(end)
    }

    fn on_lifecycle(&self, event: &LifecycleEvent) -> Option<SessionEnd> {
        match event {
            LifecycleEvent::Open => info!("connection open"),
            LifecycleEvent::PairingCode(_) => info!("pairing code received"),
            LifecycleEvent::Closed(reason) => {
                info!(%reason, reconnect = !reason.is_logout(), "connection closed");
            }
            LifecycleEvent::Connecting | LifecycleEvent::PairingImageRendered(_) => {}
        }
        let mut end = None;
        for effect in self.state.apply(event) {
            match effect {
                Effect::RenderPairingImage(code) => self.render_pairing(&code),
                Effect::Reconnect => end = Some(SessionEnd::Reconnect),
                Effect::Halt => end = Some(SessionEnd::Halt),
            }
        }
        end
    }

    fn render_pairing(&self, code: &str) {
        if self.options.print_qr_in_terminal {
            match render_pairing_terminal(code) {
                Ok(qr) => info!("scan to link this device:\n{qr}"),
                Err(err) => warn!(%err, "failed to draw pairing code"),
            }
        }
        match render_pairing_image(code) {
            Ok(image) => {
                let _ = self
                    .state
                    .apply(&LifecycleEvent::PairingImageRendered(image));
            }
            Err(err) => warn!(%err, "failed to render pairing code"),
        }
    }

    fn dispatch(&self, upsert: MessageUpsert, session: &Arc<dyn SessionHandle>) {
        let relay = self.relay.clone();
        let session = session.clone();
        let spawned = thread::Builder::new()
            .name("relay-message".into())
            .spawn(move || relay_and_log(&relay, &upsert, session.as_ref()));
        if let Err(err) = spawned {
            warn!(%err, "failed to start relay worker");
        }
    }
}

/// Deletes stored credentials and returns `state` to `Connecting` with no image.
pub fn reset_link(state: &SharedLinkState, credentials: &CredentialStore) -> Result<(), RelayError> {
    credentials.clear()?;
    state.reset();
    info!(auth_dir = %credentials.root().display(), "credentials reset");
    Ok(())
}

//! Stdio bridge transport.
//!
//! Spawns an external bridge process that owns the messaging protocol and
//! talks to it in line-delimited JSON: lifecycle and message events on the
//! bridge's stdout, send commands on its stdin.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, warn};

use super::{MessageUpsert, SessionEvent, SessionHandle, Transport};
use crate::credentials::CredentialStore;
use crate::error::RelayError;
use crate::status::CloseReason;

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub command: SmolStr,
    pub args: Vec<String>,
    /// Client identity forwarded to the bridge: name, browser, version.
    pub browser: [SmolStr; 3],
}

#[derive(Debug, Clone)]
pub struct BridgeTransport {
    options: BridgeOptions,
}

impl BridgeTransport {
    #[must_use]
    pub fn new(options: BridgeOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum BridgeEvent {
    #[serde(rename = "connecting")]
    Connecting,
    #[serde(rename = "qr")]
    Qr { code: String },
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close")]
    Close {
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "messages.upsert")]
    MessagesUpsert(MessageUpsert),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
struct SendCommand<'a> {
    op: &'static str,
    jid: &'a str,
    text: &'a str,
}

/// Parses one line of bridge output. Blank lines and unknown events yield `None`.
pub fn parse_bridge_line(line: &str) -> Result<Option<SessionEvent>, RelayError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event: BridgeEvent = serde_json::from_str(line)
        .map_err(|err| RelayError::Transport(format!("bridge event: {err}").into()))?;
    Ok(match event {
        BridgeEvent::Connecting => Some(SessionEvent::Connecting),
        BridgeEvent::Qr { code } => Some(SessionEvent::PairingCode(code)),
        BridgeEvent::Open => Some(SessionEvent::Open),
        BridgeEvent::Close {
            status_code,
            message,
        } => Some(SessionEvent::Closed(CloseReason::from_status(
            status_code,
            message.unwrap_or_default(),
        ))),
        BridgeEvent::MessagesUpsert(upsert) => Some(SessionEvent::Messages(upsert)),
        BridgeEvent::Unknown => None,
    })
}

impl Transport for BridgeTransport {
    fn open(
        &self,
        credentials: &CredentialStore,
        events: Sender<SessionEvent>,
    ) -> Result<Arc<dyn SessionHandle>, RelayError> {
        let browser = self.options.browser.join(",");
        let mut child = Command::new(self.options.command.as_str())
            .args(&self.options.args)
            .arg("--auth-dir")
            .arg(credentials.root())
            .arg("--browser")
            .arg(&browser)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                RelayError::Transport(
                    format!("spawn bridge '{}': {err}", self.options.command).into(),
                )
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RelayError::Transport("bridge stdio unavailable".into()));
        };

        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = closed.clone();
        let spawned = thread::Builder::new()
            .name("bridge-events".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    if reader_closed.load(Ordering::SeqCst) {
                        break;
                    }
                    match parse_bridge_line(&line) {
                        Ok(Some(event)) => {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => debug!(%err, "skipping bridge output"),
                    }
                }
                // Dropping `events` here tells the supervisor the session is gone.
            });
        if let Err(err) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RelayError::Transport(format!("bridge reader: {err}").into()));
        }

        let _ = thread::Builder::new()
            .name("bridge-stderr".into())
            .spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    let line = line.trim();
                    if !line.is_empty() {
                        debug!(target: "wa_relay::bridge_stderr", "{line}");
                    }
                }
            });

        Ok(Arc::new(BridgeSession {
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            closed,
        }))
    }
}

struct BridgeSession {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle for BridgeSession {
    fn send_text(&self, jid: &str, text: &str) -> Result<(), RelayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("session closed".into()));
        }
        let mut line = serde_json::to_string(&SendCommand {
            op: "send",
            jid,
            text,
        })
        .map_err(|err| RelayError::Transport(format!("encode send: {err}").into()))?;
        line.push('\n');
        let mut stdin = self.stdin.lock();
        stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|err| RelayError::Transport(format!("bridge stdin: {err}").into()))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock();
        if let Err(err) = child.kill() {
            warn!(%err, "failed to stop bridge process");
        }
        let _ = child.wait();
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.close();
    }
}

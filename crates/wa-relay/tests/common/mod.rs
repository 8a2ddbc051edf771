#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tiny_http::{Header, Response, Server, StatusCode};
use wa_relay::backend::{Backend, BackendError};
use wa_relay::credentials::CredentialStore;
use wa_relay::error::RelayError;
use wa_relay::status::CloseReason;
use wa_relay::transport::{
    MessageContent, MessageKey, MessageUpsert, SessionEvent, SessionHandle, Transport, WireMessage,
};

pub fn reserve_loopback_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
    let port = listener.local_addr().expect("read local addr").port();
    drop(listener);
    port
}

pub fn temp_path(name: &str) -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("wa-relay-{name}-{stamp}"))
}

pub fn wait_until(mut check: impl FnMut() -> bool, what: &str) {
    for _ in 0..200 {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

pub fn text_upsert(jid: &str, from_me: bool, text: &str) -> MessageUpsert {
    MessageUpsert {
        kind: "notify".into(),
        messages: vec![WireMessage {
            key: MessageKey {
                remote_jid: Some(jid.to_string()),
                from_me,
            },
            message: Some(MessageContent {
                conversation: Some(text.to_string()),
                ..MessageContent::default()
            }),
        }],
    }
}

pub fn closed(status_code: u16) -> SessionEvent {
    SessionEvent::Closed(CloseReason::from_status(Some(status_code), "closed by test"))
}

/// Backend answering every question the same way.
pub struct FixedBackend(pub Result<String, BackendError>);

impl Backend for FixedBackend {
    fn ask(&self, _question: &str, _sender: &str) -> Result<String, BackendError> {
        self.0.clone()
    }
}

/// Session handle that records outbound messages and closes.
pub struct RecordingSession {
    sent: Sender<(String, String)>,
    closes: Arc<AtomicUsize>,
}

impl SessionHandle for RecordingSession {
    fn send_text(&self, jid: &str, text: &str) -> Result<(), RelayError> {
        let _ = self.sent.send((jid.to_string(), text.to_string()));
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport replaying one scripted event list per opened session.
///
/// The event sender is dropped after the script, so a script without a close
/// event looks like a transport that vanished. With `live` set, the sender of
/// the most recent session is kept for the test to push events by hand.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<SessionEvent>>>,
    opened: Mutex<Vec<PathBuf>>,
    live: Mutex<Option<Sender<SessionEvent>>>,
    keep_live: bool,
    closes: Arc<AtomicUsize>,
    sent_tx: Sender<(String, String)>,
    pub sent: Receiver<(String, String)>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Vec<SessionEvent>>) -> Arc<Self> {
        Self::build(scripts, false)
    }

    pub fn live() -> Arc<Self> {
        Self::build(vec![Vec::new()], true)
    }

    fn build(scripts: Vec<Vec<SessionEvent>>, keep_live: bool) -> Arc<Self> {
        let (sent_tx, sent) = crossbeam_channel::unbounded();
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opened: Mutex::new(Vec::new()),
            live: Mutex::new(None),
            keep_live,
            closes: Arc::new(AtomicUsize::new(0)),
            sent_tx,
            sent,
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened_with(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }

    pub fn push(&self, event: SessionEvent) {
        let guard = self.live.lock();
        let sender = guard.as_ref().expect("live session");
        sender.send(event).expect("session listening");
    }

    pub fn has_live_session(&self) -> bool {
        self.live.lock().is_some()
    }

    /// Number of `close` calls across every session handed out.
    pub fn closed_sessions(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        credentials: &CredentialStore,
        events: Sender<SessionEvent>,
    ) -> Result<Arc<dyn SessionHandle>, RelayError> {
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| RelayError::Transport("no scripted session left".into()))?;
        self.opened.lock().push(credentials.root().to_path_buf());
        for event in script {
            events.send(event).expect("supervisor listening");
        }
        if self.keep_live {
            *self.live.lock() = Some(events);
        }
        Ok(Arc::new(RecordingSession {
            sent: self.sent_tx.clone(),
            closes: self.closes.clone(),
        }))
    }
}

/// Minimal HTTP backend; `reply` maps the request body to (status, body).
pub fn start_backend(
    reply: impl Fn(&str) -> (u16, String) + Send + 'static,
) -> (String, Receiver<String>) {
    let port = reserve_loopback_port();
    let server = Server::http(format!("127.0.0.1:{port}")).expect("backend bind");
    let (seen_tx, seen) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        use std::io::Read;

        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let (status, reply_body) = reply(&body);
            let _ = seen_tx.send(body);
            let response = Response::from_string(reply_body)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            let _ = request.respond(response);
        }
    });
    (format!("http://127.0.0.1:{port}/ask"), seen)
}

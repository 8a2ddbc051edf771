//! Embedded status page server.

#![allow(missing_docs)]

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{error, info, warn};

use crate::config::WebConfig;
use crate::credentials::CredentialStore;
use crate::error::RelayError;
use crate::session::{reset_link, ActiveSession};
use crate::status::{ConnectionStatus, LinkState, SharedLinkState};

const STATUS_HTML: &str = include_str!("web/ui/status.html");
const PANEL_JS: &str = include_str!("web/ui/panel.js");

pub const RESET_CONFIRMATION_HTML: &str =
    "<h1>Auth reset successfully!</h1><p>Restarting bot...</p>";

const CONNECTING_CONTENT: &str =
    r#"<div class="status"><p>Connecting to WhatsApp...</p></div>"#;
const CONNECTED_CONTENT: &str =
    r#"<div class="status"><p>Device linked successfully! The bot is now connected.</p></div>"#;
const FAILED_CONTENT: &str = r#"<div class="status"><p>Connection failed. Please reset and try again.</p><a href="/reset" class="reset-link">Reset Auth and Link Device</a></div>"#;
const PAIRING_INSTRUCTIONS: &str = "1. Open WhatsApp on your phone<br>2. Tap Menu or Settings and select Linked Devices<br>3. Tap on Link a Device<br>4. Point your phone at this screen to scan the code<br><br>Note: The QR code expires in about 60 seconds. If scanning fails, reset and try again.";

/// Called with the exit code once a reset has been answered.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Hook that closes the running session, then terminates the process.
///
/// `std::process::exit` skips destructors, so the bridge process would
/// otherwise outlive the relay and keep its link open.
#[must_use]
pub fn process_exit(active: ActiveSession) -> ExitHook {
    closing_session(active, Arc::new(|code| std::process::exit(code)))
}

/// Wraps `exit` so the session held in `active` is closed first.
#[must_use]
pub fn closing_session(active: ActiveSession, exit: ExitHook) -> ExitHook {
    Arc::new(move |code| {
        if active.close() {
            info!("closed running session before exit");
        }
        exit(code);
    })
}

pub struct WebServer {
    handle: thread::JoinHandle<()>,
    listen: String,
}

impl WebServer {
    /// Address the server is bound to.
    #[must_use]
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// Blocks until the server thread stops.
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("status page server panicked");
        }
    }
}

struct WebContext {
    state: SharedLinkState,
    credentials: CredentialStore,
    reset_exit_delay: Duration,
    exit: ExitHook,
}

pub fn start_web_server(
    config: &WebConfig,
    state: SharedLinkState,
    credentials: CredentialStore,
    exit: ExitHook,
) -> Result<WebServer, RelayError> {
    let listen = config.listen.to_string();
    let server =
        Server::http(&listen).map_err(|err| RelayError::Web(format!("web bind: {err}").into()))?;
    let context = WebContext {
        state,
        credentials,
        reset_exit_delay: config.reset_exit_delay,
        exit,
    };
    info!(url = %format_web_url(&listen), "status page listening");
    let handle = thread::Builder::new()
        .name("status-web".into())
        .spawn(move || {
            for request in server.incoming_requests() {
                handle_request(request, &context);
            }
        })
        .map_err(|err| RelayError::Web(format!("web thread: {err}").into()))?;
    Ok(WebServer { handle, listen })
}

fn handle_request(request: Request, context: &WebContext) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("");
    if method != Method::Get {
        let _ = request.respond(text_response("not found", 404, "text/plain"));
        return;
    }
    match path {
        "/" => {
            let body = render_status_page(&context.state.snapshot());
            let _ = request.respond(text_response(body, 200, "text/html"));
        }
        "/reset" => match reset_link(&context.state, &context.credentials) {
            Ok(()) => {
                let _ = request.respond(text_response(RESET_CONFIRMATION_HTML, 200, "text/html"));
                schedule_exit(context.reset_exit_delay, context.exit.clone());
            }
            Err(err) => {
                error!(%err, "reset failed");
                let body = format!("<h1>Reset failed</h1><p>{}</p>", escape_html(&err.to_string()));
                let _ = request.respond(text_response(body, 500, "text/html"));
            }
        },
        "/static/panel.js" => {
            let _ = request.respond(text_response(PANEL_JS, 200, "application/javascript"));
        }
        _ => {
            let _ = request.respond(text_response("not found", 404, "text/plain"));
        }
    }
}

fn schedule_exit(delay: Duration, exit: ExitHook) {
    let hook = exit.clone();
    let spawned = thread::Builder::new()
        .name("reset-exit".into())
        .spawn(move || {
            thread::sleep(delay);
            info!("exiting for restart after reset");
            hook(0);
        });
    if let Err(err) = spawned {
        warn!(%err, "failed to schedule exit, exiting now");
        exit(0);
    }
}

fn text_response(
    body: impl Into<String>,
    status: u16,
    content_type: &str,
) -> Response<Cursor<Vec<u8>>> {
    let content_type = format!("{content_type}; charset=utf-8");
    let response = Response::from_string(body).with_status_code(StatusCode(status));
    match Header::from_bytes("Content-Type", content_type.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Status page for a link state.
#[must_use]
pub fn render_status_page(state: &LinkState) -> String {
    STATUS_HTML.replace("{{content}}", &status_content(state))
}

fn status_content(state: &LinkState) -> String {
    match (state.status, state.pairing_image.as_deref()) {
        (ConnectionStatus::Connecting, _) => CONNECTING_CONTENT.to_string(),
        (ConnectionStatus::AwaitingPairing, Some(image)) => format!(
            r#"<div class="status"><p>To link your device:</p><div class="qr-code"><img src="{}" alt="QR Code" /></div><div class="instructions">{PAIRING_INSTRUCTIONS}</div></div>"#,
            escape_html(image)
        ),
        (ConnectionStatus::Connected, _) => CONNECTED_CONTENT.to_string(),
        (ConnectionStatus::Failed, _) => FAILED_CONTENT.to_string(),
        (ConnectionStatus::AwaitingPairing, None) => String::new(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_web_url(listen: &str) -> String {
    let host = listen.split(':').next().unwrap_or("localhost");
    let port = listen.rsplit(':').next().unwrap_or("3000");
    let host = if host == "0.0.0.0" { "localhost" } else { host };
    format!("http://{host}:{port}")
}

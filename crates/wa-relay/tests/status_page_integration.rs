mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{reserve_loopback_port, temp_path};
use crossbeam_channel::Receiver;
use smol_str::SmolStr;
use wa_relay::config::WebConfig;
use wa_relay::credentials::CredentialStore;
use wa_relay::status::{CloseReason, LifecycleEvent, LOGGED_OUT_STATUS_CODE};
use wa_relay::web::{start_web_server, ExitHook, RESET_CONFIRMATION_HTML};
use wa_relay::{ConnectionStatus, SharedLinkState};

struct TestServer {
    base: String,
    state: SharedLinkState,
    credentials: CredentialStore,
    exits: Receiver<i32>,
}

fn start_test_server(name: &str) -> TestServer {
    let port = reserve_loopback_port();
    let listen = format!("127.0.0.1:{port}");
    let config = WebConfig {
        listen: SmolStr::new(&listen),
        reset_exit_delay: Duration::from_millis(50),
    };
    let state = SharedLinkState::new();
    let credentials = CredentialStore::new(temp_path(name));
    let (exit_tx, exits) = crossbeam_channel::unbounded();
    let exit: ExitHook = Arc::new(move |code| {
        let _ = exit_tx.send(code);
    });
    let _server = start_web_server(&config, state.clone(), credentials.clone(), exit)
        .expect("start web server");
    let base = format!("http://{listen}");
    wait_for_server(&base);
    TestServer {
        base,
        state,
        credentials,
        exits,
    }
}

fn wait_for_server(base: &str) {
    for _ in 0..80 {
        if ureq::get(&format!("{base}/")).call().is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(25));
    }
    panic!("status page did not become reachable at {base}");
}

fn get(url: &str) -> (u16, String, String) {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let mut response = agent.get(url).call().expect("request");
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.body_mut().read_to_string().expect("body");
    (status, content_type, body)
}

#[test]
fn index_reflects_each_status() {
    let server = start_test_server("index");

    let (status, content_type, body) = get(&format!("{}/", server.base));
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/html"), "{content_type}");
    assert!(body.contains("Connecting to WhatsApp..."), "{body}");
    assert!(!body.contains("<img"));

    server
        .state
        .apply(&LifecycleEvent::PairingCode("2@code".into()));
    let (_, _, body) = get(&format!("{}/", server.base));
    assert!(!body.contains("<img"), "no image before render: {body}");
    assert!(!body.contains("Connecting to WhatsApp..."));

    server.state.apply(&LifecycleEvent::PairingImageRendered(
        "data:image/svg+xml;base64,PHN2Zz4=".into(),
    ));
    let (_, _, body) = get(&format!("{}/", server.base));
    assert!(body.contains(r#"src="data:image/svg+xml;base64,PHN2Zz4=""#), "{body}");
    assert!(body.contains("Linked Devices"));

    server.state.apply(&LifecycleEvent::Open);
    let (_, _, body) = get(&format!("{}/", server.base));
    assert!(body.contains("Device linked successfully!"));
    assert!(!body.contains("<img"));

    server
        .state
        .apply(&LifecycleEvent::Closed(CloseReason::from_status(
            Some(LOGGED_OUT_STATUS_CODE),
            "logged out",
        )));
    let (_, _, body) = get(&format!("{}/", server.base));
    assert!(body.contains("Connection failed."));
    assert!(body.contains(r#"href="/reset""#));
    assert!(!body.contains("<img"));
}

#[test]
fn reset_while_failed_deletes_credentials_and_schedules_exit() {
    let server = start_test_server("reset");
    server.credentials.ensure().expect("create creds dir");
    std::fs::create_dir_all(server.credentials.root().join("keys")).expect("mkdir");
    std::fs::write(server.credentials.root().join("creds.json"), "{}").expect("write");
    server
        .state
        .apply(&LifecycleEvent::Closed(CloseReason::LoggedOut));
    assert_eq!(server.state.status(), ConnectionStatus::Failed);

    let (status, content_type, body) = get(&format!("{}/reset", server.base));
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/html"));
    assert_eq!(body, RESET_CONFIRMATION_HTML);
    assert!(body.contains("Auth reset successfully!"));

    assert!(!server.credentials.root().exists());
    let state = server.state.snapshot();
    assert_eq!(state.status, ConnectionStatus::Connecting);
    assert!(state.pairing_image.is_none());

    let code = server
        .exits
        .recv_timeout(Duration::from_secs(2))
        .expect("exit scheduled");
    assert_eq!(code, 0);
}

#[test]
fn reset_without_stored_credentials_still_confirms() {
    let server = start_test_server("reset-empty");
    let (status, _, body) = get(&format!("{}/reset", server.base));
    assert_eq!(status, 200);
    assert!(body.contains("Auth reset successfully!"));
    assert!(server
        .exits
        .recv_timeout(Duration::from_secs(2))
        .is_ok());
}

#[test]
fn serves_panel_script() {
    let server = start_test_server("panel");
    let (status, content_type, body) = get(&format!("{}/static/panel.js", server.base));
    assert_eq!(status, 200);
    assert!(content_type.starts_with("application/javascript"));
    assert!(body.contains(".resolution-form"));
    assert!(body.contains(".call-card"));
    assert!(body.contains("closest('form')"));
}

#[test]
fn panel_script_toggle_logic() {
    let server = start_test_server("panel-logic");
    let (_, _, body) = get(&format!("{}/static/panel.js", server.base));

    let ready = body.find("'DOMContentLoaded'").expect("waits for the document");
    let initial = body.find("setShown(form, hasNotes)").expect("initial visibility");
    let click = body.find("addEventListener('click'").expect("card click handler");
    let guard = body.find("closest('form')").expect("ignores clicks in the form");
    let toggle = body.find("setShown(form, !isShown(form))").expect("toggles");
    assert!(ready < initial && initial < click && click < guard && guard < toggle);

    assert!(body.contains("textarea[name=\"resolution\"]"));
    assert!(body.contains("notes.value.trim() !== ''"));
    assert!(body.contains("shown ? 'flex' : 'none'"));
}

#[test]
fn unknown_paths_are_not_found() {
    let server = start_test_server("missing");
    let (status, _, body) = get(&format!("{}/api/status", server.base));
    assert_eq!(status, 404);
    assert_eq!(body, "not found");
    assert!(server
        .exits
        .recv_timeout(Duration::from_millis(100))
        .is_err());
}

//! Relay configuration loading.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::RelayError;

pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/ask";
pub const DEFAULT_AUTH_DIR: &str = "auth";
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Disculpa, estoy teniendo problemas para procesar tu solicitud en este momento. Por favor, inténtalo más tarde o contacta a un administrador.";

const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RESET_EXIT_DELAY_MS: u64 = 1_000;
const DEFAULT_BRIDGE_COMMAND: &str = "node";
pub const DEFAULT_BRIDGE_SCRIPT: &str = "bridge/bridge.js";
const DEFAULT_BROWSER: [&str; 3] = ["WhatsApp", "Chrome", "1.0"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub web: WebConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub log_level: SmolStr,
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub listen: SmolStr,
    /// Delay between answering `/reset` and exiting the process.
    pub reset_exit_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: SmolStr,
    pub timeout: Duration,
    pub fallback_message: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub auth_dir: PathBuf,
    pub bridge_command: SmolStr,
    pub bridge_args: Vec<String>,
    /// Client identity announced to the network: name, browser, version.
    pub browser: [SmolStr; 3],
    pub print_qr_in_terminal: bool,
    pub reconnect_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        // An empty document only fills in defaults, which always validate.
        RelayToml::default()
            .into_config()
            .unwrap_or_else(|_| unreachable!("default relay config is valid"))
    }
}

impl RelayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            RelayError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        let raw: RelayToml = toml::from_str(&text).map_err(|err| {
            RelayError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        raw.into_config()
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let raw: RelayToml =
            toml::from_str(text).map_err(|err| RelayError::InvalidConfig(err.to_string().into()))?;
        raw.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelayToml {
    web: Option<WebSection>,
    backend: Option<BackendSection>,
    session: Option<SessionSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WebSection {
    listen: Option<String>,
    reset_exit_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BackendSection {
    url: Option<String>,
    timeout_ms: Option<u64>,
    fallback_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionSection {
    auth_dir: Option<String>,
    bridge_command: Option<String>,
    bridge_args: Option<Vec<String>>,
    browser: Option<Vec<String>>,
    print_qr_in_terminal: Option<bool>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
}

impl RelayToml {
    fn into_config(self) -> Result<RelayConfig, RelayError> {
        let web = self.web.unwrap_or_default();
        let backend = self.backend.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        let listen = web.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        validate_listen(&listen)?;

        let url = backend
            .url
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::InvalidConfig(
                format!("backend.url must be http(s), got '{url}'").into(),
            ));
        }
        let timeout_ms = backend.timeout_ms.unwrap_or(DEFAULT_BACKEND_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "backend.timeout_ms must be greater than zero".into(),
            ));
        }
        let fallback_message = backend
            .fallback_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FALLBACK_MESSAGE.to_string());

        let bridge_command = session
            .bridge_command
            .unwrap_or_else(|| DEFAULT_BRIDGE_COMMAND.to_string());
        if bridge_command.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "session.bridge_command must not be empty".into(),
            ));
        }
        let bridge_args = session
            .bridge_args
            .unwrap_or_else(|| vec![DEFAULT_BRIDGE_SCRIPT.to_string()]);
        let browser = parse_browser(session.browser)?;

        let level = log.level.unwrap_or_else(|| "info".to_string());
        let level = level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(RelayError::InvalidConfig(
                format!("invalid log.level '{level}'").into(),
            ));
        }

        Ok(RelayConfig {
            web: WebConfig {
                listen: SmolStr::new(listen),
                reset_exit_delay: Duration::from_millis(
                    web.reset_exit_delay_ms.unwrap_or(DEFAULT_RESET_EXIT_DELAY_MS),
                ),
            },
            backend: BackendConfig {
                url: SmolStr::new(url),
                timeout: Duration::from_millis(timeout_ms),
                fallback_message,
            },
            session: SessionConfig {
                auth_dir: PathBuf::from(
                    session
                        .auth_dir
                        .unwrap_or_else(|| DEFAULT_AUTH_DIR.to_string()),
                ),
                bridge_command: SmolStr::new(bridge_command),
                bridge_args,
                browser,
                print_qr_in_terminal: session.print_qr_in_terminal.unwrap_or(false),
                reconnect_delay: Duration::from_millis(session.reconnect_delay_ms.unwrap_or(0)),
            },
            log_level: SmolStr::new(level),
        })
    }
}

fn validate_listen(listen: &str) -> Result<(), RelayError> {
    let invalid = || RelayError::InvalidConfig(format!("invalid web.listen '{listen}'").into());
    let (host, port) = listen.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

fn parse_browser(browser: Option<Vec<String>>) -> Result<[SmolStr; 3], RelayError> {
    let Some(browser) = browser else {
        return Ok(DEFAULT_BROWSER.map(SmolStr::new));
    };
    match browser.as_slice() {
        [name, agent, version] => Ok([
            SmolStr::new(name),
            SmolStr::new(agent),
            SmolStr::new(version),
        ]),
        _ => Err(RelayError::InvalidConfig(
            format!(
                "session.browser expects [name, browser, version], got {} entries",
                browser.len()
            )
            .into(),
        )),
    }
}

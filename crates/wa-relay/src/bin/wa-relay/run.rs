//! Relay startup and maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use wa_relay::backend::HttpBackend;
use wa_relay::config::{RelayConfig, DEFAULT_CONFIG_FILE};
use wa_relay::credentials::CredentialStore;
use wa_relay::relay::MessageRelay;
use wa_relay::session::SessionOptions;
use wa_relay::transport::{BridgeOptions, BridgeTransport};
use wa_relay::web::{process_exit, start_web_server};
use wa_relay::{SessionManager, SharedLinkState};

pub fn run_relay(config: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let config = load_config(config)?;
    init_logging(&config, verbose);

    let state = SharedLinkState::new();
    let credentials = CredentialStore::new(&config.session.auth_dir);
    let backend = Arc::new(HttpBackend::new(
        config.backend.url.clone(),
        config.backend.timeout,
    ));
    let relay = Arc::new(MessageRelay::new(
        backend,
        config.backend.fallback_message.clone(),
    ));
    let transport = Arc::new(BridgeTransport::new(BridgeOptions {
        command: config.session.bridge_command.clone(),
        args: config.session.bridge_args.clone(),
        browser: config.session.browser.clone(),
    }));
    let manager = SessionManager::new(state.clone(), credentials.clone(), transport, relay)
        .with_options(SessionOptions {
            print_qr_in_terminal: config.session.print_qr_in_terminal,
            reconnect_delay: config.session.reconnect_delay,
        });

    let web = start_web_server(
        &config.web,
        state,
        credentials.clone(),
        process_exit(manager.active_session()),
    )?;
    info!(
        listen = web.listen(),
        backend = %config.backend.url,
        bridge = %config.session.bridge_command,
        auth_dir = %credentials.root().display(),
        "starting relay"
    );

    manager.run().context("session supervisor stopped")?;

    warn!("device logged out; open the status page and reset to link again");
    web.join();
    Ok(())
}

pub fn run_reset(config: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let config = load_config(config)?;
    init_logging(&config, verbose);
    let credentials = CredentialStore::new(&config.session.auth_dir);
    credentials.clear()?;
    println!(
        "Credentials removed from {}. Restart the relay to link a device.",
        credentials.root().display()
    );
    Ok(())
}

pub fn run_validate(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    println!("Config OK");
    println!("  listen        {}", config.web.listen);
    println!("  backend       {}", config.backend.url);
    println!(
        "  timeout       {} ms",
        config.backend.timeout.as_millis()
    );
    println!("  auth dir      {}", config.session.auth_dir.display());
    println!(
        "  bridge        {} {}",
        config.session.bridge_command,
        config.session.bridge_args.join(" ")
    );
    println!("  browser       {}", config.session.browser.join(" / "));
    println!("  log level     {}", config.log_level);
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<RelayConfig> {
    let config = match path {
        Some(path) => RelayConfig::load(&path)?,
        None => RelayConfig::load_or_default(DEFAULT_CONFIG_FILE)?,
    };
    Ok(config)
}

fn init_logging(config: &RelayConfig, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

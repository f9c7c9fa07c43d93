//! WRP gateway entry point.
//!
//! Runs two servers side by side:
//!
//! - the device WebSocket listener (`wrp-device`), which accepts device
//!   sessions and gives each one its own random key, so a device that
//!   reconnects before its old session is reaped is still accepted
//! - the redirect listener, which sends HTTP callers to the node that owns
//!   the device named in their request
//!
//! # Usage
//!
//! ```text
//! wrp-gateway [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML configuration file
//!   --device-addr <ADDR>       device WebSocket listen address
//!   --redirect-addr <ADDR>     redirect HTTP listen address
//!   --node-url <URL>           node every key redirects to
//!   --redirect-status <CODE>   3xx status used for redirects
//! ```
//!
//! Flags override the file; the file overrides built-in defaults.  The log
//! level comes from `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wrp_core::{describe, Codec, Message};
use wrp_device::domain::{random_key_func, MessageListener};
use wrp_device::{run_server, Device, DeviceOptions, Manager};
use wrp_gateway::config::{load_config, ConfigError, GatewayConfig};
use wrp_gateway::service::{header_key, FixedNode, RedirectHandler};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "wrp-gateway",
    about = "WRP device gateway: device WebSocket sessions plus key-based redirects",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "WRP_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address the device WebSocket listener binds to.
    #[arg(long, env = "WRP_DEVICE_ADDR")]
    device_addr: Option<String>,

    /// Address the redirect HTTP listener binds to.
    #[arg(long, env = "WRP_REDIRECT_ADDR")]
    redirect_addr: Option<String>,

    /// Base URL every routing key resolves to.
    #[arg(long, env = "WRP_NODE_URL")]
    node_url: Option<String>,

    /// Redirect status code (3xx).
    #[arg(long, env = "WRP_REDIRECT_STATUS")]
    redirect_status: Option<u16>,
}

impl Cli {
    /// Overwrites file values with any flag that was given.
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(addr) = self.device_addr {
            config.device.address = addr;
        }
        if let Some(addr) = self.redirect_addr {
            config.redirect.address = addr;
        }
        if let Some(url) = self.node_url {
            config.redirect.node_url = url;
        }
        if let Some(status) = self.redirect_status {
            config.redirect.status = status;
        }
    }
}

/// Session options for the device listener.
///
/// Keys are per session, not per device name: the registry holds one session
/// per key, and a device whose old link died silently must be able to
/// reconnect while the stale session waits for its idle check.  Redirects
/// read the device name header directly, so they do not depend on the key.
fn device_options(config: &GatewayConfig) -> Result<DeviceOptions, ConfigError> {
    Ok(DeviceOptions {
        key_func: random_key_func(),
        message_listeners: vec![validating_listener()],
        ..config.device.to_options()?
    })
}

fn validating_listener() -> MessageListener {
    Arc::new(|device: &dyn Device, message: &Message| {
        if let Err(e) = message.valid() {
            warn!(key = %device.key(), message = %describe(Some(message)), "invalid message: {e}");
        }
    })
}

async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);

    let device_addr = config.device.socket_addr()?;
    let redirect_addr = config.redirect.socket_addr()?;
    let redirect_status = config.redirect.status_code()?;

    let options = device_options(&config)?;
    let manager = Manager::new(options, Codec::new(config.device.codec_config()))?;

    let redirect = RedirectHandler::new(
        Arc::new(FixedNode::new(config.redirect.node_url.clone())),
        redirect_status,
        header_key(config.redirect.key_header.clone()),
    );

    let device_listener = TcpListener::bind(device_addr)
        .await
        .with_context(|| format!("failed to bind device listener on {device_addr}"))?;
    let redirect_listener = TcpListener::bind(redirect_addr)
        .await
        .with_context(|| format!("failed to bind redirect listener on {redirect_addr}"))?;

    info!(
        "WRP gateway starting: devices={device_addr}, redirect={redirect_addr}, node={}",
        config.redirect.node_url
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let device_server = tokio::spawn(run_server(
        device_listener,
        manager.clone(),
        Arc::clone(&running),
    ));

    axum::serve(redirect_listener, redirect.into_router())
        .with_graceful_shutdown(wait_for_shutdown(Arc::clone(&running)))
        .await
        .context("redirect server failed")?;

    device_server.await.context("device accept loop panicked")?;

    let closing = manager.disconnect_if(|_| true);
    info!(sessions = closing, "WRP gateway stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

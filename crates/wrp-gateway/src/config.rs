//! TOML configuration for the gateway binary.
//!
//! ```toml
//! [device]
//! address = "0.0.0.0:8080"
//! idle_period_secs = 135
//! subprotocols = ["wrp-0.11"]
//!
//! [redirect]
//! address = "0.0.0.0:8081"
//! node_url = "http://node1.example.com:8080"
//! status = 307
//! ```
//!
//! Every field has a `#[serde(default = "...")]`, so an empty file (or no file
//! at all) yields a working configuration.  Command-line flags are applied on
//! top in `main.rs`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wrp_core::protocol::DEFAULT_MAX_MESSAGE_SIZE;
use wrp_core::CodecConfig;
use wrp_device::domain::config as device_defaults;
use wrp_device::{DeviceOptions, OptionsError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid socket address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{0} is not a redirect status code")]
    InvalidStatus(u16),

    #[error("invalid [device] settings: {0}")]
    InvalidDevice(#[from] OptionsError),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
}

/// The `[device]` section.  Mirrors the scalar fields of [`DeviceOptions`];
/// durations are whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_device_address")]
    pub address: String,
    #[serde(default = "default_device_name_header")]
    pub device_name_header: String,
    #[serde(default = "default_convey_header")]
    pub convey_header: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    #[serde(default = "default_idle_period_secs")]
    pub idle_period_secs: u64,
    #[serde(default = "default_ping_period_secs")]
    pub ping_period_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
    #[serde(default)]
    pub subprotocols: Vec<String>,
    #[serde(default = "default_message_queue_size")]
    pub message_queue_size: usize,
    /// Largest encoded WRP message accepted or sent.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// The `[redirect]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedirectConfig {
    #[serde(default = "default_redirect_address")]
    pub address: String,
    /// Node every key resolves to.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    #[serde(default = "default_redirect_status")]
    pub status: u16,
    /// Header the routing key is read from.
    #[serde(default = "default_device_name_header")]
    pub key_header: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_redirect_address() -> String {
    "0.0.0.0:8081".to_string()
}
fn default_node_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_redirect_status() -> u16 {
    StatusCode::TEMPORARY_REDIRECT.as_u16()
}
fn default_device_name_header() -> String {
    device_defaults::DEFAULT_DEVICE_NAME_HEADER.to_string()
}
fn default_convey_header() -> String {
    device_defaults::DEFAULT_CONVEY_HEADER.to_string()
}
fn default_handshake_timeout_secs() -> u64 {
    device_defaults::DEFAULT_HANDSHAKE_TIMEOUT.as_secs()
}
fn default_initial_capacity() -> usize {
    device_defaults::DEFAULT_INITIAL_CAPACITY
}
fn default_idle_period_secs() -> u64 {
    device_defaults::DEFAULT_IDLE_PERIOD.as_secs()
}
fn default_ping_period_secs() -> u64 {
    device_defaults::DEFAULT_PING_PERIOD.as_secs()
}
fn default_write_timeout_secs() -> u64 {
    device_defaults::DEFAULT_WRITE_TIMEOUT.as_secs()
}
fn default_read_buffer_size() -> usize {
    device_defaults::DEFAULT_READ_BUFFER_SIZE
}
fn default_write_buffer_size() -> usize {
    device_defaults::DEFAULT_WRITE_BUFFER_SIZE
}
fn default_message_queue_size() -> usize {
    device_defaults::DEFAULT_MESSAGE_QUEUE_SIZE
}
fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_device_address(),
            device_name_header: default_device_name_header(),
            convey_header: default_convey_header(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            initial_capacity: default_initial_capacity(),
            idle_period_secs: default_idle_period_secs(),
            ping_period_secs: default_ping_period_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            read_buffer_size: default_read_buffer_size(),
            write_buffer_size: default_write_buffer_size(),
            subprotocols: Vec::new(),
            message_queue_size: default_message_queue_size(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            address: default_redirect_address(),
            node_url: default_node_url(),
            status: default_redirect_status(),
            key_header: default_device_name_header(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl DeviceConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.address)
    }

    /// Session options with every scalar taken from this section.  Key
    /// function, span and listeners keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDevice`] for a zero period, timeout, buffer or
    /// queue size, or a ping period not shorter than the idle period.
    pub fn to_options(&self) -> Result<DeviceOptions, ConfigError> {
        let options = DeviceOptions {
            device_name_header: self.device_name_header.clone(),
            convey_header: self.convey_header.clone(),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            initial_capacity: self.initial_capacity,
            idle_period: Duration::from_secs(self.idle_period_secs),
            ping_period: Duration::from_secs(self.ping_period_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            read_buffer_size: self.read_buffer_size,
            write_buffer_size: self.write_buffer_size,
            subprotocols: self.subprotocols.clone(),
            message_queue_size: self.message_queue_size,
            ..DeviceOptions::default()
        };
        options.validate()?;
        Ok(options)
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            max_message_size: self.max_message_size,
        }
    }
}

impl RedirectConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.address)
    }

    /// The configured status, which must be a 3xx code.
    pub fn status_code(&self) -> Result<StatusCode, ConfigError> {
        StatusCode::from_u16(self.status)
            .ok()
            .filter(StatusCode::is_redirection)
            .ok_or(ConfigError::InvalidStatus(self.status))
    }
}

fn parse_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|source| ConfigError::InvalidAddress {
        value: value.to_string(),
        source,
    })
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads the configuration at `path`, or the defaults when no path is given.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(GatewayConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

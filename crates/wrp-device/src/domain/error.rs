//! Error types for session and registry operations.
//!
//! Handshake failures live next to the handshake code in
//! `infrastructure::handshake`, because they wrap transport errors.

use thiserror::Error;

use crate::domain::identity::{Key, ID};

/// Errors surfaced synchronously by [`crate::domain::Device::send`] and by
/// the manager's routing helpers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The outbound queue is at capacity.  Nothing was enqueued.
    #[error("outbound queue for device key {key} is full ({capacity} messages)")]
    QueueFull { key: Key, capacity: usize },

    /// The session is not open.
    #[error("device session {key} is closed")]
    Closed { key: Key },

    /// No open session has this ID.
    #[error("no device connected with id {0}")]
    NotFound(ID),
}

/// Errors reported by [`crate::application::Registry::add`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Another session already holds this routing key.
    #[error("a session with key {0} is already registered")]
    DuplicateKey(Key),

    /// Only open sessions may be registered.
    #[error("session {0} is not open")]
    NotOpen(Key),
}

/// Reported by [`crate::domain::DeviceOptions::validate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The keepalive could not notice an idle device within its window.
    #[error("ping_period ({ping:?}) must be shorter than idle_period ({idle:?})")]
    PingNotBelowIdle {
        ping: std::time::Duration,
        idle: std::time::Duration,
    },
}

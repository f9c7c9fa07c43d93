//! Domain layer for wrp-device.
//!
//! Plain types that describe a device session without performing any I/O:
//! identities, lifecycle state, configuration, the [`Device`] abstraction the
//! observers see, and the synchronous error types.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio` task, channel or socket
//! - WebSocket framing
//! - Anything that could block
//!
//! `config` does name the upgrade request type, since key functions are
//! defined over it; that is an HTTP type, not a transport.

pub mod config;
pub mod device;
pub mod error;
pub mod identity;
pub mod state;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::DeviceOptions` instead of the longer path.
pub use config::{random_key_func, DeviceOptions, KeyFunc};
pub use device::{ConnectListener, Device, DisconnectListener, MessageListener, PongListener};
pub use error::{DeviceError, OptionsError, RegistryError};
pub use identity::{Convey, Key, ID};
pub use state::{SessionState, StateCell};

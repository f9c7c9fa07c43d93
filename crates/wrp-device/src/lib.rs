//! wrp-device library crate.
//!
//! Accepts long-lived WebSocket sessions from devices, carries WRP messages
//! over them, tells observers about traffic and lifecycle events, and keeps a
//! registry of who is connected.
//!
//! # Architecture
//!
//! ```text
//! Device (WRP over binary WebSocket frames)
//!         ↕
//! [wrp-device]
//!   ├── domain/           ID/Key/Convey, DeviceOptions, Device trait, errors, state
//!   ├── application/      Session state machine, Registry, listener combinators
//!   └── infrastructure/
//!         ├── handshake   upgrade + identity capture (tokio-tungstenite)
//!         ├── connection  reader / writer / keepalive tasks
//!         ├── manager     connect, disconnect, send by ID
//!         └── ws_server   TCP accept loop
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O and spawns nothing.
//! - `application` depends on `domain` and `wrp-core`; it uses tokio channels
//!   but never a socket.
//! - `infrastructure` depends on all other layers plus `tokio-tungstenite`.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Registry, Session};
pub use domain::{Convey, Device, DeviceError, DeviceOptions, Key, OptionsError, ID};
pub use infrastructure::{run_server, HandshakeError, Manager};

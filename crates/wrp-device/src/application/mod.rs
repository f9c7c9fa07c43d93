//! Application layer for wrp-device.
//!
//! The session state machine, the registry of active sessions, and the
//! listener combinators.  Nothing here opens a socket; the infrastructure
//! layer feeds frames in and drains messages out.

pub mod listeners;
pub mod registry;
pub mod session;

pub use listeners::{
    connect_listeners, disconnect_listeners, message_listeners, pong_listeners, Listeners,
};
pub use registry::Registry;
pub use session::Session;

//! Infrastructure layer for wrp-device.
//!
//! Everything that touches a socket: the WebSocket upgrade, the per-session
//! reader/writer/keepalive tasks, the [`Manager`] that ties them to the
//! registry, and the TCP accept loop.

pub mod connection;
pub mod handshake;
pub mod manager;
pub mod ws_server;

pub use handshake::HandshakeError;
pub use manager::Manager;
pub use ws_server::run_server;

//! Device WebSocket server: the accept loop.
//!
//! Each accepted TCP connection is handed to [`Manager::connect`] on its own
//! Tokio task, so a slow handshake never delays the next accept.  Once
//! connected, the session runs on the tasks the manager starts; this loop
//! keeps no per-session state.
//!
//! Shutdown is cooperative: the loop polls a shared `AtomicBool` between
//! accepts.  The flag is cleared by the binary's Ctrl+C handler.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::infrastructure::handshake::HandshakeError;
use crate::infrastructure::manager::Manager;

/// How long `accept` may block before the `running` flag is checked again.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Accepts device connections on `listener` until `running` is cleared.
///
/// Sessions that are already open keep running after the loop returns; use
/// [`Manager::disconnect_if`] to close them.
pub async fn run_server(listener: TcpListener, manager: Manager, running: Arc<AtomicBool>) {
    match listener.local_addr() {
        Ok(addr) => info!("device listener accepting on {addr}"),
        Err(e) => warn!("device listener has no local address: {e}"),
    }

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping device accept loop");
            break;
        }

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new device connection from {peer_addr}");
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("could not set TCP_NODELAY for {peer_addr}: {e}");
                }

                let manager = manager.clone();
                tokio::spawn(async move {
                    match manager.connect(stream).await {
                        Ok(_) => {}
                        Err(HandshakeError::Rejected(reason)) => {
                            info!("rejected device {peer_addr}: {reason}");
                        }
                        Err(e) => warn!("device {peer_addr} failed to connect: {e}"),
                    }
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. out of file descriptors); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

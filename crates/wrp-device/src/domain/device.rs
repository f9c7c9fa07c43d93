//! The device abstraction seen by observers, and the observer callback types.
//!
//! Listeners never receive the concrete session type.  They get a
//! `&dyn Device`, which keeps them decoupled from the transport and lets tests
//! drive them with a plain in-memory fake.

use std::sync::Arc;
use std::time::SystemTime;

use wrp_core::Message;

use crate::domain::error::DeviceError;
use crate::domain::identity::{Convey, Key, ID};

/// A connected device as far as application code is concerned.
pub trait Device: Send + Sync {
    fn id(&self) -> &ID;

    fn key(&self) -> &Key;

    fn convey(&self) -> &Convey;

    /// Wall-clock time the session was created.
    fn connected_at(&self) -> SystemTime;

    /// Asks the session to close.  Idempotent; returns immediately.
    fn request_close(&self);

    /// Whether the session has reached its terminal state.
    fn closed(&self) -> bool;

    /// Queues a message for delivery to the device without blocking.
    ///
    /// # Errors
    ///
    /// [`DeviceError::QueueFull`] when the outbound queue is at capacity,
    /// [`DeviceError::Closed`] when the session is no longer open.
    fn send(&self, message: Message) -> Result<(), DeviceError>;
}

/// Called once per inbound application message.
pub type MessageListener = Arc<dyn Fn(&dyn Device, &Message) + Send + Sync>;

/// Called once when a session has been registered.
pub type ConnectListener = Arc<dyn Fn(&dyn Device) + Send + Sync>;

/// Called once when a session has been closed and unregistered.
pub type DisconnectListener = Arc<dyn Fn(&dyn Device) + Send + Sync>;

/// Called once per inbound pong frame, with the pong payload.
pub type PongListener = Arc<dyn Fn(&dyn Device, &[u8]) + Send + Sync>;

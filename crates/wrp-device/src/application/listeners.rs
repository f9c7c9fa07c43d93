//! Listener combinators.
//!
//! Each function here folds an ordered list of callbacks into one callback
//! with the same signature.  Calling the aggregate calls every constituent
//! exactly once, in list order, with the same arguments, before returning.
//! An empty list folds to a no-op, so an absent list (`None.into_iter().flatten()`)
//! and an empty `Vec` behave the same.
//!
//! A constituent that panics unwinds out of the aggregate and the remaining
//! constituents are skipped for that call.  The session layer catches the
//! unwind at its boundary (see [`Listeners`]) so one bad observer cannot take
//! down a session task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;
use wrp_core::Message;

use crate::domain::device::{
    ConnectListener, Device, DisconnectListener, MessageListener, PongListener,
};
use crate::domain::DeviceOptions;

/// Combines message listeners into one.
pub fn message_listeners<I>(listeners: I) -> MessageListener
where
    I: IntoIterator<Item = MessageListener>,
{
    let mut listeners: Vec<MessageListener> = listeners.into_iter().collect();
    match listeners.len() {
        0 => Arc::new(|_: &dyn Device, _: &Message| {}),
        1 => listeners.remove(0),
        _ => Arc::new(move |device: &dyn Device, message: &Message| {
            for listener in &listeners {
                listener(device, message);
            }
        }),
    }
}

/// Combines connect listeners into one.
pub fn connect_listeners<I>(listeners: I) -> ConnectListener
where
    I: IntoIterator<Item = ConnectListener>,
{
    let mut listeners: Vec<ConnectListener> = listeners.into_iter().collect();
    match listeners.len() {
        0 => Arc::new(|_: &dyn Device| {}),
        1 => listeners.remove(0),
        _ => Arc::new(move |device: &dyn Device| {
            for listener in &listeners {
                listener(device);
            }
        }),
    }
}

/// Combines disconnect listeners into one.
pub fn disconnect_listeners<I>(listeners: I) -> DisconnectListener
where
    I: IntoIterator<Item = DisconnectListener>,
{
    connect_listeners(listeners)
}

/// Combines pong listeners into one.
pub fn pong_listeners<I>(listeners: I) -> PongListener
where
    I: IntoIterator<Item = PongListener>,
{
    let mut listeners: Vec<PongListener> = listeners.into_iter().collect();
    match listeners.len() {
        0 => Arc::new(|_: &dyn Device, _: &[u8]| {}),
        1 => listeners.remove(0),
        _ => Arc::new(move |device: &dyn Device, data: &[u8]| {
            for listener in &listeners {
                listener(device, data);
            }
        }),
    }
}

/// The four aggregates, built once from [`DeviceOptions`].
///
/// The `on_*` methods are what session tasks call.  They contain a panicking
/// observer so the calling task keeps running.
#[derive(Clone)]
pub struct Listeners {
    pub message: MessageListener,
    pub connect: ConnectListener,
    pub disconnect: DisconnectListener,
    pub pong: PongListener,
}

impl Listeners {
    pub fn from_options(options: &DeviceOptions) -> Self {
        Self {
            message: message_listeners(options.message_listeners.iter().cloned()),
            connect: connect_listeners(options.connect_listeners.iter().cloned()),
            disconnect: disconnect_listeners(options.disconnect_listeners.iter().cloned()),
            pong: pong_listeners(options.pong_listeners.iter().cloned()),
        }
    }

    pub fn on_message(&self, device: &dyn Device, message: &Message) {
        guarded("message", || (self.message)(device, message));
    }

    pub fn on_connect(&self, device: &dyn Device) {
        guarded("connect", || (self.connect)(device));
    }

    pub fn on_disconnect(&self, device: &dyn Device) {
        guarded("disconnect", || (self.disconnect)(device));
    }

    pub fn on_pong(&self, device: &dyn Device, data: &[u8]) {
        guarded("pong", || (self.pong)(device, data));
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::from_options(&DeviceOptions::default())
    }
}

fn guarded(kind: &'static str, dispatch: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(dispatch)).is_err() {
        error!(kind, "listener panicked; remaining listeners for this event were skipped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

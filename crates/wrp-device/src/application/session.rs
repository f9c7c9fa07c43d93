//! One device session: identity, lifecycle state, outbound queue, and the
//! close signal shared by its tasks.
//!
//! A `Session` owns no I/O.  The infrastructure layer drives it: the writer
//! task drains the receiver half returned by [`Session::new`], the reader and
//! keepalive tasks call [`Session::touch`] and [`Session::idle_for`], and every
//! task watches [`Session::closing_signal`].

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;
use wrp_core::Message;

use crate::domain::{Convey, Device, DeviceError, Key, SessionState, StateCell, ID};

pub struct Session {
    id: ID,
    key: Key,
    convey: Convey,
    connected_at: SystemTime,
    state: StateCell,
    outbound: mpsc::Sender<Message>,
    queue_capacity: usize,
    closing: watch::Sender<bool>,
    last_activity: Mutex<Instant>,
}

impl Session {
    /// Creates a session in `Connecting` with an outbound queue of
    /// `queue_size` messages.  The returned receiver belongs to the writer.
    ///
    /// # Panics
    ///
    /// If `queue_size` is zero.  [`DeviceOptions::validate`] rejects that
    /// before any session is built.
    ///
    /// [`DeviceOptions::validate`]: crate::domain::DeviceOptions::validate
    pub fn new(
        id: ID,
        key: Key,
        convey: Convey,
        queue_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(queue_size);
        let (closing, _) = watch::channel(false);

        let session = Arc::new(Self {
            id,
            key,
            convey,
            connected_at: SystemTime::now(),
            state: StateCell::new(),
            outbound,
            queue_capacity: queue_size,
            closing,
            last_activity: Mutex::new(Instant::now()),
        });
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// `Connecting` → `Open`.  `false` if a close already won the race.
    pub(crate) fn mark_open(&self) -> bool {
        self.state.open()
    }

    /// Enters the terminal state.  `true` for the first caller only.
    pub(crate) fn mark_closed(&self) -> bool {
        // A close that bypassed request_close still has to wake the tasks.
        self.closing.send_replace(true);
        self.state.finish()
    }

    /// A receiver that flips to `true` once the session starts closing.
    pub fn closing_signal(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    /// Records inbound traffic.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Device for Session {
    fn id(&self) -> &ID {
        &self.id
    }

    fn key(&self) -> &Key {
        &self.key
    }

    fn convey(&self) -> &Convey {
        &self.convey
    }

    fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    fn request_close(&self) {
        if self.state.begin_closing() {
            debug!(key = %self.key, id = %self.id, "close requested");
            self.closing.send_replace(true);
        }
    }

    fn closed(&self) -> bool {
        self.state.get() == SessionState::Closed
    }

    fn send(&self, message: Message) -> Result<(), DeviceError> {
        if self.state.get() != SessionState::Open {
            return Err(DeviceError::Closed {
                key: self.key.clone(),
            });
        }

        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeviceError::QueueFull {
                key: self.key.clone(),
                capacity: self.queue_capacity,
            },
            mpsc::error::TrySendError::Closed(_) => DeviceError::Closed {
                key: self.key.clone(),
            },
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

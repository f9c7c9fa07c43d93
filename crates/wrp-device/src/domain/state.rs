//! Session lifecycle state.
//!
//! ```text
//! Connecting ──► Open ──► Closing ──► Closed
//! ```
//!
//! The machine is linear; `Closed` is terminal.  [`StateCell`] stores the state
//! in one atomic byte so any task can read it without locking and so the
//! transition into `Closing` happens exactly once no matter how many
//! triggers race for it.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of one device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake in progress; not yet registered.
    Connecting = 0,
    /// Registered and exchanging messages.
    Open = 1,
    /// Close requested; tasks are winding down.
    Closing = 2,
    /// Transport closed and session unregistered.
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Atomic holder for a [`SessionState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Connecting as u8))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `Connecting` to `Open`.  Returns `false` if the session had
    /// already left `Connecting` (e.g. a close was requested mid-handshake).
    pub fn open(&self) -> bool {
        self.0
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves any earlier state to `Closing`.  Returns `true` only for the one
    /// caller that performed the transition.
    pub fn begin_closing(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < SessionState::Closing as u8).then_some(SessionState::Closing as u8)
            })
            .is_ok()
    }

    /// Marks the terminal state.  Returns `true` the first time only.
    pub fn finish(&self) -> bool {
        self.0.swap(SessionState::Closed as u8, Ordering::AcqRel) != SessionState::Closed as u8
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_cell_is_connecting() {
        assert_eq!(StateCell::new().get(), SessionState::Connecting);
    }

    #[test]
    fn test_linear_progression() {
        let cell = StateCell::new();
        assert!(cell.open());
        assert_eq!(cell.get(), SessionState::Open);
        assert!(cell.begin_closing());
        assert_eq!(cell.get(), SessionState::Closing);
        assert!(cell.finish());
        assert_eq!(cell.get(), SessionState::Closed);
    }

    #[test]
    fn test_cannot_reopen_after_closing() {
        let cell = StateCell::new();
        assert!(cell.begin_closing());
        assert!(!cell.open());
        assert_eq!(cell.get(), SessionState::Closing);
    }

    #[test]
    fn test_closing_and_finish_are_once_only() {
        let cell = StateCell::new();
        cell.open();
        assert!(cell.begin_closing());
        assert!(!cell.begin_closing());
        assert!(cell.finish());
        assert!(!cell.finish());
        assert!(!cell.begin_closing());
    }

    #[test]
    fn test_concurrent_close_has_exactly_one_winner() {
        let cell = Arc::new(StateCell::new());
        cell.open();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || cell.begin_closing())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}

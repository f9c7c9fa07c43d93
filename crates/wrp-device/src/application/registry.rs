//! The registry of active sessions.
//!
//! Two indices over the same set of sessions:
//!
//! - by [`Key`]: one-to-one, the routing index
//! - by [`ID`]: one-to-many, since a reconnecting device can briefly hold two
//!
//! Both indices live behind a single `parking_lot::RwLock` so they can never
//! disagree.  Lookups take the read lock; `add` and `remove` take the write
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::application::session::Session;
use crate::domain::{Device, Key, RegistryError, SessionState, ID};

#[derive(Default)]
struct Indices {
    by_key: HashMap<Key, Arc<Session>>,
    by_id: HashMap<ID, Vec<Arc<Session>>>,
}

#[derive(Default)]
pub struct Registry {
    inner: RwLock<Indices>,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Indices {
                by_key: HashMap::with_capacity(capacity),
                by_id: HashMap::with_capacity(capacity),
            }),
        }
    }

    /// Registers a session under both indices.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotOpen`] unless the session is `Open` or `Closing`
    /// - [`RegistryError::DuplicateKey`] if another session holds the key
    pub fn add(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        if !matches!(session.state(), SessionState::Open | SessionState::Closing) {
            return Err(RegistryError::NotOpen(session.key().clone()));
        }

        let mut indices = self.inner.write();
        if indices.by_key.contains_key(session.key()) {
            return Err(RegistryError::DuplicateKey(session.key().clone()));
        }

        indices
            .by_id
            .entry(session.id().clone())
            .or_default()
            .push(Arc::clone(&session));
        indices.by_key.insert(session.key().clone(), session);
        Ok(())
    }

    /// Unregisters exactly this session.  Returns `false` if it was not
    /// registered, including when a different session now holds its key.
    pub fn remove(&self, session: &Arc<Session>) -> bool {
        let mut indices = self.inner.write();

        let owns_key = indices
            .by_key
            .get(session.key())
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if !owns_key {
            return false;
        }
        indices.by_key.remove(session.key());

        if let Some(sessions) = indices.by_id.get_mut(session.id()) {
            sessions.retain(|s| !Arc::ptr_eq(s, session));
            if sessions.is_empty() {
                indices.by_id.remove(session.id());
            }
        }
        true
    }

    pub fn get_by_id(&self, id: &ID) -> Vec<Arc<Session>> {
        self.inner.read().by_id.get(id).cloned().unwrap_or_default()
    }

    pub fn get_by_key(&self, key: &Key) -> Option<Arc<Session>> {
        self.inner.read().by_key.get(key).cloned()
    }

    /// Calls `visitor` once for each session registered at the moment of the
    /// call and returns how many were visited.
    ///
    /// The lock is released before the first visit, so the visitor may call
    /// back into the registry.
    pub fn visit<F>(&self, mut visitor: F) -> usize
    where
        F: FnMut(&Arc<Session>),
    {
        let snapshot: Vec<Arc<Session>> = self.inner.read().by_key.values().cloned().collect();
        for session in &snapshot {
            visitor(session);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_key.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Convey;

    fn open(id: &str, key: &str) -> Arc<Session> {
        let (session, _rx) = Session::new(ID::from(id), Key::from(key), Convey::none(), 4);
        assert!(session.mark_open());
        session
    }

    #[test]
    fn test_add_indexes_by_key_and_id() {
        let registry = Registry::with_capacity(8);
        let a = open("mac:1", "k1");
        let b = open("mac:1", "k2");

        registry.add(Arc::clone(&a)).unwrap();
        registry.add(Arc::clone(&b)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get_by_key(&Key::from("k1")).unwrap(), &a));
        assert_eq!(registry.get_by_id(&ID::from("mac:1")).len(), 2);
        assert!(registry.get_by_id(&ID::from("mac:2")).is_empty());
    }

    #[test]
    fn test_duplicate_key_is_rejected_and_original_kept() {
        let registry = Registry::default();
        let first = open("mac:1", "shared");
        let second = open("mac:2", "shared");

        registry.add(Arc::clone(&first)).unwrap();
        let err = registry.add(second).unwrap_err();

        assert_eq!(err, RegistryError::DuplicateKey(Key::from("shared")));
        assert!(Arc::ptr_eq(&registry.get_by_key(&Key::from("shared")).unwrap(), &first));
        assert!(registry.get_by_id(&ID::from("mac:2")).is_empty());
    }

    #[test]
    fn test_connecting_and_closed_sessions_are_rejected() {
        let registry = Registry::default();
        let (connecting, _rx) = Session::new(ID::from("a"), Key::from("k"), Convey::none(), 1);
        assert_eq!(
            registry.add(Arc::clone(&connecting)),
            Err(RegistryError::NotOpen(Key::from("k")))
        );

        connecting.mark_closed();
        assert!(registry.add(connecting).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_closing_session_is_accepted() {
        let registry = Registry::default();
        let session = open("a", "k");
        session.request_close();
        assert!(registry.add(session).is_ok());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::default();
        let session = open("mac:1", "k1");
        registry.add(Arc::clone(&session)).unwrap();

        assert!(registry.remove(&session));
        assert!(!registry.remove(&session));
        assert!(registry.is_empty());
        assert!(registry.get_by_id(&ID::from("mac:1")).is_empty());
    }

    #[test]
    fn test_stale_session_does_not_evict_newer_holder_of_key() {
        let registry = Registry::default();
        let stale = open("mac:1", "k1");
        registry.add(Arc::clone(&stale)).unwrap();
        registry.remove(&stale);

        let fresh = open("mac:1", "k1");
        registry.add(Arc::clone(&fresh)).unwrap();

        assert!(!registry.remove(&stale));
        assert!(Arc::ptr_eq(&registry.get_by_key(&Key::from("k1")).unwrap(), &fresh));
        assert_eq!(registry.get_by_id(&ID::from("mac:1")).len(), 1);
    }

    #[test]
    fn test_remove_keeps_other_sessions_with_same_id() {
        let registry = Registry::default();
        let a = open("mac:1", "k1");
        let b = open("mac:1", "k2");
        registry.add(Arc::clone(&a)).unwrap();
        registry.add(Arc::clone(&b)).unwrap();

        registry.remove(&a);

        let remaining = registry.get_by_id(&ID::from("mac:1"));
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &b));
    }

    #[test]
    fn test_visit_sees_each_session_once_and_may_reenter() {
        let registry = Registry::default();
        for n in 0..5 {
            registry.add(open(&format!("mac:{n}"), &format!("k{n}"))).unwrap();
        }

        let mut seen = Vec::new();
        let visited = registry.visit(|session| {
            seen.push(session.key().clone());
            // Re-entering must not deadlock.
            registry.remove(session);
        });

        seen.sort();
        seen.dedup();
        assert_eq!(visited, 5);
        assert_eq!(seen.len(), 5);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_adds_with_distinct_keys() {
        let registry = Arc::new(Registry::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        registry.add(open("mac:shared", &format!("{t}-{n}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 400);
        assert_eq!(registry.get_by_id(&ID::from("mac:shared")).len(), 400);
    }

    #[test]
    fn test_visit_during_concurrent_add_and_remove() {
        let registry = Arc::new(Registry::default());
        let stable: Vec<_> = (0..20).map(|n| open("mac:stable", &format!("s{n}"))).collect();
        for session in &stable {
            registry.add(Arc::clone(session)).unwrap();
        }
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mutators: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut n = 0;
                    while !done.load(std::sync::atomic::Ordering::Relaxed) {
                        let session = open("mac:churn", &format!("c{t}-{n}"));
                        registry.add(Arc::clone(&session)).unwrap();
                        registry.remove(&session);
                        n += 1;
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let mut keys = Vec::new();
            let visited = registry.visit(|session| keys.push(session.key().clone()));
            assert_eq!(visited, keys.len());

            let total = keys.len();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), total, "a session was visited twice");
            for session in &stable {
                assert!(keys.contains(session.key()));
            }
        }

        done.store(true, std::sync::atomic::Ordering::Relaxed);
        for handle in mutators {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), stable.len());
    }
}

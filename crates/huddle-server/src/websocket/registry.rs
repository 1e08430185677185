//! Authoritative set of joined sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use huddle_core::errors::RelayError;
use huddle_core::events::PresenceEntry;
use huddle_core::ids::SessionId;
use metrics::gauge;
use parking_lot::RwLock;
use tracing::debug;

use super::session::Session;
use crate::metrics::SESSIONS_ACTIVE;

struct Entry {
    /// Insertion order, breaks ties between equal join times.
    seq: u64,
    session: Arc<Session>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Entry>,
    next_seq: u64,
}

/// Registry of sessions that have joined and not yet disconnected.
///
/// Every mutation and every read runs under one lock, so a snapshot never
/// observes a half-applied add or remove. Callers get owned copies and must
/// not hold anything across I/O.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    /// Mirrors `sessions.len()` so counting never takes the lock.
    active_count: AtomicUsize,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails if its ID is already present.
    pub fn add(&self, session: Arc<Session>) -> Result<(), RelayError> {
        let mut inner = self.inner.write();
        if inner.sessions.contains_key(&session.id) {
            return Err(RelayError::DuplicateSession {
                id: session.id.clone(),
            });
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = session.id.clone();
        let _ = inner.sessions.insert(id, Entry { seq, session });
        let count = self.active_count.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!(SESSIONS_ACTIVE).set(count as f64);
        debug!(count, "session registered");
        Ok(())
    }

    /// Remove a session, returning it if it was present.
    ///
    /// Removing an absent ID is a no-op. Exactly one of any number of racing
    /// callers gets `Some`, which makes it the one responsible for announcing
    /// the departure.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.inner.write().sessions.remove(id)?;
        let count = self.active_count.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!(SESSIONS_ACTIVE).set(count as f64);
        debug!(session_id = %id, count, "session unregistered");
        Some(removed.session)
    }

    /// Look up a session by ID.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.inner
            .read()
            .sessions
            .get(id)
            .map(|e| Arc::clone(&e.session))
    }

    /// Whether the ID is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    /// All sessions, ordered by join time then insertion order.
    ///
    /// Crate-internal: exposes outbound handles for fan-out.
    pub(crate) fn sessions(&self) -> Vec<Arc<Session>> {
        let mut entries: Vec<(u64, Arc<Session>)> = self
            .inner
            .read()
            .sessions
            .values()
            .map(|e| (e.seq, Arc::clone(&e.session)))
            .collect();
        entries.sort_by(|(a_seq, a), (b_seq, b)| {
            a.joined_at.cmp(&b.joined_at).then(a_seq.cmp(b_seq))
        });
        entries.into_iter().map(|(_, s)| s).collect()
    }

    /// Public view of every session, ordered by join time ascending.
    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        self.sessions().iter().map(|s| s.presence()).collect()
    }

    /// Number of registered sessions.
    pub fn count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

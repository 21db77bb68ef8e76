use crate::core::session::{SessionId, SocketSession};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Set of live sessions
///
/// A session is a member exactly while it is `Open` or `Closing`. Sessions
/// join from their open event and leave from their close (or failure)
/// event, both on network tasks, while shutdown iterates the set from the
/// host side, so every access goes through the lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SocketSession>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; no-op if it is already a member
    ///
    /// Returns whether membership changed.
    pub fn add(&self, session: Arc<SocketSession>) -> bool {
        self.add_with(session, || true)
    }

    /// Remove a session; no-op if it is absent
    ///
    /// Returns whether membership changed.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    /// Run `admit` under the write lock and add the session if it returns true
    ///
    /// Lets a session change state and membership in one step, so nobody
    /// can observe one without the other. Returns the result of `admit`;
    /// `admit` is not called if the session is already a member.
    pub fn add_with(&self, session: Arc<SocketSession>, admit: impl FnOnce() -> bool) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.id()) {
            return false;
        }
        if !admit() {
            return false;
        }

        debug!("Registered session {}", session.id());
        sessions.insert(session.id(), session);
        true
    }

    /// Run `evict` under the write lock and remove the session if it returns true
    ///
    /// Returns the result of `evict`. Removing an absent session is a no-op.
    pub fn remove_with(&self, id: SessionId, evict: impl FnOnce() -> bool) -> bool {
        let mut sessions = self.sessions.write();
        if !evict() {
            return false;
        }

        if sessions.remove(&id).is_some() {
            debug!("Unregistered session {}", id);
        }
        true
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Point-in-time copy of the members
    ///
    /// The lock is released before returning, so the set may change while
    /// the caller iterates the copy.
    pub fn snapshot(&self) -> Vec<Arc<SocketSession>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Ask every member to close gracefully
    ///
    /// Does not remove anything and does not wait: each session leaves the
    /// registry from its own close event. Returns the number of sessions
    /// that accepted the request; an empty registry touches no transport.
    pub fn close_all(&self) -> usize {
        let sessions = self.snapshot();
        if sessions.is_empty() {
            debug!("No open sessions to close");
            return 0;
        }

        let closed = sessions.iter().filter(|session| session.close()).count();
        info!("Requested close on {}/{} sessions", closed, sessions.len());
        closed
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ConnectionRegistry").field("sessions", &ids).finish()
    }
}

//! Lock-free session state and counters
//!
//! The state is read from the network task, the scheduler thread and the
//! shutdown path, so it lives in an `AtomicU8` instead of behind a lock.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Session lifecycle
///
/// ```text
/// Connecting ──> Open ──> Closing ──> Closed
///     │           │
///     └───────────┴──> Failed
/// ```
///
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
    Failed = 4,
}

impl SessionState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            2 => SessionState::Closing,
            3 => SessionState::Closed,
            _ => SessionState::Failed,
        }
    }

    /// No transition leaves this state
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// A session in this state must be a registry member
    #[inline]
    pub fn is_registered(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Closing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for a [`SessionState`]
#[derive(Debug)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Swap `current` for `new`; on mismatch returns the actual state
    pub fn compare_exchange(
        &self,
        current: SessionState,
        new: SessionState,
    ) -> Result<SessionState, SessionState> {
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(SessionState::from_u8)
            .map_err(SessionState::from_u8)
    }

    /// Move to `to` only from one of the `from` states
    ///
    /// Returns the state that was replaced, or the actual state when it
    /// is not in `from`.
    pub fn transition(
        &self,
        from: &[SessionState],
        to: SessionState,
    ) -> Result<SessionState, SessionState> {
        let mut current = self.get();
        loop {
            if !from.contains(&current) {
                return Err(current);
            }
            match self.compare_exchange(current, to) {
                Ok(previous) => return Ok(previous),
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == SessionState::Open
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.get().is_terminal()
    }
}

/// Point-in-time copy of a session's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub commands_dispatched: u64,
}

/// Per-session counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    commands_dispatched: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_dispatched(&self, count: u64) {
        self.commands_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn commands_dispatched(&self) -> u64 {
        self.commands_dispatched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SessionMetrics {
        SessionMetrics {
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received(),
            commands_dispatched: self.commands_dispatched(),
        }
    }
}

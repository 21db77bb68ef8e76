//! # WsBridge Core
//!
//! The connection lifecycle and dispatch engine:
//!
//! - **spec**: Validated endpoint description
//! - **session**: Per-connection state machine
//! - **client**: Network driver feeding transport events into a session
//! - **dispatcher**: Template substitution and hand-off to the command sink
//! - **scheduler**: Cooperative single-threaded context, plus a manual fake for tests
//! - **session_state**: Atomic state and counters

pub mod client;
pub mod dispatcher;
pub mod scheduler;
pub mod session;
pub mod session_state;
pub mod spec;

// Re-export main types
pub use client::run_session;
pub use dispatcher::{render, CommandDispatcher, MESSAGE_TOKEN};
pub use scheduler::{CooperativeScheduler, ManualScheduler};
pub use session::{ConnectionHandle, Outbound, SessionId, SocketSession};
pub use session_state::{AtomicMetrics, AtomicSessionState, SessionMetrics, SessionState};
pub use spec::ConnectionSpec;

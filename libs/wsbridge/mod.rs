//! # WsBridge
//!
//! Bridges persistent WebSocket connections to a command-execution sink.
//!
//! ## Features
//!
//! - **Per-endpoint sessions**: Each configured endpoint gets its own session
//!   with an explicit state machine (Connecting → Open → Closing → Closed, or Failed)
//! - **Connect bursts and keep-alives**: Messages sent once on open, then a periodic payload
//! - **Command templates**: Every inbound text message is substituted into templates
//!   and handed to a [`CommandSink`]
//! - **Single-writer dispatch**: All sends and dispatches are marshalled onto one
//!   cooperative scheduler thread, never run on the network tasks
//! - **Graceful shutdown**: One call closes every open session with code 1000
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsbridge::{Bridge, BridgeConfig, CooperativeScheduler, StdoutSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::load("wsstocommand/config.yaml")?;
//!     let scheduler = Arc::new(CooperativeScheduler::start("bridge-host")?);
//!     let bridge = Bridge::new(scheduler.clone(), Arc::new(StdoutSink));
//!
//!     bridge.connect_all(config.endpoints);
//!     tokio::signal::ctrl_c().await?;
//!
//!     bridge.shutdown();
//!     scheduler.shutdown();
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;
pub mod config;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use core::{
    client, dispatcher, scheduler, session, session_state, spec,
    client::run_session,
    dispatcher::{render, CommandDispatcher, MESSAGE_TOKEN},
    scheduler::{CooperativeScheduler, ManualScheduler},
    session::{ConnectionHandle, Outbound, SessionId, SocketSession, SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON},
    session_state::{AtomicMetrics, AtomicSessionState, SessionMetrics, SessionState},
    spec::{ticks_to_duration, ConnectionSpec, MILLIS_PER_TICK, TICKS_PER_SECOND},
};

// Re-export manager
pub use manager::{Bridge, ConnectionRegistry};

// Re-export configuration
pub use config::{BridgeConfig, ConfigError, DEFAULT_CONFIG};

/// Type alias for Result with BridgeError
pub type Result<T> = std::result::Result<T, traits::BridgeError>;

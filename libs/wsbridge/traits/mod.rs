//! # WsBridge Traits
//!
//! The seams between the bridge and its host:
//!
//! - **Scheduler**: Run work on the host's cooperative execution context
//! - **CommandSink**: Receive every rendered command string
//! - **BridgeError**: Error kinds surfaced by sessions and configuration

pub mod error;
pub mod scheduler;
pub mod sink;

// Re-export commonly used types
pub use error::{BridgeError, Result};
pub use scheduler::{PeriodicHandle, PeriodicTask, Scheduler, Task};
pub use sink::{CommandSink, LogSink, StdoutSink};

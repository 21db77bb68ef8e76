//! # WsBridge Manager
//!
//! Supervision of every session: the live-session registry and the bridge
//! that starts sessions and shuts them down together.

pub mod bridge;
pub mod registry;

pub use bridge::Bridge;
pub use registry::ConnectionRegistry;

//! WebSocket to command bridge - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for the executable (config path, logging, banners)
//! - **wsbridge**: Session, scheduler and registry library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use wss_to_command::bin_common::{load_config_from_env, ConfigType};
//! use wss_to_command::wsbridge::BridgeConfig;
//! ```

// Re-export workspace libraries for convenience
pub use wsbridge;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{init_tracing, RunConfig};
}

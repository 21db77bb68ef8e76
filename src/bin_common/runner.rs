//! Binary runner utilities
//!
//! Logging setup and the startup/shutdown banners shared by executables.

use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber
///
/// Honors `RUST_LOG` (default `info`). Output goes to stderr; stdout is
/// left to the command sink.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();
}

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Time given to close frames to flush at shutdown
    pub grace_period: Duration,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grace_period: Duration::from_millis(500),
        }
    }

    /// Set the shutdown grace period
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Print startup banner
    pub fn print_banner(&self) {
        info!("");
        info!("========================================");
        info!("Starting {}", self.name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    /// Print shutdown banner
    pub fn print_shutdown(&self, stats: Option<&str>) {
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", self.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("test-binary").with_grace_period(Duration::from_secs(2));

        assert_eq!(config.name, "test-binary");
        assert_eq!(config.grace_period, Duration::from_secs(2));
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::new("default");
        assert_eq!(config.grace_period, Duration::from_millis(500));
    }
}

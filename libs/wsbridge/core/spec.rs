use crate::traits::{BridgeError, Result};
use std::time::Duration;

/// Host tick rate
pub const TICKS_PER_SECOND: u64 = 20;

/// Length of one host tick in milliseconds
pub const MILLIS_PER_TICK: u64 = 1000 / TICKS_PER_SECOND;

/// Convert host ticks into wall-clock time
#[inline]
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(MILLIS_PER_TICK))
}

/// Validated, immutable description of one endpoint's behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    host: String,
    port: String,
    periodic_message: String,
    loop_interval_ticks: u64,
    on_connect_messages: Vec<String>,
    command_templates: Vec<String>,
}

impl ConnectionSpec {
    /// Validate and build a spec
    ///
    /// # Errors
    /// `BridgeError::ConfigInvalid` if `host` is blank, `port` is not a
    /// number in 0..=65535, or `loop_interval_ticks` is zero.
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        periodic_message: impl Into<String>,
        loop_interval_ticks: u64,
        on_connect_messages: Vec<String>,
        command_templates: Vec<String>,
    ) -> Result<Self> {
        let host = host.into();
        let port = port.into();

        if host.trim().is_empty() {
            return Err(BridgeError::ConfigInvalid("host must not be empty".to_string()));
        }

        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) || port.parse::<u16>().is_err() {
            return Err(BridgeError::ConfigInvalid(format!(
                "port '{}' is not a valid port number",
                port
            )));
        }

        if loop_interval_ticks == 0 {
            return Err(BridgeError::ConfigInvalid(
                "loop interval must be greater than 0 ticks".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            periodic_message: periodic_message.into(),
            loop_interval_ticks,
            on_connect_messages,
            command_templates,
        })
    }

    /// Dial target: `host` and `port` concatenated with no separator
    ///
    /// The host carries its own delimiter, e.g. `ws://localhost:`.
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.port)
    }

    /// Wall-clock period of the keep-alive send
    pub fn interval(&self) -> Duration {
        ticks_to_duration(self.loop_interval_ticks)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn periodic_message(&self) -> &str {
        &self.periodic_message
    }

    pub fn loop_interval_ticks(&self) -> u64 {
        self.loop_interval_ticks
    }

    pub fn on_connect_messages(&self) -> &[String] {
        &self.on_connect_messages
    }

    pub fn command_templates(&self) -> &[String] {
        &self.command_templates
    }
}

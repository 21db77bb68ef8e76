use thiserror::Error;

/// Main error type for wsbridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// An endpoint definition is malformed or misses a required field
    #[error("Invalid endpoint configuration: {0}")]
    ConfigInvalid(String),

    /// Transport failure during the initial handshake
    #[error("Connect failure: {0}")]
    ConnectFailure(String),

    /// Transport failure after the session was open
    #[error("Runtime failure: {0}")]
    RuntimeFailure(String),

    /// The cooperative scheduler could not be started or is gone
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl BridgeError {
    /// Whether this error concerns configuration rather than a live connection
    pub fn is_config(&self) -> bool {
        matches!(self, BridgeError::ConfigInvalid(_))
    }
}

/// Result type for wsbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

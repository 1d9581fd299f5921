use thiserror::Error;

/// Failures of the engine connection and its wire protocol.
///
/// `Clone` so the same error can be fanned out to every error listener.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid engine URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connection timeout after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("WebSocket send failed: {0}")]
    SendFailed(String),

    #[error("WebSocket not connected, command queued")]
    NotConnected { queued: bool },

    #[error("Command dropped from full outbound queue")]
    CommandEvicted,

    #[error("Failed to parse message: {0}")]
    MalformedFrame(String),

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Failed to serialize command: {0}")]
    Serialization(String),

    #[error("Reconnection limit exceeded after {0} attempts")]
    ReconnectionLimitExceeded(u32),
}

impl TransportError {
    /// Protocol errors are frames that were valid JSON but not part of the schema
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, TransportError::UnknownEvent(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid engine URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Invalid HTTP bind address '{0}'")]
    InvalidBindAddress(String),
}

/// Anything that stops the service from starting or serving
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

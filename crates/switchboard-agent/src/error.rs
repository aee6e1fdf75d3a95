//! Error types for the agent

use std::io;
use switchboard_proto::ProtocolError;
use thiserror::Error;

/// Declared handler failure.
///
/// Handlers return it (through `anyhow`) to report a failure the caller
/// should see; it is published as `{"exception": <message>}`. Any other
/// error escaping a handler is treated as a defect and publishes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a description
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// The failure description
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Transport-related errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Frame encoding or decoding failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport only supports a single subscription
    #[error("Transport already has an active subscription")]
    AlreadySubscribed,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Config file is not valid JSON for [`crate::AgentConfig`]
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment value could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Offending value
        value: String,
    },

    /// No agent id configured
    #[error("Agent id must not be empty")]
    MissingAgentId,

    /// Retention of zero records would make every task unpollable
    #[error("Task retention must be at least 1")]
    ZeroRetention,

    /// Frame size does not fit the 32-bit length prefix
    #[error("Max frame size {0} exceeds the 32-bit length prefix")]
    FrameSizeOutOfRange(usize),
}

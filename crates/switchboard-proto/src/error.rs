//! Error types for protocol operations

use std::io;
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid frame format
    #[error("Invalid frame format")]
    InvalidFrame,

    /// Stream ended partway through a frame
    #[error("Stream ended with {0} bytes of an incomplete frame")]
    Truncated(usize),

    /// Reading or writing the underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame too large
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Channel name does not fit the 16-bit length field
    #[error("Channel name too long: {0} bytes")]
    ChannelTooLong(usize),

    /// Envelope is missing a required argument
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

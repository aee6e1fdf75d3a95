//! # Switchboard Protocol
//!
//! Envelope types, reply outcomes, and the publish-frame codec used by the
//! Switchboard agent.

#![warn(missing_docs)]

/// Publish frame structure
pub mod frame;

/// Request envelopes and reply outcomes
pub mod message;

/// Frame codec for async streams
pub mod codec;

/// Error types for protocol operations
pub mod error;

pub use frame::PublishFrame;
pub use message::{Arguments, Envelope, GetTaskArgs, Outcome};
pub use codec::FrameCodec;
pub use error::ProtocolError;

//! # Switchboard Agent
//!
//! Agent-side request dispatcher. Requests arrive on a pub/sub topic, are
//! routed to registered capability handlers, and replies are published on
//! the channel named by each request's message id. Long-running handlers
//! share a single execution slot and are polled with the built-in
//! `get_task` method.

#![warn(missing_docs)]

pub use switchboard_proto as proto;

/// Agent main loop
pub mod agent;

/// Agent configuration
pub mod config;

/// Single-slot long-running task coordination
pub mod coordinator;

/// Request dispatch
pub mod dispatcher;

/// Error types for the agent
pub mod error;

/// Capability handlers and the invocation wrapper
pub mod handlers;

/// Reply publishing
pub mod publisher;

/// Capability registry
pub mod registry;

/// Publish/subscribe transports
pub mod transport;

pub use agent::Agent;
pub use config::AgentConfig;
pub use coordinator::{TaskCoordinator, TaskRecord, TaskStatus};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, HandlerError, TransportError};
pub use handlers::Handler;
pub use publisher::ResultPublisher;
pub use registry::{CapabilityRegistry, RegistryBuilder};
pub use transport::{MemoryBroker, StdioTransport, Subscription, Transport};

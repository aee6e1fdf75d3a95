//! Capability handlers and the uniform invocation wrapper

use crate::error::HandlerError;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use switchboard_proto::{Arguments, Outcome};
use tracing::debug;

/// A capability addressable by method name
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process a request's arguments.
    ///
    /// Return a [`HandlerError`] for failures the caller should see; any
    /// other error is logged and no reply is published.
    async fn process(&self, arguments: Arguments) -> Result<Value>;

    /// Long-running handlers run in the single coordinated slot and are
    /// polled for completion through `get_task`.
    fn is_long_running(&self) -> bool {
        false
    }
}

/// Invoke a handler and wrap its result as an [`Outcome`].
///
/// `Ok(v)` becomes `{"value": v}` and a [`HandlerError`] becomes
/// `{"exception": ...}`. Every other error is passed back to the caller.
pub async fn invoke(handler: &dyn Handler, arguments: Arguments) -> Result<Outcome> {
    match handler.process(arguments).await {
        Ok(value) => Ok(Outcome::Value(value)),
        Err(err) => match err.downcast::<HandlerError>() {
            Ok(handler_error) => {
                debug!("Handler reported failure: {}", handler_error);
                Ok(Outcome::exception(handler_error.message()))
            }
            Err(err) => Err(err),
        },
    }
}

/// Liveness check
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn process(&self, _arguments: Arguments) -> Result<Value> {
        debug!("Handling ping request");
        Ok(Value::from("pong"))
    }
}

/// No-op connectivity check
pub struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    async fn process(&self, _arguments: Arguments) -> Result<Value> {
        Ok(Value::from("nope"))
    }
}

//! Request dispatch
//!
//! Every routed request runs in its own tokio task. Immediate handlers
//! publish their outcome when they return; long-running handlers go through
//! the [`TaskCoordinator`], acknowledge with a task id up front and are
//! polled through `get_task`.

use crate::coordinator::TaskCoordinator;
use crate::handlers::{invoke, Handler};
use crate::publisher::ResultPublisher;
use crate::registry::CapabilityRegistry;
use std::sync::Arc;
use switchboard_proto::{Envelope, GetTaskArgs, Outcome};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Routes envelopes to capabilities
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    coordinator: Arc<TaskCoordinator>,
    publisher: ResultPublisher,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        coordinator: Arc<TaskCoordinator>,
        publisher: ResultPublisher,
    ) -> Self {
        Self {
            registry,
            coordinator,
            publisher,
        }
    }

    /// Shared coordinator state
    pub fn coordinator(&self) -> &Arc<TaskCoordinator> {
        &self.coordinator
    }

    /// Capability registry
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Handle one inbound envelope.
    ///
    /// Status polls are answered inline. A capability with the same name as
    /// the poll method still runs afterwards. Returns the handle of the
    /// spawned execution, or `None` when no capability matched.
    pub async fn on_request(&self, envelope: Envelope) -> Option<JoinHandle<()>> {
        debug!("Handling request: message_id={}, method={}", envelope.message_id, envelope.method);

        let is_poll = envelope.is_status_poll();
        if is_poll {
            self.handle_get_task(&envelope).await;
        }

        let Some(handler) = self.registry.lookup(&envelope.method) else {
            if !is_poll {
                warn!("No handler registered for method: {} (message_id={})", envelope.method, envelope.message_id);
            }
            return None;
        };

        let coordinator = Arc::clone(&self.coordinator);
        let publisher = self.publisher.clone();
        Some(tokio::spawn(async move {
            Self::execute(handler, envelope, coordinator, publisher).await;
        }))
    }

    /// Answer a `get_task` status poll
    async fn handle_get_task(&self, envelope: &Envelope) {
        let outcome = match GetTaskArgs::from_arguments(&envelope.arguments) {
            Ok(args) => {
                let status = self.coordinator.poll(&args.agent_task_id);
                debug!("Polled task {}: {:?}", args.agent_task_id, status);
                status.into_outcome(&args.agent_task_id)
            }
            Err(e) => {
                warn!("Malformed status poll {}: {}", envelope.message_id, e);
                Outcome::exception(e.to_string())
            }
        };
        self.publisher.publish(&envelope.message_id, &outcome).await;
    }

    async fn execute(
        handler: Arc<dyn Handler>,
        envelope: Envelope,
        coordinator: Arc<TaskCoordinator>,
        publisher: ResultPublisher,
    ) {
        if handler.is_long_running() {
            Self::execute_long_running(handler, envelope, coordinator, publisher).await;
            return;
        }

        let Envelope { message_id, method, arguments } = envelope;
        match invoke(handler.as_ref(), arguments).await {
            Ok(outcome) => publisher.publish(&message_id, &outcome).await,
            Err(e) => error!("Handler for {} failed without a declared error (message_id={}): {:#}", method, message_id, e),
        }
    }

    async fn execute_long_running(
        handler: Arc<dyn Handler>,
        envelope: Envelope,
        coordinator: Arc<TaskCoordinator>,
        publisher: ResultPublisher,
    ) {
        let Envelope { message_id, method, arguments } = envelope;

        let task = match coordinator.start() {
            Ok(task) => task,
            Err(rejected) => {
                info!("Rejected {} (message_id={}): task {} is running", method, message_id, rejected.running);
                publisher.publish(&message_id, &Outcome::already_running()).await;
                return;
            }
        };

        publisher.publish(&message_id, &Outcome::task_started(task.task_id())).await;

        match invoke(handler.as_ref(), arguments).await {
            Ok(outcome) => task.complete(outcome),
            // Dropping `task` frees the slot without a record
            Err(e) => error!(
                "Long-running handler for {} failed without a declared error (task_id={}): {:#}",
                method,
                task.task_id(),
                e
            ),
        }
    }
}

//! Agent main loop

use crate::config::AgentConfig;
use crate::coordinator::TaskCoordinator;
use crate::dispatcher::Dispatcher;
use crate::publisher::ResultPublisher;
use crate::registry::CapabilityRegistry;
use crate::transport::Transport;
use anyhow::{Context, Result};
use std::sync::Arc;
use switchboard_proto::Envelope;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Subscribes to the agent's topic and feeds envelopes to the dispatcher
pub struct Agent {
    /// Inbound topic
    topic: String,
    /// Pub/sub transport
    transport: Arc<dyn Transport>,
    /// Request dispatcher
    dispatcher: Dispatcher,
    /// Shutdown signal receiver
    shutdown_rx: Option<oneshot::Receiver<()>>,
    /// Shutdown signal sender (kept for graceful shutdown)
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Agent {
    /// Create an agent. Its coordinator starts idle with the configured
    /// record retention.
    pub fn new(config: &AgentConfig, registry: CapabilityRegistry, transport: Arc<dyn Transport>) -> Self {
        let coordinator = Arc::new(TaskCoordinator::with_retention(config.task_retention));
        let publisher = ResultPublisher::new(Arc::clone(&transport));
        let dispatcher = Dispatcher::new(Arc::new(registry), coordinator, publisher);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Self {
            topic: config.topic(),
            transport,
            dispatcher,
            shutdown_rx: Some(shutdown_rx),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Inbound topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Request dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get shutdown sender for graceful shutdown
    pub fn shutdown_sender(&mut self) -> Option<oneshot::Sender<()>> {
        self.shutdown_tx.take()
    }

    /// Run until shutdown or until the subscription ends.
    ///
    /// In-flight executions are not awaited; they keep running on the
    /// runtime or are abandoned with it.
    pub async fn run(&mut self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx.take()
            .context("Shutdown receiver already taken")?;

        let mut subscription = self.transport.subscribe(&self.topic).await
            .with_context(|| format!("Failed to subscribe to {}", self.topic))?;
        info!("Subscribed to {}", self.topic);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Received shutdown signal, stopping agent");
                    break;
                }

                message = subscription.next() => {
                    match message {
                        Some(raw) => self.handle_message(&raw).await,
                        None => {
                            info!("Subscription to {} closed", self.topic);
                            break;
                        }
                    }
                }
            }
        }

        drop(subscription);
        info!("Unsubscribed from {}", self.topic);
        Ok(())
    }

    async fn handle_message(&self, raw: &[u8]) {
        let envelope = match Envelope::from_slice(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed message on {}: {}", self.topic, e);
                return;
            }
        };

        debug!("Received message: message_id={}, method={}", envelope.message_id, envelope.method);
        self.dispatcher.on_request(envelope).await;
    }
}

//! Reply publishing

use crate::transport::Transport;
use std::sync::Arc;
use switchboard_proto::Outcome;
use tracing::{debug, error};

/// Publishes reply outcomes on the channel named by a request's message id
#[derive(Clone)]
pub struct ResultPublisher {
    transport: Arc<dyn Transport>,
}

impl ResultPublisher {
    /// Create a publisher over a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Serialize and publish an outcome on `message_id`.
    ///
    /// Failures are logged and not reported back; there is nobody left to
    /// tell once the reply channel is unreachable.
    pub async fn publish(&self, message_id: &str, outcome: &Outcome) {
        let payload = match outcome.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize reply for {}: {}", message_id, e);
                return;
            }
        };

        match self.transport.publish(message_id, payload).await {
            Ok(()) => debug!("Published reply: message_id={}, exception={}", message_id, outcome.is_exception()),
            Err(e) => error!("Failed to publish reply for {}: {}", message_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{MemoryBroker, Subscription};
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;

    struct BrokenPipeTransport;

    #[async_trait]
    impl Transport for BrokenPipeTransport {
        async fn subscribe(&self, _topic: &str) -> Result<Subscription, TransportError> {
            Err(TransportError::AlreadySubscribed)
        }

        async fn publish(&self, _channel: &str, _payload: Bytes) -> Result<(), TransportError> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
        }
    }

    #[tokio::test]
    async fn test_publish_on_message_id_channel() {
        let broker = MemoryBroker::new();
        let mut reply = broker.subscribe("m1").await.unwrap();
        let publisher = ResultPublisher::new(Arc::new(broker.clone()));

        publisher.publish("m1", &Outcome::value(json!({ "ok": true }))).await;

        let raw = reply.next().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value, json!({ "value": { "ok": true } }));
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let publisher = ResultPublisher::new(Arc::new(BrokenPipeTransport));
        // Must not panic or propagate
        publisher.publish("m1", &Outcome::exception("boom")).await;
    }
}

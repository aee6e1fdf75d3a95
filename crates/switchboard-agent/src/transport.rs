//! Publish/subscribe transports
//!
//! The agent needs two things from a transport: a single subscription to its
//! inbound topic, and the ability to publish a payload on an arbitrary
//! channel from many tasks at once.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_proto::{FrameCodec, ProtocolError, PublishFrame};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Pub/sub transport used by the agent
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;

    /// Publish a payload on a channel. Publishing is fire-and-forget: the
    /// call returns once the payload is handed to the transport.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError>;
}

/// Stream of payloads received on a topic. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Subscription {
    /// Create a subscription fed by a channel receiver
    pub fn new(topic: impl Into<String>, rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self { topic: topic.into(), rx }
    }

    /// Subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload, or `None` once the transport side has gone away
    pub async fn next(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// In-process pub/sub broker.
///
/// Every subscriber of a channel receives every payload published on it
/// after it subscribed. Clones share the same broker.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    channels: Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Bytes>>>>>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a channel
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.write().await;
        channels.entry(topic.to_string()).or_default().push(tx);
        debug!("Subscribed to channel: {}", topic);
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        let mut channels = self.channels.write().await;
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
        Ok(())
    }
}

/// Transport speaking length-prefixed publish frames over a reader/writer
/// pair, typically the process's stdin and stdout.
///
/// Inbound frames carry the channel they were published on; only frames for
/// the subscribed topic are delivered. Outbound frames are written under a
/// mutex so concurrent publishers never interleave bytes.
pub struct StdioTransport<R, W> {
    reader: Mutex<Option<R>>,
    writer: Arc<Mutex<W>>,
    max_frame_size: usize,
}

impl StdioTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Create a transport over stdin/stdout
    pub fn stdio(max_frame_size: usize) -> Self {
        Self::with_io(tokio::io::stdin(), tokio::io::stdout(), max_frame_size)
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a transport with custom reader/writer
    pub fn with_io(reader: R, writer: W, max_frame_size: usize) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            writer: Arc::new(Mutex::new(writer)),
            max_frame_size,
        }
    }

    async fn forward_frames(mut reader: R, topic: String, tx: mpsc::UnboundedSender<Bytes>, max_frame_size: usize) {
        let mut codec = FrameCodec::with_max_frame_size(max_frame_size);
        loop {
            match codec.read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if frame.channel != topic {
                        warn!("Dropping frame for unsubscribed channel: {}", frame.channel);
                        continue;
                    }
                    if tx.send(frame.payload).is_err() {
                        debug!("Subscription dropped, stopping reader for {}", topic);
                        break;
                    }
                }
                Ok(None) => {
                    info!("Input stream closed");
                    break;
                }
                // The bad body was consumed, the next frame starts right after it
                Err(ProtocolError::InvalidFrame) => {
                    warn!("Dropping undecodable frame");
                    continue;
                }
                Err(e) => {
                    error!("Error reading frame: {}", e);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let reader = self.reader.lock().await.take()
            .ok_or(TransportError::AlreadySubscribed)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::forward_frames(reader, topic.to_string(), tx, self.max_frame_size));

        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        let frame = PublishFrame::new(channel, payload);
        let codec = FrameCodec::with_max_frame_size(self.max_frame_size);

        let mut writer = self.writer.lock().await;
        codec.write_frame(&mut *writer, &frame).await.map_err(|e| match e {
            ProtocolError::Io(io) => TransportError::Io(io),
            other => TransportError::Protocol(other),
        })?;

        debug!("Published frame: channel={}, payload_size={}", channel, frame.payload_size());
        Ok(())
    }
}

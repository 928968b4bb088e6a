//! # Message bus
//!
//! [`MessageBus`] is the seam between the pipeline and the event stream.
//! [`Publisher`] encodes a [`MetricRecord`], hands it to the bus and waits a
//! bounded time for the acknowledgment.
//!
//! ## Guarantees
//! - At most one delivery attempt per record; no retries within a cycle
//! - Never blocks longer than the configured ack timeout
//! - Failures are returned as values, never panics

pub mod kafka;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BusError, PublishError};
use crate::record::MetricRecord;

pub use kafka::KafkaBus;

/// Anything that can deliver an opaque payload to a named topic.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Send `payload` to `topic` and resolve once the broker acknowledged it.
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Push out anything buffered. Called once at the end of every cycle.
    async fn flush(&self) -> Result<(), BusError> {
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus + ?Sized> MessageBus for Arc<B> {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        (**self).send(topic, payload).await
    }

    async fn flush(&self) -> Result<(), BusError> {
        (**self).flush().await
    }
}

/// Default time to wait for a delivery acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Publishes records to one topic.
pub struct Publisher<B> {
    bus: B,
    topic: String,
    ack_timeout: Duration,
}

impl<B: MessageBus> Publisher<B> {
    pub fn new(bus: B, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Encode `record` and send it, waiting at most `ack_timeout`.
    ///
    /// # Errors
    /// - [`PublishError::Encode`] if the record cannot be serialized
    /// - [`PublishError::Bus`] on broker failure or [`BusError::Timeout`]
    pub async fn publish(&self, record: &MetricRecord) -> Result<(), PublishError> {
        let payload = record.to_bytes()?;
        debug!(
            topic = %self.topic,
            container_id = %record.container_id,
            record_type = %record.record_type,
            payload = %String::from_utf8_lossy(&payload),
            "publishing record"
        );
        match tokio::time::timeout(self.ack_timeout, self.bus.send(&self.topic, payload)).await {
            Ok(result) => result.map_err(PublishError::from),
            Err(_) => Err(BusError::Timeout(self.ack_timeout).into()),
        }
    }

    /// Flush the bus, bounded by the ack timeout.
    pub async fn flush(&self) -> Result<(), BusError> {
        match tokio::time::timeout(self.ack_timeout, self.bus.flush()).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(self.ack_timeout)),
        }
    }
}

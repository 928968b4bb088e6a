//! Kafka implementation of [`MessageBus`] on top of `rskafka`.
//!
//! The broker connection is opened lazily on the first send and kept for the
//! lifetime of the process, so a cycle never leaks a connection and a broker
//! outage surfaces as publish errors instead of a startup failure.
//!
//! Records carry no key. Unless a partition is pinned in the settings, the
//! partitions of a topic are discovered on first use and sends rotate over
//! them round-robin.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::MessageBus;
use crate::config::KafkaSettings;
use crate::error::BusError;

/// Partition clients of one topic plus the rotation cursor.
struct TopicProducer {
    partitions: Vec<Arc<PartitionClient>>,
    next: AtomicUsize,
}

impl TopicProducer {
    fn pick(&self) -> Arc<PartitionClient> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Arc::clone(&self.partitions[select_partition(n, self.partitions.len())])
    }
}

/// Index of the partition for the `n`-th send over `count` partitions.
///
/// `count` must be non-zero.
pub fn select_partition(n: usize, count: usize) -> usize {
    n % count
}

/// Partitions to produce to, given what the broker reports for the topic.
///
/// A pinned partition must exist in `available`. An empty topic is an error.
pub fn target_partitions(
    topic: &str,
    available: &BTreeSet<i32>,
    pinned: Option<i32>,
) -> Result<Vec<i32>, BusError> {
    match pinned {
        Some(p) if available.contains(&p) => Ok(vec![p]),
        Some(p) => Err(BusError::Connect(format!("topic {topic} has no partition {p}"))),
        None if available.is_empty() => {
            Err(BusError::Connect(format!("topic {topic} not found or has no partitions")))
        }
        None => Ok(available.iter().copied().collect()),
    }
}

pub struct KafkaBus {
    bootstrap: Vec<String>,
    client_id: String,
    api_version: String,
    pinned_partition: Option<i32>,
    client: OnceCell<Client>,
    topics: Mutex<HashMap<String, Arc<TopicProducer>>>,
}

impl KafkaBus {
    pub fn new(settings: &KafkaSettings) -> Self {
        Self {
            bootstrap: vec![settings.bootstrap_server()],
            client_id: settings.client_id.clone(),
            api_version: settings.api_version.clone(),
            pinned_partition: settings.partition,
            client: OnceCell::new(),
            topics: Mutex::new(HashMap::new()),
        }
    }

    pub fn bootstrap(&self) -> &[String] {
        &self.bootstrap
    }

    async fn client(&self) -> Result<&Client, BusError> {
        self.client
            .get_or_try_init(|| async {
                // rskafka negotiates protocol versions per broker; the
                // configured version is only reported.
                info!(
                    bootstrap = ?self.bootstrap,
                    client_id = %self.client_id,
                    api_version = %self.api_version,
                    "connecting to kafka"
                );
                ClientBuilder::new(self.bootstrap.clone())
                    .build()
                    .await
                    .map_err(|e| BusError::Connect(e.to_string()))
            })
            .await
    }

    async fn producer(&self, topic: &str) -> Result<Arc<TopicProducer>, BusError> {
        let mut topics = self.topics.lock().await;
        if let Some(producer) = topics.get(topic) {
            return Ok(Arc::clone(producer));
        }

        let client = self.client().await?;
        let available = client
            .list_topics()
            .await
            .map_err(|e| BusError::Connect(format!("listing topics: {e}")))?
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions)
            .unwrap_or_default();
        let ids = target_partitions(topic, &available, self.pinned_partition)?;

        let mut partitions = Vec::with_capacity(ids.len());
        for id in &ids {
            let pc = client
                .partition_client(topic.to_string(), *id, UnknownTopicHandling::Error)
                .await
                .map_err(|e| BusError::Connect(format!("topic {topic} partition {id}: {e}")))?;
            partitions.push(Arc::new(pc));
        }
        debug!(topic, partitions = ?ids, "topic producer ready");

        let producer = Arc::new(TopicProducer { partitions, next: AtomicUsize::new(0) });
        topics.insert(topic.to_string(), Arc::clone(&producer));
        Ok(producer)
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let pc = self.producer(topic).await?.pick();
        let record = Record {
            key: None,
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        pc.produce(vec![record], Compression::NoCompression)
            .await
            .map(|_offsets| ())
            .map_err(|e| BusError::Produce(e.to_string()))
    }
}

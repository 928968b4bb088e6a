//! # kubernetes-prometheus-publisher
//!
//! Periodically pulls container metrics from Prometheus, reduces each series
//! to its latest sample, derives per-container packet-loss percentages and
//! publishes everything as JSON records on a Kafka topic.
//!
//! ## Pipeline
//!
//! ```text
//! Scheduler ──tick──▶ CycleDriver
//!                       │ for each catalog metric
//!                       ├─ QueryBuilder ─▶ PrometheusClient ─▶ SampleExtractor ─▶ Publisher
//!                       │                                          │
//!                       │                                   EntityAccumulator
//!                       └─ packet_loss::aggregate ─────────────────┴────────────▶ Publisher
//! ```
//!
//! The two external systems sit behind traits ([`prometheus::MetricsBackend`]
//! and [`bus::MessageBus`]) so the whole cycle can run against in-memory fakes.

pub mod bus;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod error;
pub mod extract;
pub mod logging;
pub mod packet_loss;
pub mod prometheus;
pub mod record;
pub mod scheduler;
pub mod timestamp;

pub use bus::{KafkaBus, MessageBus, Publisher};
pub use config::Settings;
pub use cycle::{CycleDriver, CycleReport};
pub use error::{BusError, ConfigError, PublishError, QueryError};
pub use record::{DataPoint, MetricRecord};
pub use scheduler::{Scheduler, TickOutcome};

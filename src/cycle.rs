//! # Cycle driver
//!
//! One cycle is one full pass over the metric catalog:
//!
//! ```text
//! Idle → Running → (Query → Parse → Extract → Publish) × catalog → Aggregate → Closing → Idle
//! ```
//!
//! ## Guarantees
//! - A failing metric (HTTP error, malformed body) is logged and skipped;
//!   the remaining metrics of the cycle are still collected
//! - A failing publish is logged and the record dropped
//! - The packet-loss accumulator is created when the cycle starts and
//!   consumed when it ends; nothing carries over to the next cycle
//! - `run_cycle` never returns an error and never panics
//!
//! ## NOT Responsible For
//! - Deciding when to run (that is the [`Scheduler`](crate::scheduler::Scheduler))

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::bus::{MessageBus, Publisher};
use crate::catalog::{MetricDescriptor, DEFAULT_CATALOG};
use crate::config::Settings;
use crate::error::QueryError;
use crate::extract::{LatestSample, SampleExtractor};
use crate::packet_loss::{self, EntityAccumulator};
use crate::prometheus::{MetricsBackend, QueryBuilder, TimeWindow};
use crate::record::MetricRecord;

/// Phases a cycle moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Running,
    Aggregate,
    Closing,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Running => "running",
            CyclePhase::Aggregate => "aggregate",
            CyclePhase::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Catalog metrics whose query succeeded.
    pub metrics_collected: usize,
    /// Catalog metrics skipped because of a transport failure.
    pub transport_failures: usize,
    /// Catalog metrics skipped because of a malformed response.
    pub decode_failures: usize,
    /// Raw sample records acknowledged by the bus.
    pub records_published: usize,
    /// Packet-loss records acknowledged by the bus.
    pub derived_published: usize,
    /// Records dropped because the bus failed or timed out.
    pub publish_failures: usize,
}

impl CycleReport {
    pub fn metrics_failed(&self) -> usize {
        self.transport_failures + self.decode_failures
    }
}

/// Runs collection cycles. Holds only configuration and collaborators.
pub struct CycleDriver<M, B> {
    backend: M,
    publisher: Publisher<B>,
    builder: QueryBuilder,
    extractor: SampleExtractor,
    catalog: Vec<MetricDescriptor>,
    lookback: Duration,
    step: String,
}

impl<M: MetricsBackend, B: MessageBus> CycleDriver<M, B> {
    /// Driver over [`DEFAULT_CATALOG`], configured from `settings`.
    pub fn new(backend: M, publisher: Publisher<B>, settings: &Settings) -> Self {
        Self {
            backend,
            publisher,
            builder: QueryBuilder::from_settings(&settings.prometheus),
            extractor: SampleExtractor::new(settings.prometheus.identity_label.clone()),
            catalog: DEFAULT_CATALOG.to_vec(),
            lookback: Duration::from_secs(settings.scheduler.interval_secs),
            step: settings.prometheus.polling_step.clone(),
        }
    }

    /// Replace the catalog. Metrics are processed in the given order.
    pub fn with_catalog(mut self, catalog: impl Into<Vec<MetricDescriptor>>) -> Self {
        self.catalog = catalog.into();
        self
    }

    pub fn catalog(&self) -> &[MetricDescriptor] {
        &self.catalog
    }

    /// Run one cycle over the window ending now.
    pub async fn run_cycle(&self) -> CycleReport {
        let window = TimeWindow::last(self.lookback, self.step.clone());
        self.run_cycle_over(&window).await
    }

    /// Run one cycle over an explicit window.
    pub async fn run_cycle_over(&self, window: &TimeWindow) -> CycleReport {
        let mut report = CycleReport::default();
        let mut accumulator = EntityAccumulator::new();
        debug!(phase = %CyclePhase::Running, metrics = self.catalog.len(), "cycle started");

        for metric in &self.catalog {
            match self.collect_metric(metric, window, &mut accumulator).await {
                Ok(samples) => {
                    report.metrics_collected += 1;
                    for sample in samples {
                        if self.publish(&sample.to_record(), &mut report).await {
                            report.records_published += 1;
                        }
                    }
                }
                Err(e) if e.is_transport() => {
                    report.transport_failures += 1;
                    error!(metric = metric.name, error = %e, "query failed, skipping metric");
                }
                Err(e) => {
                    report.decode_failures += 1;
                    error!(metric = metric.name, error = %e, "unparseable query result, skipping metric");
                }
            }
        }

        debug!(phase = %CyclePhase::Aggregate, entities = accumulator.len(), "deriving packet loss");
        for record in packet_loss::aggregate(accumulator) {
            if self.publish(&record, &mut report).await {
                report.derived_published += 1;
            }
        }

        debug!(phase = %CyclePhase::Closing, "flushing bus");
        if let Err(e) = self.publisher.flush().await {
            warn!(error = %e, "bus flush failed");
        }

        info!(
            phase = %CyclePhase::Idle,
            collected = report.metrics_collected,
            failed = report.metrics_failed(),
            published = report.records_published,
            derived = report.derived_published,
            publish_failures = report.publish_failures,
            "cycle complete"
        );
        report
    }

    /// Query → parse → extract for one metric.
    ///
    /// The accumulator is only touched once the response parsed, so a failed
    /// metric leaves it unchanged.
    async fn collect_metric(
        &self,
        metric: &MetricDescriptor,
        window: &TimeWindow,
        accumulator: &mut EntityAccumulator,
    ) -> Result<Vec<LatestSample>, QueryError> {
        let query = self.builder.build(metric, window);
        let data = self.backend.query_range(&query).await?;
        if !data.is_matrix() {
            warn!(
                metric = metric.name,
                result_type = data.result_type.as_deref().unwrap_or("<missing>"),
                "resultType is not matrix, parsing best-effort"
            );
        }
        Ok(self.extractor.extract(metric, &data, accumulator))
    }

    /// Returns `true` if the bus acknowledged the record.
    async fn publish(&self, record: &MetricRecord, report: &mut CycleReport) -> bool {
        match self.publisher.publish(record).await {
            Ok(()) => true,
            Err(e) => {
                report.publish_failures += 1;
                error!(
                    container_id = %record.container_id,
                    record_type = %record.record_type,
                    error = %e,
                    "publish failed, record dropped"
                );
                false
            }
        }
    }
}

//! Reduce each returned series to its most recent sample.

use tracing::trace;

use crate::catalog::MetricDescriptor;
use crate::packet_loss::{EntityAccumulator, PacketCounter};
use crate::prometheus::response::{QueryRangeData, Series};
use crate::record::{DataPoint, MetricRecord};
use crate::timestamp::convert_unix_timestamp;

/// The final sample of one entity's series for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSample {
    pub entity_id: String,
    /// ISO-8601 UTC with microseconds.
    pub timestamp: String,
    /// Raw sample value exactly as Prometheus returned it.
    pub value: String,
    pub metric: MetricDescriptor,
}

impl LatestSample {
    /// Wrap the sample in a single-point outbound record.
    pub fn to_record(&self) -> MetricRecord {
        MetricRecord {
            container_id: self.entity_id.clone(),
            record_type: self.metric.kind.as_str().to_string(),
            data: vec![DataPoint {
                timestamp: self.timestamp.clone(),
                unit: self.metric.unit.to_string(),
                kind: self.metric.kind.as_str().to_string(),
                name: self.metric.name.to_string(),
                value: self.value.clone(),
            }],
        }
    }
}

/// Attributes series to entities through the identity label.
#[derive(Debug, Clone)]
pub struct SampleExtractor {
    identity_label: String,
}

impl SampleExtractor {
    pub fn new(identity_label: impl Into<String>) -> Self {
        Self { identity_label: identity_label.into() }
    }

    pub fn identity_label(&self) -> &str {
        &self.identity_label
    }

    /// Extract at most one [`LatestSample`] per series.
    ///
    /// Series without the identity label or without samples are dropped.
    /// Packet counters are also written into `accumulator`; values that do
    /// not parse as finite numbers are left out of it.
    pub fn extract(
        &self,
        metric: &MetricDescriptor,
        data: &QueryRangeData,
        accumulator: &mut EntityAccumulator,
    ) -> Vec<LatestSample> {
        let counter = PacketCounter::from_metric(metric.name);
        let mut samples = Vec::with_capacity(data.result.len());

        for series in &data.result {
            let Some(sample) = self.latest(metric, series) else {
                continue;
            };
            if let Some(counter) = counter {
                match sample.value.parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        accumulator.record(&sample.entity_id, counter, v, &sample.timestamp)
                    }
                    _ => trace!(
                        metric = metric.name,
                        entity = %sample.entity_id,
                        value = %sample.value,
                        "non-numeric packet counter not accumulated"
                    ),
                }
            }
            samples.push(sample);
        }
        samples
    }

    fn latest(&self, metric: &MetricDescriptor, series: &Series) -> Option<LatestSample> {
        let entity_id = series.label(&self.identity_label)?;
        let (unix_secs, value) = series.latest()?;
        let timestamp = convert_unix_timestamp(*unix_secs)?;
        Some(LatestSample {
            entity_id: entity_id.to_string(),
            timestamp,
            value: value.clone(),
            metric: *metric,
        })
    }
}

impl Default for SampleExtractor {
    fn default() -> Self {
        Self::new("label_vim_id")
    }
}

//! PromQL construction for one catalog metric over one time window.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::catalog::MetricDescriptor;
use crate::config::PrometheusSettings;
use crate::timestamp::format_utc;

/// Network and cumulative CPU/filesystem counters queried with `rate`.
///
/// Everything else, gauges included, is averaged over the range window.
pub const RATE_METRICS: &[&str] = &[
    "container_network_receive_bytes_total",
    "container_network_receive_errors_total",
    "container_network_receive_packets_dropped_total",
    "container_network_receive_packets_total",
    "container_network_transmit_bytes_total",
    "container_network_transmit_errors_total",
    "container_network_transmit_packets_dropped_total",
    "container_network_transmit_packets_total",
    "container_cpu_usage_seconds_total",
    "container_cpu_user_seconds_total",
    "container_cpu_system_seconds_total",
    "container_cpu_cfs_throttled_seconds_total",
    "container_fs_writes_bytes_total",
    "container_fs_reads_bytes_total",
];

/// Range-vector function wrapped around the raw series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Rate,
    AvgOverTime,
}

impl Aggregation {
    pub fn function_name(&self) -> &'static str {
        match self {
            Aggregation::Rate => "rate",
            Aggregation::AvgOverTime => "avg_over_time",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Pick the aggregation for a metric name. Never fails.
pub fn aggregation_for(metric_name: &str) -> Aggregation {
    if RATE_METRICS.contains(&metric_name) {
        Aggregation::Rate
    } else {
        Aggregation::AvgOverTime
    }
}

/// `[start, end]` sampled every `step`, created fresh for each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Prometheus duration string, e.g. `20s`.
    pub step: String,
}

impl TimeWindow {
    /// The window `[end - lookback, end]`.
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration, step: impl Into<String>) -> Self {
        let lookback = chrono::Duration::from_std(lookback).unwrap_or_else(|_| chrono::Duration::zero());
        let start = end.checked_sub_signed(lookback).unwrap_or(end);
        Self { start, end, step: step.into() }
    }

    /// The window ending now.
    pub fn last(lookback: Duration, step: impl Into<String>) -> Self {
        Self::ending_at(Utc::now(), lookback, step)
    }

    pub fn start_param(&self) -> String {
        format_utc(&self.start)
    }

    pub fn end_param(&self) -> String {
        format_utc(&self.end)
    }
}

/// A built query, ready for the range query client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub metric: &'static str,
    pub promql: String,
    pub window: TimeWindow,
}

/// Builds the pod-label join query for each catalog metric.
///
/// cAdvisor series carry `pod_name` but not the workload labels, so the
/// per-pod aggregate is relabelled to `pod` and joined against
/// `kube_pod_labels`. Series whose pod has no workload label fall out of
/// the join instead of producing an error.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    namespace: String,
    rate_window: String,
    workload_label: String,
    identity_label: String,
}

impl QueryBuilder {
    pub fn new(
        namespace: impl Into<String>,
        rate_window: impl Into<String>,
        workload_label: impl Into<String>,
        identity_label: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            rate_window: rate_window.into(),
            workload_label: workload_label.into(),
            identity_label: identity_label.into(),
        }
    }

    pub fn from_settings(settings: &PrometheusSettings) -> Self {
        Self::new(
            settings.namespace.clone(),
            settings.rate_window.clone(),
            settings.workload_label.clone(),
            settings.identity_label.clone(),
        )
    }

    /// Render the PromQL expression for `metric`.
    pub fn promql(&self, metric: &MetricDescriptor) -> String {
        let function = aggregation_for(metric.name);
        let workload = &self.workload_label;
        let identity = &self.identity_label;
        format!(
            "sum(\n  \
               max(kube_pod_labels{{{workload}!=\"\"}}) by ({workload}, pod, {identity})\n  \
               *\n  \
               on(pod)\n  \
               group_right({workload}, {identity})\n  \
               label_replace(\n    \
                 sum by (pod_name) ({function}({name}{{namespace=\"{namespace}\"}}[{window}])),\n    \
                 \"pod\",\n    \
                 \"$1\",\n    \
                 \"pod_name\",\n    \
                 \"(.+)\"\n  \
               )\n\
             ) by (pod, {workload}, {identity})",
            name = metric.name,
            namespace = self.namespace,
            window = self.rate_window,
        )
    }

    pub fn build(&self, metric: &MetricDescriptor, window: &TimeWindow) -> RangeQuery {
        RangeQuery {
            metric: metric.name,
            promql: self.promql(metric),
            window: window.clone(),
        }
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new("default", "1m", "label_ow_action", "label_vim_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MetricKind, DEFAULT_CATALOG};
    use rstest::rstest;

    #[test]
    fn every_catalog_metric_gets_the_expected_aggregation() {
        let cumulative = |name: &str| {
            (name.starts_with("container_network_")
                && (name.ends_with("_bytes_total")
                    || name.ends_with("_errors_total")
                    || name.ends_with("_packets_total")
                    || name.ends_with("_packets_dropped_total")))
                || (name.starts_with("container_cpu_") && name.ends_with("_seconds_total"))
                || (name.starts_with("container_fs_") && name.ends_with("_bytes_total"))
        };
        let mut rated = 0;
        for metric in DEFAULT_CATALOG {
            let expected = if cumulative(metric.name) {
                rated += 1;
                Aggregation::Rate
            } else {
                Aggregation::AvgOverTime
            };
            assert_eq!(aggregation_for(metric.name), expected, "{}", metric.name);
        }
        assert_eq!(rated, 13);
    }

    #[test]
    fn every_gauge_is_averaged() {
        for metric in DEFAULT_CATALOG.iter().filter(|m| m.kind == MetricKind::Gauge) {
            assert_eq!(aggregation_for(metric.name), Aggregation::AvgOverTime, "{}", metric.name);
        }
    }

    #[rstest]
    #[case("container_network_receive_packets_total", Aggregation::Rate)]
    #[case("container_cpu_system_seconds_total", Aggregation::Rate)]
    #[case("container_fs_reads_bytes_total", Aggregation::Rate)]
    #[case("container_memory_usage_bytes", Aggregation::AvgOverTime)]
    #[case("container_network_tcp_usage_total", Aggregation::AvgOverTime)]
    #[case("something_unknown", Aggregation::AvgOverTime)]
    fn aggregation_selection(#[case] name: &str, #[case] expected: Aggregation) {
        assert_eq!(aggregation_for(name), expected);
    }

    #[test]
    fn promql_joins_pod_labels_and_groups_by_identity() {
        let q = QueryBuilder::default().promql(&MetricDescriptor::counter(
            "container_network_receive_packets_total",
            "packets",
        ));
        assert!(q.contains("rate(container_network_receive_packets_total{namespace=\"default\"}[1m])"), "{q}");
        assert!(q.contains("kube_pod_labels{label_ow_action!=\"\"}"), "{q}");
        assert!(q.contains("on(pod)"), "{q}");
        assert!(q.contains("group_right(label_ow_action, label_vim_id)"), "{q}");
        assert!(q.contains("label_replace("), "{q}");
        assert!(q.contains("\"pod_name\""), "{q}");
        assert!(q.trim_end().ends_with(") by (pod, label_ow_action, label_vim_id)"), "{q}");
    }

    #[test]
    fn promql_uses_configured_namespace_and_window() {
        let builder = QueryBuilder::new("monitoring", "5m", "label_app", "label_uid");
        let q = builder.promql(&MetricDescriptor::gauge("container_memory_usage_bytes", "bytes"));
        assert!(q.contains("avg_over_time(container_memory_usage_bytes{namespace=\"monitoring\"}[5m])"), "{q}");
        assert!(q.contains("by (pod, label_app, label_uid)"), "{q}");
    }

    #[test]
    fn window_spans_lookback() {
        let end = DateTime::<Utc>::from_timestamp(1600000020, 0).unwrap();
        let w = TimeWindow::ending_at(end, Duration::from_secs(20), "20s");
        assert_eq!(w.start_param(), "2020-09-13T12:26:40.000000Z");
        assert_eq!(w.end_param(), "2020-09-13T12:27:00.000000Z");
        assert_eq!(w.step, "20s");
    }

    #[test]
    fn build_carries_metric_and_window() {
        let window = TimeWindow::last(Duration::from_secs(20), "20s");
        let metric = MetricDescriptor::gauge("container_memory_swap", "bytes");
        let q = QueryBuilder::default().build(&metric, &window);
        assert_eq!(q.metric, "container_memory_swap");
        assert_eq!(q.window, window);
        assert!(q.promql.contains("container_memory_swap"));
    }
}

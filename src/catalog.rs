//! Static catalog of the container metrics collected on every cycle.
//!
//! The catalog is fixed at compile time. Each entry names a cAdvisor series
//! exposed through Prometheus together with its kind and unit, which are
//! copied verbatim into every outbound record.

use serde::{Deserialize, Serialize};

/// Prometheus metric kind, as reported in outbound records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry. Identity is the metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub kind: MetricKind,
    pub unit: &'static str,
}

impl MetricDescriptor {
    pub const fn counter(name: &'static str, unit: &'static str) -> Self {
        Self { name, kind: MetricKind::Counter, unit }
    }

    pub const fn gauge(name: &'static str, unit: &'static str) -> Self {
        Self { name, kind: MetricKind::Gauge, unit }
    }
}

pub const RX_PACKETS_DROPPED: &str = "container_network_receive_packets_dropped_total";
pub const RX_PACKETS_TOTAL: &str = "container_network_receive_packets_total";
pub const TX_PACKETS_DROPPED: &str = "container_network_transmit_packets_dropped_total";
pub const TX_PACKETS_TOTAL: &str = "container_network_transmit_packets_total";

pub const RX_PACKET_LOSS: &str = "container_network_receive_packet_loss_percentage";
pub const TX_PACKET_LOSS: &str = "container_network_transmit_packet_loss_percentage";

/// Metrics queried from the backend, in processing order.
pub const DEFAULT_CATALOG: &[MetricDescriptor] = &[
    // Filesystem
    MetricDescriptor::gauge("container_fs_inodes_free", ""),
    MetricDescriptor::gauge("container_fs_io_current", "iops"),
    MetricDescriptor::gauge("container_fs_usage_bytes", "bytes"),
    MetricDescriptor::counter("container_fs_writes_bytes_total", "bytes"),
    MetricDescriptor::counter("container_fs_reads_bytes_total", "bytes"),
    // CPU
    MetricDescriptor::gauge("container_cpu_load_average_10s", "seconds"),
    MetricDescriptor::counter("container_cpu_system_seconds_total", "seconds"),
    MetricDescriptor::counter("container_cpu_usage_seconds_total", "seconds"),
    MetricDescriptor::counter("container_cpu_cfs_throttled_seconds_total", "seconds"),
    // Memory
    MetricDescriptor::gauge("container_memory_usage_bytes", "bytes"),
    MetricDescriptor::gauge("container_memory_working_set_bytes", "bytes"),
    MetricDescriptor::gauge("container_memory_max_usage_bytes", "bytes"),
    MetricDescriptor::gauge("container_memory_swap", "bytes"),
    // Network
    MetricDescriptor::counter("container_network_receive_bytes_total", "bytes"),
    MetricDescriptor::counter("container_network_receive_errors_total", ""),
    MetricDescriptor::counter(RX_PACKETS_DROPPED, ""),
    MetricDescriptor::counter(RX_PACKETS_TOTAL, "packets"),
    MetricDescriptor::counter("container_network_transmit_bytes_total", "bytes"),
    MetricDescriptor::counter("container_network_transmit_errors_total", ""),
    MetricDescriptor::counter(TX_PACKETS_DROPPED, ""),
    MetricDescriptor::counter(TX_PACKETS_TOTAL, ""),
    MetricDescriptor::gauge("container_network_tcp_usage_total", ""),
    MetricDescriptor::gauge("container_network_udp_usage_total", ""),
    MetricDescriptor::gauge("container_spec_memory_reservation_limit_bytes", "bytes"),
];

/// Metrics computed locally at the end of each cycle. Never queried.
pub const DERIVED_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor::counter(RX_PACKET_LOSS, "%"),
    MetricDescriptor::counter(TX_PACKET_LOSS, "%"),
];

/// Look up a descriptor by name across queried and derived metrics.
pub fn find(name: &str) -> Option<&'static MetricDescriptor> {
    DEFAULT_CATALOG
        .iter()
        .chain(DERIVED_METRICS.iter())
        .find(|d| d.name == name)
}

/// Unit of `name`, or `""` when the metric is not catalogued.
pub fn unit_of(name: &str) -> &'static str {
    find(name).map(|d| d.unit).unwrap_or("")
}

/// Kind of `name` as a string, or `""` when the metric is not catalogued.
pub fn kind_of(name: &str) -> &'static str {
    find(name).map(|d| d.kind.as_str()).unwrap_or("")
}

//! # Prometheus
//!
//! Everything that talks to the metrics backend.
//!
//! 1. **Query building**: [`QueryBuilder`] renders one PromQL expression per
//!    catalog metric, choosing `rate` or `avg_over_time`.
//! 2. **Range queries**: [`PrometheusClient`] runs the expression against
//!    `/api/v1/query_range` over a [`TimeWindow`] and returns the typed
//!    result set.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = PrometheusClient::new(PrometheusClientConfig::new("http://prom:9090"))?;
//! let window = TimeWindow::last(Duration::from_secs(20), "20s");
//! let query = QueryBuilder::default().build(&descriptor, &window);
//! let data = client.query_range(&query).await?;
//! ```

pub mod client;
pub mod query;
pub mod response;

pub use client::{MetricsBackend, PrometheusClient, PrometheusClientConfig};
pub use query::{aggregation_for, Aggregation, QueryBuilder, RangeQuery, TimeWindow};
pub use response::{QueryRangeData, QueryRangeResponse, Series};

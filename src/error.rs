//! Error types shared across the collection pipeline.
//!
//! Every stage returns one of these as an explicit value; the cycle driver
//! inspects them, logs, and moves on. Nothing here is fatal to the process
//! except [`ConfigError`], which can only occur at startup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single `query_range` request.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend could not be reached (DNS, TCP, TLS, timeout).
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    /// The body was not the expected `query_range` JSON envelope.
    #[error("malformed response from {url}: {detail}")]
    Decode { url: String, detail: String },
}

impl QueryError {
    /// `true` for transport-level failures, `false` for shape failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, QueryError::Connect { .. } | QueryError::Http { .. })
    }
}

/// Failure reported by a message bus implementation.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection failed: {0}")]
    Connect(String),

    #[error("broker rejected message: {0}")]
    Produce(String),

    #[error("no delivery acknowledgment within {0:?}")]
    Timeout(Duration),
}

/// Failure to publish one [`MetricRecord`](crate::record::MetricRecord).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

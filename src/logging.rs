//! Log output setup.
//!
//! Console output is always on. When a log directory is configured two daily
//! rolling files are added: `publisher.log` with everything that passes the
//! level filter and `error.log` with `ERROR` events only.

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

pub const PUBLISHER_LOG: &str = "publisher.log";
pub const ERROR_LOG: &str = "error.log";

/// Keeps the background file writers alive. Hold it until shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _workers: Vec<WorkerGuard>,
}

/// `RUST_LOG` if set and valid, otherwise `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Call once, before the first cycle.
pub fn init_logging(
    settings: &LoggingSettings,
) -> Result<LogGuard, Box<dyn std::error::Error + Send + Sync>> {
    let mut workers = Vec::new();

    let file_layers = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (publisher, publisher_guard) =
                tracing_appender::non_blocking(rolling::daily(dir, PUBLISHER_LOG));
            let (errors, errors_guard) =
                tracing_appender::non_blocking(rolling::daily(dir, ERROR_LOG));
            workers.push(publisher_guard);
            workers.push(errors_guard);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(publisher)
                    .and_then(
                        fmt::layer()
                            .with_ansi(false)
                            .with_writer(errors.with_max_level(Level::ERROR)),
                    ),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.level))
        .with(fmt::layer().with_target(true))
        .with(file_layers)
        .try_init()?;

    Ok(LogGuard { _workers: workers })
}

use std::time::Duration;

use clap::Parser;
use tracing::info;

use kubernetes_prometheus_publisher::cli::Args;
use kubernetes_prometheus_publisher::logging;
use kubernetes_prometheus_publisher::prometheus::{PrometheusClient, PrometheusClientConfig};
use kubernetes_prometheus_publisher::{CycleDriver, KafkaBus, Publisher, Scheduler, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    if args.dump_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let _log_guard = logging::init_logging(&settings.logging)?;
    info!(
        prometheus = %settings.prometheus.base_url(),
        kafka = %settings.kafka.bootstrap_server(),
        topic = %settings.kafka.topic,
        interval_secs = settings.scheduler.interval_secs,
        "starting publisher"
    );

    let client = PrometheusClient::new(PrometheusClientConfig::from_settings(&settings.prometheus))?;
    let publisher = Publisher::new(KafkaBus::new(&settings.kafka), settings.kafka.topic.clone())
        .with_ack_timeout(Duration::from_secs(settings.kafka.ack_timeout_secs));
    let driver = CycleDriver::new(client, publisher, &settings);

    if args.once {
        driver.run_cycle().await;
        return Ok(());
    }

    Scheduler::new(driver, Duration::from_secs(settings.scheduler.interval_secs))
        .run_until(shutdown_signal())
        .await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested, finishing current cycle");
}

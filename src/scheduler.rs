//! # Scheduler
//!
//! Fires a cycle every `interval`, starting immediately.
//!
//! ## Guarantees
//! - Cycles never overlap. A tick that arrives while a cycle is still
//!   running is skipped, not queued ([`TickOutcome::SkippedBusy`])
//! - Shutdown is only observed between cycles; a running cycle always
//!   completes
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use kubernetes_prometheus_publisher::scheduler::Scheduler;
//! # async fn demo(scheduler: Scheduler<
//! #     kubernetes_prometheus_publisher::prometheus::PrometheusClient,
//! #     kubernetes_prometheus_publisher::bus::KafkaBus,
//! # >) {
//! scheduler.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await;
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::bus::MessageBus;
use crate::cycle::{CycleDriver, CycleReport};
use crate::prometheus::MetricsBackend;

/// Consecutive cycles that collect nothing before the warning becomes an error.
const ESCALATE_AFTER: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(CycleReport),
    SkippedBusy,
}

/// Clears the running flag when the cycle future finishes or is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler<M, B> {
    driver: CycleDriver<M, B>,
    interval: Duration,
    running: AtomicBool,
}

impl<M: MetricsBackend, B: MessageBus> Scheduler<M, B> {
    pub fn new(driver: CycleDriver<M, B>, interval: Duration) -> Self {
        Self {
            driver,
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` while a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cycle unless another one is already running.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("previous cycle still running, skipping tick");
            return TickOutcome::SkippedBusy;
        }
        let _guard = RunningGuard(&self.running);
        TickOutcome::Completed(self.driver.run_cycle().await)
    }

    /// Tick every `interval` until `shutdown` resolves.
    pub async fn run_until<F: Future>(self, shutdown: F) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut empty_cycles: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let TickOutcome::Completed(report) = self.tick().await {
                        if report.metrics_collected == 0 && report.metrics_failed() > 0 {
                            empty_cycles = empty_cycles.saturating_add(1);
                            if empty_cycles >= ESCALATE_AFTER {
                                error!(empty_cycles, "no metric collected, prometheus unreachable?");
                            } else {
                                warn!(empty_cycles, "no metric collected this cycle");
                            }
                        } else {
                            empty_cycles = 0;
                        }
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

//! Background sweeper for stale per-source state.
//!
//! # Responsibilities
//! - Periodically drop long-expired, low-offense block records
//! - Drop rate counters whose window has elapsed
//!
//! # Design Decisions
//! - Sleeps for the configured interval between passes and stops on the shutdown broadcast
//! - Repeat offenders are never swept, so their offense count survives

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::security::gate::SecurityMiddleware;

pub struct Sweeper {
    shield: Arc<SecurityMiddleware>,
}

impl Sweeper {
    pub fn new(shield: Arc<SecurityMiddleware>) -> Self {
        Self { shield }
    }

    /// Sweep until the shutdown signal fires.
    ///
    /// `sweep.enabled` and `sweep.interval_secs` are read before every pass,
    /// so a reloaded policy applies from the next pass on.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            enabled = self.shield.sweep_enabled(),
            interval_secs = self.shield.sweep_interval_secs(),
            "State sweeper starting"
        );

        loop {
            let interval = Duration::from_secs(self.shield.sweep_interval_secs());
            tokio::select! {
                _ = time::sleep(interval) => {
                    if !self.shield.sweep_enabled() {
                        continue;
                    }
                    let report = self.shield.sweep();
                    if report.blocks_removed > 0 || report.rate_records_removed > 0 {
                        tracing::debug!(
                            blocks_removed = report.blocks_removed,
                            rate_records_removed = report.rate_records_removed,
                            "Swept stale defense state"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("State sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::security::classifier::RequestView;
    use crate::security::types::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_until_shutdown() {
        let clock = Arc::new(ManualClock::new(0));
        let mut config = ShieldConfig::default();
        config.sweep.interval_secs = 1;
        let shield = Arc::new(SecurityMiddleware::with_clock(&config, clock.clone()).unwrap());

        shield.evaluate(&RequestView::new("1.2.3.4", "GET", "/"));
        assert_eq!(shield.rate_limiter().tracked_sources(), 1);
        clock.advance(120_000);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Sweeper::new(shield.clone()).run(rx));

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(shield.rate_limiter().tracked_sources(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_sweeper_leaves_state_and_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(0));
        let mut config = ShieldConfig::default();
        config.sweep.enabled = false;
        config.sweep.interval_secs = 1;
        let shield = Arc::new(SecurityMiddleware::with_clock(&config, clock.clone()).unwrap());

        shield.evaluate(&RequestView::new("1.2.3.4", "GET", "/"));
        clock.advance(120_000);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Sweeper::new(shield.clone()).run(rx));

        time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(shield.rate_limiter().tracked_sources(), 1);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reloaded_sweep_policy_applies() {
        let clock = Arc::new(ManualClock::new(0));
        let mut config = ShieldConfig::default();
        config.sweep.enabled = false;
        config.sweep.interval_secs = 1;
        let shield = Arc::new(SecurityMiddleware::with_clock(&config, clock.clone()).unwrap());

        shield.evaluate(&RequestView::new("1.2.3.4", "GET", "/"));
        clock.advance(120_000);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Sweeper::new(shield.clone()).run(rx));

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(shield.rate_limiter().tracked_sources(), 1);

        config.sweep.enabled = true;
        shield.apply_config(&config).unwrap();

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(shield.rate_limiter().tracked_sources(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}

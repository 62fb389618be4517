//! Background Refresher
//!
//! Periodically re-resolves every known endpoint so stale pairs are redialed
//! before a sync worker needs them. The task is cooperative: it watches a
//! cancellation token between endpoints and while waiting for the next tick,
//! and `stop()` only returns once the task has exited.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connections::Registry;
use crate::runtime::endpoint::EndpointAddress;

/// Outcome of one sweep over the registry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Endpoints that resolved, from cache or by redialing
    pub refreshed: usize,
    /// Endpoints whose redial failed
    pub failed: Vec<EndpointAddress>,
}

struct RunningSweep {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cancellable periodic sweep over a registry
pub struct Refresher {
    registry: Arc<Registry>,
    running: Mutex<Option<RunningSweep>>,
}

impl Refresher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            running: Mutex::new(None),
        }
    }

    /// Start sweeping. Returns `false` if a sweep task is already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        self.start_locked(&mut running)
    }

    /// Cancel the sweep task and wait for it to exit. Returns `false` when
    /// nothing was running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        Self::stop_locked(&mut running).await
    }

    /// Stop, raise the registry period to at least `period`, and start again
    pub async fn restart(&self, period: Duration) -> bool {
        let mut running = self.running.lock().await;
        Self::stop_locked(&mut running).await;
        self.registry.set_freshness_period(period);
        self.start_locked(&mut running)
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|sweep| !sweep.handle.is_finished())
            .unwrap_or(false)
    }

    /// Run a single sweep on the calling task
    pub async fn sweep_once(&self) -> SweepReport {
        sweep(&self.registry, self.registry.period(), &CancellationToken::new()).await
    }

    fn start_locked(&self, running: &mut Option<RunningSweep>) -> bool {
        if let Some(sweep) = running.as_ref() {
            if !sweep.handle.is_finished() {
                debug!("Refresher already running");
                return false;
            }
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(self.registry.clone(), token.clone()));
        *running = Some(RunningSweep { token, handle });

        info!(
            period_ms = self.registry.period().as_millis() as u64,
            "Refresher started"
        );
        true
    }

    async fn stop_locked(running: &mut Option<RunningSweep>) -> bool {
        let Some(sweep) = running.take() else {
            return false;
        };

        sweep.token.cancel();
        if let Err(e) = sweep.handle.await {
            warn!(error = %e, "Refresher task ended abnormally");
        }

        info!("Refresher stopped");
        true
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        if let Some(sweep) = self.running.get_mut().take() {
            sweep.token.cancel();
        }
    }
}

async fn run(registry: Arc<Registry>, token: CancellationToken) {
    loop {
        let period = registry.period();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }

        let report = sweep(&registry, period, &token).await;
        debug!(
            refreshed = report.refreshed,
            failed = report.failed.len(),
            "Refresh sweep finished"
        );
    }
    debug!("Refresher task exiting");
}

async fn sweep(registry: &Registry, period: Duration, token: &CancellationToken) -> SweepReport {
    let mut report = SweepReport::default();

    for (address, _) in registry.snapshot() {
        if token.is_cancelled() {
            break;
        }

        match registry.resolve_address(&address, period).await {
            Ok(_) => report.refreshed += 1,
            Err(e) => {
                warn!(address = %address, error = %e, "Endpoint refresh failed");
                report.failed.push(address);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::connections::DEFAULT_PERIOD;
    use crate::runtime::mock::{addr, ManualClock, MockConnector};

    const CRIO: &str = "unix:///var/run/crio/crio.sock";
    const DOCKER: &str = "unix:///var/run/docker.sock";

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_handshakes() {
        let registry = Arc::new(Registry::new(MockConnector::new(), DEFAULT_PERIOD));
        let refresher = Refresher::new(registry);

        assert!(refresher.start().await);
        assert!(!refresher.start().await);
        assert!(refresher.is_running().await);

        assert!(refresher.stop().await);
        assert!(!refresher.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_without_task_returns_immediately() {
        let registry = Arc::new(Registry::new(MockConnector::new(), DEFAULT_PERIOD));
        let refresher = Refresher::new(registry);

        let stopped = tokio::time::timeout(Duration::from_secs(1), refresher.stop()).await;
        assert_eq!(stopped.ok(), Some(false));
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop() {
        let connector = MockConnector::new();
        let registry = Arc::new(Registry::new(connector.clone(), Duration::from_millis(40)));
        registry
            .resolve(CRIO, CRIO, Duration::from_millis(40))
            .await
            .unwrap();
        let refresher = Refresher::new(registry);

        refresher.start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        refresher.stop().await;

        let dials = connector.dial_count();
        assert!(dials > 1, "expected redials while running, got {dials}");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.dial_count(), dials);
    }

    #[tokio::test]
    async fn test_restart_ratchets_period() {
        let registry = Arc::new(Registry::new(MockConnector::new(), DEFAULT_PERIOD));
        let refresher = Refresher::new(registry.clone());
        refresher.start().await;

        assert!(refresher.restart(Duration::from_secs(30)).await);
        assert_eq!(registry.period(), Duration::from_secs(30));

        assert!(refresher.restart(Duration::from_secs(5)).await);
        assert_eq!(registry.period(), Duration::from_secs(30));
        assert!(refresher.is_running().await);

        refresher.stop().await;
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failures() {
        let connector = MockConnector::new();
        let clock = ManualClock::new();
        let registry =
            Arc::new(Registry::new(connector.clone(), DEFAULT_PERIOD).with_clock(clock.clone()));
        registry
            .resolve(CRIO, CRIO, DEFAULT_PERIOD)
            .await
            .unwrap();
        registry
            .resolve(DOCKER, DOCKER, DEFAULT_PERIOD)
            .await
            .unwrap();

        connector.fail(CRIO);
        clock.advance(Duration::from_secs(1));
        let refresher = Refresher::new(registry.clone());
        let report = refresher.sweep_once().await;

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, vec![addr(CRIO)]);
        assert_eq!(connector.dial_count(), 4);
        assert!(registry.is_known(&addr(CRIO)));
    }

    #[tokio::test]
    async fn test_sweep_ignores_endpoints_registered_mid_sweep() {
        let connector = MockConnector::new();
        let clock = ManualClock::new();
        let registry =
            Arc::new(Registry::new(connector.clone(), DEFAULT_PERIOD).with_clock(clock.clone()));
        registry
            .resolve(CRIO, CRIO, DEFAULT_PERIOD)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(1));
        connector.set_delay(Duration::from_millis(100));
        let refresher = Refresher::new(registry.clone());
        let (report, docker) = tokio::join!(refresher.sweep_once(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            registry.resolve(DOCKER, DOCKER, DEFAULT_PERIOD).await
        });

        assert!(docker.is_ok());
        assert_eq!(report.refreshed, 1);
        assert!(report.failed.is_empty());
        assert!(registry.is_known(&addr(DOCKER)));
        assert_eq!(connector.dial_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_restarts_during_slow_tick() {
        let connector = MockConnector::new();
        let registry = Arc::new(Registry::new(connector.clone(), Duration::from_millis(40)));
        registry
            .resolve(CRIO, CRIO, Duration::from_millis(40))
            .await
            .unwrap();
        connector.set_delay(Duration::from_millis(60));

        let refresher = Refresher::new(registry.clone());
        refresher.start().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let restarted = tokio::join!(
            refresher.restart(Duration::from_millis(40)),
            refresher.restart(Duration::from_millis(40)),
            refresher.restart(Duration::from_millis(40)),
        );
        assert!(restarted.0 && restarted.1 && restarted.2);
        assert!(refresher.is_running().await);

        assert!(refresher.stop().await);
        assert!(!refresher.is_running().await);
        let dials = connector.dial_count();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(connector.dial_count(), dials);
    }

    #[tokio::test]
    async fn test_fresh_pairs_not_redialed_by_sweep() {
        let connector = MockConnector::new();
        let registry = Arc::new(
            Registry::new(connector.clone(), Duration::from_secs(60))
                .with_clock(ManualClock::new()),
        );
        registry
            .resolve(CRIO, CRIO, Duration::from_secs(60))
            .await
            .unwrap();

        let report = Refresher::new(registry).sweep_once().await;

        assert_eq!(report.refreshed, 1);
        assert_eq!(connector.dial_count(), 1);
    }
}

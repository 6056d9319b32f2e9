//! Periodic delta sync.
//!
//! While running, pushes the peer list and instance statistics through the
//! strategy on a fixed interval. The model is read at fire time, never
//! snapshotted ahead of it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use uplink_core::errors::SyncError;
use uplink_core::events::{SyncOp, SyncPath};
use uplink_core::model::StateModel;
use uplink_core::transport::SessionSlot;

use crate::strategy::SyncStrategy;

/// Timing for the periodic delta sync.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Delay before the first firing.
    pub initial_delay: Duration,
    /// Spacing between subsequent firings.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(3000),
            interval: Duration::from_secs(5),
        }
    }
}

/// Fixed-interval scheduler: `Stopped -> Running` on `start()`, back on
/// `stop()`.
pub struct PeriodicSync {
    strategy: Arc<dyn SyncStrategy>,
    slot: Arc<SessionSlot>,
    model: Arc<dyn StateModel>,
    config: SchedulerConfig,
    running: Mutex<Option<CancellationToken>>,
}

impl PeriodicSync {
    pub fn new(
        strategy: Arc<dyn SyncStrategy>,
        slot: Arc<SessionSlot>,
        model: Arc<dyn StateModel>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            strategy,
            slot,
            model,
            config,
            running: Mutex::new(None),
        }
    }

    /// Begin firing. A second `start()` while running is a no-op, and with
    /// no timer facility (no reactor on the current thread) the scheduler
    /// degrades to a logged no-op instead of failing the service.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::debug!("Periodic sync already running");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let err = SyncError::SchedulerUnavailable;
            tracing::warn!(error = %err, kind = err.kind(), "Periodic sync disabled");
            return;
        };

        let token = CancellationToken::new();
        *running = Some(token.clone());

        let strategy = Arc::clone(&self.strategy);
        let slot = Arc::clone(&self.slot);
        let model = Arc::clone(&self.model);
        let config = self.config;

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(config.initial_delay) => {}
            }

            let mut ticker = tokio::time::interval(config.interval);
            ticker.tick().await; // consume first immediate tick

            loop {
                fire(&*strategy, &slot, &*model);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
            }
        });
    }

    /// Cancel pending firings without waiting for an in-flight one.
    /// Idempotent; safe to call when never started.
    pub fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
            tracing::debug!("Periodic sync stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

/// One scheduler firing: two independent delta syncs, peers first.
fn fire(strategy: &dyn SyncStrategy, slot: &SessionSlot, model: &dyn StateModel) {
    let session = slot.current();
    strategy.sync(session.as_ref(), SyncOp::Add, &SyncPath::Peers, &model.peers());
    strategy.sync(
        session.as_ref(),
        SyncOp::Add,
        &SyncPath::InstanceStats,
        &model.instance_stats(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStrategy;
    use uplink_core::model::MemoryModel;

    fn scheduler(
        config: SchedulerConfig,
    ) -> (PeriodicSync, Arc<RecordingStrategy>, Arc<MemoryModel>) {
        let strategy = RecordingStrategy::new();
        let model = Arc::new(MemoryModel::new());
        let slot = Arc::new(SessionSlot::new());
        let periodic = PeriodicSync::new(
            strategy.clone(),
            slot,
            model.clone(),
            config,
        );
        (periodic, strategy, model)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn start_without_runtime_degrades_to_noop() {
        let (periodic, strategy, _model) = scheduler(SchedulerConfig::default());
        periodic.start();
        assert!(!periodic.is_running());
        assert!(strategy.is_empty());
    }

    #[test]
    fn stop_before_start_never_panics() {
        let (periodic, strategy, _model) = scheduler(SchedulerConfig::default());
        periodic.stop();
        periodic.stop();
        assert!(!periodic.is_running());
        assert!(strategy.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_firing_waits_for_initial_delay() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(3000),
            interval: Duration::from_millis(5000),
        };
        let (periodic, strategy, _model) = scheduler(config);

        periodic.start();
        settle().await;

        tokio::time::advance(Duration::from_millis(2999)).await;
        settle().await;
        assert!(strategy.is_empty(), "fired before the initial delay");

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(strategy.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn each_firing_pushes_peers_then_stats() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(3000),
            interval: Duration::from_millis(5000),
        };
        let (periodic, strategy, _model) = scheduler(config);

        periodic.start();
        settle().await;
        tokio::time::advance(Duration::from_millis(3000)).await;
        settle().await;

        let calls = strategy.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].op, SyncOp::Add);
        assert_eq!(calls[0].path, SyncPath::Peers);
        assert_eq!(calls[1].op, SyncOp::Add);
        assert_eq!(calls[1].path, SyncPath::InstanceStats);

        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(strategy.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn model_is_read_at_fire_time() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(1000),
        };
        let (periodic, strategy, model) = scheduler(config);

        periodic.start();
        settle().await;

        // Mutate after start but before the first firing.
        model.set("peers", serde_json::json!([{"id": "late"}]));

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;

        let calls = strategy.calls();
        assert_eq!(calls[0].value, serde_json::json!([{"id": "late"}]));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_firings() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(1000),
        };
        let (periodic, strategy, _model) = scheduler(config);

        periodic.start();
        settle().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(strategy.len(), 2);

        periodic.stop();
        assert!(!periodic.is_running());

        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(strategy.len(), 2, "fired after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_double_schedule() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(1000),
        };
        let (periodic, strategy, _model) = scheduler(config);

        periodic.start();
        periodic.start();
        settle().await;

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(strategy.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_runs_again() {
        let config = SchedulerConfig {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_millis(1000),
        };
        let (periodic, strategy, _model) = scheduler(config);

        periodic.start();
        settle().await;
        periodic.stop();

        periodic.start();
        settle().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(strategy.len(), 2);
    }
}

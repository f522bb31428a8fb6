//! Warm-pool coordination
//!
//! The scoring service runs on autoscaled instances with a noticeable cold
//! start. [`WarmupCoordinator`] keeps the pool warm by fanning out cheap probe
//! requests, one per instance, whenever the pool has been idle for longer than
//! the warmup interval.
//!
//! The interval check and the fan-out run under one exclusive gate, so
//! concurrent callers serialize: the first pays for the warmup, the rest see
//! the fresh activity timestamp and return immediately.
//!
//! Pool bookkeeping itself sits behind a short-lived std mutex that is never
//! held across an await, so [`WarmupCoordinator::snapshot`] answers while a
//! fan-out is still in flight.

use crate::services::scoring_client::{is_valid_probe_response, send_cancellable, ScoringBackend};
use crate::types::ScoreRequest;
use futures::future::join_all;
use serde::Serialize;
use starc_common::config::{ScoringSettings, MAX_POOL_INSTANCES};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Placeholder payload sent by every warmup probe
pub const WARMUP_TEXT: &str = "Warmup request.";

/// Process-wide pool bookkeeping
#[derive(Debug, Default)]
struct PoolState {
    last_activity: Option<Instant>,
    fan_outs: u64,
    warming: bool,
}

impl PoolState {
    fn is_warm_at(&self, now: Instant, interval: Duration) -> bool {
        self.last_activity
            .is_some_and(|last| now.saturating_duration_since(last) < interval)
    }

    /// Record activity; never moves the timestamp backwards
    fn touch(&mut self, now: Instant) {
        self.last_activity = Some(match self.last_activity {
            Some(last) if last > now => last,
            _ => now,
        });
    }
}

/// Point-in-time view of the pool for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub max_instances: usize,
    pub warmup_interval_secs: u64,
    /// Seconds since the last successful warmup or scoring round
    pub seconds_since_activity: Option<u64>,
    pub is_warm: bool,
    /// A warmup fan-out is in flight
    pub warming: bool,
    /// Number of warmup fan-outs issued since startup
    pub warmup_fan_outs: u64,
}

/// Clears the `warming` flag when a fan-out ends or its future is dropped
struct WarmingGuard<'a> {
    state: &'a StdMutex<PoolState>,
}

impl Drop for WarmingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .warming = false;
    }
}

/// Gatekeeper for warmup fan-outs against one scoring pool
pub struct WarmupCoordinator {
    backend: Arc<dyn ScoringBackend>,
    /// Held across the warm/not-warm decision and the fan-out
    gate: Mutex<()>,
    state: StdMutex<PoolState>,
    max_instances: usize,
    warmup_interval: Duration,
}

impl WarmupCoordinator {
    /// Create a coordinator for a pool of `max_instances`, clamped to
    /// `1..=MAX_POOL_INSTANCES`
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        max_instances: usize,
        warmup_interval: Duration,
    ) -> Self {
        Self {
            backend,
            gate: Mutex::new(()),
            state: StdMutex::new(PoolState::default()),
            max_instances: max_instances.clamp(1, MAX_POOL_INSTANCES),
            warmup_interval,
        }
    }

    pub fn from_settings(backend: Arc<dyn ScoringBackend>, settings: &ScoringSettings) -> Self {
        Self::new(backend, settings.max_instances, settings.warmup_interval)
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    pub fn warmup_interval(&self) -> Duration {
        self.warmup_interval
    }

    fn pool(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make sure the pool is warm, probing it if the interval has elapsed
    ///
    /// Returns `true` when the pool was already warm or at least one probe
    /// succeeded. Returns `false` when every probe failed; the activity
    /// timestamp is left unchanged in that case. Probe errors never escape.
    pub async fn ensure_warm(&self, cancel: &CancellationToken) -> bool {
        let _gate = self.gate.lock().await;

        if self.pool().is_warm_at(Instant::now(), self.warmup_interval) {
            debug!("Scoring pool already warm, skipping warmup");
            return true;
        }

        self.warm_locked(cancel).await > 0
    }

    /// Probe every instance regardless of the interval
    ///
    /// Returns the number of successful probes. Still serialized with
    /// [`ensure_warm`](Self::ensure_warm).
    pub async fn force_warmup(&self, cancel: &CancellationToken) -> usize {
        let _gate = self.gate.lock().await;
        self.warm_locked(cancel).await
    }

    /// Record real scoring traffic so redundant warmups are skipped
    pub async fn update_activity(&self) {
        let _gate = self.gate.lock().await;
        self.pool().touch(Instant::now());
    }

    /// Current pool state; never waits on an in-flight warmup
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.pool();
        let now = Instant::now();
        PoolSnapshot {
            max_instances: self.max_instances,
            warmup_interval_secs: self.warmup_interval.as_secs(),
            seconds_since_activity: state
                .last_activity
                .map(|last| now.saturating_duration_since(last).as_secs()),
            is_warm: state.is_warm_at(now, self.warmup_interval),
            warming: state.warming,
            warmup_fan_outs: state.fan_outs,
        }
    }

    /// Caller must hold `gate`
    async fn warm_locked(&self, cancel: &CancellationToken) -> usize {
        info!(instances = self.max_instances, "Warming scoring pool");
        let started = Instant::now();

        {
            let mut state = self.pool();
            state.fan_outs += 1;
            state.warming = true;
        }
        let warming = WarmingGuard { state: &self.state };

        let successes = self.fan_out(cancel).await;

        if successes > 0 {
            self.pool().touch(Instant::now());
            info!(
                successes,
                instances = self.max_instances,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scoring pool warm"
            );
        } else {
            warn!(
                instances = self.max_instances,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "All warmup probes failed, scoring pool may be cold"
            );
        }
        drop(warming);
        successes
    }

    /// Issue `max_instances` concurrent probes and count valid responses
    async fn fan_out(&self, cancel: &CancellationToken) -> usize {
        let request = ScoreRequest::single(WARMUP_TEXT);
        let backend = self.backend.as_ref();

        let probes = (0..self.max_instances).map(|probe| {
            let request = &request;
            async move {
                match send_cancellable(backend, request, cancel).await {
                    Ok(body) if is_valid_probe_response(&body) => true,
                    Ok(_) => {
                        debug!(probe, "Warmup probe returned unexpected body");
                        false
                    }
                    Err(e) => {
                        debug!(probe, error = %e, "Warmup probe failed");
                        false
                    }
                }
            }
        });

        join_all(probes).await.into_iter().filter(|ok| *ok).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring_client::ScoringError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that counts calls and answers with a fixed outcome
    struct ProbeBackend {
        calls: AtomicUsize,
        /// Succeed only for the first N calls (usize::MAX = always)
        succeed_first: usize,
        delay: Duration,
    }

    impl ProbeBackend {
        fn healthy() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed_first: usize::MAX,
                delay: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                succeed_first: 0,
                ..Self::healthy()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScoringBackend for ProbeBackend {
        async fn post(&self, _request: &ScoreRequest) -> Result<Value, ScoringError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if n < self.succeed_first {
                Ok(json!({"tone": {"positive": 1.0}, "fls": {"specific": 1.0}}))
            } else {
                Err(ScoringError::Status(503, "cold".to_string()))
            }
        }
    }

    fn coordinator(backend: Arc<ProbeBackend>, instances: usize) -> WarmupCoordinator {
        WarmupCoordinator::new(backend, instances, Duration::from_secs(600))
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_fan_out_once() {
        let backend = Arc::new(ProbeBackend::healthy());
        let warmup = coordinator(Arc::clone(&backend), 20);
        let cancel = CancellationToken::new();

        assert!(warmup.ensure_warm(&cancel).await);
        assert!(warmup.ensure_warm(&cancel).await);

        assert_eq!(backend.calls(), 20);
        assert_eq!(warmup.snapshot().warmup_fan_outs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_serialize() {
        let backend = Arc::new(ProbeBackend {
            delay: Duration::from_millis(200),
            ..ProbeBackend::healthy()
        });
        let warmup = Arc::new(coordinator(Arc::clone(&backend), 8));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let warmup = Arc::clone(&warmup);
            handles.push(tokio::spawn(async move {
                warmup.ensure_warm(&CancellationToken::new()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(backend.calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewarms_after_interval() {
        let backend = Arc::new(ProbeBackend::healthy());
        let warmup = coordinator(Arc::clone(&backend), 4);
        let cancel = CancellationToken::new();

        assert!(warmup.ensure_warm(&cancel).await);
        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(warmup.ensure_warm(&cancel).await);
        assert_eq!(backend.calls(), 4);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(warmup.ensure_warm(&cancel).await);
        assert_eq!(backend.calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_failing_leaves_pool_cold() {
        let backend = Arc::new(ProbeBackend::failing());
        let warmup = coordinator(Arc::clone(&backend), 5);
        let cancel = CancellationToken::new();

        assert!(!warmup.ensure_warm(&cancel).await);
        let snapshot = warmup.snapshot();
        assert!(!snapshot.is_warm);
        assert_eq!(snapshot.seconds_since_activity, None);

        // Still cold, so the next call probes again
        assert!(!warmup.ensure_warm(&cancel).await);
        assert_eq!(backend.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_successful_probe_is_enough() {
        let backend = Arc::new(ProbeBackend {
            succeed_first: 1,
            ..ProbeBackend::healthy()
        });
        let warmup = coordinator(Arc::clone(&backend), 6);

        assert!(warmup.ensure_warm(&CancellationToken::new()).await);
        assert!(warmup.snapshot().is_warm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_activity_defers_warmup() {
        let backend = Arc::new(ProbeBackend::healthy());
        let warmup = coordinator(Arc::clone(&backend), 3);

        warmup.update_activity().await;
        assert!(warmup.ensure_warm(&CancellationToken::new()).await);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_fails_probes() {
        let backend = Arc::new(ProbeBackend::healthy());
        let warmup = coordinator(Arc::clone(&backend), 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(!warmup.ensure_warm(&cancel).await);
        assert!(!warmup.snapshot().is_warm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_warmup_ignores_interval() {
        let backend = Arc::new(ProbeBackend::healthy());
        let warmup = coordinator(Arc::clone(&backend), 2);
        let cancel = CancellationToken::new();

        assert_eq!(warmup.force_warmup(&cancel).await, 2);
        assert_eq!(warmup.force_warmup(&cancel).await, 2);
        assert_eq!(backend.calls(), 4);
        assert_eq!(warmup.snapshot().warmup_fan_outs, 2);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut state = PoolState::default();
        let later = Instant::now();
        let earlier = later - Duration::from_secs(5);

        state.touch(later);
        state.touch(earlier);
        assert_eq!(state.last_activity, Some(later));
    }

    #[test]
    fn test_pool_width_clamped() {
        let warmup = WarmupCoordinator::new(
            Arc::new(ProbeBackend::healthy()),
            0,
            Duration::from_secs(1),
        );
        assert_eq!(warmup.max_instances(), 1);

        let warmup = WarmupCoordinator::new(
            Arc::new(ProbeBackend::healthy()),
            usize::MAX,
            Duration::from_secs(1),
        );
        assert_eq!(warmup.max_instances(), MAX_POOL_INSTANCES);
    }

    #[test]
    fn test_from_settings_uses_resolved_values() {
        let settings = ScoringSettings {
            base_url: "http://127.0.0.1:1/score".to_string(),
            api_key: "key".to_string(),
            bearer_token: None,
            max_instances: 7,
            warmup_interval: Duration::from_secs(90),
            request_timeout: Duration::from_secs(5),
        };
        let warmup =
            WarmupCoordinator::from_settings(Arc::new(ProbeBackend::healthy()), &settings);

        assert_eq!(warmup.max_instances(), 7);
        assert_eq!(warmup.warmup_interval(), Duration::from_secs(90));
    }

    /// Backend whose probes block until released
    #[derive(Default)]
    struct GatedBackend {
        started: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl ScoringBackend for GatedBackend {
        async fn post(&self, _request: &ScoreRequest) -> Result<Value, ScoringError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(json!({"tone": {"positive": 1.0}, "fls": {"specific": 1.0}}))
        }
    }

    #[tokio::test]
    async fn test_snapshot_answers_during_fan_out() {
        let backend = Arc::new(GatedBackend::default());
        let warmup = Arc::new(WarmupCoordinator::new(
            backend.clone(),
            1,
            Duration::from_secs(600),
        ));

        let task = tokio::spawn({
            let warmup = Arc::clone(&warmup);
            async move { warmup.ensure_warm(&CancellationToken::new()).await }
        });
        backend.started.notified().await;

        let during = warmup.snapshot();
        assert!(during.warming);
        assert!(!during.is_warm);
        assert_eq!(during.warmup_fan_outs, 1);

        backend.release.notify_one();
        assert!(task.await.unwrap());

        let after = warmup.snapshot();
        assert!(!after.warming);
        assert!(after.is_warm);
    }

    #[tokio::test]
    async fn test_abandoned_fan_out_clears_warming() {
        let backend = Arc::new(GatedBackend::default());
        let warmup = Arc::new(WarmupCoordinator::new(
            backend.clone(),
            1,
            Duration::from_secs(600),
        ));

        let task = tokio::spawn({
            let warmup = Arc::clone(&warmup);
            async move { warmup.ensure_warm(&CancellationToken::new()).await }
        });
        backend.started.notified().await;
        assert!(warmup.snapshot().warming);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let snapshot = warmup.snapshot();
        assert!(!snapshot.warming);
        assert!(!snapshot.is_warm);
    }
}

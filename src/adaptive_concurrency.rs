// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Adaptive Concurrency Module
 * Admission gate whose width follows observed latency and error rate
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::ConcurrencyPolicy;
use crate::errors::ConfigError;
use crate::types::{FailureKind, OutcomeSignal};

/// Pool sizing state, guarded by the controller's mutex
#[derive(Debug, Clone)]
struct PoolState {
    current: usize,
    min: usize,
    max: usize,
    in_flight: usize,
    /// Recent outcomes, `true` for a failure
    window: VecDeque<bool>,
    avg_latency_ms: f64,
    consecutive_timeouts: u32,
    total_reports: u64,
    adjustments: u64,
}

impl PoolState {
    fn error_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().filter(|failed| **failed).count() as f64 / self.window.len() as f64
    }
}

/// Point-in-time view of the pool, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSnapshot {
    pub current: usize,
    pub min: usize,
    pub max: usize,
    pub in_flight: usize,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub adjustments: u64,
}

/// Adaptive admission controller.
///
/// `admit` waits until fewer than `current` leases are outstanding.
/// `report` feeds completed fetches into the rolling statistics and resizes
/// `current` within `[min, max]`. Shrinking never revokes leases already
/// handed out; it only delays new admissions until enough are released.
pub struct ConcurrencyController {
    state: Mutex<PoolState>,
    capacity: Notify,
    policy: ConcurrencyPolicy,
}

impl ConcurrencyController {
    /// Create a controller starting at `min` concurrency
    pub fn new(min: usize, max: usize, policy: ConcurrencyPolicy) -> Result<Arc<Self>, ConfigError> {
        if min == 0 || min > max {
            return Err(ConfigError::InvalidConcurrencyRange { min, max });
        }

        Ok(Arc::new(Self {
            state: Mutex::new(PoolState {
                current: min,
                min,
                max,
                in_flight: 0,
                window: VecDeque::with_capacity(policy.window),
                avg_latency_ms: 0.0,
                consecutive_timeouts: 0,
                total_reports: 0,
                adjustments: 0,
            }),
            capacity: Notify::new(),
            policy,
        }))
    }

    /// Wait for a free slot and take it
    pub async fn admit(self: &Arc<Self>) -> Lease {
        loop {
            // Register interest before checking so a release between the
            // check and the await is not lost.
            let notified = self.capacity.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(lease) = self.try_admit() {
                return lease;
            }

            notified.await;
        }
    }

    /// Take a slot if one is free right now
    pub fn try_admit(self: &Arc<Self>) -> Option<Lease> {
        let mut state = self.state.lock();
        if state.in_flight < state.current {
            state.in_flight += 1;
            Some(Lease {
                controller: Some(Arc::clone(self)),
            })
        } else {
            None
        }
    }

    fn release(&self) {
        let wake = {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight < state.current
        };
        if wake {
            self.capacity.notify_one();
        }
    }

    /// Record a completed fetch and resize the pool if the policy says so
    pub fn report(&self, signal: &OutcomeSignal) {
        let grew = {
            let mut state = self.state.lock();
            self.observe(&mut state, signal);
            let before = state.current;
            self.adjust(&mut state);
            state.current > before
        };

        if grew {
            self.capacity.notify_waiters();
        }
    }

    fn observe(&self, state: &mut PoolState, signal: &OutcomeSignal) {
        state.total_reports += 1;

        let failed = signal.failure.is_some();
        if state.window.len() == self.policy.window {
            state.window.pop_front();
        }
        state.window.push_back(failed);

        match signal.failure {
            Some(FailureKind::Timeout) => state.consecutive_timeouts += 1,
            _ => state.consecutive_timeouts = 0,
        }

        // Failed fetches carry no useful latency
        if !failed {
            let latency_ms = signal.latency.as_secs_f64() * 1000.0;
            if state.avg_latency_ms == 0.0 {
                state.avg_latency_ms = latency_ms;
            } else {
                state.avg_latency_ms = 0.7 * state.avg_latency_ms + 0.3 * latency_ms;
            }
        }
    }

    fn adjust(&self, state: &mut PoolState) {
        let error_rate = state.error_rate();
        let timeout_burst = state.consecutive_timeouts >= self.policy.timeout_burst;

        // Backoff on a timeout burst does not wait for a full window
        if timeout_burst || (state.window.len() >= self.policy.window && error_rate > self.policy.high_water) {
            let scaled = ((state.current as f64) * self.policy.decrease_factor).floor() as usize;
            let target = scaled.min(state.current.saturating_sub(1)).max(state.min);
            if target != state.current {
                info!(
                    "Reducing concurrency: {} -> {} (error rate {:.1}%, consecutive timeouts {})",
                    state.current,
                    target,
                    error_rate * 100.0,
                    state.consecutive_timeouts
                );
                state.current = target;
                state.adjustments += 1;
            }
            state.window.clear();
            state.consecutive_timeouts = 0;
            return;
        }

        if state.window.len() < self.policy.window {
            return;
        }

        if error_rate < self.policy.low_water
            && state.avg_latency_ms < self.policy.latency_ceiling_ms as f64
        {
            let target = (state.current + self.policy.increase_step).min(state.max);
            if target != state.current {
                debug!(
                    "Increasing concurrency: {} -> {} (avg latency {:.1}ms)",
                    state.current, target, state.avg_latency_ms
                );
                state.current = target;
                state.adjustments += 1;
            }
            state.window.clear();
        }
    }

    pub fn current(&self) -> usize {
        self.state.lock().current
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            current: state.current,
            min: state.min,
            max: state.max,
            in_flight: state.in_flight,
            error_rate: state.error_rate(),
            avg_latency_ms: state.avg_latency_ms,
            adjustments: state.adjustments,
        }
    }
}

/// Admission slot. Released exactly once, either through `complete` or on drop.
pub struct Lease {
    controller: Option<Arc<ConcurrencyController>>,
}

impl Lease {
    /// Report the fetch outcome and give the slot back
    pub fn complete(mut self, signal: &OutcomeSignal) {
        if let Some(controller) = self.controller.take() {
            controller.release();
            controller.report(signal);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.release();
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("active", &self.controller.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> ConcurrencyPolicy {
        ConcurrencyPolicy {
            increase_step: 2,
            decrease_factor: 0.5,
            low_water: 0.01,
            high_water: 0.1,
            latency_ceiling_ms: 500,
            timeout_burst: 5,
            window: 10,
        }
    }

    #[test]
    fn test_invalid_range_rejected() {
        assert!(ConcurrencyController::new(0, 4, policy()).is_err());
        assert!(ConcurrencyController::new(8, 4, policy()).is_err());
    }

    #[tokio::test]
    async fn test_initial_concurrency_is_min() {
        let controller = ConcurrencyController::new(4, 16, policy()).unwrap();
        assert_eq!(controller.current(), 4);
    }

    #[tokio::test]
    async fn test_admission_respects_current() {
        let controller = ConcurrencyController::new(2, 8, policy()).unwrap();
        let a = controller.admit().await;
        let _b = controller.admit().await;
        assert!(controller.try_admit().is_none());
        assert_eq!(controller.in_flight(), 2);

        drop(a);
        assert_eq!(controller.in_flight(), 1);
        assert!(controller.try_admit().is_some());
    }

    #[tokio::test]
    async fn test_blocked_admit_wakes_on_release() {
        let controller = ConcurrencyController::new(1, 1, policy()).unwrap();
        let lease = controller.admit().await;

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let _lease = controller.admit().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        lease.complete(&OutcomeSignal::success(Duration::from_millis(10)));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be admitted")
            .unwrap();
    }

    #[tokio::test]
    async fn test_grows_on_fast_clean_responses() {
        let controller = ConcurrencyController::new(4, 16, policy()).unwrap();
        for _ in 0..40 {
            controller.report(&OutcomeSignal::success(Duration::from_millis(50)));
        }
        assert!(controller.current() > 4);
        assert!(controller.current() <= 16);
    }

    #[tokio::test]
    async fn test_does_not_grow_on_slow_responses() {
        let controller = ConcurrencyController::new(4, 16, policy()).unwrap();
        for _ in 0..40 {
            controller.report(&OutcomeSignal::success(Duration::from_millis(900)));
        }
        assert_eq!(controller.current(), 4);
    }

    #[tokio::test]
    async fn test_shrinks_on_high_error_rate_never_below_min() {
        let controller = ConcurrencyController::new(3, 64, policy()).unwrap();
        for _ in 0..200 {
            controller.report(&OutcomeSignal::success(Duration::from_millis(10)));
        }
        let peak = controller.current();
        assert!(peak > 3);

        for _ in 0..200 {
            controller.report(&OutcomeSignal::transport_error(Duration::from_millis(10)));
            let snapshot = controller.snapshot();
            assert!(snapshot.current >= snapshot.min && snapshot.current <= snapshot.max);
        }
        assert_eq!(controller.current(), 3);
    }

    #[tokio::test]
    async fn test_timeout_burst_forces_backoff() {
        let controller = ConcurrencyController::new(2, 32, policy()).unwrap();
        for _ in 0..100 {
            controller.report(&OutcomeSignal::success(Duration::from_millis(10)));
        }
        let before = controller.current();

        for _ in 0..5 {
            controller.report(&OutcomeSignal::timeout(Duration::from_secs(1)));
        }
        assert!(controller.current() < before);
    }

    #[tokio::test]
    async fn test_alternating_load_stays_bounded() {
        let controller = ConcurrencyController::new(5, 20, policy()).unwrap();
        for round in 0..50 {
            for i in 0..10 {
                let signal = if round % 2 == 0 || i % 3 != 0 {
                    OutcomeSignal::success(Duration::from_millis(20))
                } else {
                    OutcomeSignal::transport_error(Duration::from_millis(20))
                };
                controller.report(&signal);
                let current = controller.current();
                assert!((5..=20).contains(&current));
            }
        }
        // one sizing decision per full window at most
        assert!(controller.snapshot().adjustments <= 50);
    }

    #[tokio::test]
    async fn test_lease_released_once() {
        let controller = ConcurrencyController::new(1, 1, policy()).unwrap();
        let lease = controller.admit().await;
        lease.complete(&OutcomeSignal::success(Duration::from_millis(5)));
        assert_eq!(controller.in_flight(), 0);

        let lease = controller.admit().await;
        drop(lease);
        assert_eq!(controller.in_flight(), 0);
    }
}

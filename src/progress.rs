// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Progress & Counters
 * Lock-free session counters with periodic tracing output
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adaptive_concurrency::ConcurrencyController;
use crate::types::{ResponseClass, StatsSnapshot};

/// Counters shared by the producer, dispatcher and workers
#[derive(Debug, Default)]
pub struct ScanStats {
    candidates: AtomicU64,
    duplicates: AtomicU64,
    dispatched: AtomicU64,
    exists: AtomicU64,
    absent: AtomicU64,
    ambiguous: AtomicU64,
    transport_failures: AtomicU64,
    findings: AtomicU64,
}

impl ScanStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_candidate(&self, duplicate: bool) {
        self.candidates.fetch_add(1, Ordering::Relaxed);
        if duplicate {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_class(&self, class: ResponseClass) {
        let counter = match class {
            ResponseClass::Exists => &self.exists,
            ResponseClass::Absent => &self.absent,
            ResponseClass::Ambiguous => &self.ambiguous,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finding(&self) {
        self.findings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            candidates: self.candidates.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            exists: self.exists.load(Ordering::Relaxed),
            absent: self.absent.load(Ordering::Relaxed),
            ambiguous: self.ambiguous.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            findings: self.findings.load(Ordering::Relaxed),
        }
    }
}

/// Background task logging counters and pool state until stopped
pub struct ProgressReporter {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(
        stats: Arc<ScanStats>,
        controller: Arc<ConcurrencyController>,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let s = stats.snapshot();
                        let pool = controller.snapshot();
                        info!(
                            candidates = s.candidates,
                            dispatched = s.dispatched,
                            findings = s.findings,
                            failures = s.transport_failures,
                            concurrency = pool.current,
                            in_flight = pool.in_flight,
                            error_rate = pool.error_rate,
                            latency_ms = pool.avg_latency_ms as u64,
                            "Scan progress"
                        );
                    }
                }
            }
        });

        Self { stop, handle }
    }

    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConcurrencyPolicy;

    #[test]
    fn test_stats_snapshot() {
        let stats = ScanStats::new();
        stats.record_candidate(false);
        stats.record_candidate(true);
        stats.record_dispatch();
        stats.record_class(ResponseClass::Exists);
        stats.record_class(ResponseClass::Ambiguous);
        stats.record_transport_failure();
        stats.record_finding();

        let s = stats.snapshot();
        assert_eq!(s.candidates, 2);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.dispatched, 1);
        assert_eq!(s.exists, 1);
        assert_eq!(s.ambiguous, 1);
        assert_eq!(s.absent, 0);
        assert_eq!(s.transport_failures, 1);
        assert_eq!(s.findings, 1);
    }

    #[tokio::test]
    async fn test_reporter_stops() {
        let controller = ConcurrencyController::new(1, 4, ConcurrencyPolicy::default()).unwrap();
        let reporter = ProgressReporter::spawn(ScanStats::new(), controller, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        reporter.stop().await;
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Engine
 * Candidate pipeline: generation, dedup, adaptive admission, fetch, detection
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adaptive_concurrency::{ConcurrencyController, Lease};
use crate::config::{ConfigValidator, ScanConfig};
use crate::dedup::Deduplicator;
use crate::engine::{DetectionEngine, RuleSet};
use crate::errors::{ScannerError, ScannerResult};
use crate::generator::CandidateGenerator;
use crate::http_client::{HttpClient, Transport};
use crate::progress::{ProgressReporter, ScanStats};
use crate::reporting::ResultSink;
use crate::types::{CandidateUrl, FetchOutcome, ScanSummary, Target};
use crate::worker::{BaselineProbe, FetchWorker, SoftNotFoundBaseline};

const OPERATOR_ABORT: &str = "cancelled by operator";

/// Entry point for one scan session. The cancellation token is one-shot:
/// once cancelled, later runs return immediately with an aborted summary.
pub struct ScanEngine {
    config: Arc<ScanConfig>,
    rules: Arc<RuleSet>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
}

impl ScanEngine {
    /// Engine backed by the reqwest client
    pub fn new(config: ScanConfig) -> ScannerResult<Self> {
        let client = HttpClient::new(
            config.request_timeout(),
            config.max_body_bytes,
            config.user_agent.as_deref(),
        )
        .map_err(|e| ScannerError::General(format!("{:#}", e)))?;

        Self::with_transport(config, Arc::new(client))
    }

    /// Engine over any transport. Rejects bad configuration before any fetch.
    pub fn with_transport(config: ScanConfig, transport: Arc<dyn Transport>) -> ScannerResult<Self> {
        ConfigValidator::validate_scan_config(&config)?;
        let rules = RuleSet::from_config(&config)?;

        let needed = rules.required_sample_bytes();
        if config.sample_bytes < needed {
            warn!(
                "sample_bytes ({}) is shorter than the longest signature span ({}), some signatures can never match",
                config.sample_bytes, needed
            );
        }

        Ok(Self {
            config: Arc::new(config),
            rules: Arc::new(rules),
            transport,
            cancel: CancellationToken::new(),
        })
    }

    /// Token for the operator abort; cancelling it stops dispatch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, targets: Vec<Target>) -> ScannerResult<ScanSummary> {
        let started_at = Utc::now();
        let started = Instant::now();
        let targets: Vec<Arc<Target>> = targets.into_iter().map(Arc::new).collect();
        let config = Arc::clone(&self.config);

        info!(
            "Starting scan: {} targets, concurrency {}-{}, max depth {}",
            targets.len(),
            config.min_concurrency(),
            config.max_concurrency(),
            config.max_depth
        );

        let controller = ConcurrencyController::new(
            config.min_concurrency(),
            config.max_concurrency(),
            config.concurrency.clone(),
        )?;

        let baselines = self.probe_baselines(&targets).await;

        let session = Arc::new(Session {
            config: Arc::clone(&config),
            generator: CandidateGenerator::new(&config),
            dedup: Deduplicator::new(&config.dedup),
            worker: FetchWorker::new(Arc::clone(&self.transport), &config),
            detection: DetectionEngine::new(Arc::clone(&self.rules)),
            sink: ResultSink::new(),
            stats: ScanStats::new(),
            baselines,
            consecutive_failures: AtomicU32::new(0),
            abort_reason: Mutex::new(None),
            cancel: self.cancel.clone(),
        });

        let progress = ProgressReporter::spawn(
            Arc::clone(&session.stats),
            Arc::clone(&controller),
            Duration::from_millis(config.progress_interval_ms),
        );

        let target_count = targets.len();
        let (tx, rx) = mpsc::channel(config.max_concurrency().saturating_mul(2).max(16));
        let producer = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.produce(targets, tx).await })
        };

        dispatch(&session, &controller, rx).await;

        if let Err(e) = producer.await {
            warn!("Candidate producer ended abnormally: {}", e);
        }
        progress.stop().await;

        let findings = session.sink.export();
        let mut stats = session.stats.snapshot();
        stats.findings = findings.len() as u64;

        let aborted = if session.cancel.is_cancelled() {
            Some(
                session
                    .abort_reason
                    .lock()
                    .clone()
                    .unwrap_or_else(|| OPERATOR_ABORT.to_string()),
            )
        } else {
            None
        };

        let duration = started.elapsed();
        let pool = controller.snapshot();
        match &aborted {
            Some(reason) => warn!("Scan aborted after {:.1}s: {}", duration.as_secs_f64(), reason),
            None => info!(
                "Scan completed in {:.1}s: {} candidates, {} fetched, {} findings (final concurrency {}, {} adjustments)",
                duration.as_secs_f64(),
                stats.candidates,
                stats.dispatched,
                stats.findings,
                pool.current,
                pool.adjustments
            ),
        }

        Ok(ScanSummary {
            targets: target_count,
            stats,
            findings,
            aborted,
            started_at: started_at.to_rfc3339(),
            completed_at: Utc::now().to_rfc3339(),
            duration_seconds: duration.as_secs_f64(),
        })
    }

    /// Soft-404 fingerprints per target, keyed by base URL
    async fn probe_baselines(&self, targets: &[Arc<Target>]) -> HashMap<String, SoftNotFoundBaseline> {
        if !self.config.soft_not_found.baseline_probe || targets.is_empty() {
            return HashMap::new();
        }

        let probe = BaselineProbe::new(Arc::clone(&self.transport), self.config.request_timeout());
        let probe = &probe;
        let probes = stream::iter(targets.iter().cloned())
            .map(|target| async move {
                let baseline = probe.probe(&target).await;
                (target.base_url(), baseline)
            })
            .buffer_unordered(self.config.max_concurrency())
            .filter_map(|(key, baseline)| async move { baseline.map(|b| (key, b)) })
            .collect::<HashMap<_, _>>();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => HashMap::new(),
            baselines = probes => baselines,
        }
    }
}

/// State shared by the producer, the dispatcher and every fetch task
struct Session {
    config: Arc<ScanConfig>,
    generator: CandidateGenerator,
    dedup: Deduplicator,
    worker: FetchWorker,
    detection: DetectionEngine,
    sink: ResultSink,
    stats: Arc<ScanStats>,
    baselines: HashMap<String, SoftNotFoundBaseline>,
    consecutive_failures: AtomicU32,
    abort_reason: Mutex<Option<String>>,
    cancel: CancellationToken,
}

impl Session {
    /// Drive the lazy generator into the bounded channel. Duplicates are
    /// filtered here so the channel only carries new work.
    async fn produce(&self, targets: Vec<Arc<Target>>, tx: mpsc::Sender<CandidateUrl>) {
        for candidate in self.generator.candidates(targets) {
            if self.cancel.is_cancelled() {
                break;
            }

            let duplicate = self.dedup.test_and_add(&candidate.url());
            self.stats.record_candidate(duplicate);
            if duplicate {
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                sent = tx.send(candidate) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Candidate generation finished");
    }

    /// One fetch under an admitted lease. The lease goes back after the
    /// outcome has been accounted, so an abort is visible before the slot
    /// can be reused. An abandoned fetch yields nothing.
    async fn fetch_one(&self, lease: Lease, candidate: CandidateUrl) -> Vec<CandidateUrl> {
        let baseline = self.baselines.get(&candidate.target.base_url());
        let url = candidate.url();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(url = %url, "Fetch abandoned");
                return Vec::new();
            }
            outcome = self.worker.fetch(candidate, baseline) => outcome,
        };

        let expansions = self.process(&outcome);
        lease.complete(&outcome.signal());
        expansions
    }

    fn process(&self, outcome: &FetchOutcome) -> Vec<CandidateUrl> {
        if let Some(err) = &outcome.error {
            self.stats.record_transport_failure();
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                url = %outcome.candidate.url(),
                kind = err.kind(),
                consecutive = failures,
                "Candidate unreachable"
            );
            if failures >= self.config.max_consecutive_failures {
                self.abort(format!(
                    "{} consecutive transport failures (last: {})",
                    failures, err
                ));
            }
            return Vec::new();
        }

        self.consecutive_failures.store(0, Ordering::SeqCst);
        if let Some(class) = outcome.class {
            self.stats.record_class(class);
        }

        if let Some(finding) = self.detection.detect(outcome) {
            info!(
                url = %finding.url,
                risk = %finding.risk,
                confidence = %finding.confidence,
                evidence = %finding.evidence,
                "Sensitive artifact exposed"
            );
            if self.sink.record(finding) {
                self.stats.record_finding();
            }
        }

        self.generator
            .expand(&outcome.candidate, &outcome.listing_links)
            .into_iter()
            .filter(|child| {
                let duplicate = self.dedup.test_and_add(&child.url());
                self.stats.record_candidate(duplicate);
                !duplicate
            })
            .collect()
    }

    /// First reason wins
    fn abort(&self, reason: String) {
        {
            let mut slot = self.abort_reason.lock();
            if slot.is_none() {
                warn!("Aborting scan: {}", reason);
                *slot = Some(reason);
            }
        }
        self.cancel.cancel();
    }
}

/// Admission loop. Expansion candidates found by finished fetches take
/// priority over fresh seeds so a listing is explored while it is warm.
async fn dispatch(
    session: &Arc<Session>,
    controller: &Arc<ConcurrencyController>,
    mut seeds: mpsc::Receiver<CandidateUrl>,
) {
    let mut frontier: VecDeque<CandidateUrl> = VecDeque::new();
    let mut tasks: JoinSet<Vec<CandidateUrl>> = JoinSet::new();
    let mut seeds_done = false;

    loop {
        while let Some(joined) = tasks.try_join_next() {
            frontier.extend(expansions(joined));
        }

        if session.cancel.is_cancelled() {
            break;
        }

        let candidate = match frontier.pop_front() {
            Some(candidate) => candidate,
            None => {
                if seeds_done && tasks.is_empty() {
                    break;
                }

                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => break,
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        frontier.extend(expansions(joined));
                        continue;
                    }
                    received = seeds.recv(), if !seeds_done => match received {
                        Some(candidate) => candidate,
                        None => {
                            seeds_done = true;
                            continue;
                        }
                    },
                }
            }
        };

        let lease = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break,
            lease = controller.admit() => lease,
        };

        // An abort may land while waiting for the slot
        if session.cancel.is_cancelled() {
            break;
        }

        session.stats.record_dispatch();
        let task_session = Arc::clone(session);
        tasks.spawn(async move { task_session.fetch_one(lease, candidate).await });
    }

    drop(seeds);

    // In-flight fetches finish or abandon on their own
    while let Some(joined) = tasks.join_next().await {
        let _ = expansions(joined);
    }
}

fn expansions(joined: Result<Vec<CandidateUrl>, JoinError>) -> Vec<CandidateUrl> {
    match joined {
        Ok(children) => children,
        Err(e) => {
            warn!("Fetch task failed: {}", e);
            Vec::new()
        }
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::types::{Confidence, Finding, RiskLevel, ScanSummary, StatsSnapshot};
use anyhow::Result;
use serde::Serialize;

/// Machine-readable report: session metadata, per-risk totals and the
/// already filtered, ordered findings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    targets: usize,
    started_at: &'a str,
    completed_at: &'a str,
    duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<&'a str>,
    stats: &'a StatsSnapshot,
    totals: RiskTotals,
    findings: &'a [Finding],
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct RiskTotals {
    high: usize,
    medium: usize,
    low: usize,
    tentative: usize,
}

impl RiskTotals {
    fn tally(findings: &[Finding]) -> Self {
        let mut totals = Self::default();
        for finding in findings {
            match finding.risk {
                RiskLevel::High => totals.high += 1,
                RiskLevel::Medium => totals.medium += 1,
                RiskLevel::Low => totals.low += 1,
            }
            if finding.confidence == Confidence::Tentative {
                totals.tentative += 1;
            }
        }
        totals
    }
}

pub struct JsonReportGenerator;

impl JsonReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, summary: &ScanSummary, findings: &[Finding]) -> Result<Vec<u8>> {
        let report = JsonReport {
            targets: summary.targets,
            started_at: &summary.started_at,
            completed_at: &summary.completed_at,
            duration_seconds: summary.duration_seconds,
            aborted: summary.aborted.as_deref(),
            stats: &summary.stats,
            totals: RiskTotals::tally(findings),
            findings,
        };
        Ok(serde_json::to_vec_pretty(&report)?)
    }
}

impl Default for JsonReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

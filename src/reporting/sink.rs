// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Finding, RiskLevel};

/// Session-wide collection of findings, one per URL. Performs no I/O.
#[derive(Debug, Default)]
pub struct ResultSink {
    findings: Mutex<HashMap<String, Finding>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a finding. A second finding for the same URL replaces the first
    /// only when its risk is strictly higher. Returns whether anything changed.
    pub fn record(&self, finding: Finding) -> bool {
        let mut findings = self.findings.lock();
        match findings.get(&finding.url) {
            Some(existing) if existing.risk >= finding.risk => {
                debug!(url = %finding.url, "Duplicate finding ignored");
                false
            }
            _ => {
                findings.insert(finding.url.clone(), finding);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Risk descending, then URL ascending
    pub fn export(&self) -> Vec<Finding> {
        let mut findings: Vec<Finding> = self.findings.lock().values().cloned().collect();
        sort_findings(&mut findings);
        findings
    }

    pub fn count_by_risk(&self) -> HashMap<RiskLevel, usize> {
        let mut counts = HashMap::new();
        for finding in self.findings.lock().values() {
            *counts.entry(finding.risk).or_insert(0) += 1;
        }
        counts
    }
}

pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| b.risk.cmp(&a.risk).then_with(|| a.url.cmp(&b.url)));
}

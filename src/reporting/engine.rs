// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::reporting::{
    formats::{csv::CsvReportGenerator, json::JsonReportGenerator},
    sink::sort_findings,
    types::*,
};
use crate::types::{Confidence, Finding, ScanSummary};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub struct ReportEngine;

impl ReportEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report(&self, summary: &ScanSummary, config: &ReportConfig) -> Result<ReportOutput> {
        let findings = self.filter(&summary.findings, config);

        let data = match config.format {
            ReportFormat::Csv => CsvReportGenerator::new()
                .generate(&findings)
                .context("Failed to render CSV report")?,
            ReportFormat::Json => JsonReportGenerator::new()
                .generate(summary, &findings)
                .context("Failed to render JSON report")?,
        };

        Ok(ReportOutput {
            format: config.format,
            data,
            findings: findings.len(),
        })
    }

    fn filter(&self, findings: &[Finding], config: &ReportConfig) -> Vec<Finding> {
        let mut kept: Vec<Finding> = findings
            .iter()
            .filter(|f| config.min_risk.map_or(true, |min| f.risk >= min))
            .filter(|f| config.include_tentative || f.confidence == Confidence::Confirmed)
            .cloned()
            .collect();
        sort_findings(&mut kept);
        kept
    }

    pub async fn write_report(&self, output: &ReportOutput, path: &Path) -> Result<()> {
        tokio::fs::write(path, &output.data)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(
            "Report saved to {} ({} findings, {})",
            path.display(),
            output.findings,
            output.format
        );
        Ok(())
    }
}

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskLevel, StatsSnapshot};

    fn summary() -> ScanSummary {
        let make = |url: &str, risk, confidence| Finding {
            url: url.to_string(),
            risk,
            rule_id: "test".to_string(),
            evidence: "sensitive extension: sql".to_string(),
            confidence,
            status_code: Some(200),
            discovered_at: "2026-01-01T00:00:00Z".to_string(),
        };
        ScanSummary {
            targets: 1,
            stats: StatsSnapshot::default(),
            findings: vec![
                make("http://a.test/low", RiskLevel::Low, Confidence::Confirmed),
                make("http://a.test/high", RiskLevel::High, Confidence::Confirmed),
                make("http://a.test/maybe", RiskLevel::High, Confidence::Tentative),
            ],
            aborted: None,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            completed_at: "2026-01-01T00:00:05Z".to_string(),
            duration_seconds: 5.0,
        }
    }

    #[test]
    fn test_filters_apply() {
        let config = ReportConfig {
            format: ReportFormat::Csv,
            min_risk: Some(RiskLevel::Medium),
            include_tentative: false,
        };
        let output = ReportEngine::new().generate_report(&summary(), &config).unwrap();
        assert_eq!(output.findings, 1);
    }

    #[test]
    fn test_json_report_totals_and_order() {
        let config = ReportConfig {
            format: ReportFormat::Json,
            ..ReportConfig::default()
        };
        let output = ReportEngine::new().generate_report(&summary(), &config).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output.data).unwrap();

        let findings: Vec<Finding> = serde_json::from_value(parsed["findings"].clone()).unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].url, "http://a.test/high");
        assert_eq!(parsed["totals"]["high"], 2);
        assert_eq!(parsed["totals"]["low"], 1);
        assert_eq!(parsed["totals"]["tentative"], 1);
        assert!(parsed.get("aborted").is_none());
    }

    #[test]
    fn test_json_report_respects_filters() {
        let config = ReportConfig {
            format: ReportFormat::Json,
            min_risk: Some(RiskLevel::High),
            include_tentative: false,
        };
        let output = ReportEngine::new().generate_report(&summary(), &config).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output.data).unwrap();
        assert_eq!(parsed["findings"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["totals"]["high"], 1);
        assert_eq!(parsed["targets"], 1);
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let output = ReportEngine::new()
            .generate_report(&summary(), &ReportConfig::default())
            .unwrap();
        ReportEngine::new().write_report(&output, &path).await.unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, output.data);
    }
}

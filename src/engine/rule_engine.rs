// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Detection Rule Engine
 * Extension, path-pattern and magic-byte detectors merged into one finding
 *
 * Features:
 * - Rules compiled once from configuration, read-only afterwards
 * - Independent detectors, uniform evaluation
 * - Max-risk merge with concatenated evidence
 *
 * © 2026 Bountyy Oy
 */

use chrono::Utc;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::signatures::{builtin_signatures, MagicSignature};
use crate::config::ScanConfig;
use crate::errors::ConfigError;
use crate::types::{Confidence, FetchOutcome, Finding, ResponseClass, RiskLevel};

/// Compiled path pattern with its risk and report label
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub regex: Regex,
    pub label: String,
    pub risk: RiskLevel,
}

/// One detector. Each variant evaluates independently of the others.
#[derive(Debug, Clone)]
pub enum DetectionRule {
    /// Final (or second-to-last) path suffix in the sensitive set
    Extension {
        extensions: BTreeSet<String>,
        risk: RiskLevel,
    },
    /// Ordered patterns, first match wins
    PathPattern { patterns: Vec<PathPattern> },
    /// Magic bytes at the head of the body, whatever the path says
    CompoundSignature { signatures: Vec<MagicSignature> },
}

/// A single detector hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: String,
    pub risk: RiskLevel,
    pub evidence: String,
}

impl DetectionRule {
    /// Evaluate against one outcome. Missing data means the rule abstains.
    pub fn evaluate(&self, outcome: &FetchOutcome) -> Option<RuleMatch> {
        let path = outcome.candidate.path.as_str();

        match self {
            DetectionRule::Extension { extensions, risk } => {
                sensitive_suffix(path, extensions).map(|ext| RuleMatch {
                    rule_id: format!("ext:{}", ext),
                    risk: *risk,
                    evidence: format!("sensitive extension: {}", ext),
                })
            }
            DetectionRule::PathPattern { patterns } => patterns
                .iter()
                .find(|p| p.regex.is_match(path))
                .map(|p| RuleMatch {
                    rule_id: format!("path:{}", p.label),
                    risk: p.risk,
                    evidence: format!("path match: {}", p.label),
                }),
            DetectionRule::CompoundSignature { signatures } => {
                if outcome.sample.is_empty() {
                    return None;
                }

                let mut best: Option<&MagicSignature> = None;
                for sig in signatures.iter().filter(|s| s.matches(&outcome.sample)) {
                    if best.map_or(true, |b| sig.risk > b.risk) {
                        best = Some(sig);
                    }
                }

                best.map(|sig| RuleMatch {
                    rule_id: format!("sig:{}", sig.name),
                    risk: sig.risk,
                    evidence: format!("compound: {} signature", sig.name),
                })
            }
        }
    }
}

/// Return the sensitive suffix of the last path segment, checking the final
/// suffix first and then the one before it (`dump.sql.gz` yields `sql`).
fn sensitive_suffix(path: &str, extensions: &BTreeSet<String>) -> Option<String> {
    if path.ends_with('/') {
        return None;
    }

    let segment = path.rsplit('/').next().unwrap_or(path);
    let segment = segment.split(['?', '#']).next().unwrap_or(segment).to_lowercase();
    let suffixes: Vec<&str> = segment.split('.').skip(1).collect();

    suffixes
        .iter()
        .rev()
        .take(2)
        .find(|s| !s.is_empty() && extensions.contains(**s))
        .map(|s| s.to_string())
}

/// Immutable detector set shared by all workers
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<DetectionRule>,
}

impl RuleSet {
    /// Compile every configured rule. A malformed pattern or signature is fatal.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(3);

        if !config.sensitive_ext.is_empty() {
            rules.push(DetectionRule::Extension {
                extensions: config
                    .sensitive_ext
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_lowercase())
                    .collect(),
                risk: config.extension_risk,
            });
        }

        if !config.sensitive_paths.is_empty() {
            let patterns = config
                .sensitive_paths
                .iter()
                .map(|rule| {
                    let regex = RegexBuilder::new(&rule.pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| ConfigError::InvalidPattern {
                            pattern: rule.pattern.clone(),
                            reason: e.to_string(),
                        })?;
                    Ok(PathPattern {
                        regex,
                        label: rule.label.clone().unwrap_or_else(|| rule.pattern.clone()),
                        risk: rule.risk,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            rules.push(DetectionRule::PathPattern { patterns });
        }

        let mut signatures = if config.builtin_signatures {
            builtin_signatures()
        } else {
            Vec::new()
        };
        for sig in &config.compound_signatures {
            signatures.push(MagicSignature::from_config(sig)?);
        }
        if !signatures.is_empty() {
            rules.push(DetectionRule::CompoundSignature { signatures });
        }

        if rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rules".to_string(),
                reason: "no detection rules configured".to_string(),
            });
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    /// Longest sample any signature needs to decide
    pub fn required_sample_bytes(&self) -> usize {
        self.rules
            .iter()
            .filter_map(|r| match r {
                DetectionRule::CompoundSignature { signatures } => {
                    signatures.iter().map(|s| s.span()).max()
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// All hits in detector order (extension, path, signature)
    pub fn evaluate(&self, outcome: &FetchOutcome) -> Vec<RuleMatch> {
        self.rules.iter().filter_map(|r| r.evaluate(outcome)).collect()
    }
}

/// Runs the rule set over classified outcomes and merges hits into findings
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    rules: Arc<RuleSet>,
}

impl DetectionEngine {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Zero or one finding per outcome. Absent and failed fetches never match.
    pub fn detect(&self, outcome: &FetchOutcome) -> Option<Finding> {
        if !outcome.is_detectable() {
            return None;
        }

        let matches = self.rules.evaluate(outcome);
        let finding = merge_matches(outcome, &matches)?;
        debug!(
            url = %finding.url,
            risk = %finding.risk,
            rule = %finding.rule_id,
            "Detection matched"
        );
        Some(finding)
    }
}

/// Max risk wins, evidence is concatenated, rule id comes from the first
/// highest-risk hit.
fn merge_matches(outcome: &FetchOutcome, matches: &[RuleMatch]) -> Option<Finding> {
    let mut top: Option<&RuleMatch> = None;
    for m in matches {
        if top.map_or(true, |t| m.risk > t.risk) {
            top = Some(m);
        }
    }
    let top = top?;

    let evidence = matches
        .iter()
        .map(|m| m.evidence.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    let confidence = match outcome.class {
        Some(ResponseClass::Ambiguous) => Confidence::Tentative,
        _ => Confidence::Confirmed,
    };

    Some(Finding {
        url: outcome.candidate.url(),
        risk: top.risk,
        rule_id: top.rule_id.clone(),
        evidence,
        confidence,
        status_code: outcome.status_code,
        discovered_at: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathRuleConfig, SignatureConfig};
    use crate::types::{CandidateUrl, Target};
    use std::time::Duration;

    fn outcome(path: &str, class: ResponseClass, sample: &[u8]) -> FetchOutcome {
        let target = Arc::new(Target::new("http", "example.com", 80, "/"));
        FetchOutcome {
            candidate: CandidateUrl::new(target, path, 0),
            status_code: Some(200),
            content_length: Some(sample.len() as u64),
            content_type: None,
            sample: sample.to_vec(),
            class: Some(class),
            latency: Duration::from_millis(10),
            listing_links: Vec::new(),
            error: None,
        }
    }

    fn engine(config: &ScanConfig) -> DetectionEngine {
        DetectionEngine::new(Arc::new(RuleSet::from_config(config).unwrap()))
    }

    #[test]
    fn test_extension_detector() {
        let engine = engine(&ScanConfig::default());
        let finding = engine
            .detect(&outcome("/db.sql", ResponseClass::Exists, b"CREATE TABLE"))
            .unwrap();
        assert_eq!(finding.risk, RiskLevel::High);
        assert_eq!(finding.evidence, "sensitive extension: sql");
        assert_eq!(finding.rule_id, "ext:sql");
        assert_eq!(finding.confidence, Confidence::Confirmed);
        assert_eq!(finding.url, "http://example.com/db.sql");
    }

    #[test]
    fn test_extension_is_case_insensitive_and_checks_inner_suffix() {
        let engine = engine(&ScanConfig::default());
        assert!(engine
            .detect(&outcome("/Backup.SQL", ResponseClass::Exists, b"x"))
            .is_some());
        let finding = engine
            .detect(&outcome("/dump.sql.gz", ResponseClass::Exists, b"not gzip"))
            .unwrap();
        assert_eq!(finding.evidence, "sensitive extension: sql");
        assert!(engine
            .detect(&outcome("/index.html", ResponseClass::Exists, b"<html>"))
            .is_none());
    }

    #[test]
    fn test_path_pattern_detector() {
        let engine = engine(&ScanConfig::default());
        let finding = engine
            .detect(&outcome("/.git/", ResponseClass::Exists, b"<html>Index of /.git</html>"))
            .unwrap();
        assert_eq!(finding.evidence, r"path match: \.(git|svn)/");
        assert_eq!(finding.risk, RiskLevel::High);
    }

    #[test]
    fn test_path_patterns_ignore_case() {
        let engine = engine(&ScanConfig::default());
        for path in ["/.GIT/", "/.Svn/entries", "/Backup/", "/site/ARCHIVE/old.tar"] {
            let finding = engine
                .detect(&outcome(path, ResponseClass::Exists, b"<html></html>"))
                .unwrap_or_else(|| panic!("{} not matched", path));
            assert!(finding.evidence.contains("path match: "), "{}", finding.evidence);
            assert_eq!(finding.risk, RiskLevel::High);
        }
    }

    #[test]
    fn test_path_patterns_first_match_wins() {
        let config = ScanConfig {
            sensitive_paths: vec![
                PathRuleConfig {
                    pattern: r"/\.git/config$".to_string(),
                    risk: RiskLevel::High,
                    label: Some("git config".to_string()),
                },
                PathRuleConfig {
                    pattern: r"/\.git/".to_string(),
                    risk: RiskLevel::Medium,
                    label: Some("git dir".to_string()),
                },
            ],
            ..ScanConfig::default()
        };
        let finding = engine(&config)
            .detect(&outcome("/.git/config", ResponseClass::Exists, b"[core]"))
            .unwrap();
        assert_eq!(finding.evidence, "path match: git config");
        assert_eq!(finding.risk, RiskLevel::High);
    }

    #[test]
    fn test_signature_detector_alone() {
        let engine = engine(&ScanConfig::default());
        let finding = engine
            .detect(&outcome("/data.txt", ResponseClass::Exists, b"PK\x03\x04\x14\x00"))
            .unwrap();
        assert_eq!(finding.evidence, "compound: zip signature");
        assert_eq!(finding.rule_id, "sig:zip");
        assert_eq!(finding.risk, RiskLevel::High);
    }

    #[test]
    fn test_merge_takes_max_risk_and_joins_evidence() {
        let config = ScanConfig {
            extension_risk: RiskLevel::Medium,
            ..ScanConfig::default()
        };
        let finding = engine(&config)
            .detect(&outcome("/site.zip", ResponseClass::Exists, b"PK\x03\x04"))
            .unwrap();
        assert_eq!(finding.risk, RiskLevel::High);
        assert_eq!(
            finding.evidence,
            "sensitive extension: zip; compound: zip signature"
        );
        assert_eq!(finding.rule_id, "sig:zip");
    }

    #[test]
    fn test_ambiguous_outcome_is_tentative() {
        let engine = engine(&ScanConfig::default());
        let finding = engine
            .detect(&outcome("/db.sql", ResponseClass::Ambiguous, b"<html>"))
            .unwrap();
        assert_eq!(finding.confidence, Confidence::Tentative);
        assert_eq!(finding.risk, RiskLevel::High);
    }

    #[test]
    fn test_absent_and_failed_outcomes_skip_detection() {
        let engine = engine(&ScanConfig::default());
        assert!(engine
            .detect(&outcome("/db.sql", ResponseClass::Absent, b""))
            .is_none());

        let mut failed = outcome("/db.sql", ResponseClass::Exists, b"");
        failed.error = Some(crate::errors::TransportError::Other("reset".to_string()));
        assert!(engine.detect(&failed).is_none());
    }

    #[test]
    fn test_malformed_rules_are_config_errors() {
        let config = ScanConfig {
            sensitive_paths: vec![PathRuleConfig {
                pattern: "(unclosed".to_string(),
                risk: RiskLevel::High,
                label: None,
            }],
            ..ScanConfig::default()
        };
        assert!(matches!(
            RuleSet::from_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));

        let config = ScanConfig {
            compound_signatures: vec![SignatureConfig {
                name: "odd".to_string(),
                magic_hex: "abc".to_string(),
                offset: 0,
                risk: RiskLevel::Low,
            }],
            ..ScanConfig::default()
        };
        assert!(matches!(
            RuleSet::from_config(&config),
            Err(ConfigError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_required_sample_covers_tar() {
        let rules = RuleSet::from_config(&ScanConfig::default()).unwrap();
        assert_eq!(rules.required_sample_bytes(), 262);
        assert_eq!(rules.rules().len(), 3);
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use validator::Validate;

use crate::types::RiskLevel;

/// Immutable scan configuration, built once at startup and shared by reference
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanConfig {
    #[validate(range(max = 16))]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Inclusive `[min, max]` bounds for the adaptive worker pool
    #[serde(default = "default_concurrency_range")]
    pub concurrency_range: (usize, usize),

    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    #[validate(range(max = 10))]
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_sensitive_ext")]
    pub sensitive_ext: BTreeSet<String>,

    #[serde(default)]
    pub extension_risk: RiskLevel,

    /// Ordered by descending specificity; the first match wins
    #[validate(nested)]
    #[serde(default = "default_sensitive_paths")]
    pub sensitive_paths: Vec<PathRuleConfig>,

    /// Extra magic-byte signatures on top of the built-in archive set
    #[validate(nested)]
    #[serde(default)]
    pub compound_signatures: Vec<SignatureConfig>,

    #[serde(default = "default_true")]
    pub builtin_signatures: bool,

    /// Path templates; `{ext}` and `{host}` are substituted per target
    #[serde(default = "default_wordlist")]
    pub wordlist: Vec<String>,

    #[serde(default = "default_ignore_ext")]
    pub ignore_ext: BTreeSet<String>,

    #[serde(default = "default_forbidden_ports")]
    pub forbidden_ports: BTreeSet<u16>,

    #[validate(nested)]
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,

    #[validate(nested)]
    #[serde(default)]
    pub dedup: DedupConfig,

    #[validate(nested)]
    #[serde(default)]
    pub soft_not_found: SoftNotFoundConfig,

    #[validate(range(min = 1024))]
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Leading bytes kept for signature matching; tar needs at least 262
    #[validate(range(min = 262, max = 65536))]
    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: usize,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[validate(range(min = 100))]
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PathRuleConfig {
    #[validate(length(min = 1))]
    pub pattern: String,

    #[serde(default)]
    pub risk: RiskLevel,

    /// Defaults to the pattern source
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SignatureConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Hex-encoded magic bytes, whitespace allowed (`50 4b 03 04`)
    #[validate(length(min = 2))]
    pub magic_hex: String,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub risk: RiskLevel,
}

/// Tuning knobs for the adaptive concurrency controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ConcurrencyPolicy {
    #[validate(range(min = 1))]
    #[serde(default = "default_increase_step")]
    pub increase_step: usize,

    /// Multiplier applied on backoff, in (0, 1)
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    #[serde(default = "default_decrease_factor")]
    pub decrease_factor: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_low_water")]
    pub low_water: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_high_water")]
    pub high_water: f64,

    #[validate(range(min = 1))]
    #[serde(default = "default_latency_ceiling")]
    pub latency_ceiling_ms: u64,

    /// Consecutive timeouts that force an immediate backoff
    #[validate(range(min = 1))]
    #[serde(default = "default_timeout_burst")]
    pub timeout_burst: u32,

    /// Samples required between two sizing decisions
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_window")]
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DedupConfig {
    #[validate(range(min = 64))]
    #[serde(default = "default_dedup_capacity")]
    pub initial_capacity: usize,

    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    #[serde(default = "default_dedup_error_rate")]
    pub error_rate: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_fill_threshold")]
    pub fill_threshold: f64,

    #[validate(range(min = 1.0, max = 16.0))]
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_tightening_ratio")]
    pub tightening_ratio: f64,
}

/// Heuristics for custom error pages served with a success status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SoftNotFoundConfig {
    /// Probe a random nonexistent path per target before scanning it
    #[serde(default = "default_true")]
    pub baseline_probe: bool,

    /// Byte distance from the baseline length still treated as the same page
    #[serde(default = "default_length_tolerance")]
    pub length_tolerance: u64,

    /// 2xx bodies shorter than this are suspicious
    #[serde(default)]
    pub min_content_length: u64,

    /// Case-insensitive body markers of an error page
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,

    /// 4xx statuses that are flagged instead of discarded
    #[serde(default)]
    pub ambiguous_statuses: Vec<u16>,
}

impl ScanConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_concurrency(&self) -> usize {
        self.concurrency_range.0
    }

    pub fn max_concurrency(&self) -> usize {
        self.concurrency_range.1
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            concurrency_range: default_concurrency_range(),
            request_timeout_secs: default_timeout(),
            max_retries: default_retries(),
            max_consecutive_failures: default_max_consecutive_failures(),
            sensitive_ext: default_sensitive_ext(),
            extension_risk: RiskLevel::High,
            sensitive_paths: default_sensitive_paths(),
            compound_signatures: Vec::new(),
            builtin_signatures: true,
            wordlist: default_wordlist(),
            ignore_ext: default_ignore_ext(),
            forbidden_ports: default_forbidden_ports(),
            concurrency: ConcurrencyPolicy::default(),
            dedup: DedupConfig::default(),
            soft_not_found: SoftNotFoundConfig::default(),
            max_body_bytes: default_max_body_bytes(),
            sample_bytes: default_sample_bytes(),
            user_agent: None,
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            increase_step: default_increase_step(),
            decrease_factor: default_decrease_factor(),
            low_water: default_low_water(),
            high_water: default_high_water(),
            latency_ceiling_ms: default_latency_ceiling(),
            timeout_burst: default_timeout_burst(),
            window: default_window(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_dedup_capacity(),
            error_rate: default_dedup_error_rate(),
            fill_threshold: default_fill_threshold(),
            growth_factor: default_growth_factor(),
            tightening_ratio: default_tightening_ratio(),
        }
    }
}

impl Default for SoftNotFoundConfig {
    fn default() -> Self {
        Self {
            baseline_probe: true,
            length_tolerance: default_length_tolerance(),
            min_content_length: 0,
            markers: default_markers(),
            ambiguous_statuses: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_concurrency_range() -> (usize, usize) {
    (30, 200)
}

fn default_timeout() -> u64 {
    25
}

fn default_retries() -> u32 {
    2
}

fn default_max_consecutive_failures() -> u32 {
    50
}

fn default_sensitive_ext() -> BTreeSet<String> {
    [
        "config", "ini", "env", "zip", "bak", "key", "conf", "properties", "sql", "db", "dbf",
        "pem", "crt", "jks", "p12", "audit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sensitive_paths() -> Vec<PathRuleConfig> {
    vec![
        PathRuleConfig {
            pattern: r"/(backup|archive)/".to_string(),
            risk: RiskLevel::High,
            label: None,
        },
        PathRuleConfig {
            pattern: r"\.(git|svn)/".to_string(),
            risk: RiskLevel::High,
            label: None,
        },
    ]
}

fn default_wordlist() -> Vec<String> {
    [
        "{host}.{ext}",
        "backup.{ext}",
        "www.{ext}",
        "web.{ext}",
        "site.{ext}",
        "db.{ext}",
        "database.{ext}",
        "dump.{ext}",
        "config.{ext}",
        ".env",
        ".git/",
        ".git/config",
        ".svn/",
        ".svn/entries",
        "backup/",
        "archive/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignore_ext() -> BTreeSet<String> {
    ["png", "jpg", "jpeg", "gif"].iter().map(|s| s.to_string()).collect()
}

fn default_forbidden_ports() -> BTreeSet<u16> {
    [22, 3306, 3389].into_iter().collect()
}

fn default_increase_step() -> usize {
    5
}

fn default_decrease_factor() -> f64 {
    0.5
}

fn default_low_water() -> f64 {
    0.01
}

fn default_high_water() -> f64 {
    0.1
}

fn default_latency_ceiling() -> u64 {
    500
}

fn default_timeout_burst() -> u32 {
    5
}

fn default_window() -> usize {
    20
}

fn default_dedup_capacity() -> usize {
    10_000
}

fn default_dedup_error_rate() -> f64 {
    0.001
}

fn default_fill_threshold() -> f64 {
    0.5
}

fn default_growth_factor() -> f64 {
    2.0
}

fn default_tightening_ratio() -> f64 {
    0.9
}

fn default_length_tolerance() -> u64 {
    32
}

fn default_markers() -> Vec<String> {
    ["page not found", "404 not found", "file not found", "页面不存在"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_sample_bytes() -> usize {
    512
}

fn default_progress_interval() -> u64 {
    800
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScanConfig::default();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(25));
        assert_eq!(config.concurrency_range, (30, 200));
        assert!(config.sensitive_ext.contains("sql"));
        assert!(config.forbidden_ports.contains(&3306));
        assert_eq!(config.sensitive_paths.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
max_depth: 1
concurrency_range: [2, 8]
sensitive_paths:
  - pattern: '\.(git|svn)/'
    risk: medium
"#;
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.min_concurrency(), 2);
        assert_eq!(config.max_concurrency(), 8);
        assert_eq!(config.sensitive_paths[0].risk, RiskLevel::Medium);
        assert_eq!(config.request_timeout_secs, 25);
        assert!(!config.wordlist.is_empty());
    }

    #[test]
    fn test_out_of_range_sample_rejected() {
        let config = ScanConfig {
            sample_bytes: 16,
            ..ScanConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TransportError;

/// Ordinal risk classification attached to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Label used in the CSV report's risk column
    pub fn report_label(&self) -> &'static str {
        match self {
            RiskLevel::High => "高危",
            RiskLevel::Medium => "中危",
            RiskLevel::Low => "低危",
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(RiskLevel::High),
            "medium" => Ok(RiskLevel::Medium),
            "low" => Ok(RiskLevel::Low),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Response was classified as ambiguous (possible soft-404)
    Tentative,
    Confirmed,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Tentative => write!(f, "TENTATIVE"),
            Confidence::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// A scan target parsed from the target list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Always starts with `/`; never ends with `/` unless it is the root
    pub base_path: String,
}

impl Target {
    pub fn new(scheme: &str, host: &str, port: u16, base_path: &str) -> Self {
        let trimmed = base_path.trim_end_matches('/');
        let base_path = if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };

        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
            base_path,
        }
    }

    fn default_port(&self) -> u16 {
        if self.scheme == "https" {
            443
        } else {
            80
        }
    }

    /// `scheme://host[:port]` with the port elided when it is the scheme default
    pub fn origin(&self) -> String {
        if self.port == self.default_port() {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Full URL of the target's base path
    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin(), self.base_path)
    }

    /// Join a relative path onto the base path
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.base_path == "/" {
            format!("/{}", path)
        } else {
            format!("{}/{}", self.base_path, path)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url())
    }
}

/// A URL the generator produced for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    pub target: Arc<Target>,
    /// Absolute path beginning with `/`
    pub path: String,
    pub depth: u32,
}

impl CandidateUrl {
    pub fn new(target: Arc<Target>, path: impl Into<String>, depth: u32) -> Self {
        Self {
            target,
            path: path.into(),
            depth,
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.target.origin(), self.path)
    }

    /// Directory-style candidates end in `/`
    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// Normalized classification of a raw HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseClass {
    Exists,
    Absent,
    /// Success-looking response that is probably a custom error page
    Ambiguous,
}

/// Result of one fetch, handed from the worker to the detection engine
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub candidate: CandidateUrl,
    pub status_code: Option<u16>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    /// Leading bytes of the body, used by signature matching
    pub sample: Vec<u8>,
    pub class: Option<ResponseClass>,
    pub latency: Duration,
    /// Links pulled out of a directory listing body
    pub listing_links: Vec<String>,
    pub error: Option<TransportError>,
}

impl FetchOutcome {
    pub fn failed(candidate: CandidateUrl, error: TransportError, latency: Duration) -> Self {
        Self {
            candidate,
            status_code: None,
            content_length: None,
            content_type: None,
            sample: Vec::new(),
            class: None,
            latency,
            listing_links: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_transport_error(&self) -> bool {
        self.error.is_some()
    }

    /// Only existing or ambiguous responses go through detection
    pub fn is_detectable(&self) -> bool {
        self.error.is_none()
            && matches!(
                self.class,
                Some(ResponseClass::Exists) | Some(ResponseClass::Ambiguous)
            )
    }

    pub fn signal(&self) -> OutcomeSignal {
        OutcomeSignal {
            latency: self.latency,
            failure: self.error.as_ref().map(|e| {
                if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Transport
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
}

/// What the concurrency controller learns from one completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSignal {
    pub latency: Duration,
    pub failure: Option<FailureKind>,
}

impl OutcomeSignal {
    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            failure: None,
        }
    }

    pub fn timeout(latency: Duration) -> Self {
        Self {
            latency,
            failure: Some(FailureKind::Timeout),
        }
    }

    pub fn transport_error(latency: Duration) -> Self {
        Self {
            latency,
            failure: Some(FailureKind::Transport),
        }
    }
}

/// A risk-tagged exposure produced by the detection engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub url: String,
    pub risk: RiskLevel,
    pub rule_id: String,
    /// Detection basis; one entry per matching detector joined with `; `
    pub evidence: String,
    pub confidence: Confidence,
    pub status_code: Option<u16>,
    pub discovered_at: String,
}

/// Final result of a scan session, ready for the reporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub targets: usize,
    pub stats: StatsSnapshot,
    pub findings: Vec<Finding>,
    pub aborted: Option<String>,
    pub started_at: String,
    pub completed_at: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub candidates: u64,
    pub duplicates: u64,
    pub dispatched: u64,
    pub exists: u64,
    pub absent: u64,
    pub ambiguous: u64,
    pub transport_failures: u64,
    pub findings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(
            [RiskLevel::Medium, RiskLevel::High].iter().max(),
            Some(&RiskLevel::High)
        );
    }

    #[test]
    fn test_target_urls() {
        let t = Target::new("HTTP", "Example.com", 80, "");
        assert_eq!(t.base_url(), "http://example.com/");
        assert_eq!(t.join("db.sql"), "/db.sql");

        let t = Target::new("https", "example.com", 8443, "/app/");
        assert_eq!(t.base_url(), "https://example.com:8443/app");
        assert_eq!(t.join("/.git/"), "/app/.git/");
    }

    #[test]
    fn test_candidate_url() {
        let t = Arc::new(Target::new("http", "example.com", 80, "/"));
        let c = CandidateUrl::new(t, "/backup/", 1);
        assert_eq!(c.url(), "http://example.com/backup/");
        assert!(c.is_directory());
    }

    #[test]
    fn test_risk_from_str() {
        assert_eq!("High".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("critical".parse::<RiskLevel>().is_err());
    }
}

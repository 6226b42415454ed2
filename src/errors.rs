// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanner Error Types
 * Transport and configuration error taxonomy with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Main scanner error type
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Network-level failure while fetching a candidate
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration or rule set, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Scanner error: {0}")]
    General(String),
}

/// Transport failures, classified so the controller can tell timeouts apart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("TLS handshake failed for {url}: {reason}")]
    Tls { url: String, reason: String },

    #[error("Connection reset by peer for {url}")]
    ConnectionReset { url: String },

    #[error("DNS resolution failed for {url}: {reason}")]
    Dns { url: String, reason: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Body read failed for {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("Transport error: {0}")]
    Other(String),
}

/// Configuration problems detected before any fetch is issued
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid concurrency range: min={min}, max={max}")]
    InvalidConcurrencyRange { min: usize, max: usize },

    #[error("Malformed path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Malformed signature '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },
}

impl TransportError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::ConnectionReset { .. } => true,
            TransportError::Body { .. } => true,
            TransportError::ConnectionRefused { .. } => true,
            TransportError::Dns { .. } => false,
            TransportError::Tls { .. } => false,
            TransportError::InvalidUrl { .. } => false,
            TransportError::Other(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Short machine-friendly label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout { .. } => "timeout",
            TransportError::ConnectionRefused { .. } => "connection_refused",
            TransportError::Tls { .. } => "tls",
            TransportError::ConnectionReset { .. } => "connection_reset",
            TransportError::Dns { .. } => "dns",
            TransportError::InvalidUrl { .. } => "invalid_url",
            TransportError::Body { .. } => "body",
            TransportError::Other(_) => "other",
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        let message = err.to_string().to_lowercase();

        if err.is_timeout() {
            TransportError::Timeout { url, timeout }
        } else if err.is_connect() {
            if message.contains("certificate") || message.contains("tls") || message.contains("handshake") {
                TransportError::Tls {
                    url,
                    reason: err.to_string(),
                }
            } else if message.contains("dns") || message.contains("resolve") {
                TransportError::Dns {
                    url,
                    reason: err.to_string(),
                }
            } else {
                TransportError::ConnectionRefused { url }
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body {
                url,
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            TransportError::InvalidUrl { url }
        } else if message.contains("reset") {
            TransportError::ConnectionReset { url }
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

impl ScannerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ScannerError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for scanner operations
pub type ScannerResult<T> = Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = TransportError::Timeout {
            url: "http://example.com".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
        assert!(timeout.is_timeout());

        let tls = TransportError::Tls {
            url: "https://example.com".to_string(),
            reason: "bad cert".to_string(),
        };
        assert!(!tls.is_retryable());
        assert_eq!(tls.kind(), "tls");
    }

    #[test]
    fn test_scanner_error_wraps_transport() {
        let err: ScannerError = TransportError::ConnectionRefused {
            url: "http://127.0.0.1:1".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn test_config_error_display() {
        let err: ScannerError = ConfigError::InvalidConcurrencyRange { min: 10, max: 2 }.into();
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid concurrency range: min=10, max=2"
        );
    }
}

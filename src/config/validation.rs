// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use tracing::warn;
use validator::Validate;

use super::core::ScanConfig;
use crate::errors::ConfigError;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Reject configurations the engine cannot run with. Called before any fetch.
    pub fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
        config.validate().map_err(|e| ConfigError::InvalidValue {
            field: "scan_config".to_string(),
            reason: e.to_string(),
        })?;

        Self::validate_concurrency(config)?;
        Self::validate_rules(config)?;
        Self::validate_dedup(config)?;

        Ok(())
    }

    fn validate_concurrency(config: &ScanConfig) -> Result<(), ConfigError> {
        let (min, max) = config.concurrency_range;
        if min == 0 || min > max {
            return Err(ConfigError::InvalidConcurrencyRange { min, max });
        }

        let policy = &config.concurrency;
        if policy.low_water >= policy.high_water {
            return Err(ConfigError::InvalidValue {
                field: "concurrency.low_water".to_string(),
                reason: format!(
                    "low water mark {} must be below high water mark {}",
                    policy.low_water, policy.high_water
                ),
            });
        }

        Ok(())
    }

    fn validate_rules(config: &ScanConfig) -> Result<(), ConfigError> {
        for ext in &config.sensitive_ext {
            if ext.is_empty() || ext.contains('.') || ext.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: "sensitive_ext".to_string(),
                    reason: format!("'{}' is not a bare extension", ext),
                });
            }
        }

        if config.sensitive_ext.is_empty()
            && config.sensitive_paths.is_empty()
            && config.compound_signatures.is_empty()
            && !config.builtin_signatures
        {
            return Err(ConfigError::InvalidValue {
                field: "rules".to_string(),
                reason: "no detection rules configured".to_string(),
            });
        }

        if config.wordlist.is_empty() {
            warn!("Wordlist is empty, only target base paths will be probed");
        }

        if config.wordlist.iter().any(|t| t.contains("{ext}")) && config.sensitive_ext.is_empty() {
            warn!("Wordlist uses {{ext}} but no sensitive extensions are configured");
        }

        Ok(())
    }

    fn validate_dedup(config: &ScanConfig) -> Result<(), ConfigError> {
        if config.max_body_bytes < config.sample_bytes {
            return Err(ConfigError::InvalidValue {
                field: "max_body_bytes".to_string(),
                reason: format!(
                    "max_body_bytes ({}) is smaller than sample_bytes ({})",
                    config.max_body_bytes, config.sample_bytes
                ),
            });
        }

        if config.dedup.growth_factor < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "dedup.growth_factor".to_string(),
                reason: "growth factor must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

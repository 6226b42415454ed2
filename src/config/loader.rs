// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::core::ScanConfig;
use super::validation::ConfigValidator;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    /// Read, apply environment overrides, and validate
    pub fn load_config(&self) -> Result<ScanConfig> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let mut config = Self::parse(&content, self.format)?;
        apply_env_overrides(&mut config)?;

        ConfigValidator::validate_scan_config(&config).context("Configuration validation failed")?;

        info!(
            "Loaded configuration from {:?} (depth={}, concurrency={}-{})",
            self.config_path,
            config.max_depth,
            config.min_concurrency(),
            config.max_concurrency()
        );

        Ok(config)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<ScanConfig> {
        let config = match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).context("Failed to parse YAML config")?
            }
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML config")?,
            ConfigFormat::Json => {
                serde_json::from_str(content).context("Failed to parse JSON config")?
            }
        };
        Ok(config)
    }
}

/// Load from an optional file, falling back to defaults, then validate
pub fn load_config_with_overrides(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => ConfigLoader::new(p)?.load_config(),
        None => {
            let mut config = ScanConfig::default();
            apply_env_overrides(&mut config)?;
            ConfigValidator::validate_scan_config(&config)
                .context("Configuration validation failed")?;
            Ok(config)
        }
    }
}

fn apply_env_overrides(config: &mut ScanConfig) -> Result<()> {
    if let Ok(depth) = std::env::var("SCANNER_MAX_DEPTH") {
        config.max_depth = depth.parse().context("Invalid SCANNER_MAX_DEPTH")?;
        debug!("SCANNER_MAX_DEPTH override: {}", config.max_depth);
    }

    if let Ok(timeout) = std::env::var("SCANNER_TIMEOUT") {
        config.request_timeout_secs = timeout.parse().context("Invalid SCANNER_TIMEOUT")?;
    }

    if let Ok(min) = std::env::var("SCANNER_MIN_CONCURRENCY") {
        config.concurrency_range.0 = min.parse().context("Invalid SCANNER_MIN_CONCURRENCY")?;
    }

    if let Ok(max) = std::env::var("SCANNER_MAX_CONCURRENCY") {
        config.concurrency_range.1 = max.parse().context("Invalid SCANNER_MAX_CONCURRENCY")?;
    }

    if let Ok(retries) = std::env::var("SCANNER_MAX_RETRIES") {
        config.max_retries = retries.parse().context("Invalid SCANNER_MAX_RETRIES")?;
    }

    if let Ok(user_agent) = std::env::var("SCANNER_USER_AGENT") {
        config.user_agent = Some(user_agent);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            ConfigLoader::detect_format(Path::new("scan.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigLoader::detect_format(Path::new("scan.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigLoader::detect_format(Path::new("scan.ini")).is_err());
        assert!(ConfigLoader::detect_format(Path::new("scan")).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
max_depth = 2
concurrency_range = [4, 16]
sensitive_ext = ["sql", "bak"]

[[sensitive_paths]]
pattern = '\.git/'
risk = "high"
label = "git metadata"
"#;
        let config = ConfigLoader::parse(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.concurrency_range, (4, 16));
        assert_eq!(config.sensitive_ext.len(), 2);
        assert_eq!(config.sensitive_paths[0].label.as_deref(), Some("git metadata"));
    }

    #[test]
    fn test_load_rejects_invalid_bounds() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"concurrency_range": [20, 5]}}"#).unwrap();

        let loader = ConfigLoader::new(file.path()).unwrap();
        let err = loader.load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid concurrency range"));
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};
use url::Url;

use crate::errors::ConfigError;
use crate::types::Target;

/// Parse one target line.
///
/// Accepts a full URL, a bare host, a host with a path suffix, or `host:port`.
/// Lines without a scheme are treated as `http://`. Query strings and
/// fragments are not part of a target and are dropped.
pub fn parse_target(input: &str, forbidden_ports: &BTreeSet<u16>) -> Result<Target, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidTarget {
            input: input.to_string(),
            reason: "empty target".to_string(),
        });
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidTarget {
        input: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ConfigError::InvalidTarget {
            input: trimmed.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        });
    }

    let host = url.host_str().ok_or_else(|| ConfigError::InvalidTarget {
        input: trimmed.to_string(),
        reason: "missing host".to_string(),
    })?;

    let port = url.port_or_known_default().unwrap_or(80);
    if forbidden_ports.contains(&port) {
        return Err(ConfigError::InvalidTarget {
            input: trimmed.to_string(),
            reason: format!("port {} is forbidden", port),
        });
    }

    if url.query().is_some() {
        debug!("Dropping query string from target {}", trimmed);
    }

    Ok(Target::new(scheme, host, port, url.path()))
}

/// Parse a newline-separated target list.
///
/// Blank lines and `#` comments are skipped and duplicates collapse onto the
/// first occurrence. Invalid lines are returned alongside the parsed targets
/// so the caller can decide whether to continue.
pub fn parse_target_list(
    content: &str,
    forbidden_ports: &BTreeSet<u16>,
) -> (Vec<Target>, Vec<ConfigError>) {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    let mut errors = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_target(line, forbidden_ports) {
            Ok(target) => {
                if seen.insert(target.clone()) {
                    targets.push(target);
                }
            }
            Err(e) => {
                warn!("Skipping target: {}", e);
                errors.push(e);
            }
        }
    }

    (targets, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden() -> BTreeSet<u16> {
        [22, 3306, 3389].into_iter().collect()
    }

    #[test]
    fn test_full_url() {
        let t = parse_target("https://Example.com/app/?utm_source=x", &forbidden()).unwrap();
        assert_eq!(t.scheme, "https");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 443);
        assert_eq!(t.base_path, "/app");
    }

    #[test]
    fn test_bare_host() {
        let t = parse_target("example.com", &forbidden()).unwrap();
        assert_eq!(t.base_url(), "http://example.com/");
    }

    #[test]
    fn test_host_with_path() {
        let t = parse_target("example.com/site", &forbidden()).unwrap();
        assert_eq!(t.base_path, "/site");
        assert_eq!(t.port, 80);
    }

    #[test]
    fn test_host_port() {
        let t = parse_target("example.com:8080", &forbidden()).unwrap();
        assert_eq!(t.port, 8080);
        assert_eq!(t.origin(), "http://example.com:8080");
    }

    #[test]
    fn test_forbidden_port() {
        let err = parse_target("db.example.com:3306", &forbidden()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(parse_target("ftp://example.com", &forbidden()).is_err());
    }

    #[test]
    fn test_target_list() {
        let content = "\n# staging\nexample.com\nhttp://example.com/\nexample.org:22\n  test.local/app  \n";
        let (targets, errors) = parse_target_list(content, &forbidden());
        assert_eq!(targets.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(targets[1].base_path, "/app");
    }
}

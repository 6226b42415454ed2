// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Archive Magic Signatures
 * Leading-byte signatures for archive and container formats
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use crate::config::SignatureConfig;
use crate::errors::ConfigError;
use crate::types::RiskLevel;

/// Byte sequence expected at a fixed offset of the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicSignature {
    pub name: String,
    pub magic: Vec<u8>,
    pub offset: usize,
    pub risk: RiskLevel,
}

impl MagicSignature {
    pub fn new(name: &str, magic: &[u8], offset: usize, risk: RiskLevel) -> Self {
        Self {
            name: name.to_string(),
            magic: magic.to_vec(),
            offset,
            risk,
        }
    }

    pub fn from_config(config: &SignatureConfig) -> Result<Self, ConfigError> {
        let magic = parse_hex(&config.magic_hex).map_err(|reason| ConfigError::InvalidSignature {
            name: config.name.clone(),
            reason,
        })?;

        if magic.is_empty() {
            return Err(ConfigError::InvalidSignature {
                name: config.name.clone(),
                reason: "magic bytes are empty".to_string(),
            });
        }

        Ok(Self {
            name: config.name.clone(),
            magic,
            offset: config.offset,
            risk: config.risk,
        })
    }

    /// Samples too short to cover `offset + magic` never match
    pub fn matches(&self, sample: &[u8]) -> bool {
        sample
            .get(self.offset..)
            .map(|tail| tail.starts_with(&self.magic))
            .unwrap_or(false)
    }

    /// Bytes a sample needs for this signature to be decidable
    pub fn span(&self) -> usize {
        self.offset + self.magic.len()
    }
}

/// Archive and container formats recognized out of the box
pub fn builtin_signatures() -> Vec<MagicSignature> {
    vec![
        MagicSignature::new("zip", b"PK\x03\x04", 0, RiskLevel::High),
        MagicSignature::new("gzip", &[0x1f, 0x8b], 0, RiskLevel::High),
        MagicSignature::new("tar", b"ustar", 257, RiskLevel::High),
        MagicSignature::new("bzip2", b"BZh", 0, RiskLevel::High),
        MagicSignature::new("xz", &[0xfd, b'7', b'z', b'X', b'Z', 0x00], 0, RiskLevel::High),
        MagicSignature::new("7z", &[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c], 0, RiskLevel::High),
        MagicSignature::new("rar", b"Rar!\x1a\x07", 0, RiskLevel::High),
        MagicSignature::new("sqlite", b"SQLite format 3\x00", 0, RiskLevel::High),
    ]
}

/// Parse `50 4b 03 04`, `504B0304` or `0x504b0304`
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", input));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex byte at position {} in '{}'", i, input))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> MagicSignature {
        builtin_signatures()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[test]
    fn test_zip_and_gzip() {
        assert!(find("zip").matches(b"PK\x03\x04\x14\x00rest"));
        assert!(!find("zip").matches(b"PK"));
        assert!(find("gzip").matches(&[0x1f, 0x8b, 0x08, 0x00]));
        assert!(!find("gzip").matches(b"<html>"));
    }

    #[test]
    fn test_tar_needs_offset() {
        let tar = find("tar");
        let mut sample = vec![0u8; 512];
        sample[257..262].copy_from_slice(b"ustar");
        assert!(tar.matches(&sample));

        // Truncated sample abstains instead of failing
        assert!(!tar.matches(&sample[..200]));
        assert_eq!(tar.span(), 262);
    }

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex("50 4b 03 04").unwrap(), vec![0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(parse_hex("0x1F8B").unwrap(), vec![0x1f, 0x8b]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_from_config_rejects_bad_hex() {
        let config = SignatureConfig {
            name: "broken".to_string(),
            magic_hex: "GG".to_string(),
            offset: 0,
            risk: RiskLevel::Medium,
        };
        let err = MagicSignature::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSignature { .. }));

        let config = SignatureConfig {
            name: "pdf".to_string(),
            magic_hex: "25 50 44 46".to_string(),
            offset: 0,
            risk: RiskLevel::Low,
        };
        let sig = MagicSignature::from_config(&config).unwrap();
        assert!(sig.matches(b"%PDF-1.7"));
        assert_eq!(sig.risk, RiskLevel::Low);
    }
}

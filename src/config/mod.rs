// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;
pub mod targets;
pub mod validation;

pub use self::core::{ConcurrencyPolicy, DedupConfig, PathRuleConfig, ScanConfig, SignatureConfig, SoftNotFoundConfig};

pub use loader::{load_config_with_overrides, ConfigFormat, ConfigLoader};

pub use targets::{parse_target, parse_target_list};

pub use validation::ConfigValidator;

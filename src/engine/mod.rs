// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Engine Module
 * Detection rules and archive signatures
 *
 * © 2026 Bountyy Oy
 */

pub mod rule_engine;
pub mod signatures;

pub use rule_engine::{DetectionEngine, DetectionRule, PathPattern, RuleMatch, RuleSet};
pub use signatures::{builtin_signatures, parse_hex, MagicSignature};

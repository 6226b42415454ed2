// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Scanner Library
 * Exposes scanner modules for the CLI, tests and benchmarks
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod adaptive_concurrency;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod generator;
pub mod http_client;
pub mod progress;
pub mod reporting;
pub mod scanner;
pub mod types;
pub mod worker;

// Production error handling and resilience modules
pub mod errors;
pub mod retry;

pub use errors::{ConfigError, ScannerError, ScannerResult, TransportError};
pub use scanner::ScanEngine;
pub use types::{Finding, RiskLevel, ScanSummary, Target};

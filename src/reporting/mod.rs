// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod engine;
pub mod formats;
pub mod sink;
pub mod types;

pub use engine::ReportEngine;
pub use sink::ResultSink;
pub use types::{ReportConfig, ReportFormat, ReportOutput};

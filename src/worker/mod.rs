// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Worker Module
 * Fetch workers and per-target soft-404 baselines
 *
 * © 2026 Bountyy Oy
 */

pub mod baseline;
pub mod fetch_worker;

pub use baseline::{BaselineProbe, SoftNotFoundBaseline};
pub use fetch_worker::FetchWorker;

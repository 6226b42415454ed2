// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Soft-404 Baseline Probe
 * Detects targets that answer 2xx for paths that cannot exist
 *
 * Many CDN and framework setups serve a custom error page with 200 OK.
 * Before a target is scanned, one random path is requested; a 2xx answer
 * becomes the target's baseline and look-alike responses are flagged.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::http_client::Transport;
use crate::types::Target;

/// Fingerprint of a target's catch-all success response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftNotFoundBaseline {
    pub status_code: u16,
    pub content_length: u64,
}

impl SoftNotFoundBaseline {
    /// Same status class and a length within `tolerance` bytes
    pub fn resembles(&self, status_code: u16, content_length: u64, tolerance: u64) -> bool {
        status_code / 100 == self.status_code / 100
            && content_length.abs_diff(self.content_length) <= tolerance
    }
}

pub struct BaselineProbe {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl BaselineProbe {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Request a random nonexistent path. Returns a baseline only when the
    /// target claims it exists; errors and honest 404s yield `None`.
    pub async fn probe(&self, target: &Target) -> Option<SoftNotFoundBaseline> {
        let path = target.join(&format!("{}.html", Uuid::new_v4().simple()));
        let url = format!("{}{}", target.origin(), path);

        let response = match tokio::time::timeout(self.timeout, self.transport.get(&url)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(target = %target, error = %e, "Baseline probe failed");
                return None;
            }
            Err(_) => {
                debug!(target = %target, "Baseline probe timed out");
                return None;
            }
        };

        if (200..300).contains(&response.status_code) {
            info!(
                target = %target,
                status = response.status_code,
                length = response.content_length,
                "Target answers nonexistent paths with success, soft-404 baseline recorded"
            );
            Some(SoftNotFoundBaseline {
                status_code: response.status_code,
                content_length: response.content_length,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resembles_within_tolerance() {
        let baseline = SoftNotFoundBaseline {
            status_code: 200,
            content_length: 1000,
        };
        assert!(baseline.resembles(200, 1000, 0));
        assert!(baseline.resembles(200, 1020, 32));
        assert!(baseline.resembles(204, 980, 32));
        assert!(!baseline.resembles(200, 2000, 32));
        assert!(!baseline.resembles(404, 1000, 32));
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Fetch Worker
 * Issues one bounded request per candidate and classifies the response
 *
 * © 2026 Bountyy Oy
 */

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::baseline::SoftNotFoundBaseline;
use crate::config::{ScanConfig, SoftNotFoundConfig};
use crate::errors::TransportError;
use crate::http_client::{HttpResponse, Transport};
use crate::retry::{retry_transport, RetryConfig};
use crate::types::{CandidateUrl, FetchOutcome, ResponseClass};

// Apache/nginx autoindex and Python http.server headings
static LISTING_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(title|h1)>\s*(index of|directory listing for)\s+/").unwrap()
});

pub struct FetchWorker {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    timeout: Duration,
    sample_bytes: usize,
    soft_not_found: SoftNotFoundConfig,
}

impl FetchWorker {
    pub fn new(transport: Arc<dyn Transport>, config: &ScanConfig) -> Self {
        let mut soft_not_found = config.soft_not_found.clone();
        soft_not_found.markers = soft_not_found
            .markers
            .iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        Self {
            transport,
            retry: RetryConfig::from_retries(config.max_retries),
            timeout: config.request_timeout(),
            sample_bytes: config.sample_bytes,
            soft_not_found,
        }
    }

    /// One logical fetch, retried on transient transport failures. Every
    /// attempt is bounded by the request timeout.
    pub async fn fetch(
        &self,
        candidate: CandidateUrl,
        baseline: Option<&SoftNotFoundBaseline>,
    ) -> FetchOutcome {
        let url = candidate.url();
        let started = Instant::now();

        let result = retry_transport(&self.retry, &url, || {
            let transport = Arc::clone(&self.transport);
            let url = url.clone();
            let timeout = self.timeout;
            async move {
                match tokio::time::timeout(timeout, transport.get(&url)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout { url, timeout }),
                }
            }
        })
        .await;
        let latency = started.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, kind = e.kind(), "Fetch failed");
                return FetchOutcome::failed(candidate, e, latency);
            }
        };

        let class = self.classify(&candidate, &response, baseline);
        let listing_links = if class == ResponseClass::Exists && candidate.is_directory() {
            extract_listing_links(&response)
        } else {
            Vec::new()
        };

        debug!(
            url = %url,
            status = response.status_code,
            class = ?class,
            latency_ms = latency.as_millis() as u64,
            "Fetched candidate"
        );

        let sample_len = response.body.len().min(self.sample_bytes);
        FetchOutcome {
            status_code: Some(response.status_code),
            content_length: Some(response.content_length),
            content_type: response.content_type().map(|s| s.to_string()),
            sample: response.body[..sample_len].to_vec(),
            class: Some(class),
            latency,
            listing_links,
            error: None,
            candidate,
        }
    }

    /// Map a raw response onto exists / absent / ambiguous
    pub fn classify(
        &self,
        candidate: &CandidateUrl,
        response: &HttpResponse,
        baseline: Option<&SoftNotFoundBaseline>,
    ) -> ResponseClass {
        match response.status_code {
            200..=299 => {
                if self.looks_like_error_page(response, baseline) {
                    ResponseClass::Ambiguous
                } else {
                    ResponseClass::Exists
                }
            }
            300..=399 => {
                if redirects_within_host(candidate, response.header("location")) {
                    ResponseClass::Exists
                } else {
                    ResponseClass::Absent
                }
            }
            400..=499 => {
                if self.soft_not_found.ambiguous_statuses.contains(&response.status_code) {
                    ResponseClass::Ambiguous
                } else {
                    ResponseClass::Absent
                }
            }
            _ => ResponseClass::Absent,
        }
    }

    fn looks_like_error_page(
        &self,
        response: &HttpResponse,
        baseline: Option<&SoftNotFoundBaseline>,
    ) -> bool {
        let soft = &self.soft_not_found;

        if response.content_length < soft.min_content_length {
            return true;
        }

        if let Some(baseline) = baseline {
            if baseline.resembles(
                response.status_code,
                response.content_length,
                soft.length_tolerance,
            ) {
                return true;
            }
        }

        if !soft.markers.is_empty() {
            let body = response.body_text().to_lowercase();
            if soft.markers.iter().any(|m| body.contains(m.as_str())) {
                return true;
            }
        }

        false
    }
}

/// A 3xx counts as existence only when it stays on the candidate's host
fn redirects_within_host(candidate: &CandidateUrl, location: Option<&str>) -> bool {
    let location = match location {
        Some(l) if !l.trim().is_empty() => l.trim(),
        _ => return false,
    };

    let Ok(base) = Url::parse(&candidate.url()) else {
        return false;
    };

    match base.join(location) {
        Ok(resolved) => {
            resolved.host_str() == base.host_str()
                && resolved.port_or_known_default() == base.port_or_known_default()
        }
        Err(_) => false,
    }
}

/// Pull `a[href]` links out of an auto-index page
fn extract_listing_links(response: &HttpResponse) -> Vec<String> {
    let is_html = response
        .content_type()
        .map(|ct| ct.to_lowercase().contains("text/html"))
        .unwrap_or(true);
    if !is_html {
        return Vec::new();
    }

    let text = response.body_text();
    if !LISTING_HEADING.is_match(&text) {
        return Vec::new();
    }

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(&text);
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .collect()
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::TransportError;

/// Realistic browser User-Agents to avoid detection
const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get a realistic browser User-Agent (rotates per client)
fn get_browser_user_agent() -> &'static str {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let index = COUNTER.fetch_add(1, Ordering::Relaxed) % BROWSER_USER_AGENTS.len();
    BROWSER_USER_AGENTS[index]
}

const DEFAULT_POOL_IDLE_PER_HOST: usize = 32;
const DEFAULT_POOL_MAX_IDLE_TIMEOUT: u64 = 90;

/// Raw response as seen by the fetch worker. Header names are lower-cased.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    /// Body prefix, at most the client's `max_body_size` bytes
    pub body: Vec<u8>,
    /// Declared `Content-Length`, falling back to the bytes actually read
    pub content_length: u64,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outbound HTTP seam. The engine only ever issues GET requests and never
/// follows redirects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    timeout: Duration,
    max_body_size: usize,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_body_size: usize, user_agent: Option<&str>) -> Result<Self> {
        // Only for lab targets with self-signed certificates
        let accept_invalid_certs = std::env::var("ACCEPT_INVALID_CERTS")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        if accept_invalid_certs {
            warn!("Certificate validation is DISABLED (ACCEPT_INVALID_CERTS=true)");
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(
                user_agent
                    .map(str::to_string)
                    .unwrap_or_else(|| get_browser_user_agent().to_string()),
            )
            .pool_max_idle_per_host(DEFAULT_POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(DEFAULT_POOL_MAX_IDLE_TIMEOUT))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client: Arc::new(client),
            timeout,
            max_body_size,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let started = Instant::now();

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        let status_code = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|value| (k.as_str().to_lowercase(), value.to_string()))
            })
            .collect();
        let declared_length = response.content_length();

        // Read body up to the size limit; the rest is never downloaded
        let mut body = Vec::new();
        while body.len() < self.max_body_size {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_body_size - body.len();
                    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                Ok(None) => break,
                Err(e) => return Err(TransportError::from_reqwest(&e, self.timeout)),
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!("GET {} -> {} ({} bytes, {}ms)", url, status_code, body.len(), duration_ms);

        Ok(HttpResponse {
            status_code,
            content_length: declared_length.unwrap_or(body.len() as u64),
            headers,
            body,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        let response = HttpResponse {
            status_code: 200,
            headers,
            ..Default::default()
        };
        assert_eq!(response.content_type(), Some("text/html"));
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.header("location"), None);
    }

    #[test]
    fn test_user_agent_rotation() {
        let first = get_browser_user_agent();
        let second = get_browser_user_agent();
        assert_ne!(first, second);
    }
}

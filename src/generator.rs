// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Candidate Generator
 * Lazy wordlist expansion per target plus bounded directory recursion
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::ScanConfig;
use crate::types::{CandidateUrl, Target};

/// Stateless producer of candidate URLs. Holds only configuration.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    templates: Vec<String>,
    /// Sorted, lower-case, without leading dot
    extensions: Vec<String>,
    ignore_ext: BTreeSet<String>,
    max_depth: u32,
}

impl CandidateGenerator {
    pub fn new(config: &ScanConfig) -> Self {
        let extensions: BTreeSet<String> = config
            .sensitive_ext
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        Self {
            templates: config.wordlist.clone(),
            extensions: extensions.into_iter().collect(),
            ignore_ext: config.ignore_ext.iter().map(|e| e.to_lowercase()).collect(),
            max_depth: config.max_depth,
        }
    }

    /// Seed candidates for every target, target by target. Nothing is
    /// materialized ahead of the consumer.
    pub fn candidates(&self, targets: Vec<Arc<Target>>) -> impl Iterator<Item = CandidateUrl> + Send + '_ {
        targets.into_iter().flat_map(move |t| self.for_target(t))
    }

    /// The target's base directory first, then each wordlist template.
    pub fn for_target(&self, target: Arc<Target>) -> impl Iterator<Item = CandidateUrl> + Send + '_ {
        let base = if target.base_path == "/" {
            "/".to_string()
        } else {
            format!("{}/", target.base_path)
        };
        let root = std::iter::once(CandidateUrl::new(Arc::clone(&target), base, 0));

        let templated = self.templates.iter().flat_map(move |template| {
            let target = Arc::clone(&target);
            self.expand_template(template, &target.host)
                .into_iter()
                .map(move |rel| CandidateUrl::new(Arc::clone(&target), target.join(&rel), 0))
        });

        root.chain(templated)
    }

    fn expand_template(&self, template: &str, host: &str) -> Vec<String> {
        let with_host = template.replace("{host}", host);
        if with_host.contains("{ext}") {
            self.extensions
                .iter()
                .map(|ext| with_host.replace("{ext}", ext))
                .collect()
        } else {
            vec![with_host]
        }
    }

    /// Turn links found in a directory listing into child candidates one
    /// level deeper. Links leaving the listing's origin or directory are
    /// dropped, as are ignored file types and anything past `max_depth`.
    pub fn expand(&self, parent: &CandidateUrl, links: &[String]) -> Vec<CandidateUrl> {
        if !parent.is_directory() || parent.depth >= self.max_depth {
            return Vec::new();
        }

        let base = match Url::parse(&parent.url()) {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        };

        // Compare in the percent-encoded form `Url::path` produces
        let parent_path = base.path().to_string();
        let mut seen = BTreeSet::new();
        let mut children = Vec::new();

        for link in links {
            let mut resolved = match base.join(link.trim()) {
                Ok(u) => u,
                Err(_) => continue,
            };

            if resolved.origin() != base.origin() {
                continue;
            }

            resolved.set_query(None);
            resolved.set_fragment(None);
            let path = resolved.path().to_string();

            if path.len() <= parent_path.len() || !path.starts_with(&parent_path) {
                continue;
            }

            if self.is_ignored(&path) {
                continue;
            }

            if seen.insert(path.clone()) {
                children.push(CandidateUrl::new(
                    Arc::clone(&parent.target),
                    path,
                    parent.depth + 1,
                ));
            }
        }

        debug!(
            parent = %parent.url(),
            links = links.len(),
            children = children.len(),
            "Expanded directory listing"
        );
        children
    }

    fn is_ignored(&self, path: &str) -> bool {
        if path.ends_with('/') {
            return false;
        }
        let segment = path.rsplit('/').next().unwrap_or(path);
        segment
            .rsplit_once('.')
            .map(|(_, ext)| self.ignore_ext.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

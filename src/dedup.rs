// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - URL Deduplication
 * Scalable bloom filter guarding the candidate stream against repeat fetches
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use ahash::RandomState;
use parking_lot::Mutex;
use std::f64::consts::LN_2;
use std::hash::Hash;
use tracing::debug;
use url::Url;

use crate::config::DedupConfig;

// Fixed seeds keep membership stable across runs of the same session setup
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Prefix hashed ahead of the item for the second, independent hash
const STRIDE_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// One fixed-capacity bit array with its own hash count
#[derive(Debug, Clone)]
struct BloomLayer {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    set_bits: u64,
    capacity: usize,
    error_rate: f64,
    items: usize,
}

impl BloomLayer {
    fn with_capacity(capacity: usize, error_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let num_bits = ((capacity as f64) * error_rate.ln().abs() / (LN_2 * LN_2)).ceil() as u64;
        let num_bits = num_bits.max(64);
        let num_hashes = ((1.0 / error_rate).log2().ceil() as u32).max(1);
        let words = num_bits.div_ceil(64) as usize;

        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            set_bits: 0,
            capacity,
            error_rate,
            items: 0,
        }
    }

    #[inline]
    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }

    fn contains(&self, h1: u64, h2: u64) -> bool {
        (0..self.num_hashes).all(|i| {
            let idx = self.bit_index(h1, h2, i);
            self.bits[(idx / 64) as usize] & (1 << (idx % 64)) != 0
        })
    }

    fn insert(&mut self, h1: u64, h2: u64) {
        for i in 0..self.num_hashes {
            let idx = self.bit_index(h1, h2, i);
            let word = &mut self.bits[(idx / 64) as usize];
            let mask = 1 << (idx % 64);
            if *word & mask == 0 {
                *word |= mask;
                self.set_bits += 1;
            }
        }
        self.items += 1;
    }

    fn fill_ratio(&self) -> f64 {
        self.set_bits as f64 / self.num_bits as f64
    }

    fn memory_bytes(&self) -> usize {
        self.bits.len() * std::mem::size_of::<u64>()
    }
}

/// Layered bloom filter that appends a larger, tighter layer when the active
/// one fills up. Never yields false negatives.
#[derive(Debug, Clone)]
pub struct ScalableBloomFilter {
    layers: Vec<BloomLayer>,
    fill_threshold: f64,
    growth_factor: f64,
    tightening_ratio: f64,
    hasher: RandomState,
}

impl ScalableBloomFilter {
    pub fn new(config: &DedupConfig) -> Self {
        // The first layer gets error * (1 - r) so the geometric series of
        // per-layer rates sums to at most the configured error rate.
        let first_error = config.error_rate * (1.0 - config.tightening_ratio).max(f64::EPSILON);
        let first = BloomLayer::with_capacity(config.initial_capacity, first_error);

        Self {
            layers: vec![first],
            fill_threshold: config.fill_threshold,
            growth_factor: config.growth_factor,
            tightening_ratio: config.tightening_ratio,
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        }
    }

    /// Base position and stride for double hashing. The stride comes from a
    /// salted second pass over the item, finalized with a multiply so its low
    /// bits are well mixed, and is forced odd so no bit repeats within one
    /// power-of-two span.
    fn hashes<T: Hash + ?Sized>(&self, item: &T) -> (u64, u64) {
        let h1 = self.hasher.hash_one(item);
        let salted = self.hasher.hash_one((STRIDE_SALT, item));
        let h2 = salted.rotate_left(32).wrapping_mul(STRIDE_SALT) | 1;
        (h1, h2)
    }

    pub fn contains<T: Hash + ?Sized>(&self, item: &T) -> bool {
        let (h1, h2) = self.hashes(item);
        self.layers.iter().any(|layer| layer.contains(h1, h2))
    }

    /// Insert `item`, returning true if it was (probably) already present.
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) -> bool {
        let (h1, h2) = self.hashes(item);
        if self.layers.iter().any(|layer| layer.contains(h1, h2)) {
            return true;
        }

        if self.active().fill_ratio() >= self.fill_threshold {
            self.grow();
        }

        let active = self.layers.len() - 1;
        self.layers[active].insert(h1, h2);
        false
    }

    fn active(&self) -> &BloomLayer {
        // `layers` is never empty
        &self.layers[self.layers.len() - 1]
    }

    fn grow(&mut self) {
        let previous = self.active();
        let capacity = ((previous.capacity as f64) * self.growth_factor).ceil() as usize;
        let error_rate = (previous.error_rate * self.tightening_ratio).max(f64::MIN_POSITIVE);

        debug!(
            layer = self.layers.len(),
            capacity,
            error_rate,
            fill = previous.fill_ratio(),
            "Dedup filter appending layer"
        );

        self.layers.push(BloomLayer::with_capacity(capacity, error_rate));
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| l.items).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn capacity(&self) -> usize {
        self.layers.iter().map(|l| l.capacity).sum()
    }

    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.memory_bytes()).sum()
    }

    /// Upper bound on the compound false-positive probability
    pub fn false_positive_bound(&self) -> f64 {
        1.0 - self
            .layers
            .iter()
            .map(|l| 1.0 - l.error_rate)
            .product::<f64>()
    }
}

/// Session-wide "seen before" gate. The check and the insert happen under
/// one lock so concurrent callers never both see a URL as new.
#[derive(Debug)]
pub struct Deduplicator {
    filter: Mutex<ScalableBloomFilter>,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            filter: Mutex::new(ScalableBloomFilter::new(config)),
        }
    }

    /// Returns true if the URL was already recorded (skip it), false if it
    /// was recorded just now (proceed).
    pub fn test_and_add(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.filter.lock().insert(key.as_str())
    }

    pub fn contains(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.filter.lock().contains(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.filter.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layer_count(&self) -> usize {
        self.filter.lock().layer_count()
    }

    pub fn memory_bytes(&self) -> usize {
        self.filter.lock().memory_bytes()
    }
}

/// Canonical form used as the dedup key: lower-cased scheme and host,
/// default port elided, fragment dropped, `utm_*` tracking parameters
/// removed. Trailing slashes are kept because `/a` and `/a/` are distinct
/// candidates.
pub fn normalize_url(raw: &str) -> String {
    let mut url = match Url::parse(raw.trim()) {
        Ok(u) => u,
        Err(_) => return raw.trim().to_string(),
    };

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !k.starts_with("utm_"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

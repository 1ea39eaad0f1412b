//! Mergeable sketches backing the column profiler
//!
//! All three structures merge associatively and commutatively, which is what
//! lets batches be profiled in parallel and reduced in any order:
//!
//! - [`DistinctSketch`] counts distinct values exactly up to a cap, then
//!   degrades to a HyperLogLog-style register array (2^14 registers, typical
//!   relative error around 1.6%).
//! - [`TopKSketch`] keeps per-value counts with deterministic pruning. The
//!   merged top-N is exact for values that stay within the tracked set and
//!   approximate under extreme skew; consumers must treat it as approximate.
//! - [`BottomKSample`] retains the k values with the smallest content digests,
//!   a uniform sample that is reproducible across runs and independent of
//!   arrival order. Quantiles and IQR outlier bounds are estimated from it.

use std::collections::{BTreeMap, HashSet};

use sha2::{Digest, Sha256};

/// 64-bit content digest of a rendered value.
///
/// SHA-256 truncated to the first 8 bytes: deterministic across runs and
/// platforms, unlike the std hasher.
pub fn value_digest(rendered: &str) -> u64 {
    let digest = Sha256::digest(rendered.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

const HLL_BITS: u32 = 14;
const HLL_REGISTERS: usize = 1 << HLL_BITS;

/// Distinct-count sketch: exact below a threshold, HyperLogLog above it.
#[derive(Debug, Clone)]
pub enum DistinctSketch {
    Exact { values: HashSet<u64>, limit: usize },
    Approx { registers: Vec<u8> },
}

impl DistinctSketch {
    pub fn new(limit: usize) -> Self {
        DistinctSketch::Exact {
            values: HashSet::new(),
            limit: limit.max(1),
        }
    }

    pub fn insert(&mut self, digest: u64) {
        match self {
            DistinctSketch::Exact { values, limit } => {
                values.insert(digest);
                if values.len() > *limit {
                    let mut registers = vec![0u8; HLL_REGISTERS];
                    for d in values.iter() {
                        hll_insert(&mut registers, *d);
                    }
                    *self = DistinctSketch::Approx { registers };
                }
            }
            DistinctSketch::Approx { registers } => hll_insert(registers, digest),
        }
    }

    /// Whether the count is still exact.
    pub fn is_exact(&self) -> bool {
        matches!(self, DistinctSketch::Exact { .. })
    }

    pub fn estimate(&self) -> u64 {
        match self {
            DistinctSketch::Exact { values, .. } => values.len() as u64,
            DistinctSketch::Approx { registers } => hll_estimate(registers),
        }
    }

    pub fn merge(&mut self, other: &DistinctSketch) {
        match other {
            // Insert handles the exact-to-approx transition if the union
            // crosses the limit.
            DistinctSketch::Exact { values, .. } => {
                for d in values.iter() {
                    self.insert(*d);
                }
            }
            DistinctSketch::Approx { registers: theirs } => {
                if let DistinctSketch::Exact { values, .. } = &*self {
                    let mut registers = vec![0u8; HLL_REGISTERS];
                    for d in values.iter() {
                        hll_insert(&mut registers, *d);
                    }
                    *self = DistinctSketch::Approx { registers };
                }
                if let DistinctSketch::Approx { registers } = self {
                    for (r, v) in registers.iter_mut().zip(theirs.iter()) {
                        *r = (*r).max(*v);
                    }
                }
            }
        }
    }
}

fn hll_insert(registers: &mut [u8], digest: u64) {
    let index = (digest >> (64 - HLL_BITS)) as usize;
    let remainder = digest << HLL_BITS;
    let rank = (remainder.leading_zeros() + 1).min(64 - HLL_BITS + 1) as u8;
    if registers[index] < rank {
        registers[index] = rank;
    }
}

fn hll_estimate(registers: &[u8]) -> u64 {
    let m = registers.len() as f64;
    let alpha = 0.7213 / (1.0 + 1.079 / m);
    let sum: f64 = registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
    let raw = alpha * m * m / sum;
    let zeros = registers.iter().filter(|&&r| r == 0).count();
    if raw <= 2.5 * m && zeros > 0 {
        // Small-range correction (linear counting).
        (m * (m / zeros as f64).ln()).round() as u64
    } else {
        raw.round() as u64
    }
}

/// Top-N value/frequency tracker with deterministic pruning.
#[derive(Debug, Clone)]
pub struct TopKSketch {
    counts: BTreeMap<String, u64>,
    k: usize,
}

impl TopKSketch {
    pub fn new(k: usize) -> Self {
        Self {
            counts: BTreeMap::new(),
            k: k.max(1),
        }
    }

    pub fn insert(&mut self, rendered: &str) {
        *self.counts.entry(rendered.to_string()).or_insert(0) += 1;
        if self.counts.len() > self.k * 8 {
            self.prune(self.k * 4);
        }
    }

    pub fn merge(&mut self, other: &TopKSketch) {
        for (value, count) in &other.counts {
            *self.counts.entry(value.clone()).or_insert(0) += count;
        }
        if self.counts.len() > self.k * 8 {
            self.prune(self.k * 4);
        }
    }

    /// Keep the `keep` highest counts; ties broken by value ordering so the
    /// retained set does not depend on map iteration order.
    fn prune(&mut self, keep: usize) {
        let mut entries: Vec<(String, u64)> = std::mem::take(&mut self.counts).into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(keep);
        self.counts = entries.into_iter().collect();
    }

    /// Top values by frequency, ties broken by value.
    pub fn top(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> =
            self.counts.iter().map(|(v, c)| (v.clone(), *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(self.k);
        entries
    }
}

/// Bottom-k numeric sample keyed on value digest.
///
/// Retains the `k` observations with the smallest digests. Merging two
/// samples yields the same set as sampling the concatenated stream, so the
/// sample is independent of batch boundaries and processing order.
#[derive(Debug, Clone)]
pub struct BottomKSample {
    entries: BTreeMap<(u64, u64), f64>,
    k: usize,
    next_seq: u64,
}

impl BottomKSample {
    pub fn new(k: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            k: k.max(16),
            next_seq: 0,
        }
    }

    pub fn insert(&mut self, digest: u64, value: f64) {
        // The sequence component keeps duplicate values (same digest) as
        // separate observations so frequency still influences quantiles.
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((digest, seq), value);
        while self.entries.len() > self.k {
            let last = *self.entries.keys().next_back().expect("non-empty");
            self.entries.remove(&last);
        }
    }

    pub fn merge(&mut self, other: &BottomKSample) {
        for ((digest, _), value) in &other.entries {
            self.insert(*digest, *value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Linear-interpolated quantile over the sampled values.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = self.entries.values().copied().collect();
        values.sort_by(|a, b| a.partial_cmp(b).expect("no NaN in samples"));
        let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        if lo == hi {
            Some(values[lo])
        } else {
            let frac = pos - lo as f64;
            Some(values[lo] * (1.0 - frac) + values[hi] * frac)
        }
    }

    /// Fraction of sampled values outside `[lower, upper]`.
    pub fn outlier_fraction(&self, lower: f64, upper: f64) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let outside = self
            .entries
            .values()
            .filter(|v| **v < lower || **v > upper)
            .count();
        outside as f64 / self.entries.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_sketch_is_exact_below_limit() {
        let mut sketch = DistinctSketch::new(100);
        for i in 0..50u64 {
            sketch.insert(value_digest(&i.to_string()));
            sketch.insert(value_digest(&i.to_string()));
        }
        assert!(sketch.is_exact());
        assert_eq!(sketch.estimate(), 50);
    }

    #[test]
    fn distinct_sketch_degrades_and_stays_close() {
        let mut sketch = DistinctSketch::new(100);
        for i in 0..20_000u64 {
            sketch.insert(value_digest(&i.to_string()));
        }
        assert!(!sketch.is_exact());
        let estimate = sketch.estimate() as f64;
        assert!((estimate - 20_000.0).abs() / 20_000.0 < 0.05);
    }

    #[test]
    fn distinct_merge_matches_union() {
        let mut a = DistinctSketch::new(1000);
        let mut b = DistinctSketch::new(1000);
        for i in 0..300u64 {
            a.insert(value_digest(&i.to_string()));
        }
        for i in 200..500u64 {
            b.insert(value_digest(&i.to_string()));
        }
        a.merge(&b);
        assert_eq!(a.estimate(), 500);
    }

    #[test]
    fn top_k_merge_re_ranks_union() {
        let mut a = TopKSketch::new(2);
        let mut b = TopKSketch::new(2);
        for _ in 0..5 {
            a.insert("x");
        }
        for _ in 0..3 {
            a.insert("y");
            b.insert("y");
        }
        for _ in 0..4 {
            b.insert("z");
        }
        a.merge(&b);
        let top = a.top();
        assert_eq!(top[0], ("y".to_string(), 6));
        assert_eq!(top[1], ("x".to_string(), 5));
    }

    #[test]
    fn bottom_k_sample_is_order_independent() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let mut forward = BottomKSample::new(64);
        let mut backward = BottomKSample::new(64);
        for v in &values {
            forward.insert(value_digest(&v.to_string()), *v);
        }
        for v in values.iter().rev() {
            backward.insert(value_digest(&v.to_string()), *v);
        }
        assert_eq!(forward.quantile(0.5), backward.quantile(0.5));
    }

    #[test]
    fn quantiles_are_exact_when_sample_holds_everything() {
        let mut sample = BottomKSample::new(1024);
        for v in 1..=100 {
            sample.insert(value_digest(&v.to_string()), v as f64);
        }
        let q1 = sample.quantile(0.25).unwrap();
        let q3 = sample.quantile(0.75).unwrap();
        assert!((q1 - 25.75).abs() < 1e-9);
        assert!((q3 - 75.25).abs() < 1e-9);
    }
}

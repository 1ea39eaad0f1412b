//! Deterministic surrogate keys
//!
//! A surrogate key is the SHA-256 hex digest of the normalized natural key
//! tuple. Equal tuples hash equally on every run and every machine, which is
//! what makes re-runs reproducible and dimension rows globally deduplicated.
//!
//! Each dimension owns one `SurrogateKeyMap`. The map is sharded by the first
//! key byte to keep individual tables small, and it remembers the tuple behind
//! every key so a digest collision (two different tuples, one key) is caught
//! instead of silently merging rows.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::batch::Value;

const SHARDS: usize = 16;
const SEPARATOR: u8 = 0x1f;

/// Canonical text form of one tuple component. Text is trimmed and lowercased
/// so `" ACME "` and `"acme"` key the same dimension row; other types use
/// their canonical rendering.
pub fn normalize_part(value: &Value) -> String {
    match value {
        Value::Text(s) => s.trim().to_lowercase(),
        other => other.render(),
    }
}

/// SHA-256 hex over tuple parts joined by a separator byte that cannot occur
/// in the parts themselves.
pub fn surrogate_of(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }
    hex(&hasher.finalize())
}

/// SHA-256 hex over every value in a row, in column order. Identifies the row
/// content independent of batch boundaries or arrival order.
pub fn row_hash(values: &[Value]) -> String {
    let mut hasher = Sha256::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            hasher.update([SEPARATOR]);
        }
        hasher.update(value.render().as_bytes());
    }
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Two different tuples produced the same digest. Proceeding would silently
/// conflate two dimension members, so this aborts the run.
#[derive(Debug, thiserror::Error)]
#[error("surrogate key collision on {key}")]
pub struct KeyCollision {
    pub key: String,
}

/// Key registry for one dimension. One logical writer owns each map for the
/// duration of a run.
#[derive(Debug, Default)]
pub struct SurrogateKeyMap {
    shards: Vec<HashMap<String, String>>,
}

/// Outcome of registering a tuple.
#[derive(Debug, PartialEq, Eq)]
pub struct Registered {
    pub key: String,
    /// True the first time this tuple was seen.
    pub inserted: bool,
}

impl SurrogateKeyMap {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| HashMap::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shards[Self::shard_of(key)].contains_key(key)
    }

    /// Register a normalized tuple, returning its key and whether it is new.
    pub fn register(&mut self, parts: &[String]) -> Result<Registered, KeyCollision> {
        let key = surrogate_of(parts);
        let joined = parts.join("\u{1f}");
        let shard = &mut self.shards[Self::shard_of(&key)];
        match shard.get(&key) {
            Some(existing) if *existing != joined => Err(KeyCollision { key }),
            Some(_) => Ok(Registered {
                key,
                inserted: false,
            }),
            None => {
                shard.insert(key.clone(), joined);
                Ok(Registered {
                    key,
                    inserted: true,
                })
            }
        }
    }

    fn shard_of(key: &str) -> usize {
        // Keys are lowercase hex, first byte spreads uniformly.
        let first = key.as_bytes().first().copied().unwrap_or(0);
        (first as usize) % SHARDS
    }
}

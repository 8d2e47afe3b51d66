//! Content-keyed result cache.
//!
//! Keys are SHA-256 digests over the ROM image plus a phase tag and
//! that phase's parameters, so a hit can only come from byte-identical
//! input. The cache is write-through and purely optional: correctness
//! is identical with an always-miss cache. Partial (deadline-cut)
//! results are never inserted.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Phases whose results may be memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Disassembly,
    FunctionDiscovery,
    Validation,
    AudioState,
    VectorList,
}

impl Phase {
    fn tag(&self) -> &'static str {
        match self {
            Phase::Disassembly => "disassembly",
            Phase::FunctionDiscovery => "functions",
            Phase::Validation => "validation",
            Phase::AudioState => "audio_state",
            Phase::VectorList => "vectors",
        }
    }
}

/// SHA-256 digest of a ROM image, the identity half of every key.
pub fn rom_digest(image: &[u8]) -> String {
    hex::encode(Sha256::digest(image))
}

/// Full cache key for one phase run over one ROM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from the ROM digest, the phase, and a digest of the
    /// phase-specific parameters (address range, label map, flags).
    pub fn new(rom_digest: &str, phase: Phase, params: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(rom_digest.as_bytes());
        hasher.update(b"/");
        hasher.update(phase.tag().as_bytes());
        hasher.update(b"/");
        hasher.update(params.as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    /// The key digest as a hex string.
    pub fn digest(&self) -> &str {
        &self.0
    }
}

/// Shared, long-lived memoization store.
///
/// Values are stored as structured JSON so one cache can hold results
/// of different phases. Single-writer/multi-reader via `RwLock`.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, serde_json::Value>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResultCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a phase result.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entries = self.entries.read().expect("cache lock poisoned");
        match entries.get(key) {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(decoded) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(decoded)
                }
                Err(err) => {
                    tracing::warn!(%err, "cache entry failed to decode; treating as miss");
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a phase result, replacing any previous value.
    pub fn put<T: Serialize>(&self, key: CacheKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(encoded) => {
                self.entries
                    .write()
                    .expect("cache lock poisoned")
                    .insert(key, encoded);
            }
            Err(err) => tracing::warn!(%err, "value failed to serialize; not cached"),
        }
    }

    /// (hits, misses) counters.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_digest_is_stable() {
        let a = rom_digest(b"image");
        let b = rom_digest(b"image");
        assert_eq!(a, b);
        assert_ne!(a, rom_digest(b"other"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_separates_phases_and_params() {
        let digest = rom_digest(b"image");
        let a = CacheKey::new(&digest, Phase::Disassembly, "8000-ffff");
        let b = CacheKey::new(&digest, Phase::Validation, "8000-ffff");
        let c = CacheKey::new(&digest, Phase::Disassembly, "8000-9000");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_round_trip() {
        let cache = ResultCache::new();
        let key = CacheKey::new(&rom_digest(b"image"), Phase::VectorList, "");
        assert_eq!(cache.get::<Vec<u32>>(&key), None);
        cache.put(key.clone(), &vec![0x8000u32, 0x8100]);
        assert_eq!(cache.get::<Vec<u32>>(&key), Some(vec![0x8000, 0x8100]));
        let (hits, misses) = cache.stats();
        assert_eq!((hits, misses), (1, 1));
    }

    #[test]
    fn test_write_through_replaces() {
        let cache = ResultCache::new();
        let key = CacheKey::new(&rom_digest(b"image"), Phase::Validation, "");
        cache.put(key.clone(), &1u32);
        cache.put(key.clone(), &2u32);
        assert_eq!(cache.get::<u32>(&key), Some(2));
        assert_eq!(cache.len(), 1);
    }
}

//! Two-layer Groth16 verification cache (§4.6): an in-process LRU in front
//! of a persistent encrypted KV, keyed by the SHA-256 fingerprint of
//! `(proof, publicSignals)`.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sha2::{Digest, Sha256};
use zeroid_common::model::ProofCacheEntry;

use crate::config::CACHE_TTL_SECS;
use crate::stores::{EncryptedKv, StoreError};

/// `fingerprint(proof, publicSignals) = SHA-256(canonical_json({proof,
/// publicSignals}))` (§4.6). `proof_json` and `signals_json` are expected to
/// already be in their canonical serialized form; concatenated with a
/// separator byte so the two fields can never collide across a boundary.
pub fn fingerprint(proof_json: &str, signals_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(proof_json.as_bytes());
    hasher.update([0u8]);
    hasher.update(signals_json.as_bytes());
    hex::encode(hasher.finalize())
}

struct L1Entry {
    entry: ProofCacheEntry,
    inserted_at_secs: u64,
}

pub struct ProofCache {
    l1: Mutex<LruCache<String, L1Entry>>,
    l2: EncryptedKv,
    ttl_secs: u64,
}

impl ProofCache {
    pub fn new(capacity: usize, l2: EncryptedKv) -> Self {
        Self {
            l1: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1"),
            )),
            l2,
            ttl_secs: CACHE_TTL_SECS,
        }
    }

    fn is_fresh(&self, inserted_at_secs: u64) -> bool {
        crate::time::now_secs().saturating_sub(inserted_at_secs) < self.ttl_secs
    }

    /// L1 then L2, promoting an L2 hit into L1. Returns `None` on a total
    /// miss or an expired entry at either layer.
    pub fn get(&self, fp: &str) -> Result<Option<ProofCacheEntry>, StoreError> {
        {
            let mut l1 = self.l1.lock().expect("l1 cache lock poisoned");
            if let Some(hit) = l1.get(fp) {
                if self.is_fresh(hit.inserted_at_secs) {
                    return Ok(Some(hit.entry.clone()));
                }
                l1.pop(fp);
            }
        }

        if let Some(entry) = self.l2.get::<ProofCacheEntry>(fp.as_bytes())? {
            let age_secs =
                crate::time::now_secs().saturating_sub((entry.verified_at_ms / 1000) as u64);
            if age_secs >= self.ttl_secs {
                return Ok(None);
            }
            let mut l1 = self.l1.lock().expect("l1 cache lock poisoned");
            l1.put(
                fp.to_string(),
                L1Entry {
                    entry: entry.clone(),
                    inserted_at_secs: crate::time::now_secs(),
                },
            );
            return Ok(Some(entry));
        }

        Ok(None)
    }

    pub fn set(&self, fp: &str, entry: ProofCacheEntry) -> Result<(), StoreError> {
        self.l2.put(fp.as_bytes(), &entry)?;
        let mut l1 = self.l1.lock().expect("l1 cache lock poisoned");
        l1.put(
            fp.to_string(),
            L1Entry {
                entry,
                inserted_at_secs: crate::time::now_secs(),
            },
        );
        Ok(())
    }

    pub fn l1_len(&self) -> usize {
        self.l1.lock().expect("l1 cache lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroid_common::hkdf::derive_store_key;

    fn test_cache(capacity: usize) -> ProofCache {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let key = derive_store_key(b"master", "proof-cache");
        ProofCache::new(capacity, EncryptedKv::open(&db, "cache", key).unwrap())
    }

    fn sample_entry(fp: &str) -> ProofCacheEntry {
        ProofCacheEntry {
            proof_fingerprint: fp.to_string(),
            valid: true,
            nullifier: "N1".to_string(),
            verified_at_ms: crate::time::now_ms(),
        }
    }

    #[test]
    fn set_then_get_hits_l1() {
        let cache = test_cache(10);
        cache.set("fp1", sample_entry("fp1")).unwrap();
        let got = cache.get("fp1").unwrap().unwrap();
        assert!(got.valid);
        assert_eq!(got.nullifier, "N1");
    }

    #[test]
    fn miss_returns_none() {
        let cache = test_cache(10);
        assert!(cache.get("missing").unwrap().is_none());
    }

    #[test]
    fn eviction_drops_the_least_recently_used() {
        let cache = test_cache(2);
        cache.set("a", sample_entry("a")).unwrap();
        cache.set("b", sample_entry("b")).unwrap();
        // touch "a" so "b" becomes least-recently-used
        cache.get("a").unwrap();
        cache.set("c", sample_entry("c")).unwrap();

        assert!(cache.l1_len() <= 2);
        // "a" was refreshed, "c" just inserted - both should still be in L1.
        // ("b" was the LRU victim among the in-process entries.)
        let l1 = cache.l1.lock().unwrap();
        assert!(l1.peek("a").is_some() || l1.peek("c").is_some());
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let a = fingerprint("{\"pi_a\":1}", "[\"1\",\"2\"]");
        let b = fingerprint("{\"pi_a\":1}", "[\"1\",\"2\"]");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_signals() {
        let a = fingerprint("{\"pi_a\":1}", "[\"1\",\"2\"]");
        let b = fingerprint("{\"pi_a\":1}", "[\"1\",\"3\"]");
        assert_ne!(a, b);
    }
}

//! The nullifier registry (§4.6, §5): atomic test-and-set enforcing that a
//! nullifier is consumed at most once across the lifetime of the service.

use zeroid_common::model::NullifierEntry;

use crate::stores::{EncryptedKv, StoreError};

pub struct NullifierRegistry {
    kv: EncryptedKv,
}

impl NullifierRegistry {
    pub fn new(kv: EncryptedKv) -> Self {
        Self { kv }
    }

    /// Register `nullifier` for `app_id`, returning `true` if this call won
    /// the race (the nullifier was previously absent) and `false` if it was
    /// already consumed. Backed by `EncryptedKv::insert_if_absent`'s
    /// tree-level compare-and-swap (§5 ordering guarantee).
    pub fn register(
        &self,
        nullifier: &str,
        app_id: &str,
        credential_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let entry = NullifierEntry {
            nullifier: nullifier.to_string(),
            credential_id: credential_id.map(str::to_string),
            app_id: app_id.to_string(),
            used_at_ms: crate::time::now_ms(),
        };
        self.kv.insert_if_absent(nullifier.as_bytes(), &entry)
    }

    pub fn is_consumed(&self, nullifier: &str) -> Result<bool, StoreError> {
        self.kv.contains_key(nullifier.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroid_common::hkdf::derive_store_key;

    fn test_registry() -> NullifierRegistry {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let key = derive_store_key(b"master", "nullifiers");
        NullifierRegistry::new(EncryptedKv::open(&db, "nullifiers", key).unwrap())
    }

    #[test]
    fn first_registration_wins_second_is_rejected() {
        let registry = test_registry();
        assert!(registry.register("N1", "app-1", Some("cred-1")).unwrap());
        assert!(!registry.register("N1", "app-1", Some("cred-2")).unwrap());
        assert!(registry.is_consumed("N1").unwrap());
    }

    #[test]
    fn distinct_nullifiers_are_independent() {
        let registry = test_registry();
        assert!(registry.register("N1", "app-1", None).unwrap());
        assert!(registry.register("N2", "app-1", None).unwrap());
    }

    #[test]
    fn concurrent_registration_admits_exactly_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(test_registry());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                registry.register("shared", "app-1", None).unwrap()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}

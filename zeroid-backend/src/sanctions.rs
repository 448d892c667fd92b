//! The sanctions-screening gate in front of credential issuance (§4.3,
//! §4.5 step 2), wrapping [`SanctionsTree`] in the `RwLock<Arc<_>>`
//! rebuildable-pointer pattern §5/§9 call for: readers never observe a
//! partially-built tree, only the old or the new one.

use std::sync::{Arc, RwLock};

use zeroid_common::field::bytes_to_fr;
use zeroid_common::merkle::{MerkleProof, SanctionsTree};
use ark_bn254::Fr;
use sha2::{Digest, Sha256};

use crate::config::SANCTIONS_TREE_DEPTH;

/// Illustrative, not a compliance source of truth (§4.3 expansion note):
/// ISO-3166-1 numeric codes commonly subject to comprehensive sanctions.
/// Iran (364), North Korea (408), Syria (760), Cuba (192).
pub const DEFAULT_SANCTIONED_COUNTRIES: &[u16] = &[364, 408, 760, 192];

fn country_to_fr(code: u16) -> Fr {
    bytes_to_fr(&{
        let mut buf = [0u8; 32];
        buf[30..].copy_from_slice(&code.to_be_bytes());
        buf
    })
}

pub struct SanctionsRegistry {
    tree: RwLock<Arc<SanctionsTree>>,
}

impl SanctionsRegistry {
    pub fn build(codes: &[u16]) -> Self {
        let leaves: Vec<Fr> = codes.iter().map(|c| country_to_fr(*c)).collect();
        let tree = SanctionsTree::build(SANCTIONS_TREE_DEPTH, &leaves);
        Self {
            tree: RwLock::new(Arc::new(tree)),
        }
    }

    pub fn from_default_seed() -> Self {
        Self::build(DEFAULT_SANCTIONED_COUNTRIES)
    }

    /// Load an override list from `path` (§6 `ZEROID_SANCTIONS_LIST`): a
    /// JSON array of ISO-3166-1 numeric country codes.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let codes: Vec<u16> = serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::build(&codes))
    }

    /// Atomically replace the tree pointer; readers in flight keep using the
    /// snapshot they already acquired (§5).
    pub fn refresh(&self, codes: &[u16]) {
        let leaves: Vec<Fr> = codes.iter().map(|c| country_to_fr(*c)).collect();
        let tree = SanctionsTree::build(SANCTIONS_TREE_DEPTH, &leaves);
        *self.tree.write().expect("sanctions tree lock poisoned") = Arc::new(tree);
    }

    pub fn is_sanctioned(&self, country_code: u16) -> bool {
        let snapshot = self.snapshot();
        snapshot.contains(country_to_fr(country_code))
    }

    pub fn snapshot(&self) -> Arc<SanctionsTree> {
        self.tree.read().expect("sanctions tree lock poisoned").clone()
    }

    pub fn root_hex(&self) -> String {
        let snapshot = self.snapshot();
        let root = snapshot.root();
        hex::encode(zeroid_common::field::fr_to_bytes(&root))
    }

    pub fn membership_proof(&self, country_code: u16) -> Option<(MerkleProof, Arc<SanctionsTree>)> {
        let snapshot = self.snapshot();
        let idx = snapshot.index_of(country_to_fr(country_code))?;
        let proof = snapshot.generate_proof(idx)?;
        Some((proof, snapshot))
    }
}

/// A stable identity for a sanctions list snapshot, for cache invalidation
/// and audit metadata (not part of the tree itself).
pub fn list_digest(codes: &[u16]) -> String {
    let mut hasher = Sha256::new();
    for code in codes {
        hasher.update(code.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_seed_list_flags_north_korea() {
        let registry = SanctionsRegistry::from_default_seed();
        assert!(registry.is_sanctioned(408));
        assert!(!registry.is_sanctioned(840)); // USA
    }

    #[test]
    fn refresh_replaces_the_snapshot_atomically() {
        let registry = SanctionsRegistry::build(&[840]);
        assert!(registry.is_sanctioned(840));
        assert!(!registry.is_sanctioned(408));
        registry.refresh(&[408]);
        assert!(registry.is_sanctioned(408));
        assert!(!registry.is_sanctioned(840));
    }

    #[test]
    fn membership_proof_verifies_against_the_current_root() {
        let registry = SanctionsRegistry::from_default_seed();
        let (proof, snapshot) = registry.membership_proof(408).unwrap();
        assert!(SanctionsTree::verify_proof(snapshot.root(), &proof));
    }
}

//! Fixed-depth Poseidon Merkle tree used as the sanctions list (§4.3).
//!
//! Stored as a flat `Vec`-backed arena indexed by `(level, offset)` rather
//! than pointer nodes, per §9's "cyclic graphs are absent" hint: level 0 is
//! the leaves, level `depth` is the single root.

use crate::poseidon::poseidon2;
use ark_bn254::Fr;

pub const DEFAULT_DEPTH: usize = 10;

/// One sibling step of a Merkle proof: the sibling hash and which side the
/// *current* node sits on relative to it (`false` = current is left,
/// `true` = current is right), matching §4.3's bitstring convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Fr,
    pub current_is_right: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Fr,
    pub steps: Vec<ProofStep>,
}

/// A fixed-depth, fully-populated Poseidon Merkle tree. Leaves beyond the
/// supplied list are zero. Rebuilt wholesale on `refresh`; no incremental
/// mutation (§4.3).
#[derive(Clone, Debug)]
pub struct SanctionsTree {
    depth: usize,
    /// `levels[0]` is the leaf layer (2^depth entries); `levels[depth]` is a
    /// single-element slice holding the root.
    levels: Vec<Vec<Fr>>,
    /// Leaf value -> index, for `index_of`.
    index: std::collections::HashMap<[u8; 32], usize>,
}

impl SanctionsTree {
    /// Build a tree of `depth` from `leaves` (country codes as field
    /// elements), left-padding the remainder with the zero leaf.
    pub fn build(depth: usize, leaves: &[Fr]) -> Self {
        let capacity = 1usize << depth;
        assert!(
            leaves.len() <= capacity,
            "too many leaves ({}) for depth {depth} (capacity {capacity})",
            leaves.len()
        );

        let mut level0 = vec![Fr::from(0u64); capacity];
        let mut index = std::collections::HashMap::with_capacity(leaves.len());
        for (i, leaf) in leaves.iter().enumerate() {
            level0[i] = *leaf;
            index.insert(crate::field::fr_to_bytes(leaf), i);
        }

        let mut levels = vec![level0];
        for _ in 0..depth {
            let prev = levels.last().expect("at least one level present");
            let mut next = Vec::with_capacity(prev.len() / 2);
            for pair in prev.chunks(2) {
                next.push(poseidon2(pair[0], pair[1]));
            }
            levels.push(next);
        }

        Self {
            depth,
            levels,
            index,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> Fr {
        self.levels[self.depth][0]
    }

    pub fn index_of(&self, leaf: Fr) -> Option<usize> {
        self.index.get(&crate::field::fr_to_bytes(&leaf)).copied()
    }

    pub fn contains(&self, leaf: Fr) -> bool {
        self.index_of(leaf).is_some()
    }

    pub fn generate_proof(&self, mut idx: usize) -> Option<MerkleProof> {
        let capacity = 1usize << self.depth;
        if idx >= capacity {
            return None;
        }
        let leaf = self.levels[0][idx];
        let mut steps = Vec::with_capacity(self.depth);
        for level in 0..self.depth {
            let sibling_idx = idx ^ 1;
            let sibling = self.levels[level][sibling_idx];
            let current_is_right = idx % 2 == 1;
            steps.push(ProofStep {
                sibling,
                current_is_right,
            });
            idx /= 2;
        }
        Some(MerkleProof { leaf, steps })
    }

    /// Recompute the root implied by `proof` and compare against `root`.
    /// A proof generated for index `i` but presented with a different leaf
    /// value fails this check, since the recomputed path diverges from the
    /// first hash onward.
    pub fn verify_proof(root: Fr, proof: &MerkleProof) -> bool {
        let mut current = proof.leaf;
        for step in &proof.steps {
            current = if step.current_is_right {
                poseidon2(step.sibling, current)
            } else {
                poseidon2(current, step.sibling)
            };
        }
        current == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(values: &[u64]) -> SanctionsTree {
        let leaves: Vec<Fr> = values.iter().map(|v| Fr::from(*v)).collect();
        SanctionsTree::build(4, &leaves)
    }

    #[test]
    fn every_populated_leaf_proves_against_the_root() {
        let tree = tree_of(&[408, 364, 760, 192]);
        let root = tree.root();
        for i in 0..4 {
            let proof = tree.generate_proof(i).unwrap();
            assert!(SanctionsTree::verify_proof(root, &proof));
        }
    }

    #[test]
    fn substituted_leaf_fails_verification() {
        let tree = tree_of(&[408, 364, 760, 192]);
        let root = tree.root();
        let mut proof = tree.generate_proof(0).unwrap();
        proof.leaf = Fr::from(1u64);
        assert!(!SanctionsTree::verify_proof(root, &proof));
    }

    #[test]
    fn index_of_finds_populated_leaves_and_rejects_absent_ones() {
        let tree = tree_of(&[408, 364]);
        assert_eq!(tree.index_of(Fr::from(408u64)), Some(0));
        assert_eq!(tree.index_of(Fr::from(364u64)), Some(1));
        assert_eq!(tree.index_of(Fr::from(1u64)), None);
    }

    #[test]
    fn empty_slots_are_zero_and_still_provable() {
        let tree = tree_of(&[408]);
        // `index_of`/`contains` only track the leaves actually supplied to
        // `build`, not the zero padding, so an empty slot is unreachable by
        // value lookup even though it still hashes and proves like any other
        // leaf.
        assert_eq!(tree.index_of(Fr::from(0u64)), None);
        let proof = tree.generate_proof(3).unwrap();
        assert_eq!(proof.leaf, Fr::from(0u64));
        assert!(SanctionsTree::verify_proof(tree.root(), &proof));
    }

    #[test]
    fn rebuilt_tree_with_same_leaves_has_same_root() {
        let a = tree_of(&[1, 2, 3]);
        let b = tree_of(&[1, 2, 3]);
        assert_eq!(a.root(), b.root());
    }
}

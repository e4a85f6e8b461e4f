// Append-only Poseidon Merkle accumulator with a bounded root history
use std::collections::{HashMap, VecDeque};

use ark_bn254::Fr;
use tracing::debug;

use crate::primitives::{hash_to_field, Commitment, LeafIndex, MerkleRoot, PoolError, Result};
use crate::zkp::poseidon;

/// Root history retained when no size is configured
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 100;

/// Value of an empty leaf
pub fn zero_leaf() -> Fr {
    hash_to_field(b"tornado")
}

/// Accumulator state captured before a batch, restorable with `rollback`
#[derive(Debug, Clone)]
pub struct TreeCheckpoint {
    leaf_count: usize,
    root_history: VecDeque<MerkleRoot>,
}

/// Fixed-height binary Merkle tree.
///
/// `layers[0]` holds the leaves; `layers[l]` holds the populated nodes at
/// level `l`. Missing right children are the empty-subtree value `zeros[l]`.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: usize,
    layers: Vec<Vec<Fr>>,
    zeros: Vec<Fr>,
    root_history: VecDeque<MerkleRoot>,
    history_size: usize,
    indices: HashMap<Commitment, LeafIndex>,
}

impl MerkleTree {
    pub fn new(levels: usize) -> Self {
        Self::with_history(levels, DEFAULT_ROOT_HISTORY_SIZE)
    }

    pub fn with_history(levels: usize, history_size: usize) -> Self {
        let mut zeros = Vec::with_capacity(levels + 1);
        zeros.push(zero_leaf());
        for level in 0..levels {
            zeros.push(poseidon::hash2(zeros[level], zeros[level]));
        }

        let mut tree = Self {
            levels,
            layers: vec![Vec::new(); levels + 1],
            zeros,
            root_history: VecDeque::with_capacity(history_size.max(1)),
            history_size: history_size.max(1),
            indices: HashMap::new(),
        };
        tree.record_root();
        tree
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Maximum number of leaves (2^levels)
    pub fn capacity(&self) -> u64 {
        1u64 << self.levels
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn remaining(&self) -> u64 {
        self.capacity() - self.len() as u64
    }

    pub fn root(&self) -> MerkleRoot {
        MerkleRoot(
            self.layers[self.levels]
                .first()
                .copied()
                .unwrap_or(self.zeros[self.levels]),
        )
    }

    /// Whether `root` is among the most recent `history_size` roots
    pub fn is_known_root(&self, root: &MerkleRoot) -> bool {
        self.root_history.contains(root)
    }

    pub fn root_history(&self) -> impl Iterator<Item = &MerkleRoot> {
        self.root_history.iter()
    }

    pub fn leaves(&self) -> &[Fr] {
        &self.layers[0]
    }

    pub fn index_of(&self, commitment: &Commitment) -> Option<LeafIndex> {
        self.indices.get(commitment).copied()
    }

    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.indices.contains_key(commitment)
    }

    /// Append one commitment and record the new root
    pub fn insert(&mut self, commitment: Commitment) -> Result<LeafIndex> {
        self.insert_batch(&[commitment])
    }

    /// Append commitments in order and record a single new root.
    /// Capacity is checked for the whole batch before anything is written.
    pub fn insert_batch(&mut self, commitments: &[Commitment]) -> Result<LeafIndex> {
        if (commitments.len() as u64) > self.remaining() {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        let first = self.len() as LeafIndex;
        for commitment in commitments {
            let index = self.len();
            self.layers[0].push(commitment.0);
            self.indices.entry(*commitment).or_insert(index as LeafIndex);
            self.update_path(index);
        }
        self.record_root();

        debug!("Inserted {} leaves at {}, root {}", commitments.len(), first, self.root());
        Ok(first)
    }

    /// Sibling hashes from the leaf at `index` up to the root
    pub fn path(&self, index: LeafIndex) -> Option<Vec<Fr>> {
        let index = usize::try_from(index).ok()?;
        if index >= self.len() {
            return None;
        }

        let mut position = index;
        let path = (0..self.levels)
            .map(|level| {
                let sibling = self.node(level, position ^ 1);
                position >>= 1;
                sibling
            })
            .collect();
        Some(path)
    }

    pub fn checkpoint(&self) -> TreeCheckpoint {
        TreeCheckpoint {
            leaf_count: self.len(),
            root_history: self.root_history.clone(),
        }
    }

    /// Undo every insertion made since `checkpoint` was taken
    pub fn rollback(&mut self, checkpoint: TreeCheckpoint) {
        let leaf_count = checkpoint.leaf_count;
        if leaf_count > self.len() {
            return;
        }

        for removed in &self.layers[0][leaf_count..] {
            let commitment = Commitment(*removed);
            if self.indices.get(&commitment).map_or(false, |&i| i as usize >= leaf_count) {
                self.indices.remove(&commitment);
            }
        }

        for level in 0..=self.levels {
            let width = (leaf_count + (1 << level) - 1) >> level;
            self.layers[level].truncate(width);
        }
        // Ancestors of the last surviving leaf may have absorbed removed siblings
        if leaf_count > 0 {
            self.update_path(leaf_count - 1);
        }

        self.root_history = checkpoint.root_history;
    }

    fn node(&self, level: usize, position: usize) -> Fr {
        self.layers[level]
            .get(position)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn update_path(&mut self, leaf_index: usize) {
        let mut position = leaf_index;
        for level in 0..self.levels {
            let left_position = position & !1;
            let left = self.node(level, left_position);
            let right = self.node(level, left_position + 1);
            let parent = poseidon::hash2(left, right);

            position >>= 1;
            let parents = &mut self.layers[level + 1];
            if position < parents.len() {
                parents[position] = parent;
            } else {
                parents.push(parent);
            }
        }
    }

    fn record_root(&mut self) {
        if self.root_history.len() == self.history_size {
            self.root_history.pop_front();
        }
        self.root_history.push_back(self.root());
    }
}

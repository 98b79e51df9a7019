//! A set whose concurrent operations are reduced to a single survivor.
//!
//! Every vertex of a concurrent wave is dropped except one, picked by a
//! BLAKE3 digest of the wave's sorted, concatenated hashes. The choice looks
//! random but every peer computes the same one.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use drp_types::{
    ConflictResolver, PeerId, ReplicatedType, ResolveConflictsType, SemanticsType, Vertex,
    VertexHash,
};

use crate::add_wins_set::{Membership, SetOp, SetValue};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoRandomWinsSet<V: Ord> {
    members: Membership<V>,
}

impl<V: Ord> Default for PseudoRandomWinsSet<V> {
    fn default() -> Self {
        Self {
            members: Membership::default(),
        }
    }
}

impl<V: SetValue> PseudoRandomWinsSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.members.contains(value)
    }

    pub fn values(&self) -> Vec<&V> {
        self.members.values().collect()
    }
}

/// Index of the surviving vertex among `n` sorted hashes.
fn survivor(sorted: &[VertexHash]) -> usize {
    let mut hasher = blake3::Hasher::new();
    for hash in sorted {
        hasher.update(hash.as_bytes());
    }
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(word) % sorted.len() as u64) as usize
}

impl<V: SetValue> ConflictResolver for PseudoRandomWinsSet<V> {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Multiple
    }

    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
        if vertices.len() < 2 {
            return ResolveConflictsType::nop();
        }
        let mut hashes: Vec<VertexHash> = vertices.iter().map(|v| v.hash).collect();
        hashes.sort();
        let keep = survivor(&hashes);
        hashes.remove(keep);
        ResolveConflictsType::drop(hashes)
    }
}

impl<V: SetValue> ReplicatedType for PseudoRandomWinsSet<V> {
    type Op = SetOp<V>;
    type Error = Infallible;

    fn apply(&mut self, _caller: &PeerId, op: SetOp<V>) -> Result<(), Infallible> {
        self.members.apply(op);
        Ok(())
    }
}

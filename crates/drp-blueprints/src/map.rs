//! A key/value map with configurable set/delete conflict resolution.
//!
//! Concurrent operations on different keys never conflict. Two concurrent
//! sets of one key keep the one whose encoded value has the larger BLAKE3
//! digest, and a concurrent set and delete of one key follow the configured
//! [`MapConflictResolution`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use drp_types::{
    ActionType, ConflictResolver, PeerId, ReplicatedType, ResolveConflictsType, SemanticsType,
    Vertex,
};

use crate::add_wins_set::SetValue;

/// Bounds a map value must satisfy to travel inside operations.
pub trait MapValue:
    PartialEq + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<V> MapValue for V where
    V: PartialEq + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Which side survives a concurrent set and delete of the same key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapConflictResolution {
    #[default]
    SetWins,
    DeleteWins,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", content = "value")]
pub enum MapOp<K, V> {
    #[serde(rename = "set")]
    Set(K, V),
    #[serde(rename = "delete")]
    Delete(K),
}

impl<K, V> MapOp<K, V> {
    pub fn key(&self) -> &K {
        match self {
            Self::Set(k, _) | Self::Delete(k) => k,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolvingMap<K: Ord, V> {
    conflict_resolution: MapConflictResolution,
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for ConflictResolvingMap<K, V> {
    fn default() -> Self {
        Self {
            conflict_resolution: MapConflictResolution::default(),
            entries: BTreeMap::new(),
        }
    }
}

impl<K: SetValue, V: MapValue> ConflictResolvingMap<K, V> {
    pub fn new(conflict_resolution: MapConflictResolution) -> Self {
        Self {
            conflict_resolution,
            entries: BTreeMap::new(),
        }
    }

    pub fn conflict_resolution(&self) -> MapConflictResolution {
        self.conflict_resolution
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Entries in ascending key order.
    pub fn entries(&self) -> Vec<(&K, &V)> {
        self.entries.iter().collect()
    }

    pub fn keys(&self) -> Vec<&K> {
        self.entries.keys().collect()
    }

    pub fn values(&self) -> Vec<&V> {
        self.entries.values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Digest of the encoded operation payload.
fn payload_digest(vertex: &Vertex) -> Option<blake3::Hash> {
    vertex.operation.as_ref().map(|op| blake3::hash(&op.value))
}

impl<K: SetValue, V: MapValue> ConflictResolver for ConflictResolvingMap<K, V> {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Pair
    }

    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
        let [left, right] = vertices else {
            return ResolveConflictsType::nop();
        };
        let (Some(l), Some(r)) = (
            left.decode_op::<MapOp<K, V>>(),
            right.decode_op::<MapOp<K, V>>(),
        ) else {
            return ResolveConflictsType::nop();
        };
        if l.key() != r.key() {
            return ResolveConflictsType::nop();
        }
        let action = match (&l, &r) {
            (MapOp::Delete(_), MapOp::Delete(_)) => ActionType::Nop,
            (MapOp::Set(_, a), MapOp::Set(_, b)) => {
                if a == b {
                    ActionType::Nop
                } else {
                    // Same key, so the payloads differ only in the value.
                    match payload_digest(left)
                        .map(|d| *d.as_bytes())
                        .cmp(&payload_digest(right).map(|d| *d.as_bytes()))
                    {
                        std::cmp::Ordering::Greater => ActionType::DropRight,
                        std::cmp::Ordering::Less => ActionType::DropLeft,
                        std::cmp::Ordering::Equal => ActionType::Nop,
                    }
                }
            }
            (MapOp::Set(..), MapOp::Delete(_)) => match self.conflict_resolution {
                MapConflictResolution::SetWins => ActionType::DropRight,
                MapConflictResolution::DeleteWins => ActionType::DropLeft,
            },
            (MapOp::Delete(_), MapOp::Set(..)) => match self.conflict_resolution {
                MapConflictResolution::SetWins => ActionType::DropLeft,
                MapConflictResolution::DeleteWins => ActionType::DropRight,
            },
        };
        ResolveConflictsType::new(action)
    }
}

impl<K: SetValue, V: MapValue> ReplicatedType for ConflictResolvingMap<K, V> {
    type Op = MapOp<K, V>;
    type Error = Infallible;

    fn apply(&mut self, _caller: &PeerId, op: MapOp<K, V>) -> Result<(), Infallible> {
        match op {
            MapOp::Set(key, value) => {
                self.entries.insert(key, value);
            }
            MapOp::Delete(key) => {
                self.entries.remove(&key);
            }
        }
        Ok(())
    }
}

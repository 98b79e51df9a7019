//! A plain grow/shrink set with no conflict resolution.
//!
//! Concurrent operations are never reordered or dropped, so the outcome of a
//! concurrent add and delete of one value depends on the linearization order.

use std::collections::BTreeSet;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use drp_types::{ConflictResolver, PeerId, ReplicatedType, ResolveConflictsType, SemanticsType, Vertex};

use crate::add_wins_set::SetValue;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", content = "value")]
pub enum PlainSetOp<V> {
    #[serde(rename = "add")]
    Add(V),
    #[serde(rename = "delete")]
    Delete(V),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainSet<V: Ord> {
    values: BTreeSet<V>,
}

impl<V: Ord> Default for PlainSet<V> {
    fn default() -> Self {
        Self {
            values: BTreeSet::new(),
        }
    }
}

impl<V: SetValue> PlainSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.values.contains(value)
    }

    /// Values in ascending order.
    pub fn values(&self) -> Vec<&V> {
        self.values.iter().collect()
    }
}

impl<V: SetValue> ConflictResolver for PlainSet<V> {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Pair
    }

    fn resolve_conflicts(&self, _vertices: &[&Vertex]) -> ResolveConflictsType {
        ResolveConflictsType::nop()
    }
}

impl<V: SetValue> ReplicatedType for PlainSet<V> {
    type Op = PlainSetOp<V>;
    type Error = Infallible;

    fn apply(&mut self, _caller: &PeerId, op: PlainSetOp<V>) -> Result<(), Infallible> {
        match op {
            PlainSetOp::Add(v) => {
                self.values.insert(v);
            }
            PlainSetOp::Delete(v) => {
                self.values.remove(&v);
            }
        }
        Ok(())
    }
}

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use drp_types::{
    ActionType, ConflictResolver, PeerId, ReplicatedType, ResolveConflictsType, SemanticsType,
    Vertex,
};

/// Bounds a set element must satisfy to travel inside operations.
pub trait SetValue:
    Ord + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<V> SetValue for V where
    V: Ord + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Set operations, shared by both set blueprints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", content = "value")]
pub enum SetOp<V> {
    #[serde(rename = "add")]
    Add(V),
    #[serde(rename = "remove")]
    Remove(V),
}

impl<V> SetOp<V> {
    pub fn value(&self) -> &V {
        match self {
            Self::Add(v) | Self::Remove(v) => v,
        }
    }
}

/// Per-value membership flag and add count. A removed value stays with
/// `present == false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Tag {
    present: bool,
    adds: u64,
}

/// Membership keyed by value. Every add bumps the value's count, so adding
/// a present value is still a state change and gets recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Membership<V: Ord> {
    state: BTreeMap<V, Tag>,
}

impl<V: Ord> Default for Membership<V> {
    fn default() -> Self {
        Self {
            state: BTreeMap::new(),
        }
    }
}

impl<V: SetValue> Membership<V> {
    pub(crate) fn apply(&mut self, op: SetOp<V>) {
        match op {
            SetOp::Add(v) => {
                let tag = self.state.entry(v).or_default();
                tag.present = true;
                tag.adds += 1;
            }
            SetOp::Remove(v) => {
                if let Some(tag) = self.state.get_mut(&v) {
                    tag.present = false;
                }
            }
        }
    }

    pub(crate) fn contains(&self, value: &V) -> bool {
        self.state.get(value).is_some_and(|tag| tag.present)
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.state.iter().filter(|(_, tag)| tag.present).map(|(v, _)| v)
    }
}

/// A set where a concurrent add and remove of the same value keeps the add.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddWinsSet<V: Ord> {
    members: Membership<V>,
}

impl<V: Ord> Default for AddWinsSet<V> {
    fn default() -> Self {
        Self {
            members: Membership::default(),
        }
    }
}

impl<V: SetValue> AddWinsSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.members.contains(value)
    }

    /// Present values in ascending order.
    pub fn values(&self) -> Vec<&V> {
        self.members.values().collect()
    }
}

impl<V: SetValue> ConflictResolver for AddWinsSet<V> {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Pair
    }

    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
        let [left, right] = vertices else {
            return ResolveConflictsType::nop();
        };
        let (Some(l), Some(r)) = (
            left.decode_op::<SetOp<V>>(),
            right.decode_op::<SetOp<V>>(),
        ) else {
            return ResolveConflictsType::nop();
        };
        match (l, r) {
            (SetOp::Add(a), SetOp::Remove(b)) if a == b => {
                ResolveConflictsType::new(ActionType::DropRight)
            }
            (SetOp::Remove(a), SetOp::Add(b)) if a == b => {
                ResolveConflictsType::new(ActionType::DropLeft)
            }
            _ => ResolveConflictsType::nop(),
        }
    }
}

impl<V: SetValue> ReplicatedType for AddWinsSet<V> {
    type Op = SetOp<V>;
    type Error = Infallible;

    fn apply(&mut self, _caller: &PeerId, op: SetOp<V>) -> Result<(), Infallible> {
        self.members.apply(op);
        Ok(())
    }
}

//! The contract a pluggable replicated data type must satisfy.
//!
//! A replicated type declares how concurrent operations are ordered
//! ([`ConflictResolver`]) and exposes a closed set of mutating commands
//! ([`ReplicatedType::Op`]). The object layer turns each accepted command into
//! a hashgraph vertex; there is no runtime reflection involved.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::hash::VertexHash;
use crate::identity::PeerId;
use crate::vertex::Vertex;

/// How a replicated type wants concurrent operations presented to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticsType {
    /// Concurrent vertices are resolved two at a time.
    Pair,
    /// A whole concurrent wave is resolved in one call.
    Multiple,
}

/// Outcome of resolving a set of concurrent vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Drop the earlier vertex of the pair.
    DropLeft,
    /// Drop the later vertex of the pair.
    DropRight,
    /// Keep both in their current order.
    Nop,
    /// Keep both, later vertex first.
    Swap,
    /// Drop every vertex listed in [`ResolveConflictsType::vertices`].
    Drop,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveConflictsType {
    pub action: ActionType,
    /// Only meaningful for [`ActionType::Drop`].
    pub vertices: Vec<VertexHash>,
}

impl ResolveConflictsType {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            vertices: Vec::new(),
        }
    }

    pub fn nop() -> Self {
        Self::new(ActionType::Nop)
    }

    pub fn drop(vertices: Vec<VertexHash>) -> Self {
        Self {
            action: ActionType::Drop,
            vertices,
        }
    }
}

/// Orders concurrent operations of one track.
///
/// Implementations must be pure functions of the vertices they are given: every
/// peer calls them with the same input and must get the same answer.
pub trait ConflictResolver: Send + Sync {
    fn semantics(&self) -> SemanticsType;

    /// Resolve two (pair semantics) or many (multiple semantics) concurrent
    /// vertices, given in deterministic order.
    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType;
}

/// A replicated data type: state plus a closed set of mutating commands.
///
/// `apply` must leave `self` untouched when it returns an error. Projected
/// state is compared with `PartialEq` to discard calls that change nothing.
pub trait ReplicatedType: ConflictResolver + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Mutating commands, serialized with `tag = "opType", content = "value"`.
    type Op: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync;

    type Error: std::error::Error + Send + Sync + 'static;

    fn apply(&mut self, caller: &PeerId, op: Self::Op) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(ResolveConflictsType::nop().action, ActionType::Nop);
        let d = ResolveConflictsType::drop(vec![VertexHash::ROOT]);
        assert_eq!(d.action, ActionType::Drop);
        assert_eq!(d.vertices.len(), 1);
        assert!(ResolveConflictsType::new(ActionType::Swap).vertices.is_empty());
    }
}

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use drp_types::{
    ActionType, ConflictResolver, PeerId, ReplicatedType, ResolveConflictsType, SemanticsType,
    Vertex,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", content = "value")]
pub enum AddMulOp {
    #[serde(rename = "add")]
    Add(i64),
    #[serde(rename = "mul")]
    Mul(i64),
}

/// An integer register with `add` and `mul`.
///
/// When an `add` and a `mul` are concurrent, the `add` is applied first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMul {
    value: i64,
}

impl AddMul {
    pub fn new(initial: i64) -> Self {
        Self { value: initial }
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl ConflictResolver for AddMul {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Pair
    }

    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
        let [left, right] = vertices else {
            return ResolveConflictsType::nop();
        };
        if left.hash == right.hash {
            return ResolveConflictsType::nop();
        }
        match (left.decode_op::<AddMulOp>(), right.decode_op::<AddMulOp>()) {
            (Some(AddMulOp::Mul(_)), Some(AddMulOp::Add(_))) => {
                ResolveConflictsType::new(ActionType::Swap)
            }
            _ => ResolveConflictsType::nop(),
        }
    }
}

impl ReplicatedType for AddMul {
    type Op = AddMulOp;
    type Error = Infallible;

    fn apply(&mut self, _caller: &PeerId, op: AddMulOp) -> Result<(), Infallible> {
        self.value = match op {
            AddMulOp::Add(n) => self.value.wrapping_add(n),
            AddMulOp::Mul(n) => self.value.wrapping_mul(n),
        };
        Ok(())
    }
}

//! Example replicated data types for DRP objects.
//!
//! Each type here is a plain value plus a closed operation enum and a
//! conflict-resolution policy. They are small on purpose and serve as
//! fixtures for tests, benchmarks and the `drp` simulator.
//!
//! - [`AddWinsSet`]: concurrent add and remove of one value: add wins
//! - [`PseudoRandomWinsSet`]: a concurrent wave keeps one arbitrary survivor
//! - [`AddMul`]: integer register where concurrent add runs before mul
//! - [`ConflictResolvingMap`]: key/value map; concurrent set and delete of
//!   one key follow a configurable policy
//! - [`PlainSet`]: set without any conflict resolution

pub mod add_mul;
pub mod add_wins_set;
pub mod map;
pub mod pseudo_random_wins_set;
pub mod set;

pub use add_mul::{AddMul, AddMulOp};
pub use add_wins_set::{AddWinsSet, SetOp, SetValue};
pub use map::{ConflictResolvingMap, MapConflictResolution, MapOp, MapValue};
pub use pseudo_random_wins_set::PseudoRandomWinsSet;
pub use set::{PlainSet, PlainSetOp};

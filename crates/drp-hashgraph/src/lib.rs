//! Operation hashgraph for DRP replicated objects.
//!
//! The [`HashGraph`] is an append-only DAG of signed operation vertices. It
//! tracks the causal frontier, maintains a reachability index built from
//! [`BitSet`]s for constant-time causality tests, computes lowest common
//! ancestors over the DAG, and linearizes concurrent operations through the
//! conflict resolvers of the access-control and application tracks.

pub mod bitset;
pub mod error;
pub mod graph;
pub mod lca;
pub mod linearize;
pub mod order;

pub use bitset::BitSet;
pub use error::{HashGraphError, HashGraphResult};
pub use graph::HashGraph;
pub use linearize::LinearizedOperations;

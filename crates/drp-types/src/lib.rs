//! Foundation types for DRP replicated objects.
//!
//! This crate provides the wire records and contracts shared by every other
//! `drp-*` crate: the hashgraph, the ACL, the finality store, and the object
//! layer all speak in terms of these types.
//!
//! # Key Types
//!
//! - [`VertexHash`] — Content-derived identifier of a hashgraph vertex
//! - [`PeerId`] / [`PublicCredential`] — Peer identity and its public keys
//! - [`Operation`] / [`Track`] — Tagged operation payload carried by a vertex
//! - [`Vertex`] — One immutable, signed node of the operation hashgraph
//! - [`Attestation`] / [`AggregatedAttestation`] — Finality signatures
//! - [`ConflictResolver`] / [`ReplicatedType`] — Contract for pluggable data types
//! - [`ErrorClass`] — Coarse error taxonomy shared by every crate

pub mod attestation;
pub mod error;
pub mod hash;
pub mod identity;
pub mod resolver;
pub mod temporal;
pub mod vertex;

pub use attestation::{AggregatedAttestation, Attestation};
pub use error::{ErrorClass, TypeError};
pub use hash::VertexHash;
pub use identity::{PeerId, PublicCredential};
pub use resolver::{
    ActionType, ConflictResolver, ReplicatedType, ResolveConflictsType, SemanticsType,
};
pub use temporal::now_ms;
pub use vertex::{Operation, Track, Vertex, NOP_OP_TYPE};

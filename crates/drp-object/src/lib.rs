//! Replicated DRP objects.
//!
//! A [`DrpObject`] couples an operation [`HashGraph`](drp_hashgraph::HashGraph)
//! with two state tracks: the object's [`ObjectAcl`](drp_acl::ObjectAcl) and
//! an application [`ReplicatedType`](drp_types::ReplicatedType). Local calls
//! become signed vertices; vertices from other peers are merged, checked
//! against the ACL state they causally depend on, and projected into state
//! through lowest-common-ancestor linearization. Every admitted vertex gets a
//! finality roster, and peers exchange BLS attestations to finalize it.
//!
//! # Key Types
//!
//! - [`DrpObject`] — The replicated object
//! - [`ObjectOptions`] / [`ObjectConfig`] — Construction options and settings
//! - [`ObjectError`] — Everything that can go wrong, with an error class

pub mod config;
pub mod error;
mod finality;
mod merge;
pub mod object;
mod projection;

pub use config::{ObjectConfig, ObjectOptions};
pub use error::{ObjectError, ObjectResult};
pub use object::{DrpObject, ObjectCallback, ORIGIN_CALL, ORIGIN_MERGE};

//! Replicated access-control list for DRP objects.
//!
//! [`ObjectAcl`] is itself a replicated type: `grant` and `revoke` operations
//! travel on the access-control track of the object's hashgraph and are
//! linearized with their own conflict-resolution policy. The ACL gates
//! merges (writer checks) and supplies the finality signer roster.

pub mod acl;
pub mod config;
pub mod error;

pub use acl::{AclGroup, AclOp, ObjectAcl, PeerPermissions};
pub use config::{AclConflictResolution, AclOptions};
pub use error::AclError;

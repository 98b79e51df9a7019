//! Threshold BLS finality for hashgraph vertices.
//!
//! Every admitted vertex gets a [`FinalityState`] whose signer roster is
//! frozen from the ACL's finality signers at that vertex. Signers attest by
//! BLS-signing the vertex hash; signatures are aggregated into one, and a
//! vertex is final once the number of signers reaches the quorum
//! `ceil(roster × threshold)`.

pub mod config;
pub mod error;
pub mod state;
pub mod store;

pub use config::FinalityConfig;
pub use error::FinalityError;
pub use state::FinalityState;
pub use store::FinalityStore;

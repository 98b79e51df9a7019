use drp_types::{ErrorClass, PeerId, VertexHash};

/// Errors raised while collecting finality signatures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FinalityError {
    /// The signer is not in the vertex's frozen roster.
    #[error("peer {peer} is not a finality signer for {vertex:?}")]
    UnknownSigner { peer: PeerId, vertex: VertexHash },

    /// A signature (single or aggregated) failed verification.
    #[error("invalid finality signature for {vertex:?}: {reason}")]
    InvalidSignature { vertex: VertexHash, reason: String },

    /// A signer's recorded BLS key could not be decoded.
    #[error("invalid BLS public key for peer {0}")]
    InvalidPublicKey(PeerId),

    /// An aggregated attestation targets another vertex.
    #[error("attestation for {actual:?} merged into state of {expected:?}")]
    HashMismatch {
        expected: VertexHash,
        actual: VertexHash,
    },

    /// No finality state exists for the vertex.
    #[error("no finality state for vertex {0:?}")]
    UnknownVertex(VertexHash),
}

impl FinalityError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownSigner { .. } => ErrorClass::Permission,
            Self::InvalidSignature { .. } | Self::InvalidPublicKey(_) => ErrorClass::Crypto,
            Self::HashMismatch { .. } | Self::UnknownVertex(_) => ErrorClass::Structural,
        }
    }
}

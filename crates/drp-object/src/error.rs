use drp_acl::AclError;
use drp_crypto::SignatureError;
use drp_finality::FinalityError;
use drp_hashgraph::HashGraphError;
use drp_types::{ErrorClass, PeerId, TypeError, VertexHash};

/// Errors raised by replicated-object operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// An object needs either a public credential or a ready-made ACL.
    #[error("object requires a public credential or an ACL")]
    MissingCredentials,

    /// The object was built without an application data type.
    #[error("object has no replicated data type")]
    NoReplicatedType,

    /// The author is not a writer in the ACL state it depends on.
    #[error("peer {0} does not have write permission")]
    PermissionDenied(PeerId),

    /// The replicated data type refused the operation.
    #[error("operation rejected: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Only the root vertex may carry the no-op operation.
    #[error("vertex {0:?} carries a no-op operation")]
    NopOperation(VertexHash),

    /// Signatures are required and the vertex has none.
    #[error("vertex {0:?} is not signed")]
    MissingSignature(VertexHash),

    /// The author's key is not recorded in the ACL, so the signature cannot be checked.
    #[error("no public key for {peer} to verify vertex {vertex:?}")]
    UnknownAuthorKey { peer: PeerId, vertex: VertexHash },

    /// The author's signature over the vertex hash does not verify.
    #[error("invalid signature on vertex {vertex:?}: {source}")]
    InvalidSignature {
        vertex: VertexHash,
        #[source]
        source: SignatureError,
    },

    /// Signing requires a keychain.
    #[error("object has no keychain")]
    MissingKeychain,

    /// No cached state for an admitted vertex.
    #[error("no projected state for vertex {0:?}")]
    MissingState(VertexHash),

    #[error("key error: {0}")]
    Keys(#[from] SignatureError),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    HashGraph(#[from] HashGraphError),

    #[error(transparent)]
    Finality(#[from] FinalityError),

    #[error(transparent)]
    Types(#[from] TypeError),
}

impl ObjectError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PermissionDenied(_) => ErrorClass::Permission,
            Self::MissingSignature(_)
            | Self::UnknownAuthorKey { .. }
            | Self::InvalidSignature { .. }
            | Self::Keys(_) => ErrorClass::Crypto,
            Self::MissingState(_) => ErrorClass::StateInconsistency,
            Self::Acl(e) => e.class(),
            Self::HashGraph(e) => e.class(),
            Self::Finality(e) => e.class(),
            Self::Types(e) => e.class(),
            Self::MissingCredentials
            | Self::NoReplicatedType
            | Self::Rejected(_)
            | Self::NopOperation(_)
            | Self::MissingKeychain => ErrorClass::Structural,
        }
    }
}

/// Convenience alias for object results.
pub type ObjectResult<T> = Result<T, ObjectError>;

//! Error types for the operation hashgraph.

use drp_types::{ErrorClass, VertexHash};

/// Errors that can occur during hashgraph operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashGraphError {
    /// A non-root vertex was submitted without dependencies.
    #[error("vertex {0:?} has no dependencies")]
    DependenciesEmpty(VertexHash),

    /// A dependency is not (yet) known to this graph.
    #[error("vertex {vertex:?} depends on unknown vertex {dependency:?}")]
    UnknownDependency {
        /// The vertex being added.
        vertex: VertexHash,
        /// The missing dependency.
        dependency: VertexHash,
    },

    /// The vertex claims to be older than one of its dependencies.
    #[error(
        "vertex {vertex:?} has timestamp {timestamp} before dependency {dependency:?} at {dependency_timestamp}"
    )]
    TimestampOrderViolation {
        vertex: VertexHash,
        timestamp: i64,
        dependency: VertexHash,
        dependency_timestamp: i64,
    },

    /// The vertex claims a timestamp after the local wall clock.
    #[error("vertex {vertex:?} has timestamp {timestamp} in the future (now {now})")]
    FutureTimestamp {
        vertex: VertexHash,
        timestamp: i64,
        now: i64,
    },

    /// The claimed hash does not match the vertex content.
    #[error("vertex hash mismatch: claimed {claimed:?}, computed {computed:?}")]
    InvalidHash {
        claimed: VertexHash,
        computed: VertexHash,
    },

    /// A lowest-common-ancestor query was given no vertices.
    #[error("lowest common ancestor of an empty vertex set")]
    EmptyDependencySet,

    /// A referenced vertex is not in the graph.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexHash),

    /// Vertex content could not be hashed.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// An internal structure does not match the vertex set.
    #[error("hashgraph invariant violated: {0}")]
    InvariantViolation(String),
}

impl HashGraphError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TimestampOrderViolation { .. } | Self::FutureTimestamp { .. } => {
                ErrorClass::Temporal
            }
            Self::Hashing(_) => ErrorClass::Encoding,
            Self::InvariantViolation(_) => ErrorClass::StateInconsistency,
            _ => ErrorClass::Structural,
        }
    }
}

/// Convenience alias for hashgraph results.
pub type HashGraphResult<T> = Result<T, HashGraphError>;

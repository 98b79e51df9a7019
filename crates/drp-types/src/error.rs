use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// An operation was decoded against the wrong track.
    #[error("operation belongs to track {actual}, expected {expected}")]
    TrackMismatch { expected: String, actual: String },
}

impl TypeError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TrackMismatch { .. } => ErrorClass::Structural,
            _ => ErrorClass::Encoding,
        }
    }
}

/// Coarse classification of every error raised by the replicated-object stack.
///
/// Each crate maps its own error enum onto one of these classes so that
/// callers can decide on a policy (report as missing, surface, abort) without
/// matching on every concrete variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Empty or unknown dependencies, malformed hashes.
    Structural,
    /// Timestamp before a dependency's or after "now".
    Temporal,
    /// Writer or admin checks failed.
    Permission,
    /// Signature verification failed.
    Crypto,
    /// Cached state missing for a referenced vertex. Indicates a bug.
    StateInconsistency,
    /// Payload could not be encoded or decoded.
    Encoding,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structural => "structural",
            Self::Temporal => "temporal",
            Self::Permission => "permission",
            Self::Crypto => "crypto",
            Self::StateInconsistency => "state-inconsistency",
            Self::Encoding => "encoding",
        };
        f.write_str(s)
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-derived identifier of a hashgraph vertex.
///
/// A `VertexHash` is the BLAKE3 hash of a vertex's author, operation,
/// dependencies and timestamp (see `drp-crypto`). Two peers that author the
/// same content produce the same hash, so inserting it twice is a no-op.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexHash([u8; 32]);

impl VertexHash {
    /// The well-known root vertex hash, identical on every peer.
    pub const ROOT: Self = Self([0u8; 32]);

    /// Create a `VertexHash` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Returns `true` if this is the root sentinel.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for VertexHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VertexHash({})", self.short_hex())
    }
}

impl fmt::Display for VertexHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for VertexHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_all_zeros() {
        assert!(VertexHash::ROOT.is_root());
        assert_eq!(VertexHash::ROOT.as_bytes(), &[0u8; 32]);
        assert!(!VertexHash::from_hash([7; 32]).is_root());
    }

    #[test]
    fn hex_roundtrip() {
        let h = VertexHash::from_hash([0xab; 32]);
        let parsed = VertexHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = VertexHash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(matches!(
            VertexHash::from_hex("not hex"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn short_hex_and_display() {
        let h = VertexHash::from_hash([1; 32]);
        assert_eq!(h.short_hex(), "01010101");
        assert_eq!(format!("{h}").len(), 64);
        assert_eq!(format!("{h:?}"), "VertexHash(01010101)");
    }

    #[test]
    fn ordering_is_bytewise() {
        assert!(VertexHash::from_hash([0; 32]) < VertexHash::from_hash([1; 32]));
    }
}

use drp_types::{Operation, PeerId, VertexHash};
use serde::Serialize;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"drp-vertex-v1"`) that is
/// prepended to every hash computation, so a vertex and an object id built
/// from identical bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

/// Hashed fields of a vertex, in wire order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VertexContent<'a> {
    peer_id: &'a PeerId,
    operation: Option<&'a Operation>,
    dependencies: &'a [VertexHash],
    timestamp: i64,
}

impl ContentHasher {
    /// Hasher for hashgraph vertices.
    pub const VERTEX: Self = Self {
        domain: "drp-vertex-v1",
    };
    /// Hasher for object identifiers.
    pub const OBJECT: Self = Self {
        domain: "drp-object-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> VertexHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        VertexHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: Serialize>(&self, value: &T) -> Result<VertexHash, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Content hash of a vertex.
    ///
    /// Covers the author, operation, dependencies (in the order given) and
    /// timestamp. The signature is not part of the hash.
    pub fn vertex_hash(
        &self,
        peer_id: &PeerId,
        operation: Option<&Operation>,
        dependencies: &[VertexHash],
        timestamp: i64,
    ) -> Result<VertexHash, HasherError> {
        self.hash_json(&VertexContent {
            peer_id,
            operation,
            dependencies,
            timestamp,
        })
    }

    /// Raw BLAKE3 hash without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

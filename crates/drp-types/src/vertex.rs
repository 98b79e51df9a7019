use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::VertexHash;
use crate::identity::PeerId;

/// Operation name carried by the root vertex and skipped by linearization.
pub const NOP_OP_TYPE: &str = "-1";

/// The state track an operation belongs to.
///
/// Access-control and application operations share one hashgraph but are
/// linearized and projected independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Track {
    #[serde(rename = "ACL")]
    Acl,
    #[serde(rename = "APP")]
    App,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acl => f.write_str("ACL"),
            Self::App => f.write_str("APP"),
        }
    }
}

/// An operation payload: a track tag, an operation name, and its arguments.
///
/// `value` is the JSON encoding of the arguments. Typed operation enums use
/// serde adjacent tagging with `tag = "opType", content = "value"` and go
/// through [`Operation::encode`] / [`Operation::decode`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub track: Track,
    pub op_type: String,
    pub value: Vec<u8>,
}

impl Operation {
    pub fn new(track: Track, op_type: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            track,
            op_type: op_type.into(),
            value,
        }
    }

    /// The no-op operation carried by the root vertex.
    pub fn nop() -> Self {
        Self::new(Track::App, NOP_OP_TYPE, Vec::new())
    }

    pub fn is_nop(&self) -> bool {
        self.op_type == NOP_OP_TYPE
    }

    /// Encode a typed, adjacently tagged operation onto `track`.
    pub fn encode<O: Serialize>(track: Track, op: &O) -> Result<Self, TypeError> {
        let json = serde_json::to_value(op).map_err(|e| TypeError::Serialization(e.to_string()))?;
        let serde_json::Value::Object(mut map) = json else {
            return Err(TypeError::Serialization(
                "operation must serialize to a tagged object".into(),
            ));
        };
        let op_type = match map.remove("opType") {
            Some(serde_json::Value::String(s)) => s,
            _ => {
                return Err(TypeError::Serialization(
                    "operation is missing its opType tag".into(),
                ))
            }
        };
        let value = match map.remove("value") {
            Some(v) => serde_json::to_vec(&v).map_err(|e| TypeError::Serialization(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self::new(track, op_type, value))
    }

    /// Decode into a typed operation enum.
    pub fn decode<O: DeserializeOwned>(&self) -> Result<O, TypeError> {
        let mut map = serde_json::Map::new();
        map.insert("opType".into(), serde_json::Value::String(self.op_type.clone()));
        if !self.value.is_empty() {
            let value: serde_json::Value = serde_json::from_slice(&self.value)
                .map_err(|e| TypeError::Serialization(e.to_string()))?;
            map.insert("value".into(), value);
        }
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode, checking that the operation belongs to `track`.
    pub fn decode_on<O: DeserializeOwned>(&self, track: Track) -> Result<O, TypeError> {
        if self.track != track {
            return Err(TypeError::TrackMismatch {
                expected: track.to_string(),
                actual: self.track.to_string(),
            });
        }
        self.decode()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation({}:{} {})",
            self.track,
            self.op_type,
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// One immutable node of the operation hashgraph.
///
/// # Invariants
///
/// - A non-root vertex has at least one dependency.
/// - `timestamp` is at least the largest dependency timestamp.
/// - `hash` is the content hash of `peer_id`, `operation`, `dependencies`
///   and `timestamp`; `signature` is the author's signature over `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex {
    pub hash: VertexHash,
    pub peer_id: PeerId,
    pub operation: Option<Operation>,
    pub dependencies: Vec<VertexHash>,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

impl Vertex {
    /// The well-known root vertex, identical on every peer.
    pub fn root() -> Self {
        Self {
            hash: VertexHash::ROOT,
            peer_id: PeerId::new(""),
            operation: Some(Operation::nop()),
            dependencies: Vec::new(),
            timestamp: 0,
            signature: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.hash.is_root()
    }

    /// The track of this vertex's operation, if it carries a real one.
    pub fn track(&self) -> Option<Track> {
        match &self.operation {
            Some(op) if !op.is_nop() => Some(op.track),
            _ => None,
        }
    }

    /// Decode this vertex's operation, if any, as `O`.
    pub fn decode_op<O: DeserializeOwned>(&self) -> Option<O> {
        self.operation.as_ref().and_then(|op| op.decode().ok())
    }

    /// Serialize to bytes (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        bincode::serialize(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Deserialize from bytes (bincode).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::VertexHash;

/// A single signer's BLS signature over a vertex hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub vertex_hash: VertexHash,
    pub signature: Vec<u8>,
}

/// A pre-aggregated BLS signature together with the bitset of signers
/// (indices into the vertex's frozen signer roster) it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAttestation {
    pub vertex_hash: VertexHash,
    pub aggregation_bits: Vec<u8>,
    pub signature: Vec<u8>,
}

impl AggregatedAttestation {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        bincode::serialize(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a peer participating in a replicated object.
///
/// Peer ids are opaque strings assigned by the transport layer. They are
/// totally ordered so that signer rosters sort identically on every peer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The public half of a peer's key pair set.
///
/// `ed25519_public_key` verifies vertex signatures; `bls_public_key` verifies
/// finality attestations. Both are hex-encoded. They are opaque at this
/// layer and only decoded where a signature is actually checked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicCredential {
    pub ed25519_public_key: String,
    pub bls_public_key: String,
}

impl PublicCredential {
    pub fn new(ed25519_public_key: impl Into<String>, bls_public_key: impl Into<String>) -> Self {
        Self {
            ed25519_public_key: ed25519_public_key.into(),
            bls_public_key: bls_public_key.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_orders_lexicographically() {
        let mut peers = vec![PeerId::from("peer3"), PeerId::from("peer1"), PeerId::from("peer2")];
        peers.sort();
        assert_eq!(peers[0].as_str(), "peer1");
        assert_eq!(peers[2].as_str(), "peer3");
    }

    #[test]
    fn peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn credential_serde_roundtrip() {
        let cred = PublicCredential::new("aa", "bb");
        let json = serde_json::to_string(&cred).unwrap();
        let parsed: PublicCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(cred, parsed);
    }
}

//! BLS12-381 signatures for finality attestations.
//!
//! Public keys live in G1 and signatures in G2 (the "min-pk" variant), using
//! the proof-of-possession ciphersuite. Signatures over the same message
//! aggregate into one signature verifiable against the set of signer keys.

use blst::min_pk;
use blst::BLST_ERROR;

use crate::signer::SignatureError;

/// Ciphersuite domain separation tag.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// BLS secret key.
pub struct BlsSecretKey(min_pk::SecretKey);

/// BLS public key (48-byte compressed G1 point).
#[derive(Clone)]
pub struct BlsPublicKey(min_pk::PublicKey);

/// BLS signature (96-byte compressed G2 point), single or aggregated.
#[derive(Clone)]
pub struct BlsSignature(min_pk::Signature);

impl BlsSecretKey {
    /// Derive a key from at least 32 bytes of input keying material.
    pub fn from_ikm(ikm: &[u8]) -> Result<Self, SignatureError> {
        min_pk::SecretKey::key_gen(ikm, &[])
            .map(Self)
            .map_err(|e| SignatureError::InvalidEncoding(format!("bls key_gen: {e:?}")))
    }

    /// Generate a random key.
    pub fn generate() -> Result<Self, SignatureError> {
        let mut ikm = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut ikm);
        Self::from_ikm(&ikm)
    }

    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey(self.0.sk_to_pk())
    }

    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.0.sign(message, DST, &[]))
    }
}

impl BlsPublicKey {
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.compress()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse and validate (subgroup check, not infinity) a public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        min_pk::PublicKey::key_validate(bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s).map_err(|_| SignatureError::InvalidKey)?;
        Self::from_bytes(&bytes)
    }
}

impl BlsSignature {
    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.compress()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        min_pk::Signature::from_bytes(bytes)
            .map(Self)
            .map_err(|e| SignatureError::InvalidEncoding(format!("bls signature: {e:?}")))
    }

    /// Verify a single signature over `message`.
    pub fn verify(&self, message: &[u8], key: &BlsPublicKey) -> Result<(), SignatureError> {
        match self.0.verify(true, message, DST, &[], &key.0, true) {
            BLST_ERROR::BLST_SUCCESS => Ok(()),
            _ => Err(SignatureError::InvalidSignature),
        }
    }

    /// Verify an aggregate of signatures over the same `message`.
    pub fn fast_aggregate_verify(
        &self,
        message: &[u8],
        keys: &[&BlsPublicKey],
    ) -> Result<(), SignatureError> {
        if keys.is_empty() {
            return Err(SignatureError::EmptyAggregate);
        }
        let raw: Vec<&min_pk::PublicKey> = keys.iter().map(|k| &k.0).collect();
        match self.0.fast_aggregate_verify(true, message, DST, &raw) {
            BLST_ERROR::BLST_SUCCESS => Ok(()),
            _ => Err(SignatureError::InvalidSignature),
        }
    }

    /// Aggregate signatures into one.
    pub fn aggregate(signatures: &[&BlsSignature]) -> Result<BlsSignature, SignatureError> {
        if signatures.is_empty() {
            return Err(SignatureError::EmptyAggregate);
        }
        let raw: Vec<&min_pk::Signature> = signatures.iter().map(|s| &s.0).collect();
        min_pk::AggregateSignature::aggregate(&raw, true)
            .map(|agg| BlsSignature(agg.to_signature()))
            .map_err(|e| SignatureError::InvalidEncoding(format!("bls aggregate: {e:?}")))
    }
}

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsPublicKey {}

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

impl std::fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlsSecretKey(<redacted>)")
    }
}

impl std::fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlsPublicKey({})", self.to_hex())
    }
}

impl std::fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlsSignature({}...)", hex::encode(&self.to_bytes()[..8]))
    }
}

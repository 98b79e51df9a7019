use drp_types::{PublicCredential, VertexHash};

use crate::bls::{BlsPublicKey, BlsSecretKey, BlsSignature};
use crate::hasher::ContentHasher;
use crate::signer::{Signature, SignatureError, SigningKey, VerifyingKey};

/// A peer's secret keys: Ed25519 for vertices, BLS for finality.
#[derive(Debug)]
pub struct Keychain {
    signing: SigningKey,
    bls: BlsSecretKey,
}

impl Keychain {
    /// Derive both keys from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, SignatureError> {
        let mut ikm = seed.to_vec();
        ikm.extend_from_slice(b"drp-bls-v1");
        let bls = BlsSecretKey::from_ikm(&ContentHasher::raw_hash(&ikm))?;
        Ok(Self {
            signing: SigningKey::from_bytes(seed),
            bls,
        })
    }

    /// Generate a fresh random keychain.
    pub fn generate() -> Result<Self, SignatureError> {
        let mut seed = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut seed);
        Self::from_seed(seed)
    }

    /// The hex-encoded public keys other peers record in their ACL.
    pub fn public_credential(&self) -> PublicCredential {
        PublicCredential::new(
            self.signing.verifying_key().to_hex(),
            self.bls.public_key().to_hex(),
        )
    }

    /// Ed25519 signature over a vertex hash.
    pub fn sign_vertex(&self, hash: &VertexHash) -> Vec<u8> {
        self.signing.sign(hash.as_bytes()).to_bytes().to_vec()
    }

    /// BLS signature over a vertex hash, for finality attestations.
    pub fn sign_finality(&self, hash: &VertexHash) -> Vec<u8> {
        self.bls.sign(hash.as_bytes()).to_bytes().to_vec()
    }
}

/// Check an author's Ed25519 signature over a vertex hash.
pub fn verify_vertex_signature(
    credential: &PublicCredential,
    hash: &VertexHash,
    signature: &[u8],
) -> Result<(), SignatureError> {
    let key = VerifyingKey::from_hex(&credential.ed25519_public_key)?;
    let sig = Signature::from_slice(signature)?;
    key.verify(hash.as_bytes(), &sig)
}

/// Check a signer's BLS signature over a vertex hash.
pub fn verify_finality_signature(
    credential: &PublicCredential,
    hash: &VertexHash,
    signature: &[u8],
) -> Result<(), SignatureError> {
    let key = BlsPublicKey::from_hex(&credential.bls_public_key)?;
    BlsSignature::from_bytes(signature)?.verify(hash.as_bytes(), &key)
}

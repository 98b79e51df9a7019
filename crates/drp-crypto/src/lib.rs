//! Cryptographic primitives for DRP replicated objects.
//!
//! Provides domain-separated BLAKE3 hashing of vertices, Ed25519
//! signing/verification of vertex hashes, BLS12-381 signatures with
//! aggregation for finality, and a [`Keychain`] bundling a peer's secrets.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod bls;
pub mod hasher;
pub mod keychain;
pub mod signer;

pub use bls::{BlsPublicKey, BlsSecretKey, BlsSignature};
pub use hasher::{ContentHasher, HasherError};
pub use keychain::{verify_finality_signature, verify_vertex_signature, Keychain};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};

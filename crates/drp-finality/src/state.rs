use std::collections::{BTreeMap, HashMap};

use drp_crypto::{BlsPublicKey, BlsSignature};
use drp_hashgraph::BitSet;
use drp_types::{AggregatedAttestation, PeerId, PublicCredential, VertexHash};

use crate::error::FinalityError;

/// Signature aggregation state of one vertex.
///
/// # Invariants
///
/// - The roster is sorted by peer id and never changes.
/// - `signature_count` equals the number of set aggregation bits, and the
///   aggregated signature covers exactly those signers.
#[derive(Clone, Debug)]
pub struct FinalityState {
    vertex_hash: VertexHash,
    signers: Vec<(PeerId, PublicCredential)>,
    signer_indices: HashMap<PeerId, usize>,
    aggregation_bits: BitSet,
    signature: Option<BlsSignature>,
    signature_count: usize,
}

impl FinalityState {
    pub fn new(vertex_hash: VertexHash, signers: BTreeMap<PeerId, PublicCredential>) -> Self {
        let signers: Vec<(PeerId, PublicCredential)> = signers.into_iter().collect();
        let signer_indices = signers
            .iter()
            .enumerate()
            .map(|(i, (peer, _))| (peer.clone(), i))
            .collect();
        Self {
            vertex_hash,
            aggregation_bits: BitSet::new(signers.len()),
            signers,
            signer_indices,
            signature: None,
            signature_count: 0,
        }
    }

    pub fn vertex_hash(&self) -> &VertexHash {
        &self.vertex_hash
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    pub fn signature_count(&self) -> usize {
        self.signature_count
    }

    pub fn aggregation_bits(&self) -> &BitSet {
        &self.aggregation_bits
    }

    pub fn is_signer(&self, peer: &PeerId) -> bool {
        self.signer_indices.contains_key(peer)
    }

    pub fn has_signed(&self, peer: &PeerId) -> bool {
        self.signer_indices
            .get(peer)
            .is_some_and(|&i| self.aggregation_bits.get(i))
    }

    /// The aggregated signature collected so far, compressed.
    pub fn signature(&self) -> Option<Vec<u8>> {
        self.signature.as_ref().map(|s| s.to_bytes().to_vec())
    }

    fn public_key(&self, index: usize) -> Result<BlsPublicKey, FinalityError> {
        let (peer, credential) = &self.signers[index];
        BlsPublicKey::from_hex(&credential.bls_public_key)
            .map_err(|_| FinalityError::InvalidPublicKey(peer.clone()))
    }

    fn invalid(&self, reason: impl ToString) -> FinalityError {
        FinalityError::InvalidSignature {
            vertex: self.vertex_hash,
            reason: reason.to_string(),
        }
    }

    /// Fold one signer's signature into the aggregate.
    ///
    /// A second signature from the same signer is ignored.
    pub fn add_signature(
        &mut self,
        peer: &PeerId,
        signature: &[u8],
        verify: bool,
    ) -> Result<(), FinalityError> {
        let Some(&index) = self.signer_indices.get(peer) else {
            return Err(FinalityError::UnknownSigner {
                peer: peer.clone(),
                vertex: self.vertex_hash,
            });
        };
        if self.aggregation_bits.get(index) {
            return Ok(());
        }

        let signature = BlsSignature::from_bytes(signature).map_err(|e| self.invalid(e))?;
        if verify {
            let key = self.public_key(index)?;
            signature
                .verify(self.vertex_hash.as_bytes(), &key)
                .map_err(|e| self.invalid(e))?;
        }

        let aggregated = match &self.signature {
            None => signature,
            Some(current) => {
                BlsSignature::aggregate(&[current, &signature]).map_err(|e| self.invalid(e))?
            }
        };
        self.signature = Some(aggregated);
        self.aggregation_bits.set(index, true);
        self.signature_count += 1;
        Ok(())
    }

    /// Adopt a peer's pre-aggregated signature.
    ///
    /// Only accepted while this state has no signature of its own, and only
    /// after it verifies against the keys its bits select.
    pub fn merge(&mut self, attestation: &AggregatedAttestation) -> Result<(), FinalityError> {
        if attestation.vertex_hash != self.vertex_hash {
            return Err(FinalityError::HashMismatch {
                expected: self.vertex_hash,
                actual: attestation.vertex_hash,
            });
        }
        if self.signature.is_some() {
            return Ok(());
        }

        let incoming = BitSet::from_bytes(&attestation.aggregation_bits);
        let mut bits = BitSet::new(self.signers.len());
        let mut keys = Vec::new();
        for i in 0..self.signers.len() {
            if incoming.get(i) {
                bits.set(i, true);
                keys.push(self.public_key(i)?);
            }
        }

        let signature = BlsSignature::from_bytes(&attestation.signature).map_err(|e| self.invalid(e))?;
        let key_refs: Vec<&BlsPublicKey> = keys.iter().collect();
        signature
            .fast_aggregate_verify(self.vertex_hash.as_bytes(), &key_refs)
            .map_err(|e| self.invalid(e))?;

        self.signature_count = keys.len();
        self.aggregation_bits = bits;
        self.signature = Some(signature);
        Ok(())
    }

    /// The shareable aggregate, if anyone has signed.
    pub fn attestation(&self) -> Option<AggregatedAttestation> {
        self.signature.as_ref().map(|s| AggregatedAttestation {
            vertex_hash: self.vertex_hash,
            aggregation_bits: self.aggregation_bits.to_bytes(),
            signature: s.to_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use drp_crypto::Keychain;

    use super::*;

    fn signers(n: usize) -> (Vec<Keychain>, BTreeMap<PeerId, PublicCredential>) {
        let keys: Vec<Keychain> = (0..n)
            .map(|i| {
                let mut seed = [0u8; 32];
                seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
                Keychain::from_seed(seed).unwrap()
            })
            .collect();
        let roster = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (PeerId::new(format!("peer{i:03}")), k.public_credential()))
            .collect();
        (keys, roster)
    }

    fn hash() -> VertexHash {
        VertexHash::from_hash([7; 32])
    }

    #[test]
    fn roster_is_sorted_and_frozen() {
        let (_, roster) = signers(3);
        let state = FinalityState::new(hash(), roster);
        assert_eq!(state.signer_count(), 3);
        assert_eq!(state.signature_count(), 0);
        assert!(state.is_signer(&PeerId::new("peer000")));
        assert!(state.attestation().is_none());
    }

    #[test]
    fn add_signature_sets_bit_and_aggregates() {
        let (keys, roster) = signers(4);
        let mut state = FinalityState::new(hash(), roster);
        for (i, k) in keys.iter().enumerate().take(3) {
            let peer = PeerId::new(format!("peer{i:03}"));
            state.add_signature(&peer, &k.sign_finality(&hash()), true).unwrap();
            assert!(state.has_signed(&peer));
        }
        assert_eq!(state.signature_count(), 3);
        assert_eq!(state.aggregation_bits().count_ones(), 3);
        assert!(!state.aggregation_bits().get(3));
    }

    #[test]
    fn duplicate_signature_is_ignored() {
        let (keys, roster) = signers(2);
        let mut state = FinalityState::new(hash(), roster);
        let peer = PeerId::new("peer000");
        let sig = keys[0].sign_finality(&hash());
        state.add_signature(&peer, &sig, true).unwrap();
        state.add_signature(&peer, &sig, true).unwrap();
        assert_eq!(state.signature_count(), 1);
    }

    #[test]
    fn unknown_signer_is_rejected() {
        let (keys, roster) = signers(2);
        let mut state = FinalityState::new(hash(), roster);
        let err = state
            .add_signature(&PeerId::new("stranger"), &keys[0].sign_finality(&hash()), true)
            .unwrap_err();
        assert!(matches!(err, FinalityError::UnknownSigner { .. }));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let (keys, roster) = signers(2);
        let mut state = FinalityState::new(hash(), roster);
        let err = state
            .add_signature(&PeerId::new("peer000"), &keys[1].sign_finality(&hash()), true)
            .unwrap_err();
        assert!(matches!(err, FinalityError::InvalidSignature { .. }));
        assert_eq!(err.class(), drp_types::ErrorClass::Crypto);
        assert_eq!(state.signature_count(), 0);
    }

    #[test]
    fn merge_adopts_verified_aggregate() {
        let (keys, roster) = signers(5);
        let mut source = FinalityState::new(hash(), roster.clone());
        for (i, k) in keys.iter().enumerate().take(3) {
            source
                .add_signature(&PeerId::new(format!("peer{i:03}")), &k.sign_finality(&hash()), true)
                .unwrap();
        }
        let attestation = source.attestation().unwrap();

        let mut target = FinalityState::new(hash(), roster);
        target.merge(&attestation).unwrap();
        assert_eq!(target.signature_count(), 3);
        assert_eq!(target.attestation(), Some(attestation));
    }

    #[test]
    fn merge_is_first_writer_wins() {
        let (keys, roster) = signers(3);
        let mut a = FinalityState::new(hash(), roster.clone());
        a.add_signature(&PeerId::new("peer000"), &keys[0].sign_finality(&hash()), true)
            .unwrap();
        let mut b = FinalityState::new(hash(), roster);
        b.add_signature(&PeerId::new("peer001"), &keys[1].sign_finality(&hash()), true)
            .unwrap();
        b.add_signature(&PeerId::new("peer002"), &keys[2].sign_finality(&hash()), true)
            .unwrap();

        a.merge(&b.attestation().unwrap()).unwrap();
        assert_eq!(a.signature_count(), 1);
        assert!(a.has_signed(&PeerId::new("peer000")));
    }

    #[test]
    fn merge_rejects_mismatched_bits() {
        let (keys, roster) = signers(3);
        let mut source = FinalityState::new(hash(), roster.clone());
        source
            .add_signature(&PeerId::new("peer000"), &keys[0].sign_finality(&hash()), true)
            .unwrap();
        let mut attestation = source.attestation().unwrap();
        attestation.aggregation_bits = vec![0b0000_0011];

        let mut target = FinalityState::new(hash(), roster);
        assert!(matches!(
            target.merge(&attestation),
            Err(FinalityError::InvalidSignature { .. })
        ));
        assert_eq!(target.signature_count(), 0);
    }

    #[test]
    fn merge_rejects_other_vertex() {
        let (_, roster) = signers(1);
        let mut state = FinalityState::new(hash(), roster);
        let att = AggregatedAttestation {
            vertex_hash: VertexHash::ROOT,
            aggregation_bits: vec![1],
            signature: vec![0; 96],
        };
        assert_eq!(
            state.merge(&att),
            Err(FinalityError::HashMismatch {
                expected: hash(),
                actual: VertexHash::ROOT
            })
        );
    }
}

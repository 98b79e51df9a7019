use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use drp_types::{AggregatedAttestation, Attestation, PeerId, PublicCredential, VertexHash};

use crate::config::FinalityConfig;
use crate::error::FinalityError;
use crate::state::FinalityState;

/// Finality states of every vertex of one object.
#[derive(Clone, Debug, Default)]
pub struct FinalityStore {
    states: HashMap<VertexHash, FinalityState>,
    config: FinalityConfig,
}

impl FinalityStore {
    pub fn new(config: FinalityConfig) -> Self {
        Self {
            states: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &FinalityConfig {
        &self.config
    }

    /// Freeze the signer roster of `hash`. Later calls are no-ops.
    pub fn initialize_state(&mut self, hash: VertexHash, signers: BTreeMap<PeerId, PublicCredential>) {
        self.states
            .entry(hash)
            .or_insert_with(|| FinalityState::new(hash, signers));
    }

    pub fn state(&self, hash: &VertexHash) -> Option<&FinalityState> {
        self.states.get(hash)
    }

    pub fn get_quorum(&self, hash: &VertexHash) -> Option<usize> {
        self.states
            .get(hash)
            .map(|s| self.config.quorum(s.signer_count()))
    }

    pub fn get_number_of_signatures(&self, hash: &VertexHash) -> Option<usize> {
        self.states.get(hash).map(FinalityState::signature_count)
    }

    /// `Some(true)` once the signature count reaches the quorum; `None` for
    /// an unknown vertex.
    pub fn is_finalized(&self, hash: &VertexHash) -> Option<bool> {
        self.states
            .get(hash)
            .map(|s| s.signature_count() >= self.config.quorum(s.signer_count()))
    }

    /// Whether `peer` is in the roster of `hash`.
    pub fn can_sign(&self, peer: &PeerId, hash: &VertexHash) -> bool {
        self.states.get(hash).is_some_and(|s| s.is_signer(peer))
    }

    /// Whether `peer`'s signature for `hash` has been counted.
    pub fn signed(&self, peer: &PeerId, hash: &VertexHash) -> bool {
        self.states.get(hash).is_some_and(|s| s.has_signed(peer))
    }

    /// Record `peer`'s individual attestations.
    ///
    /// Each attestation is handled on its own; the failures are logged and
    /// returned, never dropped.
    pub fn add_signatures(
        &mut self,
        peer: &PeerId,
        attestations: &[Attestation],
        verify: bool,
    ) -> Vec<FinalityError> {
        let mut errors = Vec::new();
        for att in attestations {
            let result = match self.states.get_mut(&att.vertex_hash) {
                Some(state) => state.add_signature(peer, &att.signature, verify),
                None => Err(FinalityError::UnknownVertex(att.vertex_hash)),
            };
            match result {
                Ok(()) => debug!(
                    vertex = %att.vertex_hash.short_hex(),
                    %peer,
                    "added finality signature"
                ),
                Err(e) => {
                    warn!(vertex = %att.vertex_hash.short_hex(), %peer, error = %e, "rejected finality signature");
                    errors.push(e);
                }
            }
        }
        errors
    }

    /// Adopt peers' aggregated attestations where we have none yet.
    pub fn merge_signatures(&mut self, attestations: &[AggregatedAttestation]) -> Vec<FinalityError> {
        let mut errors = Vec::new();
        for att in attestations {
            let result = match self.states.get_mut(&att.vertex_hash) {
                Some(state) => state.merge(att),
                None => Err(FinalityError::UnknownVertex(att.vertex_hash)),
            };
            if let Err(e) = result {
                warn!(vertex = %att.vertex_hash.short_hex(), error = %e, "rejected aggregated attestation");
                errors.push(e);
            }
        }
        errors
    }

    pub fn get_attestation(&self, hash: &VertexHash) -> Option<AggregatedAttestation> {
        self.states.get(hash).and_then(FinalityState::attestation)
    }
}

#[cfg(test)]
mod tests {
    use drp_crypto::Keychain;

    use super::*;

    fn keychain(i: usize) -> Keychain {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
        seed[31] = 0xfe;
        Keychain::from_seed(seed).unwrap()
    }

    fn peer(i: usize) -> PeerId {
        PeerId::new(format!("peer{i:04}"))
    }

    fn setup(n: usize) -> (Vec<Keychain>, FinalityStore, VertexHash) {
        let keys: Vec<Keychain> = (0..n).map(keychain).collect();
        let roster = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (peer(i), k.public_credential()))
            .collect();
        let hash = VertexHash::from_hash([3; 32]);
        let mut store = FinalityStore::default();
        store.initialize_state(hash, roster);
        (keys, store, hash)
    }

    fn attest(keys: &[Keychain], i: usize, hash: VertexHash) -> Vec<Attestation> {
        vec![Attestation {
            vertex_hash: hash,
            signature: keys[i].sign_finality(&hash),
        }]
    }

    #[test]
    fn initialize_is_idempotent() {
        let (keys, mut store, hash) = setup(4);
        assert!(store.add_signatures(&peer(0), &attest(&keys, 0, hash), true).is_empty());
        store.initialize_state(hash, BTreeMap::new());
        assert_eq!(store.get_number_of_signatures(&hash), Some(1));
        assert_eq!(store.get_quorum(&hash), Some(3));
    }

    #[test]
    fn finality_with_128_signers() {
        let (keys, mut store, hash) = setup(128);
        assert_eq!(store.get_quorum(&hash), Some(66));
        for i in 0..66 {
            assert!(store.can_sign(&peer(i), &hash));
            assert_eq!(store.is_finalized(&hash), Some(false));
            let errors = store.add_signatures(&peer(i), &attest(&keys, i, hash), true);
            assert!(errors.is_empty());
            assert!(store.signed(&peer(i), &hash));
        }
        assert_eq!(store.is_finalized(&hash), Some(true));
        assert!(store.get_attestation(&hash).is_some());
    }

    #[test]
    fn quorum_boundary_with_1000_signers() {
        let (keys, mut store, hash) = setup(1000);
        for i in 0..509 {
            store.add_signatures(&peer(i), &attest(&keys, i, hash), false);
        }
        assert_eq!(store.get_number_of_signatures(&hash), Some(509));
        assert_eq!(store.is_finalized(&hash), Some(false));
        store.add_signatures(&peer(509), &attest(&keys, 509, hash), false);
        assert_eq!(store.is_finalized(&hash), Some(true));
    }

    #[test]
    fn failures_are_reported() {
        let (keys, mut store, hash) = setup(3);
        let errors = store.add_signatures(&peer(0), &attest(&keys, 1, hash), true);
        assert_eq!(errors.len(), 1);
        assert!(!store.signed(&peer(0), &hash));

        let other = VertexHash::from_hash([9; 32]);
        let errors = store.add_signatures(&peer(0), &attest(&keys, 0, other), true);
        assert_eq!(errors, vec![FinalityError::UnknownVertex(other)]);
        assert_eq!(store.is_finalized(&other), None);
        assert!(!store.can_sign(&peer(0), &other));
    }

    #[test]
    fn merge_signatures_first_writer_wins() {
        let (keys, mut a, hash) = setup(4);
        let (_, mut b, _) = setup(4);
        a.add_signatures(&peer(0), &attest(&keys, 0, hash), true);
        a.add_signatures(&peer(1), &attest(&keys, 1, hash), true);
        b.add_signatures(&peer(2), &attest(&keys, 2, hash), true);

        let from_a = a.get_attestation(&hash).unwrap();
        assert!(b.merge_signatures(&[from_a.clone()]).is_empty());
        assert_eq!(b.get_number_of_signatures(&hash), Some(1));

        let (_, mut c, _) = setup(4);
        assert!(c.merge_signatures(&[from_a]).is_empty());
        assert_eq!(c.get_number_of_signatures(&hash), Some(2));
    }

    #[test]
    fn invalid_aggregate_leaves_no_signatures() {
        let (keys, mut a, hash) = setup(4);
        a.add_signatures(&peer(0), &attest(&keys, 0, hash), true);
        let mut forged = a.get_attestation(&hash).unwrap();
        forged.aggregation_bits = vec![0b0000_0110];

        let (_, mut b, _) = setup(4);
        let errors = b.merge_signatures(&[forged]);
        assert_eq!(errors.len(), 1);
        assert_eq!(b.get_number_of_signatures(&hash), Some(0));
    }
}

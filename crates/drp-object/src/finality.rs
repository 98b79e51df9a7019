//! Finality wiring: local attestation and exchange of peers' signatures.

use tracing::debug;

use drp_finality::FinalityError;
use drp_types::{AggregatedAttestation, Attestation, PeerId, ReplicatedType, VertexHash};

use crate::error::{ObjectError, ObjectResult};
use crate::object::DrpObject;

impl<T: ReplicatedType> DrpObject<T> {
    /// BLS-sign every vertex of `hashes` whose roster includes the local peer
    /// and that it has not signed yet.
    ///
    /// The signatures are counted locally and returned for broadcast.
    pub fn sign_finality(&mut self, hashes: &[VertexHash]) -> ObjectResult<Vec<Attestation>> {
        let span = self.span.clone();
        let _enter = span.enter();

        let keychain = self.keychain().ok_or(ObjectError::MissingKeychain)?;
        let me = self.peer_id().clone();
        let attestations: Vec<Attestation> = hashes
            .iter()
            .filter(|h| self.finality.can_sign(&me, h) && !self.finality.signed(&me, h))
            .map(|h| Attestation {
                vertex_hash: *h,
                signature: keychain.sign_finality(h),
            })
            .collect();

        if let Some(e) = self
            .finality
            .add_signatures(&me, &attestations, false)
            .into_iter()
            .next()
        {
            return Err(e.into());
        }
        debug!(signed = attestations.len(), "signed vertices for finality");
        Ok(attestations)
    }

    /// Record `peer`'s attestations after verifying each one.
    pub fn add_signatures(&mut self, peer: &PeerId, attestations: &[Attestation]) -> Vec<FinalityError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.finality.add_signatures(peer, attestations, true)
    }

    /// Adopt aggregated attestations for vertices that have none yet.
    pub fn merge_signatures(&mut self, attestations: &[AggregatedAttestation]) -> Vec<FinalityError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.finality.merge_signatures(attestations)
    }

    pub fn get_attestation(&self, hash: &VertexHash) -> Option<AggregatedAttestation> {
        self.finality.get_attestation(hash)
    }

    /// `None` when the vertex is unknown.
    pub fn is_finalized(&self, hash: &VertexHash) -> Option<bool> {
        self.finality.is_finalized(hash)
    }
}

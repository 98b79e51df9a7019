//! Ingestion of vertices authored elsewhere.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, error};

use drp_acl::{AclOp, ObjectAcl};
use drp_crypto::verify_vertex_signature;
use drp_types::{ReplicatedType, Track, Vertex, VertexHash};

use crate::error::{ObjectError, ObjectResult};
use crate::object::{DrpObject, ORIGIN_MERGE};
use crate::projection::Projection;

impl<T: ReplicatedType> DrpObject<T> {
    /// Merge a batch of vertices.
    ///
    /// Known vertices and vertices without an operation are skipped. Each
    /// other vertex is validated, checked against the ACL state at its own
    /// dependencies, and applied on top of the state projected there.
    /// Vertices that fail are reported back as missing; they are not retried.
    ///
    /// Returns whether every vertex was admitted, and the hashes of those
    /// that were not. Fails only when the state at the new frontier cannot
    /// be projected, which means the cached states are inconsistent. The
    /// current state is then left as it was and no subscriber is notified.
    pub fn merge(&mut self, vertices: &[Vertex]) -> ObjectResult<(bool, Vec<VertexHash>)> {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut missing = Vec::new();
        let mut admitted = Vec::new();
        for vertex in order_batch(vertices) {
            if vertex.operation.is_none() || self.hashgraph.contains(&vertex.hash) {
                continue;
            }
            match self.merge_vertex(vertex) {
                Ok(()) => admitted.push(vertex.clone()),
                Err(e) => {
                    debug!(
                        vertex = %vertex.hash.short_hex(),
                        author = %vertex.peer_id,
                        class = %e.class(),
                        error = %e,
                        "vertex not merged"
                    );
                    missing.push(vertex.hash);
                }
            }
        }

        if !admitted.is_empty() {
            if let Err(e) = self.refresh_current() {
                error!(
                    admitted = admitted.len(),
                    class = %e.class(),
                    error = %e,
                    "failed to project state at the frontier"
                );
                return Err(e);
            }
        }
        debug!(
            received = vertices.len(),
            admitted = admitted.len(),
            missing = missing.len(),
            "merged vertices"
        );
        self.notify(ORIGIN_MERGE, &admitted);
        Ok((missing.is_empty(), missing))
    }

    fn merge_vertex(&mut self, vertex: &Vertex) -> ObjectResult<()> {
        self.hashgraph.validate_vertex(vertex)?;
        let track = vertex
            .track()
            .ok_or(ObjectError::NopOperation(vertex.hash))?;

        let Projection { acl, drp } = self.project(&vertex.dependencies)?;
        if track == Track::App && !acl.can_write(&vertex.peer_id) {
            return Err(ObjectError::PermissionDenied(vertex.peer_id.clone()));
        }
        self.check_signature(&acl, vertex)?;

        let (acl, drp) = match track {
            Track::Acl => (apply_acl(&acl, vertex)?, drp),
            Track::App => {
                let current = drp.ok_or(ObjectError::NoReplicatedType)?;
                (acl, Some(apply_app::<T>(&current, vertex)?))
            }
        };

        self.hashgraph.add_vertex(vertex.clone())?;
        self.record(vertex.hash, acl, drp);
        Ok(())
    }

    /// Verify the author's signature with the key recorded in `acl`.
    fn check_signature(&self, acl: &ObjectAcl, vertex: &Vertex) -> ObjectResult<()> {
        let required = self.config().require_signatures;
        if vertex.signature.is_empty() {
            return if required {
                Err(ObjectError::MissingSignature(vertex.hash))
            } else {
                Ok(())
            };
        }
        let Some(credential) = acl.peer_key(&vertex.peer_id) else {
            return if required {
                Err(ObjectError::UnknownAuthorKey {
                    peer: vertex.peer_id.clone(),
                    vertex: vertex.hash,
                })
            } else {
                Ok(())
            };
        };
        verify_vertex_signature(credential, &vertex.hash, &vertex.signature).map_err(|source| {
            ObjectError::InvalidSignature {
                vertex: vertex.hash,
                source,
            }
        })
    }
}

fn apply_acl(current: &ObjectAcl, vertex: &Vertex) -> ObjectResult<Arc<ObjectAcl>> {
    let op = decode::<AclOp>(vertex, Track::Acl)?;
    let mut next = current.clone();
    next.apply(&vertex.peer_id, op)?;
    Ok(Arc::new(next))
}

fn apply_app<T: ReplicatedType>(current: &T, vertex: &Vertex) -> ObjectResult<Arc<T>> {
    let op = decode::<T::Op>(vertex, Track::App)?;
    let mut next = current.clone();
    next.apply(&vertex.peer_id, op)
        .map_err(|e| ObjectError::Rejected(Box::new(e)))?;
    Ok(Arc::new(next))
}

fn decode<O: serde::de::DeserializeOwned>(vertex: &Vertex, track: Track) -> ObjectResult<O> {
    let operation = vertex
        .operation
        .as_ref()
        .ok_or(ObjectError::NopOperation(vertex.hash))?;
    Ok(operation.decode_on(track)?)
}

/// Order a batch so that vertices come after their in-batch dependencies.
///
/// Duplicates are dropped; otherwise the input order is kept wherever the
/// dependencies allow it.
pub(crate) fn order_batch(vertices: &[Vertex]) -> Vec<&Vertex> {
    let mut seen = HashSet::new();
    let unique: Vec<&Vertex> = vertices.iter().filter(|v| seen.insert(v.hash)).collect();
    let position: HashMap<VertexHash, usize> =
        unique.iter().enumerate().map(|(i, v)| (v.hash, i)).collect();

    let mut in_degree = vec![0usize; unique.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    for (i, vertex) in unique.iter().enumerate() {
        let deps: HashSet<usize> = vertex
            .dependencies
            .iter()
            .filter_map(|d| position.get(d).copied())
            .filter(|&d| d != i)
            .collect();
        in_degree[i] = deps.len();
        for d in deps {
            children[d].push(i);
        }
    }
    for list in &mut children {
        list.sort_unstable();
    }

    let mut ready: VecDeque<usize> = (0..unique.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; unique.len()];
    let mut ordered = Vec::with_capacity(unique.len());
    while let Some(i) = ready.pop_front() {
        emitted[i] = true;
        ordered.push(unique[i]);
        for &child in &children[i] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push_back(child);
            }
        }
    }
    // Leftovers can only come from forged hashes that form a cycle; keep
    // them so they are reported as missing.
    ordered.extend((0..unique.len()).filter(|&i| !emitted[i]).map(|i| unique[i]));
    ordered
}

#[cfg(test)]
mod tests {
    use drp_acl::AclGroup;
    use drp_crypto::ContentHasher;
    use drp_types::{now_ms, Operation, PeerId};

    use super::*;
    use crate::config::{ObjectConfig, ObjectOptions};
    use crate::object::tests::{keychain, Counter, CounterOp};

    fn shared_acl() -> ObjectAcl {
        let mut options = drp_acl::AclOptions::single_admin(PeerId::new("p1"), keychain(1).public_credential());
        options
            .admins
            .insert(PeerId::new("p2"), keychain(2).public_credential());
        ObjectAcl::new(options)
    }

    fn peer(name: &str, seed: u8, config: ObjectConfig) -> DrpObject<Counter> {
        DrpObject::new(
            ObjectOptions::new(name)
                .with_keychain(keychain(seed))
                .with_acl(shared_acl())
                .with_drp(Counter::default())
                .with_config(config),
        )
        .unwrap()
    }

    fn forged(peer: &str, op: CounterOp, deps: Vec<VertexHash>, timestamp: i64) -> Vertex {
        let peer_id = PeerId::new(peer);
        let operation = Operation::encode(Track::App, &op).unwrap();
        let hash = ContentHasher::VERTEX
            .vertex_hash(&peer_id, Some(&operation), &deps, timestamp)
            .unwrap();
        Vertex {
            hash,
            peer_id,
            operation: Some(operation),
            dependencies: deps,
            timestamp,
            signature: Vec::new(),
        }
    }

    #[test]
    fn order_batch_puts_dependencies_first() {
        let a = forged("p1", CounterOp::Add(1), vec![VertexHash::ROOT], 1);
        let b = forged("p1", CounterOp::Add(2), vec![a.hash], 2);
        let c = forged("p1", CounterOp::Add(3), vec![b.hash], 3);
        let batch = vec![c.clone(), b.clone(), a.clone(), b.clone()];
        let ordered: Vec<VertexHash> = order_batch(&batch).iter().map(|v| v.hash).collect();
        assert_eq!(ordered, vec![a.hash, b.hash, c.hash]);
    }

    #[test]
    fn merge_out_of_order_batch() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        a.call(CounterOp::Add(1)).unwrap();
        a.call(CounterOp::Add(2)).unwrap();
        a.call(CounterOp::Add(3)).unwrap();
        let mut batch = a.vertices().to_vec();
        batch.reverse();
        let (ok, missing) = b.merge(&batch).unwrap();
        assert!(ok);
        assert!(missing.is_empty());
        assert_eq!(b.drp().unwrap().value, 6);
        assert_eq!(b.frontier(), a.frontier());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        a.call(CounterOp::Add(5)).unwrap();
        let batch = a.vertices().to_vec();
        assert!(b.merge(&batch).unwrap().0);
        let count = b.vertices().len();
        assert_eq!(b.merge(&batch).unwrap(), (true, vec![]));
        assert_eq!(b.vertices().len(), count);
        assert_eq!(b.drp().unwrap().value, 5);
    }

    #[test]
    fn missing_dependency_is_reported() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let first = a.call(CounterOp::Add(1)).unwrap().unwrap();
        let second = a.call(CounterOp::Add(1)).unwrap().unwrap();
        let (ok, missing) = b.merge(&[second.clone()]).unwrap();
        assert!(!ok);
        assert_eq!(missing, vec![second.hash]);
        assert!(b.merge(&[first, second]).unwrap().0);
        assert_eq!(b.drp().unwrap().value, 2);
    }

    #[test]
    fn future_vertex_is_rejected() {
        let mut b = peer("p2", 2, ObjectConfig::default());
        let v = forged("p1", CounterOp::Add(1), vec![VertexHash::ROOT], now_ms() + 3_600_000);
        assert_eq!(b.merge(&[v.clone()]).unwrap(), (false, vec![v.hash]));
        assert_eq!(b.vertices().len(), 1);
    }

    #[test]
    fn writer_check_uses_causal_acl_state() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let outsider = forged("p3", CounterOp::Add(1), vec![VertexHash::ROOT], 10);
        assert_eq!(b.merge(&[outsider.clone()]).unwrap(), (false, vec![outsider.hash]));

        let grant = a
            .grant("p3", AclGroup::Writer, Some(keychain(3).public_credential()))
            .unwrap()
            .unwrap();
        assert!(b.merge(&[grant.clone()]).unwrap().0);
        // Still rejected: the vertex does not depend on the grant.
        assert_eq!(b.merge(&[outsider.clone()]).unwrap(), (false, vec![outsider.hash]));

        let insider = forged("p3", CounterOp::Add(1), vec![grant.hash], grant.timestamp);
        assert!(b.merge(&[insider]).unwrap().0);
        assert_eq!(b.drp().unwrap().value, 1);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let mut v = a.call(CounterOp::Add(1)).unwrap().unwrap();
        v.signature[0] ^= 0xff;
        let (ok, missing) = b.merge(&[v.clone()]).unwrap();
        assert!(!ok);
        assert_eq!(missing, vec![v.hash]);
    }

    #[test]
    fn unsigned_vertex_needs_signature_when_required() {
        let config = ObjectConfig {
            require_signatures: true,
            ..ObjectConfig::default()
        };
        let mut strict = peer("p2", 2, config);
        let mut lax = peer("p2", 2, ObjectConfig::default());
        let v = forged("p1", CounterOp::Add(1), vec![VertexHash::ROOT], 10);
        assert!(!strict.merge(&[v.clone()]).unwrap().0);
        assert!(lax.merge(&[v]).unwrap().0);
    }

    #[test]
    fn merged_acl_vertex_requires_admin() {
        let mut b = peer("p2", 2, ObjectConfig::default());
        let peer_id = PeerId::new("p9");
        let op = AclOp::Grant {
            peer_id: PeerId::new("p9"),
            group: AclGroup::Writer,
            public_key: Some(keychain(9).public_credential()),
        };
        let operation = Operation::encode(Track::Acl, &op).unwrap();
        let deps = vec![VertexHash::ROOT];
        let hash = ContentHasher::VERTEX
            .vertex_hash(&peer_id, Some(&operation), &deps, 10)
            .unwrap();
        let v = Vertex {
            hash,
            peer_id,
            operation: Some(operation),
            dependencies: deps,
            timestamp: 10,
            signature: Vec::new(),
        };
        assert_eq!(b.merge(&[v.clone()]).unwrap(), (false, vec![v.hash]));
    }

    #[test]
    fn merge_notifies_with_admitted_vertices() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.subscribe(move |_, origin, vertices| {
            sink.lock().unwrap().push((origin.to_string(), vertices.len()));
        });
        a.call(CounterOp::Add(1)).unwrap();
        b.merge(a.vertices()).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[(ORIGIN_MERGE.to_string(), 1)]);
    }

    #[test]
    fn missing_cached_state_fails_the_merge() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let shared = a.call(CounterOp::Add(1)).unwrap().unwrap();
        assert!(b.merge(&[shared.clone()]).unwrap().0);
        b.call(CounterOp::Add(10)).unwrap().unwrap();
        let side = a.call(CounterOp::Add(100)).unwrap().unwrap();
        assert!(b.merge(&[side]).unwrap().0);
        assert_eq!(b.drp().unwrap().value, 111);

        // The frontier's common ancestor loses its cached state.
        b.acl_states.remove(&shared.hash);
        let seen = Arc::new(std::sync::Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        b.subscribe(move |_, _, _| *sink.lock().unwrap() += 1);

        let remote = a.call(CounterOp::Add(1000)).unwrap().unwrap();
        let err = b.merge(&[remote.clone()]).unwrap_err();
        assert!(matches!(err, ObjectError::MissingState(h) if h == shared.hash));
        assert_eq!(err.class(), drp_types::ErrorClass::StateInconsistency);
        assert_eq!(b.drp().unwrap().value, 111);
        assert!(b.hashgraph().contains(&remote.hash));
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn finality_roster_frozen_for_merged_vertex() {
        let mut a = peer("p1", 1, ObjectConfig::default());
        let mut b = peer("p2", 2, ObjectConfig::default());
        let v = a.call(CounterOp::Add(1)).unwrap().unwrap();
        assert!(b.merge(&[v.clone()]).unwrap().0);
        assert_eq!(b.finality().get_quorum(&v.hash), Some(2));
        assert!(b.finality().can_sign(&PeerId::new("p1"), &v.hash));
        assert!(b.finality().can_sign(&PeerId::new("p2"), &v.hash));
    }
}

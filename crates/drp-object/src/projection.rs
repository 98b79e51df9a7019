//! State projection at an arbitrary set of dependencies.
//!
//! With a single dependency the cached state is returned as is. Otherwise the
//! dependencies are reduced to their lowest common ancestor, the vertices
//! between that ancestor and the dependencies are linearized once, and each
//! track replays its own operations on top of the ancestor's cached state.

use std::sync::Arc;

use tracing::debug;

use drp_acl::ObjectAcl;
use drp_types::{ReplicatedType, Track, Vertex, VertexHash};

use crate::error::{ObjectError, ObjectResult};
use crate::object::DrpObject;

/// Both track states at some point of the hashgraph.
pub(crate) struct Projection<T> {
    pub(crate) acl: Arc<ObjectAcl>,
    pub(crate) drp: Option<Arc<T>>,
}

impl<T: ReplicatedType> DrpObject<T> {
    /// Cached states right after `hash`.
    fn cached(&self, hash: &VertexHash) -> ObjectResult<Projection<T>> {
        let acl = self
            .acl_states
            .get(hash)
            .cloned()
            .ok_or(ObjectError::MissingState(*hash))?;
        let drp = match &self.drp {
            Some(_) => Some(
                self.drp_states
                    .get(hash)
                    .cloned()
                    .ok_or(ObjectError::MissingState(*hash))?,
            ),
            None => None,
        };
        Ok(Projection { acl, drp })
    }

    /// Project both tracks onto the causal past of `dependencies`.
    pub(crate) fn project(&mut self, dependencies: &[VertexHash]) -> ObjectResult<Projection<T>> {
        if let [single] = dependencies {
            return self.cached(single);
        }

        let (lca, subgraph) = self
            .hashgraph
            .lowest_common_ancestor_multiple_vertices(dependencies)?;
        let linearized = self.hashgraph.linearize_operations(&lca, &subgraph)?;
        let Projection { mut acl, mut drp } = self.cached(&lca)?;

        debug!(
            lca = %lca.short_hex(),
            subgraph = subgraph.len(),
            acl_ops = linearized.acl.len(),
            app_ops = linearized.app.len(),
            "projecting state"
        );

        for vertex in &linearized.acl {
            replay(&mut acl, vertex, Track::Acl);
        }
        if let Some(drp) = drp.as_mut() {
            for vertex in &linearized.app {
                replay(drp, vertex, Track::App);
            }
        }
        Ok(Projection { acl, drp })
    }

    /// Recompute the current states from the frontier.
    pub(crate) fn refresh_current(&mut self) -> ObjectResult<()> {
        let frontier = self.hashgraph.get_frontier().to_vec();
        let Projection { acl, drp } = self.project(&frontier)?;
        self.acl = acl;
        self.drp = drp;
        Ok(())
    }
}

/// Apply a linearized vertex's operation to `state`.
///
/// An operation that does not decode or that the data type refuses in this
/// context is skipped. Every peer replays the same sequence from the same
/// state, so every peer skips the same operations.
fn replay<R: ReplicatedType>(state: &mut Arc<R>, vertex: &Vertex, track: Track) {
    let Some(operation) = vertex.operation.as_ref() else {
        return;
    };
    let op = match operation.decode_on::<R::Op>(track) {
        Ok(op) => op,
        Err(e) => {
            debug!(vertex = %vertex.hash.short_hex(), error = %e, "skipping undecodable operation");
            return;
        }
    };
    let mut next = R::clone(state);
    match next.apply(&vertex.peer_id, op) {
        Ok(()) => *state = Arc::new(next),
        Err(e) => debug!(
            vertex = %vertex.hash.short_hex(),
            author = %vertex.peer_id,
            error = %e,
            "skipping operation rejected during replay"
        ),
    }
}

//! The replicated object: a hashgraph plus the projected state of its two
//! tracks at every vertex.
//!
//! Local calls become vertices on top of the whole frontier; remote vertices
//! arrive through [`DrpObject::merge`](crate::DrpObject::merge). For every
//! admitted vertex the object caches the ACL and application state *after*
//! that vertex. Cache entries are shared `Arc` snapshots and are never
//! invalidated, because history never changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info_span, Span};

use drp_acl::{AclGroup, AclOp, AclOptions, ObjectAcl};
use drp_crypto::{ContentHasher, Keychain};
use drp_finality::FinalityStore;
use drp_hashgraph::HashGraph;
use drp_types::{
    ConflictResolver, Operation, PeerId, PublicCredential, ReplicatedType, Track, Vertex,
    VertexHash,
};

use crate::config::{ObjectConfig, ObjectOptions};
use crate::error::{ObjectError, ObjectResult};

/// Subscriber callback: the object, the origin tag (`"callFn"` or
/// `"merge"`), and the vertices involved.
pub type ObjectCallback<T> = Box<dyn Fn(&DrpObject<T>, &str, &[Vertex]) + Send + Sync>;

/// Origin tag passed to subscribers for locally authored vertices.
pub const ORIGIN_CALL: &str = "callFn";
/// Origin tag passed to subscribers after a merge.
pub const ORIGIN_MERGE: &str = "merge";

/// A replicated object holding an application data type `T` and its ACL.
pub struct DrpObject<T: ReplicatedType> {
    id: String,
    peer_id: PeerId,
    config: ObjectConfig,
    keychain: Option<Keychain>,
    pub(crate) span: Span,
    pub(crate) hashgraph: HashGraph,
    /// ACL state after each admitted vertex.
    pub(crate) acl_states: HashMap<VertexHash, Arc<ObjectAcl>>,
    /// Application state after each admitted vertex. Empty without `T`.
    pub(crate) drp_states: HashMap<VertexHash, Arc<T>>,
    /// States at the current frontier.
    pub(crate) acl: Arc<ObjectAcl>,
    pub(crate) drp: Option<Arc<T>>,
    pub(crate) finality: FinalityStore,
    subscriptions: Vec<ObjectCallback<T>>,
}

impl<T: ReplicatedType> DrpObject<T> {
    pub fn new(options: ObjectOptions<T>) -> ObjectResult<Self> {
        let ObjectOptions {
            peer_id,
            public_credential,
            acl,
            drp,
            id,
            config,
            keychain,
        } = options;

        let acl = match (acl, public_credential) {
            (Some(acl), _) => acl,
            (None, Some(credential)) => {
                ObjectAcl::new(AclOptions::single_admin(peer_id.clone(), credential))
            }
            (None, None) => return Err(ObjectError::MissingCredentials),
        };
        let id = id.unwrap_or_else(|| derive_object_id(&peer_id));
        let span = info_span!("drp_object", peer = %peer_id, id = %short_id(&id));

        let acl = Arc::new(acl);
        let drp = drp.map(Arc::new);
        let acl_resolver: Arc<dyn ConflictResolver> = acl.clone();
        let app_resolver = drp
            .as_ref()
            .map(|d| -> Arc<dyn ConflictResolver> { d.clone() });
        let hashgraph = HashGraph::new(peer_id.clone(), acl_resolver, app_resolver);

        let mut acl_states = HashMap::new();
        acl_states.insert(VertexHash::ROOT, Arc::clone(&acl));
        let mut drp_states = HashMap::new();
        if let Some(d) = &drp {
            drp_states.insert(VertexHash::ROOT, Arc::clone(d));
        }

        span.in_scope(|| debug!(admins = acl.peers().len(), "created object"));

        Ok(Self {
            id,
            peer_id,
            finality: FinalityStore::new(config.finality.clone()),
            config,
            keychain,
            span,
            hashgraph,
            acl_states,
            drp_states,
            acl,
            drp,
            subscriptions: Vec::new(),
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    /// Application state at the current frontier.
    pub fn drp(&self) -> Option<&T> {
        self.drp.as_deref()
    }

    /// ACL state at the current frontier.
    pub fn acl(&self) -> &ObjectAcl {
        &self.acl
    }

    /// Application state right after vertex `hash`.
    pub fn drp_at(&self, hash: &VertexHash) -> Option<&T> {
        self.drp_states.get(hash).map(Arc::as_ref)
    }

    /// ACL state right after vertex `hash`.
    pub fn acl_at(&self, hash: &VertexHash) -> Option<&ObjectAcl> {
        self.acl_states.get(hash).map(Arc::as_ref)
    }

    /// Every admitted vertex, root first, in a causally consistent order.
    pub fn vertices(&self) -> &[Vertex] {
        self.hashgraph.get_all_vertices()
    }

    pub fn frontier(&self) -> &[VertexHash] {
        self.hashgraph.get_frontier()
    }

    pub fn hashgraph(&self) -> &HashGraph {
        &self.hashgraph
    }

    pub fn finality(&self) -> &FinalityStore {
        &self.finality
    }

    pub(crate) fn keychain(&self) -> Option<&Keychain> {
        self.keychain.as_ref()
    }

    // ---------------------------------------------------------------
    // Local calls
    // ---------------------------------------------------------------

    /// Apply an application operation locally.
    ///
    /// Returns the new vertex, or `None` when the operation leaves the state
    /// unchanged (no vertex is created then).
    pub fn call(&mut self, op: T::Op) -> ObjectResult<Option<Vertex>> {
        let span = self.span.clone();
        let _enter = span.enter();

        let current = self.drp.clone().ok_or(ObjectError::NoReplicatedType)?;
        if !self.acl.can_write(&self.peer_id) {
            return Err(ObjectError::PermissionDenied(self.peer_id.clone()));
        }
        let mut next = T::clone(&current);
        next.apply(&self.peer_id, op.clone())
            .map_err(|e| ObjectError::Rejected(Box::new(e)))?;
        if next == *current {
            debug!(?op, "call left state unchanged");
            return Ok(None);
        }

        let operation = Operation::encode(Track::App, &op)?;
        let acl = Arc::clone(&self.acl);
        self.commit_local(operation, acl, Some(Arc::new(next)))
            .map(Some)
    }

    /// Apply an ACL operation locally. The ACL itself enforces that the
    /// local peer is an admin.
    pub fn call_acl(&mut self, op: AclOp) -> ObjectResult<Option<Vertex>> {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut next = ObjectAcl::clone(&self.acl);
        next.apply(&self.peer_id, op.clone())?;
        if next == *self.acl {
            debug!(?op, "acl call left state unchanged");
            return Ok(None);
        }

        let operation = Operation::encode(Track::Acl, &op)?;
        let drp = self.drp.clone();
        self.commit_local(operation, Arc::new(next), drp).map(Some)
    }

    pub fn grant(
        &mut self,
        peer: impl Into<PeerId>,
        group: AclGroup,
        public_key: Option<PublicCredential>,
    ) -> ObjectResult<Option<Vertex>> {
        self.call_acl(AclOp::Grant {
            peer_id: peer.into(),
            group,
            public_key,
        })
    }

    pub fn revoke(&mut self, peer: impl Into<PeerId>, group: AclGroup) -> ObjectResult<Option<Vertex>> {
        self.call_acl(AclOp::Revoke {
            peer_id: peer.into(),
            group,
        })
    }

    /// Append a locally authored vertex whose resulting states are known.
    fn commit_local(
        &mut self,
        operation: Operation,
        acl: Arc<ObjectAcl>,
        drp: Option<Arc<T>>,
    ) -> ObjectResult<Vertex> {
        let keychain = self.keychain.as_ref();
        let vertex = self.hashgraph.add_to_frontier(operation, |hash| {
            keychain.map(|k| k.sign_vertex(hash)).unwrap_or_default()
        })?;

        self.record(vertex.hash, Arc::clone(&acl), drp.clone());
        self.acl = acl;
        self.drp = drp;

        debug!(vertex = %vertex.hash.short_hex(), op = ?vertex.operation, "local call");
        self.notify(ORIGIN_CALL, std::slice::from_ref(&vertex));
        Ok(vertex)
    }

    /// Cache the states after `hash` and freeze its finality roster.
    pub(crate) fn record(&mut self, hash: VertexHash, acl: Arc<ObjectAcl>, drp: Option<Arc<T>>) {
        self.finality.initialize_state(hash, acl.finality_signers());
        self.acl_states.insert(hash, acl);
        if let Some(drp) = drp {
            self.drp_states.insert(hash, drp);
        }
    }

    // ---------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&DrpObject<T>, &str, &[Vertex]) + Send + Sync + 'static,
    {
        self.subscriptions.push(Box::new(callback));
    }

    pub(crate) fn notify(&self, origin: &str, vertices: &[Vertex]) {
        for callback in &self.subscriptions {
            callback(self, origin, vertices);
        }
    }
}

impl<T: ReplicatedType> fmt::Debug for DrpObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrpObject")
            .field("id", &short_id(&self.id))
            .field("peer_id", &self.peer_id)
            .field("vertices", &self.hashgraph.vertex_count())
            .field("frontier", &self.hashgraph.get_frontier())
            .finish()
    }
}

/// Object id: the hex `drp-object-v1` hash of the peer id and a random nonce.
fn derive_object_id(peer_id: &PeerId) -> String {
    let nonce: u64 = rand::random();
    let mut data = peer_id.as_str().as_bytes().to_vec();
    data.extend_from_slice(&nonce.to_le_bytes());
    ContentHasher::OBJECT.hash(&data).to_hex()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

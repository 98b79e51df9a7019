//! The operation hashgraph structure and its mutation paths.
//!
//! [`HashGraph`] stores vertices in an arena (a dense `Vec`) addressed by
//! integer index, with a separate hash→index table. Dependencies are stored
//! as arena indices and a vertex is only inserted once every dependency index
//! exists, so a cycle can never be constructed.
//!
//! # Invariants
//!
//! - Index 0 holds the root vertex.
//! - Every dependency index of vertex `i` is smaller than `i`; arena order is
//!   therefore a topological order.
//! - The frontier holds exactly the vertices without known children, sorted
//!   by hash.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use drp_crypto::ContentHasher;
use drp_types::{now_ms, ConflictResolver, Operation, PeerId, Vertex, VertexHash};

use crate::error::{HashGraphError, HashGraphResult};
use crate::order::Reachability;

/// Distance from the root along the shortest dependency chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Distance {
    pub(crate) distance: u64,
    /// The dependency realizing `distance - 1`. `None` only for the root.
    pub(crate) closest_dependency: Option<usize>,
}

/// The operation hashgraph of one replicated object.
pub struct HashGraph {
    peer_id: PeerId,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) index: HashMap<VertexHash, usize>,
    /// Dependencies as arena indices (deduplicated, in vertex order).
    pub(crate) deps: Vec<Vec<usize>>,
    /// Forward-edge index: vertex -> children.
    pub(crate) children: Vec<Vec<usize>>,
    pub(crate) distances: Vec<Distance>,
    frontier: Vec<VertexHash>,
    pub(crate) acl_resolver: Arc<dyn ConflictResolver>,
    pub(crate) app_resolver: Option<Arc<dyn ConflictResolver>>,
    pub(crate) reach: Reachability,
}

impl HashGraph {
    /// Create a graph holding only the root vertex.
    pub fn new(
        peer_id: PeerId,
        acl_resolver: Arc<dyn ConflictResolver>,
        app_resolver: Option<Arc<dyn ConflictResolver>>,
    ) -> Self {
        let root = Vertex::root();
        let mut index = HashMap::new();
        index.insert(root.hash, 0);
        Self {
            peer_id,
            frontier: vec![root.hash],
            vertices: vec![root],
            index,
            deps: vec![Vec::new()],
            children: vec![Vec::new()],
            distances: vec![Distance {
                distance: 0,
                closest_dependency: None,
            }],
            acl_resolver,
            app_resolver,
            reach: Reachability::default(),
        }
    }

    /// The local peer; author of vertices created by [`HashGraph::add_to_frontier`].
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Total number of vertices, root included.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn contains(&self, hash: &VertexHash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn get_vertex(&self, hash: &VertexHash) -> Option<&Vertex> {
        self.index.get(hash).map(|&i| &self.vertices[i])
    }

    /// All vertices in insertion (topological) order, root first.
    pub fn get_all_vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// The current causal heads, sorted by hash.
    pub fn get_frontier(&self) -> &[VertexHash] {
        &self.frontier
    }

    pub fn get_dependencies(&self, hash: &VertexHash) -> HashGraphResult<&[VertexHash]> {
        self.get_vertex(hash)
            .map(|v| v.dependencies.as_slice())
            .ok_or(HashGraphError::VertexNotFound(*hash))
    }

    /// Distance from the root along the shortest dependency chain.
    pub fn distance(&self, hash: &VertexHash) -> Option<u64> {
        self.index.get(hash).map(|&i| self.distances[i].distance)
    }

    pub(crate) fn index_of(&self, hash: &VertexHash) -> HashGraphResult<usize> {
        self.index
            .get(hash)
            .copied()
            .ok_or(HashGraphError::VertexNotFound(*hash))
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Check every admission rule for `vertex` without inserting it.
    ///
    /// Rules, in order: non-empty dependencies, all dependencies known,
    /// content hash matches, timestamp not before any dependency, timestamp
    /// not after the local clock. An already-known vertex always passes.
    pub fn validate_vertex(&self, vertex: &Vertex) -> HashGraphResult<()> {
        if self.contains(&vertex.hash) {
            return Ok(());
        }
        self.check_structure(vertex)?;
        let now = now_ms();
        if vertex.timestamp > now {
            return Err(HashGraphError::FutureTimestamp {
                vertex: vertex.hash,
                timestamp: vertex.timestamp,
                now,
            });
        }
        Ok(())
    }

    fn check_structure(&self, vertex: &Vertex) -> HashGraphResult<()> {
        if vertex.dependencies.is_empty() {
            return Err(HashGraphError::DependenciesEmpty(vertex.hash));
        }
        for dep in &vertex.dependencies {
            if !self.contains(dep) {
                return Err(HashGraphError::UnknownDependency {
                    vertex: vertex.hash,
                    dependency: *dep,
                });
            }
        }

        let computed = ContentHasher::VERTEX
            .vertex_hash(
                &vertex.peer_id,
                vertex.operation.as_ref(),
                &vertex.dependencies,
                vertex.timestamp,
            )
            .map_err(|e| HashGraphError::Hashing(e.to_string()))?;
        if computed != vertex.hash {
            return Err(HashGraphError::InvalidHash {
                claimed: vertex.hash,
                computed,
            });
        }

        for dep in &vertex.dependencies {
            let dep_ts = self.index.get(dep).map_or(0, |&i| self.vertices[i].timestamp);
            if vertex.timestamp < dep_ts {
                return Err(HashGraphError::TimestampOrderViolation {
                    vertex: vertex.hash,
                    timestamp: vertex.timestamp,
                    dependency: *dep,
                    dependency_timestamp: dep_ts,
                });
            }
        }
        Ok(())
    }

    /// Admit a vertex received from a peer.
    ///
    /// Returns `Ok(false)` without changes if the hash is already known.
    pub fn add_vertex(&mut self, vertex: Vertex) -> HashGraphResult<bool> {
        if self.contains(&vertex.hash) {
            return Ok(false);
        }
        self.validate_vertex(&vertex)?;
        self.insert(vertex);
        Ok(true)
    }

    /// Author a vertex on top of everything currently known.
    ///
    /// The dependencies are the whole frontier, the timestamp is the local
    /// clock (raised to the newest dependency if that one is ahead), and
    /// `sign` receives the content hash to produce the author signature.
    /// Afterwards the frontier is exactly the new vertex.
    pub fn add_to_frontier<F>(&mut self, operation: Operation, sign: F) -> HashGraphResult<Vertex>
    where
        F: FnOnce(&VertexHash) -> Vec<u8>,
    {
        let dependencies = self.frontier.clone();
        let newest_dep = dependencies
            .iter()
            .filter_map(|h| self.get_vertex(h))
            .map(|v| v.timestamp)
            .max()
            .unwrap_or(0);
        let timestamp = now_ms().max(newest_dep);

        let hash = ContentHasher::VERTEX
            .vertex_hash(&self.peer_id, Some(&operation), &dependencies, timestamp)
            .map_err(|e| HashGraphError::Hashing(e.to_string()))?;
        let vertex = Vertex {
            hash,
            peer_id: self.peer_id.clone(),
            operation: Some(operation),
            dependencies,
            timestamp,
            signature: sign(&hash),
        };

        if !self.contains(&hash) {
            self.check_structure(&vertex)?;
            self.insert(vertex.clone());
        }
        Ok(vertex)
    }

    /// Insert a validated vertex and update edges, distance and frontier.
    fn insert(&mut self, vertex: Vertex) {
        let idx = self.vertices.len();
        let mut dep_indices: Vec<usize> = Vec::with_capacity(vertex.dependencies.len());
        for dep in &vertex.dependencies {
            if let Some(&d) = self.index.get(dep) {
                if !dep_indices.contains(&d) {
                    dep_indices.push(d);
                }
            }
        }

        let mut closest: Option<usize> = None;
        for &d in &dep_indices {
            self.children[d].push(idx);
            let better = match closest {
                None => true,
                Some(c) => self.distances[d].distance < self.distances[c].distance,
            };
            if better {
                closest = Some(d);
            }
        }
        let distance = closest.map_or(0, |c| self.distances[c].distance + 1);

        self.frontier.retain(|h| !vertex.dependencies.contains(h));
        let pos = self.frontier.binary_search(&vertex.hash).unwrap_or_else(|p| p);
        self.frontier.insert(pos, vertex.hash);

        debug!(
            vertex = %vertex.hash.short_hex(),
            author = %vertex.peer_id,
            distance,
            "added hashgraph vertex"
        );

        self.index.insert(vertex.hash, idx);
        self.deps.push(dep_indices);
        self.children.push(Vec::new());
        self.distances.push(Distance {
            distance,
            closest_dependency: closest,
        });
        self.vertices.push(vertex);
        self.reach.mark_stale();
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Structural self-check of the whole graph.
    pub fn validate(&self) -> HashGraphResult<()> {
        let n = self.vertices.len();
        if n == 0 || !self.vertices[0].is_root() {
            return Err(HashGraphError::InvariantViolation(
                "arena does not start with the root vertex".into(),
            ));
        }
        for i in 0..n {
            let hash = self.vertices[i].hash;
            if self.index.get(&hash) != Some(&i) {
                return Err(HashGraphError::InvariantViolation(format!(
                    "index entry for {} is stale",
                    hash.short_hex()
                )));
            }
            for &d in &self.deps[i] {
                if d >= i {
                    return Err(HashGraphError::InvariantViolation(format!(
                        "vertex {} depends on a later vertex",
                        hash.short_hex()
                    )));
                }
            }
            let expected = self.deps[i]
                .iter()
                .map(|&d| self.distances[d].distance + 1)
                .min()
                .unwrap_or(0);
            if self.distances[i].distance != expected {
                return Err(HashGraphError::InvariantViolation(format!(
                    "distance of {} is {} but should be {expected}",
                    hash.short_hex(),
                    self.distances[i].distance
                )));
            }
        }
        let heads: HashSet<VertexHash> = (0..n)
            .filter(|&i| self.children[i].is_empty())
            .map(|i| self.vertices[i].hash)
            .collect();
        let frontier: HashSet<VertexHash> = self.frontier.iter().copied().collect();
        if heads != frontier {
            return Err(HashGraphError::InvariantViolation(
                "frontier does not match the set of childless vertices".into(),
            ));
        }
        Ok(())
    }

    /// Causality test by graph walk. Slower than
    /// [`HashGraph::are_causally_related`]; used to cross-check the index.
    pub fn are_causally_related_using_bfs(
        &self,
        a: &VertexHash,
        b: &VertexHash,
    ) -> HashGraphResult<bool> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Ok(true);
        }
        let (later, earlier) = if ia > ib { (ia, ib) } else { (ib, ia) };

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([later]);
        while let Some(current) = queue.pop_front() {
            if current == earlier {
                return Ok(true);
            }
            for &d in &self.deps[current] {
                if d >= earlier && visited.insert(d) {
                    queue.push_back(d);
                }
            }
        }
        Ok(false)
    }
}

impl fmt::Debug for HashGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashGraph")
            .field("peer_id", &self.peer_id)
            .field("vertices", &self.vertices.len())
            .field("frontier", &self.frontier)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use drp_types::{ResolveConflictsType, SemanticsType, Track};

    use super::*;

    pub(crate) struct NopResolver;

    impl ConflictResolver for NopResolver {
        fn semantics(&self) -> SemanticsType {
            SemanticsType::Pair
        }

        fn resolve_conflicts(&self, _vertices: &[&Vertex]) -> ResolveConflictsType {
            ResolveConflictsType::nop()
        }
    }

    pub(crate) fn make_graph(peer: &str) -> HashGraph {
        HashGraph::new(PeerId::new(peer), Arc::new(NopResolver), Some(Arc::new(NopResolver)))
    }

    pub(crate) fn op(track: Track, name: &str, value: i64) -> Operation {
        Operation::new(track, name, value.to_string().into_bytes())
    }

    /// Build a signed-less vertex with a correct hash.
    pub(crate) fn make_vertex(
        peer: &str,
        operation: Operation,
        dependencies: Vec<VertexHash>,
        timestamp: i64,
    ) -> Vertex {
        let peer_id = PeerId::new(peer);
        let hash = ContentHasher::VERTEX
            .vertex_hash(&peer_id, Some(&operation), &dependencies, timestamp)
            .unwrap();
        Vertex {
            hash,
            peer_id,
            operation: Some(operation),
            dependencies,
            timestamp,
            signature: Vec::new(),
        }
    }

    /// root -> a -> {b, c} -> d
    pub(crate) fn build_diamond() -> (HashGraph, [VertexHash; 4]) {
        let mut g = make_graph("p1");
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        let b = make_vertex("p1", op(Track::App, "add", 2), vec![a.hash], 20);
        let c = make_vertex("p2", op(Track::App, "add", 3), vec![a.hash], 21);
        let d = make_vertex("p1", op(Track::App, "add", 4), vec![b.hash, c.hash], 30);
        let hashes = [a.hash, b.hash, c.hash, d.hash];
        for v in [a, b, c, d] {
            assert!(g.add_vertex(v).unwrap());
        }
        (g, hashes)
    }

    #[test]
    fn new_graph_holds_only_root() {
        let g = make_graph("p1");
        assert_eq!(g.vertex_count(), 1);
        assert_eq!(g.get_frontier(), &[VertexHash::ROOT]);
        assert!(g.validate().is_ok());
        assert_eq!(g.distance(&VertexHash::ROOT), Some(0));
    }

    #[test]
    fn add_vertex_updates_frontier_and_distance() {
        let (g, [a, b, c, d]) = build_diamond();
        assert_eq!(g.get_frontier(), &[d]);
        assert_eq!(g.distance(&a), Some(1));
        assert_eq!(g.distance(&b), Some(2));
        assert_eq!(g.distance(&c), Some(2));
        assert_eq!(g.distance(&d), Some(3));
        assert_eq!(g.get_dependencies(&d).unwrap(), &[b, c]);
        assert!(g.validate().is_ok());
    }

    #[test]
    fn concurrent_heads_form_the_frontier() {
        let mut g = make_graph("p1");
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        let b = make_vertex("p2", op(Track::App, "add", 2), vec![VertexHash::ROOT], 11);
        g.add_vertex(a.clone()).unwrap();
        g.add_vertex(b.clone()).unwrap();
        let mut expected = vec![a.hash, b.hash];
        expected.sort();
        assert_eq!(g.get_frontier(), expected.as_slice());
    }

    #[test]
    fn duplicate_vertex_is_a_no_op() {
        let mut g = make_graph("p1");
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        assert!(g.add_vertex(a.clone()).unwrap());
        assert!(!g.add_vertex(a).unwrap());
        assert_eq!(g.vertex_count(), 2);
    }

    #[test]
    fn empty_dependencies_rejected() {
        let mut g = make_graph("p1");
        let v = make_vertex("p1", op(Track::App, "add", 1), vec![], 10);
        assert_eq!(
            g.add_vertex(v.clone()),
            Err(HashGraphError::DependenciesEmpty(v.hash))
        );
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut g = make_graph("p1");
        let missing = VertexHash::from_hash([9; 32]);
        let v = make_vertex("p1", op(Track::App, "add", 1), vec![missing], 10);
        let err = g.add_vertex(v).unwrap_err();
        assert!(matches!(err, HashGraphError::UnknownDependency { dependency, .. } if dependency == missing));
        assert_eq!(err.class(), drp_types::ErrorClass::Structural);
    }

    #[test]
    fn tampered_hash_rejected() {
        let mut g = make_graph("p1");
        let mut v = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        v.timestamp = 11;
        assert!(matches!(
            g.add_vertex(v),
            Err(HashGraphError::InvalidHash { .. })
        ));
    }

    #[test]
    fn timestamp_before_dependency_rejected() {
        let mut g = make_graph("p1");
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 100);
        g.add_vertex(a.clone()).unwrap();
        let b = make_vertex("p1", op(Track::App, "add", 2), vec![a.hash], 99);
        let err = g.add_vertex(b).unwrap_err();
        assert!(matches!(err, HashGraphError::TimestampOrderViolation { dependency_timestamp: 100, .. }));
        assert_eq!(err.class(), drp_types::ErrorClass::Temporal);
    }

    #[test]
    fn future_timestamp_rejected() {
        let mut g = make_graph("p1");
        let v = make_vertex(
            "p1",
            op(Track::App, "add", 1),
            vec![VertexHash::ROOT],
            now_ms() + 60_000,
        );
        let err = g.add_vertex(v).unwrap_err();
        assert!(matches!(err, HashGraphError::FutureTimestamp { .. }));
        assert_eq!(err.class(), drp_types::ErrorClass::Temporal);
    }

    #[test]
    fn add_to_frontier_depends_on_everything_known() {
        let mut g = make_graph("p1");
        let a = make_vertex("p2", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        let b = make_vertex("p3", op(Track::App, "add", 2), vec![VertexHash::ROOT], 11);
        g.add_vertex(a.clone()).unwrap();
        g.add_vertex(b.clone()).unwrap();

        let v = g
            .add_to_frontier(op(Track::App, "add", 3), |h| h.as_bytes().to_vec())
            .unwrap();
        assert_eq!(v.dependencies.len(), 2);
        assert!(v.dependencies.contains(&a.hash));
        assert!(v.dependencies.contains(&b.hash));
        assert_eq!(v.peer_id.as_str(), "p1");
        assert_eq!(v.signature, v.hash.as_bytes().to_vec());
        assert_eq!(g.get_frontier(), &[v.hash]);
        assert!(g.validate().is_ok());
    }

    #[test]
    fn bfs_causality_on_diamond() {
        let (g, [a, b, c, d]) = build_diamond();
        assert!(g.are_causally_related_using_bfs(&a, &d).unwrap());
        assert!(g.are_causally_related_using_bfs(&d, &VertexHash::ROOT).unwrap());
        assert!(!g.are_causally_related_using_bfs(&b, &c).unwrap());
        assert!(g
            .are_causally_related_using_bfs(&b, &VertexHash::from_hash([1; 32]))
            .is_err());
    }
}

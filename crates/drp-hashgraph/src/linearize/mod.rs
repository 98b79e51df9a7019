//! Linearization of concurrent operations.
//!
//! Starting from a common ancestor, the vertices causally after it are put
//! in a deterministic topological order and each track is then resolved by
//! its own [`ConflictResolver`]: pairwise ([`pair`]) or wave-at-a-time
//! ([`multi`]), depending on the resolver's declared semantics. Pairs and
//! waves are only ever formed between vertices of the same track.

pub mod multi;
pub mod pair;

use std::collections::HashSet;
use std::sync::Arc;

use drp_types::{ConflictResolver, SemanticsType, Track, Vertex, VertexHash};

use crate::error::HashGraphResult;
use crate::graph::HashGraph;

/// Linearized operation vertices of both tracks, in replay order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearizedOperations {
    pub acl: Vec<Vertex>,
    pub app: Vec<Vertex>,
}

impl LinearizedOperations {
    pub fn track(&self, track: Track) -> &[Vertex] {
        match track {
            Track::Acl => &self.acl,
            Track::App => &self.app,
        }
    }
}

impl HashGraph {
    /// Linearize every vertex of `subgraph` after `origin`, per track.
    ///
    /// The origin itself, no-op vertices and vertices without an operation
    /// are never part of the output. The application track is empty when no
    /// application resolver is configured.
    pub fn linearize_operations(
        &mut self,
        origin: &VertexHash,
        subgraph: &HashSet<VertexHash>,
    ) -> HashGraphResult<LinearizedOperations> {
        let origin_idx = self.index_of(origin)?;
        self.refresh_reachability();
        let filter = self.indices_of(subgraph);
        let order = self.kahn(origin_idx, Some(&filter));

        let acl_resolver = Arc::clone(&self.acl_resolver);
        let acl = self.linearize_track(&order, origin_idx, Track::Acl, acl_resolver.as_ref());
        let app = match self.app_resolver.clone() {
            Some(resolver) => self.linearize_track(&order, origin_idx, Track::App, resolver.as_ref()),
            None => Vec::new(),
        };
        Ok(LinearizedOperations { acl, app })
    }

    fn linearize_track(
        &self,
        order: &[usize],
        origin: usize,
        track: Track,
        resolver: &dyn ConflictResolver,
    ) -> Vec<Vertex> {
        let order: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&i| i != origin && self.vertices[i].track() == Some(track))
            .collect();
        let kept = match resolver.semantics() {
            SemanticsType::Pair => pair::linearize(self, order, resolver),
            SemanticsType::Multiple => multi::linearize(self, order, resolver),
        };
        kept.into_iter().map(|i| self.vertices[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use drp_types::{ActionType, PeerId, ResolveConflictsType};

    use super::*;
    use crate::graph::tests::{make_vertex, op, NopResolver};

    /// Pair resolver: concurrent "remove" loses against anything.
    struct RemoveLoses;

    impl ConflictResolver for RemoveLoses {
        fn semantics(&self) -> SemanticsType {
            SemanticsType::Pair
        }

        fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
            let name = |v: &Vertex| v.operation.as_ref().map(|o| o.op_type.clone());
            match (name(vertices[0]).as_deref(), name(vertices[1]).as_deref()) {
                (Some("remove"), Some("add")) => ResolveConflictsType::new(ActionType::DropLeft),
                (Some("add"), Some("remove")) => ResolveConflictsType::new(ActionType::DropRight),
                _ => ResolveConflictsType::nop(),
            }
        }
    }

    fn two_track_graph() -> (HashGraph, Vec<Vertex>) {
        let mut g = HashGraph::new(
            PeerId::new("p1"),
            Arc::new(NopResolver),
            Some(Arc::new(RemoveLoses)),
        );
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        let r = make_vertex("p2", op(Track::App, "remove", 1), vec![VertexHash::ROOT], 10);
        let g1 = make_vertex("p3", op(Track::Acl, "grant", 7), vec![VertexHash::ROOT], 10);
        for v in [&a, &r, &g1] {
            g.add_vertex(v.clone()).unwrap();
        }
        (g, vec![a, r, g1])
    }

    #[test]
    fn tracks_are_linearized_separately() {
        let (mut g, vs) = two_track_graph();
        let frontier = g.get_frontier().to_vec();
        let (lca, visited) = g.lowest_common_ancestor_multiple_vertices(&frontier).unwrap();
        assert_eq!(lca, VertexHash::ROOT);

        let ops = g.linearize_operations(&lca, &visited).unwrap();
        assert_eq!(ops.app, vec![vs[0].clone()]);
        assert_eq!(ops.acl, vec![vs[2].clone()]);
        assert_eq!(ops.track(Track::Acl).len(), 1);
    }

    #[test]
    fn no_app_resolver_yields_empty_app_track() {
        let mut g = HashGraph::new(PeerId::new("p1"), Arc::new(NopResolver), None);
        let a = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        g.add_vertex(a.clone()).unwrap();
        let ops = g
            .linearize_operations(&VertexHash::ROOT, &HashSet::from([VertexHash::ROOT, a.hash]))
            .unwrap();
        assert!(ops.app.is_empty());
    }

    #[test]
    fn origin_is_excluded() {
        let (mut g, vs) = two_track_graph();
        let subgraph = HashSet::from([vs[0].hash]);
        let ops = g.linearize_operations(&vs[0].hash, &subgraph).unwrap();
        assert!(ops.app.is_empty());
        assert!(ops.acl.is_empty());
    }
}

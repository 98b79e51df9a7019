//! Topological ordering and the reachability index.
//!
//! The reachability index assigns every vertex a position in a topological
//! order and stores, per vertex, a [`BitSet`] of the positions of itself and
//! all its ancestors. Two vertices are causally related iff one's bit is set
//! in the other's set.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use tracing::debug;

use drp_types::VertexHash;

use crate::bitset::BitSet;
use crate::error::{HashGraphError, HashGraphResult};
use crate::graph::HashGraph;

const INITIAL_CAPACITY: usize = 64;

/// Lazily maintained reachability bitsets.
#[derive(Debug, Default)]
pub(crate) struct Reachability {
    /// Arena index -> position in the indexed order.
    position: Vec<Option<usize>>,
    /// Arena index -> ancestors-or-self bitset over positions.
    bitsets: Vec<Option<BitSet>>,
    /// Number of positions handed out.
    next_position: usize,
    capacity: usize,
    /// Arena prefix covered by the index.
    indexed: usize,
    /// `false` until built over the whole graph, and again after a
    /// subgraph-scoped rebuild.
    complete: bool,
    stale: bool,
}

impl Reachability {
    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Rebuild from scratch over `order` (arena indices, topological).
    fn rebuild(&mut self, order: &[usize], deps: &[Vec<usize>], arena_len: usize, complete: bool) {
        let mut capacity = INITIAL_CAPACITY;
        while capacity < order.len() {
            capacity *= 2;
        }
        self.position = vec![None; arena_len];
        self.bitsets = vec![None; arena_len];
        self.capacity = capacity;
        self.next_position = 0;
        for &v in order {
            self.index_vertex(v, deps);
        }
        self.indexed = arena_len;
        self.complete = complete;
        self.stale = false;
    }

    /// Extend a complete index with the vertices appended since.
    fn extend(&mut self, deps: &[Vec<usize>], arena_len: usize) {
        self.position.resize(arena_len, None);
        self.bitsets.resize(arena_len, None);
        for v in self.indexed..arena_len {
            self.index_vertex(v, deps);
        }
        self.indexed = arena_len;
        self.stale = false;
    }

    fn index_vertex(&mut self, v: usize, deps: &[Vec<usize>]) {
        let pos = self.next_position;
        self.next_position += 1;
        if pos >= self.capacity {
            let mut capacity = self.capacity.max(1);
            while capacity <= pos {
                capacity *= 2;
            }
            self.capacity = capacity;
            for bs in self.bitsets.iter_mut().flatten() {
                bs.grow(capacity);
            }
        }

        let mut bits = BitSet::new(self.capacity);
        for &d in &deps[v] {
            if let Some(dep_bits) = &self.bitsets[d] {
                bits.or_assign(dep_bits);
            }
        }
        bits.set(pos, true);
        self.position[v] = Some(pos);
        self.bitsets[v] = Some(bits);
    }

    /// `true` iff `ancestor` is `v` or one of its ancestors.
    fn reaches(&self, v: usize, ancestor: usize) -> bool {
        match (self.bitsets.get(v), self.position.get(ancestor)) {
            (Some(Some(bits)), Some(Some(pos))) => bits.get(*pos),
            _ => false,
        }
    }
}

impl HashGraph {
    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// Kahn's algorithm over the descendants of `origin`, optionally
    /// restricted to `subgraph`.
    ///
    /// In-degrees count only edges whose endpoints are both in scope. Among
    /// ready vertices the smallest hash goes first, so the order depends on
    /// the vertex set only. With `update_bitsets`, the reachability index is
    /// rebuilt over the returned order.
    pub fn topological_sort(
        &mut self,
        update_bitsets: bool,
        origin: &VertexHash,
        subgraph: Option<&HashSet<VertexHash>>,
    ) -> HashGraphResult<Vec<VertexHash>> {
        let origin_idx = self.index_of(origin)?;
        let filter = subgraph.map(|s| self.indices_of(s));
        let order = self.kahn(origin_idx, filter.as_ref());

        if update_bitsets {
            let complete = origin.is_root() && subgraph.is_none();
            self.reach
                .rebuild(&order, &self.deps, self.vertices.len(), complete);
            debug!(
                vertices = order.len(),
                complete,
                capacity = self.reach.capacity,
                "rebuilt reachability index"
            );
        }
        Ok(order.iter().map(|&i| self.vertices[i].hash).collect())
    }

    pub(crate) fn indices_of(&self, hashes: &HashSet<VertexHash>) -> HashSet<usize> {
        hashes.iter().filter_map(|h| self.index.get(h).copied()).collect()
    }

    pub(crate) fn kahn(&self, origin: usize, filter: Option<&HashSet<usize>>) -> Vec<usize> {
        let in_scope = |i: usize| filter.map_or(true, |f| f.contains(&i));

        // Descendants of origin reachable without leaving the filter.
        let mut scope = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);
        while let Some(v) = queue.pop_front() {
            for &c in &self.children[v] {
                if in_scope(c) && scope.insert(c) {
                    queue.push_back(c);
                }
            }
        }

        let mut in_degree: HashMap<usize, usize> = scope
            .iter()
            .map(|&v| {
                let deg = if v == origin {
                    0
                } else {
                    self.deps[v].iter().filter(|d| scope.contains(*d)).count()
                };
                (v, deg)
            })
            .collect();

        let mut ready = BinaryHeap::from([Reverse((self.vertices[origin].hash, origin))]);
        let mut order = Vec::with_capacity(scope.len());
        while let Some(Reverse((_, v))) = ready.pop() {
            order.push(v);
            for &c in &self.children[v] {
                if let Some(deg) = in_degree.get_mut(&c) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse((self.vertices[c].hash, c)));
                    }
                }
            }
        }
        order
    }

    // ---------------------------------------------------------------
    // Causality
    // ---------------------------------------------------------------

    /// Bring the reachability index up to date with the vertex set.
    pub(crate) fn refresh_reachability(&mut self) {
        if !self.reach.stale && self.reach.complete {
            return;
        }
        if self.reach.complete {
            self.reach.extend(&self.deps, self.vertices.len());
        } else {
            let order = self.kahn(0, None);
            self.reach
                .rebuild(&order, &self.deps, self.vertices.len(), true);
        }
    }

    /// Causality test on arena indices against a fresh index.
    pub(crate) fn related(&self, a: usize, b: usize) -> bool {
        a == b || self.reach.reaches(a, b) || self.reach.reaches(b, a)
    }

    /// `true` iff one vertex is an ancestor of the other (or they are equal).
    pub fn are_causally_related(&mut self, a: &VertexHash, b: &VertexHash) -> HashGraphResult<bool> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.refresh_reachability();
        if self.reach.position.get(ia).copied().flatten().is_none()
            || self.reach.position.get(ib).copied().flatten().is_none()
        {
            return Err(HashGraphError::InvariantViolation(
                "reachability index does not cover the vertex set".into(),
            ));
        }
        Ok(self.related(ia, ib))
    }

    /// Current capacity of the reachability bitsets.
    pub fn current_bitset_size(&self) -> usize {
        self.reach.capacity
    }
}

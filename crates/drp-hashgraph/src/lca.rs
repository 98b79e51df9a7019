//! Lowest common ancestor over the DAG.
//!
//! The walk follows each vertex's closest dependency (the one on its shortest
//! path to the root). At every step the cursor farther from the root moves
//! down; any other dependency of the vertex it leaves is queued as a further
//! target so that no causal history is skipped. The visited set is therefore
//! closed: every visited vertex except the final ancestor has all of its
//! dependencies visited as well, which makes it exactly the history that must
//! be replayed on top of the ancestor.

use std::collections::HashSet;

use drp_types::VertexHash;

use crate::error::{HashGraphError, HashGraphResult};
use crate::graph::HashGraph;

impl HashGraph {
    /// Reduce `hashes` to one common ancestor by repeated pairwise walks.
    ///
    /// Returns the ancestor and every vertex visited on the way (ancestor and
    /// inputs included). The visited set is the subgraph to linearize from
    /// the ancestor.
    pub fn lowest_common_ancestor_multiple_vertices(
        &self,
        hashes: &[VertexHash],
    ) -> HashGraphResult<(VertexHash, HashSet<VertexHash>)> {
        let Some((first, rest)) = hashes.split_first() else {
            return Err(HashGraphError::EmptyDependencySet);
        };
        let mut lca = self.index_of(first)?;
        let mut targets = rest
            .iter()
            .map(|h| self.index_of(h))
            .collect::<HashGraphResult<Vec<usize>>>()?;

        let mut visited = HashSet::from([lca]);
        while let Some(target) = targets.pop() {
            lca = self.lowest_common_ancestor_pair(lca, target, &mut visited, &mut targets)?;
        }

        let visited = visited.into_iter().map(|i| self.vertices[i].hash).collect();
        Ok((self.vertices[lca].hash, visited))
    }

    fn lowest_common_ancestor_pair(
        &self,
        a: usize,
        b: usize,
        visited: &mut HashSet<usize>,
        targets: &mut Vec<usize>,
    ) -> HashGraphResult<usize> {
        visited.insert(a);
        visited.insert(b);
        let (mut left, mut right) = (a, b);

        while left != right {
            let cursor = if self.distances[left].distance > self.distances[right].distance {
                &mut left
            } else {
                &mut right
            };
            let Some(closest) = self.distances[*cursor].closest_dependency else {
                return Err(HashGraphError::InvariantViolation(format!(
                    "vertex {} has no closest dependency",
                    self.vertices[*cursor].hash.short_hex()
                )));
            };
            for &dep in &self.deps[*cursor] {
                if dep != closest && !visited.contains(&dep) {
                    targets.push(dep);
                }
                visited.insert(dep);
            }
            *cursor = closest;
        }
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use drp_types::Track;

    use super::*;
    use crate::graph::tests::{build_diamond, make_graph, make_vertex, op};

    #[test]
    fn empty_input_is_rejected() {
        let g = make_graph("p1");
        assert_eq!(
            g.lowest_common_ancestor_multiple_vertices(&[]),
            Err(HashGraphError::EmptyDependencySet)
        );
    }

    #[test]
    fn single_vertex_is_its_own_ancestor() {
        let (g, [_, b, _, _]) = build_diamond();
        let (lca, visited) = g.lowest_common_ancestor_multiple_vertices(&[b]).unwrap();
        assert_eq!(lca, b);
        assert_eq!(visited, HashSet::from([b]));
    }

    #[test]
    fn diamond_branches_meet_at_fork() {
        let (g, [a, b, c, _]) = build_diamond();
        let (lca, visited) = g.lowest_common_ancestor_multiple_vertices(&[b, c]).unwrap();
        assert_eq!(lca, a);
        assert_eq!(visited, HashSet::from([a, b, c]));
    }

    #[test]
    fn ancestor_of_other_input_is_the_lca() {
        let (g, [a, _, _, d]) = build_diamond();
        let (lca, _) = g.lowest_common_ancestor_multiple_vertices(&[d, a]).unwrap();
        assert_eq!(lca, a);
    }

    #[test]
    fn side_dependencies_pull_the_ancestor_down() {
        // root -> x, root -> y, h1 = {x, y}, h2 = {x}
        let mut g = make_graph("p1");
        let x = make_vertex("p1", op(Track::App, "add", 1), vec![VertexHash::ROOT], 10);
        let y = make_vertex("p2", op(Track::App, "add", 2), vec![VertexHash::ROOT], 10);
        let h1 = make_vertex("p1", op(Track::App, "add", 3), vec![x.hash, y.hash], 20);
        let h2 = make_vertex("p3", op(Track::App, "add", 4), vec![x.hash], 20);
        for v in [&x, &y, &h1, &h2] {
            g.add_vertex(v.clone()).unwrap();
        }
        let (lca, visited) = g
            .lowest_common_ancestor_multiple_vertices(&[h1.hash, h2.hash])
            .unwrap();
        assert_eq!(lca, VertexHash::ROOT);
        for h in [x.hash, y.hash, h1.hash, h2.hash, VertexHash::ROOT] {
            assert!(visited.contains(&h));
        }
    }

    #[test]
    fn visited_set_is_closed_down_to_the_ancestor() {
        // Two long concurrent chains with cross links.
        let mut g = make_graph("p1");
        let mut left = VertexHash::ROOT;
        let mut right = VertexHash::ROOT;
        for i in 0..6 {
            let deps_l = if i % 3 == 2 { vec![left, right] } else { vec![left] };
            let l = make_vertex("l", op(Track::App, "add", i), deps_l, 10 + i);
            let r = make_vertex("r", op(Track::App, "add", 100 + i), vec![right], 10 + i);
            left = l.hash;
            right = r.hash;
            g.add_vertex(l).unwrap();
            g.add_vertex(r).unwrap();
        }
        let (lca, visited) = g
            .lowest_common_ancestor_multiple_vertices(&[left, right])
            .unwrap();
        for h in &visited {
            if *h == lca {
                continue;
            }
            for dep in g.get_dependencies(h).unwrap() {
                assert!(visited.contains(dep), "dependency of {h:?} not visited");
            }
        }
    }
}

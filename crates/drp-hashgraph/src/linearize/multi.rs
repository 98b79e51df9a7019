//! Wave linearization.
//!
//! For each surviving anchor in topological order, the later vertices that
//! are concurrent with every member collected so far join the anchor's wave.
//! A wave of two or more is handed to the resolver in one call; a `Drop`
//! answer removes the listed vertices, any other answer keeps the wave.

use std::collections::HashMap;

use drp_types::{ActionType, ConflictResolver, Vertex};

use crate::graph::HashGraph;

pub(crate) fn linearize(
    graph: &HashGraph,
    order: Vec<usize>,
    resolver: &dyn ConflictResolver,
) -> Vec<usize> {
    let position: HashMap<_, usize> = order
        .iter()
        .enumerate()
        .map(|(pos, &v)| (graph.vertices[v].hash, pos))
        .collect();
    let mut dropped = vec![false; order.len()];
    let mut result = Vec::with_capacity(order.len());

    for i in 0..order.len() {
        if dropped[i] {
            continue;
        }

        let mut wave = vec![i];
        for j in i + 1..order.len() {
            if !dropped[j] && wave.iter().all(|&w| !graph.related(order[w], order[j])) {
                wave.push(j);
            }
        }

        if wave.len() > 1 {
            let vertices: Vec<&Vertex> = wave.iter().map(|&w| &graph.vertices[order[w]]).collect();
            let resolved = resolver.resolve_conflicts(&vertices);
            if resolved.action == ActionType::Drop {
                for hash in &resolved.vertices {
                    if let Some(&pos) = position.get(hash) {
                        if wave.contains(&pos) {
                            dropped[pos] = true;
                        }
                    }
                }
            }
        }

        if !dropped[i] {
            result.push(order[i]);
        }
    }
    result
}

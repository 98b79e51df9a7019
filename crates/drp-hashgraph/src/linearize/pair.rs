//! Pairwise linearization.
//!
//! Each surviving vertex in topological order becomes the anchor and is
//! compared with every later concurrent vertex of the same track:
//!
//! - `DropLeft` drops the anchor and ends its scan.
//! - `DropRight` drops the later vertex and continues.
//! - `Swap` hoists the later vertex in front of the anchor, which is emitted
//!   next, and ends the scan. The hoist is refused (treated as `Nop`) when a
//!   vertex between the two is an ancestor of the hoisted one.
//! - `Nop` keeps both.

use drp_types::{ActionType, ConflictResolver};

use crate::graph::HashGraph;

pub(crate) fn linearize(
    graph: &HashGraph,
    mut order: Vec<usize>,
    resolver: &dyn ConflictResolver,
) -> Vec<usize> {
    let mut dropped = vec![false; order.len()];
    let mut result = Vec::with_capacity(order.len());

    let mut i = 0;
    while i < order.len() {
        if dropped[i] {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < order.len() {
            if dropped[j] || graph.related(order[i], order[j]) {
                j += 1;
                continue;
            }
            let left = &graph.vertices[order[i]];
            let right = &graph.vertices[order[j]];
            match resolver.resolve_conflicts(&[left, right]).action {
                ActionType::DropLeft => {
                    dropped[i] = true;
                    break;
                }
                ActionType::DropRight => {
                    dropped[j] = true;
                    j += 1;
                }
                ActionType::Swap if can_hoist(graph, &order, &dropped, i, j) => {
                    order[i..=j].rotate_right(1);
                    dropped[i..=j].rotate_right(1);
                    break;
                }
                ActionType::Swap | ActionType::Nop | ActionType::Drop => j += 1,
            }
        }

        if !dropped[i] {
            result.push(order[i]);
        }
        i += 1;
    }
    result
}

/// `order[j]` may move in front of `order[i]` only if nothing in between is
/// one of its ancestors.
fn can_hoist(graph: &HashGraph, order: &[usize], dropped: &[bool], i: usize, j: usize) -> bool {
    (i + 1..j).all(|k| dropped[k] || !graph.related(order[k], order[j]))
}

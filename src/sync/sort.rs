//! Dependency-first ordering of an import graph.
//!
//! Depth-first topological sort emitting vertices in post-order, so every
//! dependency comes before the records that reference it.
//!
//! Tie-break: roots are visited in vertex insertion order (the order stable
//! ids were first seen while scanning), and each vertex's dependencies in
//! the order they were embedded. An edge back to a vertex still on the DFS
//! stack closes a cycle; it is ignored and the sort continues, so every
//! vertex is still emitted exactly once.

use tracing::debug;

use crate::sync::graph::{ImportContext, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Order all vertices of the graph, dependencies first.
#[must_use]
pub fn dependency_order(ctx: &ImportContext) -> Vec<VertexId> {
    let mut marks = vec![Mark::Unvisited; ctx.len()];
    let mut order = Vec::with_capacity(ctx.len());
    // (vertex, index of the next dependency to visit)
    let mut stack: Vec<(VertexId, usize)> = Vec::new();

    for root in 0..ctx.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (vertex, next) = *top;
            if let Some(&dep) = ctx.dependencies(vertex).get(next) {
                top.1 += 1;
                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::OnStack;
                        stack.push((dep, 0));
                    }
                    Mark::OnStack => {
                        debug!(
                            from = ctx.stable_id(vertex),
                            to = ctx.stable_id(dep),
                            "Ignoring dependency cycle edge"
                        );
                    }
                    Mark::Done => {}
                }
            } else {
                marks[vertex] = Mark::Done;
                order.push(vertex);
                stack.pop();
            }
        }
    }

    order
}

/// Stable ids in dependency-first order.
#[must_use]
pub fn sorted_stable_ids(ctx: &ImportContext) -> Vec<&str> {
    dependency_order(ctx)
        .into_iter()
        .map(|v| ctx.stable_id(v))
        .collect()
}

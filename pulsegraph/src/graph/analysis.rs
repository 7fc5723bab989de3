//! Graph analysis utilities for the dataflow graph.
//!
//! Ranking determines the order the scheduler re-runs nodes in: every
//! node ranks strictly above all of its upstream sources.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::error::EngineError;

/// Assign a topological rank to every node, deterministic in insertion
/// order for independent nodes. Returns a graph error if the edges form
/// a cycle.
pub fn topological_ranks(
    order: &[Uuid],
    targets: &HashMap<Uuid, Vec<Uuid>>,
) -> Result<HashMap<Uuid, u32>, EngineError> {
    let mut indegree: HashMap<Uuid, usize> = order.iter().map(|id| (*id, 0)).collect();
    for outgoing in targets.values() {
        for target in outgoing {
            if let Some(count) = indegree.get_mut(target) {
                *count += 1;
            }
        }
    }

    let mut ready: VecDeque<Uuid> = order
        .iter()
        .copied()
        .filter(|id| indegree.get(id) == Some(&0))
        .collect();

    let mut ranks = HashMap::new();
    let mut next_rank = 0u32;

    while let Some(id) = ready.pop_front() {
        ranks.insert(id, next_rank);
        next_rank += 1;
        if let Some(outgoing) = targets.get(&id) {
            for target in outgoing {
                if let Some(count) = indegree.get_mut(target) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*target);
                    }
                }
            }
        }
    }

    if ranks.len() != order.len() {
        return Err(EngineError::graph(
            "Cycle detected: the dataflow graph must be a DAG",
        ));
    }

    Ok(ranks)
}

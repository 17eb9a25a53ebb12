use crate::core::models::cycle::{Cycle, CycleKey, MIN_CYCLE_EDGES};
use crate::core::models::graph::PerturbationGraph;
use crate::core::models::ids::NodeId;
use crate::engine::progress::{Progress, ProgressReporter};
use slotmap::SecondaryMap;
use std::collections::HashSet;
use tracing::{info, instrument, trace};

/// Depth-first enumeration of the simple cycles of a network.
///
/// Every node is used as a traversal root in insertion order. A root that has finished
/// its traversal is retired and never entered again, so a loop is only found from the
/// first of its nodes to be processed. Remaining duplicates (the two directions of the
/// same loop from one root) are dropped by canonical key.
struct CycleSearch<'g> {
    graph: &'g PerturbationGraph,
    retired: HashSet<NodeId>,
    /// Scratch state of the current traversal; rebuilt for every root.
    visited: SecondaryMap<NodeId, bool>,
    path: Vec<NodeId>,
    seen: HashSet<CycleKey>,
    cycles: Vec<Cycle>,
}

impl<'g> CycleSearch<'g> {
    fn new(graph: &'g PerturbationGraph) -> Self {
        Self {
            graph,
            retired: HashSet::new(),
            visited: SecondaryMap::new(),
            path: Vec::new(),
            seen: HashSet::new(),
            cycles: Vec::new(),
        }
    }

    fn traverse_from(&mut self, root: NodeId) {
        self.visited.clear();
        for &id in self.graph.node_ids() {
            self.visited.insert(id, self.retired.contains(&id));
        }
        self.path.clear();
        self.path.push(root);

        self.extend(root, root);

        self.retired.insert(root);
    }

    fn extend(&mut self, root: NodeId, current: NodeId) {
        let graph = self.graph;
        for &next in graph.neighbors(current) {
            if next == root {
                if self.path.len() >= MIN_CYCLE_EDGES {
                    self.record(root);
                }
                continue;
            }
            if self.visited.get(next).copied().unwrap_or(true) {
                continue;
            }

            self.visited.insert(next, true);
            self.path.push(next);
            self.extend(root, next);
            self.path.pop();
            self.visited.insert(next, false);
        }
    }

    fn record(&mut self, root: NodeId) {
        let mut walk = self.path.clone();
        walk.push(root);
        let Some(cycle) = Cycle::new(walk) else {
            return;
        };

        let key = cycle.canonical_key(self.graph);
        if self.seen.contains(&key) {
            trace!(key = %key, "Skipping duplicate cycle.");
            return;
        }
        trace!(key = %key, edges = cycle.edge_count(), "Found cycle.");
        self.seen.insert(key);
        self.cycles.push(cycle);
    }
}

/// Enumerates the distinct simple cycles of `graph` with at least three edges, in
/// discovery order. Each cycle keeps the literal walk it was found along.
#[instrument(skip_all, name = "cycle_search_task")]
pub fn run(graph: &PerturbationGraph, reporter: &ProgressReporter) -> Vec<Cycle> {
    info!(nodes = graph.node_count(), "Searching for cycles.");
    reporter.report(Progress::TaskStart {
        total_steps: graph.node_count() as u64,
    });

    let mut search = CycleSearch::new(graph);
    for &root in graph.node_ids() {
        search.traverse_from(root);
        reporter.report(Progress::TaskIncrement);
    }

    reporter.report(Progress::TaskFinish);
    info!(cycles = search.cycles.len(), "Cycle search complete.");
    search.cycles
}

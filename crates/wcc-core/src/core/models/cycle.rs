use super::graph::PerturbationGraph;
use super::ids::NodeId;
use itertools::Itertools;

/// Fewest edges a closed walk needs before it counts as a cycle.
pub const MIN_CYCLE_EDGES: usize = 3;

/// A closed walk through the network that starts and ends on the same node.
///
/// The walk is kept exactly as discovered, so `walk()[0] == walk()[len - 1]` and the
/// direction of travel determines the sign of every ddG summed along it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    walk: Vec<NodeId>,
}

/// Order-insensitive identity of a cycle: the sorted labels of its distinct nodes.
///
/// Rotations and reflections of one loop share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleKey(Vec<String>);

impl std::fmt::Display for CycleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.concat())
    }
}

impl Cycle {
    /// Wraps a closed walk. Returns `None` if the walk is not closed or has fewer than
    /// [`MIN_CYCLE_EDGES`] edges.
    pub fn new(walk: Vec<NodeId>) -> Option<Self> {
        if walk.len() < MIN_CYCLE_EDGES + 1 || walk.first() != walk.last() {
            return None;
        }
        Some(Self { walk })
    }

    pub fn walk(&self) -> &[NodeId] {
        &self.walk
    }

    pub fn edge_count(&self) -> usize {
        self.walk.len() - 1
    }

    /// Directed edges in walk order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.walk.iter().copied().tuple_windows()
    }

    pub fn canonical_key(&self, graph: &PerturbationGraph) -> CycleKey {
        let labels = self.walk[..self.walk.len() - 1]
            .iter()
            .filter_map(|&id| graph.label(id))
            .map(str::to_string)
            .sorted()
            .collect();
        CycleKey(labels)
    }

    /// Labels along the walk, including the closing return to the start.
    pub fn labels<'g>(&self, graph: &'g PerturbationGraph) -> Vec<&'g str> {
        self.walk.iter().filter_map(|&id| graph.label(id)).collect()
    }
}

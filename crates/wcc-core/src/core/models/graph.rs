use super::ids::{NodeId, PairId};
use rust_decimal::Decimal;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Pair '{label}-{label}' connects a molecule to itself")]
    SelfLoop { label: String },
    #[error("Pair '{from}-{to}' is already present in the network")]
    DuplicatePair { from: String, to: String },
    #[error("Pair '{from}-{to}' has {found} replicate column(s), expected {expected}")]
    InconsistentReplicates {
        from: String,
        to: String,
        expected: usize,
        found: usize,
    },
    #[error("Pair '{from}-{to}' has no weight columns")]
    NoWeights { from: String, to: String },
}

/// Direction in which a pair is traversed relative to how it was first recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Traversed from the recorded source to the recorded target.
    Forward,
    /// Traversed from the recorded target back to the recorded source.
    Reverse,
}

impl Orientation {
    #[inline]
    pub fn sign(self) -> Decimal {
        match self {
            Orientation::Forward => Decimal::ONE,
            Orientation::Reverse => Decimal::NEGATIVE_ONE,
        }
    }
}

/// A molecule in the perturbation network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub label: String,
}

/// An unordered pair of molecules together with its measurements.
///
/// Values are stored once, in the source-to-target direction. The reverse direction is
/// always read as the negation of the stored value, so `corrected(a, b) == -corrected(b, a)`
/// holds structurally rather than by bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    source: NodeId,
    target: NodeId,
    weights: Vec<Decimal>,
    corrected: Vec<Decimal>,
    /// Lower bound on the pair error taken from the measurement itself, if any.
    error_floor: Option<Decimal>,
    pair_error: Option<Decimal>,
}

impl Pair {
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn replicate_count(&self) -> usize {
        self.weights.len()
    }

    pub fn weight(&self, replicate: usize) -> Option<Decimal> {
        self.weights.get(replicate).copied()
    }

    /// The corrected ddG for `replicate` in the source-to-target direction.
    pub fn corrected(&self, replicate: usize) -> Option<Decimal> {
        self.corrected.get(replicate).copied()
    }

    /// The corrected ddG for `replicate` read in the given direction.
    pub fn corrected_along(&self, orientation: Orientation, replicate: usize) -> Option<Decimal> {
        self.corrected(replicate).map(|value| value * orientation.sign())
    }

    /// `None` until a qualifying cycle has produced an estimate.
    pub fn pair_error(&self) -> Option<Decimal> {
        self.pair_error
    }

    pub fn error_floor(&self) -> Option<Decimal> {
        self.error_floor
    }

    /// Subtracts `amount` from the corrected ddG read in `orientation` and returns the
    /// new stored value.
    ///
    /// Returns `None`, leaving the value untouched, when the replicate index is out of
    /// range or the result does not fit in a `Decimal`.
    pub(crate) fn correct(
        &mut self,
        orientation: Orientation,
        replicate: usize,
        amount: Decimal,
    ) -> Option<Decimal> {
        let value = self.corrected.get_mut(replicate)?;
        let updated = value.checked_sub(amount.checked_mul(orientation.sign())?)?;
        *value = updated;
        Some(updated)
    }
}

/// A perturbation network: molecules in first-seen order and the pairs between them.
#[derive(Debug, Clone, Default)]
pub struct PerturbationGraph {
    nodes: SlotMap<NodeId, Node>,
    pairs: SlotMap<PairId, Pair>,
    /// Nodes in order of first appearance.
    node_order: Vec<NodeId>,
    /// Pairs in input order.
    pair_order: Vec<PairId>,
    label_map: HashMap<String, NodeId>,
    /// Keyed by the recorded (source, target) direction.
    pair_map: HashMap<(NodeId, NodeId), PairId>,
    /// Neighbours of each node in the order the pairs were added.
    adjacency: SecondaryMap<NodeId, Vec<NodeId>>,
    replicate_count: Option<usize>,
}

impl PerturbationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `label`, registering a new node if it has not been seen yet.
    pub fn add_node(&mut self, label: &str) -> NodeId {
        if let Some(&id) = self.label_map.get(label) {
            return id;
        }
        let id = self.nodes.insert(Node {
            label: label.to_string(),
        });
        self.node_order.push(id);
        self.label_map.insert(label.to_string(), id);
        self.adjacency.insert(id, Vec::new());
        id
    }

    /// Adds a measured pair. Every replicate column starts with the raw ddG as its
    /// corrected value and the pairwise error starts unset.
    ///
    /// # Errors
    ///
    /// Fails on self-loops, on a second record for the same unordered pair, when
    /// `weights` is empty, or when its length differs from earlier pairs.
    pub fn add_pair(
        &mut self,
        source: &str,
        target: &str,
        ddg: Decimal,
        weights: Vec<Decimal>,
    ) -> Result<PairId, GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop {
                label: source.to_string(),
            });
        }
        if weights.is_empty() {
            return Err(GraphError::NoWeights {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        if let Some(expected) = self.replicate_count {
            if weights.len() != expected {
                return Err(GraphError::InconsistentReplicates {
                    from: source.to_string(),
                    to: target.to_string(),
                    expected,
                    found: weights.len(),
                });
            }
        }
        if let (Some(&a), Some(&b)) = (self.label_map.get(source), self.label_map.get(target)) {
            if self.pair_between(a, b).is_some() {
                return Err(GraphError::DuplicatePair {
                    from: source.to_string(),
                    to: target.to_string(),
                });
            }
        }

        let source_id = self.add_node(source);
        let target_id = self.add_node(target);
        let replicates = weights.len();

        let pair_id = self.pairs.insert(Pair {
            source: source_id,
            target: target_id,
            weights,
            corrected: vec![ddg; replicates],
            error_floor: None,
            pair_error: None,
        });
        self.pair_order.push(pair_id);
        self.pair_map.insert((source_id, target_id), pair_id);
        if let Some(neighbors) = self.adjacency.get_mut(source_id) {
            neighbors.push(target_id);
        }
        if let Some(neighbors) = self.adjacency.get_mut(target_id) {
            neighbors.push(source_id);
        }
        self.replicate_count = Some(replicates);
        Ok(pair_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of replicate columns shared by every pair, `0` for an empty network.
    pub fn replicate_count(&self) -> usize {
        self.replicate_count.unwrap_or(0)
    }

    /// Node ids in order of first appearance.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|node| node.label.as_str())
    }

    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.label_map.get(label).copied()
    }

    /// Node labels in order of first appearance.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.node_order
            .iter()
            .filter_map(move |&id| self.label(id))
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pair(&self, id: PairId) -> Option<&Pair> {
        self.pairs.get(id)
    }

    pub(crate) fn pair_mut(&mut self, id: PairId) -> Option<&mut Pair> {
        self.pairs.get_mut(id)
    }

    /// Pairs in input order.
    pub fn pairs(&self) -> impl Iterator<Item = (PairId, &Pair)> {
        self.pair_order
            .iter()
            .filter_map(move |&id| self.pairs.get(id).map(|pair| (id, pair)))
    }

    pub fn pair_ids(&self) -> &[PairId] {
        &self.pair_order
    }

    /// Looks up the pair joining `a` and `b` and the direction `a -> b` takes along it.
    pub fn pair_between(&self, a: NodeId, b: NodeId) -> Option<(PairId, Orientation)> {
        if let Some(&id) = self.pair_map.get(&(a, b)) {
            return Some((id, Orientation::Forward));
        }
        self.pair_map
            .get(&(b, a))
            .map(|&id| (id, Orientation::Reverse))
    }

    /// The corrected ddG of the directed edge `a -> b`.
    pub fn corrected(&self, a: NodeId, b: NodeId, replicate: usize) -> Option<Decimal> {
        let (id, orientation) = self.pair_between(a, b)?;
        self.pairs.get(id)?.corrected_along(orientation, replicate)
    }

    /// The weight of the edge `a -> b`, identical in both directions.
    pub fn weight(&self, a: NodeId, b: NodeId, replicate: usize) -> Option<Decimal> {
        let (id, _) = self.pair_between(a, b)?;
        self.pairs.get(id)?.weight(replicate)
    }

    pub fn pair_error(&self, a: NodeId, b: NodeId) -> Option<Decimal> {
        let (id, _) = self.pair_between(a, b)?;
        self.pairs.get(id)?.pair_error()
    }

    pub(crate) fn set_pair_error(&mut self, id: PairId, value: Option<Decimal>) {
        if let Some(pair) = self.pairs.get_mut(id) {
            pair.pair_error = value;
        }
    }

    /// Seeds the pair error with a measured uncertainty. Cycle estimates can raise the
    /// error above the floor but never below it.
    pub(crate) fn set_error_floor(&mut self, id: PairId, floor: Decimal) {
        if let Some(pair) = self.pairs.get_mut(id) {
            pair.error_floor = Some(floor);
            pair.pair_error = Some(pair.pair_error.map_or(floor, |current| current.max(floor)));
        }
    }

    /// Corrected values of every pair for one replicate, in input order.
    pub fn snapshot(&self, replicate: usize) -> Vec<Decimal> {
        self.pairs()
            .map(|(_, pair)| pair.corrected(replicate).unwrap_or_default())
            .collect()
    }

    /// Largest absolute change of any corrected value relative to `snapshot`.
    pub fn max_shift_since(&self, snapshot: &[Decimal], replicate: usize) -> Decimal {
        self.pairs()
            .zip(snapshot)
            .map(|((_, pair), before)| {
                pair.corrected(replicate)
                    .unwrap_or_default()
                    .checked_sub(*before)
                    .map_or(Decimal::MAX, |shift| shift.abs())
            })
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

use super::closure::ResolvedCycle;
use crate::core::models::graph::PerturbationGraph;
use crate::core::models::ids::PairId;
use crate::engine::config::ErrorAggregation;
use crate::engine::error::EngineError;
use rust_decimal::{Decimal, MathematicalOps};
use slotmap::SecondaryMap;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Pairwise error estimates of a single replicate, keyed by pair.
pub type PairErrors = SecondaryMap<PairId, Decimal>;

/// `|delta| / sqrt(edge_count)`, the error a cycle attributes to each of its edges.
pub fn single_cycle_error(delta: Decimal, edge_count: usize) -> Option<Decimal> {
    let root = Decimal::from(edge_count).sqrt()?;
    delta.abs().checked_div(root)
}

/// Estimates the pairwise error of every pair from the largest discrepancy among the
/// qualifying cycles it belongs to. Cycles longer than `max_cycle_length` edges
/// contribute nothing. Reads the network only.
#[instrument(skip_all, name = "pair_error_task", fields(replicate = replicate))]
pub fn estimate(
    graph: &PerturbationGraph,
    cycles: &[ResolvedCycle],
    replicate: usize,
    max_cycle_length: usize,
) -> Result<PairErrors, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = cycles.iter();

    #[cfg(feature = "parallel")]
    let iterator = cycles.par_iter();

    let per_cycle: Vec<Option<Decimal>> = iterator
        .map(|cycle| {
            if cycle.edge_count() > max_cycle_length {
                return Ok(None);
            }
            let delta = cycle.discrepancy(graph, replicate)?;
            single_cycle_error(delta, cycle.edge_count())
                .map(Some)
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "cannot scale discrepancy {} by a cycle of {} edges",
                        delta,
                        cycle.edge_count()
                    ))
                })
        })
        .collect::<Result<_, EngineError>>()?;

    let mut errors = PairErrors::new();
    for (cycle, error) in cycles.iter().zip(per_cycle) {
        let Some(error) = error else {
            continue;
        };
        for &(pair_id, _) in cycle.steps() {
            match errors.get_mut(pair_id) {
                Some(current) if *current >= error => {}
                Some(current) => *current = error,
                None => {
                    errors.insert(pair_id, error);
                }
            }
        }
    }

    debug!(pairs_with_error = errors.len(), "Pairwise errors estimated.");
    Ok(errors)
}

fn larger(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Folds one replicate's estimates into the errors stored on the network. A pair's
/// error floor, if any, is never undercut.
pub fn merge(graph: &mut PerturbationGraph, errors: &PairErrors, aggregation: ErrorAggregation) {
    let pair_ids = graph.pair_ids().to_vec();
    for pair_id in pair_ids {
        let incoming = errors.get(pair_id).copied();
        let Some(pair) = graph.pair(pair_id) else {
            continue;
        };
        let merged = match aggregation {
            ErrorAggregation::LastReplicate => larger(pair.error_floor(), incoming),
            ErrorAggregation::Maximum => larger(pair.pair_error(), incoming),
        };
        graph.set_pair_error(pair_id, merged);
    }
}

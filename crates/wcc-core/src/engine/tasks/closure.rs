use super::pair_error::{self, PairErrors};
use crate::core::models::cycle::Cycle;
use crate::core::models::graph::{Orientation, PerturbationGraph};
use crate::core::models::ids::PairId;
use crate::engine::config::ClosureConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::ReplicateSummary;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, trace, warn};

/// A cycle with every step bound to the pair it crosses and the direction of travel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCycle {
    steps: Vec<(PairId, Orientation)>,
}

impl ResolvedCycle {
    pub fn resolve(graph: &PerturbationGraph, cycle: &Cycle) -> Result<Self, EngineError> {
        let steps = cycle
            .edges()
            .map(|(a, b)| {
                graph.pair_between(a, b).ok_or_else(|| {
                    EngineError::Internal(format!(
                        "cycle crosses {:?} -> {:?}, which is not a pair of the network",
                        graph.label(a),
                        graph.label(b)
                    ))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[(PairId, Orientation)] {
        &self.steps
    }

    pub fn edge_count(&self) -> usize {
        self.steps.len()
    }

    /// Signed sum of the corrected ddG values along the cycle; zero when closed.
    pub fn discrepancy(&self, graph: &PerturbationGraph, replicate: usize) -> Result<Decimal, EngineError> {
        self.steps.iter().try_fold(Decimal::ZERO, |sum, &(pair_id, orientation)| {
            let value = graph
                .pair(pair_id)
                .and_then(|pair| pair.corrected_along(orientation, replicate))
                .ok_or_else(|| missing_value(pair_id, replicate))?;
            sum.checked_add(value)
                .ok_or(EngineError::Overflow { replicate })
        })
    }

    pub fn weight_sum(&self, graph: &PerturbationGraph, replicate: usize) -> Result<Decimal, EngineError> {
        self.steps.iter().try_fold(Decimal::ZERO, |sum, &(pair_id, _)| {
            let weight = graph
                .pair(pair_id)
                .and_then(|pair| pair.weight(replicate))
                .ok_or_else(|| missing_value(pair_id, replicate))?;
            sum.checked_add(weight)
                .ok_or(EngineError::Overflow { replicate })
        })
    }
}

fn missing_value(pair_id: PairId, replicate: usize) -> EngineError {
    EngineError::Internal(format!(
        "pair {:?} has no value for replicate {}",
        pair_id, replicate
    ))
}

pub fn resolve_all(graph: &PerturbationGraph, cycles: &[Cycle]) -> Result<Vec<ResolvedCycle>, EngineError> {
    cycles
        .iter()
        .map(|cycle| ResolvedCycle::resolve(graph, cycle))
        .collect()
}

/// Largest absolute discrepancy over all cycles for one replicate.
pub fn max_discrepancy(
    graph: &PerturbationGraph,
    cycles: &[ResolvedCycle],
    replicate: usize,
) -> Result<Decimal, EngineError> {
    cycles.iter().try_fold(Decimal::ZERO, |max, cycle| {
        Ok(max.max(cycle.discrepancy(graph, replicate)?.abs()))
    })
}

/// One pass over all cycles in discovery order. Each cycle's discrepancy is charged to
/// its edges in proportion to their weight and applied immediately, so later cycles in
/// the same pass see the corrections of earlier ones.
pub fn correction_pass(
    graph: &mut PerturbationGraph,
    cycles: &[ResolvedCycle],
    replicate: usize,
) -> Result<(), EngineError> {
    for (index, cycle) in cycles.iter().enumerate() {
        let delta = cycle.discrepancy(graph, replicate)?;
        let weight_sum = cycle.weight_sum(graph, replicate)?;
        if weight_sum.is_zero() {
            return Err(EngineError::DegenerateWeights {
                cycle: index,
                replicate,
            });
        }
        trace!(cycle = index, %delta, %weight_sum, "Closing cycle.");

        for &(pair_id, orientation) in cycle.steps() {
            let pair = graph
                .pair_mut(pair_id)
                .ok_or_else(|| missing_value(pair_id, replicate))?;
            let weight = pair
                .weight(replicate)
                .ok_or_else(|| missing_value(pair_id, replicate))?;
            let amount = (weight / weight_sum)
                .checked_mul(delta)
                .ok_or(EngineError::Overflow { replicate })?;
            pair.correct(orientation, replicate, amount)
                .ok_or(EngineError::Overflow { replicate })?;
        }
    }
    Ok(())
}

/// Closes every cycle for one replicate column.
///
/// The first pass only estimates pairwise errors from the uncorrected values; every
/// later pass redistributes discrepancies. Iteration stops once at least
/// `minimum_iterations` passes ran and the last pass moved no corrected value by more
/// than the tolerance.
///
/// # Errors
///
/// Returns [`EngineError::Convergence`] if `max_iterations` is set and reached before
/// convergence, and [`EngineError::DegenerateWeights`] if a cycle's weights sum to zero.
#[instrument(skip_all, name = "closure_task", fields(replicate = replicate))]
pub fn run(
    graph: &mut PerturbationGraph,
    cycles: &[ResolvedCycle],
    replicate: usize,
    config: &ClosureConfig,
    reporter: &ProgressReporter,
) -> Result<(ReplicateSummary, PairErrors), EngineError> {
    let convergence = &config.convergence;
    let initial_max_discrepancy = max_discrepancy(graph, cycles, replicate)?;
    info!(
        cycles = cycles.len(),
        %initial_max_discrepancy,
        "Closing cycles."
    );

    let mut errors = PairErrors::new();
    let mut iteration = 0;
    let mut last_shift = Decimal::ZERO;

    loop {
        if iteration >= convergence.minimum_iterations && last_shift <= convergence.tolerance {
            break;
        }
        if let Some(cap) = convergence.max_iterations {
            if iteration >= cap {
                warn!(
                    iterations = iteration,
                    %last_shift,
                    "Iteration cap reached before convergence."
                );
                return Err(EngineError::Convergence {
                    replicate,
                    iterations: iteration,
                });
            }
        }

        let snapshot = graph.snapshot(replicate);
        if iteration == 0 {
            errors = pair_error::estimate(
                graph,
                cycles,
                replicate,
                config.pair_error.max_cycle_length,
            )?;
        } else {
            correction_pass(graph, cycles, replicate)?;
        }
        iteration += 1;
        last_shift = graph.max_shift_since(&snapshot, replicate);

        debug!(iteration, max_shift = %last_shift, "Pass complete.");
        reporter.report(Progress::IterationFinish {
            replicate,
            iteration,
            max_shift: last_shift,
        });
    }

    let final_max_discrepancy = max_discrepancy(graph, cycles, replicate)?;
    info!(
        iterations = iteration,
        %final_max_discrepancy,
        "Replicate converged."
    );

    Ok((
        ReplicateSummary {
            replicate,
            iterations: iteration,
            initial_max_discrepancy,
            final_max_discrepancy,
        },
        errors,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ClosureConfigBuilder;
    use crate::engine::tasks::cycle_search;
    use rust_decimal_macros::dec;

    const EPS: Decimal = dec!(0.00000000000000000001);

    fn network(records: &[(&str, &str, Decimal, Vec<Decimal>)]) -> PerturbationGraph {
        let mut graph = PerturbationGraph::new();
        for (a, b, ddg, weights) in records {
            graph.add_pair(a, b, *ddg, weights.clone()).unwrap();
        }
        graph
    }

    fn triangle(weights: [Vec<Decimal>; 3]) -> PerturbationGraph {
        let [ab, bc, ac] = weights;
        network(&[
            ("A", "B", dec!(1.0), ab),
            ("B", "C", dec!(2.0), bc),
            ("A", "C", dec!(2.8), ac),
        ])
    }

    fn cycles_of(graph: &PerturbationGraph) -> Vec<ResolvedCycle> {
        let cycles = cycle_search::run(graph, &ProgressReporter::new());
        resolve_all(graph, &cycles).unwrap()
    }

    fn corrected(graph: &PerturbationGraph, a: &str, b: &str, n: usize) -> Decimal {
        graph
            .corrected(graph.node_id(a).unwrap(), graph.node_id(b).unwrap(), n)
            .unwrap()
    }

    fn default_config() -> ClosureConfig {
        ClosureConfigBuilder::new().build().unwrap()
    }

    #[test]
    fn triangle_discrepancy_is_shared_equally() {
        let mut graph = triangle([vec![dec!(1)], vec![dec!(1)], vec![dec!(1)]]);
        let cycles = cycles_of(&graph);
        assert_eq!(cycles[0].discrepancy(&graph, 0).unwrap(), dec!(0.2));

        let (summary, errors) =
            run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new()).unwrap();

        let share = dec!(0.2) / dec!(3);
        assert!((corrected(&graph, "A", "B", 0) - (dec!(1.0) - share)).abs() < EPS);
        assert!((corrected(&graph, "B", "C", 0) - (dec!(2.0) - share)).abs() < EPS);
        assert!((corrected(&graph, "C", "A", 0) - (dec!(-2.8) - share)).abs() < EPS);
        assert!(cycles[0].discrepancy(&graph, 0).unwrap().abs() < EPS);
        assert_eq!(summary.initial_max_discrepancy, dec!(0.2));
        assert!(summary.final_max_discrepancy < EPS);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn antisymmetry_holds_after_closure() {
        let mut graph = triangle([vec![dec!(1)], vec![dec!(4)], vec![dec!(9)]]);
        let cycles = cycles_of(&graph);
        run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new()).unwrap();

        for (a, b) in [("A", "B"), ("B", "C"), ("A", "C")] {
            assert_eq!(corrected(&graph, a, b, 0), -corrected(&graph, b, a, 0));
        }
    }

    #[test]
    fn heavier_edges_absorb_larger_share() {
        let mut graph = triangle([vec![dec!(1)], vec![dec!(1)], vec![dec!(2)]]);
        let cycles = cycles_of(&graph);
        run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new()).unwrap();

        let ab_shift = (corrected(&graph, "A", "B", 0) - dec!(1.0)).abs();
        let ac_shift = (corrected(&graph, "A", "C", 0) - dec!(2.8)).abs();
        assert!((ab_shift - dec!(0.05)).abs() < EPS);
        assert!((ac_shift - dec!(0.1)).abs() < EPS);
    }

    #[test]
    fn replicates_use_their_own_weights() {
        let mut graph = triangle([
            vec![dec!(0.01), dec!(0.09)],
            vec![dec!(0.04), dec!(0.09)],
            vec![dec!(0.09), dec!(0.09)],
        ]);
        let cycles = cycles_of(&graph);
        let config = default_config();
        run(&mut graph, &cycles, 0, &config, &ProgressReporter::new()).unwrap();
        run(&mut graph, &cycles, 1, &config, &ProgressReporter::new()).unwrap();

        let weighted = dec!(1.0) - dec!(0.01) / dec!(0.14) * dec!(0.2);
        let uniform = dec!(1.0) - dec!(0.2) / dec!(3);
        assert!((corrected(&graph, "A", "B", 0) - weighted).abs() < EPS);
        assert!((corrected(&graph, "A", "B", 1) - uniform).abs() < EPS);
    }

    #[test]
    fn converged_network_is_a_fixed_point() {
        let mut graph = network(&[
            ("A", "B", dec!(1.0), vec![dec!(1)]),
            ("B", "C", dec!(0.7), vec![dec!(2)]),
            ("C", "A", dec!(-1.5), vec![dec!(1)]),
            ("C", "D", dec!(0.4), vec![dec!(3)]),
            ("D", "A", dec!(-1.3), vec![dec!(1)]),
            ("B", "D", dec!(1.3), vec![dec!(0.5)]),
        ]);
        let cycles = cycles_of(&graph);
        let config = default_config();
        run(&mut graph, &cycles, 0, &config, &ProgressReporter::new()).unwrap();

        let before = graph.snapshot(0);
        correction_pass(&mut graph, &cycles, 0).unwrap();
        assert!(graph.max_shift_since(&before, 0) <= config.convergence.tolerance);
    }

    #[test]
    fn consistent_network_stops_after_minimum_iterations() {
        let mut graph = network(&[
            ("A", "B", dec!(1.0), vec![dec!(1)]),
            ("B", "C", dec!(2.0), vec![dec!(1)]),
            ("A", "C", dec!(3.0), vec![dec!(1)]),
        ]);
        let cycles = cycles_of(&graph);
        let (summary, _) =
            run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new()).unwrap();

        assert_eq!(summary.iterations, 2);
        assert_eq!(corrected(&graph, "A", "C", 0), dec!(3.0));
    }

    #[test]
    fn iteration_cap_reports_convergence_failure() {
        let mut graph = network(&[
            ("A", "B", dec!(1.0), vec![dec!(1)]),
            ("B", "C", dec!(0.7), vec![dec!(2)]),
            ("C", "A", dec!(-1.5), vec![dec!(1)]),
            ("C", "D", dec!(0.4), vec![dec!(3)]),
            ("D", "A", dec!(-1.3), vec![dec!(1)]),
        ]);
        let cycles = cycles_of(&graph);
        let config = ClosureConfigBuilder::new()
            .tolerance(dec!(0.0000000001))
            .max_iterations(Some(2))
            .build()
            .unwrap();

        let err = run(&mut graph, &cycles, 0, &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Convergence {
                replicate: 0,
                iterations: 2
            }
        ));
    }

    #[test]
    fn zero_weight_sum_is_rejected() {
        let mut graph = triangle([vec![dec!(0)], vec![dec!(0)], vec![dec!(0)]]);
        let cycles = cycles_of(&graph);
        let err = run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DegenerateWeights {
                cycle: 0,
                replicate: 0
            }
        ));
    }

    #[test]
    fn overflowing_discrepancy_is_an_error() {
        let mut graph = network(&[
            ("A", "B", Decimal::MAX, vec![dec!(1)]),
            ("B", "C", Decimal::MAX, vec![dec!(1)]),
            ("A", "C", dec!(0), vec![dec!(1)]),
        ]);
        let cycles = cycles_of(&graph);

        assert!(matches!(
            cycles[0].discrepancy(&graph, 0),
            Err(EngineError::Overflow { replicate: 0 })
        ));
        let err = run(&mut graph, &cycles, 0, &default_config(), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Overflow { replicate: 0 }));
    }
}

use crate::core::io::report::Report;
use crate::core::models::cycle::Cycle;
use crate::core::models::graph::PerturbationGraph;
use crate::engine::config::ClosureConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::ClosureSummary;
use crate::engine::tasks::{closure, cycle_search, pair_error};
use tracing::{info, instrument, warn};

/// A network whose cycles have all been closed.
#[derive(Debug, Clone)]
pub struct ClosedNetwork {
    pub graph: PerturbationGraph,
    pub cycles: Vec<Cycle>,
    pub summary: ClosureSummary,
    pub report: Report,
}

#[derive(Debug, Clone)]
pub enum ClosureOutcome {
    /// The network has no loop; every value is reported exactly as measured.
    NoCycles {
        graph: PerturbationGraph,
        report: Report,
    },
    Closed(ClosedNetwork),
}

impl ClosureOutcome {
    pub fn report(&self) -> &Report {
        match self {
            Self::NoCycles { report, .. } => report,
            Self::Closed(closed) => &closed.report,
        }
    }

    pub fn graph(&self) -> &PerturbationGraph {
        match self {
            Self::NoCycles { graph, .. } => graph,
            Self::Closed(closed) => &closed.graph,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Lists the distinct cycles of `graph` in discovery order without modifying it.
pub fn find_cycles(graph: &PerturbationGraph, reporter: &ProgressReporter) -> Vec<Cycle> {
    cycle_search::run(graph, reporter)
}

/// Label of the reference molecule: the configured one if present in the network,
/// otherwise the first molecule in input order.
fn resolve_reference(graph: &PerturbationGraph, config: &ClosureConfig) -> Result<String, EngineError> {
    match &config.reference.label {
        Some(label) => graph
            .node_id(label)
            .map(|_| label.clone())
            .ok_or_else(|| EngineError::ReferenceNotFound {
                label: label.clone(),
            }),
        None => graph
            .node_ids()
            .first()
            .and_then(|&id| graph.label(id))
            .map(str::to_string)
            .ok_or(EngineError::EmptyNetwork),
    }
}

#[instrument(skip_all, name = "closure_workflow")]
pub fn run(
    graph: PerturbationGraph,
    config: &ClosureConfig,
    reporter: &ProgressReporter,
) -> Result<ClosureOutcome, EngineError> {
    if graph.is_empty() {
        return Err(EngineError::EmptyNetwork);
    }
    let reference = resolve_reference(&graph, config)?;
    let reference_energy = config.reference.energy;
    info!(
        nodes = graph.node_count(),
        pairs = graph.pair_count(),
        replicates = graph.replicate_count(),
        reference = %reference,
        "Starting cycle closure."
    );

    // === Phase 1: Cycle discovery ===
    reporter.report(Progress::PhaseStart {
        name: "Cycle Search",
    });
    let cycles = cycle_search::run(&graph, reporter);
    reporter.report(Progress::PhaseFinish);

    if cycles.is_empty() {
        warn!("No cycles found; the network needs no closure.");
        reporter.report(Progress::Message(
            "No cycles found; values are reported as measured.".to_string(),
        ));
        let report = Report::from_graph(&graph, &reference, reference_energy);
        return Ok(ClosureOutcome::NoCycles { graph, report });
    }

    // === Phase 2: Weighted closure of every replicate ===
    reporter.report(Progress::PhaseStart {
        name: "Cycle Closure",
    });
    let mut graph = graph;
    let resolved = closure::resolve_all(&graph, &cycles)?;
    let replicate_count = graph.replicate_count();
    let mut summary = ClosureSummary {
        cycle_count: cycles.len(),
        replicates: Vec::with_capacity(replicate_count),
    };

    reporter.report(Progress::TaskStart {
        total_steps: replicate_count as u64,
    });
    for replicate in 0..replicate_count {
        let (replicate_summary, errors) =
            closure::run(&mut graph, &resolved, replicate, config, reporter)?;
        pair_error::merge(&mut graph, &errors, config.pair_error.aggregation);
        summary.replicates.push(replicate_summary);
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        cycles = summary.cycle_count,
        iterations = summary.total_iterations(),
        "Cycle closure complete."
    );

    let report = Report::from_graph(&graph, &reference, reference_energy);
    Ok(ClosureOutcome::Closed(ClosedNetwork {
        graph,
        cycles,
        summary,
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::report::PAIR_ERROR_UNSET;
    use crate::engine::config::{ClosureConfigBuilder, ErrorAggregation};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn network(records: &[(&str, &str, Decimal, Vec<Decimal>)]) -> PerturbationGraph {
        let mut graph = PerturbationGraph::new();
        for (a, b, ddg, weights) in records {
            graph.add_pair(a, b, *ddg, weights.clone()).unwrap();
        }
        graph
    }

    fn triangle() -> PerturbationGraph {
        network(&[
            ("A", "B", dec!(1.0), vec![dec!(1)]),
            ("B", "C", dec!(2.0), vec![dec!(1)]),
            ("A", "C", dec!(2.8), vec![dec!(1)]),
        ])
    }

    #[test]
    fn triangle_is_closed_and_reported() {
        let config = ClosureConfigBuilder::new().build().unwrap();
        let outcome = run(triangle(), &config, &ProgressReporter::new()).unwrap();

        assert!(outcome.is_closed());
        let report = outcome.report();
        assert_eq!(report.reference, "A");
        assert_eq!(report.nodes, vec!["A", "B", "C"]);

        let ab = report.pair("A", "B").unwrap();
        assert!((ab.ddg[0] - dec!(0.9333333333)).abs() < dec!(0.0000000001));
        assert_eq!(ab.display_error(), dec!(0.12));

        let ClosureOutcome::Closed(closed) = outcome else {
            unreachable!()
        };
        assert_eq!(closed.cycles.len(), 1);
        assert_eq!(closed.summary.replicates.len(), 1);
        assert_eq!(closed.summary.replicates[0].initial_max_discrepancy, dec!(0.2));
    }

    #[test]
    fn tree_is_reported_unchanged_without_errors() {
        let graph = network(&[
            ("A", "B", dec!(1.0), vec![dec!(1)]),
            ("B", "C", dec!(2.0), vec![dec!(1)]),
            ("C", "D", dec!(3.0), vec![dec!(1)]),
        ]);
        let config = ClosureConfigBuilder::new().build().unwrap();
        let outcome = run(graph, &config, &ProgressReporter::new()).unwrap();

        assert!(matches!(outcome, ClosureOutcome::NoCycles { .. }));
        let cd = outcome.report().pair("C", "D").unwrap();
        assert_eq!(cd.ddg, vec![dec!(3.0)]);
        assert_eq!(cd.pair_error, PAIR_ERROR_UNSET);
    }

    #[test]
    fn unknown_reference_aborts_before_closure() {
        let config = ClosureConfigBuilder::new()
            .reference(Some("Z".to_string()))
            .build()
            .unwrap();
        let err = run(triangle(), &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::ReferenceNotFound { label } if label == "Z"));
    }

    #[test]
    fn configured_reference_and_energy_reach_the_report() {
        let config = ClosureConfigBuilder::new()
            .reference(Some("C".to_string()))
            .reference_energy(dec!(-8.5))
            .build()
            .unwrap();
        let outcome = run(triangle(), &config, &ProgressReporter::new()).unwrap();

        assert_eq!(outcome.report().reference, "C");
        assert_eq!(outcome.report().reference_energy, dec!(-8.5));
    }

    #[test]
    fn empty_network_is_rejected() {
        let config = ClosureConfigBuilder::new().build().unwrap();
        let err = run(PerturbationGraph::new(), &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyNetwork));
    }

    #[test]
    fn last_replicate_aggregation_keeps_final_estimates() {
        let graph = network(&[
            ("A", "B", dec!(1.0), vec![dec!(1), dec!(2)]),
            ("B", "C", dec!(2.0), vec![dec!(1), dec!(2)]),
            ("A", "C", dec!(2.8), vec![dec!(1), dec!(2)]),
        ]);
        let config = ClosureConfigBuilder::new()
            .error_aggregation(ErrorAggregation::LastReplicate)
            .build()
            .unwrap();
        let outcome = run(graph, &config, &ProgressReporter::new()).unwrap();

        // Errors come from the uncorrected values, so both replicates agree.
        for pair in &outcome.report().pairs {
            assert!(pair.has_error());
            assert_eq!(pair.display_error(), dec!(0.12));
        }
    }

    #[test]
    fn phases_are_reported_in_order() {
        use std::sync::{Arc, Mutex};

        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if let Progress::PhaseStart { name } = event {
                sink.lock().unwrap().push(name);
            }
        }));
        let config = ClosureConfigBuilder::new().build().unwrap();
        run(triangle(), &config, &reporter).unwrap();

        assert_eq!(*phases.lock().unwrap(), vec!["Cycle Search", "Cycle Closure"]);
    }
}

use crate::cli::CloseArgs;
use crate::config::PartialCloseConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use std::io::{self, Write};
use tracing::{info, warn};
use wcc::{
    core::io::{edge_list::EdgeListFile, traits::NetworkFile},
    engine::progress::ProgressReporter,
    workflows::close::{self, ClosureOutcome},
};

pub fn run(args: CloseArgs) -> Result<()> {
    let partial_config = PartialCloseConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    info!("Loading perturbation network from {:?}", &args.input);
    let graph = EdgeListFile::read_from_path(&args.input, &config.edge_list).map_err(|e| {
        CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        }
    })?;
    info!(
        "Loaded {} molecule(s) and {} pair(s) with {} replicate(s).",
        graph.node_count(),
        graph.pair_count(),
        graph.replicate_count()
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting cycle closure...");
    let outcome = close::run(graph, &config.closure, &reporter)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &outcome {
        ClosureOutcome::NoCycles { .. } => {
            warn!("Network has no cycles; nothing to correct.");
            writeln!(out, "No cycle in this graph. Values are reported as measured.")?;
        }
        ClosureOutcome::Closed(closed) => {
            writeln!(
                out,
                "Closed {} cycle(s) in {} pass(es).",
                closed.summary.cycle_count,
                closed.summary.total_iterations()
            )?;
            for replicate in &closed.summary.replicates {
                writeln!(
                    out,
                    "  Replicate {}: {} pass(es), max discrepancy {:.6} -> {:.6}",
                    replicate.replicate,
                    replicate.iterations,
                    replicate.initial_max_discrepancy,
                    replicate.final_max_discrepancy
                )?;
            }
        }
    }

    let report = outcome.report();
    report.write_table(&mut out)?;
    writeln!(
        out,
        "Reference: {} ({})",
        report.reference, report.reference_energy
    )?;

    if let Some(path) = &args.output {
        info!("Writing {:?} hand-off file to {:?}", config.format, path);
        report.write_to_path(path, config.format)?;
        writeln!(out, "✓ Report written to: {}", path.display())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use wcc::core::io::report::Report;

    fn close_args(argv: &[&str]) -> CloseArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Close(args) => args,
            Commands::Cycles(_) => panic!("expected the close subcommand"),
        }
    }

    #[test]
    fn close_writes_handoff_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("net.txt");
        let output = dir.path().join("cycled.toml");
        fs::write(&input, "A B 1.0\nB C 2.0\nA C 2.8\n").unwrap();

        let args = close_args(&[
            "wcc",
            "close",
            "-f",
            input.to_str().unwrap(),
            "-r",
            "B",
            "-o",
            output.to_str().unwrap(),
        ]);
        run(args).unwrap();

        let report: Report = toml::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report.reference, "B");
        assert_eq!(report.pairs.len(), 3);
        assert!(report.pairs.iter().all(|p| p.has_error()));
    }

    #[test]
    fn unknown_reference_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("net.txt");
        fs::write(&input, "A B 1.0\nB C 2.0\nA C 2.8\n").unwrap();

        let args = close_args(&["wcc", "close", "-f", input.to_str().unwrap(), "-r", "Q"]);
        assert!(matches!(run(args), Err(CliError::Engine(_))));
    }

    #[test]
    fn malformed_input_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("net.txt");
        fs::write(&input, "A B\n").unwrap();

        let args = close_args(&["wcc", "close", "-f", input.to_str().unwrap()]);
        let err = run(args).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
        assert!(err.to_string().contains("net.txt"));
    }
}

use crate::cli::CyclesArgs;
use crate::error::{CliError, Result};
use std::io::{self, Write};
use tracing::info;
use wcc::{
    core::io::{
        edge_list::{EdgeListFile, EdgeListOptions},
        traits::NetworkFile,
    },
    core::models::{cycle::Cycle, graph::PerturbationGraph},
    engine::progress::ProgressReporter,
    workflows::close,
};

pub fn run(args: CyclesArgs) -> Result<()> {
    info!("Loading perturbation network from {:?}", &args.input);
    let graph = EdgeListFile::read_from_path(&args.input, &EdgeListOptions::default()).map_err(
        |e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        },
    )?;

    let cycles = close::find_cycles(&graph, &ProgressReporter::new());
    let stdout = io::stdout();
    write_cycles(&graph, &cycles, &mut stdout.lock())
}

fn write_cycles(graph: &PerturbationGraph, cycles: &[Cycle], out: &mut impl Write) -> Result<()> {
    if cycles.is_empty() {
        writeln!(out, "No cycle in this graph.")?;
        return Ok(());
    }

    writeln!(out, "Found {} cycle(s):", cycles.len())?;
    for (index, cycle) in cycles.iter().enumerate() {
        writeln!(
            out,
            "{:>4}. {} ({} edges)",
            index + 1,
            cycle.labels(graph).join(" -> "),
            cycle.edge_count()
        )?;
    }
    Ok(())
}

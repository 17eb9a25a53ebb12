use crate::core::models::graph::PerturbationGraph;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Value written for a pair whose error was never estimated.
pub const PAIR_ERROR_UNSET: Decimal = Decimal::NEGATIVE_ONE;

/// Decimal places of the displayed pair error.
const ERROR_DISPLAY_DP: u32 = 2;
/// Decimal places of displayed ddG values.
const DDG_DISPLAY_DP: u32 = 4;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Toml,
    Csv,
}

/// Final values of one unordered pair, in its recorded direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PairReport {
    pub source: String,
    pub target: String,
    /// Corrected ddG per replicate; index 0 is the primary estimate.
    pub ddg: Vec<Decimal>,
    /// Exact pair error, or [`PAIR_ERROR_UNSET`].
    pub pair_error: Decimal,
}

impl PairReport {
    pub fn has_error(&self) -> bool {
        self.pair_error != PAIR_ERROR_UNSET
    }

    pub fn display_error(&self) -> Decimal {
        quantize_error(self.pair_error)
    }
}

/// Everything handed to the downstream ligand-mapping step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    pub reference: String,
    pub reference_energy: Decimal,
    pub replicates: usize,
    pub nodes: Vec<String>,
    pub pairs: Vec<PairReport>,
}

/// Rounds a pair error half-up to two decimal places for display.
pub fn quantize_error(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(ERROR_DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero)
}

fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// Column header of replicate `index`.
pub fn replicate_column(index: usize) -> String {
    if index == 0 {
        "ddG_cc".to_string()
    } else {
        format!("ddG_wcc{}", index)
    }
}

impl Report {
    /// Collects the final state of `graph` in input pair order.
    pub fn from_graph(graph: &PerturbationGraph, reference: &str, reference_energy: Decimal) -> Self {
        let replicates = graph.replicate_count();
        let pairs = graph
            .pairs()
            .map(|(_, pair)| PairReport {
                source: graph.label(pair.source()).unwrap_or_default().to_string(),
                target: graph.label(pair.target()).unwrap_or_default().to_string(),
                ddg: (0..replicates)
                    .map(|n| pair.corrected(n).unwrap_or_default())
                    .collect(),
                pair_error: pair.pair_error().unwrap_or(PAIR_ERROR_UNSET),
            })
            .collect();

        Self {
            reference: reference.to_string(),
            reference_energy,
            replicates,
            nodes: graph.labels().map(str::to_string).collect(),
            pairs,
        }
    }

    pub fn pair(&self, source: &str, target: &str) -> Option<&PairReport> {
        self.pairs
            .iter()
            .find(|p| p.source == source && p.target == target)
    }

    /// Writes the human-readable pairwise table.
    pub fn write_table(&self, writer: &mut impl Write) -> Result<(), ReportError> {
        writeln!(writer, "Printing Pairwise Energies:")?;
        write!(writer, "{:<12} {:>12}", "Pair", replicate_column(0))?;
        for k in 1..self.replicates {
            write!(writer, " {:>12}", replicate_column(k))?;
        }
        writeln!(writer, " {:>12}", "pair_error")?;

        for pair in &self.pairs {
            let name = format!("{}-{}", pair.source, pair.target);
            write!(writer, "{:<12}", name)?;
            for value in &pair.ddg {
                write!(writer, " {:>12}", fixed(*value, DDG_DISPLAY_DP))?;
            }
            writeln!(writer, " {:>12}", fixed(pair.display_error(), DDG_DISPLAY_DP))?;
        }
        writeln!(writer, "{}", "*".repeat(100))?;
        Ok(())
    }

    /// Writes one CSV row per pair with exact values.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), ReportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["source".to_string(), "target".to_string()];
        header.extend((0..self.replicates).map(replicate_column));
        header.push("pair_error".to_string());
        csv_writer.write_record(&header)?;

        for pair in &self.pairs {
            let mut row = vec![pair.source.clone(), pair.target.clone()];
            row.extend(pair.ddg.iter().map(Decimal::to_string));
            row.push(pair.pair_error.to_string());
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the TOML hand-off document.
    pub fn write_handoff(&self, writer: &mut impl Write) -> Result<(), ReportError> {
        let content = toml::to_string(self)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<(), ReportError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        match format {
            OutputFormat::Toml => self.write_handoff(&mut writer)?,
            OutputFormat::Csv => self.write_csv(&mut writer)?,
        }
        writer.flush()?;
        Ok(())
    }
}

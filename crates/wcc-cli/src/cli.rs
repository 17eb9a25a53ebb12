use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "WCC CLI - Weighted cycle closure for relative free-energy perturbation networks.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enforce cycle closure on a perturbation network and report corrected ddG values.
    Close(CloseArgs),
    /// List the distinct cycles of a perturbation network without correcting it.
    Cycles(CyclesArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Toml,
    Csv,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationArg {
    Maximum,
    LastReplicate,
}

/// Arguments for the `close` subcommand.
#[derive(Args, Debug)]
pub struct CloseArgs {
    // --- Core Arguments ---
    /// Edge list with one `node_a node_b ddG [uncertainty...]` record per line.
    #[arg(short = 'f', long = "file", required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Reference molecule. Defaults to the first molecule of the edge list.
    #[arg(short = 'r', long = "ref", value_name = "LABEL")]
    pub reference: Option<String>,

    /// Absolute free energy of the reference molecule.
    #[arg(
        short = 'e',
        long = "ref-ene",
        value_name = "DECIMAL",
        allow_hyphen_values = true
    )]
    pub reference_energy: Option<Decimal>,

    /// Path for the machine-readable hand-off file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the hand-off file format.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    // --- Input Overrides ---
    /// Prepend a uniform-weight replicate before the uncertainty-weighted ones.
    #[arg(long)]
    pub unweighted_baseline: bool,

    /// Never report a pairwise error below the pair's first uncertainty column.
    #[arg(long)]
    pub uncertainty_error_floor: bool,

    // --- Closure Overrides ---
    /// Override the convergence tolerance.
    #[arg(long, value_name = "DECIMAL")]
    pub tolerance: Option<Decimal>,

    /// Stop with an error if a replicate has not converged after this many passes.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override how pairwise errors of different replicates are combined.
    #[arg(long, value_enum)]
    pub error_aggregation: Option<AggregationArg>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S closure.tolerance=0.0001
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `cycles` subcommand.
#[derive(Args, Debug)]
pub struct CyclesArgs {
    /// Edge list with one `node_a node_b ddG [uncertainty...]` record per line.
    #[arg(short = 'f', long = "file", required = true, value_name = "PATH")]
    pub input: PathBuf,
}

use crate::cli::{AggregationArg, CloseArgs, FormatArg};
use crate::error::{CliError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IntoDeserializer};
use std::path::Path;
use tracing::debug;
use wcc::core::io::edge_list::EdgeListOptions;
use wcc::core::io::report::OutputFormat;
use wcc::engine::config::{ClosureConfig, ClosureConfigBuilder, ErrorAggregation};

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Toml => OutputFormat::Toml,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

impl From<AggregationArg> for ErrorAggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Maximum => ErrorAggregation::Maximum,
            AggregationArg::LastReplicate => ErrorAggregation::LastReplicate,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialClosureConfig {
    tolerance: Option<Decimal>,
    minimum_iterations: Option<usize>,
    max_iterations: Option<usize>,
    max_error_cycle_length: Option<usize>,
    error_aggregation: Option<ErrorAggregation>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialOutputConfig {
    format: Option<OutputFormat>,
}

/// Everything the `close` command needs once file, CLI and defaults are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseRunConfig {
    pub closure: ClosureConfig,
    pub edge_list: EdgeListOptions,
    pub format: OutputFormat,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialCloseConfig {
    closure: Option<PartialClosureConfig>,
    output: Option<PartialOutputConfig>,
}

impl PartialCloseConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` if given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_with_cli(mut self, args: &CloseArgs) -> Result<CloseRunConfig> {
        self.apply_set_values(&args.set_values)?;

        let closure_config = self.closure.take().unwrap_or_default();
        let output_config = self.output.take().unwrap_or_default();

        let mut builder = ClosureConfigBuilder::new()
            .reference(args.reference.clone())
            .max_iterations(args.max_iterations.or(closure_config.max_iterations));

        if let Some(tolerance) = args.tolerance.or(closure_config.tolerance) {
            builder = builder.tolerance(tolerance);
        }
        if let Some(minimum) = closure_config.minimum_iterations {
            builder = builder.minimum_iterations(minimum);
        }
        if let Some(length) = closure_config.max_error_cycle_length {
            builder = builder.max_error_cycle_length(length);
        }
        if let Some(aggregation) = args
            .error_aggregation
            .map(ErrorAggregation::from)
            .or(closure_config.error_aggregation)
        {
            builder = builder.error_aggregation(aggregation);
        }
        if let Some(energy) = args.reference_energy {
            builder = builder.reference_energy(energy);
        }

        let closure = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(CloseRunConfig {
            closure,
            edge_list: EdgeListOptions {
                unweighted_baseline: args.unweighted_baseline,
                uncertainty_error_floor: args.uncertainty_error_floor,
            },
            format: args
                .format
                .map(OutputFormat::from)
                .or(output_config.format)
                .unwrap_or_default(),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "closure.tolerance" => {
                    self.closure_mut().tolerance = Some(value_str.parse().map_err(|_| {
                        CliError::Config(format!(
                            "Invalid decimal value for {}: {}",
                            key, value_str
                        ))
                    })?);
                }
                "closure.minimum-iterations" => {
                    self.closure_mut().minimum_iterations = Some(parse_integer(key, value_str)?);
                }
                "closure.max-iterations" => {
                    self.closure_mut().max_iterations = Some(parse_integer(key, value_str)?);
                }
                "closure.max-error-cycle-length" => {
                    self.closure_mut().max_error_cycle_length =
                        Some(parse_integer(key, value_str)?);
                }
                "closure.error-aggregation" => {
                    self.closure_mut().error_aggregation = Some(parse_keyword(key, value_str)?);
                }
                "output.format" => {
                    self.output
                        .get_or_insert_with(Default::default)
                        .format = Some(parse_keyword(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn closure_mut(&mut self) -> &mut PartialClosureConfig {
        self.closure.get_or_insert_with(Default::default)
    }
}

fn parse_integer(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid integer value for {}: {}", key, value)))
}

/// Parses a kebab-case keyword the same way the config file spells it.
fn parse_keyword<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    T::deserialize(value.into_deserializer()).map_err(|e: serde::de::value::Error| {
        CliError::Config(format!("Invalid value for {}: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::str::FromStr;
    use tempfile::tempdir;

    fn close_args(extra: &[&str]) -> CloseArgs {
        let mut argv = vec!["wcc", "close", "-f", "net.txt"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Close(args) => args,
            Commands::Cycles(_) => panic!("expected the close subcommand"),
        }
    }

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn no_file_and_no_flags_yield_defaults() {
        let config = PartialCloseConfig::load(None)
            .unwrap()
            .merge_with_cli(&close_args(&[]))
            .unwrap();

        assert_eq!(config.closure, ClosureConfigBuilder::new().build().unwrap());
        assert_eq!(config.format, OutputFormat::Toml);
        assert!(!config.edge_list.unweighted_baseline);
        assert!(!config.edge_list.uncertainty_error_floor);
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wcc.toml");
        fs::write(
            &path,
            r#"
[closure]
tolerance = "0.0001"
minimum-iterations = 3
max-iterations = 50
max-error-cycle-length = 5
error-aggregation = "last-replicate"

[output]
format = "csv"
"#,
        )
        .unwrap();

        let config = PartialCloseConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&close_args(&[]))
            .unwrap();

        assert_eq!(config.closure.convergence.tolerance, dec("0.0001"));
        assert_eq!(config.closure.convergence.minimum_iterations, 3);
        assert_eq!(config.closure.convergence.max_iterations, Some(50));
        assert_eq!(config.closure.pair_error.max_cycle_length, 5);
        assert_eq!(
            config.closure.pair_error.aggregation,
            ErrorAggregation::LastReplicate
        );
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wcc.toml");
        fs::write(
            &path,
            "[closure]\ntolerance = \"0.01\"\nmax-iterations = 10\n\n[output]\nformat = \"csv\"\n",
        )
        .unwrap();

        let args = close_args(&[
            "--tolerance",
            "0.00001",
            "--max-iterations",
            "20",
            "--format",
            "toml",
            "-r",
            "L3",
            "-e",
            "-7.5",
            "--unweighted-baseline",
            "--uncertainty-error-floor",
        ]);
        let config = PartialCloseConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.closure.convergence.tolerance, dec("0.00001"));
        assert_eq!(config.closure.convergence.max_iterations, Some(20));
        assert_eq!(config.format, OutputFormat::Toml);
        assert_eq!(config.closure.reference.label.as_deref(), Some("L3"));
        assert_eq!(config.closure.reference.energy, dec("-7.5"));
        assert!(config.edge_list.unweighted_baseline);
        assert!(config.edge_list.uncertainty_error_floor);
    }

    #[test]
    fn set_values_override_file_values() {
        let args = close_args(&[
            "-S",
            "closure.tolerance=0.005",
            "-S",
            "closure.error-aggregation=last-replicate",
            "-S",
            "output.format=csv",
        ]);
        let config = PartialCloseConfig::default().merge_with_cli(&args).unwrap();

        assert_eq!(config.closure.convergence.tolerance, dec("0.005"));
        assert_eq!(
            config.closure.pair_error.aggregation,
            ErrorAggregation::LastReplicate
        );
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn unknown_set_key_is_rejected() {
        let args = close_args(&["-S", "closure.speed=fast"]);
        let err = PartialCloseConfig::default()
            .merge_with_cli(&args)
            .unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("closure.speed")));
    }

    #[test]
    fn malformed_set_value_is_rejected() {
        let args = close_args(&["-S", "closure.max-iterations=many"]);
        assert!(matches!(
            PartialCloseConfig::default().merge_with_cli(&args),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_builder_values_surface_as_config_errors() {
        let args = close_args(&["--tolerance", "0"]);
        let err = PartialCloseConfig::default()
            .merge_with_cli(&args)
            .unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("tolerance")));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wcc.toml");
        fs::write(&path, "[closure]\nspeed = 3\n").unwrap();

        assert!(matches!(
            PartialCloseConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}

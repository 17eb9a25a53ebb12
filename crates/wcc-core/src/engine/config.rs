use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Iterations always performed: one error-estimation pass and one correction pass.
pub const DEFAULT_MINIMUM_ITERATIONS: usize = 2;
/// Longest cycle, in edges, that still contributes to the pairwise error.
pub const DEFAULT_MAX_ERROR_CYCLE_LENGTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How the per-replicate pairwise error estimates are combined into the single value
/// stored on each pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorAggregation {
    /// Keep the largest estimate seen across all replicates.
    #[default]
    Maximum,
    /// Keep only the estimates of the last replicate processed.
    LastReplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceConfig {
    /// A pass counts as converged once no corrected value moved by more than this.
    pub tolerance: Decimal,
    pub minimum_iterations: usize,
    /// `None` iterates until convergence with no upper bound.
    pub max_iterations: Option<usize>,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 3),
            minimum_iterations: DEFAULT_MINIMUM_ITERATIONS,
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairErrorConfig {
    pub max_cycle_length: usize,
    pub aggregation: ErrorAggregation,
}

impl Default for PairErrorConfig {
    fn default() -> Self {
        Self {
            max_cycle_length: DEFAULT_MAX_ERROR_CYCLE_LENGTH,
            aggregation: ErrorAggregation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceConfig {
    /// Reference molecule; the first node in input order when `None`.
    pub label: Option<String>,
    pub energy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClosureConfig {
    pub convergence: ConvergenceConfig,
    pub pair_error: PairErrorConfig,
    pub reference: ReferenceConfig,
}

#[derive(Default)]
pub struct ClosureConfigBuilder {
    tolerance: Option<Decimal>,
    minimum_iterations: Option<usize>,
    max_iterations: Option<usize>,
    max_error_cycle_length: Option<usize>,
    error_aggregation: Option<ErrorAggregation>,
    reference: Option<String>,
    reference_energy: Option<Decimal>,
}

impl ClosureConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn minimum_iterations(mut self, iterations: usize) -> Self {
        self.minimum_iterations = Some(iterations);
        self
    }
    pub fn max_iterations(mut self, iterations: Option<usize>) -> Self {
        self.max_iterations = iterations;
        self
    }
    pub fn max_error_cycle_length(mut self, length: usize) -> Self {
        self.max_error_cycle_length = Some(length);
        self
    }
    pub fn error_aggregation(mut self, aggregation: ErrorAggregation) -> Self {
        self.error_aggregation = Some(aggregation);
        self
    }
    /// Blank labels fall back to the first node of the network.
    pub fn reference(mut self, label: Option<String>) -> Self {
        self.reference = label.filter(|l| !l.trim().is_empty());
        self
    }
    pub fn reference_energy(mut self, energy: Decimal) -> Self {
        self.reference_energy = Some(energy);
        self
    }

    pub fn build(self) -> Result<ClosureConfig, ConfigError> {
        let defaults = ConvergenceConfig::default();
        let tolerance = self.tolerance.unwrap_or(defaults.tolerance);
        if tolerance <= Decimal::ZERO {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be positive, got {}", tolerance),
            });
        }

        let minimum_iterations = self
            .minimum_iterations
            .unwrap_or(defaults.minimum_iterations);
        if minimum_iterations < DEFAULT_MINIMUM_ITERATIONS {
            return Err(ConfigError::InvalidParameter {
                name: "minimum_iterations",
                reason: format!(
                    "must be at least {} so that one correction pass runs, got {}",
                    DEFAULT_MINIMUM_ITERATIONS, minimum_iterations
                ),
            });
        }
        if let Some(max) = self.max_iterations {
            if max < minimum_iterations {
                return Err(ConfigError::InvalidParameter {
                    name: "max_iterations",
                    reason: format!(
                        "must not be below minimum_iterations ({}), got {}",
                        minimum_iterations, max
                    ),
                });
            }
        }

        let max_cycle_length = self
            .max_error_cycle_length
            .unwrap_or(DEFAULT_MAX_ERROR_CYCLE_LENGTH);
        if max_cycle_length < crate::core::models::cycle::MIN_CYCLE_EDGES {
            return Err(ConfigError::InvalidParameter {
                name: "max_error_cycle_length",
                reason: format!("no cycle is shorter than 3 edges, got {}", max_cycle_length),
            });
        }

        Ok(ClosureConfig {
            convergence: ConvergenceConfig {
                tolerance,
                minimum_iterations,
                max_iterations: self.max_iterations,
            },
            pair_error: PairErrorConfig {
                max_cycle_length,
                aggregation: self.error_aggregation.unwrap_or_default(),
            },
            reference: ReferenceConfig {
                label: self.reference,
                energy: self.reference_energy.unwrap_or(Decimal::ZERO),
            },
        })
    }
}

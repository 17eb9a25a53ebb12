use crate::core::io::traits::NetworkFile;
use crate::core::models::graph::{GraphError, PerturbationGraph};
use rust_decimal::Decimal;
use std::io::{self, BufRead};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

const MIN_FIELDS: usize = 3;

#[derive(Debug, Error)]
pub enum EdgeListError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: EdgeListParseErrorKind,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EdgeListParseErrorKind {
    #[error("Record has {found} field(s), expected at least 3 (node_a node_b ddG [uncertainty...])")]
    TooFewFields { found: usize },
    #[error("Invalid decimal number in field {field} (value: '{value}')")]
    InvalidNumber { field: usize, value: String },
    #[error("Uncertainty in field {field} is too large to square (value: '{value}')")]
    OutOfRange { field: usize, value: String },
    #[error("Record {found} uncertainty columns, but earlier records {expected}")]
    MixedWeighting {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Options controlling how uncertainty columns become replicate weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeListOptions {
    /// Prepend a uniform-weight replicate before the uncertainty-weighted ones when a
    /// record carries uncertainties.
    pub unweighted_baseline: bool,
    /// Start each pair's error at its first uncertainty instead of unset, so the
    /// reported error is never below the measurement's own uncertainty.
    pub uncertainty_error_floor: bool,
}

/// One parsed line of an edge list.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub ddg: Decimal,
    pub uncertainties: Vec<Decimal>,
}

impl EdgeRecord {
    /// Parses `node_a node_b ddG [uncertainty_1 uncertainty_2 ...]`.
    pub fn parse(line: &str) -> Result<Self, EdgeListParseErrorKind> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return Err(EdgeListParseErrorKind::TooFewFields {
                found: fields.len(),
            });
        }

        let ddg = parse_decimal(fields[2], 3)?;
        let uncertainties = fields[MIN_FIELDS..]
            .iter()
            .enumerate()
            .map(|(i, value)| parse_decimal(value, MIN_FIELDS + i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: fields[0].to_string(),
            target: fields[1].to_string(),
            ddg,
            uncertainties,
        })
    }

    pub fn has_uncertainties(&self) -> bool {
        !self.uncertainties.is_empty()
    }

    /// Replicate weights for this record: `1` without uncertainties, otherwise the
    /// squared uncertainties (optionally preceded by a uniform column).
    pub fn weights(&self, options: &EdgeListOptions) -> Result<Vec<Decimal>, EdgeListParseErrorKind> {
        if !self.has_uncertainties() {
            return Ok(vec![Decimal::ONE]);
        }
        let mut weights = Vec::with_capacity(self.uncertainties.len() + 1);
        if options.unweighted_baseline {
            weights.push(Decimal::ONE);
        }
        for (i, sigma) in self.uncertainties.iter().enumerate() {
            let squared =
                sigma
                    .checked_mul(*sigma)
                    .ok_or_else(|| EdgeListParseErrorKind::OutOfRange {
                        field: MIN_FIELDS + i + 1,
                        value: sigma.to_string(),
                    })?;
            weights.push(squared);
        }
        Ok(weights)
    }
}

fn weighting_name(weighted: bool) -> &'static str {
    if weighted { "carry" } else { "have no" }
}

fn parse_decimal(value: &str, field: usize) -> Result<Decimal, EdgeListParseErrorKind> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| EdgeListParseErrorKind::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

pub struct EdgeListFile;

impl NetworkFile for EdgeListFile {
    type Options = EdgeListOptions;
    type Error = EdgeListError;

    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<PerturbationGraph, Self::Error> {
        let mut graph = PerturbationGraph::new();
        let mut weighted: Option<bool> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            if line.trim().is_empty() {
                continue;
            }

            let parse_error = |kind: EdgeListParseErrorKind| EdgeListError::Parse {
                line: line_num,
                kind,
            };

            let record = EdgeRecord::parse(&line).map_err(parse_error)?;
            let has_uncertainties = record.has_uncertainties();
            match weighted {
                Some(expected) if expected != has_uncertainties => {
                    return Err(parse_error(EdgeListParseErrorKind::MixedWeighting {
                        expected: weighting_name(expected),
                        found: weighting_name(has_uncertainties),
                    }));
                }
                Some(_) => {}
                None => weighted = Some(has_uncertainties),
            }

            let weights = record.weights(options).map_err(parse_error)?;
            let pair_id = graph
                .add_pair(&record.source, &record.target, record.ddg, weights)
                .map_err(|e| parse_error(e.into()))?;

            if options.uncertainty_error_floor {
                if let Some(first) = record.uncertainties.first() {
                    graph.set_error_floor(pair_id, first.abs());
                }
            }
        }

        debug!(
            nodes = graph.node_count(),
            pairs = graph.pair_count(),
            replicates = graph.replicate_count(),
            "Edge list loaded."
        );
        Ok(graph)
    }
}

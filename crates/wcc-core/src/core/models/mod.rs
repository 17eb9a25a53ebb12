//! # Core Models Module
//!
//! Data structures describing a relative free-energy perturbation network.
//!
//! ## Overview
//!
//! A network is a set of molecules (nodes) joined by perturbations (pairs). Every pair
//! carries one raw ddG measurement, one weight per replicate column, one corrected ddG
//! per replicate column, and a single pairwise error estimate. Closed walks through the
//! network are represented as [`cycle::Cycle`] values.
//!
//! ## Key Components
//!
//! - [`graph`] - The perturbation network with per-pair measurements and corrections
//! - [`cycle`] - Closed walks and their canonical deduplication keys
//! - [`ids`] - Stable identifiers for nodes and pairs
//!
//! ```ignore
//! use wcc::core::models::graph::PerturbationGraph;
//! use rust_decimal::Decimal;
//!
//! let mut graph = PerturbationGraph::new();
//! graph.add_pair("L1", "L2", Decimal::ONE, vec![Decimal::ONE])?;
//! ```

pub mod cycle;
pub mod graph;
pub mod ids;

//! # WCC Core Library
//!
//! Weighted cycle closure for relative free-energy perturbation networks. The library
//! enforces thermodynamic consistency on a network of pairwise ddG measurements: the
//! signed sum around every closed loop is driven to zero by redistributing each loop's
//! discrepancy over its edges in proportion to their uncertainty-derived weights, and
//! every pair receives an error estimate from the loops it belongs to.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models (`PerturbationGraph`, `Cycle`)
//!   and I/O: the edge-list reader and the report writers.
//!
//! - **[`engine`]: The Logic Core.** Configuration, errors, progress reporting and the
//!   algorithmic tasks: cycle enumeration, pairwise error estimation and the iterative
//!   closure solver. All arithmetic is exact decimal; rounding happens only on display.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together into a single
//!   call that takes a loaded network to a finished report.

pub mod core;
pub mod engine;
pub mod workflows;

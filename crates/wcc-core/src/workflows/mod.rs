//! # Workflows Module
//!
//! High-level entry points that run a complete cycle-closure procedure on a loaded
//! perturbation network.
//!
//! - **Closure Workflow** ([`close`]) - reference validation, cycle discovery, weighted
//!   closure of every replicate, pairwise error estimation and report assembly.

pub mod close;

//! # Engine Module
//!
//! The stateful layer that drives a perturbation network towards thermodynamic
//! consistency.
//!
//! ## Overview
//!
//! The engine discovers the simple cycles of a network, estimates a pairwise error from
//! each pair's worst qualifying cycle, and then repeatedly redistributes every cycle's
//! closure discrepancy over its edges in proportion to their weights until no corrected
//! value moves by more than the configured tolerance. Each replicate column is closed
//! independently.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Convergence tolerance, iteration bounds, error policy
//! - **State Tracking** ([`state`]) - Per-replicate convergence summaries
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types
//! - **Tasks** (`tasks`) - Cycle search, pairwise error estimation and closure passes

pub mod config;
pub mod error;
pub mod progress;
pub mod state;
pub(crate) mod tasks;

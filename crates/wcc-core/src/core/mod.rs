//! # Core Module
//!
//! Stateless building blocks of the cycle-closure library: the perturbation network
//! model and the readers and writers that move it in and out of files.
//!
//! ## Architecture
//!
//! - **Network Representation** ([`models`]) - Nodes, pairs, per-replicate values and cycles
//! - **File I/O** ([`io`]) - The whitespace-separated edge-list format and report writers
//!
//! Nothing in this module iterates towards a solution; that is the job of
//! [`crate::engine`].

pub mod io;
pub mod models;

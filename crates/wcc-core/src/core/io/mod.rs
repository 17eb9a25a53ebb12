//! Reading perturbation networks from edge-list files and writing closure reports.
//!
//! Input goes through the [`traits::NetworkFile`] interface, implemented by
//! [`edge_list::EdgeListFile`] for the whitespace-separated `node_a node_b ddG [sigma...]`
//! format. Output is assembled by [`report::Report`], which renders a human-readable
//! table and the machine-readable hand-off documents.

pub mod edge_list;
pub mod report;
pub mod traits;

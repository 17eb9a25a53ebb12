use crate::core::models::graph::PerturbationGraph;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading perturbation networks from a file format.
///
/// Implementors turn a stream of records into a fully built [`PerturbationGraph`].
/// A failed read never yields a partially built network.
pub trait NetworkFile {
    /// Format-specific switches that change how records become pairs.
    type Options: Default;

    /// The error type for read operations.
    type Error: Error + From<io::Error>;

    /// Reads a network from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    /// * `options` - Format-specific options.
    ///
    /// # Errors
    ///
    /// Returns an error if any record is malformed or the reader fails.
    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<PerturbationGraph, Self::Error>;

    /// Reads a network from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        options: &Self::Options,
    ) -> Result<PerturbationGraph, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, options)
    }
}

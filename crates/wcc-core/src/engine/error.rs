use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("The perturbation network contains no molecules")]
    EmptyNetwork,

    #[error("Reference molecule '{label}' is not present in the network")]
    ReferenceNotFound { label: String },

    #[error("Cycle {cycle} has a zero weight sum for replicate {replicate}")]
    DegenerateWeights { cycle: usize, replicate: usize },

    #[error("Decimal overflow while closing the cycles of replicate {replicate}")]
    Overflow { replicate: usize },

    #[error("Replicate {replicate} failed to converge after {iterations} iterations")]
    Convergence { replicate: usize, iterations: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

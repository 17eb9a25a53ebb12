use rust_decimal::Decimal;

/// Outcome of closing every cycle for one replicate column.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateSummary {
    pub replicate: usize,
    /// Passes performed, counting the initial error-estimation pass.
    pub iterations: usize,
    /// Largest absolute cycle discrepancy before any correction.
    pub initial_max_discrepancy: Decimal,
    /// Largest absolute cycle discrepancy once the replicate converged.
    pub final_max_discrepancy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClosureSummary {
    pub cycle_count: usize,
    pub replicates: Vec<ReplicateSummary>,
}

impl ClosureSummary {
    pub fn total_iterations(&self) -> usize {
        self.replicates.iter().map(|r| r.iterations).sum()
    }
}

//! Recalculation reporting.

/// Summary of one ordered recompute pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Time taken in milliseconds.
    pub duration_ms: u64,

    /// Number of formula cells that were recomputed.
    pub cells_recomputed: usize,

    /// Maximum dependency depth encountered.
    /// A formula with no formula precedents has depth 1.
    pub max_depth: usize,

    /// True if cycles were detected. Cycle cells are marked #CYCLE!.
    pub had_cycles: bool,

    /// Number of cells participating in circular reference cycles.
    pub cycle_cells: usize,

    /// Number of cells whose value is an error after this pass.
    pub errors: usize,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line log entry.
    ///
    /// Format: `[recalc]    3ms  14 cells  depth=2  cycles=0  errors=0`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {:>4}ms  {} cells  depth={}  cycles={}  errors={}",
            self.duration_ms,
            self.cells_recomputed,
            self.max_depth,
            self.cycle_cells,
            self.errors
        )
    }
}

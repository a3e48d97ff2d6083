//! Operation-level failures.
//!
//! Per-cell computation errors are values (`cell::CellError`), never Rust
//! errors. `EngineError` covers the few failures that reject an operation
//! outright: bad sheet addressing, out-of-range structural edits, invalid
//! sheet names. A rejected operation leaves the workbook untouched and does
//! not consume a revision.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Sheet index, id, or name does not resolve to an existing sheet.
    UnknownSheet(String),
    /// Structural index/count outside the sheet bounds, or zero count.
    BadRange {
        op: &'static str,
        at: usize,
        count: usize,
    },
    /// The last remaining sheet cannot be deleted.
    LastSheet,
    /// Invalid or duplicate sheet name.
    BadName(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSheet(what) => write!(f, "unknown sheet: {what}"),
            Self::BadRange { op, at, count } => {
                write!(f, "{op}: index {at} count {count} out of range")
            }
            Self::LastSheet => write!(f, "cannot delete the last sheet"),
            Self::BadName(name) => write!(f, "invalid or duplicate sheet name: '{name}'"),
        }
    }
}

impl std::error::Error for EngineError {}

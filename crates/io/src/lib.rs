//! Grid I/O boundary adapters.
//!
//! Converts between CSV text and the rectangular string matrices the
//! engine's import/export boundary speaks. The engine itself never sees
//! file formats; everything here lowers to `Workbook::import_rows` /
//! `Workbook::export_rows`.

use std::fmt;

pub mod csv;

#[derive(Debug)]
pub enum IoError {
    /// File read/write failure.
    Io(String),
    /// CSV parse/serialize failure.
    Parse(String),
    /// Engine rejected the operation (bad sheet, etc.).
    Engine(fingrid_engine::error::EngineError),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Engine(err) => write!(f, "engine error: {err}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<fingrid_engine::error::EngineError> for IoError {
    fn from(err: fingrid_engine::error::EngineError) -> Self {
        IoError::Engine(err)
    }
}

//! In-memory tabular formula evaluation engine.
//!
//! Per-session computation core for a spreadsheet workspace: cell store,
//! formula parser, dependency graph, ordered evaluator, structural
//! row/column mutation, and a revision-counter/event change-notification
//! contract. Single-writer by design; wrap a [`workbook::Workbook`] in a
//! mutex or single-writer actor per sheet-set when the host is concurrent.

pub mod cell;
pub mod cell_id;
pub mod dep_graph;
pub mod error;
pub mod events;
pub mod formula;
pub mod ops;
pub mod recalc;
pub mod sheet;
pub mod workbook;

//! Reference extraction from formula AST.
//!
//! Extracts the exact set of cells a formula reads, as `CellId`s for
//! dependency graph construction. The set is a syntactic fact: ranges
//! expand over their current rectangle, independent of cell values.

use rustc_hash::FxHashSet;

use crate::cell_id::CellId;
use crate::sheet::SheetId;

use super::parser::Expr;

/// Extract all cell references from an expression.
///
/// `context_sheet` is the sheet the formula lives on; all references are
/// same-sheet. Deleted references contribute no edges (the formula errors
/// regardless of what those cells do).
pub fn extract_cell_ids(expr: &Expr, context_sheet: SheetId) -> FxHashSet<CellId> {
    let mut refs = FxHashSet::default();
    collect_refs(expr, context_sheet, &mut refs);
    refs
}

fn collect_refs(expr: &Expr, sheet: SheetId, refs: &mut FxHashSet<CellId>) {
    match expr {
        Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) | Expr::DeletedRef => {}

        Expr::CellRef { row, col, .. } => {
            refs.insert(CellId::new(sheet, *row, *col));
        }

        Expr::Range {
            start_row,
            start_col,
            end_row,
            end_col,
            ..
        } => {
            // Expand the rectangle to individual cells
            for row in *start_row..=*end_row {
                for col in *start_col..=*end_col {
                    refs.insert(CellId::new(sheet, row, col));
                }
            }
        }

        Expr::Function { args, .. } => {
            for arg in args {
                collect_refs(arg, sheet, refs);
            }
        }

        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, sheet, refs);
            collect_refs(right, sheet, refs);
        }
    }
}

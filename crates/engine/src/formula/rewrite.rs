//! Reference rewriting for structural edits.
//!
//! When rows or columns are inserted or deleted, every formula whose
//! references fall beyond the mutation boundary must be renumbered.
//! References inside a deleted span turn into `DeletedRef` (`#REF!`);
//! ranges partially overlapping a deleted span shrink to the surviving
//! portion; a range whose entire span is deleted becomes `DeletedRef`.

use super::parser::Expr;

/// Axis a structural edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

/// A structural edit, as seen by formula references.
#[derive(Debug, Clone, Copy)]
pub enum RefEdit {
    Insert { axis: Axis, at: usize, count: usize },
    Delete { axis: Axis, at: usize, count: usize },
}

impl RefEdit {
    fn axis(&self) -> Axis {
        match self {
            RefEdit::Insert { axis, .. } | RefEdit::Delete { axis, .. } => *axis,
        }
    }
}

/// Rewrite an expression for a structural edit.
///
/// Returns the rewritten tree and whether anything changed. Absolute
/// markers do not pin references against structural shifts; they only
/// matter for copy/fill semantics.
pub fn rewrite(expr: &Expr, edit: RefEdit) -> (Expr, bool) {
    match expr {
        Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) | Expr::DeletedRef => {
            (expr.clone(), false)
        }

        Expr::CellRef {
            row,
            col,
            col_abs,
            row_abs,
        } => {
            let index = match edit.axis() {
                Axis::Rows => *row,
                Axis::Cols => *col,
            };
            match shift_index(index, edit) {
                None => (expr.clone(), false),
                Some(Shift::Deleted) => (Expr::DeletedRef, true),
                Some(Shift::To(new_index)) => {
                    let (row, col) = match edit.axis() {
                        Axis::Rows => (new_index, *col),
                        Axis::Cols => (*row, new_index),
                    };
                    (
                        Expr::CellRef {
                            row,
                            col,
                            col_abs: *col_abs,
                            row_abs: *row_abs,
                        },
                        true,
                    )
                }
            }
        }

        Expr::Range {
            start_col,
            start_row,
            end_col,
            end_row,
            start_col_abs,
            start_row_abs,
            end_col_abs,
            end_row_abs,
        } => {
            let (start, end) = match edit.axis() {
                Axis::Rows => (*start_row, *end_row),
                Axis::Cols => (*start_col, *end_col),
            };
            match shift_span(start, end, edit) {
                None => (expr.clone(), false),
                Some(SpanShift::Deleted) => (Expr::DeletedRef, true),
                Some(SpanShift::To(new_start, new_end)) => {
                    let (start_row, end_row, start_col, end_col) = match edit.axis() {
                        Axis::Rows => (new_start, new_end, *start_col, *end_col),
                        Axis::Cols => (*start_row, *end_row, new_start, new_end),
                    };
                    (
                        Expr::Range {
                            start_col,
                            start_row,
                            end_col,
                            end_row,
                            start_col_abs: *start_col_abs,
                            start_row_abs: *start_row_abs,
                            end_col_abs: *end_col_abs,
                            end_row_abs: *end_row_abs,
                        },
                        true,
                    )
                }
            }
        }

        Expr::Function { name, args } => {
            let mut changed = false;
            let new_args = args
                .iter()
                .map(|arg| {
                    let (rewritten, arg_changed) = rewrite(arg, edit);
                    changed |= arg_changed;
                    rewritten
                })
                .collect();
            (
                Expr::Function {
                    name: name.clone(),
                    args: new_args,
                },
                changed,
            )
        }

        Expr::BinaryOp { op, left, right } => {
            let (new_left, left_changed) = rewrite(left, edit);
            let (new_right, right_changed) = rewrite(right, edit);
            (
                Expr::BinaryOp {
                    op: *op,
                    left: Box::new(new_left),
                    right: Box::new(new_right),
                },
                left_changed || right_changed,
            )
        }
    }
}

enum Shift {
    To(usize),
    Deleted,
}

/// Where a single index lands. `None` means unchanged.
fn shift_index(index: usize, edit: RefEdit) -> Option<Shift> {
    match edit {
        RefEdit::Insert { at, count, .. } => {
            if index >= at {
                Some(Shift::To(index + count))
            } else {
                None
            }
        }
        RefEdit::Delete { at, count, .. } => {
            if index >= at + count {
                Some(Shift::To(index - count))
            } else if index >= at {
                Some(Shift::Deleted)
            } else {
                None
            }
        }
    }
}

enum SpanShift {
    To(usize, usize),
    Deleted,
}

/// Where a [start, end] span lands. `None` means unchanged.
///
/// An insert inside the span grows it; a delete overlapping one side
/// shrinks it; a delete covering the whole span removes it.
fn shift_span(start: usize, end: usize, edit: RefEdit) -> Option<SpanShift> {
    match edit {
        RefEdit::Insert { at, count, .. } => {
            let new_start = if start >= at { start + count } else { start };
            let new_end = if end >= at { end + count } else { end };
            if new_start == start && new_end == end {
                None
            } else {
                Some(SpanShift::To(new_start, new_end))
            }
        }
        RefEdit::Delete { at, count, .. } => {
            if start >= at && end < at + count {
                return Some(SpanShift::Deleted);
            }
            let new_start = if start >= at + count {
                start - count
            } else if start >= at {
                at
            } else {
                start
            };
            // end >= at implies start < at here (whole-span case handled above),
            // so at >= 1 and the subtraction below cannot underflow.
            let new_end = if end >= at + count {
                end - count
            } else if end >= at {
                at - 1
            } else {
                end
            };
            if new_start == start && new_end == end {
                None
            } else {
                Some(SpanShift::To(new_start, new_end))
            }
        }
    }
}

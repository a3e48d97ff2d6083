//! The cell store.
//!
//! A `Sheet` owns the canonical content and last-computed value of every
//! addressed cell. All mutations here are pure store operations: dependency
//! bookkeeping and recomputation are orchestrated by the workbook so that
//! they happen atomically with content changes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellContent, CellStyle, Value};

/// Stable sheet identity. Monotonically assigned, never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetId(pub u64);

impl SheetId {
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        SheetId(raw)
    }
}

/// Case-insensitive key for sheet name uniqueness.
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn is_valid_sheet_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed.len() <= 64
        && !trimmed.contains(['!', '\'', ':', '[', ']'])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub id: SheetId,
    pub name: String,
    pub(crate) name_key: String,
    cells: FxHashMap<(usize, usize), Cell>,
    pub rows: usize,
    pub cols: usize,
}

impl Sheet {
    pub fn new(id: SheetId, rows: usize, cols: usize) -> Self {
        Self::new_with_name(id, rows, cols, "Sheet1")
    }

    pub fn new_with_name(id: SheetId, rows: usize, cols: usize, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            name_key: normalize_sheet_name(name),
            cells: FxHashMap::default(),
            rows,
            cols,
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.name_key = normalize_sheet_name(name);
    }

    /// Replace a cell's raw content. Grows the addressable bounds if the
    /// write lands outside them. Pure store mutation; no recomputation.
    pub fn set_input(&mut self, row: usize, col: usize, input: &str) {
        self.grow_to(row, col);
        self.cells.entry((row, col)).or_insert_with(Cell::new).set_input(input);
    }

    /// Replace a cell's content with a literal (import path; `=` text stays text).
    pub fn set_literal(&mut self, row: usize, col: usize, input: &str) {
        self.grow_to(row, col);
        self.cells.entry((row, col)).or_insert_with(Cell::new).set_literal(input);
    }

    fn grow_to(&mut self, row: usize, col: usize) {
        if row >= self.rows {
            self.rows = row + 1;
        }
        if col >= self.cols {
            self.cols = col + 1;
        }
    }

    /// Write a computed value back into the store (recompute loop only).
    pub(crate) fn set_computed(&mut self, row: usize, col: usize, value: Value) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.value = value;
        }
    }

    /// Install a structurally-rewritten formula: new AST plus re-rendered
    /// source text. The cached value is left for the following recompute.
    pub(crate) fn set_formula_rewritten(
        &mut self,
        row: usize,
        col: usize,
        source: String,
        ast: crate::formula::parser::Expr,
    ) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.content = CellContent::Formula {
                source,
                ast: Some(ast),
            };
        }
    }

    /// Raw content: literal text or formula source. Empty for unset cells.
    pub fn raw(&self, row: usize, col: usize) -> String {
        self.cells
            .get(&(row, col))
            .map(|c| c.content.raw_display())
            .unwrap_or_default()
    }

    /// Last computed value. Empty for unset cells.
    pub fn value(&self, row: usize, col: usize) -> Value {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or(Value::Empty)
    }

    /// Computed value rendered for display.
    pub fn display(&self, row: usize, col: usize) -> String {
        self.value(row, col).to_display()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Remove a cell entirely (reverts to empty/default).
    pub fn clear_cell(&mut self, row: usize, col: usize) {
        self.cells.remove(&(row, col));
    }

    /// Remove every cell. Dimensions are retained.
    pub fn clear_all(&mut self) {
        self.cells.clear();
    }

    /// Iterate over all populated cells.
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// Positions of all formula cells.
    pub fn formula_positions(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.content.is_formula())
            .map(|(pos, _)| *pos)
            .collect()
    }

    /// Bottom-right extent of populated data, if any.
    pub fn data_extent(&self) -> Option<(usize, usize)> {
        let mut extent: Option<(usize, usize)> = None;
        for (row, col) in self.cells.keys() {
            let (max_row, max_col) = extent.get_or_insert((*row, *col));
            *max_row = (*max_row).max(*row);
            *max_col = (*max_col).max(*col);
        }
        extent
    }

    pub fn set_style(&mut self, row: usize, col: usize, style: CellStyle) {
        self.grow_to(row, col);
        self.cells.entry((row, col)).or_insert_with(Cell::new).style = style;
    }

    pub fn style(&self, row: usize, col: usize) -> CellStyle {
        self.cells
            .get(&(row, col))
            .map(|c| c.style.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Structural shifts (store only; formula rewriting is the workbook's job)
    // =========================================================================

    /// Insert rows, shifting stored cells at or beyond `at_row` down.
    /// Cells shifted past the sheet bounds are dropped.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((r, _), _)| *r >= at_row)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            if r + count < self.rows {
                self.cells.insert((r + count, c), cell);
            }
        }
    }

    /// Delete rows, discarding cells in the span and shifting the rest up.
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        self.cells
            .retain(|(r, _), _| *r < start_row || *r >= start_row + count);

        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((r, _), _)| *r >= start_row + count)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            self.cells.insert((r - count, c), cell);
        }
    }

    /// Insert columns, shifting stored cells at or beyond `at_col` right.
    pub fn insert_cols(&mut self, at_col: usize, count: usize) {
        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((_, c), _)| *c >= at_col)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            if c + count < self.cols {
                self.cells.insert((r, c + count), cell);
            }
        }
    }

    /// Delete columns, discarding cells in the span and shifting the rest left.
    pub fn delete_cols(&mut self, start_col: usize, count: usize) {
        self.cells
            .retain(|(_, c), _| *c < start_col || *c >= start_col + count);

        let cells_to_shift: Vec<_> = self
            .cells
            .iter()
            .filter(|((_, c), _)| *c >= start_col + count)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            self.cells.insert((r, c - count), cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellContent;

    fn sheet() -> Sheet {
        Sheet::new(SheetId(1), 10, 10)
    }

    #[test]
    fn test_unset_cells_read_empty() {
        let s = sheet();
        assert_eq!(s.raw(3, 3), "");
        assert_eq!(s.value(3, 3), Value::Empty);
        assert!(s.cell(3, 3).is_none());
    }

    #[test]
    fn test_set_input_classifies() {
        let mut s = sheet();
        s.set_input(0, 0, "42");
        s.set_input(0, 1, "hello");
        s.set_input(0, 2, "=A1*2");

        assert_eq!(s.value(0, 0), Value::Number(42.0));
        assert_eq!(s.value(0, 1), Value::Text("hello".to_string()));
        assert!(s.cell(0, 2).unwrap().content.is_formula());
        assert_eq!(s.raw(0, 2), "=A1*2");
    }

    #[test]
    fn test_set_literal_never_parses_formula() {
        let mut s = sheet();
        s.set_literal(0, 0, "=A1*2");
        assert!(matches!(
            s.cell(0, 0).unwrap().content,
            CellContent::Text(_)
        ));
    }

    #[test]
    fn test_grow_on_out_of_bounds_write() {
        let mut s = sheet();
        s.set_input(50, 30, "x");
        assert_eq!(s.rows, 51);
        assert_eq!(s.cols, 31);
    }

    #[test]
    fn test_clear_cell_removes_storage() {
        let mut s = sheet();
        s.set_input(1, 1, "7");
        s.clear_cell(1, 1);
        assert!(s.cell(1, 1).is_none());
        assert_eq!(s.value(1, 1), Value::Empty);
    }

    #[test]
    fn test_data_extent() {
        let mut s = sheet();
        assert_eq!(s.data_extent(), None);
        s.set_input(2, 1, "a");
        s.set_input(0, 4, "b");
        assert_eq!(s.data_extent(), Some((2, 4)));
    }

    #[test]
    fn test_insert_rows_shifts_down() {
        let mut s = sheet();
        s.set_input(0, 0, "top");
        s.set_input(1, 0, "bottom");

        s.insert_rows(1, 2);

        assert_eq!(s.raw(0, 0), "top");
        assert_eq!(s.raw(1, 0), "");
        assert_eq!(s.raw(3, 0), "bottom");
    }

    #[test]
    fn test_delete_rows_discards_span() {
        let mut s = sheet();
        s.set_input(0, 0, "a");
        s.set_input(1, 0, "b");
        s.set_input(2, 0, "c");

        s.delete_rows(0, 2);

        assert_eq!(s.raw(0, 0), "c");
        assert!(s.cell(1, 0).is_none());
        assert!(s.cell(2, 0).is_none());
    }

    #[test]
    fn test_insert_cols_shifts_right() {
        let mut s = sheet();
        s.set_input(0, 0, "a");
        s.set_input(0, 1, "b");

        s.insert_cols(1, 1);

        assert_eq!(s.raw(0, 0), "a");
        assert_eq!(s.raw(0, 1), "");
        assert_eq!(s.raw(0, 2), "b");
    }

    #[test]
    fn test_delete_cols_shifts_left() {
        let mut s = sheet();
        s.set_input(0, 0, "a");
        s.set_input(0, 1, "b");
        s.set_input(0, 2, "c");

        s.delete_cols(1, 1);

        assert_eq!(s.raw(0, 0), "a");
        assert_eq!(s.raw(0, 1), "c");
        assert!(s.cell(0, 2).is_none());
    }

    #[test]
    fn test_insert_rows_drops_overflow() {
        let mut s = Sheet::new(SheetId(1), 3, 3);
        s.set_input(2, 0, "last");
        s.insert_rows(0, 1);
        // Shifted past the bottom bound; dropped
        assert!(s.cells_iter().next().is_none());
    }

    #[test]
    fn test_style_persists_with_value() {
        let mut s = sheet();
        s.set_style(0, 0, CellStyle { bold: true, ..Default::default() });
        s.set_input(0, 0, "x");
        assert!(s.style(0, 0).bold);
    }

    #[test]
    fn test_sheet_name_validation() {
        assert!(is_valid_sheet_name("Revenue 2026"));
        assert!(!is_valid_sheet_name(""));
        assert!(!is_valid_sheet_name("   "));
        assert!(!is_valid_sheet_name("bad!name"));
        assert_eq!(normalize_sheet_name(" Sheet1 "), "sheet1");
    }
}

//! The workbook: transaction orchestrator over store, graph, and evaluator.
//!
//! Every public mutation is one transaction: store writes, dependency
//! bookkeeping, and one ordered recompute happen before the revision is
//! bumped and events are pushed, so readers never observe a revision with
//! partially applied values. Rejected operations (`Err`) leave everything
//! untouched.
//!
//! The workbook is single-writer by construction (`&mut self`, no interior
//! mutability). Concurrent hosts wrap it in a mutex or single-writer actor
//! per sheet-set; reads are safe to share between write transactions.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::cell::{CellError, Value};
use crate::cell_id::CellId;
use crate::dep_graph::DepGraph;
use crate::error::EngineError;
use crate::events::{
    BatchAppliedEvent, CellsChangedEvent, EventCollector, RevisionChangedEvent, WorkbookEvent,
};
use crate::formula::eval::{evaluate, ValueLookup};
use crate::formula::parser::format_expr;
use crate::formula::refs::extract_cell_ids;
use crate::formula::rewrite::{rewrite, Axis, RefEdit};
use crate::ops::{CellWrite, EditScript};
use crate::recalc::RecalcReport;
use crate::sheet::{is_valid_sheet_name, normalize_sheet_name, Sheet, SheetId};

/// Default grid dimensions for new sheets.
pub const DEFAULT_ROWS: usize = 1000;
pub const DEFAULT_COLS: usize = 26;

/// Result of a completed mutation transaction.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Revision after the transaction.
    pub revision: u64,
    /// Number of writes stored.
    pub applied: usize,
    /// Cells whose value or content changed (writes plus recomputed
    /// dependents), deduplicated.
    pub changed: Vec<CellId>,
}

#[derive(Debug, Clone, Copy)]
enum StructuralOp {
    InsertRows,
    DeleteRows,
    InsertCols,
    DeleteCols,
}

impl StructuralOp {
    fn name(&self) -> &'static str {
        match self {
            StructuralOp::InsertRows => "insert_rows",
            StructuralOp::DeleteRows => "delete_rows",
            StructuralOp::InsertCols => "insert_cols",
            StructuralOp::DeleteCols => "delete_cols",
        }
    }

    fn axis(&self) -> Axis {
        match self {
            StructuralOp::InsertRows | StructuralOp::DeleteRows => Axis::Rows,
            StructuralOp::InsertCols | StructuralOp::DeleteCols => Axis::Cols,
        }
    }

    fn is_insert(&self) -> bool {
        matches!(self, StructuralOp::InsertRows | StructuralOp::InsertCols)
    }
}

/// A workbook containing one or more sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Next ID to assign to a new sheet. Monotonically increasing, never reused.
    next_sheet_id: u64,

    /// Dependency graph for formula cells. Rebuilt on load, updated
    /// incrementally on cell changes.
    #[serde(skip)]
    dep_graph: DepGraph,

    /// Monotonically increasing, bumped exactly once per completed
    /// mutation transaction. Session state, not persisted.
    #[serde(skip)]
    revision: u64,

    #[serde(skip)]
    events: EventCollector,

    #[serde(skip)]
    last_recalc: RecalcReport,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one default sheet.
    pub fn new() -> Self {
        let sheet = Sheet::new(SheetId(1), DEFAULT_ROWS, DEFAULT_COLS);
        Self {
            sheets: vec![sheet],
            next_sheet_id: 2,
            dep_graph: DepGraph::new(),
            revision: 0,
            events: EventCollector::new(),
            last_recalc: RecalcReport::new(),
        }
    }

    fn generate_sheet_id(&mut self) -> SheetId {
        let id = SheetId(self.next_sheet_id);
        self.next_sheet_id += 1;
        id
    }

    // =========================================================================
    // Sheet access
    // =========================================================================

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet_by_id(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    fn sheet_by_id_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.id == id)
    }

    pub fn sheet_id_at_idx(&self, index: usize) -> Option<SheetId> {
        self.sheets.get(index).map(|s| s.id)
    }

    /// Find a sheet index by name (case-insensitive).
    pub fn sheet_index_by_name(&self, name: &str) -> Option<usize> {
        let key = normalize_sheet_name(name);
        self.sheets.iter().position(|s| s.name_key == key)
    }

    fn resolve(&self, index: usize) -> Result<SheetId, EngineError> {
        self.sheets
            .get(index)
            .map(|s| s.id)
            .ok_or_else(|| EngineError::UnknownSheet(format!("index {index}")))
    }

    // =========================================================================
    // Sheet management
    // =========================================================================

    /// Add a new sheet with a generated unique name; returns its index.
    pub fn add_sheet(&mut self) -> usize {
        let mut n = self.sheets.len() + 1;
        let mut name = format!("Sheet{}", n);
        while self.sheet_index_by_name(&name).is_some() {
            n += 1;
            name = format!("Sheet{}", n);
        }
        let id = self.generate_sheet_id();
        self.sheets
            .push(Sheet::new_with_name(id, DEFAULT_ROWS, DEFAULT_COLS, &name));
        self.sheets.len() - 1
    }

    /// Add a new sheet with a specific name.
    pub fn add_sheet_named(&mut self, name: &str) -> Result<usize, EngineError> {
        if !is_valid_sheet_name(name) || self.sheet_index_by_name(name).is_some() {
            return Err(EngineError::BadName(name.to_string()));
        }
        let id = self.generate_sheet_id();
        self.sheets
            .push(Sheet::new_with_name(id, DEFAULT_ROWS, DEFAULT_COLS, name));
        Ok(self.sheets.len() - 1)
    }

    /// Rename a sheet. Does not consume a revision: names play no part in
    /// cell computation.
    pub fn rename_sheet(&mut self, index: usize, new_name: &str) -> Result<(), EngineError> {
        if !is_valid_sheet_name(new_name) {
            return Err(EngineError::BadName(new_name.to_string()));
        }
        let id = self.resolve(index)?;
        let key = normalize_sheet_name(new_name);
        if self.sheets.iter().any(|s| s.id != id && s.name_key == key) {
            return Err(EngineError::BadName(new_name.to_string()));
        }
        if let Some(sheet) = self.sheet_by_id_mut(id) {
            sheet.set_name(new_name);
        }
        Ok(())
    }

    /// Delete a sheet and every dependency edge that touches it.
    pub fn delete_sheet(&mut self, index: usize) -> Result<ApplyResult, EngineError> {
        let id = self.resolve(index)?;
        if self.sheets.len() <= 1 {
            return Err(EngineError::LastSheet);
        }
        self.sheets.retain(|s| s.id != id);
        self.dep_graph.remove_sheet(id);
        Ok(self.commit(0, 0, ChangeSet::new()))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Raw content: literal text or formula source. Empty for unset cells.
    pub fn content(&self, sheet_idx: usize, row: usize, col: usize) -> Result<String, EngineError> {
        let id = self.resolve(sheet_idx)?;
        Ok(self.sheet_by_id(id).map(|s| s.raw(row, col)).unwrap_or_default())
    }

    /// Cached computed value; a scalar or a per-cell error, never a failure.
    pub fn value(&self, sheet_idx: usize, row: usize, col: usize) -> Result<Value, EngineError> {
        let id = self.resolve(sheet_idx)?;
        Ok(self
            .sheet_by_id(id)
            .map(|s| s.value(row, col))
            .unwrap_or(Value::Empty))
    }

    /// Monotonically increasing revision counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Events accumulated since the last drain.
    pub fn events(&self) -> &EventCollector {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorkbookEvent> {
        self.events.drain()
    }

    /// Summary of the most recent recompute pass.
    pub fn last_recalc(&self) -> &RecalcReport {
        &self.last_recalc
    }

    pub fn dep_graph(&self) -> &DepGraph {
        &self.dep_graph
    }

    // =========================================================================
    // Mutation transactions
    // =========================================================================

    /// Single-cell edit: a batch of one.
    pub fn set_cell(
        &mut self,
        sheet_idx: usize,
        row: usize,
        col: usize,
        input: &str,
    ) -> Result<ApplyResult, EngineError> {
        self.apply_batch(sheet_idx, &[CellWrite::new(row, col, input)])
    }

    /// Clear a cell back to empty.
    pub fn clear_cell(
        &mut self,
        sheet_idx: usize,
        row: usize,
        col: usize,
    ) -> Result<ApplyResult, EngineError> {
        self.set_cell(sheet_idx, row, col, "")
    }

    /// Apply an ordered list of writes as one transaction: every write is
    /// stored in order (later writes to the same address win), then one
    /// recompute runs over the combined dependent closure and the revision
    /// is bumped once. A malformed formula does not abort the batch; that
    /// cell resolves to a syntax-error value.
    pub fn apply_batch(
        &mut self,
        sheet_idx: usize,
        writes: &[CellWrite],
    ) -> Result<ApplyResult, EngineError> {
        let sheet_id = self.resolve(sheet_idx)?;

        let mut seeds = FxHashSet::default();
        let mut changed = ChangeSet::new();

        for write in writes {
            self.store_write(sheet_idx, sheet_id, write, false, &mut seeds, &mut changed);
        }

        self.recompute(&seeds, &mut changed);
        Ok(self.commit(writes.len(), writes.len(), changed))
    }

    /// Apply an externally proposed edit script (AI boundary). Only the
    /// syntactic validity of each write is checked; intent is not.
    pub fn apply_edit_script(
        &mut self,
        sheet_idx: usize,
        script: &EditScript,
    ) -> Result<ApplyResult, EngineError> {
        let writes = script.writes();
        self.apply_batch(sheet_idx, &writes)
    }

    /// Replace a sheet's full content region with a rectangular matrix of
    /// literals, in one transaction. Fields that look like formulas are
    /// stored as text: imports never introduce computation.
    pub fn import_rows(
        &mut self,
        sheet_idx: usize,
        rows: &[Vec<String>],
    ) -> Result<ApplyResult, EngineError> {
        let sheet_id = self.resolve(sheet_idx)?;

        let mut seeds = FxHashSet::default();
        let mut changed = ChangeSet::new();

        // Clear the previous content region
        let old_positions: Vec<(usize, usize)> = self.sheets[sheet_idx]
            .cells_iter()
            .map(|(pos, _)| *pos)
            .collect();
        for (row, col) in old_positions {
            let cell_id = CellId::new(sheet_id, row, col);
            if self.sheets[sheet_idx].value(row, col) != Value::Empty {
                changed.push(cell_id);
            }
            self.sheets[sheet_idx].clear_cell(row, col);
            self.dep_graph.clear_cell(cell_id);
            seeds.insert(cell_id);
        }

        let mut applied = 0;
        for (r, row) in rows.iter().enumerate() {
            for (c, field) in row.iter().enumerate() {
                if field.is_empty() {
                    continue;
                }
                let write = CellWrite::new(r, c, field.clone());
                self.store_write(sheet_idx, sheet_id, &write, true, &mut seeds, &mut changed);
                applied += 1;
            }
        }

        self.recompute(&seeds, &mut changed);
        Ok(self.commit(applied, applied, changed))
    }

    /// Serialize the sheet's raw content (literals and formula source)
    /// back into the rectangular-row shape consumed by `import_rows`,
    /// trimmed to the data extent.
    pub fn export_rows(&self, sheet_idx: usize) -> Result<Vec<Vec<String>>, EngineError> {
        let id = self.resolve(sheet_idx)?;
        let sheet = match self.sheet_by_id(id) {
            Some(sheet) => sheet,
            None => return Ok(Vec::new()),
        };
        let Some((max_row, max_col)) = sheet.data_extent() else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(max_row + 1);
        for r in 0..=max_row {
            let mut row = Vec::with_capacity(max_col + 1);
            for c in 0..=max_col {
                row.push(sheet.raw(r, c));
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Set a cell's style. Orthogonal to computation: consumes a revision
    /// (the store changed) but triggers no recompute.
    pub fn set_style(
        &mut self,
        sheet_idx: usize,
        row: usize,
        col: usize,
        style: crate::cell::CellStyle,
    ) -> Result<ApplyResult, EngineError> {
        let id = self.resolve(sheet_idx)?;
        self.sheets[sheet_idx].set_style(row, col, style);
        let mut changed = ChangeSet::new();
        changed.push(CellId::new(id, row, col));
        Ok(self.commit(1, 1, changed))
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    pub fn insert_rows(
        &mut self,
        sheet_idx: usize,
        at: usize,
        count: usize,
    ) -> Result<ApplyResult, EngineError> {
        self.structural_edit(sheet_idx, StructuralOp::InsertRows, at, count)
    }

    pub fn delete_rows(
        &mut self,
        sheet_idx: usize,
        at: usize,
        count: usize,
    ) -> Result<ApplyResult, EngineError> {
        self.structural_edit(sheet_idx, StructuralOp::DeleteRows, at, count)
    }

    pub fn insert_cols(
        &mut self,
        sheet_idx: usize,
        at: usize,
        count: usize,
    ) -> Result<ApplyResult, EngineError> {
        self.structural_edit(sheet_idx, StructuralOp::InsertCols, at, count)
    }

    pub fn delete_cols(
        &mut self,
        sheet_idx: usize,
        at: usize,
        count: usize,
    ) -> Result<ApplyResult, EngineError> {
        self.structural_edit(sheet_idx, StructuralOp::DeleteCols, at, count)
    }

    fn structural_edit(
        &mut self,
        sheet_idx: usize,
        op: StructuralOp,
        at: usize,
        count: usize,
    ) -> Result<ApplyResult, EngineError> {
        let sheet_id = self.resolve(sheet_idx)?;

        let axis_len = match op.axis() {
            Axis::Rows => self.sheets[sheet_idx].rows,
            Axis::Cols => self.sheets[sheet_idx].cols,
        };
        let bad_range = || EngineError::BadRange {
            op: op.name(),
            at,
            count,
        };
        if count == 0 {
            return Err(bad_range());
        }
        if op.is_insert() {
            if at > axis_len {
                return Err(bad_range());
            }
        } else if at >= axis_len || count > axis_len - at {
            return Err(bad_range());
        }

        let mut changed = ChangeSet::new();
        for (pos, _) in self.sheets[sheet_idx].cells_iter() {
            changed.push(CellId::new(sheet_id, pos.0, pos.1));
        }

        // 1. Shift stored cells
        {
            let sheet = &mut self.sheets[sheet_idx];
            match op {
                StructuralOp::InsertRows => sheet.insert_rows(at, count),
                StructuralOp::DeleteRows => sheet.delete_rows(at, count),
                StructuralOp::InsertCols => sheet.insert_cols(at, count),
                StructuralOp::DeleteCols => sheet.delete_cols(at, count),
            }
        }

        // 2. Remap graph nodes to their new coordinates
        let rows_bound = self.sheets[sheet_idx].rows;
        let cols_bound = self.sheets[sheet_idx].cols;
        self.dep_graph.apply_mapping(|cell| {
            if cell.sheet != sheet_id {
                return Some(cell);
            }
            let index = match op.axis() {
                Axis::Rows => cell.row,
                Axis::Cols => cell.col,
            };
            let bound = match op.axis() {
                Axis::Rows => rows_bound,
                Axis::Cols => cols_bound,
            };
            let new_index = if op.is_insert() {
                if index >= at {
                    let shifted = index + count;
                    if shifted >= bound {
                        return None; // shifted off the grid
                    }
                    shifted
                } else {
                    index
                }
            } else if index >= at + count {
                index - count
            } else if index >= at {
                return None; // inside the deleted span
            } else {
                index
            };
            Some(match op.axis() {
                Axis::Rows => CellId::new(cell.sheet, new_index, cell.col),
                Axis::Cols => CellId::new(cell.sheet, cell.row, new_index),
            })
        });

        // 3. Rewrite formula references past the mutation boundary and
        //    re-register their dependency edges
        let edit = if op.is_insert() {
            RefEdit::Insert {
                axis: op.axis(),
                at,
                count,
            }
        } else {
            RefEdit::Delete {
                axis: op.axis(),
                at,
                count,
            }
        };
        for (row, col) in self.sheets[sheet_idx].formula_positions() {
            let Some(ast) = self.sheets[sheet_idx]
                .cell(row, col)
                .and_then(|c| c.content.formula_ast())
                .cloned()
            else {
                continue;
            };
            let (new_ast, ast_changed) = rewrite(&ast, edit);
            if !ast_changed {
                continue;
            }
            let source = format_expr(&new_ast);
            let refs = extract_cell_ids(&new_ast, sheet_id);
            self.sheets[sheet_idx].set_formula_rewritten(row, col, source, new_ast);
            self.dep_graph.replace_edges(CellId::new(sheet_id, row, col), refs);
        }

        // 4. Recompute every formula on the sheet: addresses, not just
        //    values, changed
        let seeds: FxHashSet<CellId> = self.sheets[sheet_idx]
            .formula_positions()
            .into_iter()
            .map(|(r, c)| CellId::new(sheet_id, r, c))
            .collect();
        for (pos, _) in self.sheets[sheet_idx].cells_iter() {
            changed.push(CellId::new(sheet_id, pos.0, pos.1));
        }
        self.recompute(&seeds, &mut changed);

        Ok(self.commit(0, 0, changed))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn store_write(
        &mut self,
        sheet_idx: usize,
        sheet_id: SheetId,
        write: &CellWrite,
        literal_only: bool,
        seeds: &mut FxHashSet<CellId>,
        changed: &mut ChangeSet,
    ) {
        let cell_id = CellId::new(sheet_id, write.row, write.col);
        let old_value = self.sheets[sheet_idx].value(write.row, write.col);
        let old_raw = self.sheets[sheet_idx].raw(write.row, write.col);

        if write.input.trim().is_empty() {
            self.sheets[sheet_idx].clear_cell(write.row, write.col);
        } else if literal_only {
            self.sheets[sheet_idx].set_literal(write.row, write.col, &write.input);
        } else {
            self.sheets[sheet_idx].set_input(write.row, write.col, &write.input);
        }

        // Dependency bookkeeping: formulas register their reference set,
        // anything else drops out of the graph.
        let ast = self.sheets[sheet_idx]
            .cell(write.row, write.col)
            .and_then(|c| c.content.formula_ast())
            .cloned();
        match ast {
            Some(ast) => {
                let refs = extract_cell_ids(&ast, sheet_id);
                self.dep_graph.replace_edges(cell_id, refs);
            }
            None => self.dep_graph.clear_cell(cell_id),
        }

        seeds.insert(cell_id);
        let new_value = self.sheets[sheet_idx].value(write.row, write.col);
        let new_raw = self.sheets[sheet_idx].raw(write.row, write.col);
        if new_value != old_value || new_raw != old_raw {
            changed.push(cell_id);
        }
    }

    /// The single recomputation entry point used by every mutation path.
    ///
    /// Orders the dirty closure topologically, marks cycle members with
    /// `#CYCLE!`, evaluates everything else against finalized values, and
    /// writes results back. Eager: values are consistent when this returns.
    fn recompute(&mut self, seeds: &FxHashSet<CellId>, changed: &mut ChangeSet) {
        let start = std::time::Instant::now();
        let mut report = RecalcReport::new();

        let plan = self.dep_graph.update_order(seeds);
        report.had_cycles = !plan.cycle_cells.is_empty();
        report.cycle_cells = plan.cycle_cells.len();

        for cell_id in &plan.cycle_cells {
            if self.write_computed(*cell_id, Value::Error(CellError::CircularReference)) {
                changed.push(*cell_id);
            }
            report.cells_recomputed += 1;
            report.errors += 1;
        }

        // Formula cells in the seed set with no live references (constant
        // formulas, or every reference rewritten to #REF!) have no graph
        // node; they still need evaluation, and depend on nothing dirty.
        let planned: FxHashSet<CellId> = plan
            .order
            .iter()
            .chain(plan.cycle_cells.iter())
            .copied()
            .collect();
        let mut standalone: Vec<CellId> = seeds
            .iter()
            .filter(|id| !planned.contains(id) && self.is_stored_formula(**id))
            .copied()
            .collect();
        standalone.sort_by_key(|c| c.sort_key());

        let mut depths: FxHashMap<CellId, usize> = FxHashMap::default();
        for cell_id in standalone.iter().chain(plan.order.iter()) {
            let mut max_pred_depth = 0;
            for pred in self.dep_graph.precedents(*cell_id) {
                max_pred_depth = max_pred_depth.max(depths.get(&pred).copied().unwrap_or(0));
            }
            let depth = max_pred_depth + 1;
            depths.insert(*cell_id, depth);
            report.max_depth = report.max_depth.max(depth);

            if let Some(value) = self.evaluate_cell(*cell_id) {
                if value.is_error() {
                    report.errors += 1;
                }
                if self.write_computed(*cell_id, value) {
                    changed.push(*cell_id);
                }
            }
            report.cells_recomputed += 1;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log::debug!("{}", report.log_line());
        self.last_recalc = report;
    }

    fn is_stored_formula(&self, cell_id: CellId) -> bool {
        self.sheet_by_id(cell_id.sheet)
            .and_then(|s| s.cell(cell_id.row, cell_id.col))
            .is_some_and(|c| c.content.is_formula())
    }

    /// Evaluate one formula cell against the current (finalized) values.
    fn evaluate_cell(&self, cell_id: CellId) -> Option<Value> {
        let sheet = self.sheet_by_id(cell_id.sheet)?;
        let ast = sheet
            .cell(cell_id.row, cell_id.col)?
            .content
            .formula_ast()?;
        Some(evaluate(ast, &SheetValues { sheet }))
    }

    /// Write a computed value; returns true if the value actually changed.
    fn write_computed(&mut self, cell_id: CellId, value: Value) -> bool {
        let Some(sheet) = self.sheet_by_id_mut(cell_id.sheet) else {
            return false;
        };
        if sheet.value(cell_id.row, cell_id.col) == value {
            return false;
        }
        sheet.set_computed(cell_id.row, cell_id.col, value);
        true
    }

    /// Finish a transaction: bump the revision exactly once and publish
    /// events. Nothing here can fail; all validation happened up front.
    fn commit(&mut self, applied: usize, total: usize, changed: ChangeSet) -> ApplyResult {
        let previous = self.revision;
        self.revision += 1;
        let cells = changed.into_vec();

        self.events
            .push(WorkbookEvent::RevisionChanged(RevisionChangedEvent {
                revision: self.revision,
                previous,
            }));
        if !cells.is_empty() {
            self.events
                .push(WorkbookEvent::CellsChanged(CellsChangedEvent {
                    revision: self.revision,
                    cells: cells.clone(),
                }));
        }
        self.events
            .push(WorkbookEvent::BatchApplied(BatchAppliedEvent {
                revision: self.revision,
                applied,
                total,
            }));

        log::debug!(
            "[tx] rev={} applied={}/{} changed={}",
            self.revision,
            applied,
            total,
            cells.len()
        );

        ApplyResult {
            revision: self.revision,
            applied,
            changed: cells,
        }
    }

    /// Rebuild the dependency graph from stored formulas and recompute
    /// everything. For use after deserialization; not a transaction (no
    /// revision, no events).
    pub fn rebuild(&mut self) {
        self.dep_graph = DepGraph::new();

        let mut seeds: FxHashSet<CellId> = FxHashSet::default();
        for sheet_idx in 0..self.sheets.len() {
            let sheet_id = self.sheets[sheet_idx].id;
            for (row, col) in self.sheets[sheet_idx].formula_positions() {
                let cell_id = CellId::new(sheet_id, row, col);
                if let Some(ast) = self.sheets[sheet_idx]
                    .cell(row, col)
                    .and_then(|c| c.content.formula_ast())
                {
                    let refs = extract_cell_ids(ast, sheet_id);
                    self.dep_graph.replace_edges(cell_id, refs);
                }
                seeds.insert(cell_id);
            }
        }

        let mut changed = ChangeSet::new();
        self.recompute(&seeds, &mut changed);
    }
}

/// Value lookup over one sheet for the evaluator.
struct SheetValues<'a> {
    sheet: &'a Sheet,
}

impl ValueLookup for SheetValues<'_> {
    fn value_at(&self, row: usize, col: usize) -> Value {
        self.sheet.value(row, col)
    }
}

/// Ordered, deduplicated set of changed cells for one transaction.
#[derive(Debug, Default)]
struct ChangeSet {
    seen: FxHashSet<CellId>,
    cells: Vec<CellId>,
}

impl ChangeSet {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, cell: CellId) {
        if self.seen.insert(cell) {
            self.cells.push(cell);
        }
    }

    fn into_vec(self) -> Vec<CellId> {
        self.cells
    }
}

//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula reads) and dependents (formula cells
//! that read a given cell) so the recompute closure of any edit can be
//! found and ordered.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A is a precedent of B)
//! ```
//!
//! This makes "what must recompute if X changes?" trivial: follow outgoing
//! edges.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell_id::CellId;

/// Persistent dependency graph for formula cells.
///
/// Maintains bidirectional adjacency for O(1) lookups:
/// - `preds[B]` = cells that B depends on (precedents)
/// - `succs[A]` = cells that depend on A (dependents)
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// Precedents: for each formula cell B, the cells A it depends on.
    preds: FxHashMap<CellId, FxHashSet<CellId>>,

    /// Dependents: for each referenced cell A, the formula cells B that depend on it.
    succs: FxHashMap<CellId, FxHashSet<CellId>>,
}

/// Output of `update_order`: the evaluation order for a dirty closure,
/// with cycle participants separated out.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    /// Cells to evaluate, precedents before dependents. Cells that read a
    /// cycle member appear here after the cycle is marked, so they resolve
    /// to a propagated error rather than being treated as cyclic.
    pub order: Vec<CellId>,
    /// Cells on a true cycle (SCC size > 1 or self-loop), sorted.
    pub cycle_cells: Vec<CellId>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cells this formula cell depends on (precedents).
    pub fn precedents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Returns the formula cells that depend on this cell (dependents).
    pub fn dependents(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Returns true if this cell has formula dependencies tracked in the graph.
    pub fn is_formula_cell(&self, cell: CellId) -> bool {
        self.preds.contains_key(&cell)
    }

    pub fn formula_cell_count(&self) -> usize {
        self.preds.len()
    }

    pub fn referenced_cell_count(&self) -> usize {
        self.succs.len()
    }

    /// Replace all edges for a formula cell atomically.
    ///
    /// This is the primary mutation API. It:
    /// 1. Removes the cell from all its old precedents' successor sets
    /// 2. Clears the cell's precedent set
    /// 3. Adds the cell to all new precedents' successor sets
    /// 4. Sets the cell's new precedent set
    ///
    /// Pass an empty set to clear all edges for this cell.
    pub fn replace_edges(&mut self, formula_cell: CellId, new_preds: FxHashSet<CellId>) {
        if let Some(old_preds) = self.preds.remove(&formula_cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&formula_cell);
                    // Clean up empty entries (invariant: no dangling)
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(formula_cell);
        }

        self.preds.insert(formula_cell, new_preds);
    }

    /// Clear all edges for a cell (formula removed or cell deleted).
    pub fn clear_cell(&mut self, cell: CellId) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Remove all edges involving cells from a specific sheet.
    ///
    /// Called when a sheet is deleted.
    pub fn remove_sheet(&mut self, sheet: crate::sheet::SheetId) {
        let cells_to_remove: Vec<CellId> = self
            .preds
            .keys()
            .filter(|c| c.sheet == sheet)
            .copied()
            .collect();

        for cell in cells_to_remove {
            self.clear_cell(cell);
        }

        // Cells from this sheet that are only referenced (no formula of their own)
        let referenced_to_remove: Vec<CellId> = self
            .succs
            .keys()
            .filter(|c| c.sheet == sheet)
            .copied()
            .collect();

        for cell in referenced_to_remove {
            if let Some(dependents) = self.succs.remove(&cell) {
                for dep in dependents {
                    if let Some(preds) = self.preds.get_mut(&dep) {
                        preds.remove(&cell);
                        if preds.is_empty() {
                            self.preds.remove(&dep);
                        }
                    }
                }
            }
        }
    }

    /// Apply a coordinate mapping to all cells in the graph.
    ///
    /// Used for row/column insert/delete operations. The mapping function
    /// returns `Some(new_id)` if the cell survives (possibly moved), or
    /// `None` if it is deleted.
    pub fn apply_mapping<F>(&mut self, map: F)
    where
        F: Fn(CellId) -> Option<CellId>,
    {
        let mut new_preds: FxHashMap<CellId, FxHashSet<CellId>> = FxHashMap::default();
        let mut new_succs: FxHashMap<CellId, FxHashSet<CellId>> = FxHashMap::default();

        for (formula_cell, preds) in &self.preds {
            let Some(new_formula_cell) = map(*formula_cell) else {
                continue; // Formula cell was deleted
            };

            let mapped_preds: FxHashSet<CellId> =
                preds.iter().filter_map(|p| map(*p)).collect();

            if mapped_preds.is_empty() {
                continue; // All precedents were deleted
            }

            for pred in &mapped_preds {
                new_succs.entry(*pred).or_default().insert(new_formula_cell);
            }
            new_preds.insert(new_formula_cell, mapped_preds);
        }

        self.preds = new_preds;
        self.succs = new_succs;
    }

    // =========================================================================
    // Recompute planning
    // =========================================================================

    /// All formula cells in the graph.
    pub fn formula_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.preds.keys().copied()
    }

    /// Transitive dependents of a seed set, restricted to formula cells.
    ///
    /// Seeds themselves are included when they are formula cells.
    pub fn dirty_closure(&self, seeds: &FxHashSet<CellId>) -> FxHashSet<CellId> {
        let mut visited: FxHashSet<CellId> = FxHashSet::default();
        let mut stack: Vec<CellId> = seeds.iter().copied().collect();

        while let Some(cell) = stack.pop() {
            if !visited.insert(cell) {
                continue;
            }
            if let Some(deps) = self.succs.get(&cell) {
                for &dep in deps {
                    if !visited.contains(&dep) {
                        stack.push(dep);
                    }
                }
            }
        }

        visited.retain(|c| self.preds.contains_key(c));
        visited
    }

    /// Plan recomputation of everything affected by `seeds`.
    ///
    /// Produces a topological order (Kahn's algorithm, deterministic
    /// tie-break by cell position) over the dirty closure. Cells on a true
    /// cycle are excluded from the order and reported in `cycle_cells`;
    /// cells stuck only because they read a cycle member are ordered after
    /// the cycles are carved out, so they evaluate normally and inherit
    /// the cycle error through propagation.
    pub fn update_order(&self, seeds: &FxHashSet<CellId>) -> UpdatePlan {
        let closure = self.dirty_closure(seeds);
        if closure.is_empty() {
            return UpdatePlan::default();
        }

        let mut order = self.kahn_order(&closure, &FxHashSet::default());
        if order.len() == closure.len() {
            return UpdatePlan {
                order,
                cycle_cells: Vec::new(),
            };
        }

        // Some cells never reached in-degree zero: a cycle, plus anything
        // downstream of it inside the closure.
        let ordered: FxHashSet<CellId> = order.iter().copied().collect();
        let stuck: FxHashSet<CellId> =
            closure.iter().filter(|c| !ordered.contains(c)).copied().collect();

        let cycle_members = self.cycle_members_within(&stuck);

        // The rest of the stuck set is acyclic once cycle members are
        // treated as resolved (they get an error value before evaluation).
        let rest: FxHashSet<CellId> = stuck
            .iter()
            .filter(|c| !cycle_members.contains(c))
            .copied()
            .collect();
        order.extend(self.kahn_order(&rest, &cycle_members));

        let mut cycle_cells: Vec<CellId> = cycle_members.into_iter().collect();
        cycle_cells.sort_by_key(|c| c.sort_key());

        UpdatePlan { order, cycle_cells }
    }

    /// Kahn's algorithm over `subset`, ignoring edges from `resolved`.
    ///
    /// Returns as many cells as can be ordered; callers detect cycles by
    /// comparing lengths.
    fn kahn_order(&self, subset: &FxHashSet<CellId>, resolved: &FxHashSet<CellId>) -> Vec<CellId> {
        if subset.is_empty() {
            return Vec::new();
        }

        let mut in_degree: FxHashMap<CellId, usize> = FxHashMap::default();
        for &cell in subset {
            let count = self
                .preds
                .get(&cell)
                .map(|preds| {
                    preds
                        .iter()
                        .filter(|p| subset.contains(p) && !resolved.contains(p))
                        .count()
                })
                .unwrap_or(0);
            in_degree.insert(cell, count);
        }

        // Sort in DESCENDING order so the smallest is at the end (popped first)
        let mut queue: Vec<CellId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| cell)
            .collect();
        queue.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));

        let mut result = Vec::with_capacity(subset.len());

        while let Some(cell) = queue.pop() {
            result.push(cell);

            if let Some(deps) = self.succs.get(&cell) {
                let mut new_zero_degree = Vec::new();

                for &dep in deps {
                    if let Some(deg) = in_degree.get_mut(&dep) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            new_zero_degree.push(dep);
                        }
                    }
                }

                new_zero_degree.sort_by_key(|c| c.sort_key());
                // Add in reverse order so the smallest is popped first
                for cell in new_zero_degree.into_iter().rev() {
                    queue.push(cell);
                }
            }
        }

        result
    }

    /// Find cells within `subset` that are members of true cycles
    /// (SCC size > 1, or size 1 with a self-loop).
    ///
    /// Iterative Tarjan's, restricted to edges inside `subset`. Nodes are
    /// visited in sorted order for deterministic output.
    fn cycle_members_within(&self, subset: &FxHashSet<CellId>) -> FxHashSet<CellId> {
        if subset.is_empty() {
            return FxHashSet::default();
        }

        let mut sorted_cells: Vec<CellId> = subset.iter().copied().collect();
        sorted_cells.sort_by_key(|c| c.sort_key());

        let sorted_neighbours = |cell: CellId| -> Vec<CellId> {
            let mut neighbours: Vec<CellId> = self
                .preds
                .get(&cell)
                .into_iter()
                .flat_map(|s| s.iter().copied())
                .filter(|c| subset.contains(c))
                .collect();
            neighbours.sort_by_key(|c| c.sort_key());
            neighbours
        };

        let mut index_counter: u32 = 0;
        let mut stack: Vec<CellId> = Vec::new();
        let mut on_stack: FxHashSet<CellId> = FxHashSet::default();
        let mut indices: FxHashMap<CellId, u32> = FxHashMap::default();
        let mut lowlinks: FxHashMap<CellId, u32> = FxHashMap::default();
        let mut result: FxHashSet<CellId> = FxHashSet::default();

        struct DfsFrame {
            cell: CellId,
            neighbours: Vec<CellId>,
            next_idx: usize,
        }

        for &root in &sorted_cells {
            if indices.contains_key(&root) {
                continue;
            }

            let mut dfs_stack: Vec<DfsFrame> = Vec::new();

            let idx = index_counter;
            index_counter += 1;
            indices.insert(root, idx);
            lowlinks.insert(root, idx);
            stack.push(root);
            on_stack.insert(root);

            dfs_stack.push(DfsFrame {
                cell: root,
                neighbours: sorted_neighbours(root),
                next_idx: 0,
            });

            while let Some(frame) = dfs_stack.last_mut() {
                if frame.next_idx < frame.neighbours.len() {
                    let w = frame.neighbours[frame.next_idx];
                    frame.next_idx += 1;

                    if !indices.contains_key(&w) {
                        let w_idx = index_counter;
                        index_counter += 1;
                        indices.insert(w, w_idx);
                        lowlinks.insert(w, w_idx);
                        stack.push(w);
                        on_stack.insert(w);

                        dfs_stack.push(DfsFrame {
                            cell: w,
                            neighbours: sorted_neighbours(w),
                            next_idx: 0,
                        });
                    } else if on_stack.contains(&w) {
                        let w_idx = indices[&w];
                        let v_low = lowlinks.get_mut(&frame.cell).expect("visited node");
                        if w_idx < *v_low {
                            *v_low = w_idx;
                        }
                    }
                } else {
                    // All neighbours explored — pop and propagate lowlink
                    let finished = dfs_stack.pop().expect("frame present");
                    let v = finished.cell;
                    let v_low = lowlinks[&v];
                    let v_idx = indices[&v];

                    if let Some(parent) = dfs_stack.last() {
                        let parent_low = lowlinks.get_mut(&parent.cell).expect("visited node");
                        if v_low < *parent_low {
                            *parent_low = v_low;
                        }
                    }

                    // SCC root check
                    if v_low == v_idx {
                        let mut scc = Vec::new();
                        loop {
                            let w = stack.pop().expect("scc member on stack");
                            on_stack.remove(&w);
                            scc.push(w);
                            if w == v {
                                break;
                            }
                        }

                        if scc.len() > 1 {
                            result.extend(scc);
                        } else if scc.len() == 1 {
                            let cell = scc[0];
                            if self.preds.get(&cell).is_some_and(|p| p.contains(&cell)) {
                                result.insert(cell);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (formula_cell, preds) in &self.preds {
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(formula_cell)),
                    "Missing succ edge: {:?} should have {:?} in dependents",
                    pred,
                    formula_cell
                );
            }
        }

        for (cell, dependents) in &self.succs {
            for dep in dependents {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "Missing pred edge: {:?} should have {:?} in precedents",
                    dep,
                    cell
                );
            }
        }

        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "Empty preds set stored for {:?}", cell);
        }
        for (cell, succs) in &self.succs {
            assert!(!succs.is_empty(), "Empty succs set stored for {:?}", cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetId;

    fn cell(sheet: u64, row: usize, col: usize) -> CellId {
        CellId::new(SheetId::from_raw(sheet), row, col)
    }

    fn set(cells: &[CellId]) -> FxHashSet<CellId> {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new();

        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
        assert!(!graph.is_formula_cell(cell(1, 0, 0)));
        assert_eq!(graph.precedents(cell(1, 0, 0)).count(), 0);
        assert_eq!(graph.dependents(cell(1, 0, 0)).count(), 0);

        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 = A1
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        assert!(graph.is_formula_cell(b1));
        assert!(!graph.is_formula_cell(a1));
        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![a1]);
        assert_eq!(graph.dependents(a1).collect::<Vec<_>>(), vec![b1]);
    }

    #[test]
    fn test_rewiring() {
        // B1 = A1, then change to B1 = A2
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let a2 = cell(1, 1, 0);
        let b1 = cell(1, 0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(b1, set(&[a2]));
        graph.assert_consistent();

        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![a2]);
        assert_eq!(graph.dependents(a2).collect::<Vec<_>>(), vec![b1]);
        assert_eq!(graph.dependents(a1).count(), 0);
        assert_eq!(graph.referenced_cell_count(), 1);
    }

    #[test]
    fn test_unwiring() {
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.clear_cell(b1);
        graph.assert_consistent();

        assert!(!graph.is_formula_cell(b1));
        assert_eq!(graph.dependents(a1).count(), 0);
        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
    }

    #[test]
    fn test_diamond_dependency() {
        //     A1
        //    /  \
        //   B1   C1
        //    \  /
        //     D1
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);
        let c1 = cell(1, 0, 2);
        let d1 = cell(1, 0, 3);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));
        graph.replace_edges(d1, set(&[b1, c1]));
        graph.assert_consistent();

        let mut a1_deps: Vec<_> = graph.dependents(a1).collect();
        a1_deps.sort_by_key(|c| c.col);
        assert_eq!(a1_deps, vec![b1, c1]);
        assert_eq!(graph.formula_cell_count(), 3);
    }

    #[test]
    fn test_remove_sheet() {
        let mut graph = DepGraph::new();
        let s1_a1 = cell(1, 0, 0);
        let s1_b1 = cell(1, 0, 1);
        let s2_a1 = cell(2, 0, 0);

        graph.replace_edges(s1_b1, set(&[s1_a1]));
        graph.replace_edges(s2_a1, set(&[s1_b1]));
        graph.assert_consistent();

        graph.remove_sheet(SheetId::from_raw(1));
        graph.assert_consistent();

        assert!(!graph.is_formula_cell(s1_b1));
        assert!(!graph.is_formula_cell(s2_a1));
        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
    }

    #[test]
    fn test_apply_mapping_shift_rows() {
        // B1 = A1, B2 = A2; insert row at 1
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let a2 = cell(1, 1, 0);
        let b1 = cell(1, 0, 1);
        let b2 = cell(1, 1, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(b2, set(&[a2]));

        graph.apply_mapping(|c| {
            if c.row >= 1 {
                Some(CellId::new(c.sheet, c.row + 1, c.col))
            } else {
                Some(c)
            }
        });
        graph.assert_consistent();

        assert!(graph.is_formula_cell(b1));
        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![a1]);

        let a3 = cell(1, 2, 0);
        let b3 = cell(1, 2, 1);
        assert!(!graph.is_formula_cell(b2));
        assert!(graph.is_formula_cell(b3));
        assert_eq!(graph.precedents(b3).collect::<Vec<_>>(), vec![a3]);
    }

    #[test]
    fn test_apply_mapping_delete_row() {
        // B1 = A1, B2 = A2; delete row 0
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let a2 = cell(1, 1, 0);
        let b1 = cell(1, 0, 1);
        let b2 = cell(1, 1, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(b2, set(&[a2]));

        graph.apply_mapping(|c| {
            if c.row == 0 {
                None
            } else {
                Some(CellId::new(c.sheet, c.row - 1, c.col))
            }
        });
        graph.assert_consistent();

        assert!(!graph.is_formula_cell(b2));
        let new_a1 = cell(1, 0, 0);
        let new_b1 = cell(1, 0, 1);
        assert!(graph.is_formula_cell(new_b1));
        assert_eq!(graph.precedents(new_b1).collect::<Vec<_>>(), vec![new_a1]);
        assert_eq!(graph.formula_cell_count(), 1);
    }

    // =========================================================================
    // Closure + ordering
    // =========================================================================

    #[test]
    fn test_dirty_closure_transitive() {
        // A → B → C → D chain of formulas (A is a value cell)
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let c = cell(1, 0, 2);
        let d = cell(1, 0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[b]));
        graph.replace_edges(d, set(&[c]));

        let closure = graph.dirty_closure(&set(&[a]));
        assert_eq!(closure, set(&[b, c, d]));

        // Editing C only dirties C and D
        let closure = graph.dirty_closure(&set(&[c]));
        assert_eq!(closure, set(&[c, d]));
    }

    #[test]
    fn test_update_order_chain() {
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let c = cell(1, 0, 2);
        let d = cell(1, 0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[b]));
        graph.replace_edges(d, set(&[c]));

        let plan = graph.update_order(&set(&[a]));
        assert_eq!(plan.order, vec![b, c, d]);
        assert!(plan.cycle_cells.is_empty());
    }

    #[test]
    fn test_update_order_diamond() {
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let c = cell(1, 0, 2);
        let d = cell(1, 0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[a]));
        graph.replace_edges(d, set(&[b, c]));

        let plan = graph.update_order(&set(&[a]));
        assert_eq!(plan.order.len(), 3);
        let pos =
            |x: CellId| plan.order.iter().position(|&y| y == x).expect("cell ordered");
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_update_order_outside_closure_untouched() {
        // B = A, D = C. Editing A must not order D.
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let c = cell(1, 0, 2);
        let d = cell(1, 0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(d, set(&[c]));

        let plan = graph.update_order(&set(&[a]));
        assert_eq!(plan.order, vec![b]);
    }

    #[test]
    fn test_update_order_deterministic() {
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);
        let b2 = cell(1, 0, 2);
        let b3 = cell(1, 0, 3);

        graph.replace_edges(b3, set(&[a]));
        graph.replace_edges(b1, set(&[a]));
        graph.replace_edges(b2, set(&[a]));

        let order1 = graph.update_order(&set(&[a])).order;
        let order2 = graph.update_order(&set(&[a])).order;
        assert_eq!(order1, order2);
        assert_eq!(order1, vec![b1, b2, b3]);
    }

    #[test]
    fn test_cycle_two_cells() {
        // A1 = B1, B1 = A1
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);

        graph.replace_edges(a1, set(&[b1]));
        graph.replace_edges(b1, set(&[a1]));

        let plan = graph.update_order(&set(&[a1]));
        assert_eq!(plan.cycle_cells, vec![a1, b1]);
        assert!(plan.order.is_empty());
    }

    #[test]
    fn test_cycle_self_loop() {
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);

        graph.replace_edges(a1, set(&[a1]));

        let plan = graph.update_order(&set(&[a1]));
        assert_eq!(plan.cycle_cells, vec![a1]);
    }

    #[test]
    fn test_cycle_reader_is_ordered_not_cyclic() {
        // A1 = B1, B1 = A1 (cycle); C1 = A1 + 1 reads the cycle
        let mut graph = DepGraph::new();
        let a1 = cell(1, 0, 0);
        let b1 = cell(1, 0, 1);
        let c1 = cell(1, 0, 2);

        graph.replace_edges(a1, set(&[b1]));
        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));

        let plan = graph.update_order(&set(&[a1]));
        assert_eq!(plan.cycle_cells, vec![a1, b1]);
        assert_eq!(plan.order, vec![c1], "cycle reader evaluates after marking");
    }

    #[test]
    fn test_cycle_with_downstream_chain() {
        // Cycle A ↔ B, then C = A, D = C
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let c = cell(1, 0, 2);
        let d = cell(1, 0, 3);

        graph.replace_edges(a, set(&[b]));
        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[a]));
        graph.replace_edges(d, set(&[c]));

        let plan = graph.update_order(&set(&[b]));
        assert_eq!(plan.cycle_cells, vec![a, b]);
        assert_eq!(plan.order, vec![c, d]);
    }

    #[test]
    fn test_mixed_cycle_and_acyclic_branch() {
        // A ↔ B cycle; independent E = F edit seeds both
        let mut graph = DepGraph::new();
        let a = cell(1, 0, 0);
        let b = cell(1, 0, 1);
        let e = cell(1, 0, 4);
        let f = cell(1, 0, 5);

        graph.replace_edges(a, set(&[b]));
        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(f, set(&[e]));

        let plan = graph.update_order(&set(&[a, e]));
        assert_eq!(plan.cycle_cells, vec![a, b]);
        assert_eq!(plan.order, vec![f]);
    }
}

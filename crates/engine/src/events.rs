//! Event types for workbook change notifications.
//!
//! Consumers that need incremental redraw subscribe to the event stream;
//! consumers that only need "did anything change?" diff the revision
//! counter. Both are driven by the same transaction boundary: events for a
//! transaction are pushed only after every store write and recomputation
//! has completed, so a revision number is never observable with partially
//! applied values.

use crate::cell_id::CellId;

/// Events emitted by the workbook at transaction boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkbookEvent {
    /// A batch of writes was applied (single edits count as a batch of one).
    BatchApplied(BatchAppliedEvent),

    /// Cells changed value as a result of writes or recomputation.
    /// Always tagged with the revision that produced the changes.
    CellsChanged(CellsChangedEvent),

    /// Revision number changed. Emitted exactly once per transaction.
    RevisionChanged(RevisionChangedEvent),
}

/// Emitted after a transaction completes.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAppliedEvent {
    /// Revision after this transaction.
    pub revision: u64,
    /// Number of writes stored.
    pub applied: usize,
    /// Total number of writes in the transaction.
    pub total: usize,
}

/// Emitted when cells change value (from writes or recalc).
#[derive(Debug, Clone, PartialEq)]
pub struct CellsChangedEvent {
    /// Revision that produced these changes.
    /// INVARIANT: All cells in this event belong to this single revision.
    pub revision: u64,
    /// Cells that changed (includes recomputed dependents).
    pub cells: Vec<CellId>,
}

/// Emitted exactly once per transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionChangedEvent {
    /// The new revision number.
    pub revision: u64,
    /// The previous revision number.
    pub previous: u64,
}

/// Accumulates events between host reads.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Vec<WorkbookEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: WorkbookEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[WorkbookEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<WorkbookEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only BatchApplied events.
    pub fn batch_applied(&self) -> Vec<&BatchAppliedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkbookEvent::BatchApplied(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Filter to only CellsChanged events.
    pub fn cells_changed(&self) -> Vec<&CellsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkbookEvent::CellsChanged(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only RevisionChanged events.
    pub fn revision_changed(&self) -> Vec<&RevisionChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkbookEvent::RevisionChanged(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetId;

    #[test]
    fn test_event_collector_filtering() {
        let mut collector = EventCollector::new();

        collector.push(WorkbookEvent::RevisionChanged(RevisionChangedEvent {
            revision: 1,
            previous: 0,
        }));
        collector.push(WorkbookEvent::CellsChanged(CellsChangedEvent {
            revision: 1,
            cells: vec![CellId::new(SheetId(1), 0, 0)],
        }));
        collector.push(WorkbookEvent::BatchApplied(BatchAppliedEvent {
            revision: 1,
            applied: 1,
            total: 1,
        }));

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.batch_applied().len(), 1);
        assert_eq!(collector.cells_changed().len(), 1);
        assert_eq!(collector.revision_changed().len(), 1);
    }

    #[test]
    fn test_drain_empties_collector() {
        let mut collector = EventCollector::new();
        collector.push(WorkbookEvent::RevisionChanged(RevisionChangedEvent {
            revision: 1,
            previous: 0,
        }));

        let drained = collector.drain();
        assert_eq!(drained.len(), 1);
        assert!(collector.is_empty());
    }
}

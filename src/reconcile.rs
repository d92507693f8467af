//! Keeps the cell cache consistent with the surface: structural edits,
//! full resets and inbound change notifications.

use crate::coord::{Coord, Rect};
use crate::errors::{SheetError, SurfaceError};
use crate::model::{CellId, CellValue};
use crate::retry::with_retry;
use crate::store::Relocation;
use crate::surface::{GuardState, SpreadsheetSurface, SurfaceOp};
use crate::worksheet::Worksheet;
use ahash::AHashSet;
use serde::Serialize;
use std::sync::Arc;
use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StructuralOp {
    InsertRows,
    DeleteRows,
    InsertColumns,
    DeleteColumns,
}

impl StructuralOp {
    pub fn surface_op(self) -> SurfaceOp {
        match self {
            StructuralOp::InsertRows => SurfaceOp::InsertRows,
            StructuralOp::DeleteRows => SurfaceOp::DeleteRows,
            StructuralOp::InsertColumns => SurfaceOp::InsertColumns,
            StructuralOp::DeleteColumns => SurfaceOp::DeleteColumns,
        }
    }

    async fn apply(
        self,
        surface: &dyn SpreadsheetSurface,
        start: u32,
        count: u32,
    ) -> Result<(), SurfaceError> {
        match self {
            StructuralOp::InsertRows => surface.insert_rows(start, count).await,
            StructuralOp::DeleteRows => surface.delete_rows(start, count).await,
            StructuralOp::InsertColumns => surface.insert_columns(start, count).await,
            StructuralOp::DeleteColumns => surface.delete_columns(start, count).await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Evicted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    pub at: Coord,
    pub kind: ChangeKind,
    /// Value after the change; the last cached value for evictions.
    pub value: CellValue,
}

/// One consolidated notification, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellsChanged {
    pub changes: Vec<CellChange>,
}

impl CellsChanged {
    fn from_changes(mut changes: Vec<CellChange>) -> Self {
        changes.sort_by_key(|change| change.at);
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn kind_of(&self, at: Coord) -> Option<ChangeKind> {
        self.changes
            .iter()
            .find(|change| change.at == at)
            .map(|change| change.kind)
    }

    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = Coord> + '_ {
        self.changes
            .iter()
            .filter(move |change| change.kind == kind)
            .map(|change| change.at)
    }

    fn extend(&mut self, other: CellsChanged) {
        self.changes.extend(other.changes);
    }
}

impl Worksheet {
    /// Inserts `count` rows so that row `start` is the first one pushed down.
    /// Cached cells at `start` or below move by `count`.
    pub async fn insert_rows(&mut self, start: u32, count: u32) -> Result<Relocation, SheetError> {
        self.structural_edit(StructuralOp::InsertRows, start, count)
            .await
    }

    pub async fn delete_rows(&mut self, start: u32, count: u32) -> Result<Relocation, SheetError> {
        self.structural_edit(StructuralOp::DeleteRows, start, count)
            .await
    }

    /// Inserts `count` columns before column `start`, which moves right along
    /// with every cached cell after it.
    pub async fn insert_columns(
        &mut self,
        start: u32,
        count: u32,
    ) -> Result<Relocation, SheetError> {
        self.structural_edit(StructuralOp::InsertColumns, start, count)
            .await
    }

    pub async fn delete_columns(
        &mut self,
        start: u32,
        count: u32,
    ) -> Result<Relocation, SheetError> {
        self.structural_edit(StructuralOp::DeleteColumns, start, count)
            .await
    }

    /// Runs the edit on the surface with inbound notifications suppressed,
    /// then remaps the cache. A failed surface call leaves the cache as it was.
    async fn structural_edit(
        &mut self,
        operation: StructuralOp,
        start: u32,
        count: u32,
    ) -> Result<Relocation, SheetError> {
        if count == 0 {
            return Ok(Relocation::default());
        }
        let surface = Arc::clone(&self.surface);
        let dims = surface.dimensions();
        let retry = self.config.retry;

        {
            let _guard = self.inbox.suppress();
            with_retry(&retry, operation.surface_op(), || {
                operation.apply(surface.as_ref(), start, count)
            })
            .await
            .map_err(|source| SheetError::StructuralEditFailed {
                operation,
                start,
                count,
                source,
            })?;
        }

        let relocation = match operation {
            StructuralOp::InsertRows => self.store.insert_rows(start, count, dims.rows),
            StructuralOp::DeleteRows => self.store.delete_rows(start, count),
            StructuralOp::InsertColumns => self.store.insert_columns(start, count, dims.columns),
            StructuralOp::DeleteColumns => self.store.delete_columns(start, count),
        };
        tracing::info!(
            operation = %operation,
            start,
            count,
            moved = relocation.moved,
            evicted = relocation.evicted.len(),
            "structural edit applied"
        );
        Ok(relocation)
    }

    /// Full resync against the surface's used range.
    ///
    /// Existing cells get [`update_value`](crate::model::Cell::update_value),
    /// newly non-empty coordinates are created, cached cells outside the used
    /// range are evicted. Empty coordinates without a cache entry are never
    /// materialized.
    pub async fn reset(&mut self) -> Result<CellsChanged, SheetError> {
        let surface = Arc::clone(&self.surface);
        let retry = self.config.retry;

        let used = with_retry(&retry, SurfaceOp::UsedRange, || surface.used_range()).await?;
        let mut changes = Vec::new();
        let mut seen: AHashSet<CellId> = AHashSet::new();

        if let Some(rect) = used {
            let matrix = with_retry(&retry, SurfaceOp::ReadRange, || surface.read_range(rect)).await?;
            for (at, value) in cells_of(rect, matrix) {
                if let Some(change) = self.absorb(at, value, Some(&mut seen)) {
                    changes.push(change);
                }
            }
        }

        for id in self.store.ids() {
            if seen.contains(&id) {
                continue;
            }
            if let Some((at, cell)) = self.store.evict(id) {
                changes.push(CellChange {
                    at,
                    kind: ChangeKind::Evicted,
                    value: cell.value,
                });
            }
        }

        let event = CellsChanged::from_changes(changes);
        tracing::info!(
            used_range = ?used.map(|rect| rect.to_string()),
            created = event.of_kind(ChangeKind::Created).count(),
            updated = event.of_kind(ChangeKind::Updated).count(),
            evicted = event.of_kind(ChangeKind::Evicted).count(),
            "worksheet reset"
        );
        self.publish(&event);
        Ok(event)
    }

    /// Handles one `RangeChanged` notification from the surface.
    ///
    /// Discarded while a structural edit holds the guard. An extent of at
    /// least a full row's worth of cells is treated as a structural change
    /// and triggers [`reset`](Self::reset).
    pub async fn on_range_changed(&mut self, extent: Rect) -> Result<CellsChanged, SheetError> {
        if self.inbox.state() == GuardState::Suppressing {
            tracing::debug!(extent = %extent, "change notification discarded during structural edit");
            return Ok(CellsChanged::default());
        }

        let surface = Arc::clone(&self.surface);
        if extent.cell_count() >= u64::from(surface.dimensions().columns) {
            tracing::debug!(extent = %extent, "change covers a full row span; resetting");
            return self.reset().await;
        }

        let retry = self.config.retry;
        let matrix = with_retry(&retry, SurfaceOp::ReadRange, || surface.read_range(extent)).await?;
        let changes = cells_of(extent, matrix)
            .filter_map(|(at, value)| self.absorb(at, value, None))
            .collect();

        let event = CellsChanged::from_changes(changes);
        self.publish(&event);
        Ok(event)
    }

    /// Drains every queued notification and reconciles each in arrival order.
    ///
    /// A failing extent does not stop the ones behind it. Failed extents go
    /// back to the front of the inbox for the next call and the first error
    /// is returned.
    pub async fn process_notifications(&mut self) -> Result<CellsChanged, SheetError> {
        let mut merged = CellsChanged::default();
        let mut failed = Vec::new();
        let mut first_error = None;
        for extent in self.inbox.drain() {
            match self.on_range_changed(extent).await {
                Ok(event) => merged.extend(event),
                Err(err) => {
                    tracing::warn!(extent = %extent, error = %err, "change notification not reconciled");
                    failed.push(extent);
                    first_error.get_or_insert(err);
                }
            }
        }
        if !failed.is_empty() {
            self.inbox.requeue_front(failed);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(merged),
        }
    }

    /// Applies one externally observed value to the cache without dirtying it.
    fn absorb(
        &mut self,
        at: Coord,
        value: CellValue,
        seen: Option<&mut AHashSet<CellId>>,
    ) -> Option<CellChange> {
        let existing = self.store.lookup(at);
        if existing.is_none() && value.is_empty() {
            return None;
        }
        let cell = self.store.cell_mut_at(at);
        if let Some(seen) = seen {
            seen.insert(cell.id());
        }
        let kind = if existing.is_none() {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
        };
        cell.update_value(value).then(|| CellChange {
            at,
            kind,
            value: cell.value().clone(),
        })
    }
}

fn cells_of(rect: Rect, matrix: Vec<Vec<CellValue>>) -> impl Iterator<Item = (Coord, CellValue)> {
    matrix.into_iter().enumerate().flat_map(move |(i, row)| {
        row.into_iter().enumerate().map(move |(j, value)| {
            (
                Coord::new(rect.top + i as u32, rect.left + j as u32),
                value,
            )
        })
    })
}

use crate::config::SyncConfig;
use crate::coord::{Coord, Rect};
use crate::dirty::DirtyTracker;
use crate::errors::{FlushError, SheetError, SurfaceError};
use crate::flush::{self, FlushReport};
use crate::model::{Cell, CellId, CellValue, Column, Row, RowId, Style, ValidationOptions};
use crate::reconcile::CellsChanged;
use crate::retry::with_retry;
use crate::store::CellStore;
use crate::surface::{ChangeInbox, SheetDimensions, SpreadsheetSurface, SurfaceOp, SuppressionGuard};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cached, dirty-tracked view of one worksheet on a [`SpreadsheetSurface`].
///
/// Local mutations only touch the cache and the dirty sets; nothing reaches
/// the surface until [`flush`](Self::flush). The instance exclusively owns
/// its cells, rows and columns and is driven from one logical thread.
pub struct Worksheet {
    pub(crate) surface: Arc<dyn SpreadsheetSurface>,
    pub(crate) config: SyncConfig,
    pub(crate) store: CellStore,
    pub(crate) dirty: DirtyTracker,
    pub(crate) inbox: ChangeInbox,
    changes: broadcast::Sender<CellsChanged>,
}

impl Worksheet {
    /// Subscribes to the surface's change notifications and loads its
    /// current contents.
    pub async fn open(
        surface: Arc<dyn SpreadsheetSurface>,
        config: SyncConfig,
    ) -> Result<Self, SheetError> {
        let inbox = ChangeInbox::new();
        surface.subscribe(inbox.clone());
        let (changes, _) = broadcast::channel(config.notification_capacity.max(1));

        let mut sheet = Self {
            surface,
            config,
            store: CellStore::new(),
            dirty: DirtyTracker::new(),
            inbox,
            changes,
        };
        sheet.reset().await?;
        Ok(sheet)
    }

    pub fn name(&self) -> String {
        self.surface.sheet_name()
    }

    pub fn dimensions(&self) -> SheetDimensions {
        self.surface.dimensions()
    }

    pub fn surface(&self) -> &Arc<dyn SpreadsheetSurface> {
        &self.surface
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn inbox(&self) -> &ChangeInbox {
        &self.inbox
    }

    /// `CellsChanged` events raised by resets and inbound reconciliation.
    pub fn subscribe(&self) -> broadcast::Receiver<CellsChanged> {
        self.changes.subscribe()
    }

    /// Holds the reentrancy guard for as long as the returned value lives.
    pub fn suppress_notifications(&self) -> SuppressionGuard {
        self.inbox.suppress()
    }

    pub(crate) fn publish(&self, event: &CellsChanged) {
        if event.is_empty() {
            return;
        }
        // No receivers is fine.
        let _ = self.changes.send(event.clone());
    }

    /// Cell at a signed coordinate, created on first access.
    pub fn cell(&mut self, row: i64, column: i64) -> Result<CellMut<'_>, SheetError> {
        let at = self.checked(row, column)?;
        Ok(self.cell_mut(at))
    }

    pub fn cell_at(&mut self, at: Coord) -> Result<CellMut<'_>, SheetError> {
        self.cell(i64::from(at.row), i64::from(at.col))
    }

    fn cell_mut(&mut self, at: Coord) -> CellMut<'_> {
        let cell = self.store.cell_mut_at(at);
        CellMut {
            at,
            cell,
            dirty: &mut self.dirty,
        }
    }

    /// Cached cell without creating one.
    pub fn get(&self, at: Coord) -> Option<&Cell> {
        self.store.at(at)
    }

    pub fn value(&self, at: Coord) -> CellValue {
        self.get(at).map(|cell| cell.value().clone()).unwrap_or_default()
    }

    /// Row entity at `index`, created on first access.
    pub fn row(&mut self, index: i64) -> Result<RowMut<'_>, SheetError> {
        let at = self.checked(index, 0)?;
        let id = self.store.row_id(at.row);
        let row = self
            .store
            .row_mut(id)
            .ok_or(SheetError::InvalidCoordinate {
                row: index,
                column: 0,
            })?;
        Ok(RowMut {
            id,
            row,
            dirty: &mut self.dirty,
        })
    }

    pub fn column(&mut self, index: i64) -> Result<&Column, SheetError> {
        let at = self.checked(0, index)?;
        let id = self.store.column_id(at.col);
        self.store.column(id).ok_or(SheetError::InvalidCoordinate {
            row: 0,
            column: index,
        })
    }

    /// The shared row entity a cached cell links to.
    pub fn row_of(&self, at: Coord) -> Option<&Row> {
        self.get(at).and_then(|cell| self.store.row(cell.row_id()))
    }

    pub fn mark_dirty_value(&mut self, cell: CellId) {
        self.dirty.add_value(cell);
    }

    pub fn mark_dirty_formula(&mut self, cell: CellId) {
        self.dirty.add_formula(cell);
    }

    pub fn mark_dirty_comment(&mut self, cell: CellId) {
        self.dirty.add_comment(cell);
    }

    pub fn mark_dirty_style(&mut self, cell: CellId) {
        self.dirty.add_style(cell);
    }

    pub fn mark_dirty_number_format(&mut self, cell: CellId) {
        self.dirty.add_number_format(cell);
    }

    pub fn mark_dirty_options(&mut self, cell: CellId) {
        self.dirty.add_options(cell);
    }

    pub fn mark_dirty_row(&mut self, row: RowId) {
        self.dirty.add_row(row);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Writes every pending change to the surface. A no-op when clean.
    ///
    /// Entries of a category that fails are not re-marked; callers that want
    /// them retried on the next flush mark them dirty again.
    pub async fn flush(&mut self) -> Result<FlushReport, FlushError> {
        let report = flush::flush(&self.surface, &self.store, &mut self.dirty, &self.config).await?;
        if !report.is_noop() {
            tracing::debug!(
                sheet = %self.surface.sheet_name(),
                chunks = report.total_chunks(),
                recalculated = report.recalculated,
                "flush complete"
            );
        }
        Ok(report)
    }

    /// Flushes, then reads `rect` back from the surface and refreshes the
    /// cells already cached inside it.
    pub async fn read_committed(&mut self, rect: Rect) -> Result<Vec<Vec<CellValue>>, SheetError> {
        self.flush().await?;
        let surface = Arc::clone(&self.surface);
        let matrix = with_retry(&self.config.retry, SurfaceOp::ReadRange, || {
            surface.read_range(rect)
        })
        .await?;
        for (i, row) in matrix.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let at = Coord::new(rect.top + i as u32, rect.left + j as u32);
                if let Some(cell) = self.store.lookup(at).and_then(|id| self.store.get_mut(id)) {
                    cell.update_value(value.clone());
                }
            }
        }
        Ok(matrix)
    }

    /// Bounding box of cached cells holding a value or formula.
    pub fn used_range(&self) -> Option<Rect> {
        self.store
            .sorted()
            .into_iter()
            .filter(|(_, cell)| occupied(cell))
            .map(|(at, _)| Rect::cell(at))
            .reduce(|acc, next| Rect {
                top: acc.top.min(next.top),
                left: acc.left.min(next.left),
                bottom: acc.bottom.max(next.bottom),
                right: acc.right.max(next.right),
            })
    }

    /// Occupied span of one row within the sheet's used columns.
    pub fn used_range_in_row(&self, row: u32) -> Option<Rect> {
        let used = self.used_range()?;
        let (first, last) = self.trimmed_span(used.left, used.right, |col| Coord::new(row, col))?;
        Some(Rect::new(Coord::new(row, first), Coord::new(row, last)))
    }

    /// Occupied span of one column within the sheet's used rows.
    pub fn used_range_in_column(&self, column: u32) -> Option<Rect> {
        let used = self.used_range()?;
        let (first, last) =
            self.trimmed_span(used.top, used.bottom, |row| Coord::new(row, column))?;
        Some(Rect::new(Coord::new(first, column), Coord::new(last, column)))
    }

    /// Shrinks `[first, last]` from both ends past empty cells. Rows and
    /// columns share this so both scans stop on the same condition.
    fn trimmed_span(
        &self,
        mut first: u32,
        mut last: u32,
        at: impl Fn(u32) -> Coord,
    ) -> Option<(u32, u32)> {
        let empty = |index: u32| !self.get(at(index)).is_some_and(occupied);
        while last > first && empty(last) {
            last -= 1;
        }
        while first < last && empty(first) {
            first += 1;
        }
        if empty(first) { None } else { Some((first, last)) }
    }

    /// Looks up a workbook-level name on the surface.
    pub async fn resolve_named_range(&self, name: &str) -> Result<Rect, SheetError> {
        let surface = Arc::clone(&self.surface);
        let resolved = with_retry(&self.config.retry, SurfaceOp::ResolveName, || {
            surface.resolve_named_range(name)
        })
        .await
        .and_then(|found| found.ok_or_else(|| SurfaceError::UnknownName(name.to_string())));
        resolved.map_err(|source| SheetError::NamedRangeResolutionFailed {
            name: name.to_string(),
            source,
        })
    }

    /// Like [`resolve_named_range`](Self::resolve_named_range) but any
    /// failure reads as "not found".
    pub async fn find_named_range(&self, name: &str) -> Option<Rect> {
        match self.resolve_named_range(name).await {
            Ok(rect) => Some(rect),
            Err(err) => {
                tracing::debug!(name, error = %err, "named range not found");
                None
            }
        }
    }

    fn checked(&self, row: i64, column: i64) -> Result<Coord, SheetError> {
        let dims = self.surface.dimensions();
        let within = |index: i64, limit: u32| u32::try_from(index).ok().filter(|i| *i < limit);
        match (within(row, dims.rows), within(column, dims.columns)) {
            (Some(r), Some(c)) => Ok(Coord::new(r, c)),
            _ => Err(SheetError::InvalidCoordinate { row, column }),
        }
    }
}

fn occupied(cell: &Cell) -> bool {
    !cell.value().is_empty() || cell.formula().is_some()
}

/// Mutable handle to one cached cell. Setters record the change and mark the
/// matching dirty set unconditionally.
pub struct CellMut<'a> {
    at: Coord,
    cell: &'a mut Cell,
    dirty: &'a mut DirtyTracker,
}

impl CellMut<'_> {
    pub fn coord(&self) -> Coord {
        self.at
    }

    pub fn set_value(&mut self, value: impl Into<CellValue>) -> &mut Self {
        self.cell.value = value.into();
        self.dirty.add_value(self.cell.id());
        self
    }

    pub fn set_formula(&mut self, formula: Option<String>) -> &mut Self {
        self.cell.formula = formula;
        self.dirty.add_formula(self.cell.id());
        self
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> &mut Self {
        self.cell.comment = comment;
        self.dirty.add_comment(self.cell.id());
        self
    }

    pub fn set_style(&mut self, style: Option<Style>) -> &mut Self {
        self.cell.style = style;
        self.dirty.add_style(self.cell.id());
        self
    }

    pub fn set_number_format(&mut self, format: Option<String>) -> &mut Self {
        self.cell.number_format = format;
        self.dirty.add_number_format(self.cell.id());
        self
    }

    pub fn set_options(&mut self, options: Option<ValidationOptions>) -> &mut Self {
        self.cell.options = options;
        self.dirty.add_options(self.cell.id());
        self
    }

    /// Inbound update: replaces the cached value if it differs, never dirties.
    pub fn update_value(&mut self, value: impl Into<CellValue>) -> bool {
        self.cell.update_value(value.into())
    }
}

impl Deref for CellMut<'_> {
    type Target = Cell;

    fn deref(&self) -> &Cell {
        self.cell
    }
}

pub struct RowMut<'a> {
    id: RowId,
    row: &'a mut Row,
    dirty: &'a mut DirtyTracker,
}

impl RowMut<'_> {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn set_hidden(&mut self, hidden: bool) -> &mut Self {
        self.row.hidden = hidden;
        self.dirty.add_row(self.id);
        self
    }
}

impl Deref for RowMut<'_> {
    type Target = Row;

    fn deref(&self) -> &Row {
        self.row
    }
}

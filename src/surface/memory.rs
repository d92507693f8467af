use super::{
    CalculationMode, ChangeInbox, SheetDimensions, SpreadsheetSurface, SurfaceOp, SuspendToken,
};
use crate::coord::{Coord, Rect};
use crate::errors::SurfaceError;
use crate::model::{CellValue, Style, ValidationOptions};
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the headless surface stores for one cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOptions>,
}

impl MemoryCell {
    fn is_blank(&self) -> bool {
        self.value.is_empty()
            && self.formula.is_none()
            && self.comment.is_none()
            && self.style.is_none()
            && self.number_format.is_none()
            && self.validation.is_none()
    }

    fn occupies(&self) -> bool {
        !self.value.is_empty() || self.formula.is_some()
    }
}

#[derive(Debug)]
struct State {
    name: String,
    dims: SheetDimensions,
    cells: BTreeMap<Coord, MemoryCell>,
    hidden_rows: BTreeSet<u32>,
    names: BTreeMap<String, Rect>,
    app: SuspendToken,
    recalculations: usize,
    busy: AHashMap<SurfaceOp, u32>,
    failures: AHashMap<SurfaceOp, String>,
    calls: AHashMap<SurfaceOp, usize>,
    subscribers: Vec<ChangeInbox>,
}

/// Headless, in-memory surface.
///
/// Behaves like a worksheet without a user interface: it stores cells and
/// row visibility, honours the suspension token, fires change notifications
/// while events are enabled, and can be told to report busy or fail.
#[derive(Debug)]
pub struct MemorySurface {
    state: Mutex<State>,
}

impl MemorySurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_dimensions(name, SheetDimensions::default())
    }

    pub fn with_dimensions(name: impl Into<String>, dims: SheetDimensions) -> Self {
        Self {
            state: Mutex::new(State {
                name: name.into(),
                dims,
                cells: BTreeMap::new(),
                hidden_rows: BTreeSet::new(),
                names: BTreeMap::new(),
                app: SuspendToken::default(),
                recalculations: 0,
                busy: AHashMap::new(),
                failures: AHashMap::new(),
                calls: AHashMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Stores a value without notifying anyone, for seeding fixtures.
    pub fn put(&self, at: Coord, value: impl Into<CellValue>) {
        let mut state = self.state.lock();
        state.cells.entry(at).or_default().value = value.into();
    }

    pub fn put_cell(&self, at: Coord, cell: MemoryCell) {
        self.state.lock().cells.insert(at, cell);
    }

    /// Simulates a user typing into a cell: the value lands and, when events
    /// are enabled, subscribers are notified.
    pub fn apply_external_edit(&self, at: Coord, value: impl Into<CellValue>) {
        let inboxes = {
            let mut state = self.state.lock();
            state.cells.entry(at).or_default().value = value.into();
            state.notify_targets()
        };
        deliver(&inboxes, Rect::cell(at));
    }

    pub fn put_hidden(&self, row: u32, hidden: bool) {
        let mut state = self.state.lock();
        if hidden {
            state.hidden_rows.insert(row);
        } else {
            state.hidden_rows.remove(&row);
        }
    }

    pub fn define_name(&self, name: impl Into<String>, rect: Rect) {
        self.state.lock().names.insert(name.into(), rect);
    }

    pub fn set_calculation(&self, mode: CalculationMode) {
        self.state.lock().app.calculation = mode;
    }

    /// The next `times` calls of `op` report busy.
    pub fn inject_busy(&self, op: SurfaceOp, times: u32) {
        *self.state.lock().busy.entry(op).or_default() += times;
    }

    /// Every call of `op` is rejected until [`clear_failures`](Self::clear_failures).
    pub fn inject_failure(&self, op: SurfaceOp, message: impl Into<String>) {
        self.state.lock().failures.insert(op, message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.busy.clear();
    }

    pub fn cell(&self, at: Coord) -> Option<MemoryCell> {
        self.state.lock().cells.get(&at).cloned()
    }

    pub fn value(&self, at: Coord) -> CellValue {
        self.cell(at).map(|cell| cell.value).unwrap_or_default()
    }

    pub fn cells(&self) -> Vec<(Coord, MemoryCell)> {
        self.state
            .lock()
            .cells
            .iter()
            .map(|(at, cell)| (*at, cell.clone()))
            .collect()
    }

    pub fn names(&self) -> BTreeMap<String, Rect> {
        self.state.lock().names.clone()
    }

    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.state.lock().hidden_rows.contains(&row)
    }

    pub fn hidden_rows(&self) -> Vec<u32> {
        self.state.lock().hidden_rows.iter().copied().collect()
    }

    /// Application flags currently in effect.
    pub fn app_state(&self) -> SuspendToken {
        self.state.lock().app.clone()
    }

    pub fn recalculations(&self) -> usize {
        self.state.lock().recalculations
    }

    /// Attempts made against `op`, including ones answered busy.
    pub fn calls(&self, op: SurfaceOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn enter(&self, op: SurfaceOp) -> Result<parking_lot::MutexGuard<'_, State>, SurfaceError> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(remaining) = state.busy.get_mut(&op).filter(|left| **left > 0) {
            *remaining -= 1;
            return Err(SurfaceError::busy(op));
        }
        if let Some(message) = state.failures.get(&op) {
            return Err(SurfaceError::rejected(op, message.clone()));
        }
        Ok(state)
    }
}

impl State {
    fn notify_targets(&self) -> Vec<ChangeInbox> {
        if self.app.events_enabled {
            self.subscribers.clone()
        } else {
            Vec::new()
        }
    }

    fn check_rect(&self, op: SurfaceOp, rect: Rect) -> Result<(), SurfaceError> {
        if rect.bottom >= self.dims.rows || rect.right >= self.dims.columns {
            return Err(SurfaceError::rejected(op, format!("{rect} is outside the sheet")));
        }
        Ok(())
    }

    fn check_matrix<T>(&self, op: SurfaceOp, rect: Rect, matrix: &[Vec<T>]) -> Result<(), SurfaceError> {
        self.check_rect(op, rect)?;
        let shape_ok = matrix.len() == rect.height() as usize
            && matrix.iter().all(|row| row.len() == rect.width() as usize);
        if !shape_ok {
            return Err(SurfaceError::rejected(
                op,
                format!("payload shape does not match {rect}"),
            ));
        }
        Ok(())
    }

    fn update_cells(&mut self, rect: Rect, mut apply: impl FnMut(Coord, &mut MemoryCell)) {
        for at in rect.iter() {
            let cell = self.cells.entry(at).or_default();
            apply(at, cell);
            if cell.is_blank() {
                self.cells.remove(&at);
            }
        }
    }

    fn full_rows(&self, start: u32, count: u32) -> Rect {
        let last = start.saturating_add(count - 1).min(self.dims.rows - 1);
        Rect::new(Coord::new(start, 0), Coord::new(last, self.dims.columns - 1))
    }

    fn full_columns(&self, start: u32, count: u32) -> Rect {
        let last = start.saturating_add(count - 1).min(self.dims.columns - 1);
        Rect::new(Coord::new(0, start), Coord::new(self.dims.rows - 1, last))
    }

    fn remap_cells(&mut self, remap: impl Fn(Coord) -> Option<Coord>) {
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter_map(|(at, cell)| remap(at).map(|next| (next, cell)))
            .collect();
    }

    fn remap_rows(&mut self, remap: impl Fn(u32) -> Option<u32>) {
        let hidden = std::mem::take(&mut self.hidden_rows);
        self.hidden_rows = hidden.into_iter().filter_map(remap).collect();
    }
}

fn deliver(inboxes: &[ChangeInbox], extent: Rect) {
    for inbox in inboxes {
        inbox.deliver(extent);
    }
}

fn shift_in(index: u32, start: u32, count: u32, limit: u32) -> Option<u32> {
    if index < start {
        return Some(index);
    }
    index.checked_add(count).filter(|next| *next < limit)
}

fn shift_out(index: u32, start: u32, count: u32) -> Option<u32> {
    let end = start.saturating_add(count);
    if index < start {
        Some(index)
    } else if index < end {
        None
    } else {
        Some(index - count)
    }
}

#[async_trait]
impl SpreadsheetSurface for MemorySurface {
    fn sheet_name(&self) -> String {
        self.state.lock().name.clone()
    }

    fn dimensions(&self) -> SheetDimensions {
        self.state.lock().dims
    }

    fn subscribe(&self, inbox: ChangeInbox) {
        self.state.lock().subscribers.push(inbox);
    }

    async fn read_range(&self, rect: Rect) -> Result<Vec<Vec<CellValue>>, SurfaceError> {
        let state = self.enter(SurfaceOp::ReadRange)?;
        state.check_rect(SurfaceOp::ReadRange, rect)?;
        Ok((rect.top..=rect.bottom)
            .map(|row| {
                (rect.left..=rect.right)
                    .map(|col| {
                        state
                            .cells
                            .get(&Coord::new(row, col))
                            .map(|cell| cell.value.clone())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect())
    }

    async fn used_range(&self) -> Result<Option<Rect>, SurfaceError> {
        let state = self.enter(SurfaceOp::UsedRange)?;
        let used = state
            .cells
            .iter()
            .filter(|(_, cell)| cell.occupies())
            .map(|(at, _)| *at)
            .fold(None::<Rect>, |acc, at| {
                Some(match acc {
                    None => Rect::cell(at),
                    Some(rect) => Rect {
                        top: rect.top.min(at.row),
                        left: rect.left.min(at.col),
                        bottom: rect.bottom.max(at.row),
                        right: rect.right.max(at.col),
                    },
                })
            });
        Ok(used)
    }

    async fn write_values(
        &self,
        rect: Rect,
        values: &[Vec<CellValue>],
    ) -> Result<(), SurfaceError> {
        let inboxes = {
            let mut state = self.enter(SurfaceOp::WriteValues)?;
            state.check_matrix(SurfaceOp::WriteValues, rect, values)?;
            state.update_cells(rect, |at, cell| {
                let value = &values[(at.row - rect.top) as usize][(at.col - rect.left) as usize];
                cell.value = value.clone();
                cell.formula = None;
            });
            state.notify_targets()
        };
        deliver(&inboxes, rect);
        Ok(())
    }

    async fn write_formulas(
        &self,
        rect: Rect,
        formulas: &[Vec<Option<String>>],
    ) -> Result<(), SurfaceError> {
        let inboxes = {
            let mut state = self.enter(SurfaceOp::WriteFormulas)?;
            state.check_matrix(SurfaceOp::WriteFormulas, rect, formulas)?;
            state.update_cells(rect, |at, cell| {
                cell.formula =
                    formulas[(at.row - rect.top) as usize][(at.col - rect.left) as usize].clone();
            });
            state.notify_targets()
        };
        deliver(&inboxes, rect);
        Ok(())
    }

    async fn set_comment(&self, at: Coord, text: Option<&str>) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::SetComment)?;
        state.check_rect(SurfaceOp::SetComment, Rect::cell(at))?;
        state.update_cells(Rect::cell(at), |_, cell| {
            cell.comment = text.map(str::to_string);
        });
        Ok(())
    }

    async fn set_style(&self, rect: Rect, style: Option<&Style>) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::SetStyle)?;
        state.check_rect(SurfaceOp::SetStyle, rect)?;
        state.update_cells(rect, |_, cell| cell.style = style.cloned());
        Ok(())
    }

    async fn set_number_format(
        &self,
        rect: Rect,
        format: Option<&str>,
    ) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::SetNumberFormat)?;
        state.check_rect(SurfaceOp::SetNumberFormat, rect)?;
        state.update_cells(rect, |_, cell| {
            cell.number_format = format.map(str::to_string);
        });
        Ok(())
    }

    async fn set_validation(
        &self,
        rect: Rect,
        options: Option<&ValidationOptions>,
    ) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::SetValidation)?;
        state.check_rect(SurfaceOp::SetValidation, rect)?;
        state.update_cells(rect, |_, cell| cell.validation = options.cloned());
        Ok(())
    }

    async fn set_rows_hidden(
        &self,
        first_row: u32,
        last_row: u32,
        hidden: bool,
    ) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::SetRowsHidden)?;
        state.check_rect(SurfaceOp::SetRowsHidden, Rect::rows_span(first_row, last_row, 0))?;
        for row in first_row.min(last_row)..=first_row.max(last_row) {
            if hidden {
                state.hidden_rows.insert(row);
            } else {
                state.hidden_rows.remove(&row);
            }
        }
        Ok(())
    }

    async fn insert_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        if count == 0 {
            return Ok(());
        }
        let (inboxes, extent) = {
            let mut state = self.enter(SurfaceOp::InsertRows)?;
            let limit = state.dims.rows;
            if start >= limit {
                return Err(SurfaceError::rejected(SurfaceOp::InsertRows, "start is outside the sheet"));
            }
            state.remap_cells(|at| shift_in(at.row, start, count, limit).map(|row| Coord::new(row, at.col)));
            state.remap_rows(|row| shift_in(row, start, count, limit));
            (state.notify_targets(), state.full_rows(start, count))
        };
        deliver(&inboxes, extent);
        Ok(())
    }

    async fn delete_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        if count == 0 {
            return Ok(());
        }
        let (inboxes, extent) = {
            let mut state = self.enter(SurfaceOp::DeleteRows)?;
            if start >= state.dims.rows {
                return Err(SurfaceError::rejected(SurfaceOp::DeleteRows, "start is outside the sheet"));
            }
            state.remap_cells(|at| shift_out(at.row, start, count).map(|row| Coord::new(row, at.col)));
            state.remap_rows(|row| shift_out(row, start, count));
            (state.notify_targets(), state.full_rows(start, count))
        };
        deliver(&inboxes, extent);
        Ok(())
    }

    async fn insert_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        if count == 0 {
            return Ok(());
        }
        let (inboxes, extent) = {
            let mut state = self.enter(SurfaceOp::InsertColumns)?;
            let limit = state.dims.columns;
            if start >= limit {
                return Err(SurfaceError::rejected(SurfaceOp::InsertColumns, "start is outside the sheet"));
            }
            state.remap_cells(|at| shift_in(at.col, start, count, limit).map(|col| Coord::new(at.row, col)));
            (state.notify_targets(), state.full_columns(start, count))
        };
        deliver(&inboxes, extent);
        Ok(())
    }

    async fn delete_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        if count == 0 {
            return Ok(());
        }
        let (inboxes, extent) = {
            let mut state = self.enter(SurfaceOp::DeleteColumns)?;
            if start >= state.dims.columns {
                return Err(SurfaceError::rejected(SurfaceOp::DeleteColumns, "start is outside the sheet"));
            }
            state.remap_cells(|at| shift_out(at.col, start, count).map(|col| Coord::new(at.row, col)));
            (state.notify_targets(), state.full_columns(start, count))
        };
        deliver(&inboxes, extent);
        Ok(())
    }

    async fn suspend_automatic_behaviors(&self) -> Result<SuspendToken, SurfaceError> {
        let mut state = self.enter(SurfaceOp::Suspend)?;
        let prior = state.app.clone();
        state.app = SuspendToken {
            calculation: CalculationMode::Manual,
            screen_updating: false,
            events_enabled: false,
            status_bar: false,
            print_communication: false,
            format_conditions: false,
        };
        Ok(prior)
    }

    async fn restore(&self, token: &SuspendToken) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::Restore)?;
        state.app = token.clone();
        Ok(())
    }

    async fn calculate(&self) -> Result<(), SurfaceError> {
        let mut state = self.enter(SurfaceOp::Calculate)?;
        state.recalculations += 1;
        Ok(())
    }

    async fn resolve_named_range(&self, name: &str) -> Result<Option<Rect>, SurfaceError> {
        let state = self.enter(SurfaceOp::ResolveName)?;
        Ok(state.names.get(name).copied())
    }
}

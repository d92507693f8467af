//! The external spreadsheet surface the engine writes through.

mod inbox;
mod journal;
mod memory;

pub use inbox::{ChangeInbox, GuardState, SuppressionGuard};
pub use journal::{JournalSurface, SurfaceCall};
pub use memory::{MemoryCell, MemorySurface};

use crate::coord::{Coord, Rect};
use crate::errors::SurfaceError;
use crate::model::{CellValue, Style, ValidationOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Names every surface call, for logs, errors and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SurfaceOp {
    ReadRange,
    UsedRange,
    WriteValues,
    WriteFormulas,
    SetComment,
    SetStyle,
    SetNumberFormat,
    SetValidation,
    SetRowsHidden,
    InsertRows,
    DeleteRows,
    InsertColumns,
    DeleteColumns,
    Suspend,
    Restore,
    Calculate,
    ResolveName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    #[default]
    Automatic,
    SemiAutomatic,
    Manual,
}

/// Prior state captured by [`SpreadsheetSurface::suspend_automatic_behaviors`].
/// Handing it back to [`SpreadsheetSurface::restore`] reinstates every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendToken {
    pub calculation: CalculationMode,
    pub screen_updating: bool,
    pub events_enabled: bool,
    pub status_bar: bool,
    pub print_communication: bool,
    pub format_conditions: bool,
}

impl Default for SuspendToken {
    fn default() -> Self {
        Self {
            calculation: CalculationMode::Automatic,
            screen_updating: true,
            events_enabled: true,
            status_bar: true,
            print_communication: true,
            format_conditions: true,
        }
    }
}

/// Grid limits of a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetDimensions {
    pub rows: u32,
    pub columns: u32,
}

impl Default for SheetDimensions {
    fn default() -> Self {
        Self {
            rows: 1_048_576,
            columns: 16_384,
        }
    }
}

/// Capability interface over one worksheet of a spreadsheet application.
///
/// Every call may fail with [`SurfaceError::Busy`] while the application is
/// occupied; callers route calls through [`crate::retry::with_retry`].
#[async_trait]
pub trait SpreadsheetSurface: Send + Sync {
    fn sheet_name(&self) -> String;

    fn dimensions(&self) -> SheetDimensions;

    /// Registers the inbox that receives `RangeChanged` notifications.
    fn subscribe(&self, inbox: ChangeInbox);

    async fn read_range(&self, rect: Rect) -> Result<Vec<Vec<CellValue>>, SurfaceError>;

    async fn read_cell(&self, at: Coord) -> Result<CellValue, SurfaceError> {
        let matrix = self.read_range(Rect::cell(at)).await?;
        Ok(matrix
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }

    /// Bounding rectangle of every non-empty cell, `None` on an empty sheet.
    async fn used_range(&self) -> Result<Option<Rect>, SurfaceError>;

    async fn write_values(&self, rect: Rect, values: &[Vec<CellValue>])
    -> Result<(), SurfaceError>;

    async fn write_formulas(
        &self,
        rect: Rect,
        formulas: &[Vec<Option<String>>],
    ) -> Result<(), SurfaceError>;

    async fn set_comment(&self, at: Coord, text: Option<&str>) -> Result<(), SurfaceError>;

    async fn set_style(&self, rect: Rect, style: Option<&Style>) -> Result<(), SurfaceError>;

    async fn set_number_format(
        &self,
        rect: Rect,
        format: Option<&str>,
    ) -> Result<(), SurfaceError>;

    async fn set_validation(
        &self,
        rect: Rect,
        options: Option<&ValidationOptions>,
    ) -> Result<(), SurfaceError>;

    async fn set_rows_hidden(
        &self,
        first_row: u32,
        last_row: u32,
        hidden: bool,
    ) -> Result<(), SurfaceError>;

    async fn insert_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError>;

    async fn delete_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError>;

    async fn insert_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError>;

    async fn delete_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError>;

    /// Turns off recalculation, redraw and event delivery, returning what
    /// was in effect before.
    async fn suspend_automatic_behaviors(&self) -> Result<SuspendToken, SurfaceError>;

    async fn restore(&self, token: &SuspendToken) -> Result<(), SurfaceError>;

    async fn calculate(&self) -> Result<(), SurfaceError>;

    async fn resolve_named_range(&self, name: &str) -> Result<Option<Rect>, SurfaceError>;
}

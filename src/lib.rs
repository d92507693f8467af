//! Dirty-tracking, batched-flush cache over a slow spreadsheet surface.
//!
//! Application code mutates cells through a [`Worksheet`]; every mutation is
//! recorded locally and written to the [`SpreadsheetSurface`] only on
//! [`Worksheet::flush`], coalesced into as few bulk calls as possible.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod coord;
pub mod dirty;
pub mod errors;
pub mod flush;
pub mod model;
pub mod reconcile;
pub mod retry;
pub mod snapshot;
pub mod store;
pub mod surface;
pub mod worksheet;

pub use config::{CliArgs, SyncConfig};
pub use coord::{Coord, Rect};
pub use dirty::DirtyCategory;
pub use errors::{FlushError, SheetError, SurfaceError};
pub use flush::{CategoryFlush, FlushReport};
pub use model::{Cell, CellId, CellValue, Color, Column, Row, RowId, Style, ValidationOptions, ValidationSource};
pub use reconcile::{CellChange, CellsChanged, ChangeKind, StructuralOp};
pub use retry::{RetryPolicy, with_retry};
pub use snapshot::SheetSnapshot;
pub use store::Relocation;
pub use surface::{
    CalculationMode, ChangeInbox, GuardState, JournalSurface, MemorySurface, SheetDimensions,
    SpreadsheetSurface, SurfaceCall, SurfaceOp, SuspendToken,
};
pub use worksheet::{CellMut, RowMut, Worksheet};

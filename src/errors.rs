use crate::dirty::DirtyCategory;
use crate::reconcile::StructuralOp;
use crate::surface::SurfaceOp;
use thiserror::Error;

/// Failure raised by a [`crate::surface::SpreadsheetSurface`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The surface is momentarily unavailable (e.g. mid-recalculation by a user).
    #[error("surface busy during {operation}")]
    Busy { operation: SurfaceOp },
    #[error("surface rejected {operation}: {message}")]
    Rejected {
        operation: SurfaceOp,
        message: String,
    },
    #[error("named range '{0}' does not exist")]
    UnknownName(String),
}

impl SurfaceError {
    pub fn busy(operation: SurfaceOp) -> Self {
        Self::Busy { operation }
    }

    pub fn rejected(operation: SurfaceOp, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    /// Only busy signals are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("failed to suspend automatic behaviors")]
    Suspend(#[source] SurfaceError),
    #[error("flush of {category} failed ({committed} chunk(s) already committed)")]
    Failed {
        category: DirtyCategory,
        committed: usize,
        #[source]
        source: SurfaceError,
    },
    #[error("failed to restore automatic behaviors")]
    Restore(#[source] SurfaceError),
}

impl FlushError {
    pub fn last_cause(&self) -> &SurfaceError {
        match self {
            Self::Suspend(source) | Self::Restore(source) => source,
            Self::Failed { source, .. } => source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("invalid coordinate (row {row}, column {column})")]
    InvalidCoordinate { row: i64, column: i64 },
    #[error("{operation} at {start} (count {count}) failed")]
    StructuralEditFailed {
        operation: StructuralOp,
        start: u32,
        count: u32,
        #[source]
        source: SurfaceError,
    },
    #[error("named range '{name}' could not be resolved")]
    NamedRangeResolutionFailed {
        name: String,
        #[source]
        source: SurfaceError,
    },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Flush(#[from] FlushError),
}

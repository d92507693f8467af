use super::{ChangeInbox, SheetDimensions, SpreadsheetSurface, SuspendToken};
use crate::coord::{Coord, Rect};
use crate::errors::SurfaceError;
use crate::model::{CellValue, Style, ValidationOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One mutating call that reached a surface successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SurfaceCall {
    WriteValues {
        rect: Rect,
        values: Vec<Vec<CellValue>>,
    },
    WriteFormulas {
        rect: Rect,
        formulas: Vec<Vec<Option<String>>>,
    },
    SetComment {
        at: Coord,
        text: Option<String>,
    },
    SetStyle {
        rect: Rect,
        style: Option<Style>,
    },
    SetNumberFormat {
        rect: Rect,
        format: Option<String>,
    },
    SetValidation {
        rect: Rect,
        options: Option<ValidationOptions>,
    },
    SetRowsHidden {
        first_row: u32,
        last_row: u32,
        hidden: bool,
    },
    InsertRows {
        start: u32,
        count: u32,
    },
    DeleteRows {
        start: u32,
        count: u32,
    },
    InsertColumns {
        start: u32,
        count: u32,
    },
    DeleteColumns {
        start: u32,
        count: u32,
    },
    Suspend,
    Restore {
        token: SuspendToken,
    },
    Calculate,
}

impl SurfaceCall {
    /// Re-issues this call against `target`.
    pub async fn apply(&self, target: &dyn SpreadsheetSurface) -> Result<(), SurfaceError> {
        match self {
            SurfaceCall::WriteValues { rect, values } => target.write_values(*rect, values).await,
            SurfaceCall::WriteFormulas { rect, formulas } => {
                target.write_formulas(*rect, formulas).await
            }
            SurfaceCall::SetComment { at, text } => target.set_comment(*at, text.as_deref()).await,
            SurfaceCall::SetStyle { rect, style } => target.set_style(*rect, style.as_ref()).await,
            SurfaceCall::SetNumberFormat { rect, format } => {
                target.set_number_format(*rect, format.as_deref()).await
            }
            SurfaceCall::SetValidation { rect, options } => {
                target.set_validation(*rect, options.as_ref()).await
            }
            SurfaceCall::SetRowsHidden {
                first_row,
                last_row,
                hidden,
            } => target.set_rows_hidden(*first_row, *last_row, *hidden).await,
            SurfaceCall::InsertRows { start, count } => target.insert_rows(*start, *count).await,
            SurfaceCall::DeleteRows { start, count } => target.delete_rows(*start, *count).await,
            SurfaceCall::InsertColumns { start, count } => {
                target.insert_columns(*start, *count).await
            }
            SurfaceCall::DeleteColumns { start, count } => {
                target.delete_columns(*start, *count).await
            }
            SurfaceCall::Suspend => target.suspend_automatic_behaviors().await.map(|_| ()),
            SurfaceCall::Restore { token } => target.restore(token).await,
            SurfaceCall::Calculate => target.calculate().await,
        }
    }
}

/// Batch-mode surface: forwards every call to `inner` and keeps an ordered
/// journal of the mutations that succeeded. Reads are forwarded unrecorded.
pub struct JournalSurface<S> {
    inner: S,
    journal: Mutex<Vec<SurfaceCall>>,
}

impl<S: SpreadsheetSurface> JournalSurface<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn journal(&self) -> Vec<SurfaceCall> {
        self.journal.lock().clone()
    }

    /// Replays the recorded calls, in order, against another surface.
    pub async fn replay(&self, target: &dyn SpreadsheetSurface) -> Result<usize, SurfaceError> {
        let calls = self.journal();
        for call in &calls {
            call.apply(target).await?;
        }
        Ok(calls.len())
    }

    fn record<T>(&self, result: Result<T, SurfaceError>, call: impl FnOnce() -> SurfaceCall) -> Result<T, SurfaceError> {
        if result.is_ok() {
            self.journal.lock().push(call());
        }
        result
    }
}

#[async_trait]
impl<S: SpreadsheetSurface> SpreadsheetSurface for JournalSurface<S> {
    fn sheet_name(&self) -> String {
        self.inner.sheet_name()
    }

    fn dimensions(&self) -> SheetDimensions {
        self.inner.dimensions()
    }

    fn subscribe(&self, inbox: ChangeInbox) {
        self.inner.subscribe(inbox);
    }

    async fn read_range(&self, rect: Rect) -> Result<Vec<Vec<CellValue>>, SurfaceError> {
        self.inner.read_range(rect).await
    }

    async fn used_range(&self) -> Result<Option<Rect>, SurfaceError> {
        self.inner.used_range().await
    }

    async fn write_values(
        &self,
        rect: Rect,
        values: &[Vec<CellValue>],
    ) -> Result<(), SurfaceError> {
        let result = self.inner.write_values(rect, values).await;
        self.record(result, || SurfaceCall::WriteValues {
            rect,
            values: values.to_vec(),
        })
    }

    async fn write_formulas(
        &self,
        rect: Rect,
        formulas: &[Vec<Option<String>>],
    ) -> Result<(), SurfaceError> {
        let result = self.inner.write_formulas(rect, formulas).await;
        self.record(result, || SurfaceCall::WriteFormulas {
            rect,
            formulas: formulas.to_vec(),
        })
    }

    async fn set_comment(&self, at: Coord, text: Option<&str>) -> Result<(), SurfaceError> {
        let result = self.inner.set_comment(at, text).await;
        self.record(result, || SurfaceCall::SetComment {
            at,
            text: text.map(str::to_string),
        })
    }

    async fn set_style(&self, rect: Rect, style: Option<&Style>) -> Result<(), SurfaceError> {
        let result = self.inner.set_style(rect, style).await;
        self.record(result, || SurfaceCall::SetStyle {
            rect,
            style: style.cloned(),
        })
    }

    async fn set_number_format(
        &self,
        rect: Rect,
        format: Option<&str>,
    ) -> Result<(), SurfaceError> {
        let result = self.inner.set_number_format(rect, format).await;
        self.record(result, || SurfaceCall::SetNumberFormat {
            rect,
            format: format.map(str::to_string),
        })
    }

    async fn set_validation(
        &self,
        rect: Rect,
        options: Option<&ValidationOptions>,
    ) -> Result<(), SurfaceError> {
        let result = self.inner.set_validation(rect, options).await;
        self.record(result, || SurfaceCall::SetValidation {
            rect,
            options: options.cloned(),
        })
    }

    async fn set_rows_hidden(
        &self,
        first_row: u32,
        last_row: u32,
        hidden: bool,
    ) -> Result<(), SurfaceError> {
        let result = self.inner.set_rows_hidden(first_row, last_row, hidden).await;
        self.record(result, || SurfaceCall::SetRowsHidden {
            first_row,
            last_row,
            hidden,
        })
    }

    async fn insert_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        let result = self.inner.insert_rows(start, count).await;
        self.record(result, || SurfaceCall::InsertRows { start, count })
    }

    async fn delete_rows(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        let result = self.inner.delete_rows(start, count).await;
        self.record(result, || SurfaceCall::DeleteRows { start, count })
    }

    async fn insert_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        let result = self.inner.insert_columns(start, count).await;
        self.record(result, || SurfaceCall::InsertColumns { start, count })
    }

    async fn delete_columns(&self, start: u32, count: u32) -> Result<(), SurfaceError> {
        let result = self.inner.delete_columns(start, count).await;
        self.record(result, || SurfaceCall::DeleteColumns { start, count })
    }

    async fn suspend_automatic_behaviors(&self) -> Result<SuspendToken, SurfaceError> {
        let result = self.inner.suspend_automatic_behaviors().await;
        self.record(result, || SurfaceCall::Suspend)
    }

    async fn restore(&self, token: &SuspendToken) -> Result<(), SurfaceError> {
        let result = self.inner.restore(token).await;
        self.record(result, || SurfaceCall::Restore {
            token: token.clone(),
        })
    }

    async fn calculate(&self) -> Result<(), SurfaceError> {
        let result = self.inner.calculate().await;
        self.record(result, || SurfaceCall::Calculate)
    }

    async fn resolve_named_range(&self, name: &str) -> Result<Option<Rect>, SurfaceError> {
        self.inner.resolve_named_range(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MemorySurface, SurfaceOp};

    #[tokio::test(flavor = "current_thread")]
    async fn records_only_successful_mutations() {
        let surface = JournalSurface::new(MemorySurface::new("Sheet1"));
        surface.inner().inject_busy(SurfaceOp::InsertRows, 1);

        assert!(surface.insert_rows(0, 1).await.is_err());
        surface.insert_rows(0, 1).await.unwrap();
        surface.read_range(Rect::parse("A1").unwrap()).await.unwrap();

        assert_eq!(
            surface.journal(),
            vec![SurfaceCall::InsertRows { start: 0, count: 1 }]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn replay_reproduces_writes() {
        let source = JournalSurface::new(MemorySurface::new("Sheet1"));
        let rect = Rect::parse("A1:B1").unwrap();
        source
            .write_values(rect, &[vec![CellValue::from(1), CellValue::from("x")]])
            .await
            .unwrap();

        let target = MemorySurface::new("Sheet1");
        assert_eq!(source.replay(&target).await.unwrap(), 1);
        assert_eq!(target.value(Coord::new(0, 1)), CellValue::from("x"));
    }

    #[test]
    fn calls_serialize_with_tag() {
        let json = serde_json::to_value(SurfaceCall::Calculate).unwrap();
        assert_eq!(json["call"], "calculate");
    }
}

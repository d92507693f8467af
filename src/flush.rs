//! Materializes dirty state against the surface in as few calls as possible.

use crate::chunk::{self, Chunk, RowRun};
use crate::config::SyncConfig;
use crate::coord::{Coord, Rect};
use crate::dirty::{DirtyCategory, DirtyTracker};
use crate::errors::{FlushError, SurfaceError};
use crate::model::{Cell, CellValue, Style, ValidationOptions};
use crate::retry::{RetryPolicy, with_retry};
use crate::store::CellStore;
use crate::surface::{CalculationMode, SpreadsheetSurface, SurfaceOp};
use serde::Serialize;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFlush {
    pub category: DirtyCategory,
    /// Distinct cells (or rows) drained from the dirty set.
    pub entries: usize,
    /// Surface calls issued, one per chunk.
    pub chunks: usize,
}

/// What one flush wrote. Empty when there was nothing to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub categories: Vec<CategoryFlush>,
    pub recalculated: bool,
}

impl FlushReport {
    pub fn is_noop(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn chunks(&self, category: DirtyCategory) -> usize {
        self.categories
            .iter()
            .find(|entry| entry.category == category)
            .map_or(0, |entry| entry.chunks)
    }

    pub fn total_chunks(&self) -> usize {
        self.categories.iter().map(|entry| entry.chunks).sum()
    }
}

/// One bulk surface call, owning its payload so it can run on a worker task.
#[derive(Debug, Clone)]
enum WriteJob {
    Values(Chunk<CellValue>),
    Formulas(Chunk<Option<String>>),
    Comment { at: Coord, text: Option<String> },
    Style { rect: Rect, style: Option<Style> },
    NumberFormat { rect: Rect, format: Option<String> },
    Validation { rect: Rect, options: Option<ValidationOptions> },
    RowsHidden(RowRun),
}

impl WriteJob {
    fn op(&self) -> SurfaceOp {
        match self {
            WriteJob::Values(_) => SurfaceOp::WriteValues,
            WriteJob::Formulas(_) => SurfaceOp::WriteFormulas,
            WriteJob::Comment { .. } => SurfaceOp::SetComment,
            WriteJob::Style { .. } => SurfaceOp::SetStyle,
            WriteJob::NumberFormat { .. } => SurfaceOp::SetNumberFormat,
            WriteJob::Validation { .. } => SurfaceOp::SetValidation,
            WriteJob::RowsHidden(_) => SurfaceOp::SetRowsHidden,
        }
    }

    async fn run(
        &self,
        surface: &dyn SpreadsheetSurface,
        policy: &RetryPolicy,
    ) -> Result<(), SurfaceError> {
        let op = self.op();
        match self {
            WriteJob::Values(chunk) => {
                with_retry(policy, op, move || surface.write_values(chunk.rect, &chunk.items)).await
            }
            WriteJob::Formulas(chunk) => {
                with_retry(policy, op, move || {
                    surface.write_formulas(chunk.rect, &chunk.items)
                })
                .await
            }
            WriteJob::Comment { at, text } => {
                let at = *at;
                let text = text.as_deref();
                with_retry(policy, op, move || surface.set_comment(at, text)).await
            }
            WriteJob::Style { rect, style } => {
                let rect = *rect;
                let style = style.as_ref();
                with_retry(policy, op, move || surface.set_style(rect, style)).await
            }
            WriteJob::NumberFormat { rect, format } => {
                let rect = *rect;
                let format = format.as_deref();
                with_retry(policy, op, move || surface.set_number_format(rect, format)).await
            }
            WriteJob::Validation { rect, options } => {
                let rect = *rect;
                let options = options.as_ref();
                with_retry(policy, op, move || surface.set_validation(rect, options)).await
            }
            WriteJob::RowsHidden(run) => {
                let run = *run;
                with_retry(policy, op, move || {
                    surface.set_rows_hidden(run.first, run.last, run.hidden)
                })
                .await
            }
        }
    }
}

/// Drains every dirty set in flush order and writes it through `surface`.
///
/// Automatic behaviors are suspended before the first write and restored on
/// every exit path once suspension succeeded. A category that fails stops the
/// flush; categories after it keep their dirty entries, while the failed one
/// has already been drained.
pub(crate) async fn flush(
    surface: &Arc<dyn SpreadsheetSurface>,
    store: &CellStore,
    dirty: &mut DirtyTracker,
    config: &SyncConfig,
) -> Result<FlushReport, FlushError> {
    if dirty.is_empty() {
        return Ok(FlushReport::default());
    }

    let token = with_retry(&config.retry, SurfaceOp::Suspend, || {
        surface.suspend_automatic_behaviors()
    })
    .await
    .map_err(FlushError::Suspend)?;

    let written = write_categories(surface, store, dirty, config).await;

    let restored = with_retry(&config.retry, SurfaceOp::Restore, || surface.restore(&token)).await;
    if let Err(err) = &restored {
        tracing::warn!(error = %err, "failed to restore automatic behaviors after flush");
    }

    let mut recalculated = false;
    if token.calculation == CalculationMode::Automatic {
        match with_retry(&config.retry, SurfaceOp::Calculate, || surface.calculate()).await {
            Ok(()) => recalculated = true,
            Err(err) => tracing::warn!(error = %err, "recalculation after flush failed; ignoring"),
        }
    }

    let categories = written?;
    restored.map_err(FlushError::Restore)?;
    Ok(FlushReport {
        categories,
        recalculated,
    })
}

async fn write_categories(
    surface: &Arc<dyn SpreadsheetSurface>,
    store: &CellStore,
    dirty: &mut DirtyTracker,
    config: &SyncConfig,
) -> Result<Vec<CategoryFlush>, FlushError> {
    let mut report = Vec::new();
    for category in DirtyCategory::iter() {
        let (entries, jobs) = drain(category, store, dirty);
        if entries == 0 {
            continue;
        }
        let chunks = jobs.len();
        tracing::debug!(category = %category, cells = entries, chunks, "flushing category");

        dispatch(surface, config, jobs)
            .await
            .map_err(|(committed, source)| FlushError::Failed {
                category,
                committed,
                source,
            })?;

        report.push(CategoryFlush {
            category,
            entries,
            chunks,
        });
    }
    Ok(report)
}

/// Empties one dirty set and turns its live entries into write jobs.
/// Entries whose cell or row has since been evicted are dropped.
fn drain(
    category: DirtyCategory,
    store: &CellStore,
    dirty: &mut DirtyTracker,
) -> (usize, Vec<WriteJob>) {
    if category == DirtyCategory::RowVisibility {
        let rows: Vec<(u32, bool)> = dirty
            .take_rows()
            .into_iter()
            .filter_map(|id| store.row(id))
            .map(|row| (row.index(), row.hidden()))
            .collect();
        let jobs = chunk::coalesce_rows(rows.iter().copied())
            .into_iter()
            .map(WriteJob::RowsHidden)
            .collect();
        return (rows.len(), jobs);
    }

    let cells: Vec<(Coord, &Cell)> = dirty
        .take_cells(category)
        .into_iter()
        .filter_map(|id| Some((store.coord_of(id)?, store.get(id)?)))
        .collect();
    let entries = cells.len();

    let jobs = match category {
        DirtyCategory::Value => chunk::coalesce_blocks(
            cells.iter().map(|(at, cell)| (*at, cell.value().clone())),
            |_, _| true,
        )
        .into_iter()
        .map(WriteJob::Values)
        .collect(),
        DirtyCategory::Formula => chunk::coalesce_blocks(
            cells
                .iter()
                .map(|(at, cell)| (*at, cell.formula().map(str::to_string))),
            |_, _| true,
        )
        .into_iter()
        .map(WriteJob::Formulas)
        .collect(),
        DirtyCategory::Comment => chunk::singletons(
            cells
                .iter()
                .map(|(at, cell)| (*at, cell.comment().map(str::to_string))),
        )
        .into_iter()
        .map(|chunk| WriteJob::Comment {
            at: chunk.rect.top_left(),
            text: chunk.anchor().cloned().flatten(),
        })
        .collect(),
        DirtyCategory::Style => runs(cells.iter().map(|(at, cell)| (*at, cell.style().cloned())))
            .map(|(rect, style)| WriteJob::Style { rect, style })
            .collect(),
        DirtyCategory::NumberFormat => runs(
            cells
                .iter()
                .map(|(at, cell)| (*at, cell.number_format().map(str::to_string))),
        )
        .map(|(rect, format)| WriteJob::NumberFormat { rect, format })
        .collect(),
        DirtyCategory::Options => runs(cells.iter().map(|(at, cell)| (*at, cell.options().cloned())))
            .map(|(rect, options)| WriteJob::Validation { rect, options })
            .collect(),
        DirtyCategory::RowVisibility => Vec::new(),
    };
    (entries, jobs)
}

/// Equal-payload horizontal runs, reduced to `(rect, shared payload)`.
fn runs<T: PartialEq + Clone>(
    cells: impl Iterator<Item = (Coord, Option<T>)>,
) -> impl Iterator<Item = (Rect, Option<T>)> {
    chunk::coalesce_runs(cells, |a, b| a == b)
        .into_iter()
        .map(|chunk| (chunk.rect, chunk.anchor().cloned().flatten()))
}

/// Runs one category's jobs and waits for all of them. Returns the number of
/// committed chunks, or that number alongside the first failure.
async fn dispatch(
    surface: &Arc<dyn SpreadsheetSurface>,
    config: &SyncConfig,
    jobs: Vec<WriteJob>,
) -> Result<usize, (usize, SurfaceError)> {
    let mut committed = 0;

    if config.max_parallel_writes <= 1 || jobs.len() <= 1 {
        for job in &jobs {
            job.run(surface.as_ref(), &config.retry)
                .await
                .map_err(|err| (committed, err))?;
            committed += 1;
        }
        return Ok(committed);
    }

    let permits = Arc::new(Semaphore::new(config.max_parallel_writes));
    let mut tasks = JoinSet::new();
    for job in jobs {
        let permits = Arc::clone(&permits);
        let surface = Arc::clone(surface);
        let policy = config.retry;
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| SurfaceError::rejected(job.op(), "write pool closed"))?;
            job.run(surface.as_ref(), &policy).await
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => committed += 1,
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => {
                first_error.get_or_insert(SurfaceError::rejected(
                    SurfaceOp::WriteValues,
                    format!("write task cancelled: {join_err}"),
                ));
            }
        }
    }

    match first_error {
        Some(err) => Err((committed, err)),
        None => Ok(committed),
    }
}

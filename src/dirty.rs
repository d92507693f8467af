use crate::model::{CellId, RowId};
use ahash::RandomState;
use indexmap::IndexSet;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter};

type DirtySet<T> = IndexSet<T, RandomState>;

/// Attribute class tracked for deferred writes.
///
/// Declaration order is the flush order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DirtyCategory {
    NumberFormat,
    Value,
    Formula,
    Comment,
    Style,
    Options,
    RowVisibility,
}

/// Seven independent dirty sets for one worksheet.
///
/// Sets keep insertion order so a flush is reproducible; adding an entry
/// that is already present is a no-op. The only removal is a whole-set
/// [`take`](Self::take_cells), which hands the contents to the flush and
/// leaves a fresh empty set behind for anything dirtied afterwards.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    number_formats: DirtySet<CellId>,
    values: DirtySet<CellId>,
    formulas: DirtySet<CellId>,
    comments: DirtySet<CellId>,
    styles: DirtySet<CellId>,
    options: DirtySet<CellId>,
    rows: DirtySet<RowId>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, cell: CellId) {
        self.values.insert(cell);
    }

    pub fn add_formula(&mut self, cell: CellId) {
        self.formulas.insert(cell);
    }

    pub fn add_comment(&mut self, cell: CellId) {
        self.comments.insert(cell);
    }

    pub fn add_style(&mut self, cell: CellId) {
        self.styles.insert(cell);
    }

    pub fn add_number_format(&mut self, cell: CellId) {
        self.number_formats.insert(cell);
    }

    pub fn add_options(&mut self, cell: CellId) {
        self.options.insert(cell);
    }

    pub fn add_row(&mut self, row: RowId) {
        self.rows.insert(row);
    }

    pub fn len(&self, category: DirtyCategory) -> usize {
        match category {
            DirtyCategory::RowVisibility => self.rows.len(),
            other => self.cell_set(other).map_or(0, |set| set.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number_formats.is_empty()
            && self.values.is_empty()
            && self.formulas.is_empty()
            && self.comments.is_empty()
            && self.styles.is_empty()
            && self.options.is_empty()
            && self.rows.is_empty()
    }

    pub fn contains(&self, category: DirtyCategory, cell: CellId) -> bool {
        self.cell_set(category)
            .is_some_and(|set| set.contains(&cell))
    }

    pub fn contains_row(&self, row: RowId) -> bool {
        self.rows.contains(&row)
    }

    /// Drains one cell category, leaving an empty set in its place.
    /// Row visibility is drained with [`take_rows`](Self::take_rows).
    pub fn take_cells(&mut self, category: DirtyCategory) -> Vec<CellId> {
        let set = match category {
            DirtyCategory::NumberFormat => &mut self.number_formats,
            DirtyCategory::Value => &mut self.values,
            DirtyCategory::Formula => &mut self.formulas,
            DirtyCategory::Comment => &mut self.comments,
            DirtyCategory::Style => &mut self.styles,
            DirtyCategory::Options => &mut self.options,
            DirtyCategory::RowVisibility => return Vec::new(),
        };
        std::mem::take(set).into_iter().collect()
    }

    pub fn take_rows(&mut self) -> Vec<RowId> {
        std::mem::take(&mut self.rows).into_iter().collect()
    }

    fn cell_set(&self, category: DirtyCategory) -> Option<&DirtySet<CellId>> {
        match category {
            DirtyCategory::NumberFormat => Some(&self.number_formats),
            DirtyCategory::Value => Some(&self.values),
            DirtyCategory::Formula => Some(&self.formulas),
            DirtyCategory::Comment => Some(&self.comments),
            DirtyCategory::Style => Some(&self.styles),
            DirtyCategory::Options => Some(&self.options),
            DirtyCategory::RowVisibility => None,
        }
    }
}

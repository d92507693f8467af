use super::style::{Style, ValidationOptions};
use super::value::CellValue;
use serde::Serialize;

/// Stable identity of a cached cell. Survives relocation by structural edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellId(pub(crate) u32);

/// Arena key of a [`Row`] entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowId(pub(crate) u32);

/// Arena key of a [`Column`] entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub(crate) index: u32,
    pub(crate) hidden: bool,
}

impl Row {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            hidden: false,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub(crate) index: u32,
}

impl Column {
    pub(crate) fn new(index: u32) -> Self {
        Self { index }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Cached state of one worksheet cell.
///
/// A cell refers to its row and column through arena keys, so every cell on
/// a row observes the same [`Row`] entity.
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    row: RowId,
    column: ColumnId,
    pub(crate) value: CellValue,
    pub(crate) formula: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) style: Option<Style>,
    pub(crate) number_format: Option<String>,
    pub(crate) options: Option<ValidationOptions>,
}

impl Cell {
    pub(crate) fn new(id: CellId, row: RowId, column: ColumnId) -> Self {
        Self {
            id,
            row,
            column,
            value: CellValue::Empty,
            formula: None,
            comment: None,
            style: None,
            number_format: None,
            options: None,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn row_id(&self) -> RowId {
        self.row
    }

    pub fn column_id(&self) -> ColumnId {
        self.column
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn style(&self) -> Option<&Style> {
        self.style.as_ref()
    }

    pub fn number_format(&self) -> Option<&str> {
        self.number_format.as_deref()
    }

    pub fn options(&self) -> Option<&ValidationOptions> {
        self.options.as_ref()
    }

    /// Applies an externally observed value. Returns `true` only when it
    /// differs from the cached one; never marks the cell dirty.
    pub fn update_value(&mut self, value: CellValue) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> Cell {
        Cell::new(CellId(0), RowId(0), ColumnId(0))
    }

    #[test]
    fn update_value_reports_change_only_once() {
        let mut cell = cell();
        assert!(cell.update_value(CellValue::from("a")));
        assert!(!cell.update_value(CellValue::from("a")));
        assert!(cell.update_value(CellValue::from(1)));
        assert_eq!(cell.value(), &CellValue::Number(1.0));
    }

    #[test]
    fn update_value_distinguishes_kinds() {
        let mut cell = cell();
        cell.update_value(CellValue::Number(1.0));
        assert!(cell.update_value(CellValue::Bool(true)));
        assert!(!cell.update_value(CellValue::Bool(true)));
    }
}

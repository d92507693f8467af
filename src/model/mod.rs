mod cell;
mod style;
mod value;

pub use cell::{Cell, CellId, Column, ColumnId, Row, RowId};
pub use style::{Color, Style, ValidationOptions, ValidationSource};
pub use value::CellValue;

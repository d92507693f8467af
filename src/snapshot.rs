//! JSON image of a headless surface, so a worksheet can live in a file
//! between CLI invocations.

use crate::coord::{Coord, Rect};
use crate::surface::{CalculationMode, MemoryCell, MemorySurface, SheetDimensions, SpreadsheetSurface};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub name: String,
    #[serde(default)]
    pub dimensions: SheetDimensions,
    #[serde(default)]
    pub calculation: CalculationMode,
    /// Keyed by A1 address.
    #[serde(default)]
    pub cells: BTreeMap<String, MemoryCell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_rows: Vec<u32>,
    /// Name to A1 range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub names: BTreeMap<String, String>,
}

impl Default for SheetSnapshot {
    fn default() -> Self {
        Self {
            name: "Sheet1".to_string(),
            dimensions: SheetDimensions::default(),
            calculation: CalculationMode::Automatic,
            cells: BTreeMap::new(),
            hidden_rows: Vec::new(),
            names: BTreeMap::new(),
        }
    }
}

impl SheetSnapshot {
    pub fn capture(surface: &MemorySurface) -> Self {
        Self {
            name: surface.sheet_name(),
            dimensions: surface.dimensions(),
            calculation: surface.app_state().calculation,
            cells: surface
                .cells()
                .into_iter()
                .map(|(at, cell)| (at.to_string(), cell))
                .collect(),
            hidden_rows: surface.hidden_rows(),
            names: surface
                .names()
                .into_iter()
                .map(|(name, rect)| (name, rect.to_string()))
                .collect(),
        }
    }

    /// Builds a fresh surface holding this image.
    pub fn to_surface(&self) -> Result<MemorySurface> {
        let surface = MemorySurface::with_dimensions(self.name.clone(), self.dimensions);
        surface.set_calculation(self.calculation);
        for (address, cell) in &self.cells {
            let at = Coord::parse(address)
                .with_context(|| format!("invalid cell address '{address}' in snapshot"))?;
            surface.put_cell(at, cell.clone());
        }
        for row in &self.hidden_rows {
            surface.put_hidden(*row, true);
        }
        for (name, range) in &self.names {
            let rect = Rect::parse(range)
                .with_context(|| format!("invalid range '{range}' for name '{name}'"))?;
            surface.define_name(name.clone(), rect);
        }
        Ok(surface)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse snapshot {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write snapshot {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    #[test]
    fn surface_survives_capture_and_rebuild() {
        let surface = MemorySurface::new("Budget");
        surface.put(Coord::new(0, 0), "Item");
        surface.put(Coord::new(1, 1), 12.5);
        surface.put_hidden(4, true);
        surface.define_name("Items", Rect::parse("A1:A10").unwrap());

        let snapshot = SheetSnapshot::capture(&surface);
        assert!(snapshot.cells.contains_key("B2"));

        let rebuilt = snapshot.to_surface().unwrap();
        assert_eq!(rebuilt.value(Coord::new(1, 1)), CellValue::Number(12.5));
        assert!(rebuilt.is_row_hidden(4));
        assert_eq!(rebuilt.names().get("Items"), Rect::parse("A1:A10").as_ref());
    }

    #[test]
    fn bad_address_is_reported() {
        let mut snapshot = SheetSnapshot::default();
        snapshot.cells.insert("not-a-cell".into(), MemoryCell::default());
        let err = snapshot.to_surface().unwrap_err();
        assert!(err.to_string().contains("not-a-cell"));
    }
}

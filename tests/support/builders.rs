#![allow(dead_code)]
use sheet_sync::{CellValue, Coord, MemorySurface};

/// A1 address to a coordinate, panicking on typos in fixtures.
pub fn at(address: &str) -> Coord {
    Coord::parse(address).unwrap_or_else(|| panic!("bad fixture address {address}"))
}

/// Seeds cells on a surface without firing notifications.
pub fn seed<V: Into<CellValue> + Clone>(surface: &MemorySurface, cells: &[(&str, V)]) {
    for (address, value) in cells {
        surface.put(at(address), value.clone());
    }
}

/// Values of a rectangular block on the surface, row by row.
pub fn block(surface: &MemorySurface, range: &str) -> Vec<Vec<CellValue>> {
    let rect = sheet_sync::Rect::parse(range).unwrap_or_else(|| panic!("bad fixture range {range}"));
    (rect.top..=rect.bottom)
        .map(|row| {
            (rect.left..=rect.right)
                .map(|col| surface.value(Coord::new(row, col)))
                .collect()
        })
        .collect()
}

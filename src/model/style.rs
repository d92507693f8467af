use crate::coord::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Cell style. A cell without a style renders with automatic colouring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub background: Color,
}

impl Style {
    pub fn background(color: Color) -> Self {
        Self { background: color }
    }
}

/// Where a list validation takes its allowed entries from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationSource {
    List { items: Vec<String> },
    NamedRange { name: String },
    Range { sheet: String, rect: Rect },
}

impl ValidationSource {
    /// Source text as the surface's list validation expects it.
    pub fn to_formula(&self) -> String {
        match self {
            ValidationSource::List { items } => items.join(","),
            ValidationSource::NamedRange { name } => format!("={name}"),
            ValidationSource::Range { sheet, rect } => {
                format!("={}!{}", sheet, rect.to_absolute())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub source: ValidationSource,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub hide_in_cell_dropdown: bool,
}

impl ValidationOptions {
    pub fn new(source: ValidationSource) -> Self {
        Self {
            source,
            is_required: false,
            hide_in_cell_dropdown: false,
        }
    }

    pub fn required(mut self, is_required: bool) -> Self {
        self.is_required = is_required;
        self
    }

    pub fn hide_dropdown(mut self, hide: bool) -> Self {
        self.hide_in_cell_dropdown = hide;
        self
    }

    pub fn ignore_blank(&self) -> bool {
        !self.is_required
    }

    pub fn in_cell_dropdown(&self) -> bool {
        !self.hide_in_cell_dropdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;

    #[test]
    fn color_hex() {
        assert_eq!(Color::from_hex("#FF8000"), Some(Color::rgb(255, 128, 0)));
        assert_eq!(Color::from_hex("ff8000").unwrap().to_string(), "#FF8000");
        assert_eq!(Color::from_hex("#F80"), None);
    }

    #[test]
    fn validation_formula_forms() {
        let list = ValidationSource::List {
            items: vec!["Yes".into(), "No".into()],
        };
        assert_eq!(list.to_formula(), "Yes,No");

        let named = ValidationSource::NamedRange {
            name: "Choices".into(),
        };
        assert_eq!(named.to_formula(), "=Choices");

        let range = ValidationSource::Range {
            sheet: "Lists".into(),
            rect: Rect::new(Coord::new(0, 0), Coord::new(0, 2)),
        };
        assert_eq!(range.to_formula(), "=Lists!$A$1:$C$1");
    }

    #[test]
    fn flags_invert_for_surface() {
        let options = ValidationOptions::new(ValidationSource::List { items: vec![] })
            .required(true)
            .hide_dropdown(true);
        assert!(!options.ignore_blank());
        assert!(!options.in_cell_dropdown());
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last-known content of a cell.
///
/// Equality is exact per variant: `Number(1.0)` never equals `Text("1")`,
/// and numbers compare bit-for-bit through `f64::eq` without tolerance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDateTime),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Interprets user input the way a grid editor would: numbers, booleans,
    /// `#ERR` literals, ISO timestamps, otherwise text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Some(n) = trimmed.parse::<f64>().ok().filter(|n| n.is_finite()) {
            return CellValue::Number(n);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return CellValue::Bool(true),
            "false" => return CellValue::Bool(false),
            _ => {}
        }
        if trimmed.starts_with('#') && trimmed.len() > 1 {
            return CellValue::Error(trimmed.to_string());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return CellValue::Date(dt);
        }
        CellValue::Text(raw.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_per_variant() {
        assert_ne!(CellValue::Number(1.0), CellValue::Text("1".into()));
        assert_ne!(CellValue::Bool(true), CellValue::Number(1.0));
        assert_eq!(CellValue::from(2), CellValue::Number(2.0));
    }

    #[test]
    fn infer_picks_narrowest_kind() {
        assert_eq!(CellValue::infer("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::infer("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::infer("#N/A"), CellValue::Error("#N/A".into()));
        assert_eq!(CellValue::infer("hello"), CellValue::Text("hello".into()));
        assert_eq!(CellValue::infer("  "), CellValue::Empty);
        assert!(matches!(
            CellValue::infer("2024-01-31T00:00:00"),
            CellValue::Date(_)
        ));
    }
}

use super::Session;
use crate::cli::errors::EditParseError;
use crate::config::SyncConfig;
use crate::coord::Rect;
use crate::model::{CellValue, Color, Style, ValidationOptions, ValidationSource};
use crate::worksheet::Worksheet;
use anyhow::Result;
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Cells(Rect),
    /// Zero-based row index.
    Row(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Value(CellValue),
    Formula(String),
    NumberFormat(Option<String>),
    Comment(Option<String>),
    Background(Option<Color>),
    Validation(Option<ValidationOptions>),
    Hidden(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub target: EditTarget,
    pub action: EditAction,
}

/// Parses one shorthand edit.
///
/// ```text
/// A1=42            value (inferred type)
/// B1==SUM(A1:A3)   formula
/// A1:C1!fmt=0.00   number format; empty clears
/// A1!note=checked  comment; empty clears
/// A1!bg=#FFCC00    background colour; empty clears
/// A1!list=a,b,c    inline list validation; empty clears
/// A1!name=Items    named-range list validation
/// row:3!hidden=true
/// ```
pub fn parse_edit(entry: &str) -> Result<CellEdit, EditParseError> {
    let (lhs, rhs) = entry
        .split_once('=')
        .ok_or_else(|| EditParseError::MissingAssignment(entry.to_string()))?;
    let lhs = lhs.trim();
    let (address, attribute) = match lhs.split_once('!') {
        Some((address, attribute)) => (address.trim(), Some(attribute.trim().to_ascii_lowercase())),
        None => (lhs, None),
    };
    if address.is_empty() {
        return Err(EditParseError::MissingAssignment(entry.to_string()));
    }

    let target = parse_target(address)?;
    let action = match attribute.as_deref() {
        None => {
            let rhs = rhs.trim();
            if rhs.starts_with('=') {
                EditAction::Formula(rhs.to_string())
            } else {
                EditAction::Value(CellValue::infer(rhs))
            }
        }
        Some("fmt") => EditAction::NumberFormat(non_empty(rhs)),
        Some("note") => EditAction::Comment(non_empty(rhs)),
        Some("bg") => match non_empty(rhs) {
            None => EditAction::Background(None),
            Some(hex) => EditAction::Background(Some(Color::from_hex(&hex).ok_or_else(|| {
                EditParseError::InvalidValue {
                    attribute: "bg".to_string(),
                    value: hex.clone(),
                }
            })?)),
        },
        Some("list") => EditAction::Validation(non_empty(rhs).map(|items| {
            ValidationOptions::new(ValidationSource::List {
                items: items.split(',').map(|item| item.trim().to_string()).collect(),
            })
        })),
        Some("name") => EditAction::Validation(non_empty(rhs).map(|name| {
            ValidationOptions::new(ValidationSource::NamedRange { name })
        })),
        Some("hidden") => {
            let hidden = rhs
                .trim()
                .parse::<bool>()
                .map_err(|_| EditParseError::InvalidValue {
                    attribute: "hidden".to_string(),
                    value: rhs.to_string(),
                })?;
            EditAction::Hidden(hidden)
        }
        Some(other) => {
            return Err(EditParseError::UnknownAttribute {
                attribute: other.to_string(),
                entry: entry.to_string(),
            });
        }
    };

    let row_action = matches!(action, EditAction::Hidden(_));
    let row_target = matches!(target, EditTarget::Row(_));
    if row_action != row_target {
        return Err(EditParseError::WrongTarget {
            attribute: attribute.unwrap_or_else(|| "value".to_string()),
            target: address.to_string(),
        });
    }

    Ok(CellEdit { target, action })
}

fn parse_target(address: &str) -> Result<EditTarget, EditParseError> {
    let invalid = || EditParseError::InvalidAddress(address.to_string());
    if let Some(row) = address.strip_prefix("row:") {
        let number = row.trim().parse::<u32>().map_err(|_| invalid())?;
        return number.checked_sub(1).map(EditTarget::Row).ok_or_else(invalid);
    }
    Rect::parse(address).map(EditTarget::Cells).ok_or_else(invalid)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Applies one parsed edit to the cache, marking the touched cells dirty.
pub fn apply_edit(sheet: &mut Worksheet, edit: &CellEdit) -> Result<()> {
    match (&edit.target, &edit.action) {
        (EditTarget::Row(index), EditAction::Hidden(hidden)) => {
            sheet.row(i64::from(*index))?.set_hidden(*hidden);
        }
        (EditTarget::Cells(rect), action) => {
            for at in rect.iter() {
                let mut cell = sheet.cell_at(at)?;
                match action {
                    EditAction::Value(value) => {
                        cell.set_value(value.clone());
                    }
                    EditAction::Formula(formula) => {
                        cell.set_formula(Some(formula.clone()));
                    }
                    EditAction::NumberFormat(format) => {
                        cell.set_number_format(format.clone());
                    }
                    EditAction::Comment(text) => {
                        cell.set_comment(text.clone());
                    }
                    EditAction::Background(color) => {
                        cell.set_style(color.map(Style::background));
                    }
                    EditAction::Validation(options) => {
                        cell.set_options(options.clone());
                    }
                    EditAction::Hidden(_) => {}
                }
            }
        }
        (EditTarget::Row(_), _) => {}
    }
    Ok(())
}

pub async fn edit(
    file: PathBuf,
    edits: Vec<String>,
    journal: bool,
    config: &SyncConfig,
) -> Result<Value> {
    anyhow::ensure!(!edits.is_empty(), "at least one edit must be provided");
    let parsed = edits
        .iter()
        .map(|entry| parse_edit(entry))
        .collect::<Result<Vec<_>, _>>()?;

    let mut session = Session::open(&file, config).await?;
    for edit in &parsed {
        apply_edit(&mut session.sheet, edit)?;
    }
    let report = session.sheet.flush().await?;
    session.save()?;

    let mut payload = json!({
        "sheet": session.sheet.name(),
        "edits": parsed.len(),
        "flush": report,
    });
    if journal {
        payload["journal"] = session.journal()?;
    }
    Ok(payload)
}

use super::Session;
use crate::config::SyncConfig;
use crate::coord::column_index;
use crate::reconcile::StructuralOp;
use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::path::PathBuf;

/// Zero-based index from a 1-based row number, or from column letters /
/// a 1-based column number.
pub fn parse_position(operation: StructuralOp, raw: &str) -> Result<u32> {
    let raw = raw.trim();
    let number = match operation {
        StructuralOp::InsertRows | StructuralOp::DeleteRows => raw.parse::<u32>().ok(),
        StructuralOp::InsertColumns | StructuralOp::DeleteColumns => raw
            .parse::<u32>()
            .ok()
            .or_else(|| column_index(raw).map(|index| index + 1)),
    };
    match number.and_then(|n| n.checked_sub(1)) {
        Some(index) => Ok(index),
        None => bail!("invalid position '{raw}' for {operation}"),
    }
}

pub async fn structural(
    file: PathBuf,
    operation: StructuralOp,
    at: String,
    count: u32,
    journal: bool,
    config: &SyncConfig,
) -> Result<Value> {
    anyhow::ensure!(count > 0, "count must be at least 1");
    let start = parse_position(operation, &at)?;

    let mut session = Session::open(&file, config).await?;
    let relocation = match operation {
        StructuralOp::InsertRows => session.sheet.insert_rows(start, count).await?,
        StructuralOp::DeleteRows => session.sheet.delete_rows(start, count).await?,
        StructuralOp::InsertColumns => session.sheet.insert_columns(start, count).await?,
        StructuralOp::DeleteColumns => session.sheet.delete_columns(start, count).await?,
    };
    session.save()?;

    let mut payload = json!({
        "sheet": session.sheet.name(),
        "operation": operation,
        "start": at,
        "count": count,
        "moved": relocation.moved,
        "evicted": relocation
            .evicted
            .iter()
            .map(|coord| coord.to_string())
            .collect::<Vec<_>>(),
    });
    if journal {
        payload["journal"] = session.journal()?;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_one_based() {
        assert_eq!(parse_position(StructuralOp::InsertRows, "3").unwrap(), 2);
        assert_eq!(parse_position(StructuralOp::DeleteColumns, "C").unwrap(), 2);
        assert_eq!(parse_position(StructuralOp::InsertColumns, "1").unwrap(), 0);
        assert!(parse_position(StructuralOp::DeleteRows, "0").is_err());
        assert!(parse_position(StructuralOp::DeleteRows, "B").is_err());
    }
}

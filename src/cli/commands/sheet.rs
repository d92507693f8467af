use super::Session;
use crate::config::SyncConfig;
use crate::coord::Rect;
use crate::snapshot::SheetSnapshot;
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::path::PathBuf;

pub fn init(file: PathBuf, name: String, force: bool) -> Result<Value> {
    if file.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", file);
    }
    let snapshot = SheetSnapshot {
        name,
        ..SheetSnapshot::default()
    };
    snapshot.save(&file)?;
    Ok(json!({
        "sheet": snapshot.name,
        "path": file.display().to_string(),
    }))
}

pub async fn show(file: PathBuf, range: Option<String>, config: &SyncConfig) -> Result<Value> {
    let mut session = Session::open(&file, config).await?;
    let used_range = session.sheet.used_range().map(|rect| rect.to_string());

    if let Some(range) = range {
        let rect = Rect::parse(&range).with_context(|| format!("invalid range '{range}'"))?;
        let values = session.sheet.read_committed(rect).await?;
        return Ok(json!({
            "sheet": session.sheet.name(),
            "range": rect.to_string(),
            "values": values,
        }));
    }

    let snapshot = session.snapshot();
    Ok(json!({
        "sheet": snapshot.name,
        "used_range": used_range,
        "cells": snapshot.cells,
        "hidden_rows": snapshot.hidden_rows,
        "names": snapshot.names,
    }))
}

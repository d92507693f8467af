pub mod edit;
pub mod sheet;
pub mod structure;

use crate::config::SyncConfig;
use crate::snapshot::SheetSnapshot;
use crate::surface::{JournalSurface, MemorySurface};
use crate::worksheet::Worksheet;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A worksheet opened over a snapshot file, journaling every mutation.
pub(crate) struct Session {
    path: PathBuf,
    surface: Arc<JournalSurface<MemorySurface>>,
    pub(crate) sheet: Worksheet,
}

impl Session {
    pub(crate) async fn open(path: &Path, config: &SyncConfig) -> Result<Self> {
        let snapshot = SheetSnapshot::load(path)?;
        let surface = Arc::new(JournalSurface::new(snapshot.to_surface()?));
        let sheet = Worksheet::open(surface.clone(), config.clone())
            .await
            .with_context(|| format!("failed to open worksheet from {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            surface,
            sheet,
        })
    }

    pub(crate) fn snapshot(&self) -> SheetSnapshot {
        SheetSnapshot::capture(self.surface.inner())
    }

    pub(crate) fn save(&self) -> Result<()> {
        self.snapshot().save(&self.path)
    }

    pub(crate) fn journal(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.surface.journal())?)
    }
}

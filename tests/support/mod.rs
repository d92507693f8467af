#![allow(dead_code)]

pub mod builders;

use sheet_sync::{JournalSurface, MemorySurface, RetryPolicy, SyncConfig, Worksheet};
use std::sync::Arc;
use std::time::Duration;

#[allow(unused_imports)]
pub use builders::{at, block, seed};

/// Retries quickly and dispatches chunks sequentially so call order is stable.
pub fn fast_config() -> SyncConfig {
    SyncConfig::default()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
        .with_max_parallel_writes(1)
}

pub fn surface() -> Arc<MemorySurface> {
    Arc::new(MemorySurface::new("Sheet1"))
}

pub fn journaled() -> Arc<JournalSurface<MemorySurface>> {
    Arc::new(JournalSurface::new(MemorySurface::new("Sheet1")))
}

pub async fn open(surface: &Arc<MemorySurface>) -> Worksheet {
    open_with(surface, fast_config()).await
}

pub async fn open_with(surface: &Arc<MemorySurface>, config: SyncConfig) -> Worksheet {
    Worksheet::open(surface.clone(), config)
        .await
        .expect("open worksheet")
}

pub async fn open_journaled(surface: &Arc<JournalSurface<MemorySurface>>) -> Worksheet {
    Worksheet::open(surface.clone(), fast_config())
        .await
        .expect("open worksheet")
}

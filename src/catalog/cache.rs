// Read-through catalog cache with time-based invalidation.
//
// With a zero TTL every call performs a fresh scan and nothing is retained.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{scan, Catalog, GameLayout, ScanError};
use crate::metrics;

struct Cached {
    scanned_at: Instant,
    catalog: Arc<Catalog>,
}

/// Hands out catalogs for request handlers, rescanning as needed.
pub struct CatalogSource {
    games_dir: PathBuf,
    layout: GameLayout,
    ttl: Duration,
    cached: RwLock<Option<Cached>>,
}

impl CatalogSource {
    pub fn new(games_dir: PathBuf, layout: GameLayout, ttl: Duration) -> Self {
        Self {
            games_dir,
            layout,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Current catalog: cached if still fresh, otherwise a new scan.
    /// Scan failures are returned and never cached.
    pub async fn catalog(&self) -> Result<Arc<Catalog>, ScanError> {
        if self.ttl.is_zero() {
            return self.scan().await.map(Arc::new);
        }

        if let Some(catalog) = self.fresh(&*self.cached.read().await) {
            return Ok(catalog);
        }

        let mut slot = self.cached.write().await;
        // Another writer may have refreshed while we waited for the lock.
        if let Some(catalog) = self.fresh(&slot) {
            return Ok(catalog);
        }
        let catalog = Arc::new(self.scan().await?);
        *slot = Some(Cached {
            scanned_at: Instant::now(),
            catalog: catalog.clone(),
        });
        Ok(catalog)
    }

    /// Drop the cached catalog so the next call rescans.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    fn fresh(&self, cached: &Option<Cached>) -> Option<Arc<Catalog>> {
        cached
            .as_ref()
            .filter(|c| c.scanned_at.elapsed() < self.ttl)
            .map(|c| c.catalog.clone())
    }

    async fn scan(&self) -> Result<Catalog, ScanError> {
        let games_dir = self.games_dir.clone();
        let layout = self.layout.clone();
        let result = match tokio::task::spawn_blocking(move || scan(&games_dir, &layout)).await {
            Ok(result) => result,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        match &result {
            Ok(catalog) => {
                metrics::CATALOG_SCANS_TOTAL.with_label_values(&["ok"]).inc();
                metrics::CATALOG_ENTRIES.set(catalog.len() as i64);
            }
            Err(e) => {
                metrics::CATALOG_SCANS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!("Catalog scan failed: {e}");
            }
        }
        result
    }
}

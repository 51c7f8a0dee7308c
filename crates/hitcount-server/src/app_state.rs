//! Shared application state for the hitcount server.
//!
//! The counter store is injected rather than held globally, so tests can run
//! the real router over an in-memory database or a store that always fails.

use std::sync::Arc;

use hitcount_core::error::Result;

use crate::config::HitcountConfig;
use crate::obs::metrics::HitcountMetrics;
use crate::storage::{CounterStore, SqliteCounterStore};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: HitcountConfig,
    store: Arc<dyn CounterStore>,
    metrics: HitcountMetrics,
}

impl AppState {
    pub fn new(cfg: HitcountConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                store,
                metrics: HitcountMetrics::default(),
            }),
        }
    }

    /// Open the SQLite store described by `cfg.storage`. Blocking.
    pub fn from_config(cfg: HitcountConfig) -> Result<Self> {
        let store = SqliteCounterStore::open(&cfg.storage.store_options())?;
        tracing::info!(path = %cfg.storage.path, "counter store ready");
        Ok(Self::new(cfg, Arc::new(store)))
    }

    pub fn cfg(&self) -> &HitcountConfig {
        &self.inner.cfg
    }

    pub fn store(&self) -> Arc<dyn CounterStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn metrics(&self) -> &HitcountMetrics {
        &self.inner.metrics
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }
}

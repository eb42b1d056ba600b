//! Application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mtk_queue::{JobStatusStore, TaskQueue};
use mtk_worker::JobRunner;

use crate::config::ApiConfig;

/// Which storage adapters were configured at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageStatus {
    pub object: bool,
    pub drive: bool,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub runner: JobRunner,
    pub store: Arc<dyn JobStatusStore>,
    pub worker_alive: Arc<AtomicBool>,
    pub storage: StorageStatus,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        runner: JobRunner,
        store: Arc<dyn JobStatusStore>,
        worker_alive: Arc<AtomicBool>,
        storage: StorageStatus,
    ) -> Self {
        Self {
            config,
            runner,
            store,
            worker_alive,
            storage,
        }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        self.runner.queue()
    }

    pub fn is_worker_alive(&self) -> bool {
        self.worker_alive.load(Ordering::SeqCst)
    }
}

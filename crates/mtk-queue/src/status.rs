//! Job status sinks.
//!
//! Every lifecycle transition is written as the latest snapshot for its job
//! id. Writes for distinct ids may happen concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtk_models::{JobId, JobSnapshot};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::QueueResult;
use crate::redis_store::RedisStatusStore;

/// Default retention for job snapshots (24 hours).
pub const JOB_STATUS_TTL_SECS: u64 = 86_400;

/// Write side of the status store.
#[async_trait]
pub trait JobStatusSink: Send + Sync {
    /// Replace the latest snapshot for `job_id`.
    async fn record(&self, job_id: &JobId, snapshot: &JobSnapshot) -> QueueResult<()>;
}

/// Status sink that can also answer queries.
#[async_trait]
pub trait JobStatusStore: JobStatusSink {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobSnapshot>>;

    /// Snapshots updated at or after `since`, newest first.
    async fn list_since(&self, since: DateTime<Utc>) -> QueueResult<Vec<JobSnapshot>>;
}

/// Write-only view of a shared store.
pub fn store_sink(store: Arc<dyn JobStatusStore>) -> Arc<dyn JobStatusSink> {
    Arc::new(StoreSink(store))
}

struct StoreSink(Arc<dyn JobStatusStore>);

#[async_trait]
impl JobStatusSink for StoreSink {
    async fn record(&self, job_id: &JobId, snapshot: &JobSnapshot) -> QueueResult<()> {
        self.0.record(job_id, snapshot).await
    }
}

/// Status store configuration.
#[derive(Debug, Clone)]
pub struct StatusStoreConfig {
    /// `memory` or `redis`
    pub backend: String,
    /// Redis URL, used by the redis backend
    pub redis_url: String,
    /// Snapshot retention
    pub ttl: Duration,
}

impl Default for StatusStoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            ttl: Duration::from_secs(JOB_STATUS_TTL_SECS),
        }
    }
}

impl StatusStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("STATUS_STORE").unwrap_or_else(|_| "memory".to_string()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ttl: Duration::from_secs(
                std::env::var("JOB_STATUS_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(JOB_STATUS_TTL_SECS),
            ),
        }
    }
}

/// Build the configured status store.
pub fn build_status_store(config: &StatusStoreConfig) -> QueueResult<Arc<dyn JobStatusStore>> {
    match config.backend.as_str() {
        "redis" => {
            info!("Using Redis job status store");
            Ok(Arc::new(RedisStatusStore::new(&config.redis_url, config.ttl)?))
        }
        _ => {
            info!("Using in-memory job status store");
            Ok(Arc::new(MemoryStatusStore::new(config.ttl)))
        }
    }
}

/// Process-local status store.
///
/// Snapshots older than the retention window are pruned on write.
#[derive(Debug)]
pub struct MemoryStatusStore {
    retention: Duration,
    snapshots: RwLock<HashMap<JobId, JobSnapshot>>,
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(JOB_STATUS_TTL_SECS))
    }
}

impl MemoryStatusStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl JobStatusSink for MemoryStatusStore {
    async fn record(&self, job_id: &JobId, snapshot: &JobSnapshot) -> QueueResult<()> {
        let mut snapshots = self.snapshots.write().await;
        if let Ok(retention) = chrono::Duration::from_std(self.retention) {
            let cutoff = Utc::now() - retention;
            snapshots.retain(|_, s| s.updated_at >= cutoff);
        }
        snapshots.insert(job_id.clone(), snapshot.clone());
        Ok(())
    }
}

#[async_trait]
impl JobStatusStore for MemoryStatusStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobSnapshot>> {
        Ok(self.snapshots.read().await.get(job_id).cloned())
    }

    async fn list_since(&self, since: DateTime<Utc>) -> QueueResult<Vec<JobSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut recent: Vec<JobSnapshot> = snapshots
            .values()
            .filter(|s| s.updated_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_models::JobStatus;

    fn snapshot(id: &str, status: JobStatus) -> JobSnapshot {
        JobSnapshot::new(status, JobId::from_string(id), "queue_test", None)
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let store = MemoryStatusStore::default();
        let id = JobId::from_string("j1");

        store.record(&id, &snapshot("j1", JobStatus::Queued)).await.unwrap();
        store.record(&id, &snapshot("j1", JobStatus::Running)).await.unwrap();

        let latest = store.get(&id).await.unwrap().unwrap();
        assert_eq!(latest.job_status, JobStatus::Running);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = MemoryStatusStore::default();
        assert!(store.get(&JobId::from_string("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_since_filters_old() {
        let store = MemoryStatusStore::default();
        let mut old = snapshot("old", JobStatus::Done);
        old.updated_at = Utc::now() - chrono::Duration::minutes(30);
        store.record(&old.job_id.clone(), &old).await.unwrap();
        store.record(&JobId::from_string("new"), &snapshot("new", JobStatus::Queued)).await.unwrap();

        let recent = store
            .list_since(Utc::now() - chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].job_id.as_str(), "new");
    }

    #[tokio::test]
    async fn test_retention_prunes_on_write() {
        let store = MemoryStatusStore::new(Duration::from_secs(60));
        let mut stale = snapshot("stale", JobStatus::Done);
        stale.updated_at = Utc::now() - chrono::Duration::minutes(5);
        store.record(&JobId::from_string("stale"), &stale).await.unwrap();
        store.record(&JobId::from_string("fresh"), &snapshot("fresh", JobStatus::Queued)).await.unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_sink_writes_through() {
        let store: Arc<dyn JobStatusStore> = Arc::new(MemoryStatusStore::default());
        let sink = store_sink(store.clone());
        let id = JobId::from_string("through");

        sink.record(&id, &snapshot("through", JobStatus::Running)).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().job_status, JobStatus::Running);
    }

    #[test]
    fn test_default_config_is_memory() {
        let config = StatusStoreConfig::default();
        assert_eq!(config.backend, "memory");
        assert!(build_status_store(&config).is_ok());
    }
}

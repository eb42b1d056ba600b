//! Redis-backed job status store.
//!
//! Each snapshot is stored as JSON under `mtk:job_status:<id>` with a TTL.
//! A sorted set indexed by update time supports "recent jobs" queries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtk_models::{JobId, JobSnapshot};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::error::QueueResult;
use crate::status::{JobStatusSink, JobStatusStore};

const KEY_PREFIX: &str = "mtk:job_status:";
const INDEX_KEY: &str = "mtk:job_status:index";

/// Job status store on Redis.
pub struct RedisStatusStore {
    client: redis::Client,
    ttl: Duration,
}

impl RedisStatusStore {
    pub fn new(redis_url: &str, ttl: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl })
    }

    pub fn status_key(job_id: &JobId) -> String {
        format!("{}{}", KEY_PREFIX, job_id)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl JobStatusSink for RedisStatusStore {
    async fn record(&self, job_id: &JobId, snapshot: &JobSnapshot) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(snapshot)?;
        let score = snapshot.updated_at.timestamp_millis();
        let cutoff = Utc::now().timestamp_millis() - (self.ttl_secs() as i64 * 1000);

        conn.set_ex::<_, _, ()>(Self::status_key(job_id), json, self.ttl_secs())
            .await?;
        conn.zadd::<_, _, _, ()>(INDEX_KEY, job_id.as_str(), score).await?;
        conn.zrembyscore::<_, _, _, ()>(INDEX_KEY, "-inf", cutoff).await?;

        debug!(job_id = %job_id, status = %snapshot.job_status, "Recorded job status");
        Ok(())
    }
}

#[async_trait]
impl JobStatusStore for RedisStatusStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobSnapshot>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json: Option<String> = conn.get(Self::status_key(job_id)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list_since(&self, since: DateTime<Utc>) -> QueueResult<Vec<JobSnapshot>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn
            .zrevrangebyscore(INDEX_KEY, "+inf", since.timestamp_millis())
            .await?;

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn.get(format!("{}{}", KEY_PREFIX, id)).await?;
            match json.map(|j| serde_json::from_str::<JobSnapshot>(&j)) {
                Some(Ok(snapshot)) => snapshots.push(snapshot),
                Some(Err(e)) => warn!(job_id = %id, "Skipping unreadable job status: {}", e),
                None => {}
            }
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_models::JobStatus;

    #[test]
    fn test_status_key() {
        assert_eq!(
            RedisStatusStore::status_key(&JobId::from_string("abc")),
            "mtk:job_status:abc"
        );
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_round_trip_against_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let store = RedisStatusStore::new(&url, Duration::from_secs(60)).unwrap();
        let id = JobId::new();

        let snapshot = JobSnapshot::new(JobStatus::Running, id.clone(), "queue_redis", None);
        store.record(&id, &snapshot).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.job_status, JobStatus::Running);

        let recent = store
            .list_since(Utc::now() - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(recent.iter().any(|s| s.job_id == id));
    }
}

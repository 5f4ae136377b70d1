//! Batch removal of expired auth archives.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{BlobStore, MetadataStore};
use crate::error::{Result, StoreError};
use crate::store::{AuthRecord, Namespace, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: Vec<String>,
    /// Entries without an expiry, left alone.
    pub skipped: Vec<String>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

fn has_expiry(value: &Value) -> bool {
    match value.get("expiresAt") {
        None | Some(Value::Null) => false,
        Some(expires_at) => expires_at.as_i64() != Some(0),
    }
}

/// Removes blob and metadata of every auth record past its expiry.
///
/// Only one sweep runs at a time per sweeper; a second caller gets
/// [`StoreError::SweepInProgress`] instead of waiting.
pub struct Sweeper<'a, M, B> {
    store: &'a RecordStore<M, B>,
    running: Mutex<()>,
}

impl<'a, M, B> Sweeper<'a, M, B>
where
    M: MetadataStore,
    B: BlobStore,
{
    pub fn new(store: &'a RecordStore<M, B>) -> Self {
        Self {
            store,
            running: Mutex::new(()),
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| StoreError::SweepInProgress)?;

        let now = self.store.now();
        let entries = self
            .store
            .metadata()
            .children(Namespace::Auths.as_str())
            .await?;
        info!("Found {} auth entries, checking for expiration...", entries.len());

        let mut report = SweepReport {
            scanned: entries.len(),
            ..SweepReport::default()
        };

        for (slug, value) in entries {
            let value = match value {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping unreadable auth entry {}: {}", slug, e);
                    report.failures.push(SweepFailure {
                        slug,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if !has_expiry(&value) {
                debug!("Auth entry {} has no expiresAt, leaving it", slug);
                report.skipped.push(slug);
                continue;
            }
            let record = match AuthRecord::from_value(&slug, value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable auth entry {}: {}", slug, e);
                    report.failures.push(SweepFailure {
                        slug,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if !record.is_expired(now) {
                continue;
            }

            info!("Expiring {} (storage path {})", slug, record.storage_path);
            match self.store.purge_auth(&slug, &record.storage_path).await {
                Ok(()) => report.removed.push(slug),
                Err(e) => {
                    error!("Failed to remove {}: {}", slug, e);
                    report.failures.push(SweepFailure {
                        slug,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Sweeps every `period` until `cancel` fires. The first sweep runs
    /// immediately.
    pub async fn run_periodic(&self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sweeper stopped");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.sweep().await {
                Ok(report) if report.removed_count() > 0 || !report.failures.is_empty() => info!(
                    "Sweep removed {} expired auth(s), {} failure(s)",
                    report.removed_count(),
                    report.failures.len()
                ),
                Ok(_) => debug!("Sweep found nothing to remove"),
                Err(e) => error!("Sweep failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBlobStore, MemoryMetadataStore};
    use crate::store::ManualClock;
    use serde_json::json;

    type TestStore = RecordStore<MemoryMetadataStore, MemoryBlobStore>;

    fn test_store() -> (TestStore, ManualClock) {
        let clock = ManualClock::new(0);
        let store = RecordStore::new(MemoryMetadataStore::new(), MemoryBlobStore::new())
            .with_clock(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (store, clock) = test_store();
        store.put_auth("short", b"zip".to_vec(), 10).await.unwrap();
        store.put_auth("long", b"zip".to_vec(), 100).await.unwrap();
        clock.advance(Duration::from_secs(10));

        let sweeper = Sweeper::new(&store);
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, vec!["short".to_string()]);
        assert!(report.failures.is_empty());

        assert!(!store.blobs().exists("auths/short.zip").await.unwrap());
        assert!(store.metadata().get("auths/short").await.unwrap().is_none());
        assert!(store.blobs().exists("auths/long.zip").await.unwrap());
        store.get_auth("long").await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (store, clock) = test_store();
        store.put_auth("a", b"zip".to_vec(), 1).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let sweeper = Sweeper::new(&store);
        assert_eq!(sweeper.sweep().await.unwrap().removed_count(), 1);
        let again = sweeper.sweep().await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    #[tokio::test]
    async fn test_failure_on_one_record_does_not_stop_sweep() {
        let (store, clock) = test_store();
        store.put_auth("stuck", b"zip".to_vec(), 1).await.unwrap();
        store.put_auth("fine", b"zip".to_vec(), 1).await.unwrap();
        store.metadata().set("auths/garbled", json!({"expiresAt": "soon"})).await.unwrap();
        store.blobs().fail_key("auths/stuck.zip").await;
        clock.advance(Duration::from_secs(5));

        let sweeper = Sweeper::new(&store);
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.removed, vec!["fine".to_string()]);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.slug.as_str()).collect();
        assert_eq!(failed, vec!["garbled", "stuck"]);

        // metadata stays so the next sweep retries
        assert!(store.metadata().get("auths/stuck").await.unwrap().is_some());
        store.blobs().heal_key("auths/stuck.zip").await;
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.removed, vec!["stuck".to_string()]);
    }

    #[tokio::test]
    async fn test_entries_without_expiry_are_left_alone() {
        let (store, clock) = test_store();
        store.put_auth("old", b"zip".to_vec(), 1).await.unwrap();
        store
            .metadata()
            .set("auths/legacy", json!({"storagePath": "auths/legacy.zip"}))
            .await
            .unwrap();
        store
            .metadata()
            .set("auths/zeroed", json!({"expiresAt": 0, "createdAt": 0, "ttlSeconds": 0}))
            .await
            .unwrap();
        clock.set(1_000_000);

        let report = Sweeper::new(&store).sweep().await.unwrap();
        assert_eq!(report.removed, vec!["old".to_string()]);
        assert_eq!(report.skipped, vec!["legacy".to_string(), "zeroed".to_string()]);
        assert!(report.failures.is_empty());
        assert!(store.metadata().get("auths/legacy").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_blob() {
        let (store, clock) = test_store();
        store.put_auth("orphan", b"zip".to_vec(), 1).await.unwrap();
        store.blobs().delete("auths/orphan.zip").await.unwrap();
        clock.advance(Duration::from_secs(1));

        let report = Sweeper::new(&store).sweep().await.unwrap();
        assert_eq!(report.removed, vec!["orphan".to_string()]);
        assert!(store.metadata().is_empty().await);
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_refused() {
        let (store, _) = test_store();
        let sweeper = Sweeper::new(&store);
        let _held = sweeper.running.try_lock().unwrap();
        let err = sweeper.sweep().await.unwrap_err();
        assert!(matches!(err, StoreError::SweepInProgress));
    }

    #[tokio::test]
    async fn test_periodic_sweep_stops_on_cancel() {
        let (store, clock) = test_store();
        store.put_auth("tick", b"zip".to_vec(), 1).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let sweeper = Sweeper::new(&store);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::join!(
            sweeper.run_periodic(Duration::from_millis(10), cancel),
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                stopper.cancel();
            }
        );

        assert!(store.metadata().is_empty().await);
        assert!(store.blobs().is_empty().await);
    }
}

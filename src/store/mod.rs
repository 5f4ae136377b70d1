//! Slug-addressed records over a metadata store and a blob store.
//!
//! Two namespaces share the metadata store: `jsons/{slug}` holds inline
//! JSON payloads and uploaded folder trees, `auths/{slug}` holds the
//! metadata of an auth archive whose bytes live in the blob store at
//! `auths/{slug}.zip`. Auth records carry an expiry and read as
//! [`StoreError::Expired`] once it has passed, until the sweeper removes
//! them.

use serde_json::Value;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use crate::archive::{self, ArchiveEntry};
use crate::backend::{BlobStore, MetadataStore};
use crate::error::{BackendError, Result, StoreError};
use crate::slug::{self, DEFAULT_SLUG_LENGTH};
use crate::tree::Tree;

mod clock;
mod records;
mod stream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use records::{AuthRecord, JsonRecord, Record, RecordContent, UploadReceipt};
pub use stream::ArchiveStream;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Namespace {
    Jsons,
    Auths,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Jsons => "jsons",
            Namespace::Auths => "auths",
        }
    }

    /// Metadata path of `slug`.
    pub fn key(&self, slug: &str) -> String {
        format!("{}/{}", self.as_str(), slug)
    }

    /// Blob key of the archive stored for `slug`.
    pub fn blob_key(&self, slug: &str) -> String {
        format!("{}/{}.zip", self.as_str(), slug)
    }

    pub fn public_path(&self, slug: &str) -> String {
        match self {
            Namespace::Jsons => format!("/api/{}", slug),
            Namespace::Auths => format!("/api/auth/{}", slug),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub slug_length: usize,
    pub default_ttl_seconds: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            slug_length: DEFAULT_SLUG_LENGTH,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

pub struct RecordStore<M, B> {
    metadata: M,
    blobs: B,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
}

impl<M, B> RecordStore<M, B>
where
    M: MetadataStore,
    B: BlobStore,
{
    pub fn new(metadata: M, blobs: B) -> Self {
        Self {
            metadata,
            blobs,
            clock: Arc::new(SystemClock),
            options: StoreOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub async fn allocate(&self, namespace: Namespace, requested: Option<&str>) -> Result<String> {
        slug::allocate(&self.metadata, namespace, requested, self.options.slug_length).await
    }

    /// Upserts an inline JSON payload. `createdAt` survives overwrites.
    pub async fn put_json(&self, namespace: Namespace, slug: &str, payload: Value) -> Result<JsonRecord> {
        slug::ensure_valid(slug)?;
        if namespace != Namespace::Jsons {
            return Err(StoreError::InvalidInput(format!(
                "JSON payloads cannot be stored in {}",
                namespace
            )));
        }
        self.put_content(slug, RecordContent::Payload { payload }).await
    }

    pub async fn put_folder(&self, slug: &str, files: Tree) -> Result<JsonRecord> {
        slug::ensure_valid(slug)?;
        self.put_content(slug, RecordContent::Files { files }).await
    }

    async fn put_content(&self, slug: &str, content: RecordContent) -> Result<JsonRecord> {
        let key = Namespace::Jsons.key(slug);
        let now = self.now();
        let created_at = self
            .metadata
            .get(&key)
            .await?
            .and_then(|existing| existing.get("createdAt").and_then(Value::as_i64))
            .unwrap_or(now);

        let record = JsonRecord {
            slug: slug.to_string(),
            created_at,
            updated_at: now,
            content,
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| BackendError::serde(key.as_str(), e))?;
        self.metadata.set(&key, value).await?;
        Ok(record)
    }

    /// Stores archive bytes for `slug` and records when they expire.
    ///
    /// The blob is written first. If the metadata write then fails the blob
    /// is removed again and the metadata error is returned.
    pub async fn put_auth(&self, slug: &str, archive: Vec<u8>, ttl_seconds: u64) -> Result<AuthRecord> {
        slug::ensure_valid(slug)?;
        let record = AuthRecord::new(slug, self.now(), ttl_seconds);
        let key = Namespace::Auths.key(slug);
        let value = serde_json::to_value(&record)
            .map_err(|e| BackendError::serde(key.as_str(), e))?;

        self.blobs.write(&record.storage_path, archive).await?;

        if let Err(e) = self.metadata.set(&key, value).await {
            error!("Failed to write metadata for {}: {}", key, e);
            match self.blobs.delete(&record.storage_path).await {
                Ok(()) => info!("Removed orphaned blob {}", record.storage_path),
                Err(cleanup) if cleanup.is_not_found() => {}
                Err(cleanup) => error!(
                    "Failed to remove orphaned blob {}: {}",
                    record.storage_path, cleanup
                ),
            }
            return Err(e.into());
        }

        Ok(record)
    }

    pub async fn get(&self, namespace: Namespace, slug: &str) -> Result<Record> {
        match namespace {
            Namespace::Jsons => self.get_json(slug).await.map(Record::Json),
            Namespace::Auths => self.get_auth(slug).await.map(Record::Auth),
        }
    }

    pub async fn get_json(&self, slug: &str) -> Result<JsonRecord> {
        slug::ensure_valid(slug)?;
        let value = self
            .metadata
            .get(&Namespace::Jsons.key(slug))
            .await?
            .ok_or_else(|| StoreError::not_found(Namespace::Jsons, slug))?;
        JsonRecord::from_value(slug, value)
    }

    /// Live auth record. Past its expiry it is [`StoreError::Expired`] even
    /// though the metadata is still present.
    pub async fn get_auth(&self, slug: &str) -> Result<AuthRecord> {
        slug::ensure_valid(slug)?;
        let record = self
            .load_auth(slug)
            .await?
            .ok_or_else(|| StoreError::not_found(Namespace::Auths, slug))?;
        if record.is_expired(self.now()) {
            return Err(StoreError::Expired {
                slug: slug.to_string(),
                expires_at: record.expires_at,
            });
        }
        Ok(record)
    }

    async fn load_auth(&self, slug: &str) -> Result<Option<AuthRecord>> {
        match self.metadata.get(&Namespace::Auths.key(slug)).await? {
            Some(value) => AuthRecord::from_value(slug, value).map(Some),
            None => Ok(None),
        }
    }

    /// Zip bytes of a record.
    ///
    /// For auth records this streams the stored blob. Folder records are
    /// packed on the fly; payload-only records have no files to offer.
    pub async fn archive_stream(&self, namespace: Namespace, slug: &str) -> Result<ArchiveStream> {
        match namespace {
            Namespace::Auths => {
                let record = self.get_auth(slug).await?;
                if record.storage_path.is_empty() {
                    return Err(StoreError::not_found(Namespace::Auths, slug));
                }
                match self.blobs.read_stream(&record.storage_path).await {
                    Ok(reader) => Ok(ArchiveStream::new(slug, reader)),
                    Err(e) if e.is_not_found() => {
                        warn!(
                            "auths/{} points at missing blob {}",
                            slug, record.storage_path
                        );
                        Err(StoreError::not_found(Namespace::Auths, slug))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Namespace::Jsons => {
                let record = self.get_json(slug).await?;
                let files = record
                    .files()
                    .ok_or_else(|| StoreError::not_found(Namespace::Jsons, slug))?;
                let mut entries = Vec::new();
                for (path, entry) in files.files() {
                    entries.push(ArchiveEntry::new(path, entry.to_bytes()?));
                }
                let bytes = archive::pack(&entries)?;
                Ok(ArchiveStream::new(slug, Box::new(Cursor::new(bytes))))
            }
        }
    }

    /// Removes a record. Auth archives are deleted with it; a blob that is
    /// already gone is not an error.
    pub async fn delete(&self, namespace: Namespace, slug: &str) -> Result<()> {
        slug::ensure_valid(slug)?;
        let key = namespace.key(slug);
        let Some(value) = self.metadata.get(&key).await? else {
            return Err(StoreError::not_found(namespace, slug));
        };

        if namespace == Namespace::Auths {
            let storage_path = value
                .get("storagePath")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Namespace::Auths.blob_key(slug));
            return self.purge_auth(slug, &storage_path).await;
        }

        self.metadata.remove(&key).await?;
        info!("Removed {}", key);
        Ok(())
    }

    /// Deletes the blob (absence tolerated), then the metadata entry.
    pub(crate) async fn purge_auth(&self, slug: &str, storage_path: &str) -> Result<()> {
        if !storage_path.is_empty() {
            match self.blobs.delete(storage_path).await {
                Ok(()) => info!("Deleted storage file {}", storage_path),
                Err(e) if e.is_not_found() => info!("Storage file missing: {}", storage_path),
                Err(e) => return Err(e.into()),
            }
        }
        let key = Namespace::Auths.key(slug);
        self.metadata.remove(&key).await?;
        info!("Removed {}", key);
        Ok(())
    }

    pub async fn upload_json(&self, requested: Option<&str>, payload: Value) -> Result<UploadReceipt> {
        let slug = self.allocate(Namespace::Jsons, requested).await?;
        self.put_json(Namespace::Jsons, &slug, payload).await?;
        info!("Stored JSON payload at jsons/{}", slug);
        Ok(UploadReceipt {
            url: Namespace::Jsons.public_path(&slug),
            slug,
            expires_at: None,
        })
    }

    /// Stores a file set as a folder tree. A single `.zip` upload is
    /// unpacked and its entries become the tree.
    pub async fn upload_folder(
        &self,
        requested: Option<&str>,
        files: Vec<ArchiveEntry>,
    ) -> Result<UploadReceipt> {
        if files.is_empty() {
            return Err(StoreError::InvalidInput("No files uploaded".to_string()));
        }
        let entries = if files.len() == 1 && archive::is_zip_name(&files[0].name) {
            archive::unpack(&files[0].bytes)?
        } else {
            files
        };
        let tree = Tree::from_entries(
            entries
                .iter()
                .map(|entry| (entry.name.as_str(), archive::classify(&entry.bytes))),
        )?;
        if tree.is_empty() {
            return Err(StoreError::InvalidInput("Archive has no files".to_string()));
        }

        let slug = self.allocate(Namespace::Jsons, requested).await?;
        self.put_folder(&slug, tree).await?;
        info!("Stored {} file(s) at jsons/{}", entries.len(), slug);
        Ok(UploadReceipt {
            url: Namespace::Jsons.public_path(&slug),
            slug,
            expires_at: None,
        })
    }

    /// Stores a file set as an expiring auth archive. A single `.zip`
    /// upload is kept as-is, anything else is packed.
    pub async fn upload_auth(
        &self,
        requested: Option<&str>,
        files: Vec<ArchiveEntry>,
        ttl_seconds: Option<u64>,
    ) -> Result<UploadReceipt> {
        let ttl_seconds = ttl_seconds.unwrap_or(self.options.default_ttl_seconds);
        if ttl_seconds == 0 {
            return Err(StoreError::InvalidInput("ttl must be positive".to_string()));
        }

        let archive_bytes = match files.as_slice() {
            [] => return Err(StoreError::InvalidInput("No files uploaded".to_string())),
            [single] if archive::is_zip_name(&single.name) => {
                archive::unpack(&single.bytes)?;
                single.bytes.clone()
            }
            _ => archive::pack(&files)?,
        };

        let slug = self.allocate(Namespace::Auths, requested).await?;
        let record = self.put_auth(&slug, archive_bytes, ttl_seconds).await?;
        info!(
            "Stored auth archive at {} (expires at {})",
            record.storage_path, record.expires_at
        );
        Ok(UploadReceipt {
            url: Namespace::Auths.public_path(&slug),
            slug,
            expires_at: Some(record.expires_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBlobStore, MemoryMetadataStore};
    use crate::tree::{FileEntry, TreeNode};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    type TestStore = RecordStore<MemoryMetadataStore, MemoryBlobStore>;

    fn test_store() -> (TestStore, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let store = RecordStore::new(MemoryMetadataStore::new(), MemoryBlobStore::new())
            .with_clock(clock.clone());
        (store, clock)
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let entries: Vec<ArchiveEntry> = entries
            .iter()
            .map(|(name, bytes)| ArchiveEntry::new(*name, bytes.to_vec()))
            .collect();
        archive::pack(&entries).unwrap()
    }

    async fn read_all(mut stream: ArchiveStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_put_json_roundtrip_keeps_created_at() {
        let (store, clock) = test_store();
        store.put_json(Namespace::Jsons, "cfg", json!({"v": 1})).await.unwrap();
        clock.advance(Duration::from_secs(5));
        store.put_json(Namespace::Jsons, "cfg", json!({"v": 2})).await.unwrap();

        let record = store.get_json("cfg").await.unwrap();
        assert_eq!(record.payload(), Some(&json!({"v": 2})));
        assert_eq!(record.created_at, 1_700_000_000_000);
        assert_eq!(record.updated_at, 1_700_000_005_000);
    }

    #[tokio::test]
    async fn test_put_json_rejects_auth_namespace() {
        let (store, _) = test_store();
        let err = store.put_json(Namespace::Auths, "x", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_upload_json_generates_slug() {
        let (store, _) = test_store();
        let receipt = store.upload_json(None, json!({"a": 1})).await.unwrap();
        assert_eq!(receipt.slug.len(), 8);
        assert_eq!(receipt.url, format!("/api/{}", receipt.slug));

        let record = store.get(Namespace::Jsons, &receipt.slug).await.unwrap();
        match record {
            Record::Json(record) => assert_eq!(record.payload(), Some(&json!({"a": 1}))),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_with_taken_slug_conflicts() {
        let (store, _) = test_store();
        store.upload_json(Some("My Slug"), json!(1)).await.unwrap();
        let err = store.upload_json(Some("my-slug"), json!(2)).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            store.get_json("my-slug").await.unwrap().payload(),
            Some(&json!(1))
        );
    }

    #[tokio::test]
    async fn test_upload_folder_from_files() {
        let (store, _) = test_store();
        let files = vec![
            ArchiveEntry::new("bot/creds.json", br#"{"id":1}"#.to_vec()),
            ArchiveEntry::new("bot/notes.txt", b"remember".to_vec()),
        ];
        let receipt = store.upload_folder(Some("bot"), files).await.unwrap();
        assert_eq!(receipt.slug, "bot");

        let record = store.get_json("bot").await.unwrap();
        let tree = record.files().unwrap();
        assert_eq!(
            tree.get("bot/creds.json"),
            Some(&TreeNode::File(FileEntry::Json(json!({"id": 1}))))
        );
        assert_eq!(
            tree.get("bot/notes.txt"),
            Some(&TreeNode::File(FileEntry::Text("remember".to_string())))
        );
    }

    #[tokio::test]
    async fn test_upload_folder_unpacks_single_zip() {
        let (store, _) = test_store();
        let zip = zip_of(&[("a/b.json", b"[1]"), ("c.txt", b"c")]);
        let receipt = store
            .upload_folder(None, vec![ArchiveEntry::new("Upload.ZIP", zip)])
            .await
            .unwrap();

        let tree = store.get_json(&receipt.slug).await.unwrap().files().cloned().unwrap();
        assert_eq!(
            tree.get("a/b.json"),
            Some(&TreeNode::File(FileEntry::Json(json!([1]))))
        );
    }

    #[tokio::test]
    async fn test_upload_folder_path_conflict_stores_nothing() {
        let (store, _) = test_store();
        let files = vec![
            ArchiveEntry::new("a", b"file".to_vec()),
            ArchiveEntry::new("a/b", b"nested".to_vec()),
        ];
        let err = store.upload_folder(Some("clash"), files).await.unwrap_err();
        assert!(matches!(err, StoreError::PathConflict(_)));
        assert!(store.metadata().is_empty().await);
    }

    #[tokio::test]
    async fn test_folder_record_exports_as_archive() {
        let (store, _) = test_store();
        let files = vec![
            ArchiveEntry::new("creds.json", br#"{"id":1}"#.to_vec()),
            ArchiveEntry::new("keys/k.txt", b"secret".to_vec()),
        ];
        store.upload_folder(Some("f"), files).await.unwrap();

        let bytes = read_all(store.archive_stream(Namespace::Jsons, "f").await.unwrap()).await;
        let mut entries = archive::unpack(&bytes).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries[0].name, "creds.json");
        assert_eq!(entries[0].bytes, b"{\n  \"id\": 1\n}");
        assert_eq!(entries[1], ArchiveEntry::new("keys/k.txt", b"secret".to_vec()));
    }

    #[tokio::test]
    async fn test_payload_record_has_no_archive() {
        let (store, _) = test_store();
        store.put_json(Namespace::Jsons, "p", json!({})).await.unwrap();
        let err = store.archive_stream(Namespace::Jsons, "p").await.err().unwrap();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_auth_expiry_is_distinct_from_missing() {
        let (store, clock) = test_store();
        let receipt = store
            .upload_auth(None, vec![ArchiveEntry::new("creds.json", b"{}".to_vec())], Some(60))
            .await
            .unwrap();
        assert_eq!(receipt.expires_at, Some(1_700_000_060_000));
        store.get(Namespace::Auths, &receipt.slug).await.unwrap();

        clock.advance(Duration::from_secs(60));
        let err = store.get(Namespace::Auths, &receipt.slug).await.unwrap_err();
        assert!(matches!(err, StoreError::Expired { .. }));
        assert_eq!(err.status_code(), 410);

        let err = store.archive_stream(Namespace::Auths, &receipt.slug).await.err().unwrap();
        assert_eq!(err.status_code(), 410);

        let err = store.get(Namespace::Auths, "never-stored").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_auth_archive_stream_returns_stored_zip() {
        let (store, _) = test_store();
        let zip = zip_of(&[("creds.json", b"{}")]);
        let receipt = store
            .upload_auth(Some("bot"), vec![ArchiveEntry::new("auth.zip", zip.clone())], None)
            .await
            .unwrap();
        assert_eq!(receipt.url, "/api/auth/bot");

        let record = store.get_auth("bot").await.unwrap();
        assert_eq!(record.ttl_seconds, DEFAULT_TTL_SECONDS);

        let stream = store.archive_stream(Namespace::Auths, "bot").await.unwrap();
        assert_eq!(stream.slug(), "bot");
        assert_eq!(stream.file_name(), "bot.zip");
        assert_eq!(stream.content_type(), "application/zip");
        assert_eq!(read_all(stream).await, zip);
        assert_eq!(store.blobs().open_readers(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_download_releases_reader() {
        let (store, _) = test_store();
        let zip = zip_of(&[("creds.json", b"{}")]);
        store.put_auth("bot", zip, 60).await.unwrap();

        let mut stream = store.archive_stream(Namespace::Auths, "bot").await.unwrap();
        let mut head = [0u8; 4];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"PK\x03\x04");
        assert_eq!(store.blobs().open_readers(), 1);
        drop(stream);
        assert_eq!(store.blobs().open_readers(), 0);
    }

    #[tokio::test]
    async fn test_upload_auth_rejects_bad_zip_and_empty_sets() {
        let (store, _) = test_store();
        let err = store
            .upload_auth(None, vec![ArchiveEntry::new("a.zip", b"nope".to_vec())], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        let err = store.upload_auth(None, Vec::new(), None).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = store
            .upload_auth(None, vec![ArchiveEntry::new("x", b"1".to_vec())], Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(store.blobs().is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_blob_is_reported_not_found() {
        let (store, _) = test_store();
        store.put_auth("bot", zip_of(&[("a", b"a")]), 60).await.unwrap();
        store.blobs().delete("auths/bot.zip").await.unwrap();

        let err = store.archive_stream(Namespace::Auths, "bot").await.err().unwrap();
        assert!(matches!(err, StoreError::NotFound { .. }));
        // the record itself is still readable
        store.get_auth("bot").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_metadata_write_removes_blob() {
        let (store, _) = test_store();
        store.metadata().fail_path("auths/bot").await;

        let err = store.put_auth("bot", zip_of(&[("a", b"a")]), 60).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!store.blobs().exists("auths/bot.zip").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_auth_tolerates_missing_blob() {
        let (store, clock) = test_store();
        store.put_auth("gone", zip_of(&[("a", b"a")]), 1).await.unwrap();
        store.blobs().delete("auths/gone.zip").await.unwrap();
        clock.advance(Duration::from_secs(10));

        store.delete(Namespace::Auths, "gone").await.unwrap();
        let err = store.get(Namespace::Auths, "gone").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store.delete(Namespace::Auths, "gone").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_malformed_slugs_are_rejected() {
        let (store, _) = test_store();
        for bad in ["a/b", "", "UPPER", "../x", "a.b"] {
            let err = store.put_auth(bad, zip_of(&[("a", b"a")]), 60).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "{bad:?}");
            let err = store.put_json(Namespace::Jsons, bad, json!(1)).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "{bad:?}");
            let err = store.put_folder(bad, Tree::new()).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "{bad:?}");
            let err = store.get(Namespace::Auths, bad).await.unwrap_err();
            assert_eq!(err.status_code(), 400, "{bad:?}");
            let err = store.delete(Namespace::Jsons, bad).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "{bad:?}");
        }
        assert!(store.metadata().is_empty().await);
        assert!(store.blobs().is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_json_record() {
        let (store, _) = test_store();
        store.put_json(Namespace::Jsons, "x", json!(1)).await.unwrap();
        store.delete(Namespace::Jsons, "x").await.unwrap();
        assert!(matches!(
            store.get(Namespace::Jsons, "x").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}

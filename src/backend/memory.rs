use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Mutex;

use super::{BlobReader, BlobStore, Child, MetadataStore, key_segments};
use crate::error::BackendError;

fn injected(key: &str) -> BackendError {
    BackendError::io(key, io::Error::other("injected failure"))
}

/// In-memory [`MetadataStore`]. Clones share the same map.
///
/// Paths registered with [`MemoryMetadataStore::fail_path`] make `set` and
/// `remove` fail, which lets callers exercise partial-failure handling.
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    values: Arc<Mutex<BTreeMap<String, Value>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_path(&self, path: &str) {
        self.failing.lock().await.insert(path.to_string());
    }

    pub async fn heal_path(&self, path: &str) {
        self.failing.lock().await.remove(path);
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }

    async fn check(&self, path: &str) -> Result<(), BackendError> {
        if self.failing.lock().await.contains(path) {
            return Err(injected(path));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        key_segments(path)?;
        Ok(self.values.lock().await.get(path).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        key_segments(path)?;
        self.check(path).await?;
        self.values.lock().await.insert(path.to_string(), value);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        key_segments(path)?;
        self.check(path).await?;
        self.values.lock().await.remove(path);
        Ok(())
    }

    async fn children(&self, prefix: &str) -> Result<Vec<Child>, BackendError> {
        key_segments(prefix)?;
        let lead = format!("{}/", prefix);
        let values = self.values.lock().await;
        Ok(values
            .range(lead.clone()..)
            .take_while(|(path, _)| path.starts_with(&lead))
            .filter_map(|(path, value)| {
                let name = &path[lead.len()..];
                (!name.contains('/')).then(|| (name.to_string(), Ok(value.clone())))
            })
            .collect())
    }
}

/// In-memory [`BlobStore`]. Clones share the same objects.
///
/// Tracks how many read handles are currently alive so callers can check
/// that abandoned downloads release them.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    open_readers: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `write`, `read_stream` and `delete` fail for `key`.
    pub async fn fail_key(&self, key: &str) {
        self.failing.lock().await.insert(key.to_string());
    }

    pub async fn heal_key(&self, key: &str) {
        self.failing.lock().await.remove(key);
    }

    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    async fn check(&self, key: &str) -> Result<(), BackendError> {
        key_segments(key)?;
        if self.failing.lock().await.contains(key) {
            return Err(injected(key));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        self.check(key).await?;
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn read_stream(&self, key: &str) -> Result<BlobReader, BackendError> {
        self.check(key).await?;
        let bytes = self
            .objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.to_string()))?;
        self.open_readers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedReader {
            inner: Cursor::new(bytes),
            open: Arc::clone(&self.open_readers),
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        key_segments(key)?;
        Ok(self.objects.lock().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.check(key).await?;
        match self.objects.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(key.to_string())),
        }
    }
}

struct TrackedReader {
    inner: Cursor<Vec<u8>>,
    open: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

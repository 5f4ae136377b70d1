//! Storage collaborators used by the record store.
//!
//! ```text
//! backend/
//! ├── memory   # in-process maps, used by tests and ephemeral runs
//! └── fs       # one file per key under a root directory
//! ```
//!
//! Keys are hierarchical, `/`-separated and relative (`jsons/{slug}`,
//! `auths/{slug}.zip`).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::error::BackendError;

pub mod fs;
pub mod memory;

pub use fs::{FsBlobStore, FsMetadataStore};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};

/// Readable handle on a stored blob. Dropping it releases the handle.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Child of a metadata node. The value is an error when that one entry
/// cannot be read; its siblings are still listed.
pub type Child = (String, Result<Value, BackendError>);

/// Key-value metadata store addressed by hierarchical paths.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Value at `path`, `None` when absent.
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError>;

    /// Removing an absent path succeeds.
    async fn remove(&self, path: &str) -> Result<(), BackendError>;

    /// Direct children of `prefix` as `(name, value)` pairs, sorted by name.
    async fn children(&self, prefix: &str) -> Result<Vec<Child>, BackendError>;

    async fn exists(&self, path: &str) -> Result<bool, BackendError> {
        Ok(self.get(path).await?.is_some())
    }
}

/// Blob store holding archive bytes.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError>;

    /// Fails with [`BackendError::NotFound`] when the blob is absent.
    async fn read_stream(&self, key: &str) -> Result<BlobReader, BackendError>;

    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Fails with [`BackendError::NotFound`] when the blob is absent.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        (**self).get(path).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        (**self).set(path, value).await
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        (**self).remove(path).await
    }

    async fn children(&self, prefix: &str) -> Result<Vec<Child>, BackendError> {
        (**self).children(prefix).await
    }

    async fn exists(&self, path: &str) -> Result<bool, BackendError> {
        (**self).exists(path).await
    }
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        (**self).write(key, bytes).await
    }

    async fn read_stream(&self, key: &str) -> Result<BlobReader, BackendError> {
        (**self).read_stream(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        (**self).delete(key).await
    }
}

/// Splits a storage key into its segments, rejecting absolute keys,
/// empty segments and parent references.
pub fn key_segments(key: &str) -> Result<Vec<&str>, BackendError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    let segments: Vec<&str> = key.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

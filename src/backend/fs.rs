use async_trait::async_trait;
use serde_json::Value;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{BlobReader, BlobStore, Child, MetadataStore, key_segments};
use crate::error::BackendError;

const RECORD_SUFFIX: &str = ".json";

fn resolve(root: &Path, key: &str, suffix: &str) -> Result<PathBuf, BackendError> {
    let segments = key_segments(key)?;
    let mut path = root.to_path_buf();
    if let Some((last, parents)) = segments.split_last() {
        for segment in parents {
            path.push(segment);
        }
        path.push(format!("{}{}", last, suffix));
    }
    Ok(path)
}

/// Writes through a uniquely named temp file in the target directory, so
/// concurrent writers to one key never share a staging path. The last
/// rename wins.
async fn write_atomic(path: &Path, key: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(&bytes)?;
        staged.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| BackendError::io(key, io::Error::other(e)))?
    .map_err(|e| BackendError::io(key, e))
}

/// Metadata store keeping one JSON document per key under `root`
/// (`jsons/abc` lives at `root/jsons/abc.json`).
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    root: PathBuf,
}

impl FsMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        let file = resolve(&self.root, path, RECORD_SUFFIX)?;
        match fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| BackendError::serde(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io(path, e)),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        let file = resolve(&self.root, path, RECORD_SUFFIX)?;
        let bytes = serde_json::to_vec_pretty(&value).map_err(|e| BackendError::serde(path, e))?;
        write_atomic(&file, path, bytes).await
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let file = resolve(&self.root, path, RECORD_SUFFIX)?;
        match fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::io(path, e)),
        }
    }

    async fn children(&self, prefix: &str) -> Result<Vec<Child>, BackendError> {
        let dir = resolve(&self.root, prefix, "")?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::io(prefix, e)),
        };

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackendError::io(prefix, e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(RECORD_SUFFIX))
            else {
                continue;
            };
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let key = format!("{}/{}", prefix, name);
            match self.get(&key).await {
                Ok(Some(value)) => children.push((name.to_string(), Ok(value))),
                Ok(None) => {}
                Err(e) => {
                    warn!("Unreadable metadata at {}: {}", key, e);
                    children.push((name.to_string(), Err(e)));
                }
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }
}

/// Blob store keeping one file per key under `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        let file = resolve(&self.root, key, "")?;
        write_atomic(&file, key, bytes).await
    }

    async fn read_stream(&self, key: &str) -> Result<BlobReader, BackendError> {
        let file = resolve(&self.root, key, "")?;
        match fs::File::open(&file).await {
            Ok(handle) => Ok(Box::new(handle)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotFound(key.to_string())),
            Err(e) => Err(BackendError::io(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let file = resolve(&self.root, key, "")?;
        fs::try_exists(&file)
            .await
            .map_err(|e| BackendError::io(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let file = resolve(&self.root, key, "")?;
        match fs::remove_file(&file).await {
            Ok(()) => {
                debug!("Deleted blob {}", file.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotFound(key.to_string())),
            Err(e) => Err(BackendError::io(key, e)),
        }
    }
}

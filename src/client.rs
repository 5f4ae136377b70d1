//! Process-wide record store, initialized once.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::backend::{BlobStore, FsBlobStore, FsMetadataStore, MetadataStore};
use crate::config::AppConfig;
use crate::error::{Result, StoreError};
use crate::store::{RecordStore, StoreOptions};

pub type SharedStore = RecordStore<Arc<dyn MetadataStore>, Arc<dyn BlobStore>>;

static CLIENT: OnceLock<SharedStore> = OnceLock::new();

/// Builds a filesystem-backed store rooted at `root`: metadata under
/// `root/db`, archives under `root/storage`.
pub fn build_store(root: &Path, options: StoreOptions) -> SharedStore {
    let metadata: Arc<dyn MetadataStore> = Arc::new(FsMetadataStore::new(root.join("db")));
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(root.join("storage")));
    RecordStore::new(metadata, blobs).with_options(options)
}

/// Initializes the shared store from `config`. Later calls, concurrent or
/// not, get the instance built by the first one.
pub fn init(config: &AppConfig) -> &'static SharedStore {
    CLIENT.get_or_init(|| {
        let root = config.data_dir();
        info!("Opening record store at {}", root.display());
        build_store(&root, config.store_options())
    })
}

pub fn get() -> Result<&'static SharedStore> {
    CLIENT.get().ok_or(StoreError::NotInitialized)
}

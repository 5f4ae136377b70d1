use thiserror::Error;

use crate::store::Namespace;

/// Failures raised by the metadata and blob backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Object with key {0} not found")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize {key}: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BackendError {
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        BackendError::Io {
            key: key.into(),
            source,
        }
    }

    pub fn serde(key: impl Into<String>, source: serde_json::Error) -> Self {
        BackendError::Serde {
            key: key.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{namespace}/{slug} not found")]
    NotFound { namespace: Namespace, slug: String },

    #[error("{slug} expired at {expires_at}")]
    Expired { slug: String, expires_at: i64 },

    #[error("slug {slug} already exists in {namespace}")]
    Conflict { namespace: Namespace, slug: String },

    #[error("failed to decode archive: {0}")]
    Decode(String),

    #[error("failed to encode archive: {0}")]
    Encode(String),

    #[error("path conflict at {0}: a node cannot be both a file and a directory")]
    PathConflict(String),

    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("a sweep is already running")]
    SweepInProgress,

    #[error("storage client is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn not_found(namespace: Namespace, slug: impl Into<String>) -> Self {
        StoreError::NotFound {
            namespace,
            slug: slug.into(),
        }
    }

    /// HTTP status a boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound { .. } => 404,
            StoreError::Expired { .. } => 410,
            StoreError::Conflict { .. } => 409,
            StoreError::InvalidInput(_) | StoreError::InvalidPath(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

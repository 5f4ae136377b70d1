use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use crate::error::{BackendError, Result};
use crate::tree::Tree;

use super::Namespace;

/// Body of a record in the `jsons` namespace.
///
/// A record with a `files` key is a folder, whatever else it holds. A
/// `files` value that is not a valid tree is a decode error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordContent {
    Files { files: Tree },
    Payload { payload: Value },
}

impl<'de> Deserialize<'de> for RecordContent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        match fields.remove("files") {
            Some(files) => Tree::deserialize(files)
                .map(|files| RecordContent::Files { files })
                .map_err(de::Error::custom),
            None => Ok(RecordContent::Payload {
                payload: fields.remove("payload").unwrap_or(Value::Null),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRecord {
    #[serde(default)]
    pub slug: String,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(flatten)]
    pub content: RecordContent,
}

impl JsonRecord {
    pub fn payload(&self) -> Option<&Value> {
        match &self.content {
            RecordContent::Payload { payload } => Some(payload),
            RecordContent::Files { .. } => None,
        }
    }

    pub fn files(&self) -> Option<&Tree> {
        match &self.content {
            RecordContent::Files { files } => Some(files),
            RecordContent::Payload { .. } => None,
        }
    }

    pub(crate) fn from_value(slug: &str, value: Value) -> Result<Self> {
        let mut record: JsonRecord = serde_json::from_value(value)
            .map_err(|e| BackendError::serde(Namespace::Jsons.key(slug), e))?;
        record.slug = slug.to_string();
        // records written before updatedAt existed
        if record.updated_at == 0 {
            record.updated_at = record.created_at;
        }
        Ok(record)
    }
}

/// Metadata of a stored auth archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub storage_path: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub ttl_seconds: u64,
}

impl AuthRecord {
    pub fn new(slug: &str, created_at: i64, ttl_seconds: u64) -> Self {
        Self {
            slug: slug.to_string(),
            storage_path: Namespace::Auths.blob_key(slug),
            created_at,
            expires_at: created_at.saturating_add((ttl_seconds as i64).saturating_mul(1000)),
            ttl_seconds,
        }
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }

    pub(crate) fn from_value(slug: &str, value: Value) -> Result<Self> {
        let mut record: AuthRecord = serde_json::from_value(value)
            .map_err(|e| BackendError::serde(Namespace::Auths.key(slug), e))?;
        record.slug = slug.to_string();
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Json(JsonRecord),
    Auth(AuthRecord),
}

/// What an upload hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub slug: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

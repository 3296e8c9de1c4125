use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object_detector::DetectedObject;
use crate::storage::StorageBackend;

/// Upload and analysis details, stored as the `metadata` JSON document of a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub id: String,
    pub original_name: String,
    pub filename: String,
    pub file_url: String,
    pub is_local_storage: bool,
    pub storage_backend: StorageBackend,
    pub size: u64,
    pub mimetype: String,
    pub description: String,
    pub detected_objects: Vec<DetectedObject>,
    pub object_categories: Vec<String>,
    /// `None` when detection did not run to completion.
    pub analysis_timestamp: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

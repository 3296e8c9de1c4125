use chrono::Utc;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Photo, PhotoMetadata, PhotoRepository, RepositoryError};
use crate::mimetype_detector;
use crate::object_detector::{DetectedObject, ObjectDetector, UNCATEGORIZED};
use crate::storage::StoragePlacement;

pub const NO_OBJECTS_DESCRIPTION: &str = "No specific objects detected";
pub const DETECTION_FAILED_DESCRIPTION: &str = "Image uploaded successfully";
pub const DETECTION_FAILED_ERROR: &str = "Object detection failed";

/// One file received from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Database error: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Upload pipeline: place the blob, detect objects, persist the record.
pub struct PhotoIngest {
    storage: Arc<StoragePlacement>,
    detector: Arc<ObjectDetector>,
    repository: PhotoRepository,
}

impl PhotoIngest {
    pub fn new(
        storage: Arc<StoragePlacement>,
        detector: Arc<ObjectDetector>,
        repository: PhotoRepository,
    ) -> Self {
        Self {
            storage,
            detector,
            repository,
        }
    }

    /// Every call creates a new record, even for identical bytes.
    pub async fn ingest(&self, upload: Option<UploadedFile>) -> Result<PhotoMetadata, IngestError> {
        let upload = match upload {
            Some(upload) if !upload.bytes.is_empty() => upload,
            _ => return Err(IngestError::MissingFile),
        };

        let id = Uuid::new_v4().to_string();
        let filename = match mimetype_detector::safe_extension(&upload.original_name) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.clone(),
        };
        let mimetype = mimetype_detector::image_mime_type(
            &upload.original_name,
            upload.content_type.as_deref(),
        );
        let size = upload.bytes.len() as u64;
        let uploaded_at = Utc::now();

        let outcome = self.storage.place(&filename, &upload.bytes, &mimetype).await;
        info!(
            "Placed upload {} ({} bytes) via {:?}",
            filename, size, outcome.path
        );

        // Detection runs as its own task so that even a panic inside it
        // only degrades the analysis instead of failing the upload.
        let detector = Arc::clone(&self.detector);
        let detection_mime = mimetype.clone();
        let bytes = upload.bytes;
        let detection =
            tokio::spawn(async move { detector.detect(&bytes, &detection_mime).await }).await;

        let (detected_objects, description, analysis_timestamp, analysis_error) = match detection {
            Ok(detection) => {
                info!(
                    "Detected {} objects in {} via {:?}",
                    detection.objects.len(),
                    filename,
                    detection.strategy
                );
                let description = describe(&detection.objects);
                (detection.objects, description, Some(Utc::now()), None)
            }
            Err(e) => {
                warn!("Object detection failed for {}: {}", filename, e);
                (
                    Vec::new(),
                    DETECTION_FAILED_DESCRIPTION.to_string(),
                    None,
                    Some(DETECTION_FAILED_ERROR.to_string()),
                )
            }
        };

        let metadata = PhotoMetadata {
            id,
            original_name: upload.original_name,
            filename,
            file_url: outcome.placement.url.clone(),
            is_local_storage: outcome.placement.is_local,
            storage_backend: outcome.placement.backend,
            size,
            mimetype,
            description,
            object_categories: categories(&detected_objects),
            detected_objects,
            analysis_timestamp,
            uploaded_at,
            error: analysis_error,
        };

        let photo = Photo::new(metadata, Utc::now());
        if let Err(e) = self.repository.insert(&photo).await {
            // The blob is left in place; there is no compensating delete.
            error!("Failed to persist photo {}: {}", photo.id, e);
            return Err(e.into());
        }

        info!("Stored photo {}", photo.id);
        Ok(photo.metadata)
    }
}

/// Human-readable summary of the detected objects.
pub fn describe(objects: &[DetectedObject]) -> String {
    if objects.is_empty() {
        return NO_OBJECTS_DESCRIPTION.to_string();
    }
    let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
    format!("Objects detected: {}", names.join(", "))
}

/// Distinct categories in first-seen order.
pub fn categories(objects: &[DetectedObject]) -> Vec<String> {
    let mut seen = HashSet::new();
    objects
        .iter()
        .map(|o| {
            if o.category.is_empty() {
                UNCATEGORIZED
            } else {
                o.category.as_str()
            }
        })
        .filter(|category| seen.insert(*category))
        .map(str::to_string)
        .collect()
}

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::db_pool::{create_db_pool, Database, DbPool};
pub use crate::db_types::PhotoMetadata;
use crate::storage::{Placement, StorageBackend, StorageError, StoragePlacement};

/// A stored photo as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub filename: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    #[serde(rename = "isLocalStorage")]
    pub is_local_storage: bool,
    pub description: String,
    pub metadata: PhotoMetadata,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(metadata: PhotoMetadata, created_at: DateTime<Utc>) -> Self {
        Self {
            id: metadata.id.clone(),
            filename: metadata.filename.clone(),
            file_url: metadata.file_url.clone(),
            is_local_storage: metadata.is_local_storage,
            description: metadata.description.clone(),
            metadata,
            created_at,
        }
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.metadata.storage_backend
    }

    pub fn placement(&self) -> Placement {
        Placement {
            is_local: self.is_local_storage,
            key: self.filename.clone(),
            url: self.file_url.clone(),
            backend: self.storage_backend(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PhotoRow {
    id: String,
    filename: String,
    file_url: String,
    is_local_storage: bool,
    storage_backend: String,
    description: String,
    metadata: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PhotoRow> for Photo {
    type Error = RepositoryError;

    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        let mut metadata: PhotoMetadata = serde_json::from_str(&row.metadata)?;
        // Columns are authoritative for the placement descriptor.
        metadata.storage_backend =
            StorageBackend::from_name(&row.storage_backend).ok_or_else(|| {
                RepositoryError::CorruptRow(format!(
                    "unknown storage backend '{}' for photo {}",
                    row.storage_backend, row.id
                ))
            })?;

        Ok(Photo {
            id: row.id,
            filename: row.filename,
            file_url: row.file_url,
            is_local_storage: row.is_local_storage,
            description: row.description,
            metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Photo not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt photo row: {0}")]
    CorruptRow(String),
}

const SELECT_PHOTO: &str = "SELECT id, filename, file_url, is_local_storage, storage_backend, \
     description, metadata, created_at FROM photos";

/// CRUD over the `photos` table. Records are never updated in place.
#[derive(Clone)]
pub struct PhotoRepository {
    database: Database,
    storage: Arc<StoragePlacement>,
}

impl PhotoRepository {
    pub fn new(database: Database, storage: Arc<StoragePlacement>) -> Self {
        Self { database, storage }
    }

    pub async fn insert(&self, photo: &Photo) -> Result<(), RepositoryError> {
        let pool = self.database.pool().await?;
        let metadata = serde_json::to_string(&photo.metadata)?;

        sqlx::query(
            "INSERT INTO photos (id, filename, file_url, is_local_storage, storage_backend,
             description, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&photo.id)
        .bind(&photo.filename)
        .bind(&photo.file_url)
        .bind(photo.is_local_storage)
        .bind(photo.storage_backend().as_str())
        .bind(&photo.description)
        .bind(metadata)
        .bind(photo.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Newest first.
    pub async fn list_all(&self) -> Result<Vec<Photo>, RepositoryError> {
        let pool = self.database.pool().await?;
        // julianday() because RFC 3339 strings with varying fraction digits don't sort lexically.
        let rows: Vec<PhotoRow> = sqlx::query_as(&format!(
            "{} ORDER BY julianday(created_at) DESC, rowid DESC",
            SELECT_PHOTO
        ))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Photo::try_from).collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Photo, RepositoryError> {
        let pool = self.database.pool().await?;
        let row: Option<PhotoRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_PHOTO))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Removes the blob first, then the row. If the blob cannot be removed the
    /// row is kept so the record stays consistent with what the client can see.
    pub async fn delete_by_id(&self, id: &str) -> Result<Photo, RepositoryError> {
        let photo = self.get_by_id(id).await?;

        if let Err(e) = self.storage.remove(&photo.placement()).await {
            warn!(
                "Failed to delete blob {} from {} storage, keeping photo {}: {}",
                photo.filename,
                photo.storage_backend(),
                id,
                e
            );
            return Err(e.into());
        }

        let pool = self.database.pool().await?;
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        info!("Deleted photo {}", id);
        Ok(photo)
    }
}

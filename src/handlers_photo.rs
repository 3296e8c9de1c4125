use bytes::BufMut;
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use warp::multipart::FormData;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::PhotoRepository;
use crate::ingest::{PhotoIngest, UploadedFile};
use crate::warp_helpers::{with_ingest, with_repository, ValidationError};

/// Name of the multipart field carrying the image.
pub const PHOTO_FIELD: &str = "photo";

pub async fn upload_photo(
    form: FormData,
    ingest: Arc<PhotoIngest>,
) -> Result<impl Reply, Rejection> {
    let upload = read_photo_part(form).await.map_err(|e| {
        log::warn!("Failed to read upload form: {}", e);
        reject::custom(ValidationError {
            message: format!("Invalid upload: {}", e),
        })
    })?;

    let metadata = ingest.ingest(upload).await?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "data": metadata
    })))
}

/// Collects the first `photo` part of the form. Other parts are ignored.
async fn read_photo_part(form: FormData) -> Result<Option<UploadedFile>, warp::Error> {
    let mut form = Box::pin(form);
    while let Some(part) = form.try_next().await? {
        if part.name() != PHOTO_FIELD {
            continue;
        }

        let original_name = part.filename().unwrap_or("upload").to_string();
        let content_type = part.content_type().map(str::to_string);
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.put(chunk);
                Ok(acc)
            })
            .await?;

        return Ok(Some(UploadedFile {
            original_name,
            content_type,
            bytes,
        }));
    }

    Ok(None)
}

pub async fn list_photos(repository: PhotoRepository) -> Result<impl Reply, Rejection> {
    let photos = repository.list_all().await?;
    Ok(warp::reply::json(&photos))
}

pub async fn get_photo(id: String, repository: PhotoRepository) -> Result<impl Reply, Rejection> {
    let photo = repository.get_by_id(&id).await?;
    Ok(warp::reply::json(&photo))
}

pub async fn delete_photo(
    id: String,
    repository: PhotoRepository,
) -> Result<impl Reply, Rejection> {
    let photo = repository.delete_by_id(&id).await?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "deletedId": photo.id
    })))
}

pub fn build_photo_routes(
    ingest: Arc<PhotoIngest>,
    repository: PhotoRepository,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_upload = warp::path("api")
        .and(warp::path("upload"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_ingest(ingest))
        .and_then(upload_photo);

    let api_photos_list = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_repository(repository.clone()))
        .and_then(list_photos);

    let api_photo_get = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_repository(repository.clone()))
        .and_then(get_photo);

    let api_photo_delete = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_repository(repository))
        .and_then(delete_photo);

    api_upload
        .or(api_photos_list)
        .or(api_photo_get)
        .or(api_photo_delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::storage::{LocalStore, StoragePlacement};
    use crate::warp_helpers::NotFoundError;

    fn test_repository(dir: &tempfile::TempDir) -> PhotoRepository {
        let database = Database::new(format!("sqlite://{}", dir.path().join("test.db").display()));
        let storage = StoragePlacement::new(LocalStore::new(dir.path().join("uploads")), None);
        PhotoRepository::new(database, Arc::new(storage))
    }

    #[tokio::test]
    async fn test_get_unknown_photo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repository = test_repository(&dir);

        let rejection = get_photo("nope".to_string(), repository).await.err().unwrap();

        let not_found = rejection.find::<NotFoundError>().unwrap();
        assert_eq!(not_found.message, "Photo not found");
    }

    #[tokio::test]
    async fn test_delete_unknown_photo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repository = test_repository(&dir);

        let rejection = delete_photo("nope".to_string(), repository)
            .await
            .err()
            .unwrap();

        assert!(rejection.find::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn test_list_photos_on_empty_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let repository = test_repository(&dir);

        let response = list_photos(repository).await.ok().unwrap().into_response();

        assert_eq!(response.status(), 200);
    }
}

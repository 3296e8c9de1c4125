use std::path::Path;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::mimetype_detector;
use crate::storage::{StorageError, StoragePlacement};
use crate::warp_helpers::{with_storage, DatabaseError, NotFoundError};

/// Serves a blob written by the local fallback.
pub async fn get_upload(
    filename: String,
    storage: Arc<StoragePlacement>,
) -> Result<impl Reply, Rejection> {
    let bytes = match storage.local().read(&filename).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) | Err(StorageError::InvalidKey(_)) => {
            return Err(reject::custom(NotFoundError::image()))
        }
        Err(e) => {
            log::error!("Failed to read upload {}: {}", filename, e);
            return Err(reject::custom(DatabaseError {
                message: "Failed to read image".to_string(),
            }));
        }
    };

    let content_type = mimetype_detector::from_path(Path::new(&filename))
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let reply = warp::reply::with_header(bytes, "content-type", content_type);
    Ok(warp::reply::with_header(
        reply,
        "cache-control",
        "public, max-age=31536000",
    ))
}

pub fn build_upload_routes(
    storage: Arc<StoragePlacement>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("uploads")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_storage(storage))
        .and_then(get_upload)
}

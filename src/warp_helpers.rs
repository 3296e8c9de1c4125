use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use warp::{reject, Filter, Rejection, Reply};

use crate::db::{Database, PhotoRepository, RepositoryError};
use crate::ingest::{IngestError, PhotoIngest};
use crate::storage::StoragePlacement;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}

impl reject::Reject for DatabaseError {}

#[derive(Debug)]
pub struct NotFoundError {
    pub message: &'static str,
}

impl NotFoundError {
    pub fn photo() -> Self {
        Self {
            message: "Photo not found",
        }
    }

    pub fn image() -> Self {
        Self {
            message: "Image not found",
        }
    }
}

impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct StorageFailure {
    pub message: String,
}

impl reject::Reject for StorageFailure {}

impl From<RepositoryError> for Rejection {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => reject::custom(NotFoundError::photo()),
            RepositoryError::Storage(e) => reject::custom(StorageFailure {
                message: format!("Failed to delete photo file: {}", e),
            }),
            other => reject::custom(DatabaseError {
                message: other.to_string(),
            }),
        }
    }
}

impl From<IngestError> for Rejection {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingFile => reject::custom(ValidationError {
                message: err.to_string(),
            }),
            IngestError::Persistence(e) => reject::custom(DatabaseError {
                message: e.to_string(),
            }),
        }
    }
}

pub fn with_database(
    database: Database,
) -> impl Filter<Extract = (Database,), Error = Infallible> + Clone {
    warp::any().map(move || database.clone())
}

pub fn with_repository(
    repository: PhotoRepository,
) -> impl Filter<Extract = (PhotoRepository,), Error = Infallible> + Clone {
    warp::any().map(move || repository.clone())
}

pub fn with_ingest(
    ingest: Arc<PhotoIngest>,
) -> impl Filter<Extract = (Arc<PhotoIngest>,), Error = Infallible> + Clone {
    warp::any().map(move || ingest.clone())
}

pub fn with_storage(
    storage: Arc<StoragePlacement>,
) -> impl Filter<Extract = (Arc<StoragePlacement>,), Error = Infallible> + Clone {
    warp::any().map(move || storage.clone())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = database_error.message.clone();
    } else if let Some(storage_failure) = err.find::<StorageFailure>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = storage_failure.message.clone();
    } else if let Some(not_found) = err.find::<NotFoundError>() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = not_found.message.to_string();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        code = warp::http::StatusCode::LENGTH_REQUIRED;
        message = "Content-Length required".to_string();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if let Some(missing) = err.find::<warp::reject::MissingHeader>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = missing.to_string();
    } else if let Some(invalid) = err.find::<warp::reject::InvalidHeader>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = invalid.to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        success: false,
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
}

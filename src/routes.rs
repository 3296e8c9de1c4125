use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

use crate::db::{Database, PhotoRepository};
use crate::handlers_health::build_health_routes;
use crate::handlers_photo::build_photo_routes;
use crate::handlers_static::build_static_routes;
use crate::handlers_uploads::build_upload_routes;
use crate::ingest::PhotoIngest;
use crate::storage::StoragePlacement;
use crate::warp_helpers::{cors, handle_rejection};

/// Shared state handed to every route group.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub storage: Arc<StoragePlacement>,
    pub ingest: Arc<PhotoIngest>,
    pub repository: PhotoRepository,
    pub max_upload_bytes: u64,
}

/// The complete server filter, including CORS, request logging and the JSON error envelope.
pub fn build_routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let health_routes = build_health_routes(state.database);
    let photo_routes = build_photo_routes(state.ingest, state.repository, state.max_upload_bytes);
    let upload_routes = build_upload_routes(state.storage);
    let static_routes = build_static_routes();

    health_routes
        .or(photo_routes)
        .or(upload_routes)
        .or(static_routes)
        .with(cors())
        .with(warp::log("snaplens"))
        .recover(handle_rejection)
}

pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod db_types;
pub mod handlers_health;
pub mod handlers_photo;
pub mod handlers_static;
pub mod handlers_uploads;
pub mod ingest;
pub mod mimetype_detector;
pub mod object_detector;
pub mod routes;
pub mod s3_store;
pub mod storage;
pub mod vision_client;
pub mod warp_helpers;

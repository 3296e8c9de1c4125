use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

use snaplens::db::{Database, PhotoRepository};
use snaplens::ingest::PhotoIngest;
use snaplens::object_detector::ObjectDetector;
use snaplens::routes::{build_routes, AppState};
use snaplens::storage::{LocalStore, StoragePlacement};

const BOUNDARY: &str = "snaplens-boundary";

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    bytes: &'a [u8],
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn photo_part(bytes: &[u8]) -> Part<'_> {
    Part {
        name: "photo",
        filename: Some("mug.jpg"),
        content_type: Some("image/jpeg"),
        bytes,
    }
}

fn note_part() -> Part<'static> {
    Part {
        name: "note",
        filename: None,
        content_type: None,
        bytes: b"kitchen shelf",
    }
}

fn test_state(dir: &TempDir, max_upload_bytes: u64) -> AppState {
    let database = Database::new(format!("sqlite://{}", dir.path().join("photos.db").display()));
    let storage = Arc::new(StoragePlacement::new(
        LocalStore::new(dir.path().join("uploads")),
        None,
    ));
    let repository = PhotoRepository::new(database.clone(), storage.clone());
    let ingest = Arc::new(PhotoIngest::new(
        storage.clone(),
        Arc::new(ObjectDetector::new(None)),
        repository.clone(),
    ));

    AppState {
        database,
        storage,
        ingest,
        repository,
        max_upload_bytes,
    }
}

fn upload_request(body: Vec<u8>) -> warp::test::RequestBuilder {
    warp::test::request()
        .method("POST")
        .path("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
}

fn json_body(response: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn test_upload_is_served_from_local_storage() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024 * 1024));
    let image: Vec<u8> = (0..10 * 1024).map(|i| (i % 251) as u8).collect();

    let response = upload_request(multipart_body(&[note_part(), photo_part(&image)]))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body = json_body(&response);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["isLocalStorage"], true);
    assert_eq!(data["originalName"], "mug.jpg");
    assert_eq!(data["size"], image.len());
    let file_url = data["fileUrl"].as_str().unwrap().to_string();
    let id = data["id"].as_str().unwrap().to_string();

    let blob = warp::test::request().path(&file_url).reply(&routes).await;
    assert_eq!(blob.status(), 200);
    assert_eq!(blob.headers()["content-type"], "image/jpeg");
    assert_eq!(blob.body().as_ref(), image.as_slice());

    let record = warp::test::request()
        .path(&format!("/api/photos/{}", id))
        .reply(&routes)
        .await;
    assert_eq!(record.status(), 200);
    assert_eq!(json_body(&record)["fileUrl"], file_url.as_str());

    let listing = warp::test::request().path("/api/photos").reply(&routes).await;
    assert_eq!(json_body(&listing).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_form_without_photo_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024 * 1024));

    let response = upload_request(multipart_body(&[note_part()]))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 400);
    let body = json_body(&response);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024));
    let image = vec![7u8; 2048];

    let response = upload_request(multipart_body(&[photo_part(&image)]))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 413);
    assert_eq!(json_body(&response)["success"], false);
}

#[tokio::test]
async fn test_upload_without_content_length() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024 * 1024));

    let response = warp::test::request()
        .method("POST")
        .path("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 411);
    assert_eq!(json_body(&response)["success"], false);
}

#[tokio::test]
async fn test_delete_photo_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024 * 1024));

    let missing = warp::test::request()
        .method("DELETE")
        .path("/api/photos/nope")
        .reply(&routes)
        .await;
    assert_eq!(missing.status(), 404);
    assert_eq!(json_body(&missing)["error"], "Photo not found");

    let uploaded = upload_request(multipart_body(&[photo_part(b"jpeg-bytes")]))
        .reply(&routes)
        .await;
    let data = json_body(&uploaded)["data"].clone();
    let id = data["id"].as_str().unwrap();
    let file_url = data["fileUrl"].as_str().unwrap();

    let deleted = warp::test::request()
        .method("DELETE")
        .path(&format!("/api/photos/{}", id))
        .reply(&routes)
        .await;
    assert_eq!(deleted.status(), 200);
    let body = json_body(&deleted);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedId"], id);

    let blob = warp::test::request().path(file_url).reply(&routes).await;
    assert_eq!(blob.status(), 404);
    let listing = warp::test::request().path("/api/photos").reply(&routes).await;
    assert!(json_body(&listing).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_and_gallery_page() {
    let dir = tempfile::tempdir().unwrap();
    let routes = build_routes(test_state(&dir, 1024));

    let health = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(json_body(&health)["status"], "healthy");

    let ready = warp::test::request().path("/ready").reply(&routes).await;
    assert_eq!(json_body(&ready)["database"], "connected");

    let page = warp::test::request().path("/").reply(&routes).await;
    assert_eq!(page.status(), 200);
    assert_eq!(page.headers()["content-type"], "text/html");
}

use log::{error, info, warn};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;

use snaplens::config::Config;
use snaplens::db::{Database, PhotoRepository};
use snaplens::ingest::PhotoIngest;
use snaplens::object_detector::ObjectDetector;
use snaplens::routes::{build_routes, AppState};
use snaplens::s3_store::S3ObjectStore;
use snaplens::storage::{LocalStore, ObjectStore, StoragePlacement};
use snaplens::vision_client::{OpenAiVisionClient, VisionModel};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    info!("Starting SnapLens");
    info!("Database: {}", config.database_url);
    info!("Upload directory: {}", config.upload_dir);

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|e| format!("Invalid host '{}': {}", config.host, e))?;

    // Check for a free port BEFORE initializing services
    let port = match find_available_port(host, config.port, config.port_attempts) {
        Some(port) => port,
        None => {
            error!(
                "No free port in {}..{}. Stop other instances or set SNAPLENS_PORT.",
                config.port,
                config.port.saturating_add(config.port_attempts)
            );
            return Err(format!("Port {} is already in use", config.port).into());
        }
    };
    if port != config.port {
        warn!("Port {} is in use, using {} instead", config.port, port);
    }

    let (database, storage, ingest, repository) = initialize_services(&config);
    start_background_tasks(database.clone());

    let routes = build_routes(AppState {
        database: database.clone(),
        storage,
        ingest,
        repository,
        max_upload_bytes: config.max_upload_bytes(),
    });

    info!(
        "Server started successfully, listening on http://localhost:{}",
        port
    );

    tokio::select! {
        _ = warp::serve(routes).run(SocketAddr::new(host, port)) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    database.close().await;
    info!("SnapLens stopped");

    Ok(())
}

fn is_port_available(host: IpAddr, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// First free port in `start..start + attempts`.
fn find_available_port(host: IpAddr, start: u16, attempts: u16) -> Option<u16> {
    (0..attempts.max(1))
        .map_while(|offset| start.checked_add(offset))
        .find(|port| is_port_available(host, *port))
}

type InitServicesResult = (
    Database,
    Arc<StoragePlacement>,
    Arc<PhotoIngest>,
    PhotoRepository,
);

fn initialize_services(config: &Config) -> InitServicesResult {
    if let Err(e) = std::fs::create_dir_all(&config.upload_dir) {
        warn!(
            "Could not create upload directory {}: {}",
            config.upload_dir, e
        );
    }

    let remote: Option<Arc<dyn ObjectStore>> = match &config.s3 {
        Some(s3) => {
            info!("Remote storage enabled: bucket {} ({})", s3.bucket, s3.region);
            Some(Arc::new(S3ObjectStore::new(s3)))
        }
        None => {
            info!("Remote storage not configured, photos are stored locally");
            None
        }
    };
    let storage = Arc::new(StoragePlacement::new(
        LocalStore::new(&config.upload_dir),
        remote,
    ));

    let model: Option<Arc<dyn VisionModel>> = match OpenAiVisionClient::new(&config.vision) {
        Some(client) => {
            info!("Object detection enabled with model {}", config.vision.model);
            Some(Arc::new(client))
        }
        None => {
            warn!("OPENAI_API_KEY is not set, object detection returns placeholders");
            None
        }
    };
    let detector = Arc::new(ObjectDetector::new(model));

    let database = Database::new(config.database_url.clone());
    let repository = PhotoRepository::new(database.clone(), storage.clone());
    let ingest = Arc::new(PhotoIngest::new(
        storage.clone(),
        detector,
        repository.clone(),
    ));

    (database, storage, ingest, repository)
}

fn start_background_tasks(database: Database) {
    // Warm up the connection; requests retry on their own if this fails.
    tokio::spawn(async move {
        match database.pool().await {
            Ok(_) => info!("Database initialized successfully"),
            Err(e) => error!("Database initialization failed: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_find_available_port_skips_taken_port() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let taken = TcpListener::bind((host, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        assert!(!is_port_available(host, port));
        let found = find_available_port(host, port, 20).unwrap();
        assert_ne!(found, port);
        assert!(found > port);
    }

    #[test]
    fn test_find_available_port_gives_up() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let taken = TcpListener::bind((host, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        assert_eq!(find_available_port(host, port, 1), None);
    }
}

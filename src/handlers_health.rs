use serde_json::json;
use std::convert::Infallible;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::Database;
use crate::warp_helpers::{with_database, DatabaseError};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn ready_check(database: Database) -> Result<impl Reply, Rejection> {
    // pool() connects on first use, then a trivial query proves the file is usable
    let result = match database.pool().await {
        Ok(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(warp::reply::json(&json!({
            "status": "ready",
            "database": "connected",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))),
        Err(e) => {
            log::error!("Database connection failed: {}", e);
            Err(reject::custom(DatabaseError {
                message: "Database connection failed".to_string(),
            }))
        }
    }
}

pub fn build_health_routes(
    database: Database,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_database(database))
        .and_then(ready_check);

    health.or(ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_connects_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(format!("sqlite://{}", dir.path().join("ready.db").display()));
        assert!(!database.is_connected());

        assert!(ready_check(database.clone()).await.is_ok());
        assert!(database.is_connected());
    }

    #[tokio::test]
    async fn test_ready_fails_when_database_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let database = Database::new(format!("sqlite://{}", blocker.join("db.sqlite").display()));

        let rejection = ready_check(database).await.err().unwrap();

        assert!(rejection.find::<DatabaseError>().is_some());
    }
}

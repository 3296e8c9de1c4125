use crate::db_pool::DbPool;

// Schema definitions
pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    -- Core identification
    id TEXT PRIMARY KEY NOT NULL,
    filename TEXT NOT NULL UNIQUE,

    -- Placement descriptor
    file_url TEXT NOT NULL,
    is_local_storage BOOLEAN NOT NULL,
    storage_backend TEXT NOT NULL CHECK(storage_backend IN ('local', 'remote')),

    description TEXT NOT NULL,

    -- Metadata (JSON document with detected objects and upload details)
    metadata TEXT NOT NULL DEFAULT '{}',

    created_at DATETIME NOT NULL
);
"#;

pub const SCHEMA_SQL: &[&str] = &[
    PHOTOS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos(created_at);",
];

pub async fn initialize_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for sql in SCHEMA_SQL {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}

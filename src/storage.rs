use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

/// URL prefix under which local blobs are served.
pub const LOCAL_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Remote,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a blob lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub is_local: bool,
    pub key: String,
    pub url: String,
    pub backend: StorageBackend,
}

impl Placement {
    pub fn local(key: &str) -> Self {
        Self {
            is_local: true,
            key: key.to_string(),
            url: format!("{}/{}", LOCAL_URL_PREFIX, key),
            backend: StorageBackend::Local,
        }
    }

    pub fn remote(key: &str, url: String) -> Self {
        Self {
            is_local: false,
            key: key.to_string(),
            url,
            backend: StorageBackend::Remote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    RemoteNotConfigured,
    RemoteFailed(String),
}

/// Which strategy produced the placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementPath {
    Remote,
    LocalFallback(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct PlacementOutcome {
    pub placement: Placement,
    pub path: PlacementPath,
    /// Set when even the local write failed; the descriptor is returned regardless.
    pub local_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Remote storage error: {0}")]
    Remote(String),
    #[error("Blob {0} no longer exists in remote storage")]
    BlobMissing(String),
    #[error("Remote storage is not configured")]
    RemoteNotConfigured,
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Bucket-style blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the bytes under `key` and returns the public URL of the object.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str)
        -> Result<String, StorageError>;

    /// Deletes the object. Fails with `BlobMissing` if it does not exist.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Blob storage in a flat local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolves a plain file name inside the directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_file_name(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    pub async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removing a file that does not exist is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_plain_file_name(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
        && !key.starts_with('.')
}

/// Decides where uploaded bytes live: bucket first when configured, local directory otherwise.
pub struct StoragePlacement {
    local: LocalStore,
    remote: Option<Arc<dyn ObjectStore>>,
}

impl StoragePlacement {
    pub fn new(local: LocalStore, remote: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Never fails: every problem is recorded in the outcome instead.
    pub async fn place(&self, key: &str, bytes: &[u8], content_type: &str) -> PlacementOutcome {
        let reason = match &self.remote {
            Some(remote) => match remote.put(key, bytes, content_type).await {
                Ok(url) => {
                    info!("Stored {} in remote storage", key);
                    // A transient local copy must not outlive a successful remote write.
                    if let Err(e) = self.local.remove(key).await {
                        warn!("Failed to remove local copy of {}: {}", key, e);
                    }
                    return PlacementOutcome {
                        placement: Placement::remote(key, url),
                        path: PlacementPath::Remote,
                        local_error: None,
                    };
                }
                Err(e) => {
                    warn!(
                        "Remote storage failed for {}, falling back to local disk: {}",
                        key, e
                    );
                    FallbackReason::RemoteFailed(e.to_string())
                }
            },
            None => FallbackReason::RemoteNotConfigured,
        };

        let local_error = match self.local.write(key, bytes).await {
            Ok(path) => {
                info!("Stored {} locally at {}", key, path.display());
                None
            }
            Err(e) => {
                error!("Failed to store {} locally: {}", key, e);
                Some(e.to_string())
            }
        };

        PlacementOutcome {
            placement: Placement::local(key),
            path: PlacementPath::LocalFallback(reason),
            local_error,
        }
    }

    pub async fn remove(&self, placement: &Placement) -> Result<(), StorageError> {
        match placement.backend {
            StorageBackend::Local => self.local.remove(&placement.key).await,
            StorageBackend::Remote => match &self.remote {
                Some(remote) => remote.delete(&placement.key).await,
                None => Err(StorageError::RemoteNotConfigured),
            },
        }
    }
}

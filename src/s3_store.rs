use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::S3Config;
use crate::storage::{ObjectStore, StorageError};

/// S3 (or S3-compatible) bucket implementing [`ObjectStore`].
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "snaplens-env",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: public_base_url(config),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

fn public_base_url(config: &S3Config) -> String {
    match &config.endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
        None => format!(
            "https://{}.s3.{}.amazonaws.com",
            config.bucket, config.region
        ),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Remote(DisplayErrorContext(&e).to_string()))?;

        Ok(self.object_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // DeleteObject succeeds for absent keys, so check existence first.
        if let Err(e) = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            let service_error = e.into_service_error();
            if service_error.is_not_found() {
                return Err(StorageError::BlobMissing(key.to_string()));
            }
            return Err(StorageError::Remote(
                DisplayErrorContext(&service_error).to_string(),
            ));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Remote(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

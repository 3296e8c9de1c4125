use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Bucket settings. Only present when bucket and both credentials are set.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub port_attempts: u16,
    pub database_url: String,
    pub upload_dir: String,
    pub max_upload_mb: u64,
    pub vision: VisionConfig,
    pub s3: Option<S3Config>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let s3 = match (
            var("SNAPLENS_S3_BUCKET"),
            var("AWS_ACCESS_KEY_ID"),
            var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(bucket), Some(access_key_id), Some(secret_access_key)) => Some(S3Config {
                bucket,
                region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id,
                secret_access_key,
                endpoint: var("SNAPLENS_S3_ENDPOINT"),
            }),
            _ => None,
        };

        Ok(Config {
            port: parse_var(&var, "SNAPLENS_PORT", 3000)?,
            host: var("SNAPLENS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port_attempts: parse_var(&var, "SNAPLENS_PORT_ATTEMPTS", 20)?,
            database_url: var("SNAPLENS_DATABASE_URL")
                .unwrap_or_else(|| "sqlite://./data/snaplens.db".to_string()),
            upload_dir: var("SNAPLENS_UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            max_upload_mb: parse_var(&var, "SNAPLENS_MAX_UPLOAD_MB", 20)?,
            vision: VisionConfig {
                api_key: var("OPENAI_API_KEY"),
                model: var("SNAPLENS_VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
                endpoint: var("SNAPLENS_VISION_ENDPOINT").unwrap_or_else(|| {
                    "https://api.openai.com/v1/chat/completions".to_string()
                }),
                timeout_secs: parse_var(&var, "SNAPLENS_VISION_TIMEOUT_SECS", 60)?,
            },
            s3,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

fn parse_var<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

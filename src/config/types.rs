use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload body in bytes (default: 1 GiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Scratch directory for uploads being processed (default: system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Directory served under /assets, holds thumbnails
    #[serde(default = "default_assets_root")]
    pub assets_root: PathBuf,

    /// Prefix for stored video URLs, usually a CDN distribution
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8091
}

fn default_max_upload_bytes() -> u64 {
    1 << 30
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_public_base_url() -> String {
    "http://localhost:8091/media".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            temp_dir: None,
            assets_root: default_assets_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl ServerConfig {
    /// Directory for per-request scratch files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens (overridden by TUBELY_JWT_SECRET)
    #[serde(default)]
    pub jwt_secret: String,

    /// Lifetime of issued access tokens (default: 1 hour)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,
}

fn default_token_ttl() -> u64 {
    1
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tubely.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Object storage backend for processed videos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Fs {
        #[serde(default = "default_fs_root")]
        root: String,
    },
    S3 {
        bucket: String,
        #[serde(default = "default_s3_root")]
        root: String,
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint for S3-compatible services
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
    },
}

fn default_fs_root() -> String {
    "./media".to_string()
}

fn default_s3_root() -> String {
    "/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Fs {
            root: default_fs_root(),
        }
    }
}

mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variable that replaces `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "TUBELY_JWT_SECRET";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_overrides(&mut config, std::env::var(JWT_SECRET_ENV).ok());
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./tubely.toml",
        "~/.config/tubely/config.toml",
        "/etc/tubely/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_overrides(&mut config, std::env::var(JWT_SECRET_ENV).ok());
    validate_config(&config)?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, jwt_secret: Option<String>) {
    if let Some(secret) = jwt_secret.filter(|s| !s.is_empty()) {
        config.auth.jwt_secret = secret;
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be greater than 0");
    }

    if config.auth.jwt_secret.trim().is_empty() {
        anyhow::bail!(
            "auth.jwt_secret is empty; set it in the config file or via {}",
            JWT_SECRET_ENV
        );
    }

    if let StorageConfig::S3 { bucket, .. } = &config.storage {
        if bucket.is_empty() {
            anyhow::bail!("S3 storage requires a bucket name");
        }
    }

    if let Some(dir) = &config.server.temp_dir {
        if !dir.exists() {
            tracing::warn!("Temp dir does not exist: {:?}", dir);
        }
    }

    Ok(())
}

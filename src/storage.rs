//! Object storage for processed videos.

use crate::config::StorageConfig;
use anyhow::{Context, Result};
use futures::StreamExt;
use opendal::{services, Operator};
use std::path::Path;
use tokio_util::io::ReaderStream;

/// Read size for streaming a file into storage.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Create a storage operator from configuration.
pub fn create_operator(config: &StorageConfig) -> Result<Operator> {
    match config {
        StorageConfig::Fs { root } => {
            tracing::info!("Configuring filesystem storage with root: {}", root);
            let builder = services::Fs::default().root(root);
            Ok(Operator::new(builder)?.finish())
        }
        StorageConfig::S3 {
            bucket,
            root,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            tracing::info!(
                "Configuring S3 storage with bucket: {}, region: {:?}",
                bucket,
                region
            );

            let mut builder = services::S3::default()
                .bucket(bucket)
                .root(root.trim_start_matches('/'));

            if let Some(region) = region {
                builder = builder.region(region);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
                tracing::debug!("S3 endpoint set to: {}", endpoint);
            }
            if let Some(access_key_id) = access_key_id {
                builder = builder.access_key_id(access_key_id);
            }
            if let Some(secret_access_key) = secret_access_key {
                builder = builder.secret_access_key(secret_access_key);
            }

            Ok(Operator::new(builder)?.finish())
        }
    }
}

/// Stream a local file to `key`, chunk by chunk.
///
/// Returns the number of bytes written.
pub async fn upload_file(
    op: &Operator,
    key: &str,
    path: &Path,
    content_type: &str,
) -> Result<u64> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {:?} for upload", path))?;

    let mut writer = op
        .writer_with(key)
        .content_type(content_type)
        .await
        .with_context(|| format!("Failed to open storage writer for {}", key))?;

    let mut chunks = ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE);
    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read {:?}", path))?;
        written += chunk.len() as u64;
        writer.write(chunk).await?;
    }
    writer
        .close()
        .await
        .with_context(|| format!("Failed to finish upload of {}", key))?;

    tracing::debug!("Uploaded {} bytes to {}", written, key);
    Ok(written)
}

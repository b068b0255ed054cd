//! Video metadata and upload endpoints.

use super::auth::AuthUser;
use super::error::AppError;
use super::{load_owned_video, media_type, parse_video_id, AppContext};
use crate::storage::upload_file;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use tokio::io::AsyncWriteExt;
use tubely_common::Error;
use tubely_db::models::Video;
use tubely_db::pool::get_conn;
use tubely_db::queries::videos;
use tubely_media::prepare_for_streaming;

const VIDEO_FIELD: &str = "video";
const VIDEO_MEDIA_TYPE: &str = "video/mp4";

pub async fn get_video(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    load_owned_video(&ctx, video_id, user_id).map(Json)
}

/// Accept an MP4, make it fast start and publish it to object storage.
pub async fn upload_video(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let mut video = load_owned_video(&ctx, video_id, user_id)?;

    // Removed with everything in it when the handler returns.
    let scratch = tempfile::Builder::new()
        .prefix("tubely-upload-")
        .tempdir_in(ctx.config.server.temp_dir())?;
    let upload_path = scratch.path().join("upload.mp4");
    let processed_path = scratch.path().join("processed.mp4");

    let mut received = None;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        match media_type(field.content_type()) {
            Some(mt) if mt == VIDEO_MEDIA_TYPE => {}
            other => {
                return Err(Error::invalid_input(format!(
                    "Unsupported media type {}, expected {}",
                    other.as_deref().unwrap_or("(none)"),
                    VIDEO_MEDIA_TYPE
                ))
                .into())
            }
        }

        let mut file = tokio::fs::File::create(&upload_path).await?;
        let mut len = 0u64;
        while let Some(chunk) = field.chunk().await? {
            len += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        received = Some(len);
        break;
    }

    let Some(len) = received else {
        return Err(Error::invalid_input(format!("Missing multipart field '{}'", VIDEO_FIELD)).into());
    };
    tracing::info!("Received {} bytes for video {} from user {}", len, video_id, user_id);

    let prepared = tokio::task::spawn_blocking(move || {
        prepare_for_streaming(&upload_path, &processed_path)
    })
    .await
    .map_err(|e| Error::internal(format!("Video processing task failed: {}", e)))??;

    let key = format!("{}/{}.mp4", prepared.aspect_ratio, random_key());
    upload_file(&ctx.storage, &key, &prepared.path, VIDEO_MEDIA_TYPE).await?;

    video.video_url = Some(format!(
        "{}/{}",
        ctx.config.server.public_base_url.trim_end_matches('/'),
        key
    ));
    let conn = get_conn(&ctx.db)?;
    let updated = videos::update_video(&conn, &video)?;

    tracing::info!(
        "Published video {} as {} ({}x{}, rewritten: {})",
        video_id,
        key,
        prepared.geometry.width_px(),
        prepared.geometry.height_px(),
        prepared.rewritten
    );

    Ok(Json(updated))
}

/// 32 random bytes, base64url without padding.
fn random_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

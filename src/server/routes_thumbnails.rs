//! Thumbnail upload.

use super::auth::AuthUser;
use super::error::AppError;
use super::{load_owned_video, media_type, parse_video_id, AppContext};
use axum::extract::{Multipart, Path, State};
use axum::Json;
use tubely_common::Error;
use tubely_db::models::Video;
use tubely_db::pool::get_conn;
use tubely_db::queries::videos;

const THUMBNAIL_FIELD: &str = "thumbnail";

/// File extension for an accepted thumbnail media type.
fn thumbnail_extension(media_type: &str) -> Option<&'static str> {
    match media_type {
        "image/jpeg" => Some("jpeg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Store a thumbnail under the assets root and point the video at it.
pub async fn upload_thumbnail(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let mut video = load_owned_video(&ctx, video_id, user_id)?;

    let mut stored = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }

        let mt = media_type(field.content_type());
        let Some(ext) = mt.as_deref().and_then(thumbnail_extension) else {
            return Err(Error::invalid_input(format!(
                "Unsupported thumbnail type {}, expected image/jpeg or image/png",
                mt.as_deref().unwrap_or("(none)")
            ))
            .into());
        };

        let data = field.bytes().await?;
        let file_name = format!("{}.{}", video_id, ext);
        let assets_root = &ctx.config.server.assets_root;
        tokio::fs::create_dir_all(assets_root).await?;
        tokio::fs::write(assets_root.join(&file_name), &data).await?;

        tracing::debug!("Stored {} byte thumbnail as {}", data.len(), file_name);
        stored = Some(file_name);
        break;
    }

    let Some(file_name) = stored else {
        return Err(
            Error::invalid_input(format!("Missing multipart field '{}'", THUMBNAIL_FIELD)).into(),
        );
    };

    video.thumbnail_url = Some(format!(
        "http://localhost:{}/assets/{}",
        ctx.config.server.port, file_name
    ));
    let conn = get_conn(&ctx.db)?;
    let updated = videos::update_video(&conn, &video)?;

    Ok(Json(updated))
}

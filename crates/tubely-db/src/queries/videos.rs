//! Video metadata queries.

use chrono::Utc;
use rusqlite::{Connection, Row};
use tubely_common::{Error, Result, UserId, VideoId};

use super::{time_column, uuid_column};
use crate::models::Video;

const VIDEO_COLUMNS: &str = "id, user_id, title, description, thumbnail_url, video_url, \
                             created_at, updated_at";

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: VideoId::from(uuid_column(row, 0)?),
        user_id: UserId::from(uuid_column(row, 1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        thumbnail_url: row.get(4)?,
        video_url: row.get(5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
    })
}

/// Create a video draft for `user_id`, with no media attached yet.
pub fn create_video(
    conn: &Connection,
    user_id: UserId,
    title: &str,
    description: &str,
) -> Result<Video> {
    let id = VideoId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO videos (id, user_id, title, description, created_at, updated_at)
         VALUES (:id, :user_id, :title, :description, :created_at, :updated_at)",
        rusqlite::named_params! {
            ":id": id.to_string(),
            ":user_id": user_id.to_string(),
            ":title": title,
            ":description": description,
            ":created_at": now.to_rfc3339(),
            ":updated_at": now.to_rfc3339(),
        },
    )
    .map_err(|e| {
        if e.to_string().contains("FOREIGN KEY constraint failed") {
            Error::not_found(format!("user {}", user_id))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Video {
        id,
        user_id,
        title: title.to_string(),
        description: description.to_string(),
        thumbnail_url: None,
        video_url: None,
        created_at: now,
        updated_at: now,
    })
}

/// Get a video by ID, `None` if there is no such video.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM videos WHERE id = :id", VIDEO_COLUMNS),
        rusqlite::named_params! { ":id": id.to_string() },
        row_to_video,
    );

    match result {
        Ok(video) => Ok(Some(video)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Persist the mutable fields of `video` and return the stored row.
///
/// `updated_at` is refreshed; ownership and creation time never change.
pub fn update_video(conn: &Connection, video: &Video) -> Result<Video> {
    let now = Utc::now();

    let changed = conn
        .execute(
            "UPDATE videos
             SET title = :title, description = :description,
                 thumbnail_url = :thumbnail_url, video_url = :video_url,
                 updated_at = :updated_at
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": video.id.to_string(),
                ":title": video.title,
                ":description": video.description,
                ":thumbnail_url": video.thumbnail_url,
                ":video_url": video.video_url,
                ":updated_at": now.to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 0 {
        return Err(Error::not_found(format!("video {}", video.id)));
    }

    Ok(Video {
        updated_at: now,
        ..video.clone()
    })
}

/// All videos of a user, newest first.
pub fn list_videos_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Video>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM videos WHERE user_id = :user_id ORDER BY created_at DESC",
            VIDEO_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let videos = stmt
        .query_map(
            rusqlite::named_params! { ":user_id": user_id.to_string() },
            row_to_video,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(videos)
}

//! Shared test harness for HTTP-level tests.
//!
//! [`TestApp`] wires the router to an in-memory database, filesystem object
//! storage and scratch/asset directories that live as long as the harness.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use bytes::{BufMut, BytesMut};
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;

use tubely::config::{Config, StorageConfig};
use tubely::server::{auth, build_router, AppContext};
use tubely::storage::create_operator;
use tubely_common::UserId;
use tubely_db::models::Video;
use tubely_db::pool::{get_conn, init_memory_pool, DbPool};
use tubely_db::queries::{users, videos};

pub const JWT_SECRET: &str = "integration-secret";
pub const PUBLIC_BASE_URL: &str = "https://cdn.example.test";
pub const BOUNDARY: &str = "tubely-test-boundary";

pub struct TestApp {
    pub ctx: AppContext,
    pub db: DbPool,
    pub storage_root: TempDir,
    pub assets_root: TempDir,
    pub scratch: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness whose config is adjusted by `modify` after the test defaults
    /// are applied.
    pub fn with_config(modify: impl FnOnce(&mut Config)) -> Self {
        let storage_root = tempfile::tempdir().expect("storage dir");
        let assets_root = tempfile::tempdir().expect("assets dir");
        let scratch = tempfile::tempdir().expect("scratch dir");

        let mut config = Config::default();
        config.auth.jwt_secret = JWT_SECRET.to_string();
        config.server.temp_dir = Some(scratch.path().to_path_buf());
        config.server.assets_root = assets_root.path().to_path_buf();
        config.server.public_base_url = PUBLIC_BASE_URL.to_string();
        config.storage = StorageConfig::Fs {
            root: storage_root.path().to_string_lossy().into_owned(),
        };
        modify(&mut config);

        let storage = create_operator(&config.storage).expect("fs operator");
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(config, db.clone(), storage);

        Self {
            ctx,
            db,
            storage_root,
            assets_root,
            scratch,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.ctx.clone())
    }

    /// Create a user owning one video draft.
    pub fn user_with_video(&self, email: &str) -> (UserId, Video) {
        let conn = get_conn(&self.db).expect("failed to get db connection");
        let user = users::create_user(&conn, email).unwrap();
        let video = videos::create_video(&conn, user.id, "Boots", "A pair of boots").unwrap();
        (user.id, video)
    }

    pub fn token(&self, user_id: UserId) -> String {
        auth::make_jwt(user_id, JWT_SECRET, chrono::Duration::hours(1)).unwrap()
    }

    pub fn video(&self, video: &Video) -> Video {
        let conn = get_conn(&self.db).unwrap();
        videos::get_video(&conn, video.id).unwrap().unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    /// Storage path of an object referenced by a public video URL.
    pub fn stored_object(&self, video_url: &str) -> PathBuf {
        let key = video_url
            .strip_prefix(PUBLIC_BASE_URL)
            .and_then(|k| k.strip_prefix('/'))
            .expect("video url under public base");
        self.storage_root.path().join(key)
    }
}

/// Multipart body with a single file part.
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn dir_len(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

fn wrap(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32((8 + payload.len()) as u32);
    buf.put_slice(box_type);
    buf.put_slice(payload);
    buf.to_vec()
}

/// A progressive-unfriendly MP4: `ftyp mdat moov`, one track with a single
/// chunk 16 bytes into the media data.
pub fn mp4_moov_last(handler: &[u8; 4], width: u16, height: u16) -> Vec<u8> {
    let ftyp = wrap(b"ftyp", b"isom\0\0\x02\0isommp41");
    let mdat = wrap(b"mdat", &[0x5a; 512]);
    let chunk = (ftyp.len() + 8 + 16) as u32;

    let mut tkhd = BytesMut::new();
    tkhd.put_u32(0);
    tkhd.put_bytes(0, 72);
    tkhd.put_u32((width as u32) << 16);
    tkhd.put_u32((height as u32) << 16);

    let mut hdlr = BytesMut::new();
    hdlr.put_u32(0);
    hdlr.put_u32(0);
    hdlr.put_slice(handler);
    hdlr.put_bytes(0, 13);

    let mut stco = BytesMut::new();
    stco.put_u32(0);
    stco.put_u32(1);
    stco.put_u32(chunk);

    let stbl = wrap(b"stbl", &wrap(b"stco", &stco));
    let minf = wrap(b"minf", &stbl);
    let mut mdia = wrap(b"hdlr", &hdlr);
    mdia.extend_from_slice(&minf);
    let mut trak = wrap(b"tkhd", &tkhd);
    trak.extend_from_slice(&wrap(b"mdia", &mdia));
    let moov = wrap(b"moov", &wrap(b"trak", &trak));

    [ftyp, mdat, moov].concat()
}

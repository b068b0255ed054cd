use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use opendal::Operator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tubely_common::{Error, UserId, VideoId};
use tubely_db::models::Video;
use tubely_db::pool::{get_conn, DbPool};
use tubely_db::queries::videos;

use self::error::AppError;

pub mod auth;
pub mod error;
pub mod routes_thumbnails;
pub mod routes_videos;

/// Largest accepted thumbnail body.
pub const MAX_THUMBNAIL_BYTES: usize = 10 << 20;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub db: DbPool,
    /// Destination for processed videos
    pub storage: Operator,
}

impl AppContext {
    pub fn new(config: Config, db: DbPool, storage: Operator) -> Self {
        Self {
            config: Arc::new(config),
            db,
            storage,
        }
    }
}

/// Create the Axum router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let upload_limit = usize::try_from(ctx.config.server.max_upload_bytes).unwrap_or(usize::MAX);
    let assets = ServeDir::new(&ctx.config.server.assets_root);

    let api = Router::new()
        .route("/videos/:video_id", get(routes_videos::get_video))
        .route(
            "/video_upload/:video_id",
            post(routes_videos::upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/thumbnail_upload/:video_id",
            post(routes_thumbnails::upload_thumbnail)
                .layer(DefaultBodyLimit::max(MAX_THUMBNAIL_BYTES)),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest_service("/assets", assets)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Start the HTTP server and run until a shutdown signal arrives
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    tokio::fs::create_dir_all(&ctx.config.server.assets_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create assets dir {:?}",
                ctx.config.server.assets_root
            )
        })?;

    let app = build_router(ctx);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}

/// Parse a `:video_id` path segment.
pub(crate) fn parse_video_id(raw: &str) -> std::result::Result<VideoId, AppError> {
    raw.parse()
        .map_err(|_| Error::invalid_input(format!("Invalid video ID: {}", raw)).into())
}

/// Fetch a video that `user_id` owns.
pub(crate) fn load_owned_video(
    ctx: &AppContext,
    video_id: VideoId,
    user_id: UserId,
) -> std::result::Result<Video, AppError> {
    let conn = get_conn(&ctx.db)?;
    let video = videos::get_video(&conn, video_id)?
        .ok_or_else(|| Error::not_found(format!("video {}", video_id)))?;

    if video.user_id != user_id {
        return Err(Error::forbidden("You don't own this video").into());
    }
    Ok(video)
}

/// Essence of a part's `Content-Type`, lowercased and without parameters.
pub(crate) fn media_type(content_type: Option<&str>) -> Option<String> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    (!essence.is_empty() && essence.contains('/')).then_some(essence)
}

//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; the service error, the media
//! engine error and multipart read failures convert into it with `?`.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Service(tubely_common::Error),
    Media(tubely_media::Error),
    /// The request body could not be read as multipart, including bodies
    /// over the route's size limit.
    Multipart(MultipartError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use tubely_common::Error as E;
        match self {
            Self::Service(E::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Service(E::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            Self::Service(E::Forbidden(_)) => StatusCode::FORBIDDEN,
            Self::Service(E::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Service(E::Database(_) | E::Io(_) | E::Internal(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Media(e) if e.is_content_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Multipart(e) => e.status(),
        }
    }

    fn code(&self) -> &'static str {
        use tubely_common::Error as E;
        match self {
            Self::Service(E::NotFound(_)) => "not_found",
            Self::Service(E::Unauthorized(_)) => "unauthorized",
            Self::Service(E::Forbidden(_)) => "forbidden",
            Self::Service(E::InvalidInput(_)) => "invalid_input",
            Self::Service(E::Database(_)) => "database_error",
            Self::Service(E::Io(_)) => "io_error",
            Self::Service(E::Internal(_)) => "internal_error",
            Self::Media(e) if e.is_content_error() => "unprocessable_media",
            Self::Media(tubely_media::Error::Io(_)) => "io_error",
            Self::Media(_) => "internal_error",
            Self::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            Self::Multipart(_) => "invalid_input",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(e) => std::fmt::Display::fmt(e, f),
            Self::Media(e) => std::fmt::Display::fmt(e, f),
            Self::Multipart(e) => write!(f, "Couldn't read multipart body: {}", e.body_text()),
        }
    }
}

impl From<tubely_common::Error> for AppError {
    fn from(e: tubely_common::Error) -> Self {
        Self::Service(e)
    }
}

impl From<tubely_media::Error> for AppError {
    fn from(e: tubely_media::Error) -> Self {
        Self::Media(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Service(tubely_common::Error::Io(e))
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Service(tubely_common::Error::internal(format!("{:#}", e)))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Server error in API handler");
        } else if status == StatusCode::UNPROCESSABLE_ENTITY {
            tracing::warn!(error = %self, "Rejected media upload");
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

//! Error types for tubely-media.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::mp4::BoxType;

/// Result type for tubely-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tubely-media operations.
///
/// Every parsing failure records the box type and absolute file offset where
/// it was detected so callers can log precisely where a file went wrong.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A box header or size is inconsistent with the surrounding data.
    #[error("malformed container: {box_type} box at offset {offset}: {reason}")]
    MalformedContainer {
        box_type: BoxType,
        offset: u64,
        reason: String,
    },

    /// Fewer bytes remain than a box header needs.
    #[error("unexpected end of file at offset {offset}: need {need} bytes, have {have}")]
    UnexpectedEof { offset: u64, need: u64, have: u64 },

    /// No track in the movie box has a video handler.
    #[error("no video track found in moov")]
    NoVideoTrack,

    /// The track header is missing or shorter than its fixed layout.
    #[error("malformed tkhd at offset {offset}: need {need} bytes, have {have}")]
    MalformedTrackHeader { offset: u64, need: usize, have: usize },

    /// Width or height is zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A sample table carries neither `stco` nor `co64`.
    ///
    /// Soft error: the locator logs it and skips the track.
    #[error("track {track_index} sample table at offset {offset} has no chunk offset table")]
    MissingOffsetTable { track_index: usize, offset: u64 },

    /// The file layout cannot be relocated without corrupting offsets.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// Offset arithmetic left the representable range.
    #[error("offset overflow in {box_type} at offset {offset}: {value} + {delta}")]
    OffsetOverflow {
        box_type: BoxType,
        offset: u64,
        value: u64,
        delta: u64,
    },

    /// The rewritten file did not re-scan as fast start.
    #[error("rewritten file {} failed fast-start verification", path.display())]
    RewriteVerificationFailed { path: PathBuf },
}

impl Error {
    /// Create a malformed container error.
    pub fn malformed(box_type: BoxType, offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedContainer {
            box_type,
            offset,
            reason: reason.into(),
        }
    }

    /// Create an unsupported layout error.
    pub fn unsupported_layout(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayout(msg.into())
    }

    /// Whether the error describes the file's contents rather than the
    /// environment or the rewriter itself. Content errors fail identically
    /// on retry.
    pub fn is_content_error(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::RewriteVerificationFailed { .. })
    }
}

//! Tubely-Media: MP4 inspection and fast-start rewriting
//!
//! This crate prepares uploaded MP4 files for progressive playback. A file
//! whose movie metadata (`moov`) trails its media data (`mdat`) cannot start
//! playing until it has been downloaded completely; rewriting it moves `moov`
//! to the front and corrects the absolute chunk offsets stored inside it.
//!
//! # Modules
//!
//! - `mp4` - box scanning, offset tables, rewriting, order verification and
//!   track geometry
//! - `probe` - layout summary of a file
//! - `prepare` - the rewrite, verify and classify sequence used on upload
//!
//! # Architecture
//!
//! Boxes are read by recursive descent over their length-prefixed headers.
//! Only `moov` is loaded into memory; `mdat` and other boxes are streamed
//! from input to output. Output is written to a temporary file, re-scanned,
//! and renamed into place only after it verifies, so the input is never
//! modified and a failed rewrite leaves nothing behind.
//!
//! All operations block on disk I/O. Async callers should run them on a
//! blocking worker.

pub mod error;
pub mod mp4;
pub mod prepare;
pub mod probe;

pub use error::{Error, Result};
pub use mp4::{
    classify, extract_geometry, locate_offset_tables, rewrite, rewrite_to, scan_file,
    verify_fast_start, AspectRatio, FastStart, TrackGeometry,
};
pub use prepare::{prepare_for_streaming, PreparedVideo};
pub use probe::{probe, BoxSummary, Mp4Summary};

//! MP4 container inspection and fast-start rewriting.
//!
//! Only the boxes needed to relocate `moov` and read the video track size are
//! understood: the top-level layout, the container path down to each sample
//! table, `stco`/`co64`, `tkhd` and `hdlr`. Everything else is copied as
//! opaque bytes.

mod atoms;
mod faststart;
mod geometry;
mod moov;
mod offsets;
mod scanner;
mod verify;

pub use atoms::{BoxKind, BoxType, HandlerType, Mp4Box};
pub use faststart::{
    default_output_path, patch_moov, plan, rewrite, rewrite_to, FastStart, RewritePlan,
    DEFAULT_OUTPUT_SUFFIX,
};
pub use geometry::{classify, extract_geometry, reduced_ratio, AspectRatio, TrackGeometry};
pub use moov::Moov;
pub use offsets::{locate_offset_tables, ChunkOffsetTable, OffsetTableKind};
pub use scanner::{scan_file, BoxScanner, TopLevelBoxes};
pub use verify::{is_fast_start, verify_fast_start, verify_reader};

//! Fast-start order verification.

use super::{BoxScanner, BoxType, Mp4Box};
use crate::Result;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Whether `moov` appears before any `mdat` in a top-level box sequence.
///
/// `false` when there is no `moov` at all.
pub fn is_fast_start(boxes: &[Mp4Box]) -> bool {
    for b in boxes {
        match b.box_type {
            BoxType::MOOV => return true,
            BoxType::MDAT => return false,
            _ => {}
        }
    }
    false
}

/// Check the top-level order of a seekable source.
pub fn verify_reader<R: Read + Seek>(reader: R) -> Result<bool> {
    let mut scanner = BoxScanner::new(reader)?;
    for b in scanner.top_level() {
        match b?.box_type {
            BoxType::MOOV => return Ok(true),
            BoxType::MDAT => return Ok(false),
            _ => {}
        }
    }
    Ok(false)
}

/// Check that the file at `path` is laid out for progressive playback.
///
/// A missing `moov` yields `Ok(false)`; structural damage in the headers
/// scanned before the answer is known is an error.
pub fn verify_fast_start<P: AsRef<Path>>(path: P) -> Result<bool> {
    let file = File::open(path.as_ref())?;
    verify_reader(BufReader::new(file))
}

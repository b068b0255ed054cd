//! File inspection summary.

use crate::mp4::{
    extract_geometry, is_fast_start, AspectRatio, BoxScanner, BoxType, Moov, TrackGeometry,
};
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One top-level box in a probe summary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct BoxSummary {
    pub box_type: BoxType,
    pub offset: u64,
    pub size: u64,
}

/// Layout and geometry of an MP4 file.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Mp4Summary {
    pub file_size: u64,
    /// Top-level boxes in file order.
    pub boxes: Vec<BoxSummary>,
    pub fast_start: bool,
    pub geometry: Option<TrackGeometry>,
    pub aspect_ratio: Option<AspectRatio>,
}

/// Scan a file and describe its layout.
///
/// A file without a usable video track still probes successfully with no
/// geometry; structural damage is an error.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<Mp4Summary> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut scanner = BoxScanner::new(&mut reader)?;
    let file_size = scanner.len();
    let tree = scanner.scan()?;

    let boxes = tree
        .iter()
        .map(|b| BoxSummary {
            box_type: b.box_type,
            offset: b.start_offset,
            size: b.size,
        })
        .collect();

    let geometry = match tree.iter().find(|b| b.box_type == BoxType::MOOV) {
        Some(moov_box) => {
            let moov = Moov::load(&mut reader, moov_box)?;
            match extract_geometry(&moov) {
                Ok(geometry) => Some(geometry),
                Err(e) if matches!(e, Error::NoVideoTrack | Error::MalformedTrackHeader { .. }) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("No geometry for {}: {}", path.as_ref().display(), e);
                    None
                }
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    Ok(Mp4Summary {
        file_size,
        boxes,
        fast_start: is_fast_start(&tree),
        geometry,
        aspect_ratio: geometry.and_then(|g| g.aspect_ratio().ok()),
    })
}

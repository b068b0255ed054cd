//! Upload preparation: rewrite, verify and classify in one blocking call.

use crate::mp4::{
    extract_geometry, rewrite_to, scan_file, verify_fast_start, AspectRatio, BoxType, Moov,
    TrackGeometry,
};
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// A video ready to be streamed progressively.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct PreparedVideo {
    /// Fast-start file: the input when no rewrite was needed, else the output.
    pub path: PathBuf,
    /// Whether a new file was written.
    pub rewritten: bool,
    pub geometry: TrackGeometry,
    pub aspect_ratio: AspectRatio,
}

/// Make `input` fast start and read its video geometry.
///
/// `output` is only created when `moov` has to move, and is removed again if
/// the rewritten file cannot be classified. Geometry is read from the file
/// that will be served, after its order has been verified.
pub fn prepare_for_streaming<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<PreparedVideo> {
    let outcome = rewrite_to(input.as_ref(), output.as_ref())?;
    let rewritten = outcome.is_rewritten();
    let path = outcome.into_path();

    match inspect(&path) {
        Ok((geometry, aspect_ratio)) => {
            #[cfg(feature = "tracing")]
            tracing::info!(
                "Prepared {} ({}x{}, {}, rewritten: {})",
                path.display(),
                geometry.width_px(),
                geometry.height_px(),
                aspect_ratio,
                rewritten
            );

            Ok(PreparedVideo {
                path,
                rewritten,
                geometry,
                aspect_ratio,
            })
        }
        Err(e) => {
            if rewritten {
                discard(&path);
            }
            Err(e)
        }
    }
}

/// Remove a rewritten file that will not be served.
fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to remove {}: {}", path.display(), _e);
        }
    }
}

/// Verify order and read geometry of a fast-start candidate.
fn inspect(path: &Path) -> Result<(TrackGeometry, AspectRatio)> {
    if !verify_fast_start(path)? {
        return Err(Error::RewriteVerificationFailed {
            path: path.to_path_buf(),
        });
    }

    let boxes = scan_file(path)?;
    let moov_box = boxes
        .iter()
        .find(|b| b.box_type == BoxType::MOOV)
        .ok_or_else(|| Error::malformed(BoxType::MOOV, 0, "no top-level moov box"))?;
    let moov = Moov::load(&mut BufReader::new(File::open(path)?), moov_box)?;

    let geometry = extract_geometry(&moov)?;
    let aspect_ratio = geometry.aspect_ratio()?;
    Ok((geometry, aspect_ratio))
}

//! Track geometry and aspect-ratio classification.

use super::{BoxType, HandlerType, Moov, Mp4Box};
use crate::{Error, Result};

/// tkhd version 0: width/height follow 32-bit times, reserved, layer/volume and matrix.
const TKHD_V0_WIDTH_OFFSET: usize = 76;
/// tkhd version 1: 64-bit times push width/height 12 bytes further.
const TKHD_V1_WIDTH_OFFSET: usize = 88;

/// Display dimensions recorded in a video track header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TrackGeometry {
    /// Width as 16.16 fixed point.
    pub width: u32,
    /// Height as 16.16 fixed point.
    pub height: u32,
}

impl TrackGeometry {
    /// Build from whole-pixel dimensions.
    pub fn from_pixels(width: u16, height: u16) -> Self {
        Self {
            width: (width as u32) << 16,
            height: (height as u32) << 16,
        }
    }

    /// Integer part of the width.
    pub fn width_px(&self) -> u32 {
        self.width >> 16
    }

    /// Integer part of the height.
    pub fn height_px(&self) -> u32 {
        self.height >> 16
    }

    /// Classify the integer dimensions.
    pub fn aspect_ratio(&self) -> Result<AspectRatio> {
        classify(self.width_px(), self.height_px())
    }
}

/// Orientation bucket used as an object-storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Greatest common divisor (iterative Euclid).
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Reduce `width:height` to lowest terms.
pub fn reduced_ratio(width: u32, height: u32) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let g = gcd(width, height);
    Ok((width / g, height / g))
}

/// Bucket integer dimensions into landscape, portrait or square.
pub fn classify(width: u32, height: u32) -> Result<AspectRatio> {
    let (wr, hr) = reduced_ratio(width, height)?;
    Ok(match wr.cmp(&hr) {
        std::cmp::Ordering::Greater => AspectRatio::Landscape,
        std::cmp::Ordering::Less => AspectRatio::Portrait,
        std::cmp::Ordering::Equal => AspectRatio::Square,
    })
}

/// Read the handler type of a track from `mdia/hdlr`.
fn handler_type(moov: &Moov, trak: &Mp4Box) -> Option<HandlerType> {
    let hdlr = trak.descend(&[BoxType::MDIA, BoxType::HDLR])?;
    let data = moov.payload(hdlr);
    // version/flags (4), pre_defined (4), handler_type (4)
    let handler: [u8; 4] = data.get(8..12)?.try_into().ok()?;
    Some(HandlerType::from_bytes(handler))
}

/// Read width/height from a `tkhd` box.
fn parse_tkhd(moov: &Moov, tkhd: &Mp4Box) -> Result<TrackGeometry> {
    let data = moov.payload(tkhd);

    let version = data.first().copied().ok_or(Error::MalformedTrackHeader {
        offset: tkhd.start_offset,
        need: 1,
        have: 0,
    })?;

    let pos = if version == 1 {
        TKHD_V1_WIDTH_OFFSET
    } else {
        TKHD_V0_WIDTH_OFFSET
    };

    if data.len() < pos + 8 {
        return Err(Error::MalformedTrackHeader {
            offset: tkhd.start_offset,
            need: pos + 8,
            have: data.len(),
        });
    }

    // Width and height at fixed point 16.16
    let width = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
    let height = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);

    Ok(TrackGeometry { width, height })
}

/// Find the first video track and read its display dimensions.
pub fn extract_geometry(moov: &Moov) -> Result<TrackGeometry> {
    let trak = moov
        .tracks()
        .find(|trak| handler_type(moov, trak).is_some_and(|h| h.is_video()))
        .ok_or(Error::NoVideoTrack)?;

    let tkhd = trak.child(BoxType::TKHD).ok_or(Error::MalformedTrackHeader {
        offset: trak.start_offset,
        need: TKHD_V0_WIDTH_OFFSET + 8,
        have: 0,
    })?;

    parse_tkhd(moov, tkhd)
}

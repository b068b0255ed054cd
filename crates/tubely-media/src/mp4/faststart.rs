//! Fast-start rewriting: move `moov` ahead of `mdat`.
//!
//! The movie box is the only part of the file held in memory. Media bytes
//! are streamed from the input to a temporary file next to the destination,
//! which is re-scanned and only then renamed into place. The input is never
//! written to.

use super::offsets::{encode_entries, locate_offset_tables, OffsetTableKind};
use super::verify::verify_fast_start;
use super::{BoxScanner, BoxType, Moov, Mp4Box};
use crate::{Error, Result};
use bytes::BufMut;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Suffix appended to the input path when no output path is given.
pub const DEFAULT_OUTPUT_SUFFIX: &str = ".faststart.mp4";

/// Outcome of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastStart {
    /// The input already had `moov` before `mdat`; nothing was written.
    AlreadyFastStart(PathBuf),
    /// A relocated copy was written and verified.
    Rewritten(PathBuf),
}

impl FastStart {
    /// Path of the fast-start file.
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyFastStart(path) | Self::Rewritten(path) => path,
        }
    }

    /// Consume into the path of the fast-start file.
    pub fn into_path(self) -> PathBuf {
        match self {
            Self::AlreadyFastStart(path) | Self::Rewritten(path) => path,
        }
    }

    /// Whether a new file was produced.
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten(_))
    }
}

/// Where `moov` goes and how far the media moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    pub moov_box: Mp4Box,
    pub mdat_box: Mp4Box,
    /// Offset the relocated `moov` starts at (the old `mdat` start).
    pub moov_new_position: u64,
    /// Bytes everything in `[mdat.start, moov.start)` moves forward.
    pub delta: u64,
    /// Input length; the rewritten file has the same length.
    pub file_len: u64,
}

impl RewritePlan {
    /// Where `mdat` starts once `moov` sits in front of it.
    pub fn new_mdat_start(&self) -> u64 {
        self.mdat_box.start_offset + self.delta
    }

    /// Map an old chunk offset to its position in the rewritten file.
    pub fn adjust(&self, entry: u64) -> Result<u64> {
        let mdat_start = self.mdat_box.start_offset;
        let moov_start = self.moov_box.start_offset;

        if entry < mdat_start {
            return Ok(entry);
        }
        if entry >= moov_start {
            return Err(Error::unsupported_layout(format!(
                "chunk offset {} points at or past the moov box at {}",
                entry, moov_start
            )));
        }

        let adjusted = entry.checked_add(self.delta).ok_or(Error::OffsetOverflow {
            box_type: BoxType::MOOV,
            offset: moov_start,
            value: entry,
            delta: self.delta,
        })?;

        if adjusted < self.new_mdat_start() || adjusted >= self.file_len {
            return Err(Error::unsupported_layout(format!(
                "chunk offset {} maps to {} outside the relocated media [{}, {})",
                entry,
                adjusted,
                self.new_mdat_start(),
                self.file_len
            )));
        }

        Ok(adjusted)
    }
}

/// Find the single top-level box of a type, rejecting duplicates.
fn single<'a>(boxes: &'a [Mp4Box], box_type: BoxType, file_len: u64) -> Result<&'a Mp4Box> {
    let mut found = boxes.iter().filter(|b| b.box_type == box_type);
    let first = found.next().ok_or_else(|| {
        Error::malformed(box_type, file_len, format!("no top-level {} box", box_type))
    })?;
    if let Some(second) = found.next() {
        return Err(Error::unsupported_layout(format!(
            "multiple {} boxes at offsets {} and {}",
            box_type, first.start_offset, second.start_offset
        )));
    }
    Ok(first)
}

/// Decide whether and how to relocate `moov`.
///
/// Returns `None` when the file is already fast start.
pub fn plan(boxes: &[Mp4Box], file_len: u64) -> Result<Option<RewritePlan>> {
    if let Some(moof) = boxes.iter().find(|b| b.box_type == BoxType::MOOF) {
        return Err(Error::unsupported_layout(format!(
            "fragmented file (moof at offset {})",
            moof.start_offset
        )));
    }

    let moov = single(boxes, BoxType::MOOV, file_len)?;
    let mdat = single(boxes, BoxType::MDAT, file_len)?;

    if moov.start_offset < mdat.start_offset {
        return Ok(None);
    }

    Ok(Some(RewritePlan {
        moov_box: moov.clone(),
        mdat_box: mdat.clone(),
        moov_new_position: mdat.start_offset,
        delta: moov.size,
        file_len,
    }))
}

/// Rewrite every chunk offset entry of `moov` in place.
///
/// The buffer length never changes: `stco` entries that outgrow 32 bits are
/// an error rather than an upgrade to `co64`. A header declaring size `0`
/// is given its resolved size, since it no longer ends the file once moved.
pub fn patch_moov(moov: &mut Moov, plan: &RewritePlan) -> Result<usize> {
    resolve_open_ended_size(moov)?;

    let tables = locate_offset_tables(moov)?;
    let base = moov.start_offset();
    let mut patched = 0;

    for table in &tables {
        let mut adjusted = Vec::with_capacity(table.entries.len());
        for &entry in &table.entries {
            let new = plan.adjust(entry)?;
            if table.kind == OffsetTableKind::Stco && new > u32::MAX as u64 {
                return Err(Error::OffsetOverflow {
                    box_type: BoxType::STCO,
                    offset: table.location,
                    value: entry,
                    delta: plan.delta,
                });
            }
            if new != entry {
                patched += 1;
            }
            adjusted.push(new);
        }

        let start = (table.entries_offset() - base) as usize;
        let encoded = encode_entries(table.kind, &adjusted);
        let mut dst = &mut moov.bytes_mut()[start..start + encoded.len()];
        dst.put_slice(&encoded);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Patched {} chunk offsets across {} tables (delta {})",
        patched,
        tables.len(),
        plan.delta
    );

    Ok(patched)
}

/// Replace a `moov` size field of `0` ("to end of file") with the box's
/// actual length.
fn resolve_open_ended_size(moov: &mut Moov) -> Result<()> {
    if moov.as_bytes().get(..4) != Some(&[0u8; 4][..]) {
        return Ok(());
    }

    let size = moov.size();
    let size = u32::try_from(size).map_err(|_| {
        Error::unsupported_layout(format!(
            "open-ended moov of {} bytes needs a 64-bit size header",
            size
        ))
    })?;

    let mut dst = &mut moov.bytes_mut()[..4];
    dst.put_u32(size);

    #[cfg(feature = "tracing")]
    tracing::debug!("Resolved open-ended moov size to {}", size);

    Ok(())
}

/// Top-level box types in file order.
fn top_level_types<R: Read + Seek>(reader: R) -> Result<Vec<BoxType>> {
    let mut scanner = BoxScanner::new(reader)?;
    let types = scanner
        .top_level()
        .map(|b| b.map(|b| b.box_type))
        .collect::<Result<Vec<_>>>()?;
    Ok(types)
}

/// Whether the written file has the input's top-level boxes with `moov`
/// moved ahead of `mdat`.
fn check_output(output: &Path, input_types: &[BoxType], file_len: u64) -> Result<bool> {
    let file = File::open(output)?;
    if file.metadata()?.len() != file_len {
        return Ok(false);
    }

    let output_types = top_level_types(BufReader::new(file))?;
    let mut expected = input_types.to_vec();
    let mut actual = output_types.clone();
    expected.sort_by_key(|t| t.0);
    actual.sort_by_key(|t| t.0);
    if expected != actual {
        return Ok(false);
    }

    let moov = output_types.iter().position(|t| *t == BoxType::MOOV);
    let mdat = output_types.iter().position(|t| *t == BoxType::MDAT);
    match (moov, mdat) {
        (Some(moov), Some(mdat)) if moov < mdat => verify_fast_start(output),
        _ => Ok(false),
    }
}

/// Copy `[start, end)` of the input to the writer.
fn copy_range<R: Read + Seek, W: Write>(
    reader: &mut R,
    writer: &mut W,
    start: u64,
    end: u64,
) -> Result<()> {
    let len = end - start;
    reader.seek(SeekFrom::Start(start))?;
    let copied = io::copy(&mut reader.by_ref().take(len), writer)?;
    if copied != len {
        return Err(Error::UnexpectedEof {
            offset: start + copied,
            need: len,
            have: copied,
        });
    }
    Ok(())
}

/// Default output path for `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(DEFAULT_OUTPUT_SUFFIX);
    PathBuf::from(name)
}

/// Rewrite `input` to `<input>.faststart.mp4`.
pub fn rewrite<P: AsRef<Path>>(input: P) -> Result<FastStart> {
    let input = input.as_ref();
    rewrite_to(input, default_output_path(input))
}

/// Rewrite `input` so that `moov` precedes `mdat`, writing to `output`.
///
/// An input that is already fast start is returned unchanged and `output`
/// is not created.
pub fn rewrite_to<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<FastStart> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mut reader = BufReader::new(File::open(input)?);
    let mut scanner = BoxScanner::new(&mut reader)?;
    let file_len = scanner.len();
    let boxes = scanner.scan()?;

    let Some(plan) = plan(&boxes, file_len)? else {
        #[cfg(feature = "tracing")]
        tracing::debug!("{} is already fast start", input.display());
        return Ok(FastStart::AlreadyFastStart(input.to_path_buf()));
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Relocating moov ({} bytes at {}) ahead of mdat at {}",
        plan.moov_box.size,
        plan.moov_box.start_offset,
        plan.moov_new_position
    );

    let mut moov = Moov::load(&mut reader, &plan.moov_box)?;
    patch_moov(&mut moov, &plan)?;

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let mdat_start = plan.mdat_box.start_offset;
        let moov_start = plan.moov_box.start_offset;

        copy_range(&mut reader, &mut writer, 0, mdat_start)?;
        writer.write_all(moov.as_bytes())?;
        copy_range(&mut reader, &mut writer, mdat_start, moov_start)?;
        copy_range(&mut reader, &mut writer, plan.moov_box.end_offset(), file_len)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let input_types: Vec<BoxType> = boxes.iter().map(|b| b.box_type).collect();
    if !check_output(tmp.path(), &input_types, file_len)? {
        // Dropping `tmp` removes the partial output
        return Err(Error::RewriteVerificationFailed {
            path: output.to_path_buf(),
        });
    }

    tmp.persist(output).map_err(|e| Error::Io(e.error))?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Wrote fast-start copy of {} to {}",
        input.display(),
        output.display()
    );

    Ok(FastStart::Rewritten(output.to_path_buf()))
}

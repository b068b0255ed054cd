//! Chunk offset tables (`stco` / `co64`).

use super::{BoxType, Moov, Mp4Box};
use crate::{Error, Result};

/// Path from a `trak` down to its sample table.
const STBL_PATH: [BoxType; 3] = [BoxType::MDIA, BoxType::MINF, BoxType::STBL];

/// Width of the table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum OffsetTableKind {
    /// 32-bit entries.
    Stco,
    /// 64-bit entries.
    Co64,
}

impl OffsetTableKind {
    /// Bytes per entry.
    pub fn entry_size(&self) -> usize {
        match self {
            Self::Stco => 4,
            Self::Co64 => 8,
        }
    }

    /// Box type carrying this table.
    pub fn box_type(&self) -> BoxType {
        match self {
            Self::Stco => BoxType::STCO,
            Self::Co64 => BoxType::CO64,
        }
    }
}

/// A decoded chunk offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOffsetTable {
    pub kind: OffsetTableKind,
    /// Absolute file offset of the entry-count field; entries follow it.
    pub location: u64,
    /// Absolute file offsets of each chunk, in table order.
    pub entries: Vec<u64>,
    /// Index of the owning track among the `trak` boxes of the movie.
    pub track_index: usize,
}

impl ChunkOffsetTable {
    /// Absolute file offset of the first entry.
    pub fn entries_offset(&self) -> u64 {
        self.location + 4
    }

    /// Encoded length of the entry array.
    pub fn byte_len(&self) -> usize {
        self.entries.len() * self.kind.entry_size()
    }
}

/// Decode one `stco`/`co64` box.
fn decode_table(
    moov: &Moov,
    table: &Mp4Box,
    kind: OffsetTableKind,
    track_index: usize,
) -> Result<ChunkOffsetTable> {
    let data = moov.payload(table);
    if data.len() < 8 {
        return Err(Error::malformed(
            table.box_type,
            table.start_offset,
            format!("payload of {} bytes is too short for a table header", data.len()),
        ));
    }

    // version/flags (4), entry_count (4), entries
    let count = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let width = kind.entry_size();
    let body = &data[8..];

    if body.len() / width < count {
        return Err(Error::malformed(
            table.box_type,
            table.start_offset,
            format!(
                "entry count {} needs {} bytes, box holds {}",
                count,
                count as u64 * width as u64,
                body.len()
            ),
        ));
    }

    let entries = body
        .chunks_exact(width)
        .take(count)
        .map(|chunk| match kind {
            OffsetTableKind::Stco => {
                u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as u64
            }
            OffsetTableKind::Co64 => u64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]),
        })
        .collect();

    Ok(ChunkOffsetTable {
        kind,
        location: table.payload_offset + 4,
        entries,
        track_index,
    })
}

/// Find the chunk offset table of every track.
///
/// A track whose sample table has neither `stco` nor `co64` is skipped with a
/// warning. A table whose entry count runs past its box is an error.
pub fn locate_offset_tables(moov: &Moov) -> Result<Vec<ChunkOffsetTable>> {
    let mut tables = Vec::new();

    for (track_index, trak) in moov.tracks().enumerate() {
        let Some(stbl) = trak.descend(&STBL_PATH) else {
            let _err = Error::MissingOffsetTable {
                track_index,
                offset: trak.start_offset,
            };
            #[cfg(feature = "tracing")]
            tracing::warn!("skipping track: {}", _err);
            continue;
        };

        let found = [OffsetTableKind::Stco, OffsetTableKind::Co64]
            .into_iter()
            .find_map(|kind| stbl.child(kind.box_type()).map(|b| (kind, b)));

        match found {
            Some((kind, table)) => tables.push(decode_table(moov, table, kind, track_index)?),
            None => {
                let _err = Error::MissingOffsetTable {
                    track_index,
                    offset: stbl.start_offset,
                };
                #[cfg(feature = "tracing")]
                tracing::warn!("skipping track: {}", _err);
            }
        }
    }

    Ok(tables)
}

/// Encode entries back into their on-disk form.
pub(crate) fn encode_entries(kind: OffsetTableKind, entries: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * kind.entry_size());
    for &entry in entries {
        match kind {
            // Callers check the 32-bit range before encoding
            OffsetTableKind::Stco => out.extend_from_slice(&(entry as u32).to_be_bytes()),
            OffsetTableKind::Co64 => out.extend_from_slice(&entry.to_be_bytes()),
        }
    }
    out
}

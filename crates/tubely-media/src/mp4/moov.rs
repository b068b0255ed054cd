//! In-memory movie box.

use super::{BoxScanner, BoxType, Mp4Box};
use crate::{Error, Result};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Maximum moov size loaded into memory (256 MB) to prevent OOM on malformed files.
const MAX_MOOV_SIZE: u64 = 256 * 1024 * 1024;

/// A `moov` box loaded fully into memory together with its parsed tree.
///
/// Offsets in the tree stay absolute file offsets; [`Moov::payload`] maps
/// them back into the buffer.
#[derive(Debug, Clone)]
pub struct Moov {
    tree: Mp4Box,
    data: Vec<u8>,
}

impl Moov {
    /// Read the bytes of a scanned `moov` box out of its file.
    pub fn load<R: Read + Seek>(reader: &mut R, tree: &Mp4Box) -> Result<Self> {
        if tree.box_type != BoxType::MOOV {
            return Err(Error::malformed(
                tree.box_type,
                tree.start_offset,
                "expected a moov box",
            ));
        }
        if tree.size > MAX_MOOV_SIZE {
            return Err(Error::malformed(
                tree.box_type,
                tree.start_offset,
                format!("size {} exceeds maximum {}", tree.size, MAX_MOOV_SIZE),
            ));
        }

        reader.seek(SeekFrom::Start(tree.start_offset))?;
        let mut data = vec![0u8; tree.size as usize];
        reader.read_exact(&mut data)?;

        Ok(Self {
            tree: tree.clone(),
            data,
        })
    }

    /// Parse a serialized `moov` box that sat at `start_offset` in its file.
    pub fn from_bytes(data: Vec<u8>, start_offset: u64) -> Result<Self> {
        let boxes = BoxScanner::with_base_offset(Cursor::new(data.as_slice()), start_offset)?.scan()?;

        let tree = match boxes.as_slice() {
            [moov] if moov.box_type == BoxType::MOOV => moov.clone(),
            [other, ..] => {
                return Err(Error::malformed(
                    other.box_type,
                    other.start_offset,
                    "expected exactly one moov box",
                ))
            }
            [] => {
                return Err(Error::UnexpectedEof {
                    offset: start_offset,
                    need: 8,
                    have: 0,
                })
            }
        };

        Ok(Self { tree, data })
    }

    /// Parsed box tree rooted at `moov`.
    pub fn tree(&self) -> &Mp4Box {
        &self.tree
    }

    /// File offset of the `moov` header.
    pub fn start_offset(&self) -> u64 {
        self.tree.start_offset
    }

    /// Serialized size of the box, header included.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Serialized box bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into the serialized box bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Mutable access for in-place patching; callers must not change the length.
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Payload bytes of a box inside this `moov`.
    ///
    /// Returns an empty slice for boxes that do not lie within the buffer.
    pub fn payload(&self, b: &Mp4Box) -> &[u8] {
        let start = b.payload_offset.checked_sub(self.start_offset());
        let end = b.end_offset().checked_sub(self.start_offset());
        match (start, end) {
            (Some(start), Some(end)) => self
                .data
                .get(start as usize..end as usize)
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Track boxes in on-disk order.
    pub fn tracks(&self) -> impl Iterator<Item = &Mp4Box> {
        self.tree.children_of(BoxType::TRAK)
    }
}

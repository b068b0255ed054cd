//! Box scanner: walks length-prefixed box headers without copying payloads.

use super::{BoxKind, BoxType, Mp4Box};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Compact header: 32-bit size + type.
const HEADER_SIZE: u64 = 8;
/// Extended header: compact header + 64-bit size.
const EXTENDED_HEADER_SIZE: u64 = 16;
/// Container nesting limit. Real files nest five levels below `moov`.
const MAX_DEPTH: usize = 16;

/// Scans box headers from a seekable source.
///
/// Offsets reported in [`Mp4Box`] are absolute: the scanner adds its base
/// offset to every position, so a buffer holding a box lifted out of a file
/// can be scanned with the offsets it had in that file.
pub struct BoxScanner<R> {
    reader: R,
    len: u64,
    base_offset: u64,
}

impl<R: Read + Seek> BoxScanner<R> {
    /// Create a scanner over the whole source.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            len,
            base_offset: 0,
        })
    }

    /// Create a scanner whose position 0 corresponds to `base_offset`.
    pub fn with_base_offset(reader: R, base_offset: u64) -> Result<Self> {
        let mut scanner = Self::new(reader)?;
        scanner.base_offset = base_offset;
        Ok(scanner)
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Lazily iterate top-level box headers from the start of the source.
    ///
    /// Containers are not expanded. The iterator stops after the first error.
    pub fn top_level(&mut self) -> TopLevelBoxes<'_, R> {
        TopLevelBoxes {
            scanner: self,
            pos: 0,
            failed: false,
        }
    }

    /// Scan the whole source, expanding known containers into a tree.
    ///
    /// Restartable: each call begins again at offset 0.
    pub fn scan(&mut self) -> Result<Vec<Mp4Box>> {
        self.read_level(0, self.len, None, 0)
    }

    /// Read every box between `start` and `end` (relative positions).
    fn read_level(
        &mut self,
        start: u64,
        end: u64,
        parent: Option<BoxType>,
        depth: usize,
    ) -> Result<Vec<Mp4Box>> {
        let mut boxes = Vec::new();
        let mut pos = start;

        while pos < end {
            let header = self.read_header(pos, end, parent)?;
            pos += header.size;
            boxes.push(self.expand(header, depth)?);
        }

        Ok(boxes)
    }

    /// Descend into a container box, leaving other boxes as leaves.
    fn expand(&mut self, mut b: Mp4Box, depth: usize) -> Result<Mp4Box> {
        if !b.box_type.is_container() {
            return Ok(b);
        }
        if depth >= MAX_DEPTH {
            return Err(Error::malformed(
                b.box_type,
                b.start_offset,
                format!("containers nested deeper than {}", MAX_DEPTH),
            ));
        }

        let start = b.payload_offset - self.base_offset;
        let end = b.end_offset() - self.base_offset;
        let children = self.read_level(start, end, Some(b.box_type), depth + 1)?;
        b.kind = BoxKind::Container(children);
        Ok(b)
    }

    /// Read one box header at relative position `pos`, bounded by `end`.
    fn read_header(&mut self, pos: u64, end: u64, parent: Option<BoxType>) -> Result<Mp4Box> {
        let offset = self.base_offset + pos;
        let remaining = end - pos;
        if remaining < HEADER_SIZE {
            return Err(Error::UnexpectedEof {
                offset,
                need: HEADER_SIZE,
                have: remaining,
            });
        }

        self.reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        self.reader.read_exact(&mut header)?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let box_type = BoxType::from_bytes([header[4], header[5], header[6], header[7]]);

        let (size, header_size) = match size {
            1 => {
                // 64-bit extended size
                if remaining < EXTENDED_HEADER_SIZE {
                    return Err(Error::UnexpectedEof {
                        offset,
                        need: EXTENDED_HEADER_SIZE,
                        have: remaining,
                    });
                }
                let mut ext = [0u8; 8];
                self.reader.read_exact(&mut ext)?;
                (u64::from_be_bytes(ext), EXTENDED_HEADER_SIZE)
            }
            0 => match parent {
                // Box extends to end of file
                None => (remaining, HEADER_SIZE),
                Some(parent) => {
                    return Err(Error::malformed(
                        box_type,
                        offset,
                        format!("size 0 is only valid at top level, found inside {}", parent),
                    ));
                }
            },
            size => (size, HEADER_SIZE),
        };

        if size < header_size {
            return Err(Error::malformed(
                box_type,
                offset,
                format!("declared size {} is smaller than its {}-byte header", size, header_size),
            ));
        }

        if size > remaining {
            let bound = match parent {
                Some(parent) => format!("enclosing {}", parent),
                None => "end of file".to_string(),
            };
            return Err(Error::malformed(
                box_type,
                offset,
                format!(
                    "declared size {} reads past {} ({} bytes available)",
                    size, bound, remaining
                ),
            ));
        }

        Ok(Mp4Box {
            box_type,
            size,
            start_offset: offset,
            payload_offset: offset + header_size,
            kind: BoxKind::Leaf,
        })
    }
}

/// Lazy iterator over top-level box headers.
pub struct TopLevelBoxes<'a, R> {
    scanner: &'a mut BoxScanner<R>,
    pos: u64,
    failed: bool,
}

impl<R: Read + Seek> Iterator for TopLevelBoxes<'_, R> {
    type Item = Result<Mp4Box>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.scanner.len {
            return None;
        }

        match self.scanner.read_header(self.pos, self.scanner.len, None) {
            Ok(header) => {
                self.pos += header.size;
                Some(Ok(header))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a file and scan its full box tree.
pub fn scan_file<P: AsRef<Path>>(path: P) -> Result<Vec<Mp4Box>> {
    let file = File::open(path)?;
    BoxScanner::new(BufReader::new(file))?.scan()
}

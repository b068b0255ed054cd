//! Synthetic MP4 files for engine tests.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tubely_media::mp4::{locate_offset_tables, scan_file, BoxType, ChunkOffsetTable, Moov};

/// Chunk offset table flavour for a synthetic track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Stco,
    Co64,
    /// Sample table without any chunk offset box.
    Missing,
}

/// Where a chunk offset entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// Relative to the first byte of the `mdat` header.
    InMdat(u64),
    /// Fixed absolute offset.
    Absolute(u64),
}

#[derive(Debug, Clone)]
pub struct Track {
    pub handler: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub table: Table,
    pub chunks: Vec<Chunk>,
}

impl Track {
    pub fn video(width: u16, height: u16) -> Self {
        Self {
            handler: *b"vide",
            width,
            height,
            table: Table::Stco,
            chunks: Vec::new(),
        }
    }

    pub fn audio() -> Self {
        Self {
            handler: *b"soun",
            width: 0,
            height: 0,
            table: Table::Stco,
            chunks: Vec::new(),
        }
    }

    pub fn table(mut self, table: Table) -> Self {
        self.table = table;
        self
    }

    pub fn chunks(mut self, chunks: Vec<Chunk>) -> Self {
        self.chunks = chunks;
        self
    }
}

/// Positions of the interesting boxes in a built file.
#[derive(Debug, Clone)]
pub struct Layout {
    pub bytes: Vec<u8>,
    pub mdat_start: u64,
    pub mdat_header: u64,
    pub moov_start: Option<u64>,
    pub moov_size: u64,
}

impl Layout {
    pub fn write_to(&self, path: &Path) -> PathBuf {
        std::fs::write(path, &self.bytes).unwrap();
        path.to_path_buf()
    }
}

/// Builds `ftyp [free] (mdat moov | moov mdat) [free]` files.
#[derive(Debug, Clone)]
pub struct Mp4Builder {
    ftyp_size: usize,
    free_before_mdat: usize,
    trailing_free: usize,
    tracks: Vec<Track>,
    mdat_payload: Vec<u8>,
    extended_mdat: bool,
    moov_first: bool,
    with_moov: bool,
    moov_size: Option<usize>,
}

impl Default for Mp4Builder {
    fn default() -> Self {
        Self {
            ftyp_size: 24,
            free_before_mdat: 0,
            trailing_free: 0,
            tracks: Vec::new(),
            mdat_payload: vec![0u8; 256],
            extended_mdat: false,
            moov_first: false,
            with_moov: true,
            moov_size: None,
        }
    }
}

impl Mp4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ftyp_size(mut self, size: usize) -> Self {
        assert!(size >= 16);
        self.ftyp_size = size;
        self
    }

    pub fn free_before_mdat(mut self, size: usize) -> Self {
        self.free_before_mdat = size;
        self
    }

    pub fn trailing_free(mut self, size: usize) -> Self {
        self.trailing_free = size;
        self
    }

    pub fn track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn mdat_payload(mut self, payload: Vec<u8>) -> Self {
        self.mdat_payload = payload;
        self
    }

    pub fn extended_mdat(mut self) -> Self {
        self.extended_mdat = true;
        self
    }

    pub fn moov_first(mut self) -> Self {
        self.moov_first = true;
        self
    }

    pub fn without_moov(mut self) -> Self {
        self.with_moov = false;
        self
    }

    /// Pad `moov` with a `free` child to exactly `size` bytes.
    pub fn moov_size(mut self, size: usize) -> Self {
        self.moov_size = Some(size);
        self
    }

    pub fn build(&self) -> Layout {
        let ftyp = ftyp(self.ftyp_size);
        let leading_free = free(self.free_before_mdat);
        let prefix = (ftyp.len() + leading_free.len()) as u64;

        let moov_size = if self.with_moov {
            self.moov(0).len() as u64
        } else {
            0
        };
        let mdat_start = if self.moov_first {
            prefix + moov_size
        } else {
            prefix
        };
        let moov = self.moov(mdat_start);
        let mdat = self.mdat();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ftyp);
        bytes.extend_from_slice(&leading_free);
        let moov_start = if !self.with_moov {
            bytes.extend_from_slice(&mdat);
            None
        } else if self.moov_first {
            bytes.extend_from_slice(&moov);
            bytes.extend_from_slice(&mdat);
            Some(prefix)
        } else {
            bytes.extend_from_slice(&mdat);
            bytes.extend_from_slice(&moov);
            Some(prefix + mdat.len() as u64)
        };
        bytes.extend_from_slice(&free(self.trailing_free));

        Layout {
            bytes,
            mdat_start,
            mdat_header: if self.extended_mdat { 16 } else { 8 },
            moov_start,
            moov_size,
        }
    }

    fn mdat(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        if self.extended_mdat {
            buf.put_u32(1);
            buf.put_slice(b"mdat");
            buf.put_u64(16 + self.mdat_payload.len() as u64);
        } else {
            buf.put_u32(8 + self.mdat_payload.len() as u32);
            buf.put_slice(b"mdat");
        }
        buf.put_slice(&self.mdat_payload);
        buf.to_vec()
    }

    fn moov(&self, mdat_start: u64) -> Vec<u8> {
        let mut body: Vec<u8> = self
            .tracks
            .iter()
            .flat_map(|t| trak(t, mdat_start))
            .collect();

        if let Some(target) = self.moov_size {
            let pad = target - 8 - body.len();
            assert!(pad == 0 || pad >= 8, "moov padding of {pad} bytes");
            body.extend_from_slice(&free(pad));
        }
        wrap(b"moov", &body)
    }
}

pub fn wrap(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32((8 + payload.len()) as u32);
    buf.put_slice(box_type);
    buf.put_slice(payload);
    buf.to_vec()
}

fn ftyp(size: usize) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_slice(b"isom");
    payload.put_u32(0x200);
    payload.put_bytes(0, size - 16);
    wrap(b"ftyp", &payload)
}

/// A `free` box of exactly `size` bytes, or nothing for size 0.
fn free(size: usize) -> Vec<u8> {
    if size == 0 {
        return Vec::new();
    }
    wrap(b"free", &vec![0u8; size - 8])
}

fn trak(track: &Track, mdat_start: u64) -> Vec<u8> {
    let mut tkhd = BytesMut::new();
    tkhd.put_u32(0);
    tkhd.put_bytes(0, 72);
    tkhd.put_u32((track.width as u32) << 16);
    tkhd.put_u32((track.height as u32) << 16);

    let mut hdlr = BytesMut::new();
    hdlr.put_u32(0);
    hdlr.put_u32(0);
    hdlr.put_slice(&track.handler);
    hdlr.put_bytes(0, 13);

    let resolve = |c: &Chunk| match *c {
        Chunk::InMdat(rel) => mdat_start + rel,
        Chunk::Absolute(abs) => abs,
    };

    let table = match track.table {
        Table::Stco => {
            let mut buf = BytesMut::new();
            buf.put_u32(0);
            buf.put_u32(track.chunks.len() as u32);
            for c in &track.chunks {
                buf.put_u32(resolve(c) as u32);
            }
            wrap(b"stco", &buf)
        }
        Table::Co64 => {
            let mut buf = BytesMut::new();
            buf.put_u32(0);
            buf.put_u32(track.chunks.len() as u32);
            for c in &track.chunks {
                buf.put_u64(resolve(c));
            }
            wrap(b"co64", &buf)
        }
        Table::Missing => wrap(b"stsd", &[0u8; 8]),
    };

    let stbl = wrap(b"stbl", &table);
    let minf = wrap(b"minf", &stbl);
    let mut mdia = wrap(b"hdlr", &hdlr);
    mdia.extend_from_slice(&minf);
    let mdia = wrap(b"mdia", &mdia);

    let mut body = wrap(b"tkhd", &tkhd);
    body.extend_from_slice(&mdia);
    wrap(b"trak", &body)
}

pub fn sha256(path: &Path) -> Vec<u8> {
    Sha256::digest(std::fs::read(path).unwrap()).to_vec()
}

/// Top-level box types of a file in order.
pub fn top_level_types(path: &Path) -> Vec<BoxType> {
    scan_file(path)
        .unwrap()
        .iter()
        .map(|b| b.box_type)
        .collect()
}

/// Chunk offset tables of the file's `moov`.
pub fn offset_tables(path: &Path) -> Vec<ChunkOffsetTable> {
    let boxes = scan_file(path).unwrap();
    let moov_box = boxes.iter().find(|b| b.box_type == BoxType::MOOV).unwrap();
    let mut reader = BufReader::new(File::open(path).unwrap());
    let moov = Moov::load(&mut reader, moov_box).unwrap();
    locate_offset_tables(&moov).unwrap()
}

/// Number of entries in a directory.
pub fn dir_len(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

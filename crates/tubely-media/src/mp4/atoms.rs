//! MP4 box definitions.

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const FREE: Self = Self(*b"free");
    pub const SKIP: Self = Self(*b"skip");
    pub const MOOF: Self = Self(*b"moof");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Whether boxes of this type hold child boxes the scanner descends into.
    ///
    /// Only the path down to the sample tables is expanded; everything else
    /// stays an opaque leaf.
    pub fn is_container(&self) -> bool {
        matches!(
            *self,
            Self::MOOV | Self::TRAK | Self::MDIA | Self::MINF | Self::STBL
        )
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for BoxType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Whether a box is an expanded container or an opaque leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum BoxKind {
    /// Payload not inspected; only offset and size are known.
    Leaf,
    /// Child boxes in on-disk order.
    Container(Vec<Mp4Box>),
}

/// Parsed box header, positioned absolutely within its file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Mp4Box {
    /// Box type code.
    pub box_type: BoxType,
    /// Box size including header, with size `0` already resolved.
    pub size: u64,
    /// File offset of the first header byte.
    pub start_offset: u64,
    /// File offset where the payload starts (after the header).
    pub payload_offset: u64,
    /// Children for container types.
    pub kind: BoxKind,
}

impl Mp4Box {
    /// Size of the header (8 or 16 bytes).
    pub fn header_size(&self) -> u64 {
        self.payload_offset - self.start_offset
    }

    /// Get the payload size (size - header).
    pub fn payload_size(&self) -> u64 {
        self.size - self.header_size()
    }

    /// Offset one past the last byte of the box.
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.size
    }

    /// Check if this box was expanded into children.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, BoxKind::Container(_))
    }

    /// Child boxes; empty for leaves.
    pub fn children(&self) -> &[Mp4Box] {
        match &self.kind {
            BoxKind::Container(children) => children,
            BoxKind::Leaf => &[],
        }
    }

    /// First direct child of the given type.
    pub fn child(&self, box_type: BoxType) -> Option<&Mp4Box> {
        self.children().iter().find(|c| c.box_type == box_type)
    }

    /// All direct children of the given type, in on-disk order.
    pub fn children_of(&self, box_type: BoxType) -> impl Iterator<Item = &Mp4Box> {
        self.children()
            .iter()
            .filter(move |c| c.box_type == box_type)
    }

    /// Follow a path of child types, taking the first match at each level.
    pub fn descend(&self, path: &[BoxType]) -> Option<&Mp4Box> {
        path.iter()
            .try_fold(self, |current, box_type| current.child(*box_type))
    }
}

/// Handler type for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Hint,
    Meta,
    Text,
    Unknown([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            b"hint" => Self::Hint,
            b"meta" => Self::Meta,
            b"text" => Self::Text,
            _ => Self::Unknown(bytes),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Fixed size of the container header in bytes: the original size as a
/// big-endian u64.
pub const HEADER_SIZE: usize = 8;

/// Size of the big-endian u16 length that prefixes every frame.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 8-byte container header.
///
/// Neither the block size nor the codec is stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerHeader {
    /// Length in bytes of the original, unpadded input.
    pub original_size: u64,
}

impl ContainerHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.original_size.to_be_bytes()
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            original_size: u64::from_be_bytes(*buf),
        }
    }
}

// ── Frames ──────────────────────────────────────────────────────────────────

/// Build the length prefix for a payload of `len` bytes, or `None` if it does
/// not fit in two bytes.
pub fn length_prefix(len: usize) -> Option<[u8; LENGTH_PREFIX_SIZE]> {
    u16::try_from(len).ok().map(u16::to_be_bytes)
}

/// Location of one frame inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Zero-based frame index, equal to the source block index.
    pub index: u64,
    /// Byte offset of the frame's length prefix from the start of the file.
    pub offset: u64,
    /// Payload length in bytes (excluding the prefix).
    pub len: usize,
}

impl FrameInfo {
    /// Bytes the frame occupies on disk, prefix included.
    #[inline]
    pub fn encoded_len(&self) -> u64 {
        (LENGTH_PREFIX_SIZE + self.len) as u64
    }
}

/// Summary of a container's structure, gathered without decompressing.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    pub header: ContainerHeader,
    pub frames: Vec<FrameInfo>,
}

impl ContainerInfo {
    pub fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Total on-disk size: header plus every frame.
    pub fn container_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.frames.iter().map(FrameInfo::encoded_len).sum::<u64>()
    }

    /// Total payload bytes across all frames.
    pub fn payload_len(&self) -> u64 {
        self.frames.iter().map(|f| f.len as u64).sum()
    }

    /// Original size over container size.
    pub fn ratio(&self) -> f64 {
        let container = self.container_len();
        if container == 0 {
            return 1.0;
        }
        self.header.original_size as f64 / container as f64
    }
}

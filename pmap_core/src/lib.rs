//! Presence-map container codec.
//!
//! Input is cut into fixed-size blocks. Each block is rewritten as one
//! `[value][bitmap]` entry per distinct byte it contains, compressed with a
//! [`Codec`], and stored as a length-prefixed frame after an 8-byte
//! original-size header.
//!
//! The container records neither the block size nor the codec. Decoding
//! with a different [`Config`] block size or codec than the encoder used
//! produces errors or garbage.

pub mod block;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod progress;
pub mod reader;
pub mod writer;

pub use block::{decode_block, encode_block};
pub use codec::Codec;
pub use config::{BlockLayout, Config, EntryPolicy, DEFAULT_BLOCK_SIZE};
pub use error::{Error, ErrorKind, Result};
pub use format::{ContainerHeader, ContainerInfo, FrameInfo, HEADER_SIZE};
pub use progress::{NoProgress, Progress};
pub use reader::{inspect, DecodeSummary, Decoder, Frame, FrameReader};
pub use writer::{EncodeSummary, Encoder};

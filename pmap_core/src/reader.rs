use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::block::{decode_block, entry_count};
use crate::codec::Codec;
use crate::config::{Config, EntryPolicy};
use crate::error::{Error, Result};
use crate::format::{ContainerHeader, ContainerInfo, FrameInfo, HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::progress::{NoProgress, Progress};
use crate::writer::{encode_frame, read_full};

/// One frame read from a container.
#[derive(Debug, Clone)]
pub struct Frame {
    pub info: FrameInfo,
    pub payload: Vec<u8>,
}

/// Sequential frame parser over any byte source.
///
/// # Read sequence
/// 1. [`open`](FrameReader::open) reads the 8-byte header.
/// 2. [`next_frame`](FrameReader::next_frame) reads one `[len:u16][payload]`
///    frame per call and returns `None` once the source ends exactly on a
///    frame boundary.
///
/// A source that ends inside a length prefix or a payload is a framing error.
pub struct FrameReader<R> {
    src: R,
    header: ContainerHeader,
    next_index: u64,
    offset: u64,
}

impl<R: Read> FrameReader<R> {
    /// Read and decode the container header.
    pub fn open(mut src: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let got = read_full(&mut src, &mut buf)?;
        if got < HEADER_SIZE {
            return Err(Error::TruncatedHeader { got });
        }
        Ok(Self {
            src,
            header: ContainerHeader::from_bytes(&buf),
            next_index: 0,
            offset: HEADER_SIZE as u64,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Bytes consumed so far, header included.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame, or `None` at a clean end of input.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.next_index;
        let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
        match read_full(&mut self.src, &mut len_buf)? {
            0 => return Ok(None),
            LENGTH_PREFIX_SIZE => {}
            _ => return Err(Error::TruncatedLength { frame }),
        }
        let len = u16::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        let got = read_full(&mut self.src, &mut payload)?;
        if got < len {
            return Err(Error::IncompleteFrame {
                frame,
                expected: len,
                got,
            });
        }

        let info = FrameInfo {
            index: frame,
            offset: self.offset,
            len,
        };
        self.offset += info.encoded_len();
        self.next_index += 1;
        Ok(Some(Frame { info, payload }))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Walk a container's header and frame prefixes without decompressing.
///
/// Fails with the same framing errors the decoder would report.
pub fn inspect<R: Read>(src: R) -> Result<ContainerInfo> {
    let mut frames = FrameReader::open(src)?;
    let mut info = ContainerInfo {
        header: *frames.header(),
        frames: Vec::new(),
    };
    while let Some(frame) = frames.next_frame()? {
        info.frames.push(frame.info);
    }
    Ok(info)
}

/// Totals reported by a finished decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeSummary {
    /// Size recorded in the container header, and bytes written to `dst`.
    pub original_size: u64,
    /// Frames decoded.
    pub frames: u64,
    /// Container bytes consumed, header included.
    pub container_len: u64,
}

/// Presence-map container decoder.
///
/// Must be built with the same block size and codec the encoder used;
/// neither is recorded in the container.
pub struct Decoder {
    codec: Arc<dyn Codec>,
    config: Config,
    pool: Option<rayon::ThreadPool>,
    progress: Arc<dyn Progress>,
}

impl Decoder {
    /// Create a decoder. Starts the worker pool when `config.workers > 1`.
    pub fn new(codec: Arc<dyn Codec>, config: Config) -> Result<Self> {
        let pool = config.thread_pool()?;
        Ok(Self {
            codec,
            config,
            pool,
            progress: Arc::new(NoProgress),
        })
    }

    /// Report container bytes consumed per frame to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode the container in `src`, writing the original bytes to `dst`.
    pub fn decode<R: Read, W: Write>(&self, src: R, dst: W) -> Result<DecodeSummary> {
        self.progress.start(None);
        self.decode_stream(src, dst)
    }

    /// Decode an in-memory container.
    pub fn decode_bytes(&self, container: &[u8]) -> Result<Vec<u8>> {
        self.progress.start(Some(container.len() as u64));
        let mut out = Cursor::new(Vec::new());
        self.decode_stream(container, &mut out)?;
        Ok(out.into_inner())
    }

    /// Decode the container at `input` into a new file at `output`.
    ///
    /// On error the partially written output file is left in place.
    pub fn decode_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<DecodeSummary> {
        let src = File::open(input.as_ref())?;
        self.progress.start(Some(src.metadata()?.len()));

        let mut dst = BufWriter::new(File::create(output.as_ref())?);
        let summary = self.decode_stream(BufReader::new(src), &mut dst)?;
        dst.flush()?;
        info!(
            input = %input.as_ref().display(),
            output = %output.as_ref().display(),
            original_size = summary.original_size,
            frames = summary.frames,
            "decoded file"
        );
        Ok(summary)
    }

    fn decode_stream<R: Read, W: Write>(&self, src: R, mut dst: W) -> Result<DecodeSummary> {
        let mut frames = FrameReader::open(src)?;
        let original_size = frames.header().original_size;
        debug!(
            codec = self.codec.name(),
            block_size = self.config.layout.block_size(),
            original_size,
            workers = self.config.workers,
            "decoding container"
        );

        let mut remaining = original_size;
        let mut decoded_frames = 0u64;
        let batch_len = self.config.batch_len();
        let mut batch: Vec<Frame> = Vec::with_capacity(batch_len);
        loop {
            let frame = frames.next_frame()?;
            let done = frame.is_none();
            if let Some(frame) = frame {
                batch.push(frame);
            }
            if batch.len() == batch_len || (done && !batch.is_empty()) {
                decoded_frames += batch.len() as u64;
                self.flush_batch(&mut dst, &mut batch, &mut remaining)?;
            }
            if done {
                break;
            }
        }

        if remaining > 0 {
            return Err(Error::ShortContainer {
                expected: original_size,
                got: original_size - remaining,
            });
        }
        let expected_frames = self.config.layout.blocks_for(original_size);
        if decoded_frames > expected_frames {
            warn!(
                frames = decoded_frames,
                expected = expected_frames,
                "container holds frames past the recorded size; extra output discarded"
            );
        }

        dst.flush()?;
        self.progress.finish();
        Ok(DecodeSummary {
            original_size,
            frames: decoded_frames,
            container_len: frames.offset(),
        })
    }

    /// Decompress and decode every frame in `batch`, then write the blocks in
    /// frame order, truncated to what is left of the original size.
    fn flush_batch<W: Write>(&self, dst: &mut W, batch: &mut Vec<Frame>, remaining: &mut u64) -> Result<()> {
        let codec = self.codec.as_ref();
        let config = &self.config;

        let blocks: Vec<Result<Vec<u8>>> = match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .map(|frame| decode_frame(codec, config, frame))
                    .collect()
            }),
            None => batch
                .iter()
                .map(|frame| decode_frame(codec, config, frame))
                .collect(),
        };

        for (frame, block) in batch.iter().zip(blocks) {
            let block = block?;
            let keep = (*remaining).min(block.len() as u64) as usize;
            dst.write_all(&block[..keep])?;
            *remaining -= keep as u64;
            trace!(frame = frame.info.index, len = frame.info.len, kept = keep, "frame decoded");
            self.progress.advance(frame.info.encoded_len());
        }
        batch.clear();
        Ok(())
    }
}

/// Decompress and decode one frame back into a full block.
///
/// In strict mode the codec may not inflate past the largest valid encoded
/// block, so a hostile frame cannot balloon memory before it is rejected.
fn decode_frame(codec: &dyn Codec, config: &Config, frame: &Frame) -> Result<Vec<u8>> {
    let index = frame.info.index;
    let layout = &config.layout;
    let encoded = match config.entry_policy {
        EntryPolicy::Strict => codec.decompress_bounded(&frame.payload, layout.max_encoded_len()),
        EntryPolicy::Lenient => codec.decompress(&frame.payload),
    }
    .map_err(|e| Error::compression(index, e))?;
    trace!(frame = index, entries = entry_count(layout, &encoded), "frame inflated");
    let block = decode_block(layout, config.entry_policy, &encoded)?;

    if config.verify {
        let reencoded = encode_frame(codec, layout, index, &block)?;
        if reencoded != frame.payload {
            return Err(Error::VerifyMismatch { frame: index });
        }
    }
    Ok(block)
}

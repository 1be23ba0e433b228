use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::block::encode_block;
use crate::codec::Codec;
use crate::config::{BlockLayout, Config};
use crate::error::{Error, Result};
use crate::format::{length_prefix, ContainerHeader, HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::progress::{NoProgress, Progress};

/// Totals reported by a finished encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeSummary {
    /// Bytes read from the source (the size recorded in the header).
    pub original_size: u64,
    /// Frames written, one per source block.
    pub frames: u64,
    /// Total container size, header included.
    pub container_len: u64,
}

/// Presence-map container encoder.
///
/// # Format layout written
/// ```text
/// [HEADER: 8 bytes placeholder]
/// [len:u16 BE][FRAME 0] [len:u16 BE][FRAME 1] ... [len:u16 BE][FRAME N-1]
/// ← seek back to the start, overwrite header with the original size
/// ```
///
/// Each frame is one `block_size` block, presence-map encoded and then
/// compressed with the configured [`Codec`]. The final short block is
/// zero-padded; the decoder drops the padding using the header size.
pub struct Encoder {
    codec: Arc<dyn Codec>,
    config: Config,
    pool: Option<rayon::ThreadPool>,
    progress: Arc<dyn Progress>,
}

impl Encoder {
    /// Create an encoder. Starts the worker pool when `config.workers > 1`.
    pub fn new(codec: Arc<dyn Codec>, config: Config) -> Result<Self> {
        let pool = config.thread_pool()?;
        Ok(Self {
            codec,
            config,
            pool,
            progress: Arc::new(NoProgress),
        })
    }

    /// Report one unit per frame written to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Encode everything `src` yields into a container written to `dst`.
    ///
    /// The container starts at `dst`'s current position; anything before it
    /// is left untouched. `dst` is left positioned at the end of the container.
    pub fn encode<R: Read, W: Write + Seek>(&self, src: R, dst: W) -> Result<EncodeSummary> {
        self.progress.start(None);
        self.encode_stream(src, dst)
    }

    /// Encode an in-memory buffer into an in-memory container.
    pub fn encode_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.progress
            .start(Some(self.config.layout.blocks_for(data.len() as u64)));
        let mut out = Cursor::new(Vec::with_capacity(HEADER_SIZE + data.len() / 2));
        self.encode_stream(data, &mut out)?;
        Ok(out.into_inner())
    }

    /// Encode the file at `input` into a new container at `output`.
    ///
    /// Overwrites any existing output file.
    pub fn encode_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<EncodeSummary> {
        let src = File::open(input.as_ref())?;
        let size = src.metadata()?.len();
        self.progress.start(Some(self.config.layout.blocks_for(size)));

        let mut dst = BufWriter::new(File::create(output.as_ref())?);
        let summary = self.encode_stream(BufReader::new(src), &mut dst)?;
        dst.flush()?;
        info!(
            input = %input.as_ref().display(),
            output = %output.as_ref().display(),
            original_size = summary.original_size,
            frames = summary.frames,
            container_len = summary.container_len,
            "encoded file"
        );
        Ok(summary)
    }

    fn encode_stream<R: Read, W: Write + Seek>(&self, mut src: R, mut dst: W) -> Result<EncodeSummary> {
        let layout = self.config.layout;
        let block_size = layout.block_size();
        debug!(
            codec = self.codec.name(),
            block_size,
            workers = self.config.workers,
            "encoding container"
        );

        // Placeholder header, rewritten once the original size is known.
        let start = dst.stream_position()?;
        dst.write_all(&[0u8; HEADER_SIZE])?;

        let mut summary = EncodeSummary {
            container_len: HEADER_SIZE as u64,
            ..EncodeSummary::default()
        };

        let batch_len = self.config.batch_len();
        let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_len);
        loop {
            let mut block = vec![0u8; block_size];
            let n = read_full(&mut src, &mut block)?;
            if n == 0 {
                break;
            }
            // block[n..] is already zero: the short final block is padded.
            summary.original_size += n as u64;
            batch.push(block);

            if batch.len() == batch_len || n < block_size {
                self.flush_batch(&mut dst, &mut batch, &mut summary)?;
            }
            if n < block_size {
                break;
            }
        }
        self.flush_batch(&mut dst, &mut batch, &mut summary)?;

        // ── Seek back to the placeholder and write the real header ──────────
        let header = ContainerHeader {
            original_size: summary.original_size,
        };
        dst.seek(SeekFrom::Start(start))?;
        dst.write_all(&header.to_bytes())?;
        dst.seek(SeekFrom::Start(start + summary.container_len))?;
        dst.flush()?;

        self.progress.finish();
        debug!(
            original_size = summary.original_size,
            frames = summary.frames,
            "container sealed"
        );
        Ok(summary)
    }

    /// Encode and compress every block in `batch`, then write the frames in
    /// source order.
    fn flush_batch<W: Write>(
        &self,
        dst: &mut W,
        batch: &mut Vec<Vec<u8>>,
        summary: &mut EncodeSummary,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let first = summary.frames;
        let layout = self.config.layout;
        let codec = self.codec.as_ref();

        let payloads: Vec<Result<Vec<u8>>> = match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .enumerate()
                    .map(|(i, block)| encode_frame(codec, &layout, first + i as u64, block))
                    .collect()
            }),
            None => batch
                .iter()
                .enumerate()
                .map(|(i, block)| encode_frame(codec, &layout, first + i as u64, block))
                .collect(),
        };
        batch.clear();

        for payload in payloads {
            let payload = payload?;
            let prefix = length_prefix(payload.len()).ok_or(Error::Overflow {
                frame: summary.frames,
                len: payload.len(),
            })?;
            dst.write_all(&prefix)?;
            dst.write_all(&payload)?;
            trace!(frame = summary.frames, len = payload.len(), "frame written");

            summary.frames += 1;
            summary.container_len += (LENGTH_PREFIX_SIZE + payload.len()) as u64;
            self.progress.advance(1);
        }
        Ok(())
    }
}

/// Transform and compress one padded block into a frame payload.
///
/// Rejects payloads that would not fit the 2-byte length prefix.
pub(crate) fn encode_frame(codec: &dyn Codec, layout: &BlockLayout, frame: u64, block: &[u8]) -> Result<Vec<u8>> {
    let encoded = encode_block(layout, block);
    let payload = codec
        .compress(&encoded)
        .map_err(|e| Error::compression(frame, e))?;
    if length_prefix(payload.len()).is_none() {
        return Err(Error::Overflow {
            frame,
            len: payload.len(),
        });
    }
    Ok(payload)
}

/// Read until `buf` is full or the source is exhausted. Returns bytes read.
pub(crate) fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

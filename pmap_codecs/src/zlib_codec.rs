use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use pmap_core::Codec;

/// zlib (deflate) codec.
///
/// The default: level 6 zlib streams are what the original presence-map tool
/// writes, so containers from it decode with this codec. Bitmaps of a block
/// with few distinct values are long runs of `0x00`/`0xFF`, which deflate
/// shrinks by two orders of magnitude.
pub struct ZlibCodec {
    level: Compression,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl ZlibCodec {
    /// Compression level 0 (store) to 9 (smallest).
    pub fn new(level: u32) -> anyhow::Result<Self> {
        if level > 9 {
            anyhow::bail!("zlib level must be 0-9, got {}", level);
        }
        Ok(Self {
            level: Compression::new(level),
        })
    }

    /// Inflate a complete zlib stream, growing the output as needed but never
    /// past `limit` bytes. A stream that ends before its end-of-stream marker
    /// is an error rather than a short result.
    fn inflate(compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        // One byte of headroom past the limit lets the inflater reach its
        // end marker when the output is exactly `limit` bytes.
        let cap = limit.saturating_add(1);
        let mut inflater = Decompress::new(true);
        let mut raw = Vec::with_capacity(compressed.len().saturating_mul(4).clamp(256.min(cap), cap));
        loop {
            if raw.len() == raw.capacity() {
                if raw.len() >= cap {
                    anyhow::bail!("zlib decompress error: output exceeds {} bytes", limit);
                }
                raw.reserve_exact(raw.capacity().max(256).min(cap - raw.len()));
            }

            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let status = inflater
                .decompress_vec(&compressed[before_in as usize..], &mut raw, FlushDecompress::None)
                .map_err(|e| anyhow::anyhow!("zlib decompress error: {}", e))?;

            if raw.len() > limit {
                anyhow::bail!("zlib decompress error: output exceeds {} bytes", limit);
            }
            if status == Status::StreamEnd {
                return Ok(raw);
            }
            let stalled = inflater.total_in() == before_in && inflater.total_out() == before_out;
            if stalled && raw.len() < raw.capacity() {
                anyhow::bail!(
                    "zlib decompress error: stream ends after {} of {} bytes without an end marker",
                    before_in,
                    compressed.len()
                );
            }
        }
    }
}

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), self.level);
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Self::inflate(compressed, usize::MAX)
    }

    fn decompress_bounded(&self, compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        Self::inflate(compressed, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_ratio_inputs_roundtrip() {
        let codec = ZlibCodec::default();
        let modulo: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        for input in [vec![7u8; 300], vec![7u8; 1024], vec![7u8; 5000], vec![7u8; 33024], modulo] {
            let compressed = codec.compress(&input).unwrap();
            assert!(compressed.len() * 4 < input.len(), "input should be highly compressible");
            assert_eq!(codec.decompress(&compressed).unwrap(), input, "len {}", input.len());
        }
    }

    #[test]
    fn test_rejects_malformed_stream() {
        let codec = ZlibCodec::default();
        assert!(codec.decompress(&[0xFF; 16]).is_err());
        assert!(codec.decompress(&[]).is_err());
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let codec = ZlibCodec::default();
        let data: Vec<u8> = (0..2048u32).map(|i| (i * 31 % 251) as u8).collect();
        let compressed = codec.compress(&data).unwrap();
        assert_eq!(codec.decompress(&compressed).unwrap(), data);

        let err = codec.decompress(&compressed[..compressed.len() / 2]).unwrap_err();
        assert!(err.to_string().contains("zlib decompress error"), "got: {err}");
    }

    #[test]
    fn test_bounded_output() {
        let codec = ZlibCodec::default();
        let data = vec![0u8; 10_000];
        let compressed = codec.compress(&data).unwrap();
        assert_eq!(codec.decompress_bounded(&compressed, 10_000).unwrap(), data);

        let err = codec.decompress_bounded(&compressed, 9_999).unwrap_err();
        assert!(err.to_string().contains("exceeds 9999 bytes"), "got: {err}");
    }

    #[test]
    fn test_zlib_header() {
        let compressed = ZlibCodec::default().compress(b"presence").unwrap();
        // CMF byte for deflate with a 32 KB window.
        assert_eq!(compressed[0], 0x78);
    }
}

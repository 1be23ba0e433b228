use pmap_core::Codec;

/// No-op codec: stores encoded blocks verbatim.
///
/// Exposes the raw presence-map encoding, which is handy for checking the
/// framing independently of any compressor. A frame is then exactly
/// `entries * (1 + block_size / 8)` bytes, so it overflows the 65 535-byte
/// frame limit once a block holds more distinct values than
/// `65535 / entry_size` (507 at the default 1 KB block, never reachable;
/// 63 at 8 KB blocks).
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }

    fn decompress_bounded(&self, compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        if compressed.len() > limit {
            anyhow::bail!(
                "passthrough decompress error: payload of {} bytes exceeds {} bytes",
                compressed.len(),
                limit
            );
        }
        Ok(compressed.to_vec())
    }
}

/// Generic compressor applied to every encoded block.
///
/// Each `Codec` implementation:
/// - Must round-trip every input, including the empty one:
///   `decompress(compress(x)) == x`.
/// - Must treat every call independently. Blocks may be compressed on
///   different worker threads and in any order.
/// - Is not recorded in the container, so the decoder has to be given the
///   same codec the encoder used.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress one encoded block.
    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompress one frame payload.
    ///
    /// Malformed input must produce an error, never wrong data.
    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompress one frame payload, failing if the output exceeds `limit`
    /// bytes.
    ///
    /// The default decompresses fully and then checks the length. Codecs that
    /// can stop early should override it.
    fn decompress_bounded(&self, compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        let raw = self.decompress(compressed)?;
        if raw.len() > limit {
            anyhow::bail!(
                "{} decompress error: output of {} bytes exceeds {} bytes",
                self.name(),
                raw.len(),
                limit
            );
        }
        Ok(raw)
    }
}

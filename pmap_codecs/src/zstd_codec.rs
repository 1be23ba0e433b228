use pmap_core::Codec;

/// Zstandard codec.
///
/// Presence-map frames are dominated by bitmap runs: a value that fills a
/// region of the block produces long `0xFF` runs, and every other value gets
/// `0x00` over that region. zstd's repeat-offset matching folds those runs
/// down harder than zlib at similar speed, so it pays off most on blocks with
/// many distinct values. Containers written with it are not readable by
/// zlib-only tools.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let compressed = zstd::bulk::compress(raw, self.level)?;
        Ok(compressed)
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let raw = zstd::decode_all(compressed)?;
        Ok(raw)
    }

    /// Decompress into a buffer of at most `limit` bytes; zstd stops with an
    /// error instead of growing past it.
    fn decompress_bounded(&self, compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        zstd::bulk::decompress(compressed, limit)
            .map_err(|e| anyhow::anyhow!("zstd decompress error: {} (limit {} bytes)", e, limit))
    }
}

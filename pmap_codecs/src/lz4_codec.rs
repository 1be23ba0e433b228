use lz4_flex::block::decompress;
use lz4_flex::compress_prepend_size;
use pmap_core::Codec;

const SIZE_PREFIX: usize = 4;

/// LZ4 codec with a size-prepended block format.
///
/// Fastest of the bundled codecs; best when decode speed matters more than
/// container size. LZ4 has no entropy stage, so the all-`0x00` bitmaps of
/// sparse values shrink to short match tokens but the value bytes and
/// irregular bitmaps stay literal. Expect noticeably larger frames than zlib
/// on blocks with many scattered values.
pub struct Lz4Codec;

/// Split the little-endian 4-byte size prefix off an lz4 payload.
fn split_size(compressed: &[u8]) -> anyhow::Result<(usize, &[u8])> {
    if compressed.len() < SIZE_PREFIX {
        anyhow::bail!("lz4 decompress error: payload too short for size prefix");
    }
    let (prefix, body) = compressed.split_at(SIZE_PREFIX);
    let size = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    Ok((size, body))
}

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let (size, body) = split_size(compressed)?;
        decompress(body, size).map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
    }

    /// Rejects an oversized declared length before allocating for it.
    fn decompress_bounded(&self, compressed: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        let (size, body) = split_size(compressed)?;
        if size > limit {
            anyhow::bail!(
                "lz4 decompress error: declared size {} exceeds {} bytes",
                size,
                limit
            );
        }
        decompress(body, size).map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
    }
}

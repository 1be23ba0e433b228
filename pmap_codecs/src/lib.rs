mod lz4_codec;
mod passthrough;
mod zlib_codec;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zlib_codec::ZlibCodec;
pub use zstd_codec::ZstdCodec;

use pmap_core::Codec;
use std::sync::Arc;

/// Codec names accepted by [`codec_by_name`].
pub const CODEC_NAMES: &[&str] = &["zlib", "zstd", "lz4", "passthrough"];

/// Resolve a codec from its CLI name.
///
/// `level` overrides the compression level for codecs that have one (zlib,
/// zstd); `None` keeps the codec's default. Containers do not record their
/// codec, so decoding must use the same name the encoder used.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "zlib" | "deflate" => Ok(Arc::new(match level {
            Some(level) => ZlibCodec::new(u32::try_from(level).map_err(|_| {
                anyhow::anyhow!("zlib level must be 0-9, got {}", level)
            })?)?,
            None => ZlibCodec::default(),
        })),
        "zstd" | "z" => Ok(Arc::new(level.map(ZstdCodec::new).unwrap_or_default())),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_by_name_resolves_aliases() {
        assert_eq!(codec_by_name("zlib", None).unwrap().name(), "zlib");
        assert_eq!(codec_by_name("deflate", Some(9)).unwrap().name(), "zlib");
        assert_eq!(codec_by_name("z", None).unwrap().name(), "zstd");
        assert_eq!(codec_by_name("lz4", None).unwrap().name(), "lz4");
        assert_eq!(codec_by_name("none", None).unwrap().name(), "passthrough");
    }

    #[test]
    fn test_codec_by_name_rejects_unknown() {
        let err = codec_by_name("brotli", None).err().unwrap().to_string();
        assert!(err.contains("unknown codec 'brotli'"), "got: {err}");
    }

    #[test]
    fn test_codec_by_name_rejects_bad_zlib_level() {
        assert!(codec_by_name("zlib", Some(10)).is_err());
        assert!(codec_by_name("zlib", Some(-1)).is_err());
    }

    #[test]
    fn test_every_codec_roundtrips_empty_and_data() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        for name in CODEC_NAMES {
            let codec = codec_by_name(name, None).unwrap();
            for input in [&[][..], &data[..]] {
                let compressed = codec.compress(input).unwrap();
                assert_eq!(codec.decompress(&compressed).unwrap(), input, "codec {name}");
            }
        }
    }
}

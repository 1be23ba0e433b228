//! Presence-map block transform.
//!
//! A block of `block_size` bytes is rewritten as one entry per distinct byte
//! value it contains:
//!
//! ```text
//! [value: u8][bitmap: block_size / 8 bytes]
//! ```
//!
//! The bitmap is big-endian: the most significant bit of its first byte is
//! block position 0, so bit `block_size - 1 - i` of the bitmap read as one
//! integer flags position `i`. Entries are emitted in ascending value order.

use crate::config::{BlockLayout, EntryPolicy};
use crate::error::{Error, Result};

#[inline]
fn position_mask(i: usize) -> u8 {
    0x80 >> (i % 8)
}

/// Encode one block into its presence entries.
///
/// `block` must be exactly `layout.block_size()` bytes; the encoder pads the
/// final short block before calling this.
pub fn encode_block(layout: &BlockLayout, block: &[u8]) -> Vec<u8> {
    debug_assert_eq!(block.len(), layout.block_size());
    let map_bytes = layout.map_bytes();

    // slot[v] is the index into `maps` of value v's bitmap, once seen.
    let mut slot = [usize::MAX; 256];
    let mut maps: Vec<Vec<u8>> = Vec::new();

    for (i, &value) in block.iter().enumerate() {
        let s = &mut slot[value as usize];
        if *s == usize::MAX {
            *s = maps.len();
            maps.push(vec![0u8; map_bytes]);
        }
        maps[*s][i / 8] |= position_mask(i);
    }

    let mut out = Vec::with_capacity(maps.len() * layout.entry_size());
    for (value, &s) in slot.iter().enumerate() {
        if s != usize::MAX {
            out.push(value as u8);
            out.extend_from_slice(&maps[s]);
        }
    }
    out
}

/// Decode a sequence of presence entries back into a full block.
///
/// Positions no entry flags stay zero. Entries are applied in order, so when
/// two entries flag the same position the later one wins. `policy` decides
/// whether bytes after the last whole entry are an error or ignored.
pub fn decode_block(layout: &BlockLayout, policy: EntryPolicy, data: &[u8]) -> Result<Vec<u8>> {
    let entry_size = layout.entry_size();
    let trailing = data.len() % entry_size;
    if trailing != 0 && policy == EntryPolicy::Strict {
        return Err(Error::PartialEntry {
            len: data.len(),
            entry_size,
        });
    }

    let mut out = vec![0u8; layout.block_size()];
    for entry in data.chunks_exact(entry_size) {
        let value = entry[0];
        for (byte_idx, &bits) in entry[1..].iter().enumerate() {
            if bits == 0 {
                continue;
            }
            for bit in 0..8 {
                if bits & (0x80 >> bit) != 0 {
                    out[byte_idx * 8 + bit] = value;
                }
            }
        }
    }
    Ok(out)
}

/// Number of presence entries in an encoded block (whole entries only).
pub fn entry_count(layout: &BlockLayout, data: &[u8]) -> usize {
    data.len() / layout.entry_size()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(block_size: usize) -> BlockLayout {
        BlockLayout::new(block_size).unwrap()
    }

    #[test]
    fn test_uniform_block_is_one_entry() {
        let l = layout(1024);
        let block = vec![0x41u8; 1024];
        let encoded = encode_block(&l, &block);

        let mut expected = vec![0x41u8];
        expected.extend(std::iter::repeat(0xFF).take(128));
        assert_eq!(encoded, expected);

        let decoded = decode_block(&l, EntryPolicy::Strict, &encoded).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_all_distinct_block_of_eight() {
        let l = layout(8);
        let block: Vec<u8> = (0..8).collect();
        let encoded = encode_block(&l, &block);

        assert_eq!(entry_count(&l, &encoded), 8);
        assert_eq!(encoded.len(), 16);
        for (i, entry) in encoded.chunks(2).enumerate() {
            assert_eq!(entry[0], i as u8);
            assert_eq!(entry[1], 0x80 >> i, "value {i} should flag only position {i}");
        }

        assert_eq!(decode_block(&l, EntryPolicy::Strict, &encoded).unwrap(), block);
    }

    #[test]
    fn test_msb_is_position_zero() {
        let l = layout(16);
        let mut block = vec![0u8; 16];
        block[0] = 9;
        block[15] = 9;
        let encoded = encode_block(&l, &block);
        // entries: value 0, then value 9
        assert_eq!(encoded.len(), 6);
        assert_eq!(&encoded[3..], &[9, 0b1000_0000, 0b0000_0001]);
    }

    #[test]
    fn test_entries_ascend_by_value() {
        let l = layout(8);
        let block = [200u8, 3, 200, 77, 3, 3, 0, 255];
        let encoded = encode_block(&l, &block);
        let values: Vec<u8> = encoded.chunks(l.entry_size()).map(|e| e[0]).collect();
        assert_eq!(values, vec![0, 3, 77, 200, 255]);
    }

    #[test]
    fn test_bitmaps_partition_positions() {
        let l = layout(64);
        let block: Vec<u8> = (0..64u32).map(|i| (i * 37 % 11) as u8).collect();
        let encoded = encode_block(&l, &block);

        let mut union = vec![0u8; l.map_bytes()];
        for entry in encoded.chunks(l.entry_size()) {
            for (acc, &bits) in union.iter_mut().zip(&entry[1..]) {
                assert_eq!(*acc & bits, 0, "bitmaps must not overlap");
                *acc |= bits;
            }
        }
        assert!(union.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_entry_count_bounds() {
        let l = layout(1024);
        let all_values: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();
        assert_eq!(entry_count(&l, &encode_block(&l, &all_values)), 256);
        assert_eq!(entry_count(&l, &encode_block(&l, &vec![0u8; 1024])), 1);
    }

    #[test]
    fn test_roundtrip_mixed_block() {
        let l = layout(256);
        let mut rng = 0x2545_F491_4F6C_DD1Du64;
        let block: Vec<u8> = (0..256)
            .map(|_| {
                rng ^= rng << 13;
                rng ^= rng >> 7;
                rng ^= rng << 17;
                (rng >> 56) as u8
            })
            .collect();
        let encoded = encode_block(&l, &block);
        assert_eq!(decode_block(&l, EntryPolicy::Strict, &encoded).unwrap(), block);
    }

    #[test]
    fn test_empty_entry_list_is_zero_block() {
        let l = layout(8);
        assert_eq!(decode_block(&l, EntryPolicy::Strict, &[]).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_last_entry_wins_on_overlap() {
        let l = layout(8);
        // value 1 claims every position, value 2 then claims the first four.
        let data = [1u8, 0xFF, 2, 0xF0];
        let decoded = decode_block(&l, EntryPolicy::Strict, &data).unwrap();
        assert_eq!(decoded, vec![2, 2, 2, 2, 1, 1, 1, 1]);

        let reversed = [2u8, 0xF0, 1, 0xFF];
        let decoded = decode_block(&l, EntryPolicy::Strict, &reversed).unwrap();
        assert_eq!(decoded, vec![1u8; 8]);
    }

    #[test]
    fn test_strict_rejects_partial_entry() {
        let l = layout(8);
        let data = [5u8, 0xFF, 6];
        let err = decode_block(&l, EntryPolicy::Strict, &data).unwrap_err();
        assert!(matches!(err, Error::PartialEntry { len: 3, entry_size: 2 }));
    }

    #[test]
    fn test_lenient_ignores_partial_entry() {
        let l = layout(8);
        let data = [5u8, 0xFF, 6];
        let decoded = decode_block(&l, EntryPolicy::Lenient, &data).unwrap();
        assert_eq!(decoded, vec![5u8; 8]);
    }
}

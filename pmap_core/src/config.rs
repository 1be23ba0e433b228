use crate::error::{Error, Result};

/// Default block size: 1 KB, giving a 128-byte bitmap per presence entry.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Geometry of one presence-map block.
///
/// Built once from a block size and then shared by the encoder and decoder.
/// The block size is not recorded in the container, so a decoder must be
/// given the same `BlockLayout` the encoder used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    block_size: usize,
}

impl BlockLayout {
    /// Validate `block_size`: it must be a positive multiple of 8.
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size % 8 != 0 {
            return Err(Error::config(format!(
                "block size {} must be a positive multiple of 8",
                block_size
            )));
        }
        Ok(Self { block_size })
    }

    /// Raw bytes per block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Bytes in one bitmap (one bit per block position).
    #[inline]
    pub fn map_bytes(&self) -> usize {
        self.block_size / 8
    }

    /// Bytes in one presence entry: the value byte plus its bitmap.
    #[inline]
    pub fn entry_size(&self) -> usize {
        1 + self.map_bytes()
    }

    /// Upper bound on the number of entries a block can produce.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.block_size.min(256)
    }

    /// Largest valid encoded block: one entry per possible distinct value.
    #[inline]
    pub fn max_encoded_len(&self) -> usize {
        self.max_entries() * self.entry_size()
    }

    /// Number of blocks needed to hold `len` raw bytes.
    pub fn blocks_for(&self, len: u64) -> u64 {
        len.div_ceil(self.block_size as u64)
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// How `decode_block` treats bytes left over after the last whole entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryPolicy {
    /// A trailing partial entry is an error.
    #[default]
    Strict,
    /// A trailing partial entry is silently ignored.
    Lenient,
}

/// Settings shared by [`Encoder`](crate::Encoder) and [`Decoder`](crate::Decoder).
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: BlockLayout,
    /// Worker threads for per-block work. `1` runs everything inline.
    pub workers: usize,
    pub entry_policy: EntryPolicy,
    /// Re-encode every decoded block and compare it against its frame.
    pub verify: bool,
}

impl Config {
    /// Configuration for `block_size`-byte blocks with sequential processing.
    pub fn new(block_size: usize) -> Result<Self> {
        Ok(Self {
            layout: BlockLayout::new(block_size)?,
            ..Self::default()
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_entry_policy(mut self, entry_policy: EntryPolicy) -> Self {
        self.entry_policy = entry_policy;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Blocks or frames handed to the worker pool per batch.
    pub(crate) fn batch_len(&self) -> usize {
        self.workers * 4
    }

    /// Build the worker pool, or `None` when running sequentially.
    pub(crate) fn thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        if self.workers <= 1 {
            return Ok(None);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("pmap-worker-{}", i))
            .build()
            .map_err(|e| Error::config(format!("cannot start {} workers: {}", self.workers, e)))?;
        Ok(Some(pool))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: BlockLayout::default(),
            workers: 1,
            entry_policy: EntryPolicy::default(),
            verify: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_layout() {
        let layout = BlockLayout::default();
        assert_eq!(layout.block_size(), 1024);
        assert_eq!(layout.map_bytes(), 128);
        assert_eq!(layout.entry_size(), 129);
        assert_eq!(layout.max_entries(), 256);
        assert_eq!(layout.max_encoded_len(), 256 * 129);
    }

    #[test]
    fn test_rejects_bad_block_sizes() {
        for bad in [0usize, 1, 7, 12, 1023] {
            let err = BlockLayout::new(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "block size {bad}");
        }
        assert!(BlockLayout::new(8).is_ok());
        assert!(BlockLayout::new(4096).is_ok());
    }

    #[test]
    fn test_small_layout_entry_bound() {
        let layout = BlockLayout::new(16).unwrap();
        assert_eq!(layout.max_entries(), 16);
        assert_eq!(layout.entry_size(), 3);
        assert_eq!(layout.max_encoded_len(), 48);
    }

    #[test]
    fn test_blocks_for() {
        let layout = BlockLayout::new(8).unwrap();
        assert_eq!(layout.blocks_for(0), 0);
        assert_eq!(layout.blocks_for(1), 1);
        assert_eq!(layout.blocks_for(8), 1);
        assert_eq!(layout.blocks_for(9), 2);
    }

    #[test]
    fn test_workers_clamped() {
        let config = Config::default().with_workers(0);
        assert_eq!(config.workers, 1);
        assert!(config.thread_pool().unwrap().is_none());
    }
}

//! Progress reporting hook.
//!
//! The encoder advances by one unit per frame written. The decoder advances
//! by the bytes each frame consumed (length prefix plus payload). Reporting
//! is purely observational and never affects the output.

/// Sink for progress updates.
///
/// Called from whichever thread writes the frame, so it must be `Send + Sync`
/// and should return quickly.
pub trait Progress: Send + Sync {
    /// Announce the expected total, when known, before the first advance.
    fn start(&self, _total: Option<u64>) {}

    /// Advance by `units`.
    fn advance(&self, units: u64);

    /// The operation finished successfully.
    fn finish(&self) {}
}

/// Progress sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&self, _units: u64) {}
}

impl<F> Progress for F
where
    F: Fn(u64) + Send + Sync,
{
    fn advance(&self, units: u64) {
        self(units)
    }
}

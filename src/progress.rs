//! Progress reporting (ambient stack, SPEC_FULL §1): the pipeline never
//! assumes a UI, it only calls through [`ProgressSink`]. The CLI wires a
//! real `indicatif`-backed implementation in `main.rs`, mirroring
//! `xwin::main`'s own separation of progress bars from its library calls;
//! tests and headless use [`NullProgress`].

/// `Sync` because a single sink is shared by reference across the `rayon`
/// fan-outs in [`crate::download`] and [`crate::archive`].
pub trait ProgressSink: Sync {
    fn stage(&self, name: &str) {
        let _ = name;
    }
    fn payload_count(&self, count: usize) {
        let _ = count;
    }
    /// Called once per download before the fetch starts. Returns a
    /// callback the downloader invokes with the number of newly-received
    /// bytes as the transfer streams in.
    fn download_bar(&self, filename: &str, total_bytes: u64) -> Box<dyn FnMut(u64) + Send> {
        let _ = (filename, total_bytes);
        Box::new(|_| {})
    }
}

/// A no-op sink for headless / test use.
pub struct NullProgress;
impl ProgressSink for NullProgress {}

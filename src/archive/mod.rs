//! Archive extractors (C3): VSIX/ZIP and MSI+CAB, per spec.md §4.3.
//! Both extraction kinds run on a shared 4-worker pool so CPU-bound
//! decompression never blocks the I/O side (spec.md §5).

pub mod msi;
pub mod zip;

use crate::{Error, Result};
use rayon::prelude::*;

/// Builds the dedicated 4-worker pool used for archive extraction
/// (mirrors `original_source`'s `ThreadPoolExecutor(max_workers=4)`).
fn extraction_pool() -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .map_err(|e| Error::InvalidInputData(format!("failed to build extraction pool: {e}")))
}

/// `multi-extract-vsix`: extracts every `(archive, destination)` pair in
/// parallel, short-circuiting on the first error (spec.md §4.3's
/// concurrency contract).
pub fn multi_extract_vsix(files: &[PathBufPair]) -> Result<()> {
    let pool = extraction_pool()?;
    let failure = parking_lot::Mutex::new(None);

    pool.install(|| {
        files.par_iter().for_each(|pair| {
            if failure.lock().is_some() {
                return;
            }
            if let Err(e) = zip::extract_vsix(&pair.archive, &pair.destination) {
                let mut slot = failure.lock();
                if slot.is_none() {
                    *slot = Some(e);
                }
            }
        });
    });

    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `multi-extract-msi`: extracts every `(archive, destination)` pair in
/// parallel, short-circuiting on the first error.
pub fn multi_extract_msi(files: &[PathBufPair]) -> Result<()> {
    let pool = extraction_pool()?;
    let failure = parking_lot::Mutex::new(None);

    pool.install(|| {
        files.par_iter().for_each(|pair| {
            if failure.lock().is_some() {
                return;
            }
            if let Err(e) = msi::extract_msi(&pair.archive, &pair.destination) {
                let mut slot = failure.lock();
                if slot.is_none() {
                    *slot = Some(e);
                }
            }
        });
    });

    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// One `(source archive, destination directory)` extraction unit.
pub struct PathBufPair {
    pub archive: crate::PathBuf,
    pub destination: crate::PathBuf,
}

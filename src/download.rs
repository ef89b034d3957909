//! Hashed file writer (C2): fetch-verify-write for a single payload, and a
//! `rayon`-backed fan-out for a whole download plan (spec.md §4.2).
//!
//! Concurrency mirrors `xwin::splat::pack`'s one-unit-of-work-per-mapping
//! `par_iter` fan-out, generalized into a short-circuiting "first error
//! wins" accumulator via a `parking_lot::Mutex<Option<Error>>` — the
//! closest a thread-pool program gets to structured-task-group
//! cancellation without an async runtime (see DESIGN.md's REDESIGN FLAGS).

use crate::progress::ProgressSink;
use crate::util::Sha256;
use crate::{Error, Path, PathBuf, Result};
use rayon::prelude::*;

/// One `(url, destination, expected sha256)` download unit.
pub struct DownloadTarget {
    pub url: String,
    pub destination: PathBuf,
    pub expected_sha256: Sha256,
    pub size: u64,
}

/// *download-and-verify*: fetches `target.url`, verifies its SHA-256
/// against `target.expected_sha256`, and writes it atomically (temp file +
/// rename) to `target.destination`. A hash mismatch fails as
/// `Error::Download{status: None}` per spec.md §4.2.
pub fn download_and_verify(
    agent: &ureq::Agent,
    target: &DownloadTarget,
    progress: &dyn ProgressSink,
) -> Result<()> {
    if target.destination.exists() {
        return Ok(());
    }

    let filename = target
        .destination
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| target.url.clone());
    let mut on_chunk = progress.download_bar(&filename, target.size);
    let bytes = crate::http::fetch_bytes_with_progress(agent, &target.url, on_chunk.as_mut())?;
    let actual = Sha256::digest(&bytes);
    if actual != target.expected_sha256 {
        return Err(Error::Download {
            url: target.url.clone(),
            status: None,
            message: format!(
                "sha256 mismatch: expected {}, got {actual}",
                target.expected_sha256
            ),
        });
    }

    write_atomic(&target.destination, &bytes)
}

fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent.to_path_buf(), e))?;
    }

    let tmp_path = destination.with_extension(format!(
        "{}.part",
        destination.extension().unwrap_or_default()
    ));
    std::fs::write(&tmp_path, bytes).map_err(|e| Error::io(tmp_path.clone(), e))?;
    std::fs::rename(&tmp_path, destination).map_err(|e| Error::io(destination.to_path_buf(), e))
}

/// *multi-download*: fans `targets` out over the thread pool, one unit of
/// work per tuple. All tasks run to completion; the first error
/// encountered is surfaced once every in-flight task has finished (there is
/// no true mid-flight cancellation without an async runtime, see
/// DESIGN.md).
pub fn multi_download(
    agent: &ureq::Agent,
    targets: &[DownloadTarget],
    progress: &dyn ProgressSink,
) -> Result<()> {
    let failure = parking_lot::Mutex::new(None::<Error>);

    targets.par_iter().for_each(|target| {
        if failure.lock().is_some() {
            return;
        }
        if let Err(e) = download_and_verify(agent, target, progress) {
            let mut slot = failure.lock();
            if slot.is_none() {
                *slot = Some(e);
            }
        }
    });

    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skips_writing_an_already_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = PathBuf::from_path_buf(dir.path().join("a.msi")).unwrap();
        std::fs::write(&destination, b"cached").unwrap();

        let target = DownloadTarget {
            url: "https://example.invalid/a.msi".to_string(),
            destination,
            expected_sha256: Sha256::digest(b"irrelevant, cache hit short-circuits"),
            size: 6,
        };

        // No agent call happens because the destination already exists.
        let agent = ureq::Agent::new();
        assert!(download_and_verify(&agent, &target, &crate::progress::NullProgress).is_ok());
    }
}

//! VSIX/ZIP extraction (spec.md §4.3), grounded in
//! `examples/original_source/.../msft_file_operations.py`'s `_extract_vsix`.

use crate::{Error, Path, Result};
use std::fs::File;
use std::io::Read;

/// Substrings a VSIX member path must contain at least one of to be
/// extracted. Case-sensitive, matching the original's plain `in` check.
const REQUIRED_SUBSTRINGS: [&str; 4] = ["lib", "src", "include", "crt"];

/// Opens `archive`, filters member paths to those containing any of
/// [`REQUIRED_SUBSTRINGS`], and extracts the filtered set under
/// `destination`, preserving archive-relative paths. Unfiltered members are
/// silently skipped.
pub fn extract_vsix(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive.to_path_buf(), e))?;
    let mut zip = ::zip::ZipArchive::new(file)
        .map_err(|e| Error::MalformedJson(format!("'{archive}' is not a valid zip: {e}")))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::MalformedJson(format!("failed to read zip entry {i}: {e}")))?;

        let name = entry.name().to_string();
        if !REQUIRED_SUBSTRINGS.iter().any(|s| name.contains(s)) {
            continue;
        }

        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let Some(rel) = crate::Path::from_path(enclosed) else {
            continue;
        };
        let out_path = destination.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| Error::io(out_path.clone(), e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent.to_path_buf(), e))?;
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| Error::io(out_path.clone(), e))?;
        std::fs::write(&out_path, buf).map_err(|e| Error::io(out_path, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    #[test]
    fn required_substrings_cover_known_vsix_layout() {
        let member = "Contents/VC/Tools/MSVC/14.44.17.14/include/vcruntime.h";
        assert!(super::REQUIRED_SUBSTRINGS.iter().any(|s| member.contains(s)));
    }
}

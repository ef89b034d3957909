//! Tree reducer (C8): copy-merge of named top-level directories out of an
//! unpack tree, per spec.md §4.8. Grounded directly in
//! `examples/original_source/.../msft_file_operations.py`'s
//! `reduce_crt_files`/`reduce_sdk_files`/`reduce_sdk_crt_files` — *not*
//! `xwin::splat`'s much larger casing-symlink-fixing pipeline, which is out
//! of scope (see DESIGN.md's REDESIGN FLAGS).

use crate::{Error, Path, PathBuf, Result};
use walkdir::WalkDir;

const CRT_DIRS: [&str; 4] = ["include", "lib", "src", "crt"];
const SDK_DIRS: [&str; 4] = ["include", "lib", "source", "bin"];

/// Copies every subdirectory of `unpack_dir` whose name is in `named_dirs`
/// wholesale into `reduced_dir/<same name>`, merging contents across
/// multiple source directories of the same name (spec.md §4.8's
/// `dirs_exist_ok` semantics).
fn reduce_named_dirs(unpack_dir: &Path, reduced_dir: &Path, named_dirs: &[&str]) -> Result<()> {
    for name in named_dirs {
        std::fs::create_dir_all(reduced_dir.join(name))
            .map_err(|e| Error::io(reduced_dir.join(name), e))?;
    }

    for entry in WalkDir::new(unpack_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !named_dirs.contains(&name) {
            continue;
        }

        let from_dir = camino::Utf8Path::from_path(entry.path()).ok_or_else(|| {
            Error::InvalidInputData(format!("non-utf8 path under {unpack_dir}"))
        })?;
        let to_dir = reduced_dir.join(name);
        copy_tree_merge(from_dir, &to_dir)?;
    }

    Ok(())
}

/// Recursively copies `from`'s contents into `to`, creating directories as
/// needed and overwriting files that already exist at the destination —
/// the Rust equivalent of Python's `shutil.copytree(..., dirs_exist_ok=True)`.
fn copy_tree_merge(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| Error::io(to.to_path_buf(), e))?;

    for entry in std::fs::read_dir(from).map_err(|e| Error::io(from.to_path_buf(), e))? {
        let entry = entry.map_err(|e| Error::io(from.to_path_buf(), e))?;
        let path = entry.path();
        let Some(utf8) = camino::Utf8Path::from_path(&path) else {
            continue;
        };
        let Some(file_name) = utf8.file_name() else {
            continue;
        };
        let dest = to.join(file_name);

        if entry.file_type().map_err(|e| Error::io(utf8.to_path_buf(), e))?.is_dir() {
            copy_tree_merge(utf8, &dest)?;
        } else {
            std::fs::copy(utf8, &dest).map_err(|e| Error::io(dest, e))?;
        }
    }

    Ok(())
}

/// Reduces a CRT package's unpack tree into `reduced_dir/{include,lib,src,crt}`.
pub fn reduce_crt(unpack_dir: &Path, reduced_dir: &Path) -> Result<()> {
    reduce_named_dirs(unpack_dir, reduced_dir, &CRT_DIRS)
}

/// Reduces an SDK package's unpack tree into `reduced_dir/{include,lib,source,bin}`.
pub fn reduce_sdk(unpack_dir: &Path, reduced_dir: &Path) -> Result<()> {
    reduce_named_dirs(unpack_dir, reduced_dir, &SDK_DIRS)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merges_same_named_directories_from_multiple_sources() {
        let root = tempfile::tempdir().unwrap();
        let unpack = PathBuf::from_path_buf(root.path().join("unpack")).unwrap();

        let pkg_a_include = unpack.join("pkgA").join("include");
        let pkg_b_include = unpack.join("pkgB").join("nested").join("include");
        std::fs::create_dir_all(&pkg_a_include).unwrap();
        std::fs::create_dir_all(&pkg_b_include).unwrap();
        std::fs::write(pkg_a_include.join("a.h"), b"a").unwrap();
        std::fs::write(pkg_b_include.join("b.h"), b"b").unwrap();

        let reduced = PathBuf::from_path_buf(root.path().join("reduced")).unwrap();
        reduce_crt(&unpack, &reduced).unwrap();

        assert!(reduced.join("include").join("a.h").exists());
        assert!(reduced.join("include").join("b.h").exists());
    }
}

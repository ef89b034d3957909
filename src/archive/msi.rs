//! MSI + embedded CAB extraction (spec.md §4.3). The directory-walk /
//! skip-set / root-id-splitting logic is a direct port of
//! `examples/original_source/.../msft_file_operations.py`'s `_extract_root`
//! / `_build_output_directory`, since this pack's `xwin` snapshot has no
//! directly portable MSI handling of its own.

use crate::{Error, Path, PathBuf, Result};
use std::collections::BTreeMap;
use std::fs::File;

/// Subdirectories that carry nothing CRT/SDK builds need; not descended.
const DIRS_TO_SKIP: [&str; 9] = [
    "AccChecker",
    "AccScope",
    "AppPerfAnalyzer",
    "Catalogs",
    "DesignTime",
    "en-US",
    "SecureBoot",
    "UIAVerify",
    "XamlDiagnostics",
];

/// Maps an MSI `Directory.name` (or root `id`) onto the flattened output
/// path, dropping Microsoft path noise (spec.md §4.3 / §4.8).
fn build_output_directory(output: &Path, folder_name: &str) -> PathBuf {
    let lower_known = ["Include", "Lib", "Source"];
    if let Some(pos) = lower_known.iter().position(|n| *n == folder_name) {
        output.join(lower_known[pos].to_ascii_lowercase())
    } else if folder_name.chars().next().is_some_and(|c| c.is_ascii_digit())
        || (!folder_name.is_empty() && folder_name.bytes().all(|b| b.is_ascii_digit()))
    {
        output.to_path_buf()
    } else if folder_name == "ProgramFilesFolder" || folder_name == "Windows Kits" {
        output.to_path_buf()
    } else {
        output.join(folder_name)
    }
}

struct MsiDirectory {
    /// Only meaningful at the root: the raw `Directory.id`.
    id: String,
    name: String,
    components: Vec<String>,
    children: Vec<MsiDirectory>,
}

struct MsiTables {
    /// `Component` id -> list of `File` rows belonging to it.
    component_files: BTreeMap<String, Vec<MsiFile>>,
}

struct MsiFile {
    name: String,
    /// Byte offset into the decompressed cabinet stream this file resolves
    /// to, keyed by the owning cabinet's folder index. `None` when the
    /// MSI/CAB cross-reference is incomplete (spec.md §4.3: skipped with no
    /// error).
    cab_path: Option<String>,
}

/// Extracts `archive` (an MSI OLE compound document) into `destination`,
/// walking the `Directory` table and writing each resolvable `File` to its
/// flattened output path.
pub fn extract_msi(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive.to_path_buf(), e))?;
    let mut package = ::msi::Package::open(file)
        .map_err(|e| Error::MalformedJson(format!("'{archive}' is not a valid MSI: {e}")))?;

    let (tree, tables) = read_msi_layout(&mut package, archive)?;
    let cabinets = decompress_cabinets(&mut package, archive)?;

    std::fs::create_dir_all(destination).map_err(|e| Error::io(destination.to_path_buf(), e))?;
    extract_root(&tree, &tables, &cabinets, destination, true)
}

/// Builds the directory tree and component->file table from the MSI's
/// `Directory`/`Component`/`File` tables.
fn read_msi_layout(
    package: &mut ::msi::Package<File>,
    archive: &Path,
) -> Result<(MsiDirectory, MsiTables)> {
    use ::msi::Select;

    let mut dir_parent: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut dir_name: BTreeMap<String, String> = BTreeMap::new();
    let mut root_id = None;

    for row in package
        .select_rows(Select::table("Directory"))
        .map_err(|e| Error::MalformedJson(format!("'{archive}' has no Directory table: {e}")))?
    {
        let id = row[0].to_string();
        let parent = row[1].as_str().map(|s| s.to_string());
        let name = row[2]
            .as_str()
            .map(|s| s.split(':').last().unwrap_or(s).split('|').last().unwrap_or(s).to_string())
            .unwrap_or_else(|| id.clone());

        if parent.is_none() {
            root_id = Some(id.clone());
        }
        dir_parent.insert(id.clone(), parent);
        dir_name.insert(id, name);
    }

    let root_id = root_id.ok_or_else(|| {
        Error::MalformedJson(format!("'{archive}' Directory table has no root entry"))
    })?;

    let mut component_dir: BTreeMap<String, String> = BTreeMap::new();
    for row in package
        .select_rows(Select::table("Component"))
        .map_err(|e| Error::MalformedJson(format!("'{archive}' has no Component table: {e}")))?
    {
        let component = row[0].to_string();
        let directory = row[2].to_string();
        component_dir.insert(component, directory);
    }

    let mut component_files: BTreeMap<String, Vec<MsiFile>> = BTreeMap::new();
    for row in package
        .select_rows(Select::table("File"))
        .map_err(|e| Error::MalformedJson(format!("'{archive}' has no File table: {e}")))?
    {
        let file_key = row[0].to_string();
        let component = row[1].to_string();
        let name = file_key
            .split('|')
            .last()
            .unwrap_or(&file_key)
            .to_string();

        component_files
            .entry(component)
            .or_default()
            .push(MsiFile {
                name,
                cab_path: Some(file_key),
            });
    }

    let mut dir_components: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (component, directory) in &component_dir {
        dir_components.entry(directory.clone()).or_default().push(component.clone());
    }

    let mut children_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, parent) in &dir_parent {
        if let Some(parent) = parent {
            children_of.entry(parent.clone()).or_default().push(id.clone());
        }
    }

    fn build(
        id: &str,
        dir_name: &BTreeMap<String, String>,
        dir_components: &BTreeMap<String, Vec<String>>,
        children_of: &BTreeMap<String, Vec<String>>,
    ) -> MsiDirectory {
        let name = dir_name.get(id).cloned().unwrap_or_else(|| id.to_string());
        let components = dir_components.get(id).cloned().unwrap_or_default();
        let children = children_of
            .get(id)
            .map(|ids| {
                ids.iter()
                    .map(|child_id| build(child_id, dir_name, dir_components, children_of))
                    .collect()
            })
            .unwrap_or_default();
        MsiDirectory {
            id: id.to_string(),
            name,
            components,
            children,
        }
    }

    let tree = build(&root_id, &dir_name, &dir_components, &children_of);
    Ok((tree, MsiTables { component_files }))
}

/// A `Media` table row's `Cabinet` column: either an OLE stream embedded in
/// the MSI itself (`#name`) or a file sitting next to the MSI on disk.
enum CabinetSource {
    Embedded(String),
    External(String),
}

/// Reads the `Media` table's `Cabinet` column (spec.md §4.3). The Windows
/// SDK and UCRT MSIs keep their payload in cabinets external to the MSI, not
/// embedded OLE streams, which is why this is read from `Media` rather than
/// inferred from the stream list.
fn read_media_cabinets(
    package: &mut ::msi::Package<File>,
    archive: &Path,
) -> Result<Vec<CabinetSource>> {
    use ::msi::Select;

    let mut sources = Vec::new();
    for row in package
        .select_rows(Select::table("Media"))
        .map_err(|e| Error::MalformedJson(format!("'{archive}' has no Media table: {e}")))?
    {
        let Some(cabinet) = row[3].as_str() else {
            continue;
        };
        sources.push(match cabinet.strip_prefix('#') {
            Some(stream_name) => CabinetSource::Embedded(stream_name.to_string()),
            None => CabinetSource::External(cabinet.to_string()),
        });
    }
    Ok(sources)
}

/// Decompresses every cabinet referenced by the `Media` table, whether
/// embedded as an OLE stream or sitting alongside the MSI as a sibling file,
/// keyed by the cabinet-internal file path used in the `File` table's name
/// column, using up to 4 worker threads (spec.md §4.3's concurrency
/// contract).
fn decompress_cabinets(
    package: &mut ::msi::Package<File>,
    archive: &Path,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let sources = read_media_cabinets(package, archive)?;

    let mut raw_cabs = Vec::with_capacity(sources.len());
    for source in &sources {
        let buf = match source {
            CabinetSource::Embedded(stream_name) => {
                let mut stream = package.read_stream(stream_name).map_err(|e| {
                    Error::MalformedJson(format!(
                        "'{archive}' missing embedded CAB stream '{stream_name}': {e}"
                    ))
                })?;
                let mut buf = Vec::new();
                std::io::Read::read_to_end(&mut stream, &mut buf)
                    .map_err(|e| Error::io(archive.to_path_buf(), e))?;
                buf
            }
            CabinetSource::External(filename) => {
                let cab_path = archive
                    .parent()
                    .map(|dir| dir.join(filename))
                    .unwrap_or_else(|| PathBuf::from(filename));
                std::fs::read(&cab_path).map_err(|e| Error::io(cab_path, e))?
            }
        };
        raw_cabs.push(buf);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .map_err(|e| Error::InvalidInputData(format!("failed to build CAB decompression pool: {e}")))?;

    let results: Vec<Result<Vec<(String, Vec<u8>)>>> = pool.install(|| {
        use rayon::prelude::*;
        raw_cabs
            .par_iter()
            .map(|raw| decompress_one_cabinet(raw))
            .collect()
    });

    let mut out = BTreeMap::new();
    for result in results {
        for (name, bytes) in result? {
            out.insert(name, bytes);
        }
    }
    Ok(out)
}

fn decompress_one_cabinet(raw: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut cabinet = ::cab::Cabinet::new(std::io::Cursor::new(raw))
        .map_err(|e| Error::MalformedJson(format!("invalid CAB data: {e}")))?;

    let file_names: Vec<String> = cabinet
        .folder_entries()
        .flat_map(|folder| folder.file_entries().map(|f| f.name().to_string()))
        .collect();

    let mut out = Vec::with_capacity(file_names.len());
    for name in file_names {
        let mut reader = cabinet
            .read_file(&name)
            .map_err(|e| Error::MalformedJson(format!("failed to read CAB entry '{name}': {e}")))?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut buf)
            .map_err(|e| Error::MalformedJson(format!("failed to decompress CAB entry '{name}': {e}")))?;
        out.push((name, buf));
    }
    Ok(out)
}

/// Recursively walks the MSI directory tree, writing each resolvable file
/// under its flattened output path. Files whose cabinet cross-reference is
/// incomplete are skipped with no error (spec.md §4.3).
fn extract_root(
    dir: &MsiDirectory,
    tables: &MsiTables,
    cabinets: &BTreeMap<String, Vec<u8>>,
    output: &Path,
    is_root: bool,
) -> Result<()> {
    std::fs::create_dir_all(output).map_err(|e| Error::io(output.to_path_buf(), e))?;

    for component in &dir.components {
        let Some(files) = tables.component_files.get(component) else {
            continue;
        };
        for file in files {
            let Some(cab_path) = &file.cab_path else {
                continue;
            };
            let Some(bytes) = cabinets.get(cab_path) else {
                continue;
            };
            let out_file = output.join(&file.name);
            std::fs::write(&out_file, bytes).map_err(|e| Error::io(out_file, e))?;
        }
    }

    for child in &dir.children {
        let folder_name = if is_root {
            match child.id.split_once('.') {
                Some((left, guid)) => {
                    tracing::warn!(directory_id = %child.id, %guid, "directory ID has a GUID suffix");
                    left.to_string()
                }
                None => child.id.clone(),
            }
        } else {
            child.name.clone()
        };

        if DIRS_TO_SKIP.contains(&folder_name.as_str()) {
            continue;
        }

        let child_output = build_output_directory(output, &folder_name);
        extract_root(child, tables, cabinets, &child_output, false)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowercases_known_directories() {
        let out = Path::new("/tmp/out");
        assert_eq!(build_output_directory(out, "Include"), out.join("include"));
        assert_eq!(build_output_directory(out, "Lib"), out.join("lib"));
    }

    #[test]
    fn skips_versioned_and_noise_directories() {
        let out = Path::new("/tmp/out");
        assert_eq!(build_output_directory(out, "10.0.19041.0"), out.to_path_buf());
        assert_eq!(build_output_directory(out, "ProgramFilesFolder"), out.to_path_buf());
        assert_eq!(build_output_directory(out, "Windows Kits"), out.to_path_buf());
    }

    #[test]
    fn keeps_other_directories_as_is() {
        let out = Path::new("/tmp/out");
        assert_eq!(build_output_directory(out, "um"), out.join("um"));
    }
}

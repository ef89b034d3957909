//! Pipeline driver (C7): sequential stages over the components below,
//! per spec.md §4.7. Trimmed to the single `Download` operation implied by
//! the original CLI (no `Unpack`/`Splat`/`Minimize` — see DESIGN.md's
//! REDESIGN FLAGS).

use crate::archive::{multi_extract_msi, multi_extract_vsix, PathBufPair};
use crate::download::{multi_download, DownloadTarget};
use crate::progress::ProgressSink;
use crate::select::Selection;
use crate::{loader, reduce, select, Configuration, Error, PathBuf, Result};

/// Runs the full pipeline: load both manifests, select payloads, download,
/// extract, and reduce. Returns the package-dir names that were reduced
/// (callers may use this to report what landed under `reduced/`).
pub fn run(
    agent: &ureq::Agent,
    cfg: &Configuration,
    progress: &dyn ProgressSink,
) -> Result<Vec<String>> {
    if !cfg.channel.is_legal_for(cfg.manifest_version) {
        return Err(Error::InvalidInputData(format!(
            "channel '{}' is not legal for manifest_version {}",
            cfg.channel, cfg.manifest_version
        )));
    }

    progress.stage("load channel manifest");
    let channel_manifest = loader::load_channel_manifest(agent, cfg)?;

    progress.stage("load installer manifest");
    let index = loader::load_installer_manifest(agent, &channel_manifest, cfg)?;

    progress.stage("select packages");
    let selection: Selection = select::select(&index, cfg)?;
    progress.payload_count(selection.len());

    progress.stage("plan downloads");
    let plan = plan_downloads(cfg, &selection);

    progress.stage("download");
    multi_download(agent, &plan.targets, progress)?;

    progress.stage("extract");
    let vsix: Vec<PathBufPair> = plan
        .extractions
        .iter()
        .filter(|e| e.archive.extension() == Some("vsix"))
        .map(|e| PathBufPair {
            archive: e.archive.clone(),
            destination: e.destination.clone(),
        })
        .collect();
    let msi: Vec<PathBufPair> = plan
        .extractions
        .iter()
        .filter(|e| e.archive.extension() == Some("msi"))
        .map(|e| PathBufPair {
            archive: e.archive.clone(),
            destination: e.destination.clone(),
        })
        .collect();
    multi_extract_vsix(&vsix)?;
    multi_extract_msi(&msi)?;

    progress.stage("reduce");
    let mut package_dirs = Vec::new();
    for extraction in &plan.extractions {
        let unpack_root = cfg.unpack_dir().join(&extraction.package_dir_name);
        let reduced_root = cfg.reduced_dir();
        if extraction.is_crt {
            reduce::reduce_crt(&unpack_root, &reduced_root.join(&extraction.package_dir_name))?;
        } else {
            reduce::reduce_sdk(&unpack_root, &reduced_root.join(&extraction.package_dir_name))?;
        }
        package_dirs.push(extraction.package_dir_name.clone());
    }
    package_dirs.sort();
    package_dirs.dedup();

    Ok(package_dirs)
}

struct Extraction {
    archive: PathBuf,
    destination: PathBuf,
    package_dir_name: String,
    is_crt: bool,
}

struct DownloadPlan {
    targets: Vec<DownloadTarget>,
    extractions: Vec<Extraction>,
}

/// Stage 4 of spec.md §4.7: for each selected payload, compute
/// `cache_dir/downloads/{CRT_ver|SDK_ver}/{suggested_filename}` and the
/// matching `cache_dir/unpack/{package_dir_name}/{filename}/` extraction
/// target. `.cab` files are left in place (their MSI extracts them).
fn plan_downloads(cfg: &Configuration, selection: &Selection) -> DownloadPlan {
    let mut targets = Vec::with_capacity(selection.len());
    let mut extractions = Vec::new();

    for (_id, payload) in selection {
        let common = payload.common();
        let is_crt = matches!(payload, crate::SelectedPayload::Crt(_));
        let version_dir = if is_crt {
            format!("CRT_{}", common.version)
        } else {
            format!("SDK_{}", common.version)
        };

        let destination = cfg.downloads_dir().join(&version_dir).join(&common.filename);
        targets.push(DownloadTarget {
            url: common.url.clone(),
            destination: destination.clone(),
            expected_sha256: common.sha256.clone(),
            size: common.size,
        });

        let is_extractable = matches!(
            destination.extension(),
            Some("vsix") | Some("msi")
        );
        if is_extractable {
            let extract_dest = cfg
                .unpack_dir()
                .join(&version_dir)
                .join(&common.filename);
            extractions.push(Extraction {
                archive: destination,
                destination: extract_dest,
                package_dir_name: version_dir,
                is_crt,
            });
        }
    }

    DownloadPlan { targets, extractions }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ConfigurationBuilder;

    #[test]
    fn plan_skips_cab_payloads_for_extraction() {
        let cfg = ConfigurationBuilder::new()
            .cache_dir(crate::Path::new("/tmp/wincrt-pipeline-test"))
            .build()
            .unwrap();

        let cab = crate::SDKPayload {
            common: crate::PayloadCommon {
                filename: "foo.cab".into(),
                kind: crate::PayloadType::CabFile,
                sha256: crate::util::Sha256::digest(b"x"),
                size: 1,
                target_arch: crate::Architecture::All,
                url: "https://example/foo.cab".into(),
                version: "10.0.26100".into(),
                install_size: None,
            },
        };

        let selection: Selection = vec![("foo".to_string(), crate::SelectedPayload::Sdk(cab))];
        let plan = plan_downloads(&cfg, &selection);
        assert_eq!(plan.targets.len(), 1);
        assert!(plan.extractions.is_empty());
    }
}

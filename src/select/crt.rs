//! CRT version discovery and CRT/ATL payload selection (spec.md §4.6.1/
//! §4.6.2), grounded in `examples/original_source/.../win_crt.py`.

use super::{first_item, infer_arch_from_id, insert, Selection};
use crate::manifest::{parse_version, PackageIndex};
use crate::{Architecture, Configuration, Error, PayloadCommon, PayloadType, Result, Variant};
use crate::{CRTPayload, SelectedPayload};

const BUILD_TOOLS_ID: &str = "Microsoft.VisualStudio.Product.BuildTools";

/// Extracts the first four consecutive dot-separated numeric segments from
/// a component id, e.g. `Microsoft.VC.14.44.17.14.CRT.Headers.base` ->
/// `14.44.17.14` (spec.md §4.6.1).
fn extract_version(component_id: &str) -> Option<String> {
    let parts: Vec<&str> = component_id.split('.').collect();
    if parts.len() < 4 {
        return None;
    }
    for window in parts.windows(4) {
        if window.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
            return Some(window.join("."));
        }
    }
    None
}

/// Discovers the CRT version to use: either the configured `crt_version`
/// (validated against the set of available versions) or the maximum
/// available version.
fn discover_crt_version(index: &PackageIndex, cfg: &Configuration) -> Result<String> {
    let build_tools = index.get(BUILD_TOOLS_ID).ok_or_else(|| {
        Error::UnsupportedPackageConfiguration(format!("missing package '{BUILD_TOOLS_ID}'"))
    })?;
    if build_tools.len() != 1 {
        return Err(Error::UnsupportedPackageConfiguration(format!(
            "expected exactly one '{BUILD_TOOLS_ID}' item, found {}",
            build_tools.len()
        )));
    }

    let mut versions: Vec<String> = build_tools[0]
        .dependencies
        .keys()
        .filter(|k| k.ends_with(".x86.x64"))
        .filter_map(|k| extract_version(k))
        .collect();
    versions.sort();
    versions.dedup();

    if let Some(requested) = &cfg.crt_version {
        if versions.iter().any(|v| v == requested) {
            Ok(requested.clone())
        } else {
            Err(Error::UnsupportedPackageConfiguration(format!(
                "crt_version '{requested}' is not available"
            )))
        }
    } else {
        versions
            .into_iter()
            .max_by(|a, b| {
                parse_version(a)
                    .zip(parse_version(b))
                    .map(|(a, b)| a.cmp(&b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| {
                Error::UnsupportedPackageConfiguration("no CRT versions available".into())
            })
    }
}

fn variant_from_id(id: &str) -> Option<Variant> {
    Variant::infer_from_id(id)
}

fn crt_payload_from_item(
    item: &crate::manifest::ManifestItem,
    kind: PayloadType,
    version: &str,
    variant: Variant,
    spectre_hardened: bool,
) -> Result<CRTPayload> {
    let payload = item.payloads.first().ok_or_else(|| {
        Error::MalformedJson(format!("no payloads found for manifest item {}", item.id))
    })?;

    let is_header = matches!(
        kind,
        PayloadType::AtlHeaders | PayloadType::CrtHeaders | PayloadType::SdkHeaders
    );
    let target_arch = if is_header {
        Architecture::All
    } else {
        infer_arch_from_id(&item.id, false).ok_or_else(|| {
            Error::UnsupportedPackageConfiguration(format!(
                "manifest item '{}' does not specify a known architecture",
                item.id
            ))
        })?
    };

    let install_size = item
        .install_sizes
        .as_ref()
        .and_then(|sizes| sizes.target_drive);

    Ok(CRTPayload {
        common: PayloadCommon {
            filename: payload.file_name.clone(),
            kind,
            sha256: payload.sha256.clone(),
            size: payload.size,
            target_arch,
            url: payload.url.clone(),
            version: version.to_string(),
            install_size,
        },
        variant,
        spectre_hardened,
    })
}

fn grab(
    index: &PackageIndex,
    id: &str,
    kind: PayloadType,
    version: &str,
    variant: Variant,
    spectre_hardened: bool,
) -> Result<CRTPayload> {
    let item = first_item(index, id)?;
    crt_payload_from_item(item, kind, version, variant, spectre_hardened)
}

/// CRT headers + one payload per `(arch, variant)` pair, plus spectre
/// variants where applicable (spec.md §4.6.2; Store never has a spectre
/// build).
pub(crate) fn select_crt(index: &PackageIndex, cfg: &Configuration) -> Result<Selection> {
    let version = discover_crt_version(index, cfg)?;
    let mut out = Selection::new();

    let header_id = format!("Microsoft.VC.{version}.CRT.Headers.base");
    let headers = grab(
        index,
        &header_id,
        PayloadType::CrtHeaders,
        &version,
        Variant::All,
        false,
    )?;
    insert(&mut out, header_id, SelectedPayload::Crt(headers));

    let variants = cfg.expanded_variants();
    for arch in &cfg.arch {
        for variant in &variants {
            let arch_str = arch.as_crt_str();
            let variant_str = variant.as_package_str();
            let id = format!("Microsoft.VC.{version}.CRT.{arch_str}.{variant_str}.base");
            let payload = grab(
                index,
                &id,
                PayloadType::CrtLibs,
                &version,
                variant_from_id(&id).unwrap_or(*variant),
                false,
            )?;
            insert(&mut out, id, SelectedPayload::Crt(payload));

            if cfg.include_spectre && *variant != Variant::Store {
                let spectre_id =
                    format!("Microsoft.VC.{version}.CRT.{arch_str}.{variant_str}.spectre.base");
                let payload = grab(
                    index,
                    &spectre_id,
                    PayloadType::CrtLibs,
                    &version,
                    variant_from_id(&spectre_id).unwrap_or(*variant),
                    true,
                )?;
                insert(&mut out, spectre_id, SelectedPayload::Crt(payload));
            }
        }
    }

    Ok(out)
}

/// ATL headers + one payload per arch, plus spectre variants (spec.md
/// §4.6.2: ATL has no Desktop/OneCore/Store distinction).
pub(crate) fn select_atl(index: &PackageIndex, cfg: &Configuration) -> Result<Selection> {
    let version = discover_crt_version(index, cfg)?;
    let mut out = Selection::new();

    let header_id = format!("Microsoft.VC.{version}.ATL.Headers.base");
    let headers = grab(
        index,
        &header_id,
        PayloadType::AtlHeaders,
        &version,
        Variant::All,
        false,
    )?;
    insert(&mut out, header_id, SelectedPayload::Crt(headers));

    for arch in &cfg.arch {
        let arch_str = arch.as_atl_str();
        let id = format!("Microsoft.VC.{version}.ATL.{arch_str}.base");
        let payload = grab(index, &id, PayloadType::AtlLibs, &version, Variant::All, false)?;
        insert(&mut out, id, SelectedPayload::Crt(payload));

        if cfg.include_spectre {
            let spectre_id = format!("Microsoft.VC.{version}.ATL.{arch_str}.Spectre.base");
            let payload = grab(
                index,
                &spectre_id,
                PayloadType::AtlLibs,
                &version,
                Variant::All,
                true,
            )?;
            insert(&mut out, spectre_id, SelectedPayload::Crt(payload));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_version_from_component_id() {
        assert_eq!(
            extract_version("Microsoft.VC.14.44.17.14.CRT.Headers.base"),
            Some("14.44.17.14".to_string())
        );
        assert_eq!(extract_version("Microsoft.VisualStudio.Component"), None);
    }
}

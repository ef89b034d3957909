//! SDK version discovery and SDK/UCRT/CAB payload selection (spec.md
//! §4.6.3/§4.6.4), grounded in `examples/original_source/.../win_sdk.py`.

use super::insert;
use crate::manifest::{parse_version, PackageIndex, Payload};
use crate::{Architecture, Configuration, Error, PayloadCommon, PayloadType, Result};
use crate::{SDKPayload, SelectedPayload};

const UCRT_ID: &str = "Microsoft.Windows.UniversalCRT.HeadersLibsSources.Msi";

const ALL_HEADER_SUFFIXES: [&str; 4] = [
    "Windows SDK Desktop Headers x86-x86_en-us.msi",
    "Windows SDK OnecoreUap Headers x86-x86_en-us.msi",
    "Windows SDK for Windows Store Apps Headers-x86_en-us.msi",
    "Windows SDK for Windows Store Apps Headers OnecoreUap-x86_en-us.msi",
];

/// Parses a package-index key of the shape `Win{W}SDK_{major.minor.patch}`.
fn parse_sdk_key(key: &str) -> Option<(u32, &str)> {
    let rest = key.strip_prefix("Win")?;
    let (digits, rest) = rest.split_once("SDK_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let win_ver: u32 = digits.parse().ok()?;
    let parts: Vec<&str> = rest.split('.').collect();
    if parts.len() != 3 || !parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    Some((win_ver, rest))
}

/// Discovers `(sdk_key, version_string)`: either the configured
/// `sdk_version` or the maximum `(W, version)` pair among every
/// `Win{W}SDK_{version}` key in the index (spec.md §4.6.3).
fn discover_sdk_key(index: &PackageIndex, cfg: &Configuration) -> Result<(String, String)> {
    if let Some(requested) = &cfg.sdk_version {
        let (_, version) = parse_sdk_key(requested).ok_or_else(|| {
            Error::InvalidInputData(format!("sdk_version '{requested}' is malformed"))
        })?;
        return Ok((requested.clone(), version.to_string()));
    }

    let mut candidates: Vec<(u32, String, String)> = index
        .keys()
        .filter_map(|key| parse_sdk_key(key).map(|(w, v)| (w, v.to_string(), key.to_string())))
        .collect();

    candidates.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            parse_version(&a.1)
                .zip(parse_version(&b.1))
                .map(|(va, vb)| va.cmp(&vb))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let (_, version, key) = candidates
        .into_iter()
        .last()
        .ok_or_else(|| Error::UnsupportedPackageConfiguration("no Win*SDK_* entries found".into()))?;

    Ok((key, version))
}

/// Filename canonicalization for SDK payloads (spec.md §4.6.4): lowercase,
/// replace spaces and backslashes with underscores; non-CAB kinds are
/// prefixed with `{sdk_key}_`, CAB kinds strip a leading `installers_`.
fn canonical_filename(sdk_key: &str, file_name: &str, kind: PayloadType) -> String {
    let mut name = file_name.replace(' ', "_").replace('\\', "_").to_ascii_lowercase();
    if kind == PayloadType::CabFile {
        if let Some(stripped) = name.strip_prefix("installers_") {
            name = stripped.to_string();
        }
        name
    } else {
        format!("{sdk_key}_{name}")
    }
}

fn sdk_payload(
    sdk_key: &str,
    version: &str,
    payload: &Payload,
    kind: PayloadType,
    target_arch: Architecture,
) -> SDKPayload {
    SDKPayload {
        common: PayloadCommon {
            filename: canonical_filename(sdk_key, &payload.file_name, kind),
            kind,
            sha256: payload.sha256.clone(),
            size: payload.size,
            target_arch,
            url: payload.url.clone(),
            version: version.to_string(),
            install_size: None,
        },
    }
}

fn sdk_payloads<'a>(index: &'a PackageIndex, sdk_key: &str) -> Result<&'a [Payload]> {
    let item = index
        .first(sdk_key)
        .ok_or_else(|| Error::UnsupportedPackageConfiguration(format!("missing SDK package '{sdk_key}'")))?;
    if item.payloads.is_empty() {
        return Err(Error::MalformedJson(format!(
            "no payloads found for SDK package '{sdk_key}'"
        )));
    }
    Ok(&item.payloads)
}

fn select_headers(
    index: &PackageIndex,
    cfg: &Configuration,
    sdk_key: &str,
    version: &str,
    payloads: &[Payload],
    out: &mut super::Selection,
) -> Result<()> {
    let mut found = 0usize;
    for payload in payloads {
        if ALL_HEADER_SUFFIXES.iter().any(|suffix| payload.file_name.ends_with(suffix)) {
            let p = sdk_payload(sdk_key, version, payload, PayloadType::SdkHeaders, Architecture::All);
            insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));
            found += 1;
        }
    }
    if found != ALL_HEADER_SUFFIXES.len() {
        return Err(Error::MissingPackage(
            "not all SDK header payloads found in manifest".into(),
        ));
    }

    for arch in &cfg.arch {
        let arch_str = arch.as_crt_str().to_ascii_lowercase();
        let payload_id = format!("Installers\\Windows SDK Desktop Headers {arch_str}-x86_en-us.msi");
        let payload = payloads
            .iter()
            .find(|p| p.file_name == payload_id)
            .ok_or_else(|| Error::UnsupportedPackageConfiguration(format!("SDK header payload '{payload_id}' not found")))?;
        let p = sdk_payload(sdk_key, version, payload, PayloadType::SdkHeaders, *arch);
        insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));
    }

    let _ = index;
    Ok(())
}

fn select_libs(
    index: &PackageIndex,
    cfg: &Configuration,
    sdk_key: &str,
    version: &str,
    payloads: &[Payload],
    out: &mut super::Selection,
) -> Result<()> {
    for arch in &cfg.arch {
        let arch_str = arch.as_crt_str().to_ascii_lowercase();
        let payload_id = format!("Installers\\Windows SDK Desktop Libs {arch_str}-x86_en-us.msi");
        let payload = payloads
            .iter()
            .find(|p| p.file_name == payload_id)
            .ok_or_else(|| Error::UnsupportedPackageConfiguration(format!("SDK lib payload '{payload_id}' not found")))?;
        let p = sdk_payload(sdk_key, version, payload, PayloadType::SdkLibs, *arch);
        insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));
    }

    let store_libs = payloads
        .iter()
        .find(|p| p.file_name.ends_with("Windows SDK for Windows Store Apps Libs-x86_en-us.msi"))
        .ok_or_else(|| Error::MissingPackage("SDK Store Libs payload not found in manifest".into()))?;
    let p = sdk_payload(sdk_key, version, store_libs, PayloadType::SdkStoreLibs, Architecture::All);
    insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));

    let ucrt_items = index
        .get(UCRT_ID)
        .ok_or_else(|| Error::MissingPackage(format!("Universal CRT package '{UCRT_ID}' not found")))?;
    let ucrt_payloads = &ucrt_items
        .first()
        .ok_or_else(|| Error::MissingPackage("Universal CRT package has no items".into()))?
        .payloads;
    let ucrt_msi = ucrt_payloads
        .iter()
        .find(|p| p.file_name == "Universal CRT Headers Libraries and Sources-x86_en-us.msi")
        .ok_or_else(|| Error::MissingPackage("Universal CRT MSI package not found in manifest".into()))?;
    let p = sdk_payload(sdk_key, version, ucrt_msi, PayloadType::Ucrt, Architecture::All);
    insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));

    Ok(())
}

fn select_cab_files(
    index: &PackageIndex,
    sdk_key: &str,
    version: &str,
    payloads: &[Payload],
    out: &mut super::Selection,
) -> Result<()> {
    for payload in payloads.iter().filter(|p| p.file_name.ends_with(".cab")) {
        let p = sdk_payload(sdk_key, version, payload, PayloadType::CabFile, Architecture::All);
        insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));
    }

    let ucrt_items = index
        .get(UCRT_ID)
        .ok_or_else(|| Error::MissingPackage(format!("Universal CRT package '{UCRT_ID}' not found")))?;
    let ucrt_payloads = &ucrt_items
        .first()
        .ok_or_else(|| Error::MissingPackage("Universal CRT package has no items".into()))?
        .payloads;
    for payload in ucrt_payloads.iter().filter(|p| p.file_name.ends_with(".cab")) {
        let p = sdk_payload(sdk_key, version, payload, PayloadType::CabFile, Architecture::All);
        insert(out, p.common.filename.clone(), SelectedPayload::Sdk(p));
    }

    Ok(())
}

/// Full SDK selection: headers, per-arch headers/libs, store libs, UCRT,
/// and every CAB from both the SDK and UCRT items (spec.md §4.6.4).
pub(crate) fn select_sdk(index: &PackageIndex, cfg: &Configuration) -> Result<super::Selection> {
    let (sdk_key, version) = discover_sdk_key(index, cfg)?;
    let payloads = sdk_payloads(index, &sdk_key)?;

    let mut out = super::Selection::new();
    select_headers(index, cfg, &sdk_key, &version, payloads, &mut out)?;
    select_libs(index, cfg, &sdk_key, &version, payloads, &mut out)?;
    select_cab_files(index, &sdk_key, &version, payloads, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_sdk_key() {
        assert_eq!(parse_sdk_key("Win11SDK_10.0.26100"), Some((11, "10.0.26100")));
        assert_eq!(parse_sdk_key("NotAnSdkKey"), None);
    }

    #[test]
    fn canonicalizes_non_cab_filename() {
        assert_eq!(
            canonical_filename(
                "Win11SDK_10.0.26100",
                "Installers\\Windows SDK Desktop Headers x64-x86_en-us.msi",
                PayloadType::SdkHeaders
            ),
            "win11sdk_10.0.26100_installers_windows_sdk_desktop_headers_x64-x86_en-us.msi"
        );
    }

    #[test]
    fn canonicalizes_cab_filename() {
        assert_eq!(
            canonical_filename(
                "Win11SDK_10.0.26100",
                "Installers\\foo.cab",
                PayloadType::CabFile
            ),
            "foo.cab"
        );
    }
}

//! End-to-end selector test over a hand-built installer manifest fixture,
//! covering the CRT/ATL/SDK/UCRT/CAB combinatorics of spec.md §4.6 and the
//! version-discovery properties of spec.md §8.

use wincrt_fetch::manifest::{Manifest, PackageIndex};
use wincrt_fetch::select::select;
use wincrt_fetch::{Architecture, ConfigurationBuilder, PayloadType, SelectedPayload, Variant};

fn load_index() -> PackageIndex {
    let raw = include_str!("fixtures/installer_manifest.json");
    let manifest: Manifest = serde_json::from_str(raw).expect("fixture must parse");
    PackageIndex::from_items(manifest.packages)
}

#[test]
fn selects_crt_atl_sdk_for_a_single_arch_variant() {
    let index = load_index();
    let cfg = ConfigurationBuilder::new()
        .cache_dir(wincrt_fetch::Path::new("/tmp/wincrt-selector-fixture-test"))
        .arch([Architecture::X86_64])
        .variant([Variant::Desktop])
        .include_atl(true)
        .build()
        .unwrap();

    let selection = select(&index, &cfg).expect("selection should succeed against the fixture");

    // 2 CRT (headers + x64/Desktop) + 2 ATL (headers + X64 lib) +
    // 5 SDK headers (4 fixed suffixes + 1 per-arch) + 3 SDK libs
    // (per-arch + store + UCRT) + 2 CAB files (SDK + UCRT).
    assert_eq!(selection.len(), 14);

    let by_id: std::collections::HashMap<_, _> = selection.iter().map(|(k, v)| (k.as_str(), v)).collect();

    let crt_headers = by_id
        .get("Microsoft.VC.14.44.17.14.CRT.Headers.base")
        .expect("CRT headers must be selected");
    assert_eq!(crt_headers.common().kind, PayloadType::CrtHeaders);
    assert_eq!(crt_headers.common().version, "14.44.17.14");

    let crt_lib = by_id
        .get("Microsoft.VC.14.44.17.14.CRT.x64.Desktop.base")
        .expect("CRT x64 Desktop lib must be selected");
    match crt_lib {
        SelectedPayload::Crt(p) => {
            assert_eq!(p.variant, Variant::Desktop);
            assert!(!p.spectre_hardened);
        }
        _ => panic!("expected a CRT payload"),
    }

    assert!(by_id.contains_key("Microsoft.VC.14.44.17.14.ATL.Headers.base"));
    assert!(by_id.contains_key("Microsoft.VC.14.44.17.14.ATL.X64.base"));

    let sdk_versions: Vec<_> = selection
        .iter()
        .filter(|(_, p)| matches!(p, SelectedPayload::Sdk(_)))
        .map(|(_, p)| p.common().version.as_str())
        .collect();
    assert!(sdk_versions.iter().all(|v| *v == "10.0.26100"));

    let cab_count = selection
        .iter()
        .filter(|(_, p)| p.common().kind == PayloadType::CabFile)
        .count();
    assert_eq!(cab_count, 2);

    let store_libs = selection
        .iter()
        .find(|(_, p)| p.common().kind == PayloadType::SdkStoreLibs)
        .expect("store libs must be selected");
    assert_eq!(store_libs.1.common().target_arch, Architecture::All);
}

#[test]
fn crt_version_can_be_pinned_to_an_available_value() {
    let index = load_index();
    let cfg = ConfigurationBuilder::new()
        .cache_dir(wincrt_fetch::Path::new("/tmp/wincrt-selector-fixture-test-pinned"))
        .arch([Architecture::X86_64])
        .variant([Variant::Desktop])
        .crt_version("14.44.17.14")
        .build()
        .unwrap();

    let selection = select(&index, &cfg).expect("selection should succeed with a pinned crt_version");
    assert!(selection
        .iter()
        .any(|(id, _)| id == "Microsoft.VC.14.44.17.14.CRT.Headers.base"));
}

#[test]
fn crt_version_pin_rejects_unavailable_value() {
    let index = load_index();
    let cfg = ConfigurationBuilder::new()
        .cache_dir(wincrt_fetch::Path::new("/tmp/wincrt-selector-fixture-test-bad-pin"))
        .arch([Architecture::X86_64])
        .variant([Variant::Desktop])
        .crt_version("99.99.99.99")
        .build()
        .unwrap();

    let err = select(&index, &cfg).unwrap_err();
    assert!(matches!(err, wincrt_fetch::Error::UnsupportedPackageConfiguration(_)));
}

#[test]
fn missing_architecture_payload_surfaces_as_unsupported_configuration() {
    let index = load_index();
    let cfg = ConfigurationBuilder::new()
        .cache_dir(wincrt_fetch::Path::new("/tmp/wincrt-selector-fixture-test-missing-arch"))
        .arch([Architecture::Aarch64])
        .variant([Variant::Desktop])
        .build()
        .unwrap();

    // The fixture only carries x64 CRT/SDK payloads; requesting arm64 must
    // fail with a typed, matchable error rather than panicking.
    let err = select(&index, &cfg).unwrap_err();
    assert!(matches!(err, wincrt_fetch::Error::UnsupportedPackageConfiguration(_)));
}

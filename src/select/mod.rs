//! Package selector (C6): the combinatorial core. Resolves CRT, ATL, SDK,
//! UCRT and CAB payloads out of a [`PackageIndex`] given a [`Configuration`].
//! Split into `crt` (§4.6.1/§4.6.2) and `sdk` (§4.6.3/§4.6.4), mirroring the
//! original's own `win_crt.py`/`win_sdk.py` module split.

mod crt;
mod sdk;

use crate::manifest::PackageIndex;
use crate::{Configuration, SelectedPayload};

/// Insertion-ordered mapping from package id to the payload selected for
/// it. Later entries with duplicate keys win (spec.md §4.6's "set-union
/// semantics over keys with right-bias").
pub type Selection = Vec<(String, SelectedPayload)>;

/// Runs the full selector: CRT headers/libs, optional ATL, and the full SDK
/// (headers, arch headers/libs, store libs, UCRT, CAB files).
pub fn select(index: &PackageIndex, cfg: &Configuration) -> crate::Result<Selection> {
    let mut out = Selection::new();
    out.extend(crt::select_crt(index, cfg)?);
    if cfg.include_atl {
        out.extend(crt::select_atl(index, cfg)?);
    }
    out.extend(sdk::select_sdk(index, cfg)?);
    Ok(out)
}

/// Inserts `(id, payload)` into `out`, overwriting any existing entry for
/// the same id (spec.md's right-bias duplicate-key rule) while keeping
/// insertion order for new keys.
pub(crate) fn insert(out: &mut Selection, id: String, payload: SelectedPayload) {
    if let Some(slot) = out.iter_mut().find(|(k, _)| *k == id) {
        slot.1 = payload;
    } else {
        out.push((id, payload));
    }
}

/// Infer the target architecture from a package id via substring check, in
/// the fixed `arm64 -> arm -> x64 -> x86` order spec.md §4.6.2 requires.
/// Headers default to `crate::Architecture::All`.
pub(crate) fn infer_arch_from_id(id: &str, is_header: bool) -> Option<crate::Architecture> {
    use crate::Architecture::*;
    let lower = id.to_ascii_lowercase();
    if lower.contains("arm64") {
        Some(Aarch64)
    } else if lower.contains("arm") {
        Some(Aarch)
    } else if lower.contains("x64") {
        Some(X86_64)
    } else if lower.contains("x86") {
        Some(X86)
    } else if is_header {
        Some(All)
    } else {
        None
    }
}

pub(crate) fn first_item<'a>(
    index: &'a PackageIndex,
    id: &str,
) -> crate::Result<&'a crate::manifest::ManifestItem> {
    index
        .first(id)
        .ok_or_else(|| crate::Error::UnsupportedPackageConfiguration(id.to_string()))
}

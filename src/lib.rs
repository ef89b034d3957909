//! Acquires the MSVC CRT, optional ATL, and Windows SDK payloads from
//! Microsoft's public distribution channels and reshapes them into a flat
//! cross-compilation sysroot, without running the Visual Studio Installer.
//!
//! The pipeline (see [`pipeline`]) is: fetch the channel manifest, fetch the
//! installer manifest it points to, run the [`select`] combinatorial
//! package selector over [`Configuration`], download the selected payloads
//! (`download`), extract them (`archive`), and reduce the extract trees into
//! a merged sysroot (`reduce`).

pub use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use std::fmt;

pub mod archive;
mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod loader;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod reduce;
pub mod select;
pub mod util;

pub use config::{Configuration, ConfigurationBuilder};
pub use error::{Error, Result};
pub use progress::{NullProgress, ProgressSink};

/// Target CPU architecture. Three string projections exist because the
/// manifest uses different casing conventions for CRT ids, ATL ids, and the
/// Microsoft-canonical form used everywhere else (SDK filenames, CLI flags).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Architecture {
    X86 = 0x1,
    X86_64 = 0x2,
    Aarch = 0x4,
    Aarch64 = 0x8,
    All = 0x10,
}

impl std::str::FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "x86" => Self::X86,
            "x86_64" => Self::X86_64,
            "aarch" => Self::Aarch,
            "aarch64" => Self::Aarch64,
            "all" => Self::All,
            o => return Err(Error::InvalidInputData(format!("unknown architecture '{o}'"))),
        })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Architecture {
    /// The canonical identifier used in CLI flags and internal matching.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Aarch => "aarch",
            Self::Aarch64 => "aarch64",
            Self::All => "all",
        }
    }

    /// Microsoft canonical form, used in SDK filenames and package ids.
    #[inline]
    pub fn as_ms_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x64",
            Self::Aarch => "arm",
            Self::Aarch64 => "arm64",
            Self::All => "all",
        }
    }

    /// CRT package-id identifier: same as the MS form, except AArch64 is
    /// uppercased (`ARM64`) — the only arch with non-lowercase CRT ids.
    #[inline]
    pub fn as_crt_str(&self) -> &'static str {
        match self {
            Self::Aarch64 => "ARM64",
            other => other.as_ms_str(),
        }
    }

    /// ATL package-id identifier: the Microsoft-canonical form, uppercased.
    pub fn as_atl_str(&self) -> String {
        self.as_ms_str().to_ascii_uppercase()
    }
}

/// Windows variant targeted by a CRT/ATL selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variant {
    Desktop = 0x1,
    OneCore = 0x2,
    Store = 0x4,
    All = 0x8,
}

impl std::str::FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "desktop" => Self::Desktop,
            "onecore" => Self::OneCore,
            "store" => Self::Store,
            "all" => Self::All,
            o => return Err(Error::InvalidInputData(format!("unknown variant '{o}'"))),
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::OneCore => "onecore",
            Self::Store => "store",
            Self::All => "all",
        }
    }

    /// The serialized form embedded in CRT package ids.
    pub fn as_package_str(&self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::OneCore => "OneCore.Desktop",
            Self::Store => "Store",
            Self::All => unreachable!("All must be expanded before package-id construction"),
        }
    }

    /// `[All]` expands to the three concrete variants, in this fixed order
    /// (spec.md §4.6.2/§8's "Variant expansion" property depends on this
    /// order being stable, even though selection itself is a set).
    pub fn expand_all() -> [Self; 3] {
        [Self::Desktop, Self::OneCore, Self::Store]
    }

    /// Infer a variant from a package id via substring match. OneCore must
    /// be tested before Desktop because OneCore ids also contain "Desktop"
    /// (e.g. `OneCore.Desktop`).
    pub fn infer_from_id(id: &str) -> Option<Self> {
        if id.contains("OneCore") {
            Some(Self::OneCore)
        } else if id.contains("Desktop") {
            Some(Self::Desktop)
        } else if id.contains("Store") {
            Some(Self::Store)
        } else {
            None
        }
    }
}

/// Visual Studio distribution channel. Legal values depend on
/// `manifest_version`: `>=18` requires `stable|insiders`; `<=17` requires
/// `release|pre`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Pre,
    Release,
    Insiders,
}

impl std::str::FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "stable" => Self::Stable,
            "pre" => Self::Pre,
            "release" => Self::Release,
            "insiders" => Self::Insiders,
            o => return Err(Error::InvalidInputData(format!("unknown channel '{o}'"))),
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Pre => "pre",
            Self::Release => "release",
            Self::Insiders => "insiders",
        }
    }

    /// `manifest_version >= 18` requires `stable|insiders`; `<= 17`
    /// requires `release|pre`. Returns `false` (channel gating failure)
    /// when the combination is illegal.
    pub fn is_legal_for(&self, manifest_version: u32) -> bool {
        let modern = matches!(self, Self::Stable | Self::Insiders);
        let legacy = matches!(self, Self::Release | Self::Pre);
        if manifest_version >= 18 {
            modern
        } else {
            legacy
        }
    }
}

/// The distribution category of a selected payload, generalized from
/// `xwin::PayloadKind` with a `CabFile` variant added for the SDK/UCRT CAB
/// side-files that accompany their owning MSI.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PayloadType {
    AtlHeaders,
    AtlLibs,
    CrtHeaders,
    CrtLibs,
    SdkHeaders,
    SdkLibs,
    SdkStoreLibs,
    Ucrt,
    VcrDebug,
    CabFile,
}

/// Fields common to every selected payload, regardless of whether it came
/// from the CRT or SDK selection path.
#[derive(Debug, Clone)]
pub struct PayloadCommon {
    pub filename: String,
    pub kind: PayloadType,
    pub sha256: util::Sha256,
    pub size: u64,
    pub target_arch: Architecture,
    pub url: String,
    pub version: String,
    pub install_size: Option<u64>,
}

/// A selected CRT or ATL payload. Kept as a distinct type from
/// [`SDKPayload`] (rather than `xwin`'s single `Payload`) because the CRT
/// path carries fields the SDK path never needs.
#[derive(Debug, Clone)]
pub struct CRTPayload {
    pub common: PayloadCommon,
    pub variant: Variant,
    pub spectre_hardened: bool,
}

/// A selected SDK, UCRT, or CAB payload.
#[derive(Debug, Clone)]
pub struct SDKPayload {
    pub common: PayloadCommon,
}

/// Either shape of selected payload, as produced by the package selector
/// ([`select`]) and consumed by the downloader / extractor.
#[derive(Debug, Clone)]
pub enum SelectedPayload {
    Crt(CRTPayload),
    Sdk(SDKPayload),
}

impl SelectedPayload {
    pub fn common(&self) -> &PayloadCommon {
        match self {
            Self::Crt(p) => &p.common,
            Self::Sdk(p) => &p.common,
        }
    }

    /// Suggested on-disk path relative to `cache_dir/downloads`, per
    /// spec.md §3: `<CRT_{version}|SDK_{version}>/<filename>`.
    pub fn suggested_filepath(&self, version_dir: &str) -> PathBuf {
        PathBuf::from(version_dir).join(&self.common().filename)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn architecture_projections() {
        assert_eq!(Architecture::X86_64.as_str(), "x86_64");
        assert_eq!(Architecture::X86_64.as_ms_str(), "x64");
        assert_eq!(Architecture::X86_64.as_crt_str(), "x64");
        assert_eq!(Architecture::Aarch64.as_crt_str(), "ARM64");
        assert_eq!(Architecture::X86_64.as_atl_str(), "X64");
    }

    #[test]
    fn variant_expansion_order() {
        let expanded = Variant::expand_all();
        assert_eq!(expanded, [Variant::Desktop, Variant::OneCore, Variant::Store]);
    }

    #[test]
    fn variant_infers_onecore_before_desktop() {
        assert_eq!(
            Variant::infer_from_id("Microsoft.VC.14.44.17.14.CRT.x64.OneCore.Desktop.base"),
            Some(Variant::OneCore)
        );
        assert_eq!(
            Variant::infer_from_id("Microsoft.VC.14.44.17.14.CRT.x64.Desktop.base"),
            Some(Variant::Desktop)
        );
    }

    #[test]
    fn channel_gating() {
        assert!(Channel::Stable.is_legal_for(18));
        assert!(!Channel::Release.is_legal_for(18));
        assert!(Channel::Release.is_legal_for(17));
        assert!(!Channel::Stable.is_legal_for(17));
    }
}

//! `Configuration` (C9): the validated options object every later stage
//! consumes. Constructed once per run and frozen before the pipeline
//! starts (spec.md §3's lifecycle note).

use crate::{Architecture, Channel, Error, Path, PathBuf, Result, Variant};
use std::collections::BTreeSet;

/// Platform-standard cache root, `<platform cache dir>/msvcrt`, mirroring
/// Python's `platformdirs.user_cache_path("pyxwin", "pyxwin") / "msvcrt"`
/// default the distilled tool's original source used
/// (`examples/original_source/.../manifest_datatypes.py`).
fn default_cache_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "pyxwin").ok_or_else(|| {
        Error::InvalidInputData("could not resolve a platform cache directory".into())
    })?;
    PathBuf::from_path_buf(dirs.cache_dir().join("msvcrt"))
        .map_err(|p| Error::InvalidInputData(format!("cache dir {} is not utf-8", p.display())))
}

/// Validated, per-run options consumed by C5 through C8. See spec.md §3.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Skips the remote channel-manifest fetch when set.
    pub channel_manifest_path: Option<PathBuf>,
    pub manifest_version: u32,
    pub channel: Channel,
    pub arch: BTreeSet<Architecture>,
    pub variant: BTreeSet<Variant>,
    pub cache_dir: PathBuf,
    pub crt_version: Option<String>,
    pub sdk_version: Option<String>,
    pub include_atl: bool,
    pub include_spectre: bool,
}

/// Builder mirroring the CLI flags of spec.md §6, one field per flag.
/// Defaults match the documented CLI defaults (`manifest_version=18`,
/// `channel=stable`, `arch=[x86_64]`, `variant=[Desktop]`).
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    channel_manifest_path: Option<PathBuf>,
    manifest_version: Option<u32>,
    channel: Option<Channel>,
    arch: BTreeSet<Architecture>,
    variant: BTreeSet<Variant>,
    cache_dir: Option<PathBuf>,
    crt_version: Option<String>,
    sdk_version: Option<String>,
    include_atl: bool,
    include_spectre: bool,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.channel_manifest_path = Some(path.into());
        self
    }

    pub fn manifest_version(mut self, version: u32) -> Self {
        self.manifest_version = Some(version);
        self
    }

    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn arch(mut self, arch: impl IntoIterator<Item = Architecture>) -> Self {
        self.arch.extend(arch);
        self
    }

    pub fn variant(mut self, variant: impl IntoIterator<Item = Variant>) -> Self {
        self.variant.extend(variant);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn crt_version(mut self, version: impl Into<String>) -> Self {
        self.crt_version = Some(version.into());
        self
    }

    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    pub fn include_atl(mut self, include: bool) -> Self {
        self.include_atl = include;
        self
    }

    pub fn include_spectre(mut self, include: bool) -> Self {
        self.include_spectre = include;
        self
    }

    /// Validates and freezes the configuration. Fails if `crt_version` or
    /// `sdk_version` don't match their required shapes, or a cache dir
    /// couldn't be resolved.
    pub fn build(self) -> Result<Configuration> {
        if let Some(crt) = &self.crt_version {
            validate_crt_version(crt)?;
        }
        if let Some(sdk) = &self.sdk_version {
            validate_sdk_version(sdk)?;
        }

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };

        let arch = if self.arch.is_empty() {
            BTreeSet::from([Architecture::X86_64])
        } else {
            self.arch
        };
        let variant = if self.variant.is_empty() {
            BTreeSet::from([Variant::Desktop])
        } else {
            self.variant
        };

        Ok(Configuration {
            channel_manifest_path: self.channel_manifest_path,
            manifest_version: self.manifest_version.unwrap_or(18),
            channel: self.channel.unwrap_or(Channel::Stable),
            arch,
            variant,
            cache_dir,
            crt_version: self.crt_version,
            sdk_version: self.sdk_version,
            include_atl: self.include_atl,
            include_spectre: self.include_spectre,
        })
    }
}

fn validate_crt_version(v: &str) -> Result<()> {
    let parts: Vec<_> = v.split('.').collect();
    if parts.len() == 4 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
        Ok(())
    } else {
        Err(Error::InvalidInputData(format!(
            "crt_version '{v}' does not match N.N.N.N"
        )))
    }
}

fn validate_sdk_version(v: &str) -> Result<()> {
    let rest = v
        .strip_prefix("Win")
        .and_then(|r| r.split_once("SDK_"))
        .map(|(w, ver)| (w, ver));
    match rest {
        Some((w, ver)) if !w.is_empty() && w.bytes().all(|b| b.is_ascii_digit()) => {
            let parts: Vec<_> = ver.split('.').collect();
            if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
                Ok(())
            } else {
                Err(Error::InvalidInputData(format!(
                    "sdk_version '{v}' does not match Win\\d+SDK_\\d+.\\d+.\\d+"
                )))
            }
        }
        _ => Err(Error::InvalidInputData(format!(
            "sdk_version '{v}' does not match Win\\d+SDK_\\d+.\\d+.\\d+"
        ))),
    }
}

impl Configuration {
    /// Expands `variant` to its concrete form: `[All]` becomes the three
    /// concrete variants, otherwise the set is returned unchanged.
    pub fn expanded_variants(&self) -> BTreeSet<Variant> {
        if self.variant.contains(&Variant::All) {
            Variant::expand_all().into_iter().collect()
        } else {
            self.variant.clone()
        }
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.cache_dir
            .join(format!("manifest_{}", self.manifest_version))
            .join(self.channel.as_str())
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    pub fn unpack_dir(&self) -> PathBuf {
        self.cache_dir.join("unpack")
    }

    pub fn reduced_dir(&self) -> PathBuf {
        self.cache_dir.join("reduced")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_malformed_crt_version() {
        assert!(validate_crt_version("99.0.0").is_err());
        assert!(validate_crt_version("14.44.17.14").is_ok());
    }

    #[test]
    fn rejects_malformed_sdk_version() {
        assert!(validate_sdk_version("10.0.26100").is_err());
        assert!(validate_sdk_version("Win11SDK_10.0.26100").is_ok());
    }

    #[test]
    fn defaults_match_cli_docs() {
        let cfg = ConfigurationBuilder::new()
            .cache_dir(Path::new("/tmp/wincrt-test"))
            .build()
            .unwrap();
        assert_eq!(cfg.manifest_version, 18);
        assert_eq!(cfg.channel, Channel::Stable);
        assert_eq!(cfg.arch, BTreeSet::from([Architecture::X86_64]));
        assert_eq!(cfg.variant, BTreeSet::from([Variant::Desktop]));
    }
}

//! Manifest loader (C5): cache-first fetch of the channel manifest and the
//! installer manifest it points to. Grounded in
//! `examples/original_source/.../vs_manifest.py`'s `_fetch_channel_manifest`/
//! `load_installer_manifest`.
//!
//! Per REDESIGN FLAGS §5 this does not re-persist the manifest on a cache
//! hit (the original rewrites the file even when unchanged; harmless but
//! wasteful, and dropped here).

use crate::manifest::{ItemType, Manifest, PackageIndex};
use crate::{Configuration, Error, Result};

/// Loads the top-level channel manifest: local file if
/// `cfg.channel_manifest_path` is set, else cache-first fetch from
/// `https://aka.ms/vs/{version}/{channel}/channel`.
pub fn load_channel_manifest(agent: &ureq::Agent, cfg: &Configuration) -> Result<Manifest> {
    if let Some(path) = &cfg.channel_manifest_path {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path.clone(), e))?;
        return parse_manifest(&text);
    }

    let dest = cfg.manifest_dir().join("vs_channel_manifest.json");
    if dest.exists() {
        let text = std::fs::read_to_string(&dest).map_err(|e| Error::io(dest.clone(), e))?;
        return parse_manifest(&text);
    }

    let url = channel_manifest_url(cfg.manifest_version, cfg.channel.as_str());
    let text = crate::http::fetch_text(agent, &url)?;
    persist(&dest, &text)?;
    parse_manifest(&text)
}

/// Builds `https://aka.ms/vs/{version}/{channel}/channel`, URL-encoding the
/// version and channel segments (spec.md §8 scenario 6).
pub fn channel_manifest_url(version: u32, channel: &str) -> String {
    format!(
        "https://aka.ms/vs/{}/{}/channel",
        urlencode(&version.to_string()),
        urlencode(channel)
    )
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Resolves and loads the second-level installer manifest referenced by the
/// channel manifest: the first `channel_items` entry of type `Manifest`.
/// Microsoft's sha256 for this item is known-unreliable and deliberately
/// not verified (spec.md §4.5).
pub fn load_installer_manifest(
    agent: &ureq::Agent,
    channel_manifest: &Manifest,
    cfg: &Configuration,
) -> Result<PackageIndex> {
    let manifest_item = channel_manifest
        .channel_items
        .iter()
        .find(|item| item.typ == ItemType::Manifest)
        .ok_or_else(|| {
            Error::MalformedJson("channel manifest has no item of type 'Manifest'".into())
        })?;

    let payload = manifest_item.payloads.first().ok_or_else(|| {
        Error::MalformedJson(format!(
            "installer manifest item '{}' has no payloads",
            manifest_item.id
        ))
    })?;

    let dest = cfg.manifest_dir().join("vs_installer_manifest.json");
    let text = if dest.exists() {
        std::fs::read_to_string(&dest).map_err(|e| Error::io(dest.clone(), e))?
    } else {
        let text = crate::http::fetch_text(agent, &payload.url)?;
        persist(&dest, &text)?;
        text
    };

    let manifest = parse_manifest(&text)?;
    Ok(PackageIndex::from_items(manifest.packages))
}

fn parse_manifest(text: &str) -> Result<Manifest> {
    serde_json::from_str(text).map_err(|e| Error::MalformedJson(e.to_string()))
}

fn persist(dest: &crate::PathBuf, text: &str) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent.to_path_buf(), e))?;
    }
    std::fs::write(dest, text).map_err(|e| Error::io(dest.clone(), e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_manifest_url_matches_scenario() {
        assert_eq!(
            channel_manifest_url(17, "release"),
            "https://aka.ms/vs/17/release/channel"
        );
    }

    #[test]
    fn rejects_manifest_without_manifest_item() {
        let manifest = Manifest {
            channel_items: vec![],
            packages: vec![],
        };
        let cfg = crate::config::ConfigurationBuilder::new()
            .cache_dir(crate::Path::new("/tmp/wincrt-loader-test"))
            .build()
            .unwrap();
        let agent = ureq::Agent::new();
        let err = load_installer_manifest(&agent, &manifest, &cfg).unwrap_err();
        assert!(matches!(err, Error::MalformedJson(_)));
    }
}

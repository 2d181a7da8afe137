//! Bank manifests: a TOML file naming a set of sounds loaded as a unit.
//!
//! ```toml
//! name = "ui"
//!
//! [sounds]
//! click = "click.wav"
//! open = "menus/open.ogg"
//! ```
//!
//! Sound paths are relative to the manifest's directory.

use crate::BackendError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed bank manifest with paths resolved against its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankManifest {
    /// Optional display name.
    pub name: Option<String>,
    /// Entry name to resolved sound path, in name order.
    pub sounds: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sounds: BTreeMap<String, PathBuf>,
}

impl BankManifest {
    /// Read and parse the manifest at `path`.
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let contents = fs::read_to_string(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&contents, base).map_err(|message| BackendError::BankManifest {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse manifest text, resolving relative entries against `base`.
    pub fn parse(contents: &str, base: &Path) -> Result<Self, String> {
        let raw: RawManifest = toml::from_str(contents).map_err(|e| e.to_string())?;
        if raw.sounds.is_empty() {
            return Err("bank declares no sounds".to_string());
        }
        let sounds = raw
            .sounds
            .into_iter()
            .map(|(entry, path)| {
                let resolved = if path.is_absolute() {
                    path
                } else {
                    base.join(path)
                };
                (entry, resolved)
            })
            .collect();
        Ok(Self {
            name: raw.name,
            sounds,
        })
    }

    /// Entry names in order.
    pub fn entries(&self) -> Vec<String> {
        self.sounds.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_manifest_dir() {
        let manifest = BankManifest::parse(
            "name = \"ui\"\n[sounds]\nclick = \"click.wav\"\nopen = \"menus/open.ogg\"\n",
            Path::new("assets/banks"),
        )
        .expect("parse");
        assert_eq!(manifest.name.as_deref(), Some("ui"));
        assert_eq!(
            manifest.sounds.get("open"),
            Some(&PathBuf::from("assets/banks/menus/open.ogg"))
        );
        assert_eq!(manifest.entries(), vec!["click".to_string(), "open".to_string()]);
    }

    #[test]
    fn empty_bank_is_rejected() {
        let err = BankManifest::parse("name = \"nothing\"\n", Path::new("")).unwrap_err();
        assert!(err.contains("no sounds"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BankManifest::parse("volume = 3\n[sounds]\na = \"a.wav\"\n", Path::new("")).is_err());
    }

    #[test]
    fn missing_file_maps_to_io_error() {
        let err = BankManifest::from_file(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, BackendError::Io { .. }));
    }
}

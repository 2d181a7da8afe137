//! Engine configuration loaded from TOML.

use crate::{AudioError, AudioSettings, BackendConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// What `play_sound` does when the key already has a running loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopReplayPolicy {
    /// Stop the running loop, then start the new one.
    #[default]
    Restart,
    /// Leave the running loop alone and return an error.
    Reject,
}

/// Facade configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Game units per meter. Feet would be 3.28, centimeters 100.
    pub distance_factor: f32,
    /// Maximum number of concurrently playing channels.
    pub max_channels: usize,
    /// Distance between the listener's ears, in meters.
    pub ear_spacing: f32,
    /// Behavior when replaying a key that is already looping.
    pub loop_replay: LoopReplayPolicy,
    /// Volume settings.
    pub settings: AudioSettings,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            distance_factor: 1.0,
            max_channels: 1024,
            ear_spacing: 0.2,
            loop_replay: LoopReplayPolicy::Restart,
            settings: AudioSettings::default(),
        }
    }
}

impl AudioConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, AudioError> {
        let cfg: AudioConfig =
            toml::from_str(contents).map_err(|e| AudioError::Config(e.to_string()))?;
        Ok(cfg.sanitized())
    }

    /// Load configuration from `path`, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save configuration to `path`.
    pub fn save_to_path(&self, path: &Path) -> Result<(), AudioError> {
        let toml = toml::to_string_pretty(self).map_err(|e| AudioError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AudioError::Config(e.to_string()))?;
        }
        fs::write(path, toml).map_err(|e| AudioError::Config(e.to_string()))
    }

    /// Clamp values the backend cannot work with.
    pub fn sanitized(mut self) -> Self {
        if !(self.distance_factor.is_finite() && self.distance_factor > 0.0) {
            warn!(
                distance_factor = self.distance_factor,
                "distance_factor must be positive, using 1.0"
            );
            self.distance_factor = 1.0;
        }
        self.max_channels = self.max_channels.max(1);
        if !(self.ear_spacing.is_finite() && self.ear_spacing >= 0.0) {
            self.ear_spacing = 0.2;
        }
        self.settings.set_master(self.settings.master_volume);
        self
    }

    /// Backend-facing subset.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            distance_factor: self.distance_factor,
            max_channels: self.max_channels,
            ear_spacing: self.ear_spacing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = AudioConfig::from_toml_str("distance_factor = 3.28\nloop_replay = \"reject\"\n")
            .expect("parse");
        assert_eq!(cfg.distance_factor, 3.28);
        assert_eq!(cfg.loop_replay, LoopReplayPolicy::Reject);
        assert_eq!(cfg.max_channels, 1024);
        assert_eq!(cfg.settings, AudioSettings::default());
    }

    #[test]
    fn nested_settings_parse() {
        let cfg = AudioConfig::from_toml_str("[settings]\nmaster_volume = 0.25\nmuted = true\n")
            .expect("parse");
        assert_eq!(cfg.settings.master_volume, 0.25);
        assert!(cfg.settings.muted);
    }

    #[test]
    fn invalid_values_are_sanitized() {
        let cfg = AudioConfig::from_toml_str(
            "distance_factor = -2.0\nmax_channels = 0\n[settings]\nmaster_volume = 4.0\n",
        )
        .expect("parse");
        assert_eq!(cfg.distance_factor, 1.0);
        assert_eq!(cfg.max_channels, 1);
        assert_eq!(cfg.settings.master_volume, 1.0);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = AudioConfig::from_toml_str("max_channels = \"many\"").unwrap_err();
        assert!(matches!(err, AudioError::Config(_)));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/audio.toml");
        let cfg = AudioConfig {
            distance_factor: 100.0,
            max_channels: 32,
            ..Default::default()
        };
        cfg.save_to_path(&path).expect("save");
        assert_eq!(AudioConfig::load_from_path(&path), cfg);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AudioConfig::load_from_path(Path::new("definitely/missing/audio.toml"));
        assert_eq!(cfg, AudioConfig::default());
    }
}

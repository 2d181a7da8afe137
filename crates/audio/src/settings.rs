//! Audio settings and volume controls.

use serde::{Deserialize, Serialize};

/// Global volume settings applied on top of each sound's own volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master volume (0.0 to 1.0)
    pub master_volume: f32,
    /// Whether audio is muted
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            muted: false,
        }
    }
}

impl AudioSettings {
    /// Create new audio settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective master gain (0.0 when muted).
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume
        }
    }

    /// Scale a per-sound volume by the master gain.
    pub fn apply(&self, sound_volume: f32) -> f32 {
        sound_volume.clamp(0.0, 1.0) * self.effective_volume()
    }

    /// Toggle mute state.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Set master volume (clamped to 0.0-1.0).
    pub fn set_master(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AudioSettings::default();
        assert_eq!(settings.master_volume, 1.0);
        assert!(!settings.muted);
    }

    #[test]
    fn test_apply_scales_sound_volume() {
        let settings = AudioSettings {
            master_volume: 0.5,
            ..Default::default()
        };
        assert!((settings.apply(0.8) - 0.4).abs() < 0.001);
        assert!((settings.apply(3.0) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_mute() {
        let mut settings = AudioSettings::default();
        settings.toggle_mute();
        assert_eq!(settings.effective_volume(), 0.0);
        assert_eq!(settings.apply(1.0), 0.0);

        settings.toggle_mute();
        assert!(settings.effective_volume() > 0.0);
    }

    #[test]
    fn test_volume_clamping() {
        let mut settings = AudioSettings::default();
        settings.set_master(1.5);
        assert_eq!(settings.master_volume, 1.0);

        settings.set_master(-0.5);
        assert_eq!(settings.master_volume, 0.0);
    }
}

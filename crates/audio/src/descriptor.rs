//! Sound descriptors passed into the facade.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a sound's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundSource {
    /// An audio file on disk (wav, ogg, flac).
    File(PathBuf),
    /// An entry inside a loaded bank.
    Bank {
        /// Key the bank was loaded under.
        bank: String,
        /// Entry name in the bank manifest.
        entry: String,
    },
}

/// Playback flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundMode {
    /// Loop until stopped (otherwise one-shot).
    pub looping: bool,
    /// Positional 3D playback (otherwise plain stereo).
    pub spatial: bool,
}

/// Identifies a sound to load, play, move or stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDescriptor {
    /// Unique cache key.
    pub key: String,
    /// File path or bank reference.
    pub source: SoundSource,
    /// Loop / 3D flags.
    pub mode: SoundMode,
    /// World position, used when `mode.spatial` is set.
    pub position: Vec3,
    /// Per-sound volume (0.0 to 1.0)
    pub volume: f32,
}

impl SoundDescriptor {
    /// Describe a one-shot 2D sound loaded from a file.
    pub fn file(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(key, SoundSource::File(path.into()))
    }

    /// Describe a one-shot 2D sound taken from a loaded bank.
    pub fn from_bank(
        key: impl Into<String>,
        bank: impl Into<String>,
        entry: impl Into<String>,
    ) -> Self {
        Self::new(
            key,
            SoundSource::Bank {
                bank: bank.into(),
                entry: entry.into(),
            },
        )
    }

    fn new(key: impl Into<String>, source: SoundSource) -> Self {
        Self {
            key: key.into(),
            source,
            mode: SoundMode::default(),
            position: Vec3::ZERO,
            volume: 1.0,
        }
    }

    /// Mark the sound as looping.
    pub fn looping(mut self) -> Self {
        self.mode.looping = true;
        self
    }

    /// Mark the sound as positional, starting at `position`.
    pub fn spatial_at(mut self, position: Vec3) -> Self {
        self.mode.spatial = true;
        self.position = position;
        self
    }

    /// Set the per-sound volume (clamped to 0.0-1.0).
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.set_volume(volume);
        self
    }

    /// Set the per-sound volume in place (clamped to 0.0-1.0).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Move the sound. Call [`crate::AudioEngine::update_3d_position`] afterwards
    /// to forward the new position to a playing loop.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Whether this sound loops.
    pub fn is_looping(&self) -> bool {
        self.mode.looping
    }

    /// Whether this sound is positional.
    pub fn is_spatial(&self) -> bool {
        self.mode.spatial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_descriptor_defaults_to_one_shot_2d() {
        let d = SoundDescriptor::file("footstep", "footstep.wav");
        assert_eq!(d.key, "footstep");
        assert_eq!(d.source, SoundSource::File(PathBuf::from("footstep.wav")));
        assert!(!d.is_looping());
        assert!(!d.is_spatial());
        assert_eq!(d.volume, 1.0);
    }

    #[test]
    fn builders_set_flags_and_position() {
        let d = SoundDescriptor::from_bank("wind", "ambience", "wind_loop")
            .looping()
            .spatial_at(Vec3::new(1.0, 2.0, 3.0))
            .with_volume(1.7);
        assert!(d.is_looping());
        assert!(d.is_spatial());
        assert_eq!(d.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(d.volume, 1.0);
        assert!(matches!(
            d.source,
            SoundSource::Bank { ref bank, ref entry } if bank == "ambience" && entry == "wind_loop"
        ));
    }
}

//! Audio backend seam.
//!
//! The facade talks to the audio middleware only through [`AudioBackend`]:
//! system lifecycle, sound resources, playback channels, banks, and 3D
//! attributes. Handles are plain value types; the backend owns whatever
//! they refer to.

mod null;
#[cfg(feature = "rodio_backend")]
mod rodio_backend;

pub use crate::error::BackendError;
pub use null::NullBackend;
#[cfg(feature = "rodio_backend")]
pub use rodio_backend::RodioBackend;

use crate::{ListenerPose, SoundMode};
use glam::Vec3;
use std::path::Path;
use std::time::Duration;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a backend-assigned id.
            pub const fn from_raw(id: u32) -> Self {
                Self(id)
            }

            /// Backend-assigned id.
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// A loaded sound resource.
    SoundHandle
);
handle_type!(
    /// A live playback channel.
    ChannelHandle
);
handle_type!(
    /// A loaded sound bank.
    BankHandle
);

/// Hands out increasing ids for one handle kind.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub(crate) fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Settings passed to [`AudioBackend::initialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Game units per meter.
    pub distance_factor: f32,
    /// Maximum number of concurrently playing channels.
    pub max_channels: usize,
    /// Distance between the listener's ears, in meters.
    pub ear_spacing: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            distance_factor: 1.0,
            max_channels: 1024,
            ear_spacing: 0.2,
        }
    }
}

/// How a channel should be started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayParams {
    /// Repeat until stopped.
    pub looping: bool,
    /// Positional playback at `position`.
    pub spatial: bool,
    /// Emitter position in world units.
    pub position: Vec3,
    /// Channel volume (already scaled by master settings).
    pub volume: f32,
}

/// Audio middleware consumed by [`crate::AudioEngine`].
///
/// Calls arrive from a single thread. Implementations must tolerate
/// `shutdown` being called more than once.
pub trait AudioBackend {
    /// Open the output device and apply global settings.
    fn initialize(&mut self, config: &BackendConfig) -> Result<(), BackendError>;

    /// Release every resource and close the device.
    fn shutdown(&mut self);

    /// Check if the backend is initialized.
    fn is_initialized(&self) -> bool;

    /// Per-frame bookkeeping (reclaim finished channels, refill streams).
    fn update(&mut self) -> Result<(), BackendError>;

    /// Prepare a sound from a file.
    fn create_sound(&mut self, path: &Path, mode: SoundMode) -> Result<SoundHandle, BackendError>;

    /// Prepare a sound from an entry of a loaded bank.
    fn create_bank_sound(
        &mut self,
        bank: BankHandle,
        entry: &str,
        mode: SoundMode,
    ) -> Result<SoundHandle, BackendError>;

    /// Free a sound. Channels already playing it may keep playing.
    fn release_sound(&mut self, sound: SoundHandle);

    /// Total length of a sound.
    fn sound_length(&self, sound: SoundHandle) -> Result<Duration, BackendError>;

    /// Start playing a sound on a new channel.
    fn play(&mut self, sound: SoundHandle, params: &PlayParams) -> Result<ChannelHandle, BackendError>;

    /// Stop a channel. Stopping an already finished channel succeeds.
    fn stop(&mut self, channel: ChannelHandle) -> Result<(), BackendError>;

    /// Whether a channel is still producing sound.
    fn is_playing(&self, channel: ChannelHandle) -> Result<bool, BackendError>;

    /// Set a channel's volume.
    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> Result<(), BackendError>;

    /// Move a positional channel.
    fn set_channel_position(&mut self, channel: ChannelHandle, position: Vec3) -> Result<(), BackendError>;

    /// Load a bank of sounds described by a manifest.
    fn load_bank(&mut self, path: &Path) -> Result<BankHandle, BackendError>;

    /// Unload a bank.
    fn unload_bank(&mut self, bank: BankHandle);

    /// Entry names of a loaded bank.
    fn bank_entries(&self, bank: BankHandle) -> Result<Vec<String>, BackendError>;

    /// Update the listener used for positional channels.
    fn set_listener(&mut self, pose: &ListenerPose) -> Result<(), BackendError>;
}

/// File extensions the bundled backends accept.
pub(crate) const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "ogg", "flac"];

/// Reject paths whose extension is not a supported format.
pub(crate) fn check_extension(path: &Path) -> Result<(), BackendError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    if supported {
        Ok(())
    } else {
        Err(BackendError::UnsupportedFormat(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(check_extension(Path::new("a/b/step.WAV")).is_ok());
        assert!(check_extension(Path::new("music.ogg")).is_ok());
        assert!(matches!(
            check_extension(Path::new("voice.mp3")),
            Err(BackendError::UnsupportedFormat(_))
        ));
        assert!(check_extension(Path::new("noext")).is_err());
    }

    #[test]
    fn allocator_hands_out_distinct_ids() {
        let mut ids = IdAllocator::default();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert_eq!(SoundHandle::from_raw(a).raw(), a);
    }
}

//! Audio facade for the bobo engine.
//!
//! Caches backend handles for sounds, looping channels and sound banks by
//! string key, and forwards playback, 3D positioning and listener updates to
//! an [`AudioBackend`]. Decoding, mixing and spatialization stay in the
//! backend.
//!
//! # Architecture
//!
//! - [`AudioEngine`] - Owns the caches and the listener; the engine-facing API
//! - [`SoundDescriptor`] - Identifies a sound to load, play or move
//! - [`AudioBackend`] - Seam to the audio middleware ([`NullBackend`], and
//!   `RodioBackend` with the `rodio_backend` feature)
//! - [`AudioConfig`] - Distance factor, channel budget, volume settings
//!
//! # Example
//!
//! ```no_run
//! use bobo_audio::{AudioConfig, AudioEngine, NullBackend, SoundDescriptor};
//!
//! let mut audio = AudioEngine::new(NullBackend::new(), AudioConfig::default());
//! audio.init()?;
//! let footstep = SoundDescriptor::file("footstep", "footstep.wav");
//! audio.load_sound(&footstep)?;
//! audio.play_sound(&footstep)?;
//! audio.update()?;
//! # Ok::<(), bobo_audio::AudioError>(())
//! ```

#![warn(missing_docs)]

pub mod backend;
mod config;
mod descriptor;
mod engine;
mod error;
mod listener;
mod manifest;
mod settings;

pub use backend::{
    AudioBackend, BackendConfig, BackendError, BankHandle, ChannelHandle, NullBackend,
    PlayParams, SoundHandle,
};
#[cfg(feature = "rodio_backend")]
pub use backend::RodioBackend;
pub use config::{AudioConfig, LoopReplayPolicy};
pub use descriptor::{SoundDescriptor, SoundMode, SoundSource};
pub use engine::AudioEngine;
pub use error::AudioError;
pub use listener::ListenerPose;
pub use manifest::BankManifest;
pub use settings::AudioSettings;

pub use glam::Vec3;

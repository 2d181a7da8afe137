//! Headless backend that tracks resources without producing sound.

use super::{
    check_extension, AudioBackend, BackendConfig, BackendError, BankHandle, ChannelHandle,
    IdAllocator, PlayParams, SoundHandle,
};
use crate::{BankManifest, ListenerPose, SoundMode};
use glam::Vec3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct NullChannel {
    looping: bool,
    position: Vec3,
    volume: f32,
}

/// Backend used for tests, CI and machines without an output device.
///
/// Sounds are validated (file exists, known extension) but never decoded.
/// One-shot channels count as playing until the next [`AudioBackend::update`];
/// looping channels play until stopped.
#[derive(Debug, Default)]
pub struct NullBackend {
    config: Option<BackendConfig>,
    sounds: HashMap<SoundHandle, PathBuf>,
    channels: HashMap<ChannelHandle, NullChannel>,
    banks: HashMap<BankHandle, BankManifest>,
    listener: ListenerPose,
    sound_ids: IdAllocator,
    channel_ids: IdAllocator,
    bank_ids: IdAllocator,
}

impl NullBackend {
    /// Create an uninitialized headless backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sounds.
    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of loaded banks.
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// Last position set on a channel.
    pub fn channel_position(&self, channel: ChannelHandle) -> Option<Vec3> {
        self.channels.get(&channel).map(|c| c.position)
    }

    /// Last volume set on a channel.
    pub fn channel_volume(&self, channel: ChannelHandle) -> Option<f32> {
        self.channels.get(&channel).map(|c| c.volume)
    }

    /// Listener pose last forwarded by the facade.
    pub fn listener(&self) -> &ListenerPose {
        &self.listener
    }

    fn ensure_initialized(&self) -> Result<&BackendConfig, BackendError> {
        self.config.as_ref().ok_or(BackendError::NotInitialized)
    }

    fn validate_file(path: &Path) -> Result<(), BackendError> {
        check_extension(path)?;
        std::fs::metadata(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn channel_mut(&mut self, channel: ChannelHandle) -> Result<&mut NullChannel, BackendError> {
        self.channels
            .get_mut(&channel)
            .ok_or(BackendError::InvalidHandle)
    }
}

impl AudioBackend for NullBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<(), BackendError> {
        if self.config.is_none() {
            debug!("Audio backend: null (no output)");
            self.config = Some(config.clone());
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.channels.clear();
        self.sounds.clear();
        self.banks.clear();
        self.config = None;
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn update(&mut self) -> Result<(), BackendError> {
        self.ensure_initialized()?;
        self.channels.retain(|_, channel| channel.looping);
        Ok(())
    }

    fn create_sound(&mut self, path: &Path, _mode: SoundMode) -> Result<SoundHandle, BackendError> {
        self.ensure_initialized()?;
        Self::validate_file(path)?;
        let handle = SoundHandle::from_raw(self.sound_ids.next());
        self.sounds.insert(handle, path.to_path_buf());
        Ok(handle)
    }

    fn create_bank_sound(
        &mut self,
        bank: BankHandle,
        entry: &str,
        _mode: SoundMode,
    ) -> Result<SoundHandle, BackendError> {
        self.ensure_initialized()?;
        let manifest = self.banks.get(&bank).ok_or(BackendError::InvalidHandle)?;
        let path = manifest
            .sounds
            .get(entry)
            .cloned()
            .ok_or_else(|| BackendError::UnknownBankEntry {
                entry: entry.to_string(),
            })?;
        let handle = SoundHandle::from_raw(self.sound_ids.next());
        self.sounds.insert(handle, path);
        Ok(handle)
    }

    fn release_sound(&mut self, sound: SoundHandle) {
        self.sounds.remove(&sound);
    }

    fn sound_length(&self, sound: SoundHandle) -> Result<Duration, BackendError> {
        // Nothing is decoded, so the length is unknown.
        self.sounds
            .get(&sound)
            .map(|_| Duration::ZERO)
            .ok_or(BackendError::InvalidHandle)
    }

    fn play(&mut self, sound: SoundHandle, params: &PlayParams) -> Result<ChannelHandle, BackendError> {
        let max = self.ensure_initialized()?.max_channels;
        if !self.sounds.contains_key(&sound) {
            return Err(BackendError::InvalidHandle);
        }
        if self.channels.len() >= max {
            return Err(BackendError::ChannelLimit { max });
        }
        let handle = ChannelHandle::from_raw(self.channel_ids.next());
        self.channels.insert(
            handle,
            NullChannel {
                looping: params.looping,
                position: params.position,
                volume: params.volume,
            },
        );
        Ok(handle)
    }

    fn stop(&mut self, channel: ChannelHandle) -> Result<(), BackendError> {
        self.channels.remove(&channel);
        Ok(())
    }

    fn is_playing(&self, channel: ChannelHandle) -> Result<bool, BackendError> {
        Ok(self.channels.contains_key(&channel))
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> Result<(), BackendError> {
        self.channel_mut(channel)?.volume = volume;
        Ok(())
    }

    fn set_channel_position(&mut self, channel: ChannelHandle, position: Vec3) -> Result<(), BackendError> {
        self.channel_mut(channel)?.position = position;
        Ok(())
    }

    fn load_bank(&mut self, path: &Path) -> Result<BankHandle, BackendError> {
        self.ensure_initialized()?;
        let manifest = BankManifest::from_file(path)?;
        for sound in manifest.sounds.values() {
            Self::validate_file(sound)?;
        }
        let handle = BankHandle::from_raw(self.bank_ids.next());
        self.banks.insert(handle, manifest);
        Ok(handle)
    }

    fn unload_bank(&mut self, bank: BankHandle) {
        self.banks.remove(&bank);
    }

    fn bank_entries(&self, bank: BankHandle) -> Result<Vec<String>, BackendError> {
        self.banks
            .get(&bank)
            .map(BankManifest::entries)
            .ok_or(BackendError::InvalidHandle)
    }

    fn set_listener(&mut self, pose: &ListenerPose) -> Result<(), BackendError> {
        self.listener = *pose;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn params(looping: bool) -> PlayParams {
        PlayParams {
            looping,
            spatial: false,
            position: Vec3::ZERO,
            volume: 1.0,
        }
    }

    fn initialized(max_channels: usize) -> NullBackend {
        let mut backend = NullBackend::new();
        backend
            .initialize(&BackendConfig {
                max_channels,
                ..Default::default()
            })
            .expect("init");
        backend
    }

    #[test]
    fn calls_before_initialize_fail() {
        let mut backend = NullBackend::new();
        assert!(!backend.is_initialized());
        assert!(matches!(
            backend.create_sound(Path::new("x.wav"), SoundMode::default()),
            Err(BackendError::NotInitialized)
        ));
        assert!(matches!(backend.update(), Err(BackendError::NotInitialized)));
    }

    #[test]
    fn missing_and_unsupported_files_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mp3 = dir.path().join("voice.mp3");
        fs::write(&mp3, b"ID3").expect("write");
        let mut backend = initialized(4);

        assert!(matches!(
            backend.create_sound(&mp3, SoundMode::default()),
            Err(BackendError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            backend.create_sound(&dir.path().join("gone.wav"), SoundMode::default()),
            Err(BackendError::Io { .. })
        ));
        assert_eq!(backend.sound_count(), 0);
    }

    #[test]
    fn one_shots_end_on_update_loops_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("step.wav");
        fs::write(&path, b"RIFF").expect("write");
        let mut backend = initialized(4);
        let sound = backend.create_sound(&path, SoundMode::default()).expect("sound");

        let once = backend.play(sound, &params(false)).expect("play");
        let looped = backend.play(sound, &params(true)).expect("play");
        assert!(backend.is_playing(once).unwrap());
        assert!(backend.is_playing(looped).unwrap());

        backend.update().expect("update");
        assert!(!backend.is_playing(once).unwrap());
        assert!(backend.is_playing(looped).unwrap());

        backend.stop(looped).expect("stop");
        assert!(!backend.is_playing(looped).unwrap());
        assert!(backend.stop(looped).is_ok());
    }

    #[test]
    fn channel_budget_is_enforced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hum.ogg");
        fs::write(&path, b"OggS").expect("write");
        let mut backend = initialized(1);
        let sound = backend.create_sound(&path, SoundMode::default()).expect("sound");

        backend.play(sound, &params(true)).expect("first");
        assert!(matches!(
            backend.play(sound, &params(true)),
            Err(BackendError::ChannelLimit { max: 1 })
        ));
    }

    #[test]
    fn bank_entries_resolve_to_sounds() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("click.wav"), b"RIFF").expect("write");
        let manifest = dir.path().join("ui.toml");
        fs::write(&manifest, "[sounds]\nclick = \"click.wav\"\n").expect("write");
        let mut backend = initialized(4);

        let bank = backend.load_bank(&manifest).expect("bank");
        assert_eq!(backend.bank_entries(bank).unwrap(), vec!["click".to_string()]);
        assert!(backend
            .create_bank_sound(bank, "click", SoundMode::default())
            .is_ok());
        assert!(matches!(
            backend.create_bank_sound(bank, "missing", SoundMode::default()),
            Err(BackendError::UnknownBankEntry { .. })
        ));

        backend.unload_bank(bank);
        assert!(backend.bank_entries(bank).is_err());
    }

    #[test]
    fn bank_with_missing_entry_fails_as_unit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = dir.path().join("broken.toml");
        fs::write(&manifest, "[sounds]\nghost = \"ghost.wav\"\n").expect("write");
        let mut backend = initialized(4);

        assert!(backend.load_bank(&manifest).is_err());
        assert_eq!(backend.bank_count(), 0);
    }
}

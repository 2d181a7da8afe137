//! Backend double that records every call and plays nothing.
//!
//! Unlike [`bobo_audio::NullBackend`], file paths are not checked and
//! one-shot channels never end on their own: tests decide when a channel
//! finishes with [`RecordingBackend::finish`] or
//! [`RecordingBackend::finish_one_shots`], then call `update`.

use bobo_audio::{
    AudioBackend, BackendConfig, BackendError, BankHandle, ChannelHandle, ListenerPose,
    PlayParams, SoundHandle, SoundMode, Vec3,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Call {
    /// `initialize`
    Initialize,
    /// `shutdown`
    Shutdown,
    /// `update`
    Update,
    /// `create_sound`
    CreateSound,
    /// `create_bank_sound`
    CreateBankSound,
    /// `release_sound`
    ReleaseSound,
    /// `sound_length`
    SoundLength,
    /// `play`
    Play,
    /// `stop`
    Stop,
    /// `set_channel_volume`
    SetChannelVolume,
    /// `set_channel_position`
    SetChannelPosition,
    /// `load_bank`
    LoadBank,
    /// `unload_bank`
    UnloadBank,
    /// `set_listener`
    SetListener,
}

/// State of one channel as last set by the facade.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedChannel {
    /// Sound the channel was started from.
    pub sound: SoundHandle,
    /// Parameters passed to `play`, updated by position/volume calls.
    pub params: PlayParams,
    /// False once finished or stopped.
    pub playing: bool,
}

/// Recording [`AudioBackend`] for deterministic facade tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    config: Option<BackendConfig>,
    log: Vec<Call>,
    counts: HashMap<Call, usize>,
    failures: HashMap<Call, BackendError>,
    sounds: HashMap<SoundHandle, PathBuf>,
    channels: HashMap<ChannelHandle, RecordedChannel>,
    banks: HashMap<BankHandle, Vec<String>>,
    bank_files: HashMap<PathBuf, Vec<String>>,
    listener: Option<ListenerPose>,
    sound_length: Duration,
    next_id: u32,
}

impl RecordingBackend {
    /// Create a backend that accepts every file and has no banks.
    pub fn new() -> Self {
        Self {
            sound_length: Duration::from_millis(250),
            ..Self::default()
        }
    }

    /// Make `load_bank(path)` succeed with these entries.
    pub fn with_bank(mut self, path: impl Into<PathBuf>, entries: &[&str]) -> Self {
        self.bank_files.insert(
            path.into(),
            entries.iter().map(|entry| entry.to_string()).collect(),
        );
        self
    }

    /// Length reported for every sound.
    pub fn with_sound_length(mut self, length: Duration) -> Self {
        self.sound_length = length;
        self
    }

    /// Fail the next call of `call` with `error`.
    pub fn fail_next(&mut self, call: Call, error: BackendError) {
        self.failures.insert(call, error);
    }

    /// How many times `call` was made (including failed attempts).
    pub fn count(&self, call: Call) -> usize {
        self.counts.get(&call).copied().unwrap_or(0)
    }

    /// Every call in order.
    pub fn log(&self) -> &[Call] {
        &self.log
    }

    /// End a channel as if it played to completion.
    pub fn finish(&mut self, channel: ChannelHandle) {
        if let Some(recorded) = self.channels.get_mut(&channel) {
            recorded.playing = false;
        }
    }

    /// End every non-looping channel.
    pub fn finish_one_shots(&mut self) {
        for recorded in self.channels.values_mut() {
            if !recorded.params.looping {
                recorded.playing = false;
            }
        }
    }

    /// Recorded state of a channel that has not been reclaimed yet.
    pub fn channel(&self, channel: ChannelHandle) -> Option<&RecordedChannel> {
        self.channels.get(&channel)
    }

    /// Channels that are still playing.
    pub fn playing_channels(&self) -> usize {
        self.channels.values().filter(|c| c.playing).count()
    }

    /// Sounds that have been created and not released.
    pub fn live_sounds(&self) -> usize {
        self.sounds.len()
    }

    /// Banks that are loaded.
    pub fn live_banks(&self) -> usize {
        self.banks.len()
    }

    /// Last listener pose received.
    pub fn listener(&self) -> Option<&ListenerPose> {
        self.listener.as_ref()
    }

    /// Configuration received by `initialize`.
    pub fn config(&self) -> Option<&BackendConfig> {
        self.config.as_ref()
    }

    fn record(&mut self, call: Call) -> Result<(), BackendError> {
        self.log.push(call);
        *self.counts.entry(call).or_insert(0) += 1;
        match self.failures.remove(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ensure_initialized(&self) -> Result<(), BackendError> {
        if self.config.is_some() {
            Ok(())
        } else {
            Err(BackendError::NotInitialized)
        }
    }

    fn next_raw(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn channel_mut(&mut self, channel: ChannelHandle) -> Result<&mut RecordedChannel, BackendError> {
        self.channels
            .get_mut(&channel)
            .filter(|c| c.playing)
            .ok_or(BackendError::InvalidHandle)
    }
}

impl AudioBackend for RecordingBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<(), BackendError> {
        self.record(Call::Initialize)?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn shutdown(&mut self) {
        // Failures cannot be reported from shutdown.
        let _ = self.record(Call::Shutdown);
        self.channels.clear();
        self.sounds.clear();
        self.banks.clear();
        self.config = None;
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn update(&mut self) -> Result<(), BackendError> {
        self.record(Call::Update)?;
        self.ensure_initialized()?;
        self.channels.retain(|_, c| c.playing);
        Ok(())
    }

    fn create_sound(&mut self, path: &Path, _mode: SoundMode) -> Result<SoundHandle, BackendError> {
        self.record(Call::CreateSound)?;
        self.ensure_initialized()?;
        let handle = SoundHandle::from_raw(self.next_raw());
        self.sounds.insert(handle, path.to_path_buf());
        Ok(handle)
    }

    fn create_bank_sound(
        &mut self,
        bank: BankHandle,
        entry: &str,
        _mode: SoundMode,
    ) -> Result<SoundHandle, BackendError> {
        self.record(Call::CreateBankSound)?;
        self.ensure_initialized()?;
        let entries = self.banks.get(&bank).ok_or(BackendError::InvalidHandle)?;
        if !entries.iter().any(|e| e == entry) {
            return Err(BackendError::UnknownBankEntry {
                entry: entry.to_string(),
            });
        }
        let handle = SoundHandle::from_raw(self.next_raw());
        self.sounds.insert(handle, PathBuf::from(entry));
        Ok(handle)
    }

    fn release_sound(&mut self, sound: SoundHandle) {
        let _ = self.record(Call::ReleaseSound);
        self.sounds.remove(&sound);
    }

    fn sound_length(&self, sound: SoundHandle) -> Result<Duration, BackendError> {
        // `&self`: not recorded.
        self.sounds
            .get(&sound)
            .map(|_| self.sound_length)
            .ok_or(BackendError::InvalidHandle)
    }

    fn play(&mut self, sound: SoundHandle, params: &PlayParams) -> Result<ChannelHandle, BackendError> {
        self.record(Call::Play)?;
        self.ensure_initialized()?;
        if !self.sounds.contains_key(&sound) {
            return Err(BackendError::InvalidHandle);
        }
        let max = self.config.as_ref().map_or(usize::MAX, |c| c.max_channels);
        if self.playing_channels() >= max {
            return Err(BackendError::ChannelLimit { max });
        }
        let handle = ChannelHandle::from_raw(self.next_raw());
        self.channels.insert(
            handle,
            RecordedChannel {
                sound,
                params: *params,
                playing: true,
            },
        );
        Ok(handle)
    }

    fn stop(&mut self, channel: ChannelHandle) -> Result<(), BackendError> {
        self.record(Call::Stop)?;
        self.channels.remove(&channel);
        Ok(())
    }

    fn is_playing(&self, channel: ChannelHandle) -> Result<bool, BackendError> {
        Ok(self.channels.get(&channel).is_some_and(|c| c.playing))
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> Result<(), BackendError> {
        self.record(Call::SetChannelVolume)?;
        self.channel_mut(channel)?.params.volume = volume;
        Ok(())
    }

    fn set_channel_position(&mut self, channel: ChannelHandle, position: Vec3) -> Result<(), BackendError> {
        self.record(Call::SetChannelPosition)?;
        self.channel_mut(channel)?.params.position = position;
        Ok(())
    }

    fn load_bank(&mut self, path: &Path) -> Result<BankHandle, BackendError> {
        self.record(Call::LoadBank)?;
        self.ensure_initialized()?;
        let entries = self
            .bank_files
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })?;
        let handle = BankHandle::from_raw(self.next_raw());
        self.banks.insert(handle, entries);
        Ok(handle)
    }

    fn unload_bank(&mut self, bank: BankHandle) {
        let _ = self.record(Call::UnloadBank);
        self.banks.remove(&bank);
    }

    fn bank_entries(&self, bank: BankHandle) -> Result<Vec<String>, BackendError> {
        self.banks
            .get(&bank)
            .cloned()
            .ok_or(BackendError::InvalidHandle)
    }

    fn set_listener(&mut self, pose: &ListenerPose) -> Result<(), BackendError> {
        self.record(Call::SetListener)?;
        self.listener = Some(*pose);
        Ok(())
    }
}

/// Call counts keyed by kind, in a stable order (for assertion messages).
pub fn call_summary(backend: &RecordingBackend) -> BTreeMap<Call, usize> {
    backend.counts.iter().map(|(k, v)| (*k, *v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failure_fires_once() {
        let mut backend = RecordingBackend::new();
        backend.initialize(&BackendConfig::default()).expect("init");
        backend.fail_next(Call::CreateSound, BackendError::UnsupportedFormat("a.mp3".into()));

        assert!(backend
            .create_sound(Path::new("a.mp3"), SoundMode::default())
            .is_err());
        assert!(backend
            .create_sound(Path::new("a.mp3"), SoundMode::default())
            .is_ok());
        assert_eq!(backend.count(Call::CreateSound), 2);
        assert_eq!(backend.live_sounds(), 1);
    }

    #[test]
    fn finished_channels_are_reclaimed_on_update() {
        let mut backend = RecordingBackend::new();
        backend.initialize(&BackendConfig::default()).expect("init");
        let sound = backend
            .create_sound(Path::new("a.wav"), SoundMode::default())
            .expect("sound");
        let params = PlayParams {
            looping: false,
            spatial: false,
            position: Vec3::ZERO,
            volume: 1.0,
        };
        let channel = backend.play(sound, &params).expect("play");

        backend.finish_one_shots();
        assert!(!backend.is_playing(channel).unwrap());
        assert!(backend.channel(channel).is_some());
        backend.update().expect("update");
        assert!(backend.channel(channel).is_none());
    }
}

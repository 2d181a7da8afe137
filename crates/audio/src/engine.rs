//! The audio facade: key-addressed caches over an [`AudioBackend`].

use crate::error::{check, report};
use crate::{
    AudioBackend, AudioConfig, AudioError, AudioSettings, BankHandle, ChannelHandle,
    ListenerPose, LoopReplayPolicy, PlayParams, SoundDescriptor, SoundHandle, SoundSource,
};
use glam::Vec3;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// A cached sound and the bank it was created from, if any.
#[derive(Debug, Clone)]
struct CachedSound {
    handle: SoundHandle,
    bank: Option<String>,
}

/// A running loop and the unscaled volume it was started with.
#[derive(Debug, Clone, Copy)]
struct ActiveLoop {
    channel: ChannelHandle,
    volume: f32,
}

/// Main audio interface for the game.
///
/// Owns every backend handle it creates. Each key maps to at most one
/// cached sound, one running loop and one bank; all of them are released
/// by [`AudioEngine::shutdown`] or when the engine is dropped.
///
/// Calls are expected from a single thread, once [`AudioEngine::init`] has
/// succeeded. [`AudioEngine::update`] must run once per frame.
pub struct AudioEngine<B: AudioBackend> {
    backend: B,
    config: AudioConfig,
    initialized: bool,
    /// Loaded sounds by descriptor key
    sounds: HashMap<String, CachedSound>,
    /// Channels of running loops by descriptor key
    loops: HashMap<String, ActiveLoop>,
    /// Channels of one-shots that may still be playing
    one_shots: HashMap<String, Vec<ChannelHandle>>,
    /// Loaded banks by bank key
    banks: HashMap<String, BankHandle>,
    listener: ListenerPose,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Wrap a backend. Nothing touches the backend until [`Self::init`].
    pub fn new(backend: B, config: AudioConfig) -> Self {
        let config = config.sanitized();
        let listener = ListenerPose::initial(config.distance_factor);
        Self {
            backend,
            config,
            initialized: false,
            sounds: HashMap::new(),
            loops: HashMap::new(),
            one_shots: HashMap::new(),
            banks: HashMap::new(),
            listener,
        }
    }

    /// Initialize the backend with the configured distance factor and
    /// channel budget, then push the current listener pose.
    ///
    /// A failure here is fatal for audio; the caller should abort startup.
    pub fn init(&mut self) -> Result<(), AudioError> {
        if self.initialized {
            return Ok(());
        }
        let backend_config = self.config.backend_config();
        self.backend.initialize(&backend_config).map_err(|err| {
            error!(error = %err, "audio backend initialization failed");
            AudioError::Init(err)
        })?;
        self.initialized = true;
        // Already logged; the backend keeps its own default pose.
        let _ = check("set_listener", self.backend.set_listener(&self.listener));
        info!(
            distance_factor = backend_config.distance_factor,
            max_channels = backend_config.max_channels,
            "Audio engine initialized"
        );
        Ok(())
    }

    /// Check if [`Self::init`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Per-frame tick: lets the backend reclaim channels, then forgets
    /// channels that have finished. Does nothing before `init`.
    pub fn update(&mut self) -> Result<(), AudioError> {
        if !self.initialized {
            return Ok(());
        }
        check("update", self.backend.update())?;

        let backend = &self.backend;
        let still_playing = |channel: ChannelHandle| backend.is_playing(channel).unwrap_or(false);
        self.one_shots.retain(|_, channels| {
            channels.retain(|&channel| still_playing(channel));
            !channels.is_empty()
        });
        self.loops.retain(|key, active| {
            let alive = still_playing(active.channel);
            if !alive {
                debug!(key = %key, "loop finished");
            }
            alive
        });
        Ok(())
    }

    /// Load a sound unless its key is already cached.
    ///
    /// File sounds go through the backend's decoder; bank sounds need their
    /// bank loaded first. On error the cache is unchanged.
    pub fn load_sound(&mut self, descriptor: &SoundDescriptor) -> Result<(), AudioError> {
        self.ensure_initialized()?;
        if self.sounds.contains_key(&descriptor.key) {
            debug!(key = %descriptor.key, "sound already loaded");
            return Ok(());
        }

        let cached = match &descriptor.source {
            SoundSource::File(path) => CachedSound {
                handle: check(
                    "create_sound",
                    self.backend.create_sound(path, descriptor.mode),
                )?,
                bank: None,
            },
            SoundSource::Bank { bank, entry } => {
                let bank_handle = *self.banks.get(bank).ok_or_else(|| {
                    report(AudioError::BankNotLoaded { key: bank.clone() })
                })?;
                CachedSound {
                    handle: check(
                        "create_bank_sound",
                        self.backend
                            .create_bank_sound(bank_handle, entry, descriptor.mode),
                    )?,
                    bank: Some(bank.clone()),
                }
            }
        };
        debug!(key = %descriptor.key, "loaded sound");
        self.sounds.insert(descriptor.key.clone(), cached);
        Ok(())
    }

    /// Start playing a loaded sound.
    ///
    /// Looping sounds are tracked so they can be moved, re-volumed and
    /// stopped by key. If the key is already looping, the configured
    /// [`LoopReplayPolicy`] decides between restarting and rejecting.
    pub fn play_sound(&mut self, descriptor: &SoundDescriptor) -> Result<ChannelHandle, AudioError> {
        self.ensure_initialized()?;
        let sound = self.cached_handle(&descriptor.key)?;
        let key = &descriptor.key;

        if descriptor.is_looping() {
            if let Some(existing) = self.loops.get(key).copied() {
                match self.config.loop_replay {
                    LoopReplayPolicy::Reject => {
                        return Err(report(AudioError::AlreadyLooping { key: key.clone() }));
                    }
                    LoopReplayPolicy::Restart => {
                        check("stop", self.backend.stop(existing.channel))?;
                        self.loops.remove(key);
                        debug!(key = %key, "restarting loop");
                    }
                }
            }
        }

        let params = PlayParams {
            looping: descriptor.is_looping(),
            spatial: descriptor.is_spatial(),
            position: descriptor.position,
            volume: self.config.settings.apply(descriptor.volume),
        };
        let channel = check("play", self.backend.play(sound, &params))?;

        if descriptor.is_looping() {
            self.loops.insert(
                key.clone(),
                ActiveLoop {
                    channel,
                    volume: descriptor.volume,
                },
            );
        } else {
            self.one_shots.entry(key.clone()).or_default().push(channel);
        }
        debug!(key = %key, channel = channel.raw(), looping = params.looping, "playing sound");
        Ok(channel)
    }

    /// Stop the key's running loop. No-op if it has none.
    pub fn stop_sound(&mut self, descriptor: &SoundDescriptor) -> Result<(), AudioError> {
        let Some(active) = self.loops.get(&descriptor.key).copied() else {
            trace!(key = %descriptor.key, "stop ignored: not looping");
            return Ok(());
        };
        check("stop", self.backend.stop(active.channel))?;
        self.loops.remove(&descriptor.key);
        Ok(())
    }

    /// Forward `descriptor.position` to the key's running loop. No-op if it
    /// has none.
    pub fn update_3d_position(&mut self, descriptor: &SoundDescriptor) -> Result<(), AudioError> {
        let Some(active) = self.loops.get(&descriptor.key) else {
            trace!(key = %descriptor.key, "position ignored: not looping");
            return Ok(());
        };
        check(
            "set_channel_position",
            self.backend
                .set_channel_position(active.channel, descriptor.position),
        )
    }

    /// Forward `descriptor.volume` (scaled by the master settings) to the
    /// key's running loop. No-op if it has none.
    pub fn set_loop_volume(&mut self, descriptor: &SoundDescriptor) -> Result<(), AudioError> {
        let volume = self.config.settings.apply(descriptor.volume);
        let Some(active) = self.loops.get_mut(&descriptor.key) else {
            trace!(key = %descriptor.key, "volume ignored: not looping");
            return Ok(());
        };
        check(
            "set_channel_volume",
            self.backend.set_channel_volume(active.channel, volume),
        )?;
        active.volume = descriptor.volume;
        Ok(())
    }

    /// Whether the key has a loop or one-shot the backend still reports as
    /// playing. False for keys that were never played.
    pub fn is_playing(&self, descriptor: &SoundDescriptor) -> bool {
        let playing = |channel: ChannelHandle| match self.backend.is_playing(channel) {
            Ok(playing) => playing,
            Err(err) => {
                trace!(channel = channel.raw(), error = %err, "is_playing failed");
                false
            }
        };
        let key = &descriptor.key;
        self.loops.get(key).is_some_and(|active| playing(active.channel))
            || self
                .one_shots
                .get(key)
                .is_some_and(|channels| channels.iter().any(|&c| playing(c)))
    }

    /// Set the listener from position, forward and up vectors.
    pub fn set_listener_position(
        &mut self,
        position: Vec3,
        forward: Vec3,
        up: Vec3,
    ) -> Result<(), AudioError> {
        self.set_listener(ListenerPose::new(position, forward, up))
    }

    /// Store the listener pose and forward it to the backend.
    ///
    /// The pose is kept even before `init` and pushed once the backend is up.
    /// `forward` and `up` are not validated.
    pub fn set_listener(&mut self, pose: ListenerPose) -> Result<(), AudioError> {
        if !pose.is_orthogonal() {
            debug!(forward = ?pose.forward, up = ?pose.up, "listener vectors are not perpendicular");
        }
        self.listener = pose;
        if !self.initialized {
            return Ok(());
        }
        check("set_listener", self.backend.set_listener(&self.listener))
    }

    /// Current listener pose.
    pub fn listener(&self) -> &ListenerPose {
        &self.listener
    }

    /// Length of a loaded sound.
    pub fn sound_length(&self, descriptor: &SoundDescriptor) -> Result<Duration, AudioError> {
        let sound = self.cached_handle(&descriptor.key)?;
        check("sound_length", self.backend.sound_length(sound))
    }

    /// Stop the key's channels and drop its sound from the cache.
    /// No-op if the key is not loaded.
    pub fn unload_sound(&mut self, descriptor: &SoundDescriptor) -> Result<(), AudioError> {
        self.evict(&descriptor.key)
    }

    /// Load a bank manifest under `key` unless that key is already cached.
    pub fn load_bank(&mut self, key: &str, path: &Path) -> Result<(), AudioError> {
        self.ensure_initialized()?;
        if self.banks.contains_key(key) {
            debug!(key, "bank already loaded");
            return Ok(());
        }
        let bank = check("load_bank", self.backend.load_bank(path))?;
        debug!(key, path = %path.display(), "loaded bank");
        self.banks.insert(key.to_string(), bank);
        Ok(())
    }

    /// Unload a bank and every sound created from it. No-op if the bank is
    /// not loaded.
    pub fn unload_bank(&mut self, key: &str) -> Result<(), AudioError> {
        let Some(&bank) = self.banks.get(key) else {
            trace!(key, "unload ignored: bank not loaded");
            return Ok(());
        };
        let dependents: Vec<String> = self
            .sounds
            .iter()
            .filter(|(_, cached)| cached.bank.as_deref() == Some(key))
            .map(|(sound_key, _)| sound_key.clone())
            .collect();
        for sound_key in dependents {
            self.evict(&sound_key)?;
        }
        self.backend.unload_bank(bank);
        self.banks.remove(key);
        debug!(key, "unloaded bank");
        Ok(())
    }

    /// Entry names of a loaded bank.
    pub fn bank_entries(&self, key: &str) -> Result<Vec<String>, AudioError> {
        let bank = *self
            .banks
            .get(key)
            .ok_or_else(|| report(AudioError::BankNotLoaded { key: key.to_string() }))?;
        check("bank_entries", self.backend.bank_entries(bank))
    }

    /// Stop every tracked channel. Channels that fail to stop are logged and
    /// stay tracked; the first failure is returned after all were attempted.
    pub fn stop_all(&mut self) -> Result<(), AudioError> {
        let backend = &mut self.backend;
        let mut first_err = None;
        let mut stopped = |channel: ChannelHandle| match check("stop", backend.stop(channel)) {
            Ok(()) => true,
            Err(err) => {
                first_err.get_or_insert(err);
                false
            }
        };
        self.loops.retain(|_, active| !stopped(active.channel));
        self.one_shots.retain(|_, channels| {
            channels.retain(|&channel| !stopped(channel));
            !channels.is_empty()
        });
        first_err.map_or(Ok(()), Err)
    }

    /// Current volume settings.
    pub fn settings(&self) -> &AudioSettings {
        &self.config.settings
    }

    /// Replace the volume settings and reapply them to running loops.
    pub fn update_settings(&mut self, mut settings: AudioSettings) -> Result<(), AudioError> {
        settings.set_master(settings.master_volume);
        self.config.settings = settings;
        let mut first_err = None;
        for active in self.loops.values() {
            let volume = self.config.settings.apply(active.volume);
            if let Err(err) = check(
                "set_channel_volume",
                self.backend.set_channel_volume(active.channel, volume),
            ) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Active configuration.
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Check if a sound is cached under `key`.
    pub fn is_loaded(&self, key: &str) -> bool {
        self.sounds.contains_key(key)
    }

    /// Check if a bank is cached under `key`.
    pub fn is_bank_loaded(&self, key: &str) -> bool {
        self.banks.contains_key(key)
    }

    /// Number of tracked loops.
    pub fn active_loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Number of tracked one-shot channels.
    pub fn one_shot_count(&self) -> usize {
        self.one_shots.values().map(Vec::len).sum()
    }

    /// Borrow the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutably borrow the backend. Handles the engine tracks must not be
    /// stopped or released through it.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Stop all channels, release every sound and bank, and shut the
    /// backend down. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        // Failures were logged by stop_all; shutdown proceeds regardless.
        let _ = self.stop_all();
        for (_, cached) in self.sounds.drain() {
            self.backend.release_sound(cached.handle);
        }
        for (_, bank) in self.banks.drain() {
            self.backend.unload_bank(bank);
        }
        // Channels that refused to stop go down with the backend.
        self.loops.clear();
        self.one_shots.clear();
        self.backend.shutdown();
        self.initialized = false;
        info!("Audio engine shutdown");
    }

    fn ensure_initialized(&self) -> Result<(), AudioError> {
        if self.initialized {
            Ok(())
        } else {
            Err(report(AudioError::NotInitialized))
        }
    }

    fn cached_handle(&self, key: &str) -> Result<SoundHandle, AudioError> {
        self.sounds
            .get(key)
            .map(|cached| cached.handle)
            .ok_or_else(|| report(AudioError::NotLoaded { key: key.to_string() }))
    }

    fn evict(&mut self, key: &str) -> Result<(), AudioError> {
        if !self.sounds.contains_key(key) {
            trace!(key, "unload ignored: not loaded");
            return Ok(());
        }
        if let Some(active) = self.loops.get(key).copied() {
            check("stop", self.backend.stop(active.channel))?;
            self.loops.remove(key);
        }
        if let Some(channels) = self.one_shots.get_mut(key) {
            let backend = &mut self.backend;
            let mut first_err = None;
            // Channels that fail to stop stay tracked.
            channels.retain(|&channel| match check("stop", backend.stop(channel)) {
                Ok(()) => false,
                Err(err) => {
                    first_err.get_or_insert(err);
                    true
                }
            });
            if channels.is_empty() {
                self.one_shots.remove(key);
            }
            if let Some(err) = first_err {
                return Err(err);
            }
        }
        if let Some(cached) = self.sounds.remove(key) {
            self.backend.release_sound(cached.handle);
            debug!(key, "unloaded sound");
        }
        Ok(())
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullBackend;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let root = dir.path().to_path_buf();
            for name in files {
                fs::write(root.join(name), b"RIFF").expect("write");
            }
            Self { _dir: dir, root }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.join(name)
        }
    }

    fn engine() -> AudioEngine<NullBackend> {
        let mut engine = AudioEngine::new(NullBackend::new(), AudioConfig::default());
        engine.init().expect("init");
        engine
    }

    #[test]
    fn operations_before_init_are_rejected_or_ignored() {
        let fx = Fixture::new(&["a.wav"]);
        let mut engine = AudioEngine::new(NullBackend::new(), AudioConfig::default());
        let d = SoundDescriptor::file("a", fx.path("a.wav"));

        assert!(engine.update().is_ok());
        assert!(matches!(engine.load_sound(&d), Err(AudioError::NotInitialized)));
        assert!(matches!(engine.play_sound(&d), Err(AudioError::NotInitialized)));
        assert!(engine.stop_sound(&d).is_ok());
        assert!(!engine.is_playing(&d));
    }

    #[test]
    fn listener_set_before_init_is_pushed_on_init() {
        let mut engine = AudioEngine::new(NullBackend::new(), AudioConfig::default());
        let pose = ListenerPose::new(Vec3::new(1.0, 2.0, 3.0), Vec3::X, Vec3::Y);
        engine.set_listener(pose).expect("store");
        engine.init().expect("init");
        assert_eq!(engine.backend().listener(), &pose);
    }

    #[test]
    fn default_listener_follows_distance_factor() {
        let config = AudioConfig {
            distance_factor: 100.0,
            ..Default::default()
        };
        let engine = AudioEngine::new(NullBackend::new(), config);
        assert_eq!(engine.listener().position, Vec3::new(0.0, 0.0, -100.0));
    }

    #[test]
    fn loop_lifecycle_tracks_position_and_stop() {
        let fx = Fixture::new(&["hum.wav"]);
        let mut engine = engine();
        let mut hum = SoundDescriptor::file("hum", fx.path("hum.wav"))
            .looping()
            .spatial_at(Vec3::new(1.0, 0.0, 0.0));
        engine.load_sound(&hum).expect("load");
        let channel = engine.play_sound(&hum).expect("play");
        engine.update().expect("update");
        assert!(engine.is_playing(&hum));

        hum.set_position(Vec3::new(4.0, 5.0, 6.0));
        engine.update_3d_position(&hum).expect("move");
        assert_eq!(
            engine.backend().channel_position(channel),
            Some(Vec3::new(4.0, 5.0, 6.0))
        );

        engine.stop_sound(&hum).expect("stop");
        assert!(!engine.is_playing(&hum));
        assert_eq!(engine.active_loop_count(), 0);
    }

    #[test]
    fn settings_scale_loop_volume() {
        let fx = Fixture::new(&["wind.ogg"]);
        let mut engine = engine();
        let wind = SoundDescriptor::file("wind", fx.path("wind.ogg"))
            .looping()
            .with_volume(0.5);
        engine.load_sound(&wind).expect("load");
        let channel = engine.play_sound(&wind).expect("play");
        assert_eq!(engine.backend().channel_volume(channel), Some(0.5));

        let mut settings = engine.settings().clone();
        settings.set_master(0.5);
        engine.update_settings(settings).expect("settings");
        assert_eq!(engine.backend().channel_volume(channel), Some(0.25));

        engine.set_loop_volume(&wind.clone().with_volume(1.0)).expect("volume");
        assert_eq!(engine.backend().channel_volume(channel), Some(0.5));
    }

    #[test]
    fn bank_sounds_are_evicted_with_their_bank() {
        let fx = Fixture::new(&["click.wav"]);
        fs::write(fx.path("ui.toml"), "[sounds]\nclick = \"click.wav\"\n").expect("write");
        let mut engine = engine();
        let click = SoundDescriptor::from_bank("click", "ui", "click").looping();

        assert!(matches!(
            engine.load_sound(&click),
            Err(AudioError::BankNotLoaded { .. })
        ));
        engine.load_bank("ui", &fx.path("ui.toml")).expect("bank");
        assert_eq!(engine.bank_entries("ui").unwrap(), vec!["click".to_string()]);
        engine.load_sound(&click).expect("load");
        engine.play_sound(&click).expect("play");

        engine.unload_bank("ui").expect("unload");
        assert!(!engine.is_bank_loaded("ui"));
        assert!(!engine.is_loaded("click"));
        assert!(!engine.is_playing(&click));
        assert_eq!(engine.backend().bank_count(), 0);
        assert_eq!(engine.backend().sound_count(), 0);
    }

    #[test]
    fn drop_releases_backend_resources() {
        let fx = Fixture::new(&["a.wav"]);
        let mut engine = engine();
        let d = SoundDescriptor::file("a", fx.path("a.wav")).looping();
        engine.load_sound(&d).expect("load");
        engine.play_sound(&d).expect("play");

        engine.shutdown();
        assert!(!engine.is_initialized());
        assert!(!engine.backend().is_initialized());
        assert_eq!(engine.backend().sound_count(), 0);
        assert_eq!(engine.backend().channel_count(), 0);
        engine.shutdown();
    }
}

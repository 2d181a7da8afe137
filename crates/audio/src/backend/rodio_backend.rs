//! Rodio output backend.
//!
//! Sounds are decoded fully into memory when created, so format errors show
//! up at load time and playback never touches the disk. 2D channels use a
//! [`Sink`]; 3D channels use a [`SpatialSink`] whose ears follow the
//! listener pose.

use super::{
    check_extension, AudioBackend, BackendConfig, BackendError, BankHandle, ChannelHandle,
    IdAllocator, PlayParams, SoundHandle,
};
use crate::{BankManifest, ListenerPose, SoundMode};
use glam::Vec3;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source, SpatialSink};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Decoded PCM shared between a bank and the sounds created from it.
struct DecodedSound {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[i16]>,
}

impl DecodedSound {
    fn decode(path: &Path) -> Result<Self, BackendError> {
        check_extension(path)?;
        let file = File::open(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Arc<[i16]> = decoder.collect();
        Ok(Self {
            channels,
            sample_rate,
            samples,
        })
    }

    fn source(&self) -> SharedSamples {
        SharedSamples {
            samples: Arc::clone(&self.samples),
            position: 0,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    fn length(&self) -> Duration {
        frames_duration(self.samples.len(), self.channels, self.sample_rate)
    }
}

/// Playback cursor over decoded samples; every channel reads the same buffer.
struct SharedSamples {
    samples: Arc<[i16]>,
    position: usize,
    channels: u16,
    sample_rate: u32,
}

impl Iterator for SharedSamples {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(frames_duration(self.samples.len(), self.channels, self.sample_rate))
    }
}

fn frames_duration(samples: usize, channels: u16, sample_rate: u32) -> Duration {
    if channels == 0 || sample_rate == 0 {
        return Duration::ZERO;
    }
    let frames = samples as f64 / f64::from(channels);
    Duration::from_secs_f64(frames / f64::from(sample_rate))
}

/// Playback control for either kind of rodio sink.
enum Voice {
    Flat(Sink),
    Spatial(SpatialSink),
}

impl Voice {
    fn finished(&self) -> bool {
        match self {
            Voice::Flat(sink) => sink.empty(),
            Voice::Spatial(sink) => sink.empty(),
        }
    }

    fn is_paused(&self) -> bool {
        match self {
            Voice::Flat(sink) => sink.is_paused(),
            Voice::Spatial(sink) => sink.is_paused(),
        }
    }

    fn stop(&self) {
        match self {
            Voice::Flat(sink) => sink.stop(),
            Voice::Spatial(sink) => sink.stop(),
        }
    }

    fn set_volume(&self, volume: f32) {
        match self {
            Voice::Flat(sink) => sink.set_volume(volume),
            Voice::Spatial(sink) => sink.set_volume(volume),
        }
    }
}

/// Output stream state that only exists while initialized.
struct Output {
    /// Output stream (must be kept alive)
    _stream: OutputStream,
    /// Stream handle for creating sinks
    handle: OutputStreamHandle,
    config: BackendConfig,
}

/// Rodio-based audio backend.
pub struct RodioBackend {
    output: Option<Output>,
    sounds: HashMap<SoundHandle, Arc<DecodedSound>>,
    channels: HashMap<ChannelHandle, Voice>,
    banks: HashMap<BankHandle, BTreeMap<String, Arc<DecodedSound>>>,
    listener: ListenerPose,
    sound_ids: IdAllocator,
    channel_ids: IdAllocator,
    bank_ids: IdAllocator,
}

impl RodioBackend {
    /// Create a backend; the device is opened by `initialize`.
    pub fn new() -> Self {
        Self {
            output: None,
            sounds: HashMap::new(),
            channels: HashMap::new(),
            banks: HashMap::new(),
            listener: ListenerPose::default(),
            sound_ids: IdAllocator::default(),
            channel_ids: IdAllocator::default(),
            bank_ids: IdAllocator::default(),
        }
    }

    fn output(&self) -> Result<&Output, BackendError> {
        self.output.as_ref().ok_or(BackendError::NotInitialized)
    }

    fn insert_sound(&mut self, decoded: Arc<DecodedSound>) -> SoundHandle {
        let handle = SoundHandle::from_raw(self.sound_ids.next());
        self.sounds.insert(handle, decoded);
        handle
    }

    /// Listener ears in meters.
    fn ears(&self, config: &BackendConfig) -> ([f32; 3], [f32; 3]) {
        let scaled = ListenerPose {
            position: self.listener.position / config.distance_factor,
            ..self.listener
        };
        let (left, right) = scaled.ears(config.ear_spacing);
        (left.to_array(), right.to_array())
    }

    fn reclaim_finished(&mut self) {
        self.channels.retain(|_, voice| !voice.finished());
    }
}

impl AudioBackend for RodioBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<(), BackendError> {
        if self.output.is_some() {
            return Ok(());
        }
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| BackendError::Device(format!("failed to open audio output: {e}")))?;
        self.output = Some(Output {
            _stream: stream,
            handle,
            config: config.clone(),
        });
        info!(
            distance_factor = config.distance_factor,
            max_channels = config.max_channels,
            "Rodio audio backend initialized"
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.output.is_none() {
            return;
        }
        for (_, voice) in self.channels.drain() {
            voice.stop();
        }
        self.sounds.clear();
        self.banks.clear();
        self.output = None;
        info!("Rodio audio backend shutdown");
    }

    fn is_initialized(&self) -> bool {
        self.output.is_some()
    }

    fn update(&mut self) -> Result<(), BackendError> {
        self.output()?;
        self.reclaim_finished();
        Ok(())
    }

    fn create_sound(&mut self, path: &Path, _mode: SoundMode) -> Result<SoundHandle, BackendError> {
        self.output()?;
        let decoded = DecodedSound::decode(path)?;
        debug!(path = %path.display(), length = ?decoded.length(), "decoded sound");
        Ok(self.insert_sound(Arc::new(decoded)))
    }

    fn create_bank_sound(
        &mut self,
        bank: BankHandle,
        entry: &str,
        _mode: SoundMode,
    ) -> Result<SoundHandle, BackendError> {
        self.output()?;
        let decoded = self
            .banks
            .get(&bank)
            .ok_or(BackendError::InvalidHandle)?
            .get(entry)
            .cloned()
            .ok_or_else(|| BackendError::UnknownBankEntry {
                entry: entry.to_string(),
            })?;
        Ok(self.insert_sound(decoded))
    }

    fn release_sound(&mut self, sound: SoundHandle) {
        self.sounds.remove(&sound);
    }

    fn sound_length(&self, sound: SoundHandle) -> Result<Duration, BackendError> {
        self.sounds
            .get(&sound)
            .map(|decoded| decoded.length())
            .ok_or(BackendError::InvalidHandle)
    }

    fn play(&mut self, sound: SoundHandle, params: &PlayParams) -> Result<ChannelHandle, BackendError> {
        self.reclaim_finished();
        let output = self.output()?;
        let max = output.config.max_channels;
        if self.channels.len() >= max {
            return Err(BackendError::ChannelLimit { max });
        }
        let decoded = self.sounds.get(&sound).ok_or(BackendError::InvalidHandle)?;
        let source = decoded.source();

        let voice = if params.spatial {
            let (left, right) = self.ears(&output.config);
            let emitter = (params.position / output.config.distance_factor).to_array();
            let sink = SpatialSink::try_new(&output.handle, emitter, left, right)
                .map_err(|e| BackendError::Device(format!("failed to create spatial sink: {e}")))?;
            sink.set_volume(params.volume);
            if params.looping {
                sink.append(source.repeat_infinite());
            } else {
                sink.append(source);
            }
            Voice::Spatial(sink)
        } else {
            let sink = Sink::try_new(&output.handle)
                .map_err(|e| BackendError::Device(format!("failed to create sink: {e}")))?;
            sink.set_volume(params.volume);
            if params.looping {
                sink.append(source.repeat_infinite());
            } else {
                sink.append(source);
            }
            Voice::Flat(sink)
        };

        let handle = ChannelHandle::from_raw(self.channel_ids.next());
        self.channels.insert(handle, voice);
        Ok(handle)
    }

    fn stop(&mut self, channel: ChannelHandle) -> Result<(), BackendError> {
        if let Some(voice) = self.channels.remove(&channel) {
            voice.stop();
        }
        Ok(())
    }

    fn is_playing(&self, channel: ChannelHandle) -> Result<bool, BackendError> {
        Ok(self
            .channels
            .get(&channel)
            .map(|voice| !voice.finished() && !voice.is_paused())
            .unwrap_or(false))
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> Result<(), BackendError> {
        let voice = self.channels.get(&channel).ok_or(BackendError::InvalidHandle)?;
        voice.set_volume(volume);
        Ok(())
    }

    fn set_channel_position(&mut self, channel: ChannelHandle, position: Vec3) -> Result<(), BackendError> {
        let factor = self.output()?.config.distance_factor;
        match self.channels.get(&channel) {
            Some(Voice::Spatial(sink)) => {
                sink.set_emitter_position((position / factor).to_array());
                Ok(())
            }
            Some(Voice::Flat(_)) => {
                trace!(channel = channel.raw(), "ignoring position for 2D channel");
                Ok(())
            }
            None => Err(BackendError::InvalidHandle),
        }
    }

    fn load_bank(&mut self, path: &Path) -> Result<BankHandle, BackendError> {
        self.output()?;
        let manifest = BankManifest::from_file(path)?;
        let mut sounds = BTreeMap::new();
        for (entry, sound_path) in &manifest.sounds {
            let decoded = DecodedSound::decode(sound_path)?;
            sounds.insert(entry.clone(), Arc::new(decoded));
        }
        let handle = BankHandle::from_raw(self.bank_ids.next());
        debug!(path = %path.display(), entries = sounds.len(), "loaded bank");
        self.banks.insert(handle, sounds);
        Ok(handle)
    }

    fn unload_bank(&mut self, bank: BankHandle) {
        self.banks.remove(&bank);
    }

    fn bank_entries(&self, bank: BankHandle) -> Result<Vec<String>, BackendError> {
        self.banks
            .get(&bank)
            .map(|sounds| sounds.keys().cloned().collect())
            .ok_or(BackendError::InvalidHandle)
    }

    fn set_listener(&mut self, pose: &ListenerPose) -> Result<(), BackendError> {
        self.listener = *pose;
        let Some(output) = self.output.as_ref() else {
            return Ok(());
        };
        let (left, right) = self.ears(&output.config);
        for voice in self.channels.values() {
            if let Voice::Spatial(sink) = voice {
                sink.set_left_ear_position(left);
                sink.set_right_ear_position(right);
            }
        }
        Ok(())
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

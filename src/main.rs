//! bobo - audio facade driver
//!
//! Loads sounds and banks, plays them, and ticks the engine at a fixed frame
//! rate. Spatial loops orbit the listener so positional output can be heard.

use anyhow::{Context, Result};
use bobo_audio::{
    AudioBackend, AudioConfig, AudioEngine, NullBackend, SoundDescriptor, Vec3,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, thread};
use tracing::{info, warn};

const FRAME_RATE: u32 = 60;

/// Command-line options.
#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    banks: Vec<(String, PathBuf)>,
    bank_sounds: Vec<(String, String)>,
    files: Vec<PathBuf>,
    looping: bool,
    spatial: bool,
    orbit_radius: f32,
    seconds: f32,
    no_audio: bool,
    verbose: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config: None,
            banks: Vec::new(),
            bank_sounds: Vec::new(),
            files: Vec::new(),
            looping: false,
            spatial: false,
            orbit_radius: 5.0,
            seconds: 5.0,
            no_audio: false,
            verbose: false,
        }
    }
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--bank" => match args.next().as_deref().and_then(|raw| raw.split_once('=')) {
                    Some((key, path)) if !key.is_empty() => {
                        opts.banks.push((key.to_string(), PathBuf::from(path)));
                    }
                    _ => tracing::error!("--bank requires KEY=PATH"),
                },
                "--entry" => match args.next().as_deref().and_then(|raw| raw.split_once(':')) {
                    Some((bank, entry)) if !bank.is_empty() && !entry.is_empty() => {
                        opts.bank_sounds.push((bank.to_string(), entry.to_string()));
                    }
                    _ => tracing::error!("--entry requires BANK:ENTRY"),
                },
                "--loop" => opts.looping = true,
                "--spatial" => opts.spatial = true,
                "--orbit" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<f32>() {
                            Ok(value) if value.is_finite() && value >= 0.0 => {
                                opts.orbit_radius = value;
                                opts.spatial = true;
                            }
                            _ => tracing::error!(value = %raw, "--orbit must be a non-negative number"),
                        }
                    } else {
                        tracing::error!("--orbit requires a radius");
                    }
                }
                "--seconds" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<f32>() {
                            Ok(value) if value.is_finite() && value > 0.0 => opts.seconds = value,
                            _ => tracing::error!(value = %raw, "--seconds must be a positive number"),
                        }
                    } else {
                        tracing::error!("--seconds requires a duration");
                    }
                }
                "--no-audio" => opts.no_audio = true,
                "--verbose" | "-v" => opts.verbose = true,
                other if other.starts_with("--") => {
                    tracing::warn!(arg = other, "ignoring unknown option");
                }
                path => opts.files.push(PathBuf::from(path)),
            }
        }

        opts
    }

    /// Descriptors for every requested sound, spread evenly around the orbit.
    fn descriptors(&self) -> Vec<SoundDescriptor> {
        let stem = |path: &PathBuf| path.file_stem().map(|s| s.to_string_lossy().into_owned());
        let mut stem_counts: HashMap<String, usize> = HashMap::new();
        for key in self.files.iter().filter_map(stem) {
            *stem_counts.entry(key).or_insert(0) += 1;
        }

        let mut descriptors: Vec<SoundDescriptor> = self
            .files
            .iter()
            .map(|path| {
                // Repeated stems would share a cache entry; key those by full path.
                let key = stem(path)
                    .filter(|key| stem_counts.get(key) == Some(&1))
                    .unwrap_or_else(|| path.display().to_string());
                SoundDescriptor::file(key, path.clone())
            })
            .chain(self.bank_sounds.iter().map(|(bank, entry)| {
                SoundDescriptor::from_bank(format!("{bank}:{entry}"), bank.clone(), entry.clone())
            }))
            .collect();

        let count = descriptors.len().max(1) as f32;
        for (i, descriptor) in descriptors.iter_mut().enumerate() {
            if self.looping {
                descriptor.mode.looping = true;
            }
            if self.spatial {
                descriptor.mode.spatial = true;
                let phase = i as f32 / count * std::f32::consts::TAU;
                descriptor.set_position(orbit_position(self.orbit_radius, phase));
            }
        }
        descriptors
    }
}

/// Point on a horizontal circle around the origin.
fn orbit_position(radius: f32, angle: f32) -> Vec3 {
    Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
}

fn main() -> Result<()> {
    let cli = CliOptions::parse(env::args().skip(1));

    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting bobo v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => AudioConfig::load_from_path(path),
        None => AudioConfig::default(),
    };

    if cli.files.is_empty() && cli.bank_sounds.is_empty() {
        warn!("no sounds given; pass audio files or --entry BANK:ENTRY");
    }

    run_with_output(&cli, config)
}

#[cfg(feature = "rodio_backend")]
fn run_with_output(cli: &CliOptions, config: AudioConfig) -> Result<()> {
    use bobo_audio::RodioBackend;

    if cli.no_audio {
        return run(AudioEngine::new(NullBackend::new(), config), cli);
    }
    let mut engine = AudioEngine::new(RodioBackend::new(), config.clone());
    match engine.init() {
        Ok(()) => run(engine, cli),
        Err(err) => {
            warn!("Failed to initialize audio: {err}. Using null backend.");
            run(AudioEngine::new(NullBackend::new(), config), cli)
        }
    }
}

#[cfg(not(feature = "rodio_backend"))]
fn run_with_output(cli: &CliOptions, config: AudioConfig) -> Result<()> {
    if !cli.no_audio {
        warn!("built without rodio_backend; running without audio output");
    }
    run(AudioEngine::new(NullBackend::new(), config), cli)
}

fn run<B: AudioBackend>(mut engine: AudioEngine<B>, cli: &CliOptions) -> Result<()> {
    engine.init().context("audio initialization failed")?;

    for (key, path) in &cli.banks {
        engine
            .load_bank(key, path)
            .with_context(|| format!("failed to load bank '{key}' from {}", path.display()))?;
    }

    let mut descriptors = cli.descriptors();
    // Load and play failures are already logged; keep going with the rest.
    descriptors.retain(|d| engine.load_sound(d).is_ok());
    descriptors.retain(|d| engine.play_sound(d).is_ok());
    info!(sounds = descriptors.len(), "playing");

    let frame = Duration::from_secs(1) / FRAME_RATE;
    let total_frames = (cli.seconds * FRAME_RATE as f32).ceil() as u64;
    let count = descriptors.len().max(1) as f32;
    let start = Instant::now();

    for tick in 0..total_frames {
        let t = tick as f32 / FRAME_RATE as f32;
        for (i, descriptor) in descriptors.iter_mut().enumerate() {
            if descriptor.is_spatial() && descriptor.is_looping() {
                let phase = i as f32 / count * std::f32::consts::TAU;
                descriptor.set_position(orbit_position(cli.orbit_radius, phase + t * 0.5));
                engine.update_3d_position(descriptor)?;
            }
        }
        engine.update()?;

        if !descriptors.iter().any(|d| engine.is_playing(d)) {
            info!(tick, "all sounds finished");
            break;
        }
        thread::sleep(frame);
    }

    for descriptor in &descriptors {
        engine.stop_sound(descriptor)?;
    }
    engine.shutdown();
    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(parse(&[]), CliOptions::default());
    }

    #[test]
    fn parses_banks_entries_and_flags() {
        let opts = parse(&[
            "--bank",
            "ui=banks/ui.toml",
            "--entry",
            "ui:click",
            "--loop",
            "--orbit",
            "12.5",
            "--seconds",
            "2",
            "rain.ogg",
        ]);
        assert_eq!(opts.banks, vec![("ui".to_string(), PathBuf::from("banks/ui.toml"))]);
        assert_eq!(opts.bank_sounds, vec![("ui".to_string(), "click".to_string())]);
        assert!(opts.looping);
        assert!(opts.spatial);
        assert_eq!(opts.orbit_radius, 12.5);
        assert_eq!(opts.seconds, 2.0);
        assert_eq!(opts.files, vec![PathBuf::from("rain.ogg")]);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let opts = parse(&["--seconds", "-1", "--bank", "nokey", "--orbit", "wide"]);
        assert_eq!(opts.seconds, 5.0);
        assert!(opts.banks.is_empty());
        assert!(!opts.spatial);
    }

    #[test]
    fn descriptors_are_keyed_by_stem_and_spread_on_orbit() {
        let opts = parse(&["--spatial", "--loop", "sfx/rain.ogg", "sfx/wind.wav"]);
        let descriptors = opts.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].key, "rain");
        assert_eq!(descriptors[1].key, "wind");
        assert!(descriptors.iter().all(|d| d.is_looping() && d.is_spatial()));
        assert!((descriptors[0].position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        assert!((descriptors[1].position - Vec3::new(-5.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn repeated_stems_are_keyed_by_path() {
        let opts = parse(&["a/rain.ogg", "b/rain.wav", "wind.wav"]);
        let keys: Vec<String> = opts.descriptors().into_iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![
                PathBuf::from("a/rain.ogg").display().to_string(),
                PathBuf::from("b/rain.wav").display().to_string(),
                "wind".to_string(),
            ]
        );
    }

    #[test]
    fn headless_run_finishes_one_shots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("beep.wav");
        std::fs::write(&path, b"RIFF").expect("write");
        let opts = CliOptions {
            files: vec![path],
            seconds: 1.0,
            ..Default::default()
        };
        run(AudioEngine::new(NullBackend::new(), AudioConfig::default()), &opts).expect("run");
    }
}

#![warn(missing_docs)]
//! Deterministic testing surfaces for the audio facade.

mod recording;

use bobo_audio::{AudioBackend, AudioEngine, AudioError};

pub use recording::*;

/// Step `engine` through `frames` update ticks, stopping at the first error.
pub fn run_frames<B: AudioBackend>(engine: &mut AudioEngine<B>, frames: usize) -> Result<(), AudioError> {
    for _ in 0..frames {
        engine.update()?;
    }
    Ok(())
}

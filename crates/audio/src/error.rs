//! Error types for the facade and its backends.

use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors reported by an [`crate::AudioBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend has not been initialized (or was shut down).
    #[error("audio backend not initialized")]
    NotInitialized,
    /// The handle does not refer to a live resource.
    #[error("invalid or expired handle")]
    InvalidHandle,
    /// The file extension is not a format the backend can decode.
    #[error("unsupported audio format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    /// Reading a sound or bank failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file was readable but could not be decoded.
    #[error("failed to decode {}: {message}", path.display())]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },
    /// The concurrent channel budget is used up.
    #[error("channel limit reached ({max} channels)")]
    ChannelLimit {
        /// Configured channel budget.
        max: usize,
    },
    /// A bank manifest could not be parsed.
    #[error("invalid bank manifest {}: {message}", path.display())]
    BankManifest {
        /// Manifest path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// The bank has no entry with this name.
    #[error("bank has no entry named '{entry}'")]
    UnknownBankEntry {
        /// Requested entry name.
        entry: String,
    },
    /// The output device failed.
    #[error("audio device error: {0}")]
    Device(String),
}

/// Errors returned by [`crate::AudioEngine`].
///
/// Every error leaves the engine in a consistent state; callers decide
/// whether to log, retry or abort.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Backend initialization failed. The host should abort startup.
    #[error("audio initialization failed: {0}")]
    Init(#[source] BackendError),
    /// An operation that needs the backend was called before `init`.
    #[error("audio engine not initialized")]
    NotInitialized,
    /// No sound is cached under this key.
    #[error("sound '{key}' is not loaded")]
    NotLoaded {
        /// Descriptor key.
        key: String,
    },
    /// No bank is cached under this key.
    #[error("bank '{key}' is not loaded")]
    BankNotLoaded {
        /// Bank key.
        key: String,
    },
    /// The key already has a running loop and the replay policy is `reject`.
    #[error("sound '{key}' is already looping")]
    AlreadyLooping {
        /// Descriptor key.
        key: String,
    },
    /// A backend call failed.
    #[error("{op} failed at {file}:{line}: {source}")]
    Backend {
        /// Backend operation name.
        op: &'static str,
        /// Source file of the facade call.
        file: &'static str,
        /// Source line of the facade call.
        line: u32,
        /// Backend error.
        #[source]
        source: BackendError,
    },
    /// The configuration could not be parsed or written.
    #[error("invalid audio config: {0}")]
    Config(String),
}

/// Convert a backend result into a facade result, logging failures with the
/// caller's source location.
#[track_caller]
pub(crate) fn check<T>(op: &'static str, result: Result<T, BackendError>) -> Result<T, AudioError> {
    let location = Location::caller();
    result.map_err(|source| {
        warn!(
            file = location.file(),
            line = location.line(),
            op,
            error = %source,
            "audio backend call failed"
        );
        AudioError::Backend {
            op,
            file: location.file(),
            line: location.line(),
            source,
        }
    })
}

/// Log a facade-level error and hand it back.
pub(crate) fn report(err: AudioError) -> AudioError {
    warn!(error = %err, "audio request rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_captures_call_site() {
        let line = line!() + 1;
        let err = check::<()>("play", Err(BackendError::InvalidHandle)).unwrap_err();
        match err {
            AudioError::Backend {
                op,
                file,
                line: got,
                ..
            } => {
                assert_eq!(op, "play");
                assert!(file.ends_with("error.rs"));
                assert_eq!(got, line);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn messages_include_backend_reason() {
        let err = check::<()>("create_sound", Err(BackendError::ChannelLimit { max: 8 })).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("create_sound failed at "));
        assert!(text.ends_with("channel limit reached (8 channels)"));
    }
}

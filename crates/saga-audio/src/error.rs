//! Error types for the audio subsystem.

use std::path::PathBuf;

use thiserror::Error;

use crate::object::AudioState;

/// Audio subsystem error types.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// No audio device available.
    #[error("No audio device available")]
    NoDevice,

    /// The device refused to allocate a single voice.
    #[error("Audio device could not allocate any playback sources")]
    NoVoices,

    /// Audio engine not initialized.
    #[error("Audio engine not initialized")]
    NotInitialized,

    /// Backend voice or buffer allocation failed.
    #[error("Audio backend allocation failed: {0}")]
    AllocationFailed(String),

    /// Failed to load audio file.
    #[error("Failed to load audio file '{path}': {message}")]
    LoadFailed {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// No decoder handles this file extension.
    #[error("Unsupported audio format: '{0}'")]
    UnsupportedFormat(String),

    /// Failed to decode audio data.
    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    /// Every playback source is busy.
    #[error("No free playback sources available (max: {max})")]
    NoFreeSources {
        /// Number of sources in the pool.
        max: usize,
    },

    /// The operation needs a bound playback source and none is bound.
    #[error("Audio '{0}' has no playback source")]
    NoBoundSource(String),

    /// The operation is not valid in the current state.
    #[error("Audio '{name}' cannot {operation} while {state:?}")]
    InvalidState {
        /// Name of the audio resource.
        name: String,
        /// Rejected operation.
        operation: &'static str,
        /// State at the time of the call.
        state: AudioState,
    },

    /// The resource cache is full and holds nothing that may be evicted.
    #[error("Audio cache full ({max} entries) and no entry is stopped or freed")]
    CacheFull {
        /// Maximum cache size.
        max: usize,
    },

    /// No cache entry exists for the file.
    #[error("No cached audio for '{0}'")]
    NotCached(String),

    /// A cache entry exists but holds the other kind of audio.
    #[error("Cached audio '{filename}' is not {expected}")]
    WrongKind {
        /// Cache key.
        filename: String,
        /// Kind the caller asked for.
        expected: &'static str,
    },

    /// The handle no longer refers to a live audio object.
    #[error("Invalid audio handle")]
    InvalidHandle,

    /// A seek target lies outside the audio data.
    #[error("Seek to frame {requested} out of range (total {total})")]
    SeekOutOfRange {
        /// Requested frame.
        requested: u64,
        /// Total frames in the audio.
        total: u64,
    },
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

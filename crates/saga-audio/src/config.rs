//! Audio engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::object::DEFAULT_STREAM_BUFFER_FRAMES;

/// Number of playback sources requested from the device.
pub const DEFAULT_MAX_SOURCES: usize = 64;

/// Default music cross-fade in milliseconds.
pub const DEFAULT_CROSSFADE_MS: u64 = 500;

/// Audio engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Playback sources to allocate (the device may grant fewer).
    pub max_sources: usize,
    /// Maximum cached files for fire-and-forget playback.
    pub max_cache_size: usize,
    /// Global sound effect volume (0.0-1.0).
    pub sound_volume: f32,
    /// Global music volume (0.0-1.0).
    pub music_volume: f32,
    /// Frames decoded into each streaming buffer.
    pub stream_buffer_frames: usize,
    /// Cross-fade between music tracks, in milliseconds.
    pub music_crossfade_ms: u64,
    /// Output device to open instead of the most capable one.
    pub preferred_device: Option<String>,
    /// Use the virtual backend instead of real hardware.
    pub headless: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_sources: DEFAULT_MAX_SOURCES,
            max_cache_size: DEFAULT_MAX_SOURCES / 4,
            sound_volume: 1.0,
            music_volume: 1.0,
            stream_buffer_frames: DEFAULT_STREAM_BUFFER_FRAMES,
            music_crossfade_ms: DEFAULT_CROSSFADE_MS,
            preferred_device: None,
            headless: false,
        }
    }
}

impl AudioConfig {
    /// Set the source count; the cache cap follows at a quarter of it.
    #[must_use]
    pub fn with_max_sources(mut self, max: usize) -> Self {
        self.max_sources = max;
        self.max_cache_size = (max / 4).max(1);
        self
    }

    /// Set the cache cap.
    #[must_use]
    pub const fn with_max_cache_size(mut self, max: usize) -> Self {
        self.max_cache_size = max;
        self
    }

    /// Set both global volumes.
    #[must_use]
    pub const fn with_volumes(mut self, sound: f32, music: f32) -> Self {
        self.sound_volume = sound;
        self.music_volume = music;
        self
    }

    /// Set the streaming buffer size.
    #[must_use]
    pub const fn with_stream_buffer_frames(mut self, frames: usize) -> Self {
        self.stream_buffer_frames = frames;
        self
    }

    /// Select the virtual backend.
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Prefer a device by name.
    #[must_use]
    pub fn with_preferred_device(mut self, name: impl Into<String>) -> Self {
        self.preferred_device = Some(name.into());
        self
    }

    /// Music cross-fade duration.
    #[must_use]
    pub const fn music_crossfade(&self) -> Duration {
        Duration::from_millis(self.music_crossfade_ms)
    }

    /// Clamp values to usable ranges.
    pub fn validate(&mut self) {
        if self.max_sources == 0 {
            warn!("max_sources must be at least 1");
            self.max_sources = 1;
        }
        self.max_cache_size = self.max_cache_size.clamp(1, self.max_sources);
        self.sound_volume = self.sound_volume.clamp(0.0, 1.0);
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
        self.stream_buffer_frames = self.stream_buffer_frames.clamp(256, 1 << 20);
    }
}

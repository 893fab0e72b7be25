//! Hardware Backend Seam
//!
//! The audio objects never talk to a device directly. Everything goes through
//! [`AudioBackend`], an OpenAL-shaped interface of voices (mixer channels) and
//! buffers (blocks of interleaved 16-bit PCM):
//!
//! ```text
//! ┌─────────────┐   attach / queue   ┌─────────────┐
//! │   Buffer    │ ─────────────────▶ │    Voice    │ ──▶ device mix
//! │ (i16 frames)│ ◀───────────────── │ (gain, loop,│
//! └─────────────┘  unqueue processed │  offset)    │
//!                                    └─────────────┘
//! ```
//!
//! Two implementations ship with the crate:
//! - [`RodioBackend`](crate::rodio_backend::RodioBackend): real output through rodio/cpal
//! - [`VirtualBackend`](crate::virtual_backend::VirtualBackend): deterministic
//!   software voices for headless runs and tests

use std::time::Duration;

use glam::Vec3;

use crate::error::AudioResult;
use crate::listener::Listener;

/// Backend handle of one voice (mixer channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u32);

impl VoiceId {
    /// Create a voice ID from a raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw ID.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Backend handle of one sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

impl BufferHandle {
    /// Create a buffer handle from a raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw handle.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Playback state reported by a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Never played, or rewound.
    #[default]
    Initial,
    /// Producing sound.
    Playing,
    /// Paused mid-playback.
    Paused,
    /// Finished or stopped.
    Stopped,
}

impl VoiceState {
    /// Whether the voice is idle and may be handed to another owner.
    #[must_use]
    pub const fn is_reclaimable(self) -> bool {
        matches!(self, Self::Initial | Self::Stopped)
    }
}

/// Layout of interleaved PCM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits per sample of the decoded output.
    pub bits_per_sample: u16,
    /// Sample frames per second.
    pub samples_per_second: u32,
}

impl PcmSpec {
    /// Create a 16-bit spec.
    #[must_use]
    pub const fn new(channels: u16, samples_per_second: u32) -> Self {
        Self {
            channels,
            bits_per_sample: 16,
            samples_per_second,
        }
    }

    /// Bytes in one frame (one sample for each channel).
    #[must_use]
    pub const fn bytes_per_frame(&self) -> u32 {
        self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }

    /// Convert a frame count into a duration.
    #[must_use]
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.samples_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.samples_per_second))
    }

    /// Convert seconds into a frame index.
    #[must_use]
    pub fn seconds_to_frames(&self, seconds: f32) -> u64 {
        (f64::from(seconds.max(0.0)) * f64::from(self.samples_per_second)) as u64
    }
}

/// An output device the backend can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name as reported by the host.
    pub name: String,
    /// Backend-reported capability level; higher is preferred.
    pub version: u32,
}

impl DeviceInfo {
    /// Create a device description.
    #[must_use]
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// 3D placement of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceSpatial {
    /// Position in world space.
    pub position: Vec3,
    /// Velocity (for Doppler).
    pub velocity: Vec3,
    /// Facing direction (zero for omnidirectional).
    pub direction: Vec3,
}

/// A device capable of mixing voices.
///
/// All calls are synchronous and made from the thread that owns the engine.
pub trait AudioBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Enumerate output devices.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Open a device (or the host default when `None`) and create the context.
    fn open_device(&mut self, device: Option<&DeviceInfo>) -> AudioResult<()>;

    /// Close the device; every voice and buffer becomes invalid.
    fn close_device(&mut self);

    /// Allocate a voice. Fails once the device runs out of channels.
    fn create_voice(&mut self) -> AudioResult<VoiceId>;

    /// Release a voice.
    fn destroy_voice(&mut self, voice: VoiceId);

    /// Allocate an empty buffer.
    fn create_buffer(&mut self) -> AudioResult<BufferHandle>;

    /// Release a buffer.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Replace the contents of a buffer with interleaved samples.
    fn fill_buffer(&mut self, buffer: BufferHandle, spec: PcmSpec, samples: &[i16])
        -> AudioResult<()>;

    /// Bind a single static buffer to a voice, or detach everything with `None`.
    fn attach_buffer(&mut self, voice: VoiceId, buffer: Option<BufferHandle>);

    /// Append buffers to a voice's streaming queue.
    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]);

    /// Remove and return buffers the voice has finished playing.
    fn unqueue_processed(&mut self, voice: VoiceId) -> Vec<BufferHandle>;

    /// Number of buffers still queued (processed ones included until unqueued).
    fn queued_buffers(&self, voice: VoiceId) -> usize;

    /// Current hardware state of a voice.
    fn voice_state(&mut self, voice: VoiceId) -> VoiceState;

    /// Start or resume playback.
    fn play(&mut self, voice: VoiceId);

    /// Pause playback.
    fn pause(&mut self, voice: VoiceId);

    /// Stop playback; queued buffers count as processed.
    fn stop(&mut self, voice: VoiceId);

    /// Stop and return the voice to its initial state.
    fn rewind(&mut self, voice: VoiceId);

    /// Set the voice gain (0.0-1.0).
    fn set_gain(&mut self, voice: VoiceId, gain: f32);

    /// Set whether a static buffer loops.
    fn set_looping(&mut self, voice: VoiceId, looping: bool);

    /// Move the playback cursor of a static buffer.
    fn set_sample_offset(&mut self, voice: VoiceId, frame: u64);

    /// Current playback cursor in frames.
    fn sample_offset(&self, voice: VoiceId) -> u64;

    /// Set the voice's 3D placement.
    fn set_voice_spatial(&mut self, voice: VoiceId, spatial: VoiceSpatial);

    /// Set the listener placement.
    fn set_listener(&mut self, listener: &Listener);

    /// Advance simulated time. Hardware backends run on their own clock.
    fn advance(&mut self, _elapsed: Duration) {}
}

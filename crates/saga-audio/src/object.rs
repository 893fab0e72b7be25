//! Audio Objects
//!
//! An [`AudioObject`] is one loaded sound or music asset together with its
//! playback state machine:
//!
//! ```text
//!             load_audio            play
//! UNLOADED ──────────────▶ STOPPED ◀──────▶ PLAYING ◀──────▶ PAUSED
//!    ▲                        ▲     stop       │  ▲   pause/resume
//!    │ free_audio (any state) │                ▼  │
//!    └────────────────────────┴──────── FADE_IN / FADE_OUT
//! ```
//!
//! FADE_IN resolves to PLAYING at full volume; FADE_OUT resolves to STOPPED at
//! zero volume. Objects never own a voice: they borrow one from the engine's
//! [`SourcePool`] through an [`AudioContext`] and must re-validate it on every
//! call, since the pool may hand an idle voice to someone else.

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use saga_common::GameModeId;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, PcmSpec, VoiceId, VoiceSpatial, VoiceState};
use crate::buffer::DecodedBuffer;
use crate::decoder::{AudioDecoder, FileDecoder};
use crate::error::{AudioError, AudioResult};
use crate::handle::AudioId;
use crate::source::SourcePool;
use crate::stream::AudioStream;

/// Fades shorter than this complete immediately.
pub const NEGLIGIBLE_FADE: Duration = Duration::from_millis(10);

/// Default frames per streaming buffer.
pub const DEFAULT_STREAM_BUFFER_FRAMES: usize = 8192;

/// Frames decoded per read when loading a static buffer.
const STATIC_READ_FRAMES: usize = 4096;

/// Playback state of an audio object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioState {
    /// Nothing loaded.
    #[default]
    Unloaded,
    /// Loaded and silent.
    Stopped,
    /// Playing at its set volume.
    Playing,
    /// Paused mid-playback.
    Paused,
    /// Playing while the volume ramps up.
    FadeIn,
    /// Playing while the volume ramps down to a stop.
    FadeOut,
}

impl AudioState {
    /// Whether the object is audible (playing or fading).
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing | Self::FadeIn | Self::FadeOut)
    }

    /// Whether the state requires a bound playback source.
    #[must_use]
    pub const fn needs_source(self) -> bool {
        self.is_playing() || matches!(self, Self::Paused)
    }
}

/// How audio data reaches the voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Decode everything into one buffer at load time.
    #[default]
    Static,
    /// Decode from the file while playing.
    StreamFile,
    /// Read the file into memory, decode from there while playing.
    StreamMemory,
}

impl LoadMode {
    /// Whether data is decoded while playing.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// Sound effect or music track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioKind {
    /// Sound effect; many may play at once.
    Sound,
    /// Music track; one is active at a time.
    Music,
}

impl AudioKind {
    /// Lowercase name for messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sound => "sound",
            Self::Music => "music",
        }
    }
}

/// Engine resources an object needs for one operation.
pub struct AudioContext<'a, B: AudioBackend> {
    /// Hardware backend.
    pub backend: &'a mut B,
    /// Shared playback sources.
    pub sources: &'a mut SourcePool,
    /// Global volume of the object's kind.
    pub category_volume: f32,
}

/// One loaded sound or music asset.
pub struct AudioObject {
    id: AudioId,
    kind: AudioKind,
    filename: String,
    state: AudioState,
    load_mode: LoadMode,
    looping: bool,
    volume: f32,

    fade_duration: Duration,
    fade_elapsed: Duration,
    fade_origin: f32,

    position: Vec3,
    velocity: Vec3,
    direction: Vec3,

    /// Stored playback offset in frames.
    offset: u64,
    owners: Vec<GameModeId>,

    /// Index into the source pool; trusted only while the pool agrees.
    source: Option<usize>,
    buffer: Option<DecodedBuffer>,
    stream: Option<AudioStream>,
    spec: Option<PcmSpec>,
    total_frames: Option<u64>,
    stream_buffer_frames: usize,
    scratch: Vec<i16>,
}

impl std::fmt::Debug for AudioObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("state", &self.state)
            .field("load_mode", &self.load_mode)
            .field("volume", &self.volume)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl AudioObject {
    /// Create an unloaded object.
    #[must_use]
    pub fn new(id: AudioId, kind: AudioKind) -> Self {
        Self {
            id,
            kind,
            filename: String::new(),
            state: AudioState::Unloaded,
            load_mode: LoadMode::Static,
            looping: false,
            volume: 1.0,
            fade_duration: Duration::ZERO,
            fade_elapsed: Duration::ZERO,
            fade_origin: 0.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            direction: Vec3::ZERO,
            offset: 0,
            owners: Vec::new(),
            source: None,
            buffer: None,
            stream: None,
            spec: None,
            total_frames: None,
            stream_buffer_frames: DEFAULT_STREAM_BUFFER_FRAMES,
            scratch: Vec::new(),
        }
    }

    // ============================================
    // Accessors
    // ============================================

    /// Handle of this object.
    #[must_use]
    pub const fn id(&self) -> AudioId {
        self.id
    }

    /// Sound or music.
    #[must_use]
    pub const fn kind(&self) -> AudioKind {
        self.kind
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AudioState {
        self.state
    }

    /// Instance volume (0.0-1.0).
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Whether playback loops.
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    /// Stored playback offset in frames.
    #[must_use]
    pub const fn sample_offset(&self) -> u64 {
        self.offset
    }

    /// Total frames of the loaded data, when known.
    #[must_use]
    pub const fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Playing time of the loaded data, when known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.spec?.frames_to_duration(self.total_frames?))
    }

    /// File the object was loaded from; empty when unloaded.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Game modes claiming this object.
    #[must_use]
    pub fn owners(&self) -> &[GameModeId] {
        &self.owners
    }

    /// How the data was loaded.
    #[must_use]
    pub const fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    /// Layout of the decoded data.
    #[must_use]
    pub const fn spec(&self) -> Option<PcmSpec> {
        self.spec
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Facing direction.
    #[must_use]
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Index of the bound playback source, if the pool still agrees.
    #[must_use]
    pub fn source_index(&self, sources: &SourcePool) -> Option<usize> {
        self.source.filter(|&index| sources.is_owned_by(index, self.id))
    }

    fn is_streaming(&self) -> bool {
        self.buffer.as_ref().is_some_and(DecodedBuffer::is_streaming)
    }

    fn display_name(&self) -> &str {
        if self.filename.is_empty() {
            self.kind.name()
        } else {
            &self.filename
        }
    }

    fn invalid(&self, operation: &'static str) -> AudioError {
        AudioError::InvalidState {
            name: self.display_name().to_string(),
            operation,
            state: self.state,
        }
    }

    fn spatial(&self) -> VoiceSpatial {
        VoiceSpatial {
            position: self.position,
            velocity: self.velocity,
            direction: self.direction,
        }
    }

    fn voice<B: AudioBackend>(&self, ctx: &AudioContext<'_, B>) -> Option<VoiceId> {
        self.source_index(ctx.sources)
            .and_then(|index| ctx.sources.voice(index))
    }

    fn require_voice<B: AudioBackend>(
        &self,
        ctx: &AudioContext<'_, B>,
        operation: &str,
    ) -> AudioResult<VoiceId> {
        self.voice(ctx).ok_or_else(|| {
            warn!("Cannot {} '{}': no playback source", operation, self.display_name());
            AudioError::NoBoundSource(self.display_name().to_string())
        })
    }

    // ============================================
    // Loading
    // ============================================

    /// Load a file, replacing anything loaded before.
    ///
    /// The object ends up STOPPED. Failing to get a playback source is only
    /// logged; one is acquired again on the next `play`.
    pub fn load_audio<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        filename: &str,
        mode: LoadMode,
        stream_buffer_frames: usize,
    ) -> AudioResult<()> {
        if self.state != AudioState::Unloaded {
            self.free_audio(ctx);
        }

        let path = Path::new(filename);
        let decoder = match mode {
            LoadMode::StreamMemory => FileDecoder::open_in_memory(path)?,
            LoadMode::Static | LoadMode::StreamFile => FileDecoder::open(path)?,
        };
        let spec = decoder.spec();

        if mode.is_streaming() {
            let mut stream = AudioStream::new(Box::new(decoder));
            stream.set_looping(self.looping);
            let buffer = DecodedBuffer::allocate_streaming(ctx.backend)?;
            self.total_frames = stream.total_frames();
            self.stream = Some(stream);
            self.buffer = Some(buffer);
        } else {
            let (samples, frames) = decode_all(decoder)?;
            self.buffer = Some(DecodedBuffer::allocate_static(ctx.backend, spec, &samples)?);
            self.total_frames = Some(frames);
        }

        self.filename = filename.to_string();
        self.spec = Some(spec);
        self.load_mode = mode;
        self.stream_buffer_frames = stream_buffer_frames.max(1);
        self.offset = 0;
        self.state = AudioState::Stopped;
        debug!(
            "Loaded {} '{}' ({:?}, {:?} frames)",
            self.kind.name(),
            filename,
            mode,
            self.total_frames
        );

        if let Err(e) = self.acquire_source(ctx) {
            warn!("'{}' loaded without a playback source: {}", filename, e);
        }
        Ok(())
    }

    /// Release the source, buffers and decoder and return to UNLOADED.
    pub fn free_audio<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) {
        if let Some(index) = self.source.take() {
            if ctx.sources.is_owned_by(index, self.id) {
                ctx.sources.release(index, ctx.backend);
            }
        }
        if let Some(buffer) = self.buffer.take() {
            buffer.release(ctx.backend);
        }
        if self.state != AudioState::Unloaded {
            debug!("Freed {} '{}'", self.kind.name(), self.filename);
        }
        self.stream = None;
        self.spec = None;
        self.total_frames = None;
        self.filename.clear();
        self.offset = 0;
        self.fade_duration = Duration::ZERO;
        self.fade_elapsed = Duration::ZERO;
        self.state = AudioState::Unloaded;
    }

    /// Forget a source the pool handed to another object.
    pub(crate) fn detach_source(&mut self) {
        self.source = None;
        if self.state.needs_source() {
            debug!("'{}' lost its playback source", self.filename);
            self.state = AudioState::Stopped;
        }
        if let Some(buffer) = &mut self.buffer {
            buffer.reset_idle();
        }
    }

    fn acquire_source<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<VoiceId> {
        if let Some(voice) = self.voice(ctx) {
            return Ok(voice);
        }
        let index = ctx
            .sources
            .acquire(self.id, ctx.backend)
            .ok_or(AudioError::NoFreeSources {
                max: ctx.sources.len(),
            })?;
        self.source = Some(index);
        let voice = ctx.sources.voice(index).ok_or(AudioError::InvalidHandle)?;

        ctx.backend.set_gain(voice, self.volume * ctx.category_volume);
        ctx.backend.set_voice_spatial(voice, self.spatial());
        match &self.buffer {
            Some(DecodedBuffer::Static(buffer)) => {
                ctx.backend.attach_buffer(voice, Some(*buffer));
                ctx.backend.set_looping(voice, self.looping);
            },
            Some(DecodedBuffer::Streaming { .. }) => {
                ctx.backend.set_looping(voice, false);
                self.rewind_stream(ctx, voice)?;
            },
            None => {},
        }
        Ok(voice)
    }

    // ============================================
    // Streaming
    // ============================================

    /// Clear the voice queue, seek to the stored offset and queue a full ring.
    fn rewind_stream<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        voice: VoiceId,
    ) -> AudioResult<()> {
        ctx.backend.attach_buffer(voice, None);
        if let Some(buffer) = &mut self.buffer {
            buffer.reset_idle();
        }
        if let Some(stream) = &mut self.stream {
            stream.seek(self.offset)?;
        }
        self.queue_idle(ctx.backend, voice)
    }

    /// Fill idle ring buffers from the stream and queue them.
    fn queue_idle<B: AudioBackend>(&mut self, backend: &mut B, voice: VoiceId) -> AudioResult<()> {
        let (Some(buffer), Some(stream), Some(spec)) =
            (self.buffer.as_mut(), self.stream.as_mut(), self.spec)
        else {
            return Ok(());
        };

        while !stream.is_end_of_stream() {
            let Some(handle) = buffer.take_idle() else {
                break;
            };
            self.scratch.clear();
            let filled = stream
                .fill(&mut self.scratch, self.stream_buffer_frames)
                .and_then(|frames| {
                    if frames > 0 {
                        backend.fill_buffer(handle, spec, &self.scratch)?;
                    }
                    Ok(frames)
                });
            match filled {
                Ok(0) => {
                    buffer.mark_idle(&[handle]);
                    break;
                },
                Ok(_) => backend.queue_buffers(voice, &[handle]),
                Err(e) => {
                    buffer.mark_idle(&[handle]);
                    return Err(e);
                },
            }
        }
        Ok(())
    }

    fn update_stream<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        voice: VoiceId,
    ) -> AudioResult<()> {
        let processed = ctx.backend.unqueue_processed(voice);
        if let Some(buffer) = &mut self.buffer {
            buffer.mark_idle(&processed);
        }
        self.queue_idle(ctx.backend, voice)?;

        let queued = ctx.backend.queued_buffers(voice);
        let ended = self
            .stream
            .as_ref()
            .map_or(true, AudioStream::is_end_of_stream);
        if queued == 0 && ended {
            debug!("Stream '{}' finished", self.filename);
            self.state = AudioState::Stopped;
            return self.rewind_stream(ctx, voice);
        }
        if queued > 0 && ctx.backend.voice_state(voice) != VoiceState::Playing {
            debug!("Restarting starved stream '{}'", self.filename);
            ctx.backend.play(voice);
        }
        Ok(())
    }

    // ============================================
    // Playback
    // ============================================

    /// Start or resume playback. Cancels a running fade.
    pub fn play<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<()> {
        match self.state {
            AudioState::Unloaded => Err(self.invalid("play")),
            AudioState::Playing => Ok(()),
            AudioState::FadeIn | AudioState::FadeOut => {
                self.state = AudioState::Playing;
                Ok(())
            },
            AudioState::Stopped | AudioState::Paused => {
                let voice = self.acquire_source(ctx).map_err(|e| {
                    warn!("Cannot play '{}': {}", self.filename, e);
                    e
                })?;
                // A pause issued while stopped leaves the voice stopped.
                let from_top = self.state == AudioState::Stopped
                    || ctx.backend.voice_state(voice) != VoiceState::Paused;
                if from_top {
                    if self.is_streaming() {
                        if ctx.backend.queued_buffers(voice) == 0 {
                            self.rewind_stream(ctx, voice)?;
                        }
                    } else if self.offset > 0 {
                        ctx.backend.set_sample_offset(voice, self.offset);
                    }
                }
                ctx.backend.play(voice);
                self.state = AudioState::Playing;
                Ok(())
            },
        }
    }

    /// Stop playback and return to the stored offset.
    pub fn stop<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<()> {
        if matches!(self.state, AudioState::Unloaded | AudioState::Stopped) {
            return Ok(());
        }
        let voice = self.require_voice(ctx, "stop")?;
        ctx.backend.stop(voice);
        self.state = AudioState::Stopped;
        if self.is_streaming() {
            self.rewind_stream(ctx, voice)?;
        }
        Ok(())
    }

    /// Pause the object; a stopped object holding a source becomes paused too.
    pub fn pause<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<()> {
        if matches!(self.state, AudioState::Paused | AudioState::Unloaded) {
            return Ok(());
        }
        let voice = self.require_voice(ctx, "pause")?;
        ctx.backend.pause(voice);
        self.state = AudioState::Paused;
        Ok(())
    }

    /// Resume a paused object; no-op in any other state.
    pub fn resume<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<()> {
        if self.state == AudioState::Paused {
            self.play(ctx)
        } else {
            Ok(())
        }
    }

    /// Stop and move back to the first frame.
    pub fn rewind<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>) -> AudioResult<()> {
        if self.state == AudioState::Unloaded {
            return Ok(());
        }
        self.offset = 0;
        self.state = AudioState::Stopped;
        let Some(voice) = self.voice(ctx) else {
            return Ok(());
        };
        ctx.backend.rewind(voice);
        if self.is_streaming() {
            self.rewind_stream(ctx, voice)?;
        }
        Ok(())
    }

    /// Ramp the volume up to full, starting playback if needed.
    pub fn fade_in<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        duration: Duration,
    ) -> AudioResult<()> {
        if self.state == AudioState::Unloaded {
            return Err(self.invalid("fade in"));
        }
        if !self.state.is_playing() {
            self.play(ctx)?;
        }
        if self.volume >= 1.0 {
            self.state = AudioState::Playing;
            return Ok(());
        }
        if duration <= NEGLIGIBLE_FADE {
            self.volume = 1.0;
            self.refresh_gain(ctx);
            self.state = AudioState::Playing;
            return Ok(());
        }
        self.fade_duration = duration;
        self.fade_elapsed = Duration::ZERO;
        self.state = AudioState::FadeIn;
        Ok(())
    }

    /// Ramp the volume down to zero, then stop.
    pub fn fade_out<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        duration: Duration,
    ) -> AudioResult<()> {
        match self.state {
            AudioState::Unloaded | AudioState::Stopped => return Ok(()),
            AudioState::Paused => return self.stop(ctx),
            _ => {},
        }
        if self.volume <= 0.0 || duration <= NEGLIGIBLE_FADE {
            self.volume = 0.0;
            self.refresh_gain(ctx);
            return self.stop(ctx);
        }
        self.fade_origin = self.volume;
        self.fade_duration = duration;
        self.fade_elapsed = Duration::ZERO;
        self.state = AudioState::FadeOut;
        Ok(())
    }

    fn handle_fades<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        elapsed: Duration,
    ) -> AudioResult<()> {
        match self.state {
            AudioState::FadeOut => {
                self.fade_elapsed += elapsed;
                let progress = if self.fade_duration <= NEGLIGIBLE_FADE {
                    1.0
                } else {
                    self.fade_elapsed.as_secs_f32() / self.fade_duration.as_secs_f32()
                };
                let volume = self.fade_origin * (1.0 - progress);
                if volume <= 0.0 {
                    self.volume = 0.0;
                    self.refresh_gain(ctx);
                    return self.stop(ctx);
                }
                self.volume = volume;
                self.refresh_gain(ctx);
            },
            AudioState::FadeIn => {
                if self.fade_duration <= NEGLIGIBLE_FADE {
                    self.volume = 1.0;
                } else {
                    self.volume += elapsed.as_secs_f32() / self.fade_duration.as_secs_f32();
                }
                if self.volume >= 1.0 {
                    self.volume = 1.0;
                    self.state = AudioState::Playing;
                }
                self.refresh_gain(ctx);
            },
            _ => {},
        }
        Ok(())
    }

    /// Per-frame step: detect hardware stops, run fades, refill streams.
    pub fn update<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        elapsed: Duration,
    ) -> AudioResult<()> {
        if !self.state.is_playing() {
            return Ok(());
        }
        let Some(voice) = self.voice(ctx) else {
            self.state = AudioState::Stopped;
            return Ok(());
        };

        let streaming = self.is_streaming();
        if !streaming && ctx.backend.voice_state(voice) != VoiceState::Playing {
            debug!("'{}' finished playing", self.filename);
            self.state = AudioState::Stopped;
            return Ok(());
        }

        self.handle_fades(ctx, elapsed)?;

        if streaming && self.state.is_playing() {
            self.update_stream(ctx, voice)?;
        }
        Ok(())
    }

    // ============================================
    // Settings
    // ============================================

    /// Enable or disable looping.
    pub fn set_looping<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>, looping: bool) {
        if self.looping == looping {
            return;
        }
        self.looping = looping;
        if let Some(stream) = &mut self.stream {
            stream.set_looping(looping);
        } else if let Some(voice) = self.voice(ctx) {
            ctx.backend.set_looping(voice, looping);
        }
    }

    /// Frame a looping stream wraps back to.
    pub fn set_loop_start(&mut self, frame: u64) -> AudioResult<()> {
        match &mut self.stream {
            Some(stream) => stream.set_loop_start(frame).map_err(|e| {
                warn!("Invalid loop start for '{}': {}", self.filename, e);
                e
            }),
            None => {
                warn!("Loop points need a streamed load: '{}'", self.display_name());
                Err(self.invalid("set loop start"))
            },
        }
    }

    /// Frame at which a looping stream wraps.
    pub fn set_loop_end(&mut self, frame: u64) -> AudioResult<()> {
        match &mut self.stream {
            Some(stream) => stream.set_loop_end(frame).map_err(|e| {
                warn!("Invalid loop end for '{}': {}", self.filename, e);
                e
            }),
            None => {
                warn!("Loop points need a streamed load: '{}'", self.display_name());
                Err(self.invalid("set loop end"))
            },
        }
    }

    /// Move playback to `frame`.
    pub fn seek_sample<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        frame: u64,
    ) -> AudioResult<()> {
        if self.state == AudioState::Unloaded {
            return Err(self.invalid("seek"));
        }
        if let Some(total) = self.total_frames {
            if frame >= total {
                warn!(
                    "Seek to frame {} past the end of '{}' ({} frames)",
                    frame, self.filename, total
                );
                return Err(AudioError::SeekOutOfRange {
                    requested: frame,
                    total,
                });
            }
        }
        self.offset = frame;

        let voice = self.voice(ctx);
        if self.is_streaming() {
            match voice {
                Some(voice) => {
                    self.rewind_stream(ctx, voice)?;
                    if self.state.needs_source() {
                        ctx.backend.play(voice);
                    }
                    if self.state == AudioState::Paused {
                        ctx.backend.pause(voice);
                    }
                },
                None => {
                    if let Some(stream) = &mut self.stream {
                        stream.seek(frame)?;
                    }
                },
            }
        } else if let Some(voice) = voice {
            ctx.backend.set_sample_offset(voice, frame);
        }
        Ok(())
    }

    /// Move playback to `seconds` from the start.
    pub fn seek_second<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        seconds: f32,
    ) -> AudioResult<()> {
        let spec = self.spec.ok_or_else(|| self.invalid("seek"))?;
        if seconds < 0.0 {
            warn!("Negative seek time {} for '{}'", seconds, self.filename);
            return Err(AudioError::SeekOutOfRange {
                requested: 0,
                total: self.total_frames.unwrap_or(0),
            });
        }
        self.seek_sample(ctx, spec.seconds_to_frames(seconds))
    }

    /// Set the instance volume, clamped to 0.0-1.0.
    pub fn set_volume<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        if (clamped - volume).abs() > f32::EPSILON || volume.is_nan() {
            warn!("Volume {} out of range for '{}', clamping", volume, self.display_name());
        }
        self.volume = if volume.is_nan() { 0.0 } else { clamped };
        self.refresh_gain(ctx);
    }

    /// Push `volume * category_volume` to the bound voice.
    pub fn refresh_gain<B: AudioBackend>(&self, ctx: &mut AudioContext<'_, B>) {
        if let Some(voice) = self.voice(ctx) {
            ctx.backend.set_gain(voice, self.volume * ctx.category_volume);
        }
    }

    /// Set the world position.
    pub fn set_position<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>, position: Vec3) {
        self.position = position;
        self.push_spatial(ctx);
    }

    /// Set the velocity.
    pub fn set_velocity<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>, velocity: Vec3) {
        self.velocity = velocity;
        self.push_spatial(ctx);
    }

    /// Set the facing direction.
    pub fn set_direction<B: AudioBackend>(&mut self, ctx: &mut AudioContext<'_, B>, direction: Vec3) {
        self.direction = direction;
        self.push_spatial(ctx);
    }

    fn push_spatial<B: AudioBackend>(&self, ctx: &mut AudioContext<'_, B>) {
        if let Some(voice) = self.voice(ctx) {
            ctx.backend.set_voice_spatial(voice, self.spatial());
        }
    }

    // ============================================
    // Ownership
    // ============================================

    /// Record a game mode as owner. Returns false if it already was one.
    pub fn add_owner(&mut self, owner: GameModeId) -> bool {
        if self.owners.contains(&owner) {
            warn!("{} already owns '{}'", owner, self.display_name());
            return false;
        }
        self.owners.push(owner);
        true
    }

    /// Drop a game mode owner. Returns true when that was the last owner and
    /// the object has been freed.
    pub fn remove_owner<B: AudioBackend>(
        &mut self,
        ctx: &mut AudioContext<'_, B>,
        owner: GameModeId,
    ) -> bool {
        let Some(pos) = self.owners.iter().position(|o| *o == owner) else {
            return false;
        };
        self.owners.remove(pos);
        if self.owners.is_empty() {
            self.free_audio(ctx);
            return true;
        }
        false
    }
}

/// Decode a whole file, returning samples and frame count.
fn decode_all(mut decoder: FileDecoder) -> AudioResult<(Vec<i16>, u64)> {
    let mut samples = Vec::new();
    let mut frames = 0u64;
    loop {
        let read = decoder.read(&mut samples, STATIC_READ_FRAMES)?;
        if read == 0 {
            break;
        }
        frames += read as u64;
    }
    Ok((samples, frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_wav;
    use crate::virtual_backend::VirtualBackend;
    use tempfile::TempDir;

    const STEP: Duration = Duration::from_millis(50);

    struct Rig {
        backend: VirtualBackend,
        sources: SourcePool,
        dir: TempDir,
    }

    impl Rig {
        fn new(voices: usize) -> Self {
            let mut backend = VirtualBackend::new().with_voice_limit(voices);
            backend.open_device(None).expect("open");
            let sources = SourcePool::allocate(&mut backend, voices);
            Self {
                backend,
                sources,
                dir: TempDir::new().expect("temp dir"),
            }
        }

        fn ctx(&mut self) -> AudioContext<'_, VirtualBackend> {
            AudioContext {
                backend: &mut self.backend,
                sources: &mut self.sources,
                category_volume: 1.0,
            }
        }

        /// Mono WAV at 1000 Hz, so frames equal milliseconds.
        fn wav(&self, name: &str, frames: u32) -> String {
            write_wav(self.dir.path(), name, 1, 1000, frames)
                .to_string_lossy()
                .into_owned()
        }

        fn load(&mut self, n: u32, frames: u32, mode: LoadMode) -> AudioObject {
            let path = self.wav(&format!("clip{n}.wav"), frames);
            let mut object = AudioObject::new(AudioId::new(n, 0), AudioKind::Sound);
            object
                .load_audio(&mut self.ctx(), &path, mode, 100)
                .expect("load");
            object
        }

        fn tick(&mut self, object: &mut AudioObject) {
            self.backend.advance(STEP);
            object.update(&mut self.ctx(), STEP).expect("update");
        }
    }

    #[test]
    fn test_load_static() {
        let mut rig = Rig::new(4);
        let object = rig.load(0, 500, LoadMode::Static);
        assert_eq!(object.state(), AudioState::Stopped);
        assert_eq!(object.total_frames(), Some(500));
        assert_eq!(object.duration(), Some(Duration::from_millis(500)));
        assert_eq!(object.source_index(&rig.sources), Some(0));
        assert!(object.filename().ends_with("clip0.wav"));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let mut rig = Rig::new(1);
        let mut object = AudioObject::new(AudioId::new(0, 0), AudioKind::Sound);
        let result = object.load_audio(&mut rig.ctx(), "song.mp3", LoadMode::Static, 100);
        assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
        assert_eq!(object.state(), AudioState::Unloaded);
        assert_eq!(rig.sources.owned().count(), 0);
    }

    #[test]
    fn test_unloaded_rejects_play() {
        let mut rig = Rig::new(1);
        let mut object = AudioObject::new(AudioId::new(0, 0), AudioKind::Sound);
        assert!(matches!(
            object.play(&mut rig.ctx()),
            Err(AudioError::InvalidState { .. })
        ));
        assert!(object.stop(&mut rig.ctx()).is_ok());
    }

    #[test]
    fn test_static_playback_finishes() {
        let mut rig = Rig::new(2);
        let mut object = rig.load(0, 200, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        assert_eq!(object.state(), AudioState::Playing);

        rig.tick(&mut object);
        assert_eq!(object.state(), AudioState::Playing);
        for _ in 0..4 {
            rig.tick(&mut object);
        }
        assert_eq!(object.state(), AudioState::Stopped);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 1000, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object.pause(&mut rig.ctx()).expect("pause");
        assert_eq!(object.state(), AudioState::Paused);
        let voice = rig.sources.voice(0).expect("voice");
        assert_eq!(rig.backend.voice_state(voice), VoiceState::Paused);

        object.resume(&mut rig.ctx()).expect("resume");
        assert_eq!(object.state(), AudioState::Playing);
        assert_eq!(rig.backend.voice_state(voice), VoiceState::Playing);
    }

    #[test]
    fn test_pause_from_stopped() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        assert_eq!(object.state(), AudioState::Stopped);
        object.pause(&mut rig.ctx()).expect("pause");
        assert_eq!(object.state(), AudioState::Paused);
        object.pause(&mut rig.ctx()).expect("pause twice");
        assert_eq!(object.state(), AudioState::Paused);

        object.resume(&mut rig.ctx()).expect("resume");
        assert_eq!(object.state(), AudioState::Playing);
    }

    #[test]
    fn test_pause_without_source_fails() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        object.detach_source();
        assert!(matches!(
            object.pause(&mut rig.ctx()),
            Err(AudioError::NoBoundSource(_))
        ));
        assert_eq!(object.state(), AudioState::Stopped);

        let mut unloaded = AudioObject::new(AudioId::new(9, 0), AudioKind::Sound);
        unloaded.pause(&mut rig.ctx()).expect("unloaded pause");
        assert_eq!(unloaded.state(), AudioState::Unloaded);
    }

    #[test]
    fn test_fade_out_is_monotonic() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 5000, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object
            .fade_out(&mut rig.ctx(), Duration::from_millis(500))
            .expect("fade");
        assert_eq!(object.state(), AudioState::FadeOut);

        let mut last = object.volume();
        for _ in 0..20 {
            rig.tick(&mut object);
            assert!(object.volume() <= last);
            last = object.volume();
        }
        assert_eq!(object.volume(), 0.0);
        assert_eq!(object.state(), AudioState::Stopped);
    }

    #[test]
    fn test_fade_out_below_threshold_stops_immediately() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 5000, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object.set_volume(&mut rig.ctx(), 0.7);
        object
            .fade_out(&mut rig.ctx(), Duration::from_millis(10))
            .expect("fade");
        assert_eq!(object.volume(), 0.0);
        assert_eq!(object.state(), AudioState::Stopped);
    }

    #[test]
    fn test_fade_in_starts_playback_and_reaches_full() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 5000, LoadMode::Static);
        object.set_volume(&mut rig.ctx(), 0.0);
        object
            .fade_in(&mut rig.ctx(), Duration::from_millis(200))
            .expect("fade");
        assert_eq!(object.state(), AudioState::FadeIn);

        for _ in 0..5 {
            rig.tick(&mut object);
        }
        assert_eq!(object.volume(), 1.0);
        assert_eq!(object.state(), AudioState::Playing);
        let voice = rig.sources.voice(0).expect("voice");
        assert_eq!(rig.backend.voice_gain(voice), Some(1.0));
    }

    #[test]
    fn test_fade_in_at_full_volume_is_noop() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 5000, LoadMode::Static);
        object
            .fade_in(&mut rig.ctx(), Duration::from_millis(200))
            .expect("fade");
        assert_eq!(object.state(), AudioState::Playing);
    }

    #[test]
    fn test_play_cancels_fade() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 5000, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object
            .fade_out(&mut rig.ctx(), Duration::from_millis(500))
            .expect("fade");
        rig.tick(&mut object);
        object.play(&mut rig.ctx()).expect("play");
        assert_eq!(object.state(), AudioState::Playing);
        let volume = object.volume();
        rig.tick(&mut object);
        assert_eq!(object.volume(), volume);
    }

    #[test]
    fn test_owner_driven_free() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        let mode = GameModeId::new();
        assert!(object.add_owner(mode));
        assert!(!object.add_owner(mode));
        assert_eq!(object.owners(), &[mode]);

        assert!(!object.remove_owner(&mut rig.ctx(), GameModeId::new()));
        assert!(object.remove_owner(&mut rig.ctx(), mode));
        assert_eq!(object.state(), AudioState::Unloaded);
        assert_eq!(rig.sources.owner(0), None);
        assert_eq!(rig.backend.buffer_count(), 0);
    }

    #[test]
    fn test_seek_bounds() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 300, LoadMode::Static);
        object.seek_sample(&mut rig.ctx(), 120).expect("seek");
        assert_eq!(object.sample_offset(), 120);

        let result = object.seek_sample(&mut rig.ctx(), 300);
        assert!(matches!(result, Err(AudioError::SeekOutOfRange { .. })));
        assert_eq!(object.sample_offset(), 120);
    }

    #[test]
    fn test_seek_second_applies_on_play() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 2000, LoadMode::Static);
        object.seek_second(&mut rig.ctx(), 0.5).expect("seek");
        assert_eq!(object.sample_offset(), 500);
        object.play(&mut rig.ctx()).expect("play");
        let voice = rig.sources.voice(0).expect("voice");
        assert_eq!(rig.backend.sample_offset(voice), 500);
    }

    #[test]
    fn test_round_trip_matches_fresh_object() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 300, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object.stop(&mut rig.ctx()).expect("stop");
        object.free_audio(&mut rig.ctx());

        let fresh = AudioObject::new(AudioId::new(0, 0), AudioKind::Sound);
        assert_eq!(object.state(), fresh.state());
        assert_eq!(object.sample_offset(), fresh.sample_offset());
        assert_eq!(object.source_index(&rig.sources), None);
        assert_eq!(object.total_frames(), fresh.total_frames());
        assert_eq!(object.filename(), fresh.filename());

        object.free_audio(&mut rig.ctx());
        assert_eq!(object.state(), AudioState::Unloaded);
    }

    #[test]
    fn test_play_fails_without_free_source() {
        let mut rig = Rig::new(1);
        let mut first = rig.load(0, 5000, LoadMode::Static);
        first.play(&mut rig.ctx()).expect("play");

        let mut second = rig.load(1, 5000, LoadMode::Static);
        assert_eq!(second.state(), AudioState::Stopped);
        assert_eq!(second.source_index(&rig.sources), None);
        assert!(matches!(
            second.play(&mut rig.ctx()),
            Err(AudioError::NoFreeSources { max: 1 })
        ));
    }

    #[test]
    fn test_effective_gain() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        let mut ctx = AudioContext {
            backend: &mut rig.backend,
            sources: &mut rig.sources,
            category_volume: 0.5,
        };
        object.set_volume(&mut ctx, 0.5);
        let voice = rig.sources.voice(0).expect("voice");
        assert_eq!(rig.backend.voice_gain(voice), Some(0.25));
    }

    #[test]
    fn test_set_volume_clamps() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        object.set_volume(&mut rig.ctx(), 3.0);
        assert_eq!(object.volume(), 1.0);
        object.set_volume(&mut rig.ctx(), -1.0);
        assert_eq!(object.volume(), 0.0);
    }

    #[test]
    fn test_static_looping_flag_reaches_voice() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        object.set_looping(&mut rig.ctx(), true);
        let voice = rig.sources.voice(0).expect("voice");
        assert!(rig.backend.voice_looping(voice));
        assert!(object.set_loop_start(10).is_err());
    }

    #[test]
    fn test_stream_queues_full_ring_on_load() {
        let mut rig = Rig::new(1);
        let object = rig.load(0, 1000, LoadMode::StreamFile);
        let voice = rig.sources.voice(0).expect("voice");
        assert_eq!(object.load_mode(), LoadMode::StreamFile);
        assert_eq!(
            rig.backend.queued_buffers(voice),
            crate::buffer::NUMBER_STREAMING_BUFFERS
        );
    }

    #[test]
    fn test_stream_plays_to_end() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 1000, LoadMode::StreamFile);
        object.play(&mut rig.ctx()).expect("play");

        for _ in 0..10 {
            rig.tick(&mut object);
        }
        assert_eq!(object.state(), AudioState::Playing);

        for _ in 0..12 {
            rig.tick(&mut object);
        }
        assert_eq!(object.state(), AudioState::Stopped);

        // Ready to play again from the start.
        object.play(&mut rig.ctx()).expect("replay");
        assert_eq!(object.state(), AudioState::Playing);
    }

    #[test]
    fn test_stream_from_memory_loops() {
        let mut rig = Rig::new(1);
        let path = rig.wav("loop.wav", 300);
        let mut object = AudioObject::new(AudioId::new(0, 0), AudioKind::Music);
        object.set_looping(&mut rig.ctx(), true);
        object
            .load_audio(&mut rig.ctx(), &path, LoadMode::StreamMemory, 100)
            .expect("load");
        object.play(&mut rig.ctx()).expect("play");

        for _ in 0..40 {
            rig.tick(&mut object);
        }
        assert_eq!(object.state(), AudioState::Playing);
        object.stop(&mut rig.ctx()).expect("stop");
        assert_eq!(object.state(), AudioState::Stopped);
    }

    #[test]
    fn test_stream_loop_points() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 1000, LoadMode::StreamFile);
        object.set_loop_start(200).expect("start");
        object.set_loop_end(600).expect("end");
        assert!(object.set_loop_end(1001).is_err());
    }

    #[test]
    fn test_detached_object_stops() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        object.play(&mut rig.ctx()).expect("play");
        object.detach_source();
        assert_eq!(object.state(), AudioState::Stopped);
    }

    #[test]
    fn test_spatial_forwarded_to_voice() {
        let mut rig = Rig::new(1);
        let mut object = rig.load(0, 100, LoadMode::Static);
        object.set_position(&mut rig.ctx(), Vec3::new(1.0, 2.0, 3.0));
        object.set_velocity(&mut rig.ctx(), Vec3::X);
        let voice = rig.sources.voice(0).expect("voice");
        let spatial = rig.backend.voice_spatial(voice).expect("spatial");
        assert_eq!(spatial.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(spatial.velocity, Vec3::X);
        assert_eq!(object.position(), Vec3::new(1.0, 2.0, 3.0));
    }
}

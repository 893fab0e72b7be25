//! Rodio Backend
//!
//! Maps the voice/buffer model onto rodio:
//!
//! - the device is a cpal output stream (`OutputStream`), enumerated through
//!   `rodio::cpal`
//! - every voice owns one `Sink`
//! - buffers are interleaved `i16` vectors, appended to a sink as
//!   `SamplesBuffer`s when the voice starts (static) or when queued (streaming)
//!
//! rodio has no notion of "processed buffers", so the backend derives it:
//! every buffer queued on a playing voice is one source in the sink, and the
//! difference between what was queued and `Sink::len` is what has finished.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, BufferHandle, DeviceInfo, PcmSpec, VoiceId, VoiceSpatial, VoiceState};
use crate::error::{AudioError, AudioResult};
use crate::listener::Listener;

/// Decoded samples of one buffer.
#[derive(Debug, Default)]
struct RodioBuffer {
    spec: Option<PcmSpec>,
    samples: Vec<i16>,
}

impl RodioBuffer {
    fn to_source(&self) -> Option<SamplesBuffer<i16>> {
        let spec = self.spec?;
        Some(SamplesBuffer::new(
            spec.channels,
            spec.samples_per_second,
            self.samples.clone(),
        ))
    }

    fn frames(&self) -> u64 {
        self.spec
            .map_or(0, |s| self.samples.len() as u64 / u64::from(s.channels.max(1)))
    }
}

/// State of one voice.
struct RodioVoice {
    sink: Sink,
    state: VoiceState,
    looping: bool,
    static_buffer: Option<BufferHandle>,
    /// Buffers handed to the sink, oldest first.
    queue: VecDeque<BufferHandle>,
    processed: Vec<BufferHandle>,
    /// Cursor applied on the next start.
    start_offset: u64,
    rate: u32,
    spatial: VoiceSpatial,
}

impl RodioVoice {
    fn new(sink: Sink) -> Self {
        Self {
            sink,
            state: VoiceState::Initial,
            looping: false,
            static_buffer: None,
            queue: VecDeque::new(),
            processed: Vec::new(),
            start_offset: 0,
            rate: 0,
            spatial: VoiceSpatial::default(),
        }
    }

    /// Fold sink progress into the tracked state.
    fn refresh(&mut self) {
        if !matches!(self.state, VoiceState::Playing | VoiceState::Paused) {
            return;
        }
        if self.static_buffer.is_none() {
            let consumed = self.queue.len().saturating_sub(self.sink.len());
            for _ in 0..consumed {
                if let Some(done) = self.queue.pop_front() {
                    self.processed.push(done);
                }
            }
        }
        if self.state == VoiceState::Playing && self.sink.empty() {
            self.state = VoiceState::Stopped;
        }
    }

    fn halt(&mut self, state: VoiceState) {
        self.sink.clear();
        self.processed.extend(self.queue.drain(..));
        self.start_offset = 0;
        self.state = state;
    }

    fn seek_sink(&self, frame: u64) {
        if self.rate == 0 {
            return;
        }
        let pos = Duration::from_secs_f64(frame as f64 / f64::from(self.rate));
        if let Err(e) = self.sink.try_seek(pos) {
            warn!("Voice seek to frame {} failed: {}", frame, e);
        }
    }
}

/// Audio backend playing through the system output device.
pub struct RodioBackend {
    /// The output stream (must be kept alive).
    stream: Option<(OutputStream, OutputStreamHandle)>,
    voices: HashMap<u32, RodioVoice>,
    buffers: HashMap<u32, RodioBuffer>,
    next_id: u32,
    listener: Listener,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("open", &self.stream.is_some())
            .field("voices", &self.voices.len())
            .field("buffers", &self.buffers.len())
            .finish_non_exhaustive()
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioBackend {
    /// Create a backend; no device is opened until `open_device`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: None,
            voices: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 1,
            listener: Listener::default(),
        }
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Last listener pushed by the engine.
    #[must_use]
    pub const fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Placement last set on a voice.
    #[must_use]
    pub fn voice_spatial(&self, voice: VoiceId) -> Option<VoiceSpatial> {
        self.voices.get(&voice.raw()).map(|v| v.spatial)
    }

    fn find_device(name: &str) -> Option<rodio::cpal::Device> {
        let host = rodio::cpal::default_host();
        host.output_devices()
            .ok()?
            .find(|d| d.name().is_ok_and(|n| n == name))
    }

    /// Start a stopped voice from its buffers.
    fn start(&mut self, id: u32) {
        let Some(voice) = self.voices.get_mut(&id) else {
            return;
        };
        voice.sink.clear();

        if let Some(handle) = voice.static_buffer {
            let Some(buffer) = self.buffers.get(&handle.raw()) else {
                voice.state = VoiceState::Stopped;
                return;
            };
            let Some(source) = buffer.to_source() else {
                voice.state = VoiceState::Stopped;
                return;
            };
            voice.rate = source.sample_rate();
            if voice.looping {
                voice.sink.append(source.repeat_infinite());
            } else {
                voice.sink.append(source);
            }
        } else {
            for handle in &voice.queue {
                if let Some(source) = self.buffers.get(&handle.raw()).and_then(RodioBuffer::to_source) {
                    voice.rate = source.sample_rate();
                    voice.sink.append(source);
                }
            }
        }

        if voice.sink.empty() {
            voice.state = VoiceState::Stopped;
            return;
        }
        voice.sink.play();
        voice.state = VoiceState::Playing;
        if voice.start_offset > 0 {
            voice.seek_sink(voice.start_offset);
        }
    }
}

impl AudioBackend for RodioBackend {
    fn name(&self) -> &str {
        "rodio"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        let host = rodio::cpal::default_host();
        let Ok(devices) = host.output_devices() else {
            return Vec::new();
        };
        devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let version = device
                    .supported_output_configs()
                    .ok()
                    .and_then(|configs| configs.map(|c| u32::from(c.channels())).max())
                    .unwrap_or(0);
                Some(DeviceInfo::new(name, version))
            })
            .collect()
    }

    fn open_device(&mut self, device: Option<&DeviceInfo>) -> AudioResult<()> {
        let stream = match device.and_then(|info| Self::find_device(&info.name)) {
            Some(device) => OutputStream::try_from_device(&device),
            None => OutputStream::try_default(),
        }
        .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!(
            "Audio device initialized: {}",
            device.map_or("default", |d| d.name.as_str())
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn close_device(&mut self) {
        for (_, voice) in self.voices.drain() {
            voice.sink.stop();
        }
        self.buffers.clear();
        self.stream = None;
        debug!("Audio device closed");
    }

    fn create_voice(&mut self) -> AudioResult<VoiceId> {
        let (_, handle) = self.stream.as_ref().ok_or(AudioError::NotInitialized)?;
        let sink = Sink::try_new(handle).map_err(|e| AudioError::AllocationFailed(e.to_string()))?;
        sink.pause();
        let id = self.next_handle();
        self.voices.insert(id, RodioVoice::new(sink));
        Ok(VoiceId::new(id))
    }

    fn destroy_voice(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.remove(&voice.raw()) {
            v.sink.stop();
        }
    }

    fn create_buffer(&mut self) -> AudioResult<BufferHandle> {
        if self.stream.is_none() {
            return Err(AudioError::NotInitialized);
        }
        let id = self.next_handle();
        self.buffers.insert(id, RodioBuffer::default());
        Ok(BufferHandle::new(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.raw());
    }

    fn fill_buffer(
        &mut self,
        buffer: BufferHandle,
        spec: PcmSpec,
        samples: &[i16],
    ) -> AudioResult<()> {
        let slot = self
            .buffers
            .get_mut(&buffer.raw())
            .ok_or_else(|| AudioError::AllocationFailed(format!("unknown buffer {}", buffer.raw())))?;
        slot.spec = Some(spec);
        slot.samples.clear();
        slot.samples.extend_from_slice(samples);
        Ok(())
    }

    fn attach_buffer(&mut self, voice: VoiceId, buffer: Option<BufferHandle>) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            v.sink.clear();
            v.static_buffer = buffer;
            v.queue.clear();
            v.processed.clear();
            v.start_offset = 0;
            v.state = VoiceState::Initial;
        }
    }

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]) {
        let Some(v) = self.voices.get_mut(&voice.raw()) else {
            return;
        };
        v.static_buffer = None;
        for handle in buffers {
            if v.state == VoiceState::Playing {
                if let Some(source) = self.buffers.get(&handle.raw()).and_then(RodioBuffer::to_source) {
                    v.sink.append(source);
                }
            }
            v.queue.push_back(*handle);
        }
    }

    fn unqueue_processed(&mut self, voice: VoiceId) -> Vec<BufferHandle> {
        self.voices
            .get_mut(&voice.raw())
            .map(|v| {
                v.refresh();
                std::mem::take(&mut v.processed)
            })
            .unwrap_or_default()
    }

    fn queued_buffers(&self, voice: VoiceId) -> usize {
        self.voices
            .get(&voice.raw())
            .map_or(0, |v| v.queue.len() + v.processed.len())
    }

    fn voice_state(&mut self, voice: VoiceId) -> VoiceState {
        self.voices.get_mut(&voice.raw()).map_or(VoiceState::Initial, |v| {
            v.refresh();
            v.state
        })
    }

    fn play(&mut self, voice: VoiceId) {
        let id = voice.raw();
        let Some(v) = self.voices.get_mut(&id) else {
            return;
        };
        if v.state == VoiceState::Paused {
            v.sink.play();
            v.state = VoiceState::Playing;
            return;
        }
        self.start(id);
    }

    fn pause(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            if v.state == VoiceState::Playing {
                v.sink.pause();
                v.state = VoiceState::Paused;
            }
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            let state = if v.state == VoiceState::Initial {
                VoiceState::Initial
            } else {
                VoiceState::Stopped
            };
            v.halt(state);
        }
    }

    fn rewind(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            v.halt(VoiceState::Initial);
        }
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(v) = self.voices.get(&voice.raw()) {
            v.sink.set_volume(gain);
        }
    }

    fn set_looping(&mut self, voice: VoiceId, looping: bool) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            // Takes effect the next time the voice starts.
            v.looping = looping;
        }
    }

    fn set_sample_offset(&mut self, voice: VoiceId, frame: u64) {
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            v.start_offset = frame;
            if matches!(v.state, VoiceState::Playing | VoiceState::Paused) {
                v.seek_sink(frame);
            }
        }
    }

    fn sample_offset(&self, voice: VoiceId) -> u64 {
        let Some(v) = self.voices.get(&voice.raw()) else {
            return 0;
        };
        if !matches!(v.state, VoiceState::Playing | VoiceState::Paused) {
            return v.start_offset;
        }
        let frame = (v.sink.get_pos().as_secs_f64() * f64::from(v.rate)) as u64;
        let length = v
            .static_buffer
            .and_then(|b| self.buffers.get(&b.raw()))
            .map_or(0, RodioBuffer::frames);
        if v.looping && length > 0 {
            frame % length
        } else {
            frame
        }
    }

    fn set_voice_spatial(&mut self, voice: VoiceId, spatial: VoiceSpatial) {
        // Sinks are not positional; the placement is kept for queries only.
        if let Some(v) = self.voices.get_mut(&voice.raw()) {
            v.spatial = spatial;
        }
    }

    fn set_listener(&mut self, listener: &Listener) {
        self.listener = *listener;
    }
}

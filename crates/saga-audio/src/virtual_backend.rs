//! Virtual Audio Backend
//!
//! A software model of a mixing device. Voices advance only when
//! [`AudioBackend::advance`] is called, which makes playback fully
//! deterministic: a static voice stops (or wraps, when looping) once its
//! cursor passes the end of its buffer, and a streaming voice retires queued
//! buffers as the cursor crosses them and stops when the queue runs dry.
//!
//! Used for headless runs (dedicated servers, CI) and by the test suite,
//! which relies on the inspection and fault-injection hooks at the bottom of
//! the impl.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::debug;

use crate::backend::{AudioBackend, BufferHandle, DeviceInfo, PcmSpec, VoiceId, VoiceSpatial, VoiceState};
use crate::error::{AudioError, AudioResult};
use crate::listener::Listener;

/// Sample data held by a virtual buffer.
#[derive(Debug, Clone, Copy, Default)]
struct VirtualBuffer {
    spec: Option<PcmSpec>,
    frames: u64,
}

/// One software voice.
#[derive(Debug, Default)]
struct VirtualVoice {
    state: VoiceState,
    gain: f32,
    looping: bool,
    static_buffer: Option<BufferHandle>,
    queue: VecDeque<BufferHandle>,
    processed: Vec<BufferHandle>,
    /// Frames into the static buffer, or into the front of the queue.
    cursor: f64,
    spatial: VoiceSpatial,
}

impl VirtualVoice {
    fn has_data(&self) -> bool {
        self.static_buffer.is_some() || !self.queue.is_empty()
    }

    fn retire_queue(&mut self) {
        self.processed.extend(self.queue.drain(..));
    }
}

/// Deterministic software backend.
#[derive(Debug)]
pub struct VirtualBackend {
    devices: Vec<DeviceInfo>,
    opened: Option<DeviceInfo>,
    voice_limit: Option<usize>,
    voices: BTreeMap<u32, VirtualVoice>,
    buffers: BTreeMap<u32, VirtualBuffer>,
    next_id: u32,
    listener: Listener,
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBackend {
    /// Create a backend exposing a single virtual output device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: vec![DeviceInfo::new("Virtual Output", 1)],
            opened: None,
            voice_limit: None,
            voices: BTreeMap::new(),
            buffers: BTreeMap::new(),
            next_id: 1,
            listener: Listener::default(),
        }
    }

    /// Limit how many voices the "hardware" will hand out.
    #[must_use]
    pub fn with_voice_limit(mut self, limit: usize) -> Self {
        self.voice_limit = Some(limit);
        self
    }

    /// Replace the enumerated device list.
    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn voice_mut(&mut self, voice: VoiceId) -> Option<&mut VirtualVoice> {
        self.voices.get_mut(&voice.raw())
    }

    fn buffer_frames(&self, buffer: BufferHandle) -> u64 {
        self.buffers.get(&buffer.raw()).map_or(0, |b| b.frames)
    }

    fn buffer_rate(&self, buffer: BufferHandle) -> u32 {
        self.buffers
            .get(&buffer.raw())
            .and_then(|b| b.spec)
            .map_or(0, |s| s.samples_per_second)
    }

    fn advance_voice(&mut self, id: u32, elapsed: Duration) {
        let Some(voice) = self.voices.get(&id) else {
            return;
        };
        if voice.state != VoiceState::Playing {
            return;
        }

        let lead = voice.static_buffer.or_else(|| voice.queue.front().copied());
        let Some(lead) = lead else {
            if let Some(voice) = self.voices.get_mut(&id) {
                voice.state = VoiceState::Stopped;
            }
            return;
        };
        let step = elapsed.as_secs_f64() * f64::from(self.buffer_rate(lead));

        if let Some(buffer) = voice.static_buffer {
            let frames = self.buffer_frames(buffer) as f64;
            let Some(voice) = self.voices.get_mut(&id) else {
                return;
            };
            voice.cursor += step;
            if voice.cursor >= frames {
                if voice.looping && frames > 0.0 {
                    voice.cursor %= frames;
                } else {
                    voice.cursor = 0.0;
                    voice.state = VoiceState::Stopped;
                }
            }
            return;
        }

        let sizes: Vec<u64> = voice.queue.iter().map(|b| self.buffer_frames(*b)).collect();
        let Some(voice) = self.voices.get_mut(&id) else {
            return;
        };
        voice.cursor += step;
        for frames in sizes {
            let frames = frames as f64;
            if voice.cursor < frames {
                break;
            }
            voice.cursor -= frames;
            if let Some(done) = voice.queue.pop_front() {
                voice.processed.push(done);
            }
        }
        if voice.queue.is_empty() {
            voice.cursor = 0.0;
            voice.state = VoiceState::Stopped;
        }
    }

    // ============================================
    // Inspection and fault injection
    // ============================================

    /// The device opened by [`AudioBackend::open_device`], if any.
    #[must_use]
    pub fn opened_device(&self) -> Option<&DeviceInfo> {
        self.opened.as_ref()
    }

    /// Number of live voices.
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of live buffers.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Current gain of a voice.
    #[must_use]
    pub fn voice_gain(&self, voice: VoiceId) -> Option<f32> {
        self.voices.get(&voice.raw()).map(|v| v.gain)
    }

    /// Whether a voice has its loop flag set.
    #[must_use]
    pub fn voice_looping(&self, voice: VoiceId) -> bool {
        self.voices.get(&voice.raw()).is_some_and(|v| v.looping)
    }

    /// Spatial placement of a voice.
    #[must_use]
    pub fn voice_spatial(&self, voice: VoiceId) -> Option<VoiceSpatial> {
        self.voices.get(&voice.raw()).map(|v| v.spatial)
    }

    /// Last listener pushed by the engine.
    #[must_use]
    pub const fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Override the hardware state of a voice, as if the device changed it.
    pub fn force_voice_state(&mut self, voice: VoiceId, state: VoiceState) {
        if let Some(v) = self.voice_mut(voice) {
            v.state = state;
        }
    }
}

impl AudioBackend for VirtualBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn open_device(&mut self, device: Option<&DeviceInfo>) -> AudioResult<()> {
        let chosen = match device {
            Some(wanted) => self
                .devices
                .iter()
                .find(|d| d.name == wanted.name)
                .cloned()
                .ok_or_else(|| AudioError::DeviceInitFailed(format!("unknown device '{}'", wanted.name)))?,
            None => self.devices.first().cloned().ok_or(AudioError::NoDevice)?,
        };
        debug!("Virtual audio device opened: {}", chosen.name);
        self.opened = Some(chosen);
        Ok(())
    }

    fn close_device(&mut self) {
        self.voices.clear();
        self.buffers.clear();
        self.opened = None;
    }

    fn create_voice(&mut self) -> AudioResult<VoiceId> {
        if self.opened.is_none() {
            return Err(AudioError::NotInitialized);
        }
        if self.voice_limit.is_some_and(|limit| self.voices.len() >= limit) {
            return Err(AudioError::AllocationFailed("voice limit reached".to_string()));
        }
        let id = self.next_handle();
        self.voices.insert(
            id,
            VirtualVoice {
                gain: 1.0,
                ..VirtualVoice::default()
            },
        );
        Ok(VoiceId::new(id))
    }

    fn destroy_voice(&mut self, voice: VoiceId) {
        self.voices.remove(&voice.raw());
    }

    fn create_buffer(&mut self) -> AudioResult<BufferHandle> {
        if self.opened.is_none() {
            return Err(AudioError::NotInitialized);
        }
        let id = self.next_handle();
        self.buffers.insert(id, VirtualBuffer::default());
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
        let channels = u64::from(spec.channels.max(1));
        slot.spec = Some(spec);
        slot.frames = samples.len() as u64 / channels;
        Ok(())
    }

    fn attach_buffer(&mut self, voice: VoiceId, buffer: Option<BufferHandle>) {
        if let Some(v) = self.voice_mut(voice) {
            v.static_buffer = buffer;
            v.queue.clear();
            v.processed.clear();
            v.cursor = 0.0;
            v.state = VoiceState::Initial;
        }
    }

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]) {
        if let Some(v) = self.voice_mut(voice) {
            v.static_buffer = None;
            v.queue.extend(buffers.iter().copied());
        }
    }

    fn unqueue_processed(&mut self, voice: VoiceId) -> Vec<BufferHandle> {
        self.voice_mut(voice)
            .map(|v| std::mem::take(&mut v.processed))
            .unwrap_or_default()
    }

    fn queued_buffers(&self, voice: VoiceId) -> usize {
        self.voices
            .get(&voice.raw())
            .map_or(0, |v| v.queue.len() + v.processed.len())
    }

    fn voice_state(&mut self, voice: VoiceId) -> VoiceState {
        self.voices
            .get(&voice.raw())
            .map_or(VoiceState::Initial, |v| v.state)
    }

    fn play(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            match v.state {
                VoiceState::Paused => v.state = VoiceState::Playing,
                VoiceState::Playing => v.cursor = 0.0,
                VoiceState::Initial | VoiceState::Stopped => {
                    v.state = if v.has_data() {
                        VoiceState::Playing
                    } else {
                        VoiceState::Stopped
                    };
                },
            }
        }
    }

    fn pause(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            if v.state == VoiceState::Playing {
                v.state = VoiceState::Paused;
            }
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            if v.state != VoiceState::Initial {
                v.state = VoiceState::Stopped;
            }
            v.cursor = 0.0;
            v.retire_queue();
        }
    }

    fn rewind(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            v.state = VoiceState::Initial;
            v.cursor = 0.0;
            v.retire_queue();
        }
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(v) = self.voice_mut(voice) {
            v.gain = gain;
        }
    }

    fn set_looping(&mut self, voice: VoiceId, looping: bool) {
        if let Some(v) = self.voice_mut(voice) {
            v.looping = looping;
        }
    }

    fn set_sample_offset(&mut self, voice: VoiceId, frame: u64) {
        if let Some(v) = self.voice_mut(voice) {
            v.cursor = frame as f64;
        }
    }

    fn sample_offset(&self, voice: VoiceId) -> u64 {
        self.voices.get(&voice.raw()).map_or(0, |v| v.cursor as u64)
    }

    fn set_voice_spatial(&mut self, voice: VoiceId, spatial: VoiceSpatial) {
        if let Some(v) = self.voice_mut(voice) {
            v.spatial = spatial;
        }
    }

    fn set_listener(&mut self, listener: &Listener) {
        self.listener = *listener;
    }

    fn advance(&mut self, elapsed: Duration) {
        let ids: Vec<u32> = self.voices.keys().copied().collect();
        for id in ids {
            self.advance_voice(id, elapsed);
        }
    }
}

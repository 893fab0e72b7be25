//! Audio Engine
//!
//! The engine owns the finite hardware resources (device, playback sources),
//! every audio object, and the filename cache used for fire-and-forget
//! playback.
//!
//! ## Two ways to play audio
//!
//! ```ignore
//! use saga_audio::prelude::*;
//!
//! let mut engine = AudioEngine::new(VirtualBackend::new(), AudioConfig::default());
//! engine.initialize()?;
//!
//! // Fire-and-forget: the cache loads on demand and keeps the object around.
//! engine.play_sound("sfx/confirm.wav");
//! engine.play_music("music/town.ogg");
//!
//! // Long-lived: the caller owns the handle and drives the object directly.
//! let door = engine.create_sound();
//! if let Some(mut sound) = engine.sound(door) {
//!     sound.load_audio("sfx/door.wav", LoadMode::Static)?;
//!     sound.play()?;
//! }
//!
//! // Once per frame.
//! engine.update(frame_time);
//! ```
//!
//! ## Cache admission
//!
//! The cache holds at most `max_cache_size` files. When it is full, the least
//! recently touched entry that is STOPPED (or was freed through its handle)
//! is evicted to make room; if every entry is still audible or paused the new
//! file is refused.

use std::time::Duration;

use glam::Vec3;
use saga_common::GameModeId;
use tracing::{debug, error, info, warn};

use crate::backend::{AudioBackend, DeviceInfo, VoiceId};
use crate::cache::ResourceCache;
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};
use crate::handle::{AudioId, CachedAudio, MusicId, ObjectArena, SoundId};
use crate::listener::Listener;
use crate::object::{AudioContext, AudioKind, AudioObject, AudioState, LoadMode};
use crate::source::SourcePool;

/// Clamp a global volume, warning when it was out of range.
fn clamp_volume(volume: f32, category: &str) -> f32 {
    if volume.is_nan() {
        warn!("{} volume is NaN, using 0.0", category);
        return 0.0;
    }
    if !(0.0..=1.0).contains(&volume) {
        warn!("{} volume {} out of range, clamping", category, volume);
    }
    volume.clamp(0.0, 1.0)
}

/// Top-level audio service.
pub struct AudioEngine<B: AudioBackend> {
    backend: B,
    config: AudioConfig,
    initialized: bool,
    sources: SourcePool,
    objects: ObjectArena<AudioObject>,
    cache: ResourceCache,
    sound_volume: f32,
    music_volume: f32,
    active_music: Option<MusicId>,
    listener: Listener,
    /// Sum of all frame times passed to `update`.
    clock: Duration,
}

impl<B: AudioBackend> std::fmt::Debug for AudioEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("backend", &self.backend.name())
            .field("initialized", &self.initialized)
            .field("sources", &self.sources.len())
            .field("objects", &self.objects.len())
            .field("cache", &self.cache.len())
            .field("active_music", &self.active_music)
            .finish_non_exhaustive()
    }
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Create an engine; nothing touches the device until [`Self::initialize`].
    pub fn new(backend: B, mut config: AudioConfig) -> Self {
        config.validate();
        Self {
            backend,
            cache: ResourceCache::new(config.max_cache_size),
            sound_volume: config.sound_volume,
            music_volume: config.music_volume,
            config,
            initialized: false,
            sources: SourcePool::default(),
            objects: ObjectArena::new(),
            active_music: None,
            listener: Listener::default(),
            clock: Duration::ZERO,
        }
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Open the most capable device and allocate playback sources.
    ///
    /// Fails when the device cannot be opened or grants no voice at all.
    pub fn initialize(&mut self) -> AudioResult<()> {
        if self.initialized {
            warn!("Audio engine already initialized");
            return Ok(());
        }

        let device = self.choose_device();
        if let Err(e) = self.backend.open_device(device.as_ref()) {
            error!("Failed to open audio device: {}", e);
            return Err(e);
        }
        info!(
            "Opened audio device '{}' ({} backend)",
            device.as_ref().map_or("default", |d| d.name.as_str()),
            self.backend.name()
        );

        self.sources = SourcePool::allocate(&mut self.backend, self.config.max_sources);
        let granted = self.sources.len();
        if granted == 0 {
            error!("Audio device granted no playback sources");
            self.backend.close_device();
            return Err(AudioError::NoVoices);
        }

        let cache_size = if granted < self.config.max_sources {
            (granted / 4).max(1)
        } else {
            self.config.max_cache_size
        };
        self.cache.set_capacity(cache_size);
        self.backend.set_listener(&self.listener);
        self.initialized = true;

        info!(
            "Audio engine initialized: {} playback sources, cache size {}",
            granted, cache_size
        );
        Ok(())
    }

    fn choose_device(&self) -> Option<DeviceInfo> {
        let devices = self.backend.devices();
        if let Some(wanted) = &self.config.preferred_device {
            if let Some(device) = devices.iter().find(|d| &d.name == wanted) {
                return Some(device.clone());
            }
            warn!("Preferred audio device '{}' not found", wanted);
        }
        devices.into_iter().max_by_key(|d| d.version)
    }

    /// Free every object, release the sources and close the device.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }

        for (_, entry) in self.cache.drain() {
            self.discard(entry.audio.id());
        }
        if !self.objects.is_empty() {
            warn!(
                "{} audio objects still alive at shutdown, freeing them",
                self.objects.len()
            );
        }
        let remaining: Vec<AudioId> = self.objects.iter().map(|(id, _)| id).collect();
        for id in remaining {
            self.discard(id);
        }

        self.sources.destroy_all(&mut self.backend);
        self.backend.close_device();
        self.active_music = None;
        self.initialized = false;
        info!("Audio engine shut down");
    }

    /// Whether [`Self::initialize`] succeeded.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> AudioResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(AudioError::NotInitialized)
        }
    }

    // ============================================
    // Object plumbing
    // ============================================

    /// Run `f` on one object with a context borrowed from the engine.
    fn with_object<R>(
        &mut self,
        id: AudioId,
        f: impl FnOnce(&mut AudioObject, &mut AudioContext<'_, B>) -> R,
    ) -> Option<R> {
        let object = self.objects.get_mut(id)?;
        let category_volume = match object.kind() {
            AudioKind::Sound => self.sound_volume,
            AudioKind::Music => self.music_volume,
        };
        let mut ctx = AudioContext {
            backend: &mut self.backend,
            sources: &mut self.sources,
            category_volume,
        };
        let result = f(object, &mut ctx);
        self.settle_orphans();
        Some(result)
    }

    fn try_object<R>(
        &mut self,
        id: AudioId,
        f: impl FnOnce(&mut AudioObject, &mut AudioContext<'_, B>) -> AudioResult<R>,
    ) -> AudioResult<R> {
        self.with_object(id, f).unwrap_or(Err(AudioError::InvalidHandle))
    }

    /// Tell objects whose source was reclaimed that they lost it.
    fn settle_orphans(&mut self) {
        for id in self.sources.take_orphaned() {
            if let Some(object) = self.objects.get_mut(id) {
                object.detach_source();
            }
        }
    }

    /// Free an object and drop it from the arena.
    fn discard(&mut self, id: AudioId) {
        self.with_object(id, |object, ctx| object.free_audio(ctx));
        self.objects.remove(id);
        if self.active_music.is_some_and(|m| m.id() == id) {
            self.active_music = None;
        }
    }

    fn ids_of(&self, kind: AudioKind) -> Vec<AudioId> {
        self.objects
            .iter()
            .filter(|(_, object)| object.kind() == kind)
            .map(|(id, _)| id)
            .collect()
    }

    fn for_each_of_kind(
        &mut self,
        kind: AudioKind,
        operation: &str,
        f: impl Fn(&mut AudioObject, &mut AudioContext<'_, B>) -> AudioResult<()>,
    ) {
        for id in self.ids_of(kind) {
            if let Some(Err(e)) = self.with_object(id, &f) {
                debug!("{} {} skipped: {}", operation, id, e);
            }
        }
    }

    fn play_object(&mut self, id: AudioId) -> AudioResult<()> {
        let kind = self.objects.get(id).ok_or(AudioError::InvalidHandle)?.kind();
        match kind {
            AudioKind::Sound => self.play_sound_object(id),
            AudioKind::Music => self.play_music_object(MusicId::new(id)),
        }
    }

    /// Sounds restart from the top when played while audible.
    fn play_sound_object(&mut self, id: AudioId) -> AudioResult<()> {
        self.try_object(id, |object, ctx| {
            if object.state().is_playing() {
                object.stop(ctx)?;
            }
            object.play(ctx)
        })
    }

    /// Music is exclusive: the previous active track fades out before the new
    /// one is installed and fades in.
    fn play_music_object(&mut self, music: MusicId) -> AudioResult<()> {
        let id = music.id();
        let crossfade = self.config.music_crossfade();
        let state = self.objects.get(id).ok_or(AudioError::InvalidHandle)?.state();

        if self.active_music == Some(music) {
            if matches!(state, AudioState::Playing | AudioState::FadeIn) {
                return Ok(());
            }
            return self.try_object(id, |object, ctx| {
                object.play(ctx)?;
                object.fade_in(ctx, crossfade)
            });
        }

        if let Some(previous) = self.active_music {
            if let Some(Err(e)) =
                self.with_object(previous.id(), |object, ctx| object.fade_out(ctx, crossfade))
            {
                warn!("Failed to fade out previous music: {}", e);
            }
        }
        self.active_music = Some(music);
        debug!("Active music is now {}", id);

        self.try_object(id, |object, ctx| {
            if !object.state().is_playing() {
                object.set_volume(ctx, 0.0);
            }
            object.play(ctx)?;
            object.fade_in(ctx, crossfade)
        })
    }

    // ============================================
    // Volume
    // ============================================

    /// Global sound effect volume.
    #[must_use]
    pub const fn sound_volume(&self) -> f32 {
        self.sound_volume
    }

    /// Global music volume.
    #[must_use]
    pub const fn music_volume(&self) -> f32 {
        self.music_volume
    }

    /// Set the global sound volume and push it to every bound sound.
    pub fn set_sound_volume(&mut self, volume: f32) {
        self.sound_volume = clamp_volume(volume, "Sound");
        for id in self.ids_of(AudioKind::Sound) {
            self.with_object(id, |object, ctx| object.refresh_gain(ctx));
        }
    }

    /// Set the global music volume and push it to every bound track.
    pub fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = clamp_volume(volume, "Music");
        for id in self.ids_of(AudioKind::Music) {
            self.with_object(id, |object, ctx| object.refresh_gain(ctx));
        }
    }

    // ============================================
    // Global playback control
    // ============================================

    /// Pause every sound.
    pub fn pause_all_sounds(&mut self) {
        self.for_each_of_kind(AudioKind::Sound, "pause", |o, ctx| o.pause(ctx));
    }

    /// Resume every paused sound.
    pub fn resume_all_sounds(&mut self) {
        self.for_each_of_kind(AudioKind::Sound, "resume", |o, ctx| o.resume(ctx));
    }

    /// Stop every sound.
    pub fn stop_all_sounds(&mut self) {
        self.for_each_of_kind(AudioKind::Sound, "stop", |o, ctx| o.stop(ctx));
    }

    /// Rewind every sound to its first frame.
    pub fn rewind_all_sounds(&mut self) {
        self.for_each_of_kind(AudioKind::Sound, "rewind", |o, ctx| o.rewind(ctx));
    }

    /// Pause every music track.
    pub fn pause_all_music(&mut self) {
        self.for_each_of_kind(AudioKind::Music, "pause", |o, ctx| o.pause(ctx));
    }

    /// Resume every paused music track.
    pub fn resume_all_music(&mut self) {
        self.for_each_of_kind(AudioKind::Music, "resume", |o, ctx| o.resume(ctx));
    }

    /// Stop every music track.
    pub fn stop_all_music(&mut self) {
        self.for_each_of_kind(AudioKind::Music, "stop", |o, ctx| o.stop(ctx));
    }

    /// Rewind every music track to its first frame.
    pub fn rewind_all_music(&mut self) {
        self.for_each_of_kind(AudioKind::Music, "rewind", |o, ctx| o.rewind(ctx));
    }

    // ============================================
    // Resource cache
    // ============================================

    /// Make sure `filename` is cached as a sound, optionally claimed by `owner`.
    pub fn load_sound(&mut self, filename: &str, owner: Option<GameModeId>) -> AudioResult<SoundId> {
        match self.load_cached(filename, owner, AudioKind::Sound)? {
            CachedAudio::Sound(id) => Ok(id),
            CachedAudio::Music(_) => Err(AudioError::WrongKind {
                filename: filename.to_string(),
                expected: AudioKind::Sound.name(),
            }),
        }
    }

    /// Make sure `filename` is cached as music, optionally claimed by `owner`.
    pub fn load_music(&mut self, filename: &str, owner: Option<GameModeId>) -> AudioResult<MusicId> {
        match self.load_cached(filename, owner, AudioKind::Music)? {
            CachedAudio::Music(id) => Ok(id),
            CachedAudio::Sound(_) => Err(AudioError::WrongKind {
                filename: filename.to_string(),
                expected: AudioKind::Music.name(),
            }),
        }
    }

    fn load_cached(
        &mut self,
        filename: &str,
        owner: Option<GameModeId>,
        kind: AudioKind,
    ) -> AudioResult<CachedAudio> {
        self.ensure_initialized()?;

        if let Some(entry) = self.cache.get(filename) {
            let audio = entry.audio;
            if audio.kind() != kind {
                warn!(
                    "'{}' is cached as {}, not {}",
                    filename,
                    audio.kind().name(),
                    kind.name()
                );
                return Err(AudioError::WrongKind {
                    filename: filename.to_string(),
                    expected: kind.name(),
                });
            }
            match self.objects.get_mut(audio.id()) {
                Some(object) if object.state() != AudioState::Unloaded => {
                    if let Some(owner) = owner {
                        object.add_owner(owner);
                    }
                    return Ok(audio);
                },
                _ => {
                    debug!("Cached '{}' was freed, reloading", filename);
                    self.cache.remove(filename);
                    self.discard(audio.id());
                },
            }
        }

        if self.cache.is_full() {
            self.evict_one()?;
        }

        let id = self.objects.insert_with(|id| AudioObject::new(id, kind));
        if let Some(owner) = owner {
            if let Some(object) = self.objects.get_mut(id) {
                object.add_owner(owner);
            }
        }
        let mode = match kind {
            AudioKind::Sound => LoadMode::Static,
            AudioKind::Music => LoadMode::StreamFile,
        };
        let frames = self.config.stream_buffer_frames;
        if let Err(e) = self.try_object(id, |object, ctx| object.load_audio(ctx, filename, mode, frames)) {
            self.discard(id);
            return Err(e);
        }

        let audio = CachedAudio::from_kind(id, kind);
        self.cache.insert(filename, audio, self.clock);
        Ok(audio)
    }

    /// Evict the least recently touched entry that is stopped or freed.
    fn evict_one(&mut self) -> AudioResult<()> {
        let objects = &self.objects;
        let victim = self
            .cache
            .least_recent(|entry| {
                objects.get(entry.audio.id()).map_or(true, |o| {
                    matches!(o.state(), AudioState::Stopped | AudioState::Unloaded)
                })
            })
            .map(|(name, entry)| (name.to_string(), entry.audio.id()));

        let Some((name, id)) = victim else {
            warn!(
                "Audio cache full ({} entries) and nothing is stopped or freed",
                self.cache.capacity()
            );
            return Err(AudioError::CacheFull {
                max: self.cache.capacity(),
            });
        };
        debug!("Evicting '{}' from the audio cache", name);
        self.cache.remove(&name);
        self.discard(id);
        Ok(())
    }

    /// Play a cached sound, loading it on first use.
    pub fn play_sound(&mut self, filename: &str) {
        let id = match self.load_cached(filename, None, AudioKind::Sound) {
            Ok(audio) => audio.id(),
            Err(e) => {
                error!("Cannot play sound '{}': {}", filename, e);
                return;
            },
        };
        if let Err(e) = self.play_sound_object(id) {
            warn!("Sound '{}' did not start: {}", filename, e);
        }
        self.cache.touch(filename, self.clock);
    }

    /// Play a cached music track, cross-fading from the active one.
    pub fn play_music(&mut self, filename: &str) {
        let id = match self.load_cached(filename, None, AudioKind::Music) {
            Ok(audio) => audio.id(),
            Err(e) => {
                error!("Cannot play music '{}': {}", filename, e);
                return;
            },
        };
        if let Err(e) = self.play_music_object(MusicId::new(id)) {
            warn!("Music '{}' did not start: {}", filename, e);
        }
        self.cache.touch(filename, self.clock);
    }

    fn cached_op(
        &mut self,
        filename: &str,
        operation: &str,
        f: impl FnOnce(&mut AudioObject, &mut AudioContext<'_, B>) -> AudioResult<()>,
    ) {
        let result = self
            .cache
            .get(filename)
            .map(|entry| entry.audio.id())
            .ok_or_else(|| AudioError::NotCached(filename.to_string()))
            .and_then(|id| self.try_object(id, f));
        if let Err(e) = result {
            warn!("Cannot {} '{}': {}", operation, filename, e);
        }
        self.cache.touch(filename, self.clock);
    }

    /// Stop a cached sound or track.
    pub fn stop_sound(&mut self, filename: &str) {
        self.cached_op(filename, "stop", |o, ctx| o.stop(ctx));
    }

    /// Pause a cached sound or track.
    pub fn pause_sound(&mut self, filename: &str) {
        self.cached_op(filename, "pause", |o, ctx| o.pause(ctx));
    }

    /// Resume a cached sound or track.
    pub fn resume_sound(&mut self, filename: &str) {
        self.cached_op(filename, "resume", |o, ctx| o.resume(ctx));
    }

    /// Alias of [`Self::stop_sound`].
    pub fn stop_music(&mut self, filename: &str) {
        self.stop_sound(filename);
    }

    /// Alias of [`Self::pause_sound`].
    pub fn pause_music(&mut self, filename: &str) {
        self.pause_sound(filename);
    }

    /// Alias of [`Self::resume_sound`].
    pub fn resume_music(&mut self, filename: &str) {
        self.resume_sound(filename);
    }

    /// Handle of a cached sound.
    #[must_use]
    pub fn retrieve_sound(&self, filename: &str) -> Option<SoundId> {
        match self.cache.get(filename)?.audio {
            CachedAudio::Sound(id) => Some(id),
            CachedAudio::Music(_) => {
                warn!("'{}' is cached as music, not a sound", filename);
                None
            },
        }
    }

    /// Handle of a cached music track.
    #[must_use]
    pub fn retrieve_music(&self, filename: &str) -> Option<MusicId> {
        match self.cache.get(filename)?.audio {
            CachedAudio::Music(id) => Some(id),
            CachedAudio::Sound(_) => {
                warn!("'{}' is cached as a sound, not music", filename);
                None
            },
        }
    }

    /// Drop `owner` from every cached object; objects left without owners
    /// are freed and leave the cache.
    pub fn remove_game_mode_owner(&mut self, owner: GameModeId) {
        let entries: Vec<(String, AudioId)> = self
            .cache
            .entries()
            .map(|(name, entry)| (name.to_string(), entry.audio.id()))
            .collect();

        for (name, id) in entries {
            if self.with_object(id, |object, ctx| object.remove_owner(ctx, owner)) == Some(true) {
                debug!("'{}' released by {}", name, owner);
                self.cache.remove(&name);
                self.discard(id);
            }
        }
    }

    /// Whether a file is in the cache.
    #[must_use]
    pub fn is_cached(&self, filename: &str) -> bool {
        self.cache.contains(filename)
    }

    // ============================================
    // Frame update
    // ============================================

    /// Advance every object bound to a playback source by one frame.
    pub fn update(&mut self, elapsed: Duration) {
        if !self.initialized {
            return;
        }
        self.clock += elapsed;
        self.backend.advance(elapsed);

        let bound: Vec<(usize, AudioId)> = self.sources.owned().collect();
        for (index, id) in bound {
            match self.with_object(id, |object, ctx| object.update(ctx, elapsed)) {
                Some(Ok(())) => {},
                Some(Err(e)) => warn!("Audio update for {} failed: {}", id, e),
                None => {
                    debug!("Releasing playback source {} held by dead {}", index, id);
                    self.sources.release(index, &mut self.backend);
                },
            }
        }
    }

    // ============================================
    // Listener
    // ============================================

    /// Current listener.
    #[must_use]
    pub const fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Listener position.
    #[must_use]
    pub const fn listener_position(&self) -> Vec3 {
        self.listener.position
    }

    /// Move the listener.
    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener.position = position;
        self.push_listener();
    }

    /// Listener velocity.
    #[must_use]
    pub const fn listener_velocity(&self) -> Vec3 {
        self.listener.velocity
    }

    /// Set the listener velocity.
    pub fn set_listener_velocity(&mut self, velocity: Vec3) {
        self.listener.velocity = velocity;
        self.push_listener();
    }

    /// Listener orientation as `(forward, up)`.
    #[must_use]
    pub const fn listener_orientation(&self) -> (Vec3, Vec3) {
        (self.listener.forward, self.listener.up)
    }

    /// Orient the listener.
    pub fn set_listener_orientation(&mut self, forward: Vec3, up: Vec3) {
        self.listener.set_orientation(forward, up);
        self.push_listener();
    }

    fn push_listener(&mut self) {
        if self.initialized {
            self.backend.set_listener(&self.listener);
        }
    }

    // ============================================
    // Long-lived objects
    // ============================================

    /// Create an unloaded sound owned by the caller.
    pub fn create_sound(&mut self) -> SoundId {
        SoundId::new(
            self.objects
                .insert_with(|id| AudioObject::new(id, AudioKind::Sound)),
        )
    }

    /// Create an unloaded music track owned by the caller.
    pub fn create_music(&mut self) -> MusicId {
        MusicId::new(
            self.objects
                .insert_with(|id| AudioObject::new(id, AudioKind::Music)),
        )
    }

    /// Free and forget a sound. Returns false for a stale handle.
    pub fn destroy_sound(&mut self, id: SoundId) -> bool {
        self.destroy(id.id())
    }

    /// Free and forget a music track; clears the active track if it was this one.
    pub fn destroy_music(&mut self, id: MusicId) -> bool {
        self.destroy(id.id())
    }

    fn destroy(&mut self, id: AudioId) -> bool {
        if !self.objects.contains(id) {
            return false;
        }
        self.cache.remove_audio(id);
        self.discard(id);
        true
    }

    /// Per-object operations on a sound.
    pub fn sound(&mut self, id: SoundId) -> Option<AudioObjectMut<'_, B>> {
        self.object_mut(id.id())
    }

    /// Per-object operations on a music track.
    pub fn music(&mut self, id: MusicId) -> Option<AudioObjectMut<'_, B>> {
        self.object_mut(id.id())
    }

    fn object_mut(&mut self, id: AudioId) -> Option<AudioObjectMut<'_, B>> {
        if self.objects.contains(id) {
            Some(AudioObjectMut { engine: self, id })
        } else {
            None
        }
    }

    /// Read-only view of any object.
    #[must_use]
    pub fn object(&self, id: impl Into<AudioId>) -> Option<&AudioObject> {
        self.objects.get(id.into())
    }

    /// The music track currently treated as background music.
    #[must_use]
    pub const fn active_music(&self) -> Option<MusicId> {
        self.active_music
    }

    // ============================================
    // Diagnostics
    // ============================================

    /// Number of playback sources granted by the device.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Voice bound to an object, if any.
    #[must_use]
    pub fn voice_of(&self, id: impl Into<AudioId>) -> Option<VoiceId> {
        let object = self.objects.get(id.into())?;
        object
            .source_index(&self.sources)
            .and_then(|index| self.sources.voice(index))
    }

    /// Number of cached files.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache capacity.
    #[must_use]
    pub const fn max_cache_size(&self) -> usize {
        self.cache.capacity()
    }

    /// Number of live objects, cached ones included.
    #[must_use]
    pub const fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Engine clock.
    #[must_use]
    pub const fn clock(&self) -> Duration {
        self.clock
    }

    /// Configuration after validation.
    #[must_use]
    pub const fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// The hardware backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The hardware backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Mutable view of one object inside the engine.
pub struct AudioObjectMut<'a, B: AudioBackend> {
    engine: &'a mut AudioEngine<B>,
    id: AudioId,
}

impl<B: AudioBackend> AudioObjectMut<'_, B> {
    /// Handle of the object.
    #[must_use]
    pub const fn id(&self) -> AudioId {
        self.id
    }

    /// The object, for read-only queries.
    #[must_use]
    pub fn get(&self) -> Option<&AudioObject> {
        self.engine.objects.get(self.id)
    }

    /// Current state; UNLOADED for a dead handle.
    #[must_use]
    pub fn state(&self) -> AudioState {
        self.get().map_or(AudioState::Unloaded, AudioObject::state)
    }

    /// Instance volume.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.get().map_or(0.0, AudioObject::volume)
    }

    /// Load a file.
    pub fn load_audio(&mut self, filename: &str, mode: LoadMode) -> AudioResult<()> {
        let frames = self.engine.config.stream_buffer_frames;
        self.engine
            .try_object(self.id, |o, ctx| o.load_audio(ctx, filename, mode, frames))
    }

    /// Release everything and return to UNLOADED.
    pub fn free_audio(&mut self) {
        self.engine.with_object(self.id, |o, ctx| o.free_audio(ctx));
    }

    /// Play with the kind's rules: sounds restart, music cross-fades.
    pub fn play(&mut self) -> AudioResult<()> {
        self.engine.play_object(self.id)
    }

    /// Stop playback.
    pub fn stop(&mut self) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.stop(ctx))
    }

    /// Pause playback.
    pub fn pause(&mut self) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.pause(ctx))
    }

    /// Resume paused playback.
    pub fn resume(&mut self) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.resume(ctx))
    }

    /// Stop and move back to the start.
    pub fn rewind(&mut self) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.rewind(ctx))
    }

    /// Ramp up to full volume.
    pub fn fade_in(&mut self, duration: Duration) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.fade_in(ctx, duration))
    }

    /// Ramp down to silence, then stop.
    pub fn fade_out(&mut self, duration: Duration) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.fade_out(ctx, duration))
    }

    /// Enable or disable looping.
    pub fn set_looping(&mut self, looping: bool) {
        self.engine.with_object(self.id, |o, ctx| o.set_looping(ctx, looping));
    }

    /// Loop start frame (streamed objects only).
    pub fn set_loop_start(&mut self, frame: u64) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, _| o.set_loop_start(frame))
    }

    /// Loop end frame (streamed objects only).
    pub fn set_loop_end(&mut self, frame: u64) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, _| o.set_loop_end(frame))
    }

    /// Seek to a frame.
    pub fn seek_sample(&mut self, frame: u64) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.seek_sample(ctx, frame))
    }

    /// Seek to a time.
    pub fn seek_second(&mut self, seconds: f32) -> AudioResult<()> {
        self.engine.try_object(self.id, |o, ctx| o.seek_second(ctx, seconds))
    }

    /// Set the instance volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.engine.with_object(self.id, |o, ctx| o.set_volume(ctx, volume));
    }

    /// Set the world position.
    pub fn set_position(&mut self, position: Vec3) {
        self.engine.with_object(self.id, |o, ctx| o.set_position(ctx, position));
    }

    /// Set the velocity.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.engine.with_object(self.id, |o, ctx| o.set_velocity(ctx, velocity));
    }

    /// Set the facing direction.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.engine.with_object(self.id, |o, ctx| o.set_direction(ctx, direction));
    }

    /// Record a game mode owner.
    pub fn add_owner(&mut self, owner: GameModeId) -> bool {
        self.engine
            .objects
            .get_mut(self.id)
            .is_some_and(|o| o.add_owner(owner))
    }

    /// Drop a game mode owner; true when the object was freed.
    pub fn remove_owner(&mut self, owner: GameModeId) -> bool {
        self.engine
            .with_object(self.id, |o, ctx| o.remove_owner(ctx, owner))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VoiceState;
    use crate::test_support::write_wav;
    use crate::virtual_backend::VirtualBackend;
    use proptest::prelude::*;
    use tempfile::TempDir;

    const FRAME: Duration = Duration::from_millis(50);

    fn config() -> AudioConfig {
        AudioConfig::default()
            .with_max_sources(8)
            .with_headless(true)
    }

    fn engine_with(backend: VirtualBackend, config: AudioConfig) -> AudioEngine<VirtualBackend> {
        let mut engine = AudioEngine::new(backend, config);
        engine.initialize().expect("init");
        engine
    }

    fn engine() -> AudioEngine<VirtualBackend> {
        engine_with(VirtualBackend::new(), config())
    }

    /// Mono 1000 Hz WAV; frames equal milliseconds.
    fn wav(dir: &TempDir, name: &str, frames: u32) -> String {
        write_wav(dir.path(), name, 1, 1000, frames)
            .to_string_lossy()
            .into_owned()
    }

    fn run(engine: &mut AudioEngine<VirtualBackend>, frames: usize) {
        for _ in 0..frames {
            engine.update(FRAME);
        }
    }

    fn state_of(engine: &AudioEngine<VirtualBackend>, id: impl Into<AudioId>) -> AudioState {
        engine.object(id).map_or(AudioState::Unloaded, AudioObject::state)
    }

    #[test]
    fn test_initialize_prefers_highest_version() {
        let devices = vec![
            DeviceInfo::new("Low", 1),
            DeviceInfo::new("High", 3),
            DeviceInfo::new("Mid", 2),
        ];
        let engine = engine_with(VirtualBackend::new().with_devices(devices.clone()), config());
        assert_eq!(engine.backend().opened_device().map(|d| d.name.as_str()), Some("High"));

        let preferred = config().with_preferred_device("Mid");
        let engine = engine_with(VirtualBackend::new().with_devices(devices), preferred);
        assert_eq!(engine.backend().opened_device().map(|d| d.name.as_str()), Some("Mid"));
    }

    #[test]
    fn test_initialize_caps_pool_and_cache() {
        let engine = engine_with(
            VirtualBackend::new().with_voice_limit(10),
            AudioConfig::default(),
        );
        assert_eq!(engine.source_count(), 10);
        assert_eq!(engine.max_cache_size(), 2);

        let engine = engine_with(VirtualBackend::new().with_voice_limit(2), AudioConfig::default());
        assert_eq!(engine.max_cache_size(), 1);

        let engine = engine_with(VirtualBackend::new(), AudioConfig::default());
        assert_eq!(engine.source_count(), 64);
        assert_eq!(engine.max_cache_size(), 16);
    }

    #[test]
    fn test_initialize_without_voices_fails() {
        let mut engine = AudioEngine::new(VirtualBackend::new().with_voice_limit(0), config());
        assert!(matches!(engine.initialize(), Err(AudioError::NoVoices)));
        assert!(!engine.is_initialized());
        assert!(engine.backend().opened_device().is_none());
    }

    #[test]
    fn test_requires_initialization() {
        let mut engine = AudioEngine::new(VirtualBackend::new(), config());
        assert!(matches!(
            engine.load_sound("a.wav", None),
            Err(AudioError::NotInitialized)
        ));
        engine.play_sound("a.wav");
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn test_play_sound_loads_on_demand() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "ping.wav", 200);
        let mut engine = engine();

        engine.play_sound(&path);
        let id = engine.retrieve_sound(&path).expect("cached");
        assert_eq!(state_of(&engine, id), AudioState::Playing);
        assert_eq!(engine.cache_len(), 1);

        run(&mut engine, 5);
        assert_eq!(state_of(&engine, id), AudioState::Stopped);
        assert!(engine.is_cached(&path));
    }

    #[test]
    fn test_play_sound_restarts() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "step.wav", 1000);
        let mut engine = engine();

        engine.play_sound(&path);
        run(&mut engine, 4);
        let id = engine.retrieve_sound(&path).expect("cached");
        let voice = engine.voice_of(id).expect("voice");
        assert_eq!(engine.backend().sample_offset(voice), 200);

        engine.play_sound(&path);
        assert_eq!(engine.backend().sample_offset(voice), 0);
        assert_eq!(state_of(&engine, id), AudioState::Playing);
    }

    #[test]
    fn test_lru_evicts_oldest_stopped() {
        let dir = TempDir::new().expect("temp dir");
        let a = wav(&dir, "a.wav", 100);
        let b = wav(&dir, "b.wav", 100);
        let c = wav(&dir, "c.wav", 100);
        let mut engine = engine_with(VirtualBackend::new(), config().with_max_cache_size(2));

        engine.load_sound(&a, None).expect("a");
        engine.load_sound(&b, None).expect("b");
        engine.play_sound(&a);
        engine.stop_sound(&a);

        engine.load_sound(&c, None).expect("c");
        assert_eq!(engine.cache_len(), 2);
        assert!(engine.is_cached(&a));
        assert!(!engine.is_cached(&b));
        assert!(engine.is_cached(&c));
        assert_eq!(engine.object_count(), 2);
    }

    #[test]
    fn test_no_eviction_while_audible() {
        let dir = TempDir::new().expect("temp dir");
        let a = wav(&dir, "a.wav", 5000);
        let b = wav(&dir, "b.wav", 5000);
        let c = wav(&dir, "c.wav", 100);
        let mut engine = engine_with(VirtualBackend::new(), config().with_max_cache_size(2));

        engine.play_sound(&a);
        engine.play_sound(&b);
        engine.pause_sound(&b);

        assert!(matches!(
            engine.load_sound(&c, None),
            Err(AudioError::CacheFull { max: 2 })
        ));
        assert_eq!(engine.cache_len(), 2);
        assert!(engine.is_cached(&a) && engine.is_cached(&b));
        assert!(!engine.is_cached(&c));
        assert_eq!(engine.object_count(), 2);
    }

    #[test]
    fn test_freed_entry_is_evictable() {
        let dir = TempDir::new().expect("temp dir");
        let a = wav(&dir, "a.wav", 100);
        let b = wav(&dir, "b.wav", 100);
        let mut engine = engine_with(VirtualBackend::new(), config().with_max_cache_size(1));

        let id = engine.load_sound(&a, None).expect("load a");
        engine.sound(id).expect("view").free_audio();
        assert_eq!(state_of(&engine, id), AudioState::Unloaded);

        let b_id = engine.load_sound(&b, None).expect("load b");
        assert!(!engine.is_cached(&a));
        assert!(engine.is_cached(&b));
        assert_eq!(engine.cache_len(), 1);
        assert_eq!(state_of(&engine, b_id), AudioState::Stopped);
        assert!(engine.sound(id).is_none());
    }

    #[test]
    fn test_unowned_entry_is_evictable() {
        let dir = TempDir::new().expect("temp dir");
        let a = wav(&dir, "a.wav", 100);
        let b = wav(&dir, "b.wav", 100);
        let owner = GameModeId::new();
        let mut engine = engine_with(VirtualBackend::new(), config().with_max_cache_size(1));

        let id = engine.load_sound(&a, Some(owner)).expect("load a");
        assert!(engine.sound(id).expect("view").remove_owner(owner));
        engine.load_sound(&b, None).expect("load b");
        assert!(!engine.is_cached(&a));
    }

    #[test]
    fn test_pause_loaded_sound() {
        let dir = TempDir::new().expect("temp dir");
        let a = wav(&dir, "a.wav", 500);
        let mut engine = engine();

        let id = engine.load_sound(&a, None).expect("load");
        assert_eq!(state_of(&engine, id), AudioState::Stopped);
        engine.pause_sound(&a);
        assert_eq!(state_of(&engine, id), AudioState::Paused);

        engine.resume_sound(&a);
        assert_eq!(state_of(&engine, id), AudioState::Playing);
        run(&mut engine, 40);
        assert_eq!(state_of(&engine, id), AudioState::Stopped);
    }

    #[test]
    fn test_operations_on_unknown_file() {
        let mut engine = engine();
        engine.pause_sound("never-loaded.wav");
        engine.stop_music("never-loaded.ogg");
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(engine.object_count(), 0);
    }

    #[test]
    fn test_cache_never_exceeds_bound() {
        let dir = TempDir::new().expect("temp dir");
        let mut engine = engine_with(VirtualBackend::new(), config().with_max_cache_size(3));
        for n in 0..10 {
            let path = wav(&dir, &format!("s{n}.wav"), 100);
            engine.play_sound(&path);
            assert!(engine.cache_len() <= 3);
            run(&mut engine, 3);
        }
        assert_eq!(engine.cache_len(), 3);
    }

    #[test]
    fn test_source_exhaustion() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "long.wav", 5000);
        let mut engine = engine_with(VirtualBackend::new().with_voice_limit(2), config());

        for _ in 0..2 {
            let id = engine.create_sound();
            let mut sound = engine.sound(id).expect("sound");
            sound.load_audio(&path, LoadMode::Static).expect("load");
            sound.play().expect("play");
        }

        let id = engine.create_sound();
        let mut sound = engine.sound(id).expect("sound");
        sound.load_audio(&path, LoadMode::Static).expect("load");
        assert!(matches!(sound.play(), Err(AudioError::NoFreeSources { max: 2 })));
        assert_eq!(sound.state(), AudioState::Stopped);
    }

    #[test]
    fn test_stopped_source_is_reclaimed() {
        let dir = TempDir::new().expect("temp dir");
        let short = wav(&dir, "short.wav", 100);
        let mut engine = engine_with(VirtualBackend::new().with_voice_limit(1), config());

        let first = engine.create_sound();
        {
            let mut sound = engine.sound(first).expect("sound");
            sound.load_audio(&short, LoadMode::Static).expect("load");
            sound.play().expect("play");
        }
        run(&mut engine, 3);
        assert_eq!(state_of(&engine, first), AudioState::Stopped);

        let second = engine.create_sound();
        let mut sound = engine.sound(second).expect("sound");
        sound.load_audio(&short, LoadMode::Static).expect("load");
        sound.play().expect("play");

        assert!(engine.voice_of(first).is_none());
        assert!(engine.voice_of(second).is_some());
        assert_eq!(state_of(&engine, first), AudioState::Stopped);
    }

    #[test]
    fn test_music_exclusivity() {
        let dir = TempDir::new().expect("temp dir");
        let town = wav(&dir, "town.wav", 5000);
        let battle = wav(&dir, "battle.wav", 5000);
        let mut engine = engine();

        engine.play_music(&town);
        let a = engine.retrieve_music(&town).expect("town");
        assert_eq!(engine.active_music(), Some(a));
        assert_eq!(state_of(&engine, a), AudioState::FadeIn);
        run(&mut engine, 12);
        assert_eq!(state_of(&engine, a), AudioState::Playing);

        engine.play_music(&battle);
        let b = engine.retrieve_music(&battle).expect("battle");
        assert_eq!(engine.active_music(), Some(b));
        assert_eq!(state_of(&engine, a), AudioState::FadeOut);
        assert_eq!(state_of(&engine, b), AudioState::FadeIn);

        for _ in 0..12 {
            engine.update(FRAME);
            assert_eq!(engine.active_music(), Some(b));
        }
        assert_eq!(state_of(&engine, a), AudioState::Stopped);
        assert_eq!(state_of(&engine, b), AudioState::Playing);
        assert_eq!(engine.object(b).map(AudioObject::volume), Some(1.0));
    }

    #[test]
    fn test_replaying_active_music_is_noop() {
        let dir = TempDir::new().expect("temp dir");
        let town = wav(&dir, "town.wav", 5000);
        let mut engine = engine();

        engine.play_music(&town);
        run(&mut engine, 12);
        engine.play_music(&town);
        let id = engine.retrieve_music(&town).expect("town");
        assert_eq!(state_of(&engine, id), AudioState::Playing);
    }

    #[test]
    fn test_destroy_active_music_clears_handle() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "theme.wav", 5000);
        let mut engine = engine();

        let id = engine.create_music();
        {
            let mut music = engine.music(id).expect("music");
            music.load_audio(&path, LoadMode::StreamFile).expect("load");
            music.play().expect("play");
        }
        assert_eq!(engine.active_music(), Some(id));
        assert!(engine.destroy_music(id));
        assert_eq!(engine.active_music(), None);
        assert!(engine.music(id).is_none());
        assert!(!engine.destroy_music(id));
    }

    #[test]
    fn test_wrong_kind_lookup() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "theme.wav", 500);
        let mut engine = engine();

        engine.load_music(&path, None).expect("music");
        assert!(engine.retrieve_sound(&path).is_none());
        assert!(engine.retrieve_music(&path).is_some());
        assert!(matches!(
            engine.load_sound(&path, None),
            Err(AudioError::WrongKind { expected: "sound", .. })
        ));
        assert!(engine.retrieve_music("missing.wav").is_none());
    }

    #[test]
    fn test_remove_game_mode_owner() {
        let dir = TempDir::new().expect("temp dir");
        let shared = wav(&dir, "shared.wav", 100);
        let title_only = wav(&dir, "title.wav", 100);
        let mut engine = engine();
        let title = GameModeId::new();
        let map = GameModeId::new();

        engine.load_sound(&shared, Some(title)).expect("load");
        engine.load_sound(&shared, Some(map)).expect("load");
        engine.load_sound(&title_only, Some(title)).expect("load");

        engine.remove_game_mode_owner(title);
        assert!(engine.is_cached(&shared));
        assert!(!engine.is_cached(&title_only));

        engine.remove_game_mode_owner(map);
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(engine.object_count(), 0);
        assert_eq!(engine.backend().buffer_count(), 0);
    }

    #[test]
    fn test_load_failure_leaves_no_trace() {
        let mut engine = engine();
        assert!(matches!(
            engine.load_sound("/nonexistent/boom.wav", None),
            Err(AudioError::LoadFailed { .. })
        ));
        assert!(matches!(
            engine.load_sound("boom.flac", None),
            Err(AudioError::UnsupportedFormat(_))
        ));
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(engine.object_count(), 0);

        engine.stop_sound("boom.wav");
        engine.play_music("/nonexistent/theme.ogg");
        assert_eq!(engine.active_music(), None);
    }

    #[test]
    fn test_global_controls_are_kind_scoped() {
        let dir = TempDir::new().expect("temp dir");
        let sfx = wav(&dir, "rain.wav", 5000);
        let bgm = wav(&dir, "bgm.wav", 5000);
        let mut engine = engine();

        engine.play_sound(&sfx);
        engine.play_music(&bgm);
        let sound = engine.retrieve_sound(&sfx).expect("sound");
        let music = engine.retrieve_music(&bgm).expect("music");

        engine.pause_all_sounds();
        assert_eq!(state_of(&engine, sound), AudioState::Paused);
        assert!(state_of(&engine, music).is_playing());

        engine.resume_all_sounds();
        assert_eq!(state_of(&engine, sound), AudioState::Playing);

        engine.stop_all_music();
        assert_eq!(state_of(&engine, music), AudioState::Stopped);
        engine.stop_all_sounds();
        assert_eq!(state_of(&engine, sound), AudioState::Stopped);

        engine.rewind_all_sounds();
        engine.pause_all_music();
        engine.resume_all_music();
        engine.rewind_all_music();
        assert_eq!(state_of(&engine, music), AudioState::Stopped);
    }

    #[test]
    fn test_volume_reaches_bound_voices() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "hum.wav", 5000);
        let mut engine = engine();

        engine.play_sound(&path);
        let id = engine.retrieve_sound(&path).expect("sound");
        engine.set_sound_volume(0.5);
        let voice = engine.voice_of(id).expect("voice");
        assert_eq!(engine.backend().voice_gain(voice), Some(0.5));

        engine.set_music_volume(0.2);
        assert_eq!(engine.backend().voice_gain(voice), Some(0.5));
    }

    #[test]
    fn test_listener_forwarded() {
        let mut engine = engine();
        engine.set_listener_position(Vec3::new(1.0, 0.0, 0.0));
        engine.set_listener_velocity(Vec3::Y);
        engine.set_listener_orientation(Vec3::X, Vec3::Z);
        assert_eq!(engine.backend().listener().position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(engine.listener_velocity(), Vec3::Y);
        assert_eq!(engine.listener_orientation(), (Vec3::X, Vec3::Z));
    }

    #[test]
    fn test_object_view_operations() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "door.wav", 2000);
        let mut engine = engine();
        let id = engine.create_sound();
        let owner = GameModeId::new();

        let mut door = engine.sound(id).expect("sound");
        door.load_audio(&path, LoadMode::Static).expect("load");
        assert!(door.add_owner(owner));
        door.set_volume(0.5);
        door.set_looping(true);
        door.seek_sample(100).expect("seek");
        assert!(door.seek_sample(5000).is_err());
        door.play().expect("play");
        door.pause().expect("pause");
        assert_eq!(door.state(), AudioState::Paused);
        door.resume().expect("resume");
        door.fade_out(Duration::from_millis(5)).expect("fade");
        assert_eq!(door.state(), AudioState::Stopped);
        assert_eq!(door.volume(), 0.0);
        assert!(door.remove_owner(owner));
        assert_eq!(door.state(), AudioState::Unloaded);
    }

    #[test]
    fn test_shutdown_releases_backend() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "bell.wav", 300);
        let mut engine = engine();
        engine.play_sound(&path);
        let _kept = engine.create_sound();

        engine.shutdown();
        assert!(!engine.is_initialized());
        assert_eq!(engine.object_count(), 0);
        assert_eq!(engine.backend().voice_count(), 0);
        assert_eq!(engine.backend().buffer_count(), 0);
        assert!(engine.backend().opened_device().is_none());
    }

    #[test]
    fn test_forced_hardware_stop_is_detected() {
        let dir = TempDir::new().expect("temp dir");
        let path = wav(&dir, "loop.wav", 5000);
        let mut engine = engine();
        engine.play_sound(&path);
        let id = engine.retrieve_sound(&path).expect("sound");
        let voice = engine.voice_of(id).expect("voice");

        engine.backend_mut().force_voice_state(voice, VoiceState::Stopped);
        engine.update(FRAME);
        assert_eq!(state_of(&engine, id), AudioState::Stopped);
    }

    proptest! {
        #[test]
        fn prop_volume_clamp(sound in -10.0f32..10.0, music in -10.0f32..10.0) {
            let mut engine = engine();
            engine.set_sound_volume(sound);
            engine.set_music_volume(music);
            prop_assert_eq!(engine.sound_volume(), sound.clamp(0.0, 1.0));
            prop_assert_eq!(engine.music_volume(), music.clamp(0.0, 1.0));
        }
    }
}

//! Playback source pool.
//!
//! A fixed set of backend voices created at engine initialization. Each
//! source remembers which audio object currently owns it; an object's own
//! record of its source index is only trusted while the pool agrees.
//!
//! Acquisition order:
//! 1. the first source with no owner
//! 2. the first source whose voice is idle (initial or stopped); its previous
//!    owner is evicted and queued in the orphan list for the engine to settle
//! 3. nothing; every voice is audible

use tracing::{debug, warn};

use crate::backend::{AudioBackend, VoiceId};
use crate::handle::AudioId;

/// One hardware voice and its current owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSource {
    voice: VoiceId,
    owner: Option<AudioId>,
}

impl PlaybackSource {
    /// Backend voice.
    #[must_use]
    pub const fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Object currently bound to the voice.
    #[must_use]
    pub const fn owner(&self) -> Option<AudioId> {
        self.owner
    }
}

/// Fixed pool of playback sources.
#[derive(Debug, Default)]
pub struct SourcePool {
    sources: Vec<PlaybackSource>,
    orphaned: Vec<AudioId>,
}

impl SourcePool {
    /// Create voices until `max` is reached or the backend refuses.
    pub fn allocate<B: AudioBackend>(backend: &mut B, max: usize) -> Self {
        let mut sources = Vec::with_capacity(max);
        for i in 0..max {
            match backend.create_voice() {
                Ok(voice) => sources.push(PlaybackSource { voice, owner: None }),
                Err(e) => {
                    warn!("Could only create {} playback sources: {}", i, e);
                    break;
                },
            }
        }
        debug!("Allocated {} playback sources", sources.len());
        Self {
            sources,
            orphaned: Vec::new(),
        }
    }

    /// Bind a source to `owner`, returning its index.
    pub fn acquire<B: AudioBackend>(&mut self, owner: AudioId, backend: &mut B) -> Option<usize> {
        if let Some(index) = self.find(owner) {
            warn!("{} already holds playback source {}", owner, index);
            return Some(index);
        }

        if let Some(index) = self.sources.iter().position(|s| s.owner.is_none()) {
            self.sources[index].owner = Some(owner);
            return Some(index);
        }

        let index = (0..self.sources.len())
            .find(|&i| backend.voice_state(self.sources[i].voice).is_reclaimable())?;
        if let Some(previous) = self.sources[index].owner {
            debug!("Reclaiming playback source {} from {}", index, previous);
            self.orphaned.push(previous);
        }
        self.release(index, backend);
        self.sources[index].owner = Some(owner);
        Some(index)
    }

    /// Stop the voice, detach its buffers and clear the owner.
    pub fn release<B: AudioBackend>(&mut self, index: usize, backend: &mut B) {
        if let Some(source) = self.sources.get_mut(index) {
            backend.stop(source.voice);
            backend.attach_buffer(source.voice, None);
            source.owner = None;
        }
    }

    /// Owner of a source.
    #[must_use]
    pub fn owner(&self, index: usize) -> Option<AudioId> {
        self.sources.get(index).and_then(|s| s.owner)
    }

    /// Voice of a source.
    #[must_use]
    pub fn voice(&self, index: usize) -> Option<VoiceId> {
        self.sources.get(index).map(|s| s.voice)
    }

    /// Whether `owner` currently holds the source at `index`.
    #[must_use]
    pub fn is_owned_by(&self, index: usize, owner: AudioId) -> bool {
        self.owner(index) == Some(owner)
    }

    /// Index of the source held by `owner`.
    #[must_use]
    pub fn find(&self, owner: AudioId) -> Option<usize> {
        self.sources.iter().position(|s| s.owner == Some(owner))
    }

    /// Sources that have an owner, as `(index, owner)`.
    pub fn owned(&self) -> impl Iterator<Item = (usize, AudioId)> + '_ {
        self.sources
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.owner.map(|owner| (i, owner)))
    }

    /// Objects evicted by reclaiming acquisitions since the last call.
    pub fn take_orphaned(&mut self) -> Vec<AudioId> {
        std::mem::take(&mut self.orphaned)
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the pool holds no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Release and destroy every voice.
    pub fn destroy_all<B: AudioBackend>(&mut self, backend: &mut B) {
        for index in 0..self.sources.len() {
            self.release(index, backend);
        }
        for source in self.sources.drain(..) {
            backend.destroy_voice(source.voice);
        }
        self.orphaned.clear();
    }
}

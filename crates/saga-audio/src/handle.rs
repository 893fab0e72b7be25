//! Generational handles for audio objects.
//!
//! The engine owns every audio object in an [`ObjectArena`]. Callers, the
//! playback-source pool and the resource cache refer to objects only through
//! [`AudioId`]s, so a freed slot can be reused without a stale handle ever
//! reaching the new occupant.

use std::fmt;

use crate::object::AudioKind;

/// Handle of any audio object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioId {
    index: u32,
    generation: u32,
}

impl AudioId {
    /// Create a handle from its parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation (for detecting stale handles).
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio#{}v{}", self.index, self.generation)
    }
}

/// Handle of a sound object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(AudioId);

impl SoundId {
    pub(crate) const fn new(id: AudioId) -> Self {
        Self(id)
    }

    /// Untyped handle.
    #[must_use]
    pub const fn id(self) -> AudioId {
        self.0
    }
}

/// Handle of a music object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicId(AudioId);

impl MusicId {
    pub(crate) const fn new(id: AudioId) -> Self {
        Self(id)
    }

    /// Untyped handle.
    #[must_use]
    pub const fn id(self) -> AudioId {
        self.0
    }
}

impl From<SoundId> for AudioId {
    fn from(id: SoundId) -> Self {
        id.0
    }
}

impl From<MusicId> for AudioId {
    fn from(id: MusicId) -> Self {
        id.0
    }
}

/// Kind-tagged handle, as stored by the resource cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachedAudio {
    /// A cached sound.
    Sound(SoundId),
    /// A cached music track.
    Music(MusicId),
}

impl CachedAudio {
    /// Tag an untyped handle with its kind.
    #[must_use]
    pub const fn from_kind(id: AudioId, kind: AudioKind) -> Self {
        match kind {
            AudioKind::Sound => Self::Sound(SoundId(id)),
            AudioKind::Music => Self::Music(MusicId(id)),
        }
    }

    /// Untyped handle.
    #[must_use]
    pub const fn id(self) -> AudioId {
        match self {
            Self::Sound(id) => id.0,
            Self::Music(id) => id.0,
        }
    }

    /// Kind of the cached object.
    #[must_use]
    pub const fn kind(self) -> AudioKind {
        match self {
            Self::Sound(_) => AudioKind::Sound,
            Self::Music(_) => AudioKind::Music,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with generation-checked handles.
#[derive(Debug)]
pub struct ObjectArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for ObjectArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> ObjectArena<T> {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value built from its own handle.
    pub fn insert_with(&mut self, build: impl FnOnce(AudioId) -> T) -> AudioId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            },
        };
        let slot = &mut self.slots[index as usize];
        let id = AudioId::new(index, slot.generation);
        slot.value = Some(build(id));
        self.len += 1;
        id
    }

    /// Remove a value; the handle and any copies of it become stale.
    pub fn remove(&mut self, id: AudioId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    /// Look up a live value.
    #[must_use]
    pub fn get(&self, id: AudioId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Look up a live value mutably.
    pub fn get_mut(&mut self, id: AudioId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether the handle is live.
    #[must_use]
    pub fn contains(&self, id: AudioId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (AudioId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (AudioId::new(index as u32, slot.generation), value))
        })
    }

    /// Remove every value.
    pub fn drain(&mut self) -> Vec<(AudioId, T)> {
        let mut out = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                out.push((AudioId::new(index as u32, slot.generation), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        out
    }
}

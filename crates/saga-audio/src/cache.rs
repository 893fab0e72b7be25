//! Filename-keyed resource cache for fire-and-forget playback.
//!
//! The cache only records which object belongs to which file and when it was
//! last touched; the objects themselves live in the engine's arena. Choosing a
//! victim needs the objects' states, so the engine passes a predicate to
//! [`ResourceCache::least_recent`].

use std::collections::HashMap;
use std::time::Duration;

use crate::handle::{AudioId, CachedAudio};

/// Ordering key of a cache touch.
///
/// `seq` orders touches that happen within the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheStamp {
    /// Engine clock at the touch.
    pub time: Duration,
    /// Global touch counter.
    pub seq: u64,
}

/// One cached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Last touch.
    pub stamp: CacheStamp,
    /// Object holding the file.
    pub audio: CachedAudio,
}

/// Bounded map from filename to cached audio.
#[derive(Debug)]
pub struct ResourceCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    seq: u64,
}

impl ResourceCache {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            seq: 0,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the maximum number of entries (at least one).
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    fn next_stamp(&mut self, time: Duration) -> CacheStamp {
        self.seq += 1;
        CacheStamp {
            time,
            seq: self.seq,
        }
    }

    /// Look up a file.
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&CacheEntry> {
        self.entries.get(filename)
    }

    /// Whether a file is cached.
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Refresh the touch stamp of a file. Returns false if it is not cached.
    pub fn touch(&mut self, filename: &str, time: Duration) -> bool {
        if !self.entries.contains_key(filename) {
            return false;
        }
        let stamp = self.next_stamp(time);
        if let Some(entry) = self.entries.get_mut(filename) {
            entry.stamp = stamp;
        }
        true
    }

    /// Insert or replace an entry, stamped as just touched.
    pub fn insert(&mut self, filename: impl Into<String>, audio: CachedAudio, time: Duration) {
        let stamp = self.next_stamp(time);
        self.entries.insert(filename.into(), CacheEntry { stamp, audio });
    }

    /// Remove an entry.
    pub fn remove(&mut self, filename: &str) -> Option<CacheEntry> {
        self.entries.remove(filename)
    }

    /// Remove every entry referring to `audio`.
    pub fn remove_audio(&mut self, audio: AudioId) {
        self.entries.retain(|_, entry| entry.audio.id() != audio);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another insert would exceed the capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// The least recently touched entry accepted by `evictable`.
    pub fn least_recent(&self, mut evictable: impl FnMut(&CacheEntry) -> bool) -> Option<(&str, &CacheEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| evictable(entry))
            .min_by_key(|(_, entry)| entry.stamp)
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Iterate entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Remove and return every entry.
    pub fn drain(&mut self) -> Vec<(String, CacheEntry)> {
        self.entries.drain().collect()
    }
}

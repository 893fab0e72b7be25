//! ID types for game modes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for game mode IDs.
static GAME_MODE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a top-level game mode.
///
/// Resources record the modes that claim them; the identity is only ever
/// compared, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameModeId(u64);

impl GameModeId {
    /// Creates a new unique game mode ID.
    #[must_use]
    pub fn new() -> Self {
        Self(GAME_MODE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a game mode ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for GameModeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GameModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mode#{}", self.0)
    }
}

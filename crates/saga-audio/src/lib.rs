//! # Saga Audio
//!
//! Sound effect and music playback for the Saga engine.
//!
//! This crate provides:
//! - A bounded pool of hardware playback sources with reclamation of
//!   stopped voices
//! - Sound and music objects with a small state machine (play, pause,
//!   stop, fade in, fade out)
//! - Static and streamed loading of WAV and Ogg Vorbis files
//! - A filename-keyed resource cache with least-recently-used eviction
//! - A listener and per-object 3D placement
//!
//! ## Architecture
//!
//! The [`AudioEngine`] owns everything: the device backend, the source pool,
//! every audio object (addressed through generational [`SoundId`] and
//! [`MusicId`] handles) and the cache. Objects borrow a playback source while
//! they need one; the pool records the owner so that a source reclaimed for
//! another object is never used by its previous holder.
//!
//! ## Backends
//!
//! Hardware access goes through the [`AudioBackend`] trait:
//! - [`RodioBackend`] plays through the system output device
//! - [`VirtualBackend`] simulates voices in memory for headless runs and tests
//!
//! ## Threading
//!
//! The engine is single-threaded. Call [`AudioEngine::update`] once per frame
//! from the thread that owns it; streaming refills and fades happen there.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod handle;
pub mod listener;
pub mod object;
pub mod rodio_backend;
pub mod source;
pub mod stream;
pub mod virtual_backend;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::buffer::*;
    pub use crate::cache::*;
    pub use crate::config::*;
    pub use crate::decoder::*;
    pub use crate::engine::*;
    pub use crate::error::*;
    pub use crate::handle::*;
    pub use crate::listener::*;
    pub use crate::object::*;
    pub use crate::rodio_backend::*;
    pub use crate::source::*;
    pub use crate::stream::*;
    pub use crate::virtual_backend::*;
    pub use saga_common::GameModeId;
}

pub use prelude::*;

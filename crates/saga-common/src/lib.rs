//! # Saga Common
//!
//! Identity types shared between the Saga subsystems.
//!
//! Subsystems such as audio track which top-level game modes (title screen,
//! map exploration, battle, ...) have claimed a resource. They only need a
//! cheap, comparable identity for that, which lives here so that the mode
//! stack and the resource owners agree on one type.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
}

pub use prelude::*;

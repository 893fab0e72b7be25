//! # Saga Engine
//!
//! Command-line entry point for the Saga audio subsystem.
//!
//! ```text
//! saga [--config saga.toml] [--headless] [--write-config] [--music FILE] [SOUND ...]
//! ```
//!
//! Plays the given music track and sound effects through the audio engine,
//! driving it with a fixed frame loop until everything has stopped.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod timing;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("saga=info".parse()?))
        .init();

    info!("Saga starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = app::Args::parse();
    app::run(&args)?;

    info!("Saga shutdown complete");
    Ok(())
}

//! Engine configuration.
//!
//! Frame-loop settings plus the `[audio]` table handed to the audio engine.
//! Configuration can be loaded from and saved to a TOML file.

use saga_audio::AudioConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "saga.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per second of the update loop
    pub target_fps: u32,
    /// Stop after this many frames (0 = until playback ends)
    pub max_frames: u64,
    /// Audio engine settings
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_frames: 0,
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.target_fps = self.target_fps.clamp(10, 240);
        self.audio.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.max_frames, 0);
        assert_eq!(config.audio.max_sources, 64);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.target_fps = 1;
        config.audio.sound_volume = 3.0;

        config.validate();

        assert_eq!(config.target_fps, 10);
        assert_eq!(config.audio.sound_volume, 1.0);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("saga.toml");

        let mut config = EngineConfig::default();
        config.max_frames = 600;
        config.audio = config.audio.with_headless(true).with_preferred_device("Speakers");

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/saga.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("saga.toml");
        fs::write(&config_path, "target_fps = \"fast\"").expect("write");

        let config = EngineConfig::load_from(&config_path);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_audio_table() {
        let config: EngineConfig = toml::from_str(
            "max_frames = 10\n\n[audio]\nmax_sources = 8\nmusic_volume = 0.5\n",
        )
        .expect("parse");
        assert_eq!(config.max_frames, 10);
        assert_eq!(config.audio.max_sources, 8);
        assert_eq!(config.audio.music_volume, 0.5);
        assert_eq!(config.target_fps, 60);
    }
}

//! Application lifecycle management.
//!
//! A small jukebox: it claims the requested files for one game mode, plays
//! them, drives the audio engine once per frame until everything has
//! stopped and releases the files on exit.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use saga_audio::{AudioBackend, AudioEngine, AudioId, AudioState, RodioBackend, VirtualBackend};
use saga_common::GameModeId;

use crate::config::{EngineConfig, CONFIG_FILE};
use crate::timing::FrameTiming;

/// Command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "saga")]
#[command(about = "Play music and sound effects through the Saga audio engine")]
pub struct Args {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Force the virtual backend
    #[arg(long)]
    pub headless: bool,

    /// Write the effective configuration back to `config`
    #[arg(long)]
    pub write_config: bool,

    /// Background music track
    #[arg(long)]
    pub music: Option<String>,

    /// Sound effects to play
    pub sounds: Vec<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from(CONFIG_FILE),
            headless: false,
            write_config: false,
            music: None,
            sounds: Vec::new(),
        }
    }
}

/// Outcome of a jukebox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames driven
    pub frames: u64,
    /// Files that started playing
    pub started: usize,
}

/// Load the configuration and run the jukebox on the configured backend.
pub fn run(args: &Args) -> Result<RunSummary> {
    let mut config = EngineConfig::load_from(&args.config);
    if args.headless {
        config.audio.headless = true;
    }
    if args.write_config {
        config
            .save_to(&args.config)
            .with_context(|| format!("writing {}", args.config.display()))?;
    }

    let summary = if config.audio.headless {
        Jukebox::new(VirtualBackend::new(), &config)?.play(args, false)
    } else {
        Jukebox::new(RodioBackend::new(), &config)?.play(args, true)
    };
    info!(
        "Jukebox finished: {} files played over {} frames",
        summary.started, summary.frames
    );
    Ok(summary)
}

/// The audio engine plus the game mode that owns everything it loads.
struct Jukebox<B: AudioBackend> {
    engine: AudioEngine<B>,
    owner: GameModeId,
    timing: FrameTiming,
    max_frames: u64,
    playing: Vec<AudioId>,
}

impl<B: AudioBackend> Jukebox<B> {
    fn new(backend: B, config: &EngineConfig) -> Result<Self> {
        let mut engine = AudioEngine::new(backend, config.audio.clone());
        engine
            .initialize()
            .context("audio engine failed to initialize")?;
        Ok(Self {
            engine,
            owner: GameModeId::new(),
            timing: FrameTiming::new(config.target_fps),
            max_frames: config.max_frames,
            playing: Vec::new(),
        })
    }

    fn play(mut self, args: &Args, realtime: bool) -> RunSummary {
        self.start(args);
        let started = self.playing.len();

        let mut frames = 0;
        while !self.is_finished() {
            if self.max_frames > 0 && frames >= self.max_frames {
                info!("Frame limit {} reached", self.max_frames);
                break;
            }
            let dt = if realtime {
                self.timing.sleep_remainder();
                self.timing.delta_time()
            } else {
                let dt = self.timing.frame_budget();
                self.timing.record(dt);
                dt
            };
            self.engine.update(dt);
            frames += 1;
        }
        info!(
            "Average frame time {:.2}ms",
            self.timing.average_frame_time_ms()
        );

        self.engine.remove_game_mode_owner(self.owner);
        self.engine.shutdown();
        RunSummary { frames, started }
    }

    fn start(&mut self, args: &Args) {
        if let Some(music) = &args.music {
            match self.engine.load_music(music, Some(self.owner)) {
                Ok(id) => {
                    self.engine.play_music(music);
                    self.playing.push(id.into());
                },
                Err(e) => warn!("Skipping music '{}': {}", music, e),
            }
        }
        for sound in &args.sounds {
            match self.engine.load_sound(sound, Some(self.owner)) {
                Ok(id) => {
                    self.engine.play_sound(sound);
                    self.playing.push(id.into());
                },
                Err(e) => warn!("Skipping sound '{}': {}", sound, e),
            }
        }
    }

    fn state_of(&self, id: AudioId) -> AudioState {
        self.engine
            .object(id)
            .map_or(AudioState::Unloaded, |object| object.state())
    }

    fn is_finished(&self) -> bool {
        self.playing
            .iter()
            .all(|id| !self.state_of(*id).needs_source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Mono 16-bit WAV as a path string.
    fn write_wav(dir: &Path, name: &str, rate: u32, frames: u32) -> String {
        saga_audio::test_support::write_wav(dir, name, 1, rate, frames)
            .to_string_lossy()
            .into_owned()
    }

    fn headless_config(max_frames: u64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.target_fps = 20;
        config.max_frames = max_frames;
        config.audio = config.audio.with_max_sources(8).with_headless(true);
        config
    }

    fn args(sounds: &[String], music: Option<String>) -> Args {
        Args {
            music,
            sounds: sounds.to_vec(),
            headless: true,
            ..Args::default()
        }
    }

    #[test]
    fn test_parse_args() {
        let parsed = Args::try_parse_from([
            "saga",
            "--headless",
            "--music",
            "bgm.ogg",
            "a.wav",
            "--config",
            "x.toml",
            "b.wav",
        ])
        .expect("parse");
        assert!(parsed.headless);
        assert!(!parsed.write_config);
        assert_eq!(parsed.music.as_deref(), Some("bgm.ogg"));
        assert_eq!(parsed.sounds, vec!["a.wav".to_string(), "b.wav".to_string()]);
        assert_eq!(parsed.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(Args::try_parse_from(["saga", "--bogus"]).is_err());
        assert!(Args::try_parse_from(["saga", "--music"]).is_err());
        assert_eq!(Args::try_parse_from(["saga"]).expect("parse"), Args::default());
    }

    #[test]
    fn test_headless_run_plays_to_completion() {
        let dir = TempDir::new().expect("temp dir");
        let beep = write_wav(dir.path(), "beep.wav", 1000, 300);
        let theme = write_wav(dir.path(), "theme.wav", 1000, 1000);

        let summary = Jukebox::new(VirtualBackend::new(), &headless_config(0))
            .expect("jukebox")
            .play(&args(&[beep], Some(theme)), false);

        assert_eq!(summary.started, 2);
        assert!(summary.frames >= 20, "ran {} frames", summary.frames);
        assert!(summary.frames < 100, "ran {} frames", summary.frames);
    }

    #[test]
    fn test_frame_limit() {
        let dir = TempDir::new().expect("temp dir");
        let long = write_wav(dir.path(), "long.wav", 1000, 60_000);

        let summary = Jukebox::new(VirtualBackend::new(), &headless_config(5))
            .expect("jukebox")
            .play(&args(&[long], None), false);
        assert_eq!(summary, RunSummary { frames: 5, started: 1 });
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let summary = Jukebox::new(VirtualBackend::new(), &headless_config(0))
            .expect("jukebox")
            .play(&args(&["/nonexistent/a.wav".to_string()], None), false);
        assert_eq!(summary, RunSummary { frames: 0, started: 0 });
    }

    #[test]
    fn test_owner_released_on_exit() {
        let dir = TempDir::new().expect("temp dir");
        let beep = write_wav(dir.path(), "beep.wav", 1000, 100);
        let mut jukebox = Jukebox::new(VirtualBackend::new(), &headless_config(0)).expect("jukebox");

        jukebox.start(&args(&[beep.clone()], None));
        assert!(jukebox.engine.is_cached(&beep));
        jukebox.engine.remove_game_mode_owner(jukebox.owner);
        assert!(!jukebox.engine.is_cached(&beep));
        assert_eq!(jukebox.engine.object_count(), 0);
    }

    #[test]
    fn test_run_writes_config() {
        let dir = TempDir::new().expect("temp dir");
        let config = dir.path().join("saga.toml");
        let run_args = Args {
            config: config.clone(),
            headless: true,
            write_config: true,
            ..Args::default()
        };

        let summary = run(&run_args).expect("run");
        assert_eq!(summary.frames, 0);
        assert!(EngineConfig::load_from(&config).audio.headless);
    }
}

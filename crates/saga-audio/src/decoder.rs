//! Audio File Decoders
//!
//! Two container formats are supported, picked by file extension:
//!
//! | Extension        | Format                 | Typical use            |
//! |------------------|------------------------|------------------------|
//! | `.wav`           | PCM in RIFF/WAVE       | short sound effects    |
//! | `.ogg`, `.oga`   | Ogg Vorbis             | streamed music         |
//!
//! Both are decoded through symphonia into interleaved 16-bit samples. A
//! decoder can read from the file on disk or from a byte vector already held
//! in memory.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::backend::PcmSpec;
use crate::error::{AudioError, AudioResult};

/// Container format, selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderFormat {
    /// RIFF/WAVE PCM.
    Wav,
    /// Ogg Vorbis.
    Ogg,
}

impl DecoderFormat {
    /// Pick the format from a file name (case-insensitive).
    pub fn from_path(path: &Path) -> AudioResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| AudioError::UnsupportedFormat(path.display().to_string()))?;
        match ext.as_str() {
            "wav" => Ok(Self::Wav),
            "ogg" | "oga" => Ok(Self::Ogg),
            _ => Err(AudioError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Extension hint handed to the container probe.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }
}

/// Source of PCM frames.
pub trait AudioDecoder {
    /// Layout of the decoded output.
    fn spec(&self) -> PcmSpec;

    /// Total frames in the file, when the container reports it.
    fn total_frames(&self) -> Option<u64>;

    /// Append up to `frames` frames of interleaved samples to `out`.
    /// Returns the number of frames appended; zero means end of data.
    fn read(&mut self, out: &mut Vec<i16>, frames: usize) -> AudioResult<usize>;

    /// Reposition so the next `read` starts at `frame`.
    fn seek(&mut self, frame: u64) -> AudioResult<()>;
}

/// symphonia-backed decoder for both supported formats.
pub struct FileDecoder {
    format: DecoderFormat,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: PcmSpec,
    total_frames: Option<u64>,
    /// Decoded samples not yet handed out.
    pending: VecDeque<i16>,
    /// Frames to drop after an inexact seek.
    skip_frames: u64,
    finished: bool,
}

impl std::fmt::Debug for FileDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDecoder")
            .field("format", &self.format)
            .field("spec", &self.spec)
            .field("total_frames", &self.total_frames)
            .finish_non_exhaustive()
    }
}

impl FileDecoder {
    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> AudioResult<Self> {
        let path = path.as_ref();
        let format = DecoderFormat::from_path(path)?;
        let file = File::open(path).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_source(Box::new(file), format)
    }

    /// Read a whole file into memory and decode from there.
    pub fn open_in_memory(path: impl AsRef<Path>) -> AudioResult<Self> {
        let path = path.as_ref();
        let format = DecoderFormat::from_path(path)?;
        let bytes = std::fs::read(path).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_bytes(bytes, format)
    }

    /// Decode from bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>, format: DecoderFormat) -> AudioResult<Self> {
        Self::from_source(Box::new(Cursor::new(bytes)), format)
    }

    fn from_source(source: Box<dyn MediaSource>, format: DecoderFormat) -> AudioResult<Self> {
        let stream = MediaSourceStream::new(source, Default::default());
        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::DecodeFailed("no audio track".to_string()))?;
        let params = &track.codec_params;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| AudioError::DecodeFailed("unknown channel layout".to_string()))?;
        let rate = params
            .sample_rate
            .ok_or_else(|| AudioError::DecodeFailed("unknown sample rate".to_string()))?;
        let total_frames = params.n_frames;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;

        debug!(
            "Opened {:?} decoder: {} ch, {} Hz, {:?} frames",
            format, channels, rate, total_frames
        );

        Ok(Self {
            format,
            reader,
            decoder,
            track_id,
            spec: PcmSpec::new(channels, rate),
            total_frames,
            pending: VecDeque::new(),
            skip_frames: 0,
            finished: false,
        })
    }

    /// Container format of this decoder.
    #[must_use]
    pub const fn format(&self) -> DecoderFormat {
        self.format
    }

    /// Decode the next packet into `pending`. Returns false at end of data.
    fn decode_packet(&mut self) -> AudioResult<bool> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                },
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                },
                Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt audio packet: {}", e);
                    continue;
                },
                Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
            };

            let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
            samples.copy_interleaved_ref(decoded);

            let channels = usize::from(self.spec.channels.max(1));
            let mut data = samples.samples();
            if self.skip_frames > 0 {
                let skip = (self.skip_frames as usize).min(data.len() / channels);
                data = &data[skip * channels..];
                self.skip_frames -= skip as u64;
            }
            self.pending.extend(data.iter().copied());
            return Ok(true);
        }
    }
}

impl AudioDecoder for FileDecoder {
    fn spec(&self) -> PcmSpec {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn read(&mut self, out: &mut Vec<i16>, frames: usize) -> AudioResult<usize> {
        let channels = usize::from(self.spec.channels.max(1));
        let wanted = frames * channels;

        while self.pending.len() < wanted && !self.finished {
            if !self.decode_packet()? {
                self.finished = true;
            }
        }

        let take = wanted.min(self.pending.len() - self.pending.len() % channels);
        out.extend(self.pending.drain(..take));
        Ok(take / channels)
    }

    fn seek(&mut self, frame: u64) -> AudioResult<()> {
        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| AudioError::DecodeFailed(format!("seek to frame {frame}: {e}")))?;
        self.decoder.reset();
        self.pending.clear();
        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.finished = false;
        Ok(())
    }
}

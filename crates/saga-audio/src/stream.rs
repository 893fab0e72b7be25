//! Looping stream over a decoder.
//!
//! Streaming objects pull fixed-size chunks through [`AudioStream::fill`].
//! When looping, reaching the loop end (or the end of data) wraps the decoder
//! back to the loop start within the same fill, so the hardware queue never
//! sees a gap.

use tracing::debug;

use crate::backend::PcmSpec;
use crate::decoder::AudioDecoder;
use crate::error::{AudioError, AudioResult};

/// Decoder plus loop state and read position.
pub struct AudioStream {
    decoder: Box<dyn AudioDecoder>,
    looping: bool,
    loop_start: u64,
    /// Exclusive loop end; `None` loops at end of data.
    loop_end: Option<u64>,
    position: u64,
    end_of_stream: bool,
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("looping", &self.looping)
            .field("loop_start", &self.loop_start)
            .field("loop_end", &self.loop_end)
            .field("position", &self.position)
            .field("end_of_stream", &self.end_of_stream)
            .finish_non_exhaustive()
    }
}

impl AudioStream {
    /// Wrap a decoder positioned at its first frame.
    #[must_use]
    pub fn new(decoder: Box<dyn AudioDecoder>) -> Self {
        Self {
            decoder,
            looping: false,
            loop_start: 0,
            loop_end: None,
            position: 0,
            end_of_stream: false,
        }
    }

    /// Output layout.
    #[must_use]
    pub fn spec(&self) -> PcmSpec {
        self.decoder.spec()
    }

    /// Total frames, when known.
    #[must_use]
    pub fn total_frames(&self) -> Option<u64> {
        self.decoder.total_frames()
    }

    /// Whether the last fill ran out of data without looping.
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Next frame to be read.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Whether the stream wraps at the loop end.
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    /// Enable or disable looping.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Frame the stream wraps back to.
    pub fn set_loop_start(&mut self, frame: u64) -> AudioResult<()> {
        let end = self.loop_end.or(self.total_frames()).unwrap_or(u64::MAX);
        if frame >= end {
            return Err(AudioError::SeekOutOfRange {
                requested: frame,
                total: end,
            });
        }
        self.loop_start = frame;
        Ok(())
    }

    /// Frame at which the stream wraps.
    pub fn set_loop_end(&mut self, frame: u64) -> AudioResult<()> {
        let total = self.total_frames().unwrap_or(u64::MAX);
        if frame <= self.loop_start || frame > total {
            return Err(AudioError::SeekOutOfRange {
                requested: frame,
                total,
            });
        }
        self.loop_end = Some(frame);
        Ok(())
    }

    /// Reposition the stream.
    pub fn seek(&mut self, frame: u64) -> AudioResult<()> {
        self.decoder.seek(frame)?;
        self.position = frame;
        self.end_of_stream = false;
        Ok(())
    }

    /// Append up to `frames` frames to `out`, wrapping when looping.
    /// Returns the frames appended.
    pub fn fill(&mut self, out: &mut Vec<i16>, frames: usize) -> AudioResult<usize> {
        let mut filled = 0;
        let mut empty_wraps = 0;

        while filled < frames && !self.end_of_stream {
            let mut want = frames - filled;
            if let Some(end) = self.loop_end.filter(|_| self.looping) {
                want = want.min(end.saturating_sub(self.position) as usize);
            }

            let read = if want == 0 {
                0
            } else {
                self.decoder.read(out, want)?
            };
            self.position += read as u64;
            filled += read;

            if read > 0 {
                empty_wraps = 0;
                continue;
            }

            if self.looping && empty_wraps == 0 {
                debug!("Stream wrapping to frame {}", self.loop_start);
                self.decoder.seek(self.loop_start)?;
                self.position = self.loop_start;
                empty_wraps += 1;
            } else {
                self.end_of_stream = true;
            }
        }

        Ok(filled)
    }
}

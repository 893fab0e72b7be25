//! WAV fixtures for tests, here and in dependent crates (`test-support` feature).

use std::path::{Path, PathBuf};

/// Write a 16-bit PCM WAV file of `frames` frames and return its path.
pub fn write_wav(dir: &Path, name: &str, channels: u16, rate: u32, frames: u32) -> PathBuf {
    let block_align = u32::from(channels) * 2;
    let data_len = frames * block_align;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&(rate * block_align).to_le_bytes());
    bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for frame in 0..frames {
        let sample = ((frame % 64) as i16 - 32) * 512;
        for _ in 0..channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write wav fixture");
    path
}

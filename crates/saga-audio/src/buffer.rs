//! Decoded sample buffers owned by an audio object.

use crate::backend::{AudioBackend, BufferHandle, PcmSpec};
use crate::error::AudioResult;

/// Buffers in a streaming ring.
pub const NUMBER_STREAMING_BUFFERS: usize = 4;

/// Backend buffers holding an object's PCM data.
#[derive(Debug)]
pub enum DecodedBuffer {
    /// Whole file decoded into one buffer.
    Static(BufferHandle),
    /// Ring of buffers refilled while playing.
    Streaming {
        /// Every buffer of the ring.
        ring: Vec<BufferHandle>,
        /// Buffers not currently queued on a voice.
        idle: Vec<BufferHandle>,
    },
}

impl DecodedBuffer {
    /// Create and fill a single buffer.
    pub fn allocate_static<B: AudioBackend>(
        backend: &mut B,
        spec: PcmSpec,
        samples: &[i16],
    ) -> AudioResult<Self> {
        let buffer = backend.create_buffer()?;
        if let Err(e) = backend.fill_buffer(buffer, spec, samples) {
            backend.destroy_buffer(buffer);
            return Err(e);
        }
        Ok(Self::Static(buffer))
    }

    /// Create an empty streaming ring; every buffer starts idle.
    pub fn allocate_streaming<B: AudioBackend>(backend: &mut B) -> AudioResult<Self> {
        let mut ring = Vec::with_capacity(NUMBER_STREAMING_BUFFERS);
        for _ in 0..NUMBER_STREAMING_BUFFERS {
            match backend.create_buffer() {
                Ok(buffer) => ring.push(buffer),
                Err(e) => {
                    for buffer in ring {
                        backend.destroy_buffer(buffer);
                    }
                    return Err(e);
                },
            }
        }
        let idle = ring.iter().rev().copied().collect();
        Ok(Self::Streaming { ring, idle })
    }

    /// Destroy every backend buffer.
    pub fn release<B: AudioBackend>(self, backend: &mut B) {
        match self {
            Self::Static(buffer) => backend.destroy_buffer(buffer),
            Self::Streaming { ring, .. } => {
                for buffer in ring {
                    backend.destroy_buffer(buffer);
                }
            },
        }
    }

    /// Whether this is a streaming ring.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Next idle ring buffer, in ring order.
    pub fn take_idle(&mut self) -> Option<BufferHandle> {
        match self {
            Self::Static(_) => None,
            Self::Streaming { idle, .. } => idle.pop(),
        }
    }

    /// Return buffers the voice has finished with.
    pub fn mark_idle(&mut self, buffers: &[BufferHandle]) {
        if let Self::Streaming { ring, idle } = self {
            for buffer in buffers {
                if ring.contains(buffer) && !idle.contains(buffer) {
                    idle.insert(0, *buffer);
                }
            }
        }
    }

    /// Mark the whole ring idle, after the voice's queue was cleared.
    pub fn reset_idle(&mut self) {
        if let Self::Streaming { ring, idle } = self {
            *idle = ring.iter().rev().copied().collect();
        }
    }

    /// Number of idle ring buffers.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        match self {
            Self::Static(_) => 0,
            Self::Streaming { idle, .. } => idle.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_backend::VirtualBackend;

    fn opened() -> VirtualBackend {
        let mut backend = VirtualBackend::new();
        backend.open_device(None).expect("open");
        backend
    }

    #[test]
    fn test_static_buffer_lifecycle() {
        let mut backend = opened();
        let buffer =
            DecodedBuffer::allocate_static(&mut backend, PcmSpec::new(1, 1000), &[0; 10]).expect("alloc");
        assert!(!buffer.is_streaming());
        assert_eq!(backend.buffer_count(), 1);
        buffer.release(&mut backend);
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn test_streaming_ring_idle_tracking() {
        let mut backend = opened();
        let mut ring = DecodedBuffer::allocate_streaming(&mut backend).expect("alloc");
        assert_eq!(backend.buffer_count(), NUMBER_STREAMING_BUFFERS);
        assert_eq!(ring.idle_count(), NUMBER_STREAMING_BUFFERS);

        let first = ring.take_idle().expect("idle");
        let second = ring.take_idle().expect("idle");
        assert_ne!(first, second);
        assert_eq!(ring.idle_count(), 2);

        ring.mark_idle(&[first, first]);
        assert_eq!(ring.idle_count(), 3);

        ring.reset_idle();
        assert_eq!(ring.idle_count(), NUMBER_STREAMING_BUFFERS);
        assert_eq!(ring.take_idle(), Some(first));

        ring.release(&mut backend);
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn test_allocation_requires_device() {
        let mut backend = VirtualBackend::new();
        assert!(DecodedBuffer::allocate_streaming(&mut backend).is_err());
        assert_eq!(backend.buffer_count(), 0);
    }
}

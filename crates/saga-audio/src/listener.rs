//! Listener placement for 3D audio.

use glam::Vec3;

/// The point in the world that hears every voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    /// Position in world coordinates.
    pub position: Vec3,
    /// Velocity for Doppler effect (world units per second).
    pub velocity: Vec3,
    /// Facing direction ("at" vector).
    pub forward: Vec3,
    /// Up vector.
    pub up: Vec3,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

impl Listener {
    /// Create a listener at a position.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the orientation. Zero-length vectors leave the old value in place.
    pub fn set_orientation(&mut self, forward: Vec3, up: Vec3) {
        if let Some(forward) = forward.try_normalize() {
            self.forward = forward;
        }
        if let Some(up) = up.try_normalize() {
            self.up = up;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_orientation_normalized() {
        let mut listener = Listener::new(Vec3::new(1.0, 2.0, 3.0));
        listener.set_orientation(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(listener.forward, Vec3::NEG_Z);
        assert_eq!(listener.up, Vec3::Y);
        assert_eq!(listener.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_listener_rejects_zero_vectors() {
        let mut listener = Listener::default();
        listener.set_orientation(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(listener.forward, Vec3::NEG_Z);
        assert_eq!(listener.up, Vec3::Y);
    }
}

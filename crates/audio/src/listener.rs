//! Listener pose for 3D audio.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Position and orientation of the virtual microphone.
///
/// `up` must be perpendicular to `forward`; the facade forwards the pose
/// as given and does not correct it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListenerPose {
    /// World position of the listener
    pub position: Vec3,
    /// Direction the listener is facing
    pub forward: Vec3,
    /// Up direction, perpendicular to `forward`
    pub up: Vec3,
}

impl ListenerPose {
    /// Create a pose from raw vectors.
    pub fn new(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        Self {
            position,
            forward,
            up,
        }
    }

    /// Starting pose: one meter behind the origin, looking down +Z.
    pub fn initial(distance_factor: f32) -> Self {
        Self::new(
            Vec3::new(0.0, 0.0, -distance_factor),
            Vec3::Z,
            Vec3::Y,
        )
    }

    /// Unit vector to the listener's right (left-handed, +X is right for the
    /// initial pose). Falls back to +X if `forward` and `up` are degenerate.
    pub fn right(&self) -> Vec3 {
        self.up.cross(self.forward).try_normalize().unwrap_or(Vec3::X)
    }

    /// Whether `forward` and `up` are (nearly) perpendicular.
    pub fn is_orthogonal(&self) -> bool {
        let (Some(f), Some(u)) = (self.forward.try_normalize(), self.up.try_normalize()) else {
            return false;
        };
        f.dot(u).abs() <= 1e-3
    }

    /// Left and right ear positions, `spacing` apart.
    pub fn ears(&self, spacing: f32) -> (Vec3, Vec3) {
        let offset = self.right() * (spacing * 0.5);
        (self.position - offset, self.position + offset)
    }
}

impl Default for ListenerPose {
    fn default() -> Self {
        Self::initial(1.0)
    }
}

//! Transform component for ECS entities.

use glam::{Quat, Vec3};

/// World placement of an entity: translation, unit rotation and non-uniform scale.
///
/// Scale is only honoured by shapes that can represent it exactly (cubes and
/// convex hulls); spheres, cylinders and capsules ignore it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Create an identity transform.
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Create a transform from a position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Create a transform from a position and rotation.
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotate a local direction into world space (scale is not applied).
    pub fn rotate(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// Rotate a world direction into the local frame.
    pub fn unrotate(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * world
    }

    /// Map a local point to world space (scale, then rotation, then translation).
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * (local * self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

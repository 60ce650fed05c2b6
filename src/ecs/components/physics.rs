//! Physics components for ECS entities.

use std::sync::Arc;

use glam::{Mat3, Vec3};

use crate::error::PhysicsError;
use crate::physics::rigid_body::inverse_inertia_tensor;

use super::transform::Transform;

/// Rigid body component.
///
/// An entity with a [`Collider`] but no `RigidBody` behaves as
/// [`RigidBody::STATIC`]. A body with `inv_mass == 0` never moves; the solver
/// simply adds its zero inverse mass and inertia into every denominator.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Force accumulated during the current substep. Cleared by integration.
    pub force_accumulator: Vec3,
    /// Torque accumulated during the current substep. Cleared by integration.
    pub torque_accumulator: Vec3,
    /// Zero for static bodies.
    pub inv_mass: f32,
    /// Coefficient of restitution (0.0 - 1.0). A contact uses the lower of the two.
    pub restitution: f32,
    /// Static friction coefficient. A contact uses the mean of the two.
    pub static_friction: f32,
    /// Dynamic friction coefficient. A contact uses the mean of the two.
    pub dynamic_friction: f32,
    /// Multiplier on the world gravity (default: 1.0).
    pub gravity_scale: f32,
    /// Diagonal inverse inertia tensor in the body frame.
    pub inv_inertia_local: Mat3,
    /// `R * inv_inertia_local * R^T`, refreshed every substep.
    pub inv_inertia_world: Mat3,
}

impl RigidBody {
    /// Shared infinite-mass body used for colliders without a rigid body.
    ///
    /// Its restitution is 1.0 so that the minimum taken per contact defers to
    /// the other body's material.
    pub const STATIC: RigidBody = RigidBody {
        velocity: Vec3::ZERO,
        angular_velocity: Vec3::ZERO,
        force_accumulator: Vec3::ZERO,
        torque_accumulator: Vec3::ZERO,
        inv_mass: 0.0,
        restitution: 1.0,
        static_friction: 0.4,
        dynamic_friction: 0.2,
        gravity_scale: 0.0,
        inv_inertia_local: Mat3::ZERO,
        inv_inertia_world: Mat3::ZERO,
    };

    /// Create a dynamic body with the given mass, inertia derived from `shape`.
    ///
    /// A non-positive mass yields a static body.
    pub fn new_dynamic(mass: f32, shape: &ColliderShape) -> Self {
        let mut body = Self {
            restitution: 0.3,
            gravity_scale: 1.0,
            ..Self::STATIC
        };
        body.set_mass(mass, shape);
        body
    }

    /// Create a static body with the default static material.
    pub fn new_static() -> Self {
        Self::STATIC
    }

    /// Change the mass and recompute the local inverse inertia tensor.
    pub fn set_mass(&mut self, mass: f32, shape: &ColliderShape) {
        self.inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.inv_inertia_local = inverse_inertia_tensor(shape, self.inv_mass);
        self.inv_inertia_world = self.inv_inertia_local;
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn with_friction(mut self, static_friction: f32, dynamic_friction: f32) -> Self {
        self.static_friction = static_friction;
        self.dynamic_friction = dynamic_friction;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Velocity of the material point at offset `r` from the centre of mass.
    pub fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(r)
    }
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::STATIC
    }
}

/// Immutable convex hull shared between colliders.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHullMesh {
    points: Vec<Vec3>,
    triangles: Vec<HullTriangle>,
}

/// Indexed hull triangle with its outward unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullTriangle {
    pub indices: [u32; 3],
    pub normal: Vec3,
}

impl ConvexHullMesh {
    /// Build a hull from points and triangle indices.
    ///
    /// Normals are computed from the winding and flipped where needed so that
    /// they face away from the point centroid.
    pub fn new(points: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self, PhysicsError> {
        if points.is_empty() {
            return Err(PhysicsError::EmptyConvexHull);
        }
        for (triangle, tri) in indices.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= points.len()) {
                return Err(PhysicsError::HullIndexOutOfRange {
                    triangle,
                    index,
                    point_count: points.len(),
                });
            }
        }
        Ok(Self::from_checked(points, indices))
    }

    /// Axis-aligned box hull centred on the origin.
    pub fn from_box(half_extents: Vec3) -> Self {
        let h = half_extents;
        let points = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h.x } else { h.x },
                    if i & 2 == 0 { -h.y } else { h.y },
                    if i & 4 == 0 { -h.z } else { h.z },
                )
            })
            .collect();
        let indices = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        Self::from_checked(points, indices)
    }

    fn from_checked(points: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        let centroid = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let triangles = indices
            .into_iter()
            .map(|tri| {
                let [a, b, c] = tri.map(|i| points[i as usize]);
                let mut normal = (b - a).cross(c - a).normalize_or_zero();
                if normal.dot(a - centroid) < 0.0 {
                    normal = -normal;
                }
                HullTriangle {
                    indices: tri,
                    normal,
                }
            })
            .collect();
        Self { points, triangles }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn triangles(&self) -> &[HullTriangle] {
        &self.triangles
    }

    /// Corner positions of a triangle.
    pub fn triangle_points(&self, triangle: &HullTriangle) -> [Vec3; 3] {
        triangle.indices.map(|i| self.points[i as usize])
    }
}

/// Collider shape. Cylinder and capsule axes run along local Z.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    /// Convex hull resource with a uniform scale. `hull: None` is an
    /// unloaded resource and behaves as an empty shape.
    ConvexHull {
        hull: Option<Arc<ConvexHullMesh>>,
        scale: f32,
    },
    /// Cube with half extent `radius`.
    Cube { radius: f32 },
    Sphere { radius: f32 },
    Cylinder { radius: f32, half_height: f32 },
    /// Capsule whose cap centres sit at `±half_height`.
    Capsule { radius: f32, half_height: f32 },
}

impl ColliderShape {
    pub fn convex_hull(hull: Arc<ConvexHullMesh>, scale: f32) -> Self {
        Self::ConvexHull {
            hull: Some(hull),
            scale,
        }
    }
}

/// Collision detection component.
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset from the entity's transform origin, in the entity's local frame.
    pub offset: Vec3,
}

impl Collider {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Vec3::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Transform of the shape itself, with the collider offset applied.
    pub fn placed(&self, transform: &Transform) -> Transform {
        if self.offset == Vec3::ZERO {
            return *transform;
        }
        Transform {
            position: transform.transform_point(self.offset),
            ..*transform
        }
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::new(ColliderShape::Sphere { radius: 0.5 })
    }
}

/// Damped spring between attachment points on two entities.
///
/// Springs live on their own entity so several can connect the same pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub entity_a: hecs::Entity,
    pub entity_b: hecs::Entity,
    /// Attachment point on A, in A's frame (rotated, not scaled).
    pub offset_a: Vec3,
    /// Attachment point on B, in B's frame (rotated, not scaled).
    pub offset_b: Vec3,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Spring {
    pub fn new(entity_a: hecs::Entity, entity_b: hecs::Entity, rest_length: f32) -> Self {
        Self {
            entity_a,
            entity_b,
            offset_a: Vec3::ZERO,
            offset_b: Vec3::ZERO,
            rest_length,
            stiffness: 5.0,
            damping: 0.4,
        }
    }

    pub fn with_offsets(mut self, offset_a: Vec3, offset_b: Vec3) -> Self {
        self.offset_a = offset_a;
        self.offset_b = offset_b;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }
}

//! Collider shape support functions and bounding boxes.

use glam::{Mat3, Vec3};

use crate::ecs::components::physics::ColliderShape;
use crate::ecs::components::transform::Transform;

/// Axis-aligned bounding box for broadphase collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsAabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl PhysicsAabb {
    /// Inverted box that overlaps nothing, used for unloaded hulls.
    pub const EMPTY: PhysicsAabb = PhysicsAabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Test whether two AABBs overlap. Boxes that only touch do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &PhysicsAabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }
}

/// Sign with an explicit zero, unlike `f32::signum`.
#[inline]
pub(crate) fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl ColliderShape {
    /// GJK/EPA support function. Returns the boundary point of the placed
    /// shape that lies farthest along `direction` (world space).
    ///
    /// An unloaded convex hull answers with the zero vector.
    #[inline]
    pub fn support(&self, direction: Vec3, transform: &Transform) -> Vec3 {
        let local_dir = transform.unrotate(direction);

        let local_point = match self {
            ColliderShape::Sphere { radius } => {
                return transform.position + direction.normalize_or_zero() * *radius;
            }
            ColliderShape::Cube { radius } => {
                Vec3::new(sign(local_dir.x), sign(local_dir.y), sign(local_dir.z))
                    * *radius
                    * transform.scale
            }
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => {
                let mut p = Vec3::new(0.0, 0.0, sign(local_dir.z) * *half_height);
                if local_dir.x != 0.0 || local_dir.y != 0.0 {
                    let lat = (local_dir.x * local_dir.x + local_dir.y * local_dir.y).sqrt();
                    p.x = local_dir.x / lat * *radius;
                    p.y = local_dir.y / lat * *radius;
                }
                p
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let lat = (local_dir.x * local_dir.x + local_dir.y * local_dir.y).sqrt();
                if lat == 0.0 {
                    Vec3::new(0.0, 0.0, sign(local_dir.z) * (*half_height + *radius))
                } else {
                    let cap = if local_dir.z > 0.0 {
                        *half_height
                    } else {
                        -*half_height
                    };
                    Vec3::new(0.0, 0.0, cap) + local_dir.normalize() * *radius
                }
            }
            ColliderShape::ConvexHull { hull, scale } => {
                let Some(hull) = hull else {
                    return Vec3::ZERO;
                };
                let s = transform.scale * *scale;
                // Support of S*hull along d is S * (support of hull along S*d).
                let scaled_dir = local_dir * s;
                let mut best = Vec3::ZERO;
                let mut best_dot = f32::NEG_INFINITY;
                for p in hull.points() {
                    let d = p.dot(scaled_dir);
                    if d > best_dot {
                        best_dot = d;
                        best = *p;
                    }
                }
                best * s
            }
        };

        transform.position + transform.rotate(local_point)
    }

    /// Compute the world-space AABB for this shape.
    ///
    /// Boxed shapes rotate their local extents rather than computing a tight
    /// fit; this is only a broadphase filter.
    pub fn compute_aabb(&self, transform: &Transform) -> PhysicsAabb {
        match self {
            ColliderShape::Sphere { radius } => PhysicsAabb {
                min: transform.position - Vec3::splat(*radius),
                max: transform.position + Vec3::splat(*radius),
            },
            ColliderShape::Cube { radius } => {
                aabb_from_extents(Vec3::splat(*radius) * transform.scale, transform)
            }
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => aabb_from_extents(Vec3::new(*radius, *radius, *half_height), transform),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => aabb_from_extents(
                Vec3::new(*radius, *radius, *half_height + *radius),
                transform,
            ),
            ColliderShape::ConvexHull { hull, scale } => {
                let Some(hull) = hull else {
                    return PhysicsAabb::EMPTY;
                };
                let s = transform.scale * *scale;
                let mut min = Vec3::INFINITY;
                let mut max = Vec3::NEG_INFINITY;
                for p in hull.points() {
                    let wp = transform.rotate(*p * s);
                    min = min.min(wp);
                    max = max.max(wp);
                }
                PhysicsAabb {
                    min: min + transform.position,
                    max: max + transform.position,
                }
            }
        }
    }
}

/// World-space AABB of a centred local box after rotation and translation.
#[inline]
fn aabb_from_extents(half_extents: Vec3, transform: &Transform) -> PhysicsAabb {
    let rot = Mat3::from_quat(transform.rotation);

    // Each world extent is the sum of the projected local box axes.
    let extent = rot.x_axis.abs() * half_extents.x
        + rot.y_axis.abs() * half_extents.y
        + rot.z_axis.abs() * half_extents.z;

    PhysicsAabb {
        min: transform.position - extent,
        max: transform.position + extent,
    }
}

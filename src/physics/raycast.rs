//! Ray queries against triangles and collider shapes.

use glam::Vec3;

use crate::ecs::components::physics::ColliderShape;
use crate::ecs::components::transform::Transform;

use super::collider::sign;

/// Below this, a ray is treated as parallel to a triangle plane.
const PARALLEL_EPSILON: f32 = 1e-6;

/// A ray. Finite rays end at `origin + direction`; infinite rays keep going.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub infinite: bool,
}

impl Ray {
    pub fn infinite(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            infinite: true,
        }
    }

    /// Segment from `origin` to `origin + delta`.
    pub fn segment(origin: Vec3, delta: Vec3) -> Self {
        Self {
            origin,
            direction: delta,
            infinite: false,
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Whether parameter `t` lies on the ray.
    #[inline]
    fn reaches(&self, t: f32) -> bool {
        t >= 0.0 && (self.infinite || t <= 1.0)
    }
}

/// Triangle with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub normal: Vec3,
}

impl Triangle {
    /// Triangle with the right-handed normal of `(b - a) x (c - a)`.
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            b,
            c,
            normal: (b - a).cross(c - a).normalize_or_zero(),
        }
    }
}

/// Result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Outward surface normal at `point`.
    pub normal: Vec3,
    /// Ray parameter of the hit, in units of `direction`.
    pub t: f32,
}

/// Intersect a ray with a triangle (either side). Returns the ray parameter
/// and the hit point.
pub fn ray_triangle_intersection(ray: &Ray, triangle: &Triangle) -> Option<(f32, Vec3)> {
    let Triangle { a, b, c, normal } = *triangle;
    let ab = b - a;
    let bc = c - b;
    let ca = a - c;

    let along_normal = ray.direction.dot(-normal);
    if along_normal.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = (a - ray.origin).dot(-normal) / along_normal;
    if !ray.reaches(t) {
        return None;
    }
    let p = ray.at(t);

    // For each edge, the altitude from the opposite vertex bounds how far
    // inside the triangle a point may be.
    let edges = [(ab, bc, a), (bc, ca, b), (ca, ab, c)];
    for (edge, next, start) in edges {
        let v = edge - next * (edge.dot(next) / next.dot(next));
        if v.dot(edge) < v.dot(p - start) {
            return None;
        }
    }

    Some((t, p))
}

/// Barycentric coordinates `(u, v, w)` of `p` with respect to the triangle,
/// so that `p = a*u + b*v + c*w` when `p` lies on its plane.
pub fn barycentric_coordinates(triangle: &Triangle, p: Vec3) -> Vec3 {
    let ab = triangle.b - triangle.a;
    let ac = triangle.c - triangle.a;
    let ap = p - triangle.a;
    let d00 = ab.dot(ab);
    let d01 = ab.dot(ac);
    let d11 = ac.dot(ac);
    let d20 = ap.dot(ab);
    let d21 = ap.dot(ac);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}

/// Smallest root of `a t^2 + b t + c = 0` that lies on the ray.
fn entry_root(ray: &Ray, a: f32, b: f32, c: f32) -> Option<f32> {
    if a == 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    ray.reaches(t).then_some(t)
}

fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<RayHit> {
    let o = ray.origin - center;
    let d = ray.direction;
    let t = entry_root(ray, d.dot(d), 2.0 * o.dot(d), o.dot(o) - radius * radius)?;
    let point = ray.at(t);
    Some(RayHit {
        point,
        normal: (point - center) / radius,
        t,
    })
}

/// Side wall of a Z-aligned cylinder, without caps.
fn ray_cylinder_wall(ray: &Ray, radius: f32, half_height: f32) -> Option<RayHit> {
    let (o, d) = (ray.origin, ray.direction);
    let t = entry_root(
        ray,
        d.x * d.x + d.y * d.y,
        2.0 * (o.x * d.x + o.y * d.y),
        o.x * o.x + o.y * o.y - radius * radius,
    )?;
    let point = ray.at(t);
    if point.z.abs() > half_height {
        return None;
    }
    Some(RayHit {
        point,
        normal: Vec3::new(point.x, point.y, 0.0) / radius,
        t,
    })
}

fn ray_cylinder_cap(ray: &Ray, radius: f32, half_height: f32) -> Option<RayHit> {
    let dz = ray.direction.z;
    if dz == 0.0 {
        return None;
    }
    let face = -sign(dz) * half_height;
    let t = (face - ray.origin.z) / dz;
    if !ray.reaches(t) {
        return None;
    }
    let point = ray.at(t);
    if point.x * point.x + point.y * point.y > radius * radius {
        return None;
    }
    Some(RayHit {
        point,
        normal: Vec3::new(0.0, 0.0, -sign(dz)),
        t,
    })
}

fn ray_box(ray: &Ray, half_extents: Vec3) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;
    for i in 0..3 {
        let d = ray.direction[i];
        if d == 0.0 {
            continue;
        }
        // Only the face looking at the ray origin can be an entry.
        let face = -sign(d) * half_extents[i];
        let t = (face - ray.origin[i]) / d;
        if !ray.reaches(t) {
            continue;
        }
        let point = ray.at(t);
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        if point[j].abs() > half_extents[j] || point[k].abs() > half_extents[k] {
            continue;
        }
        if best.map_or(true, |b| t < b.t) {
            let mut normal = Vec3::ZERO;
            normal[i] = -sign(d);
            best = Some(RayHit { point, normal, t });
        }
    }
    best
}

fn nearest(hits: impl IntoIterator<Item = Option<RayHit>>) -> Option<RayHit> {
    hits.into_iter()
        .flatten()
        .min_by(|a, b| a.t.total_cmp(&b.t))
}

impl ColliderShape {
    /// Cast a ray against the placed shape.
    ///
    /// Only surfaces facing the ray origin are reported, so rays starting
    /// inside a shape miss it. An unloaded hull never reports a hit.
    pub fn ray_intersection(&self, ray: &Ray, transform: &Transform) -> Option<RayHit> {
        let local = Ray {
            origin: transform.unrotate(ray.origin - transform.position),
            direction: transform.unrotate(ray.direction),
            infinite: ray.infinite,
        };

        let hit = match self {
            ColliderShape::Sphere { radius } => ray_sphere(&local, Vec3::ZERO, *radius),
            ColliderShape::Cube { radius } => ray_box(&local, Vec3::splat(*radius) * transform.scale),
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => nearest([
                ray_cylinder_wall(&local, *radius, *half_height),
                ray_cylinder_cap(&local, *radius, *half_height),
            ]),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => nearest([
                ray_cylinder_wall(&local, *radius, *half_height),
                ray_sphere(&local, Vec3::Z * *half_height, *radius),
                ray_sphere(&local, -Vec3::Z * *half_height, *radius),
            ]),
            ColliderShape::ConvexHull { hull, scale } => {
                let hull = hull.as_ref()?;
                let s = transform.scale * *scale;
                let mut best: Option<RayHit> = None;
                for tri in hull.triangles() {
                    let [a, b, c] = hull.triangle_points(tri);
                    // Normals transform with the inverse scale.
                    let normal = (tri.normal / s).normalize_or_zero();
                    if local.direction.dot(normal) > 0.0 {
                        continue;
                    }
                    let triangle = Triangle {
                        a: a * s,
                        b: b * s,
                        c: c * s,
                        normal,
                    };
                    if let Some((t, point)) = ray_triangle_intersection(&local, &triangle) {
                        if best.map_or(true, |b| t < b.t) {
                            best = Some(RayHit { point, normal, t });
                        }
                    }
                }
                best
            }
        }?;

        Some(RayHit {
            point: transform.position + transform.rotate(hit.point),
            normal: transform.rotate(hit.normal),
            t: hit.t,
        })
    }
}

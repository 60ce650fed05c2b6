//! Face-face contact manifolds for flat-sided shapes.
//!
//! EPA yields a single witness point. When a box or hull rests on a face,
//! the reference face is clipped against the incident face so the solver sees
//! the whole contact patch.

use glam::Vec3;

use crate::ecs::components::physics::ColliderShape;
use crate::ecs::components::transform::Transform;
use crate::physics::contact::{CollisionInfo, ContactManifold};

use super::ShapePair;

/// Vertices within this fraction of the shape's extent along the normal
/// count as part of the supporting face.
const FACE_TOLERANCE: f32 = 0.01;

/// World-space vertices of a flat-sided shape. Empty for round shapes.
fn polyhedron_vertices(shape: &ColliderShape, transform: &Transform) -> Vec<Vec3> {
    match shape {
        ColliderShape::Cube { radius } => {
            let mut corners = Vec::with_capacity(8);
            for i in 0..8 {
                let local = Vec3::new(
                    if i & 1 == 0 { -*radius } else { *radius },
                    if i & 2 == 0 { -*radius } else { *radius },
                    if i & 4 == 0 { -*radius } else { *radius },
                );
                corners.push(transform.transform_point(local));
            }
            corners
        }
        ColliderShape::ConvexHull {
            hull: Some(hull),
            scale,
        } => hull
            .points()
            .iter()
            .map(|p| transform.transform_point(*p * *scale))
            .collect(),
        _ => Vec::new(),
    }
}

/// Supporting face of `vertices` along `dir`, wound around its centroid, and
/// the face's support distance.
fn support_face(vertices: &[Vec3], dir: Vec3) -> (Vec<Vec3>, f32) {
    let mut max = f32::NEG_INFINITY;
    let mut min = f32::INFINITY;
    for v in vertices {
        let d = v.dot(dir);
        max = max.max(d);
        min = min.min(d);
    }
    let tolerance = (max - min) * FACE_TOLERANCE;

    let mut face: Vec<Vec3> = vertices
        .iter()
        .copied()
        .filter(|v| v.dot(dir) >= max - tolerance)
        .collect();

    if face.len() > 2 {
        let centroid = face.iter().copied().sum::<Vec3>() / face.len() as f32;
        let u = dir.any_orthogonal_vector().normalize();
        let v = dir.cross(u);
        face.sort_by(|p, q| {
            let ap = (*p - centroid).dot(v).atan2((*p - centroid).dot(u));
            let aq = (*q - centroid).dot(v).atan2((*q - centroid).dot(u));
            ap.total_cmp(&aq)
        });
    }
    (face, max)
}

/// Keep the part of `polygon` on the negative side of the plane.
fn clip_polygon(polygon: &[Vec3], origin: Vec3, normal: Vec3) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, &cur) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        let dc = (cur - origin).dot(normal);
        let dn = (next - origin).dot(normal);
        if dc <= 0.0 {
            out.push(cur);
        }
        if (dc <= 0.0) != (dn <= 0.0) {
            out.push(cur + (next - cur) * (dc / (dc - dn)));
        }
    }
    out
}

/// Clip `incident` to the prism over the convex `reference` face.
fn clip_to_face(incident: &[Vec3], reference: &[Vec3], face_normal: Vec3) -> Vec<Vec3> {
    let centroid = reference.iter().copied().sum::<Vec3>() / reference.len() as f32;
    let mut clipped = incident.to_vec();
    for (i, &start) in reference.iter().enumerate() {
        if clipped.is_empty() {
            break;
        }
        let end = reference[(i + 1) % reference.len()];
        let mut side = (end - start).cross(face_normal);
        if side.dot(centroid - start) > 0.0 {
            side = -side;
        }
        clipped = clip_polygon(&clipped, start, side);
    }

    clipped.dedup_by(|a, b| a.abs_diff_eq(*b, 1e-6));
    if clipped.len() > 1 && clipped[0].abs_diff_eq(clipped[clipped.len() - 1], 1e-6) {
        clipped.pop();
    }
    clipped
}

/// Contact manifold for a collision, with extra points when both shapes
/// meet face to face. Falls back to the single EPA point.
pub fn build_manifold(
    entity_a: hecs::Entity,
    entity_b: hecs::Entity,
    pair: &ShapePair<'_>,
    info: &CollisionInfo,
) -> ContactManifold {
    let single = ContactManifold::from_collision(entity_a, entity_b, info);
    if info.depth <= 0.0 {
        return single;
    }

    let verts_a = polyhedron_vertices(pair.shape_a, pair.transform_a);
    let verts_b = polyhedron_vertices(pair.shape_b, pair.transform_b);
    if verts_a.is_empty() || verts_b.is_empty() {
        return single;
    }

    let n = info.normal;
    let (face_a, max_a) = support_face(&verts_a, -n);
    let (face_b, max_b) = support_face(&verts_b, n);

    let mut manifold = ContactManifold::new(entity_a, entity_b, n, info.depth);
    if face_a.len() >= 3 {
        for p in clip_to_face(&face_b, &face_a, -n) {
            let depth = max_a + n.dot(p);
            if depth > 0.0 && !manifold.push(p - n * depth, depth) {
                break;
            }
        }
    } else if face_b.len() >= 3 {
        for p in clip_to_face(&face_a, &face_b, n) {
            let depth = max_b - n.dot(p);
            if depth > 0.0 && !manifold.push(p, depth) {
                break;
            }
        }
    } else {
        return single;
    }

    if manifold.is_empty() {
        single
    } else {
        manifold
    }
}

//! Expanding polytope algorithm: penetration depth and contact point from a
//! GJK terminal simplex.

use glam::Vec3;

use crate::error::CollisionFailure;
use crate::physics::debug::DebugSink;
use crate::physics::raycast::{barycentric_coordinates, Triangle};

use super::gjk::GjkPoint;
use super::{NarrowphaseConfig, ShapePair};

const CLOSEST_FACE_COLOR: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Polytope face. Vertices are held by value; the vertex pool is not shared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpaFace {
    pub a: GjkPoint,
    pub b: GjkPoint,
    pub c: GjkPoint,
}

impl EpaFace {
    pub fn new(a: GjkPoint, b: GjkPoint, c: GjkPoint) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized outward normal, `(c - a) x (b - a)`.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        (self.c.dif - self.a.dif).cross(self.b.dif - self.a.dif)
    }

    /// Whether the origin projects inside the face along its normal.
    fn contains_origin_projection(&self, normal: Vec3) -> bool {
        let (a, b, c) = (self.a.dif, self.b.dif, self.c.dif);
        let ab_nor = (a - b).cross(normal);
        let bc_nor = (b - c).cross(normal);
        let ac_nor = (c - a).cross(normal);
        !(ab_nor.dot(-a) > 0.0 || bc_nor.dot(-b) > 0.0 || ac_nor.dot(-a) > 0.0)
    }
}

/// Directed edge of the hole left by removing visible faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpaEdge {
    pub a: GjkPoint,
    pub b: GjkPoint,
}

impl EpaEdge {
    /// Same edge in either direction. Compares stored `dif`s exactly.
    fn matches(&self, other: &EpaEdge) -> bool {
        (self.a.dif == other.a.dif && self.b.dif == other.b.dif)
            || (self.a.dif == other.b.dif && self.b.dif == other.a.dif)
    }
}

/// Minimum translation of the Minkowski difference out of the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Unit outward normal of the closest polytope face.
    pub normal: Vec3,
    /// Distance from the origin to that face, never negative.
    pub depth: f32,
    /// Witness point on the surface of shape A.
    pub contact: Vec3,
}

/// Pairwise distinct within `epsilon` on every component.
pub fn simplex_is_degenerate(simplex: &[GjkPoint; 4], epsilon: f32) -> bool {
    for i in 0..4 {
        for j in (i + 1)..4 {
            let delta = (simplex[i].dif - simplex[j].dif).abs();
            if delta.max_element() <= epsilon {
                return true;
            }
        }
    }
    false
}

/// Toggle `edge` in the hole boundary: a second copy cancels the first.
fn toggle_edge(edges: &mut Vec<EpaEdge>, edge: EpaEdge) {
    if let Some(i) = edges.iter().position(|e| e.matches(&edge)) {
        edges.swap_remove(i);
    } else {
        edges.push(edge);
    }
}

/// Closest face whose plane the origin projects into, with its distance.
fn closest_face(faces: &[EpaFace]) -> Result<(usize, f32), CollisionFailure> {
    let mut best: Option<(usize, f32)> = None;
    let mut any_valid = false;

    for (i, face) in faces.iter().enumerate() {
        let normal = face.normal();
        if normal == Vec3::ZERO {
            continue;
        }
        any_valid = true;
        if !face.contains_origin_projection(normal) {
            continue;
        }
        // Signed: a face whose plane passes behind the origin ranks first.
        let distance = match normal.try_normalize() {
            Some(unit) => unit.dot(face.a.dif),
            None => 0.0,
        };
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }

    match best {
        Some(found) => Ok(found),
        None if any_valid => Err(CollisionFailure::NoClosestFeature),
        None => Err(CollisionFailure::DegenerateFeature),
    }
}

/// Search direction for expanding past `face`.
fn search_direction(face: &EpaFace) -> Option<Vec3> {
    let normal = face.normal();
    if normal.try_normalize().is_some() {
        return Some(normal);
    }
    // Sliver face: head back through whichever vertex is off the origin.
    [face.a.dif, face.b.dif, face.c.dif]
        .into_iter()
        .find(|v| *v != Vec3::ZERO)
        .map(|v| -v)
}

fn resolve(face: &EpaFace) -> Result<Penetration, CollisionFailure> {
    let normal = face
        .normal()
        .try_normalize()
        .ok_or(CollisionFailure::DegenerateFeature)?;
    let plane_distance = normal.dot(face.a.dif);
    let projected = normal * plane_distance;

    let triangle = Triangle::new(face.a.dif, face.b.dif, face.c.dif);
    let bary = barycentric_coordinates(&triangle, projected);
    if !bary.is_finite() {
        return Err(CollisionFailure::DegenerateFeature);
    }
    let contact = face.a.a * bary.x + face.b.a * bary.y + face.c.a * bary.z;

    Ok(Penetration {
        normal,
        depth: plane_distance.max(0.0),
        contact,
    })
}

/// Expand the GJK tetrahedron until the closest face stops moving.
///
/// `simplex` is in [`GjkResult::Hit`](super::gjk::GjkResult::Hit) order.
pub fn epa(
    pair: &ShapePair<'_>,
    simplex: &[GjkPoint; 4],
    config: &NarrowphaseConfig,
    debug: &mut dyn DebugSink,
) -> Result<Penetration, CollisionFailure> {
    if simplex_is_degenerate(simplex, config.degenerate_epsilon) {
        return Err(CollisionFailure::DegenerateSimplex);
    }

    let [d, c, b, a] = *simplex;
    let mut faces = vec![
        EpaFace::new(b, d, c),
        EpaFace::new(a, b, c),
        EpaFace::new(a, c, d),
        EpaFace::new(a, d, b),
    ];
    let mut edges: Vec<EpaEdge> = Vec::new();

    for step in 0..config.epa_max_iterations {
        debug.epa_step(step, &faces);

        let (closest, distance) = closest_face(&faces)?;
        let face = faces[closest];
        let dir = search_direction(&face).ok_or(CollisionFailure::DegenerateFeature)?;

        let new_point = pair.support(dir);
        debug.epa_new_point(step, &new_point);

        let advance = dir.dot(new_point.dif - face.a.dif);
        tracing::trace!(step, faces = faces.len(), distance, advance, "EPA step");
        if advance <= config.epa_tolerance {
            debug.draw_triangle(face.a.a, face.b.a, face.c.a, CLOSEST_FACE_COLOR);
            return resolve(&face);
        }

        edges.clear();
        let mut deleted = 0usize;
        let mut i = 0;
        while i < faces.len() {
            let f = faces[i];
            if f.normal().dot(new_point.dif - f.a.dif) > 0.0 {
                toggle_edge(&mut edges, EpaEdge { a: f.a, b: f.b });
                toggle_edge(&mut edges, EpaEdge { a: f.b, b: f.c });
                toggle_edge(&mut edges, EpaEdge { a: f.c, b: f.a });
                faces.swap_remove(i);
                deleted += 1;
            } else {
                i += 1;
            }
        }

        if deleted > 1 && edges.len() >= 3 * deleted {
            tracing::error!(deleted, edges = edges.len(), "EPA removed faces left more than one hole");
        }

        faces.extend(edges.iter().map(|e| EpaFace::new(e.a, e.b, new_point)));
    }

    tracing::warn!(
        iterations = config.epa_max_iterations,
        faces = faces.len(),
        "EPA did not converge"
    );
    Err(CollisionFailure::EpaIterationLimit(config.epa_max_iterations))
}

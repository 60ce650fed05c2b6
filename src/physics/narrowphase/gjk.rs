//! GJK overlap test on the Minkowski difference `A - B`.

use glam::Vec3;

use crate::physics::debug::DebugSink;

use super::{NarrowphaseConfig, ShapePair};

const SUPPORT_CUBE_SIZE: f32 = 0.04;
const SUPPORT_A_COLOR: Vec3 = Vec3::new(0.0, 1.0, 1.0);
const SUPPORT_B_COLOR: Vec3 = Vec3::new(1.0, 1.0, 0.0);

/// A vertex of the Minkowski difference.
///
/// `dif` is stored once when the support is taken and never recomputed, so
/// exact value comparisons stay consistent between GJK and EPA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GjkPoint {
    /// `a - b`.
    pub dif: Vec3,
    /// Support point on shape A.
    pub a: Vec3,
}

impl GjkPoint {
    pub const ZERO: GjkPoint = GjkPoint {
        dif: Vec3::ZERO,
        a: Vec3::ZERO,
    };
}

/// Outcome of [`gjk_test`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GjkResult {
    /// Tetrahedron enclosing the origin, ordered `[D, C, B, A]`: face `BCD`
    /// faces away from the origin and `A` lies opposite it.
    Hit { simplex: [GjkPoint; 4] },
    NoHit,
    /// Ran out of iterations before deciding. Callers treat it as no hit.
    IterationLimit,
}

impl GjkResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, GjkResult::Hit { .. })
    }
}

/// `(edge x to_origin) x edge`: perpendicular to `edge`, towards the origin.
#[inline]
fn edge_normal_towards(edge: Vec3, to_origin: Vec3) -> Vec3 {
    let dir = edge.cross(to_origin).cross(edge);
    if dir == Vec3::ZERO {
        // Origin is on the edge line; any perpendicular will do.
        edge.any_orthogonal_vector()
    } else {
        dir
    }
}

/// `|ab x ac|^2` below this fraction of `|ab|^2 |ac|^2` counts as collinear.
const COLLINEAR_EPSILON: f32 = 1e-10;

/// Add `a` to the segment `points[0..2]`. Returns the next search direction
/// and the new simplex size.
fn triangle_case(points: &mut [GjkPoint; 4], a: GjkPoint) -> (Vec3, usize) {
    let b = points[1];
    let c = points[0];
    let ao = -a.dif;
    let ab = b.dif - a.dif;
    let ac = c.dif - a.dif;
    let nor = ac.cross(ab);

    if nor.length_squared() <= COLLINEAR_EPSILON * ab.length_squared() * ac.length_squared() {
        // No plane to search from: keep the longest segment ending at `a`.
        let (far, edge) = if ab.length_squared() > ac.length_squared() {
            (b, ab)
        } else {
            (c, ac)
        };
        points[0] = far;
        points[1] = a;
        return (edge_normal_towards(edge, ao), 2);
    }

    let ab_nor = nor.cross(ab);
    let ac_nor = ac.cross(nor);
    if ac_nor.dot(ao) > 0.0 {
        points[0] = a;
        points[1] = c;
        (edge_normal_towards(ac, ao), 2)
    } else if ab_nor.dot(ao) > 0.0 {
        points[0] = a;
        points[1] = b;
        (edge_normal_towards(ab, ao), 2)
    } else if nor.dot(ao) > 0.0 {
        points[2] = a;
        (nor, 3)
    } else {
        points[0] = b;
        points[1] = c;
        points[2] = a;
        (-nor, 3)
    }
}

/// Decide whether shapes A and B overlap.
pub fn gjk_test(
    pair: &ShapePair<'_>,
    config: &NarrowphaseConfig,
    debug: &mut dyn DebugSink,
) -> GjkResult {
    let aabb_a = pair.shape_a.compute_aabb(pair.transform_a);
    let aabb_b = pair.shape_b.compute_aabb(pair.transform_b);
    if !aabb_a.overlaps(&aabb_b) {
        return GjkResult::NoHit;
    }

    let mut points = [GjkPoint::ZERO; 4];
    let mut count = 1;
    points[0] = pair.support(Vec3::Y);
    if points[0].dif == Vec3::ZERO {
        // Touching at exactly one point.
        return GjkResult::NoHit;
    }
    let mut dir = -points[0].dif;

    for iteration in 0..config.gjk_max_iterations {
        let a = pair.support(dir);
        debug.gjk_point(iteration, &a);
        if dir.dot(a.dif) <= 0.0 {
            return GjkResult::NoHit;
        }
        let ao = -a.dif;

        match count {
            1 => {
                let ab = points[0].dif - a.dif;
                points[1] = a;
                count = 2;
                dir = edge_normal_towards(ab, ao);
            }
            2 => {
                (dir, count) = triangle_case(&mut points, a);
            }
            _ => {
                let b = points[2];
                let c = points[1];
                let d = points[0];
                let ab = b.dif - a.dif;
                let ac = c.dif - a.dif;
                let ad = d.dif - a.dif;
                let abc_nor = ac.cross(ab);
                let adb_nor = ab.cross(ad);
                let acd_nor = ad.cross(ac);

                for (name, inside, normal) in [
                    ("ABC", ad, abc_nor),
                    ("ADB", ac, adb_nor),
                    ("ACD", ab, acd_nor),
                ] {
                    let dot = inside.dot(normal);
                    if dot > 0.0 {
                        tracing::error!(face = name, dot, "GJK tetrahedron normal facing inward");
                    }
                }

                if abc_nor.dot(ao) > 0.0 {
                    if adb_nor.dot(ao) > 0.0 {
                        points[0] = b;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ab, ao);
                    } else if acd_nor.dot(ao) > 0.0 {
                        points[0] = c;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ac, ao);
                    } else if abc_nor.cross(ab).dot(ao) > 0.0 {
                        points[0] = b;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ab, ao);
                    } else if ac.cross(abc_nor).dot(ao) > 0.0 {
                        points[0] = c;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ac, ao);
                    } else {
                        points[0] = c;
                        points[1] = b;
                        points[2] = a;
                        dir = abc_nor;
                    }
                } else if acd_nor.dot(ao) > 0.0 {
                    if adb_nor.dot(ao) > 0.0 {
                        points[0] = d;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ad, ao);
                    } else if acd_nor.cross(ac).dot(ao) > 0.0 {
                        points[0] = c;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ac, ao);
                    } else if ad.cross(acd_nor).dot(ao) > 0.0 {
                        points[0] = d;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ad, ao);
                    } else {
                        points[0] = d;
                        points[1] = c;
                        points[2] = a;
                        dir = acd_nor;
                    }
                } else if adb_nor.dot(ao) > 0.0 {
                    if adb_nor.cross(ad).dot(ao) > 0.0 {
                        points[0] = d;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ad, ao);
                    } else if ab.cross(adb_nor).dot(ao) > 0.0 {
                        points[0] = b;
                        points[1] = a;
                        count = 2;
                        dir = edge_normal_towards(ab, ao);
                    } else {
                        points[0] = b;
                        points[1] = d;
                        points[2] = a;
                        dir = adb_nor;
                    }
                } else {
                    points[3] = a;
                    for p in &points {
                        debug.draw_cube(p.a, SUPPORT_CUBE_SIZE, SUPPORT_A_COLOR);
                        debug.draw_cube(p.a - p.dif, SUPPORT_CUBE_SIZE, SUPPORT_B_COLOR);
                    }
                    return GjkResult::Hit { simplex: points };
                }
            }
        }
    }

    GjkResult::IterationLimit
}

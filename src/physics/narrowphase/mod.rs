//! Narrowphase collision detection: GJK overlap, EPA penetration depth and
//! contact manifold construction.

pub mod epa;
pub mod gjk;
pub mod manifold;

use glam::Vec3;

use crate::ecs::components::physics::ColliderShape;
use crate::ecs::components::transform::Transform;
use crate::error::CollisionFailure;

use super::contact::{CollisionInfo, ContactManifold};
use super::debug::DebugSink;

use self::epa::{epa, Penetration};
use self::gjk::{gjk_test, GjkPoint, GjkResult};

/// Iteration caps and tolerances for GJK and EPA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrowphaseConfig {
    /// Default: 20.
    pub gjk_max_iterations: u32,
    /// Default: 64.
    pub epa_max_iterations: u32,
    /// EPA stops once a new support point advances less than this along
    /// the closest face normal. Default: 1e-6.
    pub epa_tolerance: f32,
    /// Simplex points closer than this on every axis are duplicates.
    /// Default: 1e-6.
    pub degenerate_epsilon: f32,
}

impl Default for NarrowphaseConfig {
    fn default() -> Self {
        Self {
            gjk_max_iterations: 20,
            epa_max_iterations: 64,
            epa_tolerance: 1e-6,
            degenerate_epsilon: 1e-6,
        }
    }
}

/// Two placed shapes under test. Shape A owns the results.
#[derive(Debug, Clone, Copy)]
pub struct ShapePair<'a> {
    pub shape_a: &'a ColliderShape,
    pub transform_a: &'a Transform,
    pub shape_b: &'a ColliderShape,
    pub transform_b: &'a Transform,
}

impl<'a> ShapePair<'a> {
    pub fn new(
        shape_a: &'a ColliderShape,
        transform_a: &'a Transform,
        shape_b: &'a ColliderShape,
        transform_b: &'a Transform,
    ) -> Self {
        Self {
            shape_a,
            transform_a,
            shape_b,
            transform_b,
        }
    }

    /// The same pair with A and B exchanged.
    pub fn swapped(&self) -> Self {
        Self::new(self.shape_b, self.transform_b, self.shape_a, self.transform_a)
    }

    /// Support point of the Minkowski difference `A - B` along `dir`.
    #[inline]
    pub fn support(&self, dir: Vec3) -> GjkPoint {
        let a = self.shape_a.support(dir, self.transform_a);
        let b = self.shape_b.support(-dir, self.transform_b);
        GjkPoint { dif: a - b, a }
    }
}

/// Full GJK + EPA test.
///
/// `Ok(None)` means the shapes do not overlap, or only touch so that no
/// penetration can be measured.
pub fn test_collision(
    pair: &ShapePair<'_>,
    config: &NarrowphaseConfig,
    debug: &mut dyn DebugSink,
) -> Result<Option<CollisionInfo>, CollisionFailure> {
    let simplex = match gjk_test(pair, config, debug) {
        GjkResult::Hit { simplex } => simplex,
        GjkResult::NoHit => return Ok(None),
        GjkResult::IterationLimit => {
            return Err(CollisionFailure::GjkIterationLimit(config.gjk_max_iterations))
        }
    };

    collision_info(epa(pair, &simplex, config, debug))
}

/// Map an EPA outcome to a contact. A degenerate simplex means the shapes
/// only touch.
fn collision_info(
    result: Result<Penetration, CollisionFailure>,
) -> Result<Option<CollisionInfo>, CollisionFailure> {
    let penetration = match result {
        Ok(p) => p,
        Err(CollisionFailure::DegenerateSimplex) => return Ok(None),
        Err(e) => return Err(e),
    };

    // EPA's normal points out of A - B; A separates in the opposite direction.
    let normal = -penetration.normal;
    Ok(Some(CollisionInfo {
        hit_point: penetration.contact,
        normal,
        depth: penetration.depth,
        depenetration: normal * penetration.depth,
    }))
}

/// [`test_collision`] with failures logged and treated as no contact.
pub fn detect_collision(
    pair: &ShapePair<'_>,
    config: &NarrowphaseConfig,
    debug: &mut dyn DebugSink,
) -> Option<CollisionInfo> {
    match test_collision(pair, config, debug) {
        Ok(info) => info,
        Err(CollisionFailure::GjkIterationLimit(limit)) => {
            tracing::debug!(limit, "GJK undecided, treating pair as separated");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping contact");
            None
        }
    }
}

/// Narrowphase for one broadphase pair, producing the solver's manifold.
pub fn collide(
    entity_a: hecs::Entity,
    entity_b: hecs::Entity,
    pair: &ShapePair<'_>,
    config: &NarrowphaseConfig,
    debug: &mut dyn DebugSink,
) -> Option<ContactManifold> {
    let info = detect_collision(pair, config, debug)?;
    Some(manifold::build_manifold(entity_a, entity_b, pair, &info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::physics::ConvexHullMesh;
    use crate::physics::debug::NoDebug;
    use glam::Quat;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn check(
        sa: &ColliderShape,
        ta: &Transform,
        sb: &ColliderShape,
        tb: &Transform,
    ) -> Option<CollisionInfo> {
        let pair = ShapePair::new(sa, ta, sb, tb);
        test_collision(&pair, &NarrowphaseConfig::default(), &mut NoDebug).unwrap()
    }

    #[test]
    fn test_unit_cubes_overlapping_along_x() {
        let cube = ColliderShape::Cube { radius: 1.0 };
        let info = check(
            &cube,
            &Transform::identity(),
            &cube,
            &Transform::from_position(Vec3::new(1.5, 0.0, 0.0)),
        )
        .expect("cubes overlap");

        let eps = 1e-4;
        assert!(info.depenetration.abs_diff_eq(Vec3::new(-0.5, 0.0, 0.0), eps));
        assert!((info.depth - 0.5).abs() < eps);
        assert!(info.normal.abs_diff_eq(-Vec3::X, eps));
        assert!((info.hit_point.x - 1.0).abs() < eps);
    }

    #[test]
    fn test_sphere_depenetration_accuracy() {
        let a = ColliderShape::Sphere { radius: 1.0 };
        let b = ColliderShape::Sphere { radius: 0.75 };
        let tb = Transform::from_position(Vec3::new(0.4, -0.9, 0.8));
        let info = check(&a, &Transform::identity(), &b, &tb).expect("spheres overlap");

        let expected = 1.75 - tb.position.length();
        assert!((info.depenetration.length() - expected).abs() < 2e-3);
        // A is pushed away from B's centre.
        assert!(info.normal.dot(-tb.position.normalize()) > 0.99);
    }

    #[test]
    fn test_box_symmetry_is_exact_negation() {
        let cube = ColliderShape::Cube { radius: 1.0 };
        let ta = Transform::from_position(Vec3::new(0.2, 0.1, 0.0));
        let tb = Transform::from_position(Vec3::new(1.6, -0.2, 0.3));

        let ab = check(&cube, &ta, &cube, &tb).expect("hit");
        let ba = check(&cube, &tb, &cube, &ta).expect("hit");
        let eps = 1e-5;
        assert!(ab.depenetration.abs_diff_eq(-ba.depenetration, eps));
    }

    #[test]
    fn test_touching_cubes_no_correction() {
        let cube = ColliderShape::Cube { radius: 1.0 };
        let result = check(
            &cube,
            &Transform::identity(),
            &cube,
            &Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
        );
        assert!(result.map_or(true, |info| info.depth < 1e-4));
    }

    #[test]
    fn test_touching_spheres_no_correction() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let result = check(
            &s,
            &Transform::identity(),
            &s,
            &Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        assert!(result.map_or(true, |info| info.depth < 1e-3));
    }

    #[test]
    fn test_hull_matches_cube() {
        let mesh = Arc::new(ConvexHullMesh::from_box(Vec3::ONE));
        let hull = ColliderShape::convex_hull(mesh, 1.0);
        let cube = ColliderShape::Cube { radius: 1.0 };
        let ta = Transform::identity();
        let tb = Transform::from_position(Vec3::new(0.0, 0.0, 1.8));

        let from_hull = check(&hull, &ta, &cube, &tb).expect("hit");
        let from_cube = check(&cube, &ta, &cube, &tb).expect("hit");
        let eps = 1e-4;
        assert!(from_hull.depenetration.abs_diff_eq(from_cube.depenetration, eps));
        assert!((from_hull.depth - 0.2).abs() < eps);
    }

    #[test]
    fn test_separated_pair_is_none() {
        let capsule = ColliderShape::Capsule {
            radius: 0.5,
            half_height: 1.0,
        };
        let cylinder = ColliderShape::Cylinder {
            radius: 1.0,
            half_height: 1.0,
        };
        let result = check(
            &capsule,
            &Transform::from_position(Vec3::new(3.0, 0.0, 0.0)),
            &cylinder,
            &Transform::identity(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_gjk_limit_surfaces_as_failure() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let ta = Transform::identity();
        let tb = Transform::from_position(Vec3::new(0.5, 0.5, 0.5));
        let pair = ShapePair::new(&s, &ta, &s, &tb);
        let config = NarrowphaseConfig {
            gjk_max_iterations: 1,
            ..NarrowphaseConfig::default()
        };

        assert_eq!(
            test_collision(&pair, &config, &mut NoDebug),
            Err(CollisionFailure::GjkIterationLimit(1))
        );
        assert!(detect_collision(&pair, &config, &mut NoDebug).is_none());
    }

    #[test]
    fn test_epa_limit_surfaces_as_failure() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let ta = Transform::identity();
        let tb = Transform::from_position(Vec3::new(0.6, -0.7, 0.2));
        let pair = ShapePair::new(&s, &ta, &s, &tb);
        let config = NarrowphaseConfig {
            epa_max_iterations: 1,
            ..NarrowphaseConfig::default()
        };

        assert_eq!(
            test_collision(&pair, &config, &mut NoDebug),
            Err(CollisionFailure::EpaIterationLimit(1))
        );
        assert!(detect_collision(&pair, &config, &mut NoDebug).is_none());
    }

    #[test]
    fn test_epa_failure_mapping() {
        assert_eq!(
            collision_info(Err(CollisionFailure::DegenerateSimplex)),
            Ok(None)
        );
        for failure in [
            CollisionFailure::NoClosestFeature,
            CollisionFailure::DegenerateFeature,
            CollisionFailure::EpaIterationLimit(64),
        ] {
            assert_eq!(collision_info(Err(failure)), Err(failure));
        }

        let info = collision_info(Ok(Penetration {
            normal: Vec3::Z,
            depth: 0.25,
            contact: Vec3::new(1.0, 2.0, 3.0),
        }))
        .unwrap()
        .expect("penetration");
        assert!(info.normal.abs_diff_eq(-Vec3::Z, 1e-6));
        assert!(info.depenetration.abs_diff_eq(Vec3::new(0.0, 0.0, -0.25), 1e-6));
        assert_eq!(info.hit_point, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_collide_builds_manifold() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let cube = ColliderShape::Cube { radius: 1.0 };
        let ta = Transform::from_position(Vec3::new(0.0, 0.0, 1.9));
        let tb = Transform::identity();
        let pair = ShapePair::new(&cube, &ta, &cube, &tb);

        let manifold = collide(a, b, &pair, &NarrowphaseConfig::default(), &mut NoDebug)
            .expect("resting cubes touch");
        assert_eq!(manifold.entity_a, a);
        assert_eq!(manifold.entity_b, b);
        assert_eq!(manifold.len(), 4);
        assert!(manifold.normal.abs_diff_eq(Vec3::Z, 1e-4));
    }

    #[test]
    fn test_swapped_pair() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let c = ColliderShape::Cube { radius: 2.0 };
        let ta = Transform::identity();
        let tb = Transform::from_position(Vec3::X);
        let pair = ShapePair::new(&s, &ta, &c, &tb).swapped();
        assert_eq!(pair.shape_a, &c);
        assert_eq!(pair.transform_b, &ta);
        let p = pair.support(Vec3::X);
        assert!(p.dif.abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
    }

    proptest! {
        #[test]
        fn prop_box_pair_symmetry(
            pa in prop::array::uniform3(-1.0f32..1.0),
            pb in prop::array::uniform3(-1.0f32..1.0),
            ra in 0.3f32..1.0,
            rb in 0.3f32..1.0,
            yaw in -1.5f32..1.5,
        ) {
            let a = ColliderShape::Cube { radius: ra };
            let b = ColliderShape::Cube { radius: rb };
            let ta = Transform::from_position(Vec3::from(pa));
            let tb = Transform::from_position_rotation(Vec3::from(pb), Quat::from_rotation_z(yaw));

            let config = NarrowphaseConfig::default();
            let ab = test_collision(&ShapePair::new(&a, &ta, &b, &tb), &config, &mut NoDebug);
            let ba = test_collision(&ShapePair::new(&b, &tb, &a, &ta), &config, &mut NoDebug);
            prop_assert!(ab.is_ok(), "A-B failed: {:?}", ab);
            prop_assert!(ba.is_ok(), "B-A failed: {:?}", ba);
            let (ab, ba) = (ab.unwrap(), ba.unwrap());
            prop_assert_eq!(ab.is_some(), ba.is_some());
            if let (Some(ab), Some(ba)) = (ab, ba) {
                prop_assert!((ab.depth - ba.depth).abs() < 1e-3);
                prop_assert!(
                    ab.depenetration.abs_diff_eq(-ba.depenetration, 1e-3),
                    "{:?} vs {:?}",
                    ab.depenetration,
                    ba.depenetration
                );
            }
        }
    }
}

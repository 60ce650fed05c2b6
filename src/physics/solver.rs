//! Sequential impulse contact solver.
//!
//! Every pass reads body velocities as they were when the pass began and
//! accumulates its impulses as forces over the substep. Integration happens
//! between passes in [`PhysicsWorld::fixed_step`](super::PhysicsWorld::fixed_step).

use glam::{Mat3, Vec3};

use crate::ecs::components::physics::{RigidBody, Spring};
use crate::ecs::components::transform::Transform;

use super::contact::ContactManifold;
use super::debug::DebugSink;

const SPRING_COLOR: Vec3 = Vec3::new(0.9, 0.9, 0.9);

/// Tangential speed squared below which a contact is not sliding.
const SLIDING_EPSILON: f32 = 1e-5;

/// Body data cached for solver calculations.
///
/// Entities without a rigid body read as [`RigidBody::STATIC`].
#[derive(Debug, Clone, Copy)]
struct BodyState {
    has_body: bool,
    inv_mass: f32,
    inv_inertia: Mat3,
    velocity: Vec3,
    angular_velocity: Vec3,
    position: Vec3,
    rotation: glam::Quat,
    restitution: f32,
    static_friction: f32,
    dynamic_friction: f32,
}

impl BodyState {
    /// `None` when the entity has no transform.
    fn load(world: &hecs::World, entity: hecs::Entity) -> Option<Self> {
        let transform = *world.get::<&Transform>(entity).ok()?;
        let body = world.get::<&RigidBody>(entity).ok();
        let has_body = body.is_some();
        let rb = body.as_deref().unwrap_or(&RigidBody::STATIC);
        Some(Self {
            has_body,
            inv_mass: rb.inv_mass,
            inv_inertia: rb.inv_inertia_world,
            velocity: rb.velocity,
            angular_velocity: rb.angular_velocity,
            position: transform.position,
            rotation: transform.rotation,
            restitution: rb.restitution,
            static_friction: rb.static_friction,
            dynamic_friction: rb.dynamic_friction,
        })
    }

    fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(r)
    }
}

/// Both sides of a contact or spring.
fn load_pair(
    world: &hecs::World,
    entity_a: hecs::Entity,
    entity_b: hecs::Entity,
) -> Option<(BodyState, BodyState)> {
    let a = BodyState::load(world, entity_a)?;
    let b = BodyState::load(world, entity_b)?;
    (a.has_body || b.has_body).then_some((a, b))
}

/// `1/m_a + 1/m_b + ((I_a^-1 (r_a x d)) x r_a + (I_b^-1 (r_b x d)) x r_b) . d`
fn impulse_denominator(a: &BodyState, b: &BodyState, r_a: Vec3, r_b: Vec3, dir: Vec3) -> f32 {
    let angular_a = (a.inv_inertia * r_a.cross(dir)).cross(r_a);
    let angular_b = (b.inv_inertia * r_b.cross(dir)).cross(r_b);
    a.inv_mass + b.inv_mass + (angular_a + angular_b).dot(dir)
}

fn add_force_torque(world: &hecs::World, entity: hecs::Entity, force: Vec3, torque: Vec3) {
    if let Ok(mut rb) = world.get::<&mut RigidBody>(entity) {
        rb.force_accumulator += force;
        rb.torque_accumulator += torque;
    }
}

/// Apply `impulse` at `r_a` on A and its opposite at `r_b` on B as forces
/// over `dt`.
fn apply_impulse(
    world: &hecs::World,
    entity_a: hecs::Entity,
    entity_b: hecs::Entity,
    impulse: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    dt: f32,
) {
    add_force_torque(world, entity_a, impulse / dt, r_a.cross(impulse) / dt);
    add_force_torque(world, entity_b, -impulse / dt, -r_b.cross(impulse) / dt);
}

/// Restitution impulses along each contact normal.
///
/// The normal impulse of every point is stored for the friction pass.
pub fn solve_bounce(world: &hecs::World, manifolds: &mut [ContactManifold], dt: f32) {
    for manifold in manifolds.iter_mut() {
        if manifold.depth <= 0.0 {
            continue;
        }
        let Some((a, b)) = load_pair(world, manifold.entity_a, manifold.entity_b) else {
            continue;
        };
        let normal = manifold.normal;
        let restitution = a.restitution.min(b.restitution);
        let (entity_a, entity_b) = (manifold.entity_a, manifold.entity_b);

        for point in manifold.points_mut() {
            let r_a = point.position - a.position;
            let r_b = point.position - b.position;
            let rel_vel = a.velocity_at(r_a) - b.velocity_at(r_b);
            let speed = rel_vel.dot(normal);
            if speed > 0.0 {
                continue;
            }

            let denominator = impulse_denominator(&a, &b, r_a, r_b, normal);
            if denominator <= 0.0 {
                continue;
            }
            let j = -(1.0 + restitution) * speed / denominator;
            point.normal_impulse = j;

            apply_impulse(
                world,
                entity_a,
                entity_b,
                normal * j,
                r_a,
                r_b,
                dt,
            );
        }
    }
}

/// Coulomb friction: the impulse `j` that would stop sliding is kept while
/// it fits inside the static cone, otherwise replaced by kinetic friction
/// opposing the tangent.
pub fn friction_impulse(j: f32, normal_impulse: f32, static_friction: f32, dynamic_friction: f32) -> f32 {
    if j.abs() <= normal_impulse * static_friction {
        j
    } else {
        -normal_impulse * dynamic_friction
    }
}

/// Tangential impulses against sliding, using the bounce pass's normal
/// impulses.
pub fn solve_friction(world: &hecs::World, manifolds: &[ContactManifold], dt: f32) {
    for manifold in manifolds {
        let Some((a, b)) = load_pair(world, manifold.entity_a, manifold.entity_b) else {
            continue;
        };
        let normal = manifold.normal;
        let static_friction = (a.static_friction + b.static_friction) * 0.5;
        let dynamic_friction = (a.dynamic_friction + b.dynamic_friction) * 0.5;

        for point in manifold.points() {
            let r_a = point.position - a.position;
            let r_b = point.position - b.position;
            let rel_vel = a.velocity_at(r_a) - b.velocity_at(r_b);

            let tangent = rel_vel - normal * rel_vel.dot(normal);
            let tangent_sq = tangent.length_squared();
            if tangent_sq.abs() <= SLIDING_EPSILON {
                continue;
            }
            let tangent = tangent / tangent_sq.sqrt();

            let denominator = impulse_denominator(&a, &b, r_a, r_b, tangent);
            if denominator <= 0.0 {
                continue;
            }
            let j = -rel_vel.dot(tangent) / denominator;
            let j = friction_impulse(j, point.normal_impulse, static_friction, dynamic_friction);

            apply_impulse(
                world,
                manifold.entity_a,
                manifold.entity_b,
                tangent * j,
                r_a,
                r_b,
                dt,
            );
        }
    }
}

/// Damped spring impulses, clamped to `±impulse_limit`. Each spring is
/// drawn as a line between its attachment points.
pub fn solve_springs(world: &hecs::World, dt: f32, impulse_limit: f32, debug: &mut dyn DebugSink) {
    for (_, spring) in world.query::<&Spring>().iter() {
        let Some((a, b)) = load_pair(world, spring.entity_a, spring.entity_b) else {
            continue;
        };

        let r_a = a.rotation * spring.offset_a;
        let r_b = b.rotation * spring.offset_b;
        debug.draw_line(a.position + r_a, b.position + r_b, SPRING_COLOR);
        let ab = (b.position + r_b) - (a.position + r_a);
        let distance = ab.length();
        if distance <= f32::EPSILON {
            continue;
        }
        let dir = ab / distance;

        let rel_vel = b.velocity_at(r_b) - a.velocity_at(r_a);
        let along = rel_vel.dot(dir);

        let denominator = impulse_denominator(&a, &b, r_a, r_b, dir);
        if denominator <= 0.0 {
            continue;
        }
        let j = ((distance - spring.rest_length) * spring.stiffness + along * spring.damping)
            / denominator;
        let j = j.clamp(-impulse_limit, impulse_limit);

        apply_impulse(world, spring.entity_a, spring.entity_b, dir * j, r_a, r_b, dt);
    }
}

/// Push penetrating pairs apart along the contact normal, split by inverse
/// mass.
pub fn depenetrate(world: &hecs::World, manifolds: &[ContactManifold], factor: f32, slop: f32) {
    for manifold in manifolds {
        let inv_mass = |entity| {
            world
                .get::<&RigidBody>(entity)
                .map_or(RigidBody::STATIC.inv_mass, |rb| rb.inv_mass)
        };
        let inv_a = inv_mass(manifold.entity_a);
        let inv_b = inv_mass(manifold.entity_b);
        let total = inv_a + inv_b;
        if total == 0.0 {
            continue;
        }

        let correction = manifold.normal * factor * (manifold.depth - slop).max(0.0) / total;
        if let Ok(mut transform) = world.get::<&mut Transform>(manifold.entity_a) {
            transform.position += correction * inv_a;
        }
        if let Ok(mut transform) = world.get::<&mut Transform>(manifold.entity_b) {
            transform.position -= correction * inv_b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::physics::ColliderShape;
    use crate::physics::debug::{DebugPrimitive, DebugRecorder, NoDebug};

    fn sphere_body(world: &mut hecs::World, position: Vec3, velocity: Vec3) -> hecs::Entity {
        let shape = ColliderShape::Sphere { radius: 1.0 };
        world.spawn((
            Transform::from_position(position),
            RigidBody::new_dynamic(1.0, &shape).with_velocity(velocity),
        ))
    }

    fn floor_contact(world: &mut hecs::World, body: hecs::Entity) -> ContactManifold {
        let floor = world.spawn((Transform::identity(), RigidBody::new_static()));
        let mut manifold = ContactManifold::new(body, floor, Vec3::Z, 0.01);
        manifold.push(Vec3::ZERO, 0.01);
        manifold
    }

    #[test]
    fn test_friction_cone_clamp() {
        // Inside the static cone the impulse stops sliding outright.
        assert_eq!(friction_impulse(-0.3, 1.0, 0.5, 0.25), -0.3);
        // Outside it, kinetic friction of exactly jn * mu_d applies.
        let j = friction_impulse(-2.0, 1.0, 0.5, 0.25);
        assert_eq!(j.abs(), 1.0 * 0.25);
    }

    #[test]
    fn test_bounce_reverses_approach() {
        let mut world = hecs::World::new();
        let body = sphere_body(&mut world, Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -2.0));
        let mut manifolds = vec![floor_contact(&mut world, body)];
        if let Ok(mut rb) = world.get::<&mut RigidBody>(body) {
            rb.restitution = 0.5;
        }
        if let Ok(mut rb) = world.get::<&mut RigidBody>(manifolds[0].entity_b) {
            rb.restitution = 0.5;
        }

        let dt = 0.01;
        solve_bounce(&world, &mut manifolds, dt);

        let rb = world.get::<&RigidBody>(body).unwrap();
        // Head-on contact through the centre: no torque, j = (1 + e) * m * v.
        let eps = 1e-4;
        assert!((manifolds[0].points()[0].normal_impulse - 3.0).abs() < eps);
        assert!((rb.force_accumulator.z - 3.0 / dt).abs() < 1e-2);
        assert!(rb.torque_accumulator.length() < eps);
    }

    #[test]
    fn test_bounce_ignores_separating_contact() {
        let mut world = hecs::World::new();
        let body = sphere_body(&mut world, Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        let mut manifolds = vec![floor_contact(&mut world, body)];

        solve_bounce(&world, &mut manifolds, 0.01);
        let rb = world.get::<&RigidBody>(body).unwrap();
        assert_eq!(rb.force_accumulator, Vec3::ZERO);
        assert_eq!(manifolds[0].points()[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_bounce_skips_bodyless_pair() {
        let mut world = hecs::World::new();
        let a = world.spawn((Transform::identity(),));
        let b = world.spawn((Transform::identity(),));
        let mut manifold = ContactManifold::new(a, b, Vec3::Z, 0.5);
        manifold.push(Vec3::ZERO, 0.5);
        let mut manifolds = vec![manifold];

        solve_bounce(&world, &mut manifolds, 0.01);
        assert_eq!(manifolds[0].points()[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_friction_opposes_sliding() {
        let mut world = hecs::World::new();
        let body = sphere_body(&mut world, Vec3::new(0.0, 0.0, 1.0), Vec3::new(3.0, 0.0, 0.0));
        let mut manifolds = vec![floor_contact(&mut world, body)];
        manifolds[0].points_mut()[0].normal_impulse = 1.0;

        solve_friction(&world, &manifolds, 0.01);
        let rb = world.get::<&RigidBody>(body).unwrap();
        assert!(rb.force_accumulator.x < 0.0);
        assert!(rb.force_accumulator.y.abs() < 1e-6);
        assert!(rb.force_accumulator.z.abs() < 1e-6);
    }

    #[test]
    fn test_friction_skips_resting_contact() {
        let mut world = hecs::World::new();
        let body = sphere_body(&mut world, Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO);
        let mut manifolds = vec![floor_contact(&mut world, body)];
        manifolds[0].points_mut()[0].normal_impulse = 1.0;

        solve_friction(&world, &manifolds, 0.01);
        let rb = world.get::<&RigidBody>(body).unwrap();
        assert_eq!(rb.force_accumulator, Vec3::ZERO);
    }

    #[test]
    fn test_spring_pulls_together() {
        let mut world = hecs::World::new();
        let a = sphere_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let b = sphere_body(&mut world, Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO);
        world.spawn((Spring::new(a, b, 1.0).with_stiffness(0.5, 0.0),));

        let dt = 0.01;
        solve_springs(&world, dt, 20.0, &mut NoDebug);
        let fa = world.get::<&RigidBody>(a).unwrap().force_accumulator;
        let fb = world.get::<&RigidBody>(b).unwrap().force_accumulator;

        // Stretched by 2 with k = 0.5 across two unit masses.
        let eps = 1e-3;
        assert!((fa.x - 0.5 / dt).abs() < eps);
        assert!((fa + fb).length() < eps);
    }

    #[test]
    fn test_spring_drawn_between_attachments() {
        let mut world = hecs::World::new();
        let a = sphere_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let b = sphere_body(&mut world, Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO);
        world.spawn((Spring::new(a, b, 1.0).with_offsets(Vec3::Z, -Vec3::Z),));

        let mut recorder = DebugRecorder::new();
        solve_springs(&world, 0.01, 20.0, &mut recorder);
        assert_eq!(
            recorder.primitives,
            vec![DebugPrimitive::Line {
                from: Vec3::Z,
                to: Vec3::new(3.0, 0.0, -1.0),
                color: SPRING_COLOR,
            }]
        );
    }

    #[test]
    fn test_spring_impulse_clamped() {
        let mut world = hecs::World::new();
        let a = sphere_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let b = sphere_body(&mut world, Vec3::new(100.0, 0.0, 0.0), Vec3::ZERO);
        world.spawn((Spring::new(a, b, 0.0).with_stiffness(50.0, 0.0),));

        let dt = 0.01;
        solve_springs(&world, dt, 20.0, &mut NoDebug);
        let fa = world.get::<&RigidBody>(a).unwrap().force_accumulator;
        assert!((fa.x - 20.0 / dt).abs() < 1e-2);
    }

    #[test]
    fn test_spring_missing_transform_skipped() {
        let mut world = hecs::World::new();
        let a = sphere_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let ghost = world.spawn(());
        world.spawn((Spring::new(a, ghost, 0.0),));

        solve_springs(&world, 0.01, 20.0, &mut NoDebug);
        assert_eq!(world.get::<&RigidBody>(a).unwrap().force_accumulator, Vec3::ZERO);
    }

    #[test]
    fn test_depenetrate_splits_by_mass() {
        let mut world = hecs::World::new();
        let a = sphere_body(&mut world, Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO);
        let b = sphere_body(&mut world, Vec3::ZERO, Vec3::ZERO);
        let mut manifold = ContactManifold::new(a, b, Vec3::Z, 0.101);
        manifold.push(Vec3::new(0.0, 0.0, 0.5), 0.101);

        depenetrate(&world, &[manifold], 0.8, 0.001);
        let pa = world.get::<&Transform>(a).unwrap().position;
        let pb = world.get::<&Transform>(b).unwrap().position;

        let eps = 1e-5;
        assert!((pa.z - 1.04).abs() < eps);
        assert!((pb.z + 0.04).abs() < eps);
    }

    #[test]
    fn test_depenetrate_static_pair_untouched() {
        let mut world = hecs::World::new();
        let a = world.spawn((Transform::identity(), RigidBody::new_static()));
        let b = world.spawn((Transform::identity(),));
        let mut manifold = ContactManifold::new(a, b, Vec3::Z, 1.0);
        manifold.push(Vec3::ZERO, 1.0);

        depenetrate(&world, &[manifold], 0.8, 0.001);
        assert_eq!(world.get::<&Transform>(a).unwrap().position, Vec3::ZERO);
    }
}

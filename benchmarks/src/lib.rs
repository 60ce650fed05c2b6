//! Shared setup helpers for rein-collide benchmarks.
//!
//! ## Running
//!
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//!
//! Filter by group:
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- broadphase
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- narrowphase

use glam::{Quat, Vec3};
use rein_collide::ecs::components::physics::{Collider, ColliderShape, RigidBody};
use rein_collide::ecs::components::transform::Transform;
use rein_collide::physics::contact::ContactManifold;
use rein_collide::physics::debug::NoDebug;
use rein_collide::physics::narrowphase::{collide, NarrowphaseConfig, ShapePair};
use rein_collide::physics::{PhysicsConfig, PhysicsWorld};

// ---------------------------------------------------------------------------
// Basic scenes
// ---------------------------------------------------------------------------

fn spawn_body(world: &mut hecs::World, position: Vec3, shape: ColliderShape, mass: f32) -> hecs::Entity {
    let body = RigidBody::new_dynamic(mass, &shape);
    world.spawn((Transform::from_position(position), body, Collider::new(shape)))
}

/// Spawn `n` dynamic spheres in an XY grid so neighbours overlap.
pub fn setup_sphere_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    let cols = (n as f32).sqrt().ceil() as usize;

    for i in 0..n {
        let pos = Vec3::new((i % cols) as f32 * 1.5, (i / cols) as f32 * 1.5, 1.0);
        spawn_body(&mut world, pos, ColliderShape::Sphere { radius: 1.0 }, 1.0);
    }
    world
}

/// Alternating dynamic cubes and capsules, plus one static floor collider per row.
pub fn setup_mixed_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    let cols = (n as f32).sqrt().ceil() as usize;

    for i in 0..n {
        let pos = Vec3::new((i % cols) as f32 * 1.5, (i / cols) as f32 * 1.5, 1.0);
        let shape = if i % 2 == 0 {
            ColliderShape::Cube { radius: 0.8 }
        } else {
            ColliderShape::Capsule {
                radius: 0.5,
                half_height: 0.5,
            }
        };
        spawn_body(&mut world, pos, shape, 1.0);
    }

    for row in 0..n.div_ceil(cols.max(1)) {
        let y = row as f32 * 1.5;
        world.spawn((
            Transform::from_position(Vec3::new(cols as f32 * 0.75, y, -0.5))
                .with_scale(Vec3::new(cols as f32, 1.0, 1.0)),
            Collider::new(ColliderShape::Cube { radius: 0.75 }),
        ));
    }
    world
}

/// Spheres spaced far apart: the broadphase should report nothing.
pub fn setup_sparse_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    let cols = (n as f32).sqrt().ceil() as usize;

    for i in 0..n {
        let pos = Vec3::new((i % cols) as f32 * 10.0, (i / cols) as f32 * 10.0, 1.0);
        spawn_body(&mut world, pos, ColliderShape::Sphere { radius: 1.0 }, 1.0);
    }
    world
}

// ---------------------------------------------------------------------------
// Simulation scenes
// ---------------------------------------------------------------------------

/// Ground cube with `n` cubes stacked in columns of five above it.
pub fn setup_scene(n: usize) -> (hecs::World, PhysicsWorld) {
    let mut world = hecs::World::new();
    world.spawn((
        Transform::from_position(Vec3::new(0.0, 0.0, -50.0)),
        Collider::new(ColliderShape::Cube { radius: 50.0 }),
    ));

    let cols = (n as f32 / 5.0).sqrt().ceil().max(1.0) as usize;
    for i in 0..n {
        let column = i / 5;
        let level = i % 5;
        let pos = Vec3::new(
            (column % cols) as f32 * 2.5,
            (column / cols) as f32 * 2.5,
            0.5 + level as f32 * 1.05,
        );
        spawn_body(&mut world, pos, ColliderShape::Cube { radius: 0.5 }, 1.0);
    }

    (world, PhysicsWorld::new(PhysicsConfig::default()))
}

/// Resting contact manifolds between `n` cube pairs, ready for the solver passes.
pub fn setup_contact_world(n: usize) -> (hecs::World, Vec<ContactManifold>) {
    let mut world = hecs::World::new();
    let config = NarrowphaseConfig::default();
    let shape = ColliderShape::Cube { radius: 0.5 };
    let mut manifolds = Vec::with_capacity(n);

    for i in 0..n {
        let x = i as f32 * 5.0;
        let ta = Transform::from_position(Vec3::new(x, 0.0, 0.95));
        let tb = Transform::from_position_rotation(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY);
        let a = world.spawn((
            ta,
            RigidBody::new_dynamic(1.0, &shape).with_velocity(Vec3::new(0.3, 0.0, -1.0)),
            Collider::new(shape.clone()),
        ));
        let b = world.spawn((tb, Collider::new(shape.clone())));

        let pair = ShapePair::new(&shape, &ta, &shape, &tb);
        if let Some(manifold) = collide(a, b, &pair, &config, &mut NoDebug) {
            manifolds.push(manifold);
        }
    }
    (world, manifolds)
}

//! Headless drop scene: a few bodies fall onto a static floor and settle.
//!
//! RUST_LOG=info cargo run --manifest-path collide-app/Cargo.toml

use std::sync::{Arc, Mutex};

use glam::{Quat, Vec3};
use rein_collide::ecs::components::physics::{
    Collider, ColliderShape, ConvexHullMesh, RigidBody, Spring,
};
use rein_collide::ecs::components::transform::Transform;
use rein_collide::physics::debug::DebugSink;
use rein_collide::physics::raycast::Ray;
use rein_collide::{PhysicsConfig, PhysicsWorld};

/// Counts contact arrows drawn by the pipeline.
#[derive(Clone, Default)]
struct ArrowCounter(Arc<Mutex<usize>>);

impl DebugSink for ArrowCounter {
    fn draw_arrow(&mut self, _from: Vec3, _to: Vec3, _color: Vec3) {
        if let Ok(mut count) = self.0.lock() {
            *count += 1;
        }
    }
}

fn spawn_scene(world: &mut hecs::World) -> anyhow::Result<Vec<(&'static str, hecs::Entity)>> {
    // Floor
    world.spawn((
        Transform::from_position(Vec3::new(0.0, 0.0, -5.0)),
        Collider::new(ColliderShape::Cube { radius: 5.0 }),
    ));

    let mut bodies = Vec::new();

    let cube = ColliderShape::Cube { radius: 0.5 };
    let entity = world.spawn((
        Transform::from_position_rotation(Vec3::new(-2.0, 0.0, 3.0), Quat::from_rotation_z(0.4)),
        RigidBody::new_dynamic(1.0, &cube).with_restitution(0.2),
        Collider::new(cube),
    ));
    bodies.push(("cube", entity));

    let sphere = ColliderShape::Sphere { radius: 0.5 };
    let entity = world.spawn((
        Transform::from_position(Vec3::new(0.0, 0.0, 4.0)),
        RigidBody::new_dynamic(1.0, &sphere).with_restitution(0.6),
        Collider::new(sphere),
    ));
    bodies.push(("sphere", entity));

    let capsule = ColliderShape::Capsule {
        radius: 0.3,
        half_height: 0.4,
    };
    let entity = world.spawn((
        Transform::from_position_rotation(Vec3::new(2.0, 0.0, 2.0), Quat::from_rotation_x(1.2)),
        RigidBody::new_dynamic(0.5, &capsule).with_velocity(Vec3::new(-0.5, 0.0, 0.0)),
        Collider::new(capsule),
    ));
    bodies.push(("capsule", entity));

    // Wedge hull hanging from the cube on a spring.
    let wedge = ConvexHullMesh::new(
        vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ],
        vec![
            [0, 2, 1],
            [1, 2, 3],
            [0, 1, 4],
            [2, 5, 3],
            [0, 4, 2],
            [2, 4, 5],
            [1, 3, 4],
            [3, 5, 4],
        ],
    )?;
    let wedge = ColliderShape::convex_hull(Arc::new(wedge), 1.0);
    let hull_entity = world.spawn((
        Transform::from_position(Vec3::new(-2.0, 1.5, 3.0)),
        RigidBody::new_dynamic(1.0, &wedge),
        Collider::new(wedge),
    ));
    bodies.push(("wedge", hull_entity));

    let cube_entity = bodies[0].1;
    world.spawn((Spring::new(cube_entity, hull_entity, 1.5).with_stiffness(20.0, 0.5),));

    Ok(bodies)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut world = hecs::World::new();
    let bodies = spawn_scene(&mut world)?;

    let mut physics = PhysicsWorld::try_new(PhysicsConfig::default())?;
    let arrows = ArrowCounter::default();
    physics.set_debug_sink(Box::new(arrows.clone()));

    let frames = 240;
    for frame in 0..frames {
        physics.step(&mut world, 1.0 / 60.0)?;

        if frame % 60 == 59 {
            for (name, entity) in &bodies {
                let transform = world.get::<&Transform>(*entity)?;
                let body = world.get::<&RigidBody>(*entity)?;
                log::info!(
                    "t={:.1}s {name:>8}: pos={:.3} speed={:.3}",
                    (frame + 1) as f32 / 60.0,
                    transform.position,
                    body.velocity.length()
                );
            }
            log::info!("  contacts this substep: {}", physics.contacts().len());
        }
    }

    let drawn = arrows.0.lock().map(|count| *count).unwrap_or_default();
    log::info!("{drawn} contact arrows drawn over {frames} frames");

    let probe = Ray::infinite(Vec3::new(0.0, 0.0, 10.0), -Vec3::Z);
    match physics.ray_cast(&world, &probe) {
        Some((entity, hit)) => log::info!(
            "probe ray hit {entity:?} at {:.3} (normal {:.3})",
            hit.point,
            hit.normal
        ),
        None => log::info!("probe ray hit nothing"),
    }

    Ok(())
}

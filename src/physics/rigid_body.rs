//! Rigid body integration and inertia.

use std::f32::consts::PI;

use glam::{Mat3, Quat, Vec3};

use crate::ecs::components::physics::{ColliderShape, RigidBody};
use crate::ecs::components::transform::Transform;
use crate::error::PhysicsError;

/// Diagonal inverse inertia tensor of `shape` in its own frame.
///
/// Cylinders and capsules are Z-aligned. Convex hulls use a solid sphere of
/// radius equal to the hull scale.
pub fn inverse_inertia_tensor(shape: &ColliderShape, inv_mass: f32) -> Mat3 {
    if inv_mass <= 0.0 {
        return Mat3::ZERO;
    }
    let mass = 1.0 / inv_mass;

    let inertia = match shape {
        ColliderShape::Cube { radius } => {
            let side = 2.0 * *radius;
            return Mat3::from_diagonal(Vec3::splat(6.0 * inv_mass / (side * side)));
        }
        ColliderShape::Sphere { radius } => {
            return Mat3::from_diagonal(Vec3::splat(5.0 * inv_mass / (2.0 * radius * radius)));
        }
        ColliderShape::ConvexHull { scale, .. } => {
            return Mat3::from_diagonal(Vec3::splat(5.0 * inv_mass / (2.0 * scale * scale)));
        }
        ColliderShape::Cylinder {
            radius,
            half_height,
        } => {
            let (r, h) = (*radius, 2.0 * *half_height);
            let axial = mass * r * r / 2.0;
            let lateral = mass * (3.0 * r * r + h * h) / 12.0;
            Vec3::new(lateral, lateral, axial)
        }
        ColliderShape::Capsule {
            radius,
            half_height,
        } => {
            let (r, h) = (*radius, 2.0 * *half_height);
            let cylinder_volume = PI * r * r * h;
            let sphere_volume = 4.0 / 3.0 * PI * r * r * r;
            let total = cylinder_volume + sphere_volume;
            let m_cyl = mass * cylinder_volume / total;
            let m_caps = mass * sphere_volume / total;

            let axial = m_cyl * r * r / 2.0 + m_caps * 2.0 * r * r / 5.0;
            let lateral = m_cyl * (3.0 * r * r + h * h) / 12.0
                + m_caps * (2.0 * r * r / 5.0 + h * h / 4.0 + 3.0 * h * r / 8.0);
            Vec3::new(lateral, lateral, axial)
        }
    };

    Mat3::from_diagonal(Vec3::select(
        inertia.cmpgt(Vec3::ZERO),
        inertia.recip(),
        Vec3::ZERO,
    ))
}

/// Accumulate gravity on every dynamic body.
pub fn apply_gravity(world: &mut hecs::World, gravity: Vec3) {
    for (_, rb) in world.query_mut::<&mut RigidBody>() {
        if rb.is_static() {
            continue;
        }
        rb.force_accumulator += gravity * rb.gravity_scale / rb.inv_mass;
    }
}

/// Rotate each body's local inverse inertia into world space.
pub fn update_world_inertia(world: &mut hecs::World) -> Result<(), PhysicsError> {
    for (entity, (rb, transform)) in world.query_mut::<(&mut RigidBody, Option<&Transform>)>() {
        let transform = transform.ok_or(PhysicsError::OrphanedRigidBody(entity))?;
        let r = Mat3::from_quat(transform.rotation);
        rb.inv_inertia_world = r * rb.inv_inertia_local * r.transpose();
    }
    Ok(())
}

/// Semi-implicit Euler velocity update from the accumulated force and
/// torque, which are then cleared.
pub fn integrate_velocities(world: &mut hecs::World, dt: f32) {
    for (_, rb) in world.query_mut::<&mut RigidBody>() {
        if !rb.is_static() {
            rb.velocity += rb.force_accumulator * rb.inv_mass * dt;
            rb.angular_velocity += rb.inv_inertia_world * rb.torque_accumulator * dt;
        }
        rb.force_accumulator = Vec3::ZERO;
        rb.torque_accumulator = Vec3::ZERO;
    }
}

/// Advance positions and orientations by the current velocities.
pub fn integrate_positions(world: &mut hecs::World, dt: f32) -> Result<(), PhysicsError> {
    for (entity, (rb, transform)) in world.query_mut::<(&RigidBody, Option<&mut Transform>)>() {
        if rb.is_static() {
            continue;
        }
        let transform = transform.ok_or(PhysicsError::OrphanedRigidBody(entity))?;
        transform.position += rb.velocity * dt;
        transform.rotation = integrate_rotation(transform.rotation, rb.angular_velocity, dt);
    }
    Ok(())
}

/// Compose the axis-angle rotation `omega * dt` onto `rotation`.
pub fn integrate_rotation(rotation: Quat, omega: Vec3, dt: f32) -> Quat {
    let delta = omega * dt;
    let angle = delta.length();
    if angle == 0.0 {
        return rotation;
    }
    (Quat::from_axis_angle(delta / angle, angle) * rotation).normalize()
}

/// Velocity-proportional drag.
pub fn apply_drag(world: &mut hecs::World, dt: f32, linear: f32, angular: f32) {
    for (_, rb) in world.query_mut::<&mut RigidBody>() {
        rb.velocity -= rb.velocity * dt * linear;
        rb.angular_velocity -= rb.angular_velocity * dt * angular;
    }
}

//! CPU rigid body simulation with GJK/EPA collision detection.
//!
//! # Architecture
//!
//! [`PhysicsWorld::step`] splits a frame into fixed substeps. Each substep:
//!
//! 1. Broadphase (sweep and prune over AABBs) and narrowphase (GJK, EPA,
//!    face clipping) build the contact manifolds
//! 2. Gravity, then world-space inverse inertia
//! 3. Bounce impulses, integrated into velocities
//! 4. Friction impulses
//! 5. Spring impulses
//! 6. Positional depenetration
//! 7. Velocity and position integration, drag

pub mod broadphase;
pub mod collider;
pub mod contact;
pub mod debug;
pub mod grid;
pub mod narrowphase;
pub mod raycast;
pub mod rigid_body;
pub mod solver;

use glam::Vec3;

use crate::ecs::components::physics::Collider;
use crate::ecs::components::transform::Transform;
use crate::error::PhysicsError;

use self::broadphase::SweepAndPrune;
use self::contact::ContactManifold;
use self::debug::{DebugSink, NoDebug};
use self::narrowphase::{collide, NarrowphaseConfig, ShapePair};
use self::raycast::{Ray, RayHit};

const CONTACT_COLOR: Vec3 = Vec3::new(1.0, 0.0, 1.0);

/// Configuration for the physics simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, 0, -9.8).
    pub gravity: Vec3,
    /// Substeps per [`PhysicsWorld::step`]. Default: 10.
    pub substeps: u32,
    /// Fraction of velocity lost per second. Default: 0.01.
    pub linear_drag: f32,
    /// Fraction of angular velocity lost per second. Default: 0.06.
    pub angular_drag: f32,
    /// Share of the penetration removed per substep. Default: 0.8.
    pub depenetration_factor: f32,
    /// Penetration left alone. Default: 0.001.
    pub depenetration_slop: f32,
    /// Largest impulse a spring may apply per substep. Default: 20.
    pub spring_impulse_limit: f32,
    /// Frame deltas above this (or negative) are replaced. Default: 1 s.
    pub max_delta_time: f64,
    /// Replacement for rejected frame deltas. Default: 1/60 s.
    pub fallback_delta_time: f64,
    pub narrowphase: NarrowphaseConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -9.8),
            substeps: 10,
            linear_drag: 0.01,
            angular_drag: 0.06,
            depenetration_factor: 0.8,
            depenetration_slop: 0.001,
            spring_impulse_limit: 20.0,
            max_delta_time: 1.0,
            fallback_delta_time: 1.0 / 60.0,
            narrowphase: NarrowphaseConfig::default(),
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), PhysicsError> {
        let invalid = |msg: &str| Err(PhysicsError::InvalidConfig(msg.to_string()));

        if !self.gravity.is_finite() {
            return invalid("gravity must be finite");
        }
        if self.substeps == 0 {
            return invalid("substeps must be at least 1");
        }
        if !(self.max_delta_time > 0.0 && self.max_delta_time.is_finite()) {
            return invalid("max_delta_time must be positive");
        }
        if !(self.fallback_delta_time > 0.0 && self.fallback_delta_time <= self.max_delta_time) {
            return invalid("fallback_delta_time must be in (0, max_delta_time]");
        }
        if !(0.0..=1.0).contains(&self.depenetration_factor) {
            return invalid("depenetration_factor must be in [0, 1]");
        }
        if self.depenetration_slop < 0.0 || self.linear_drag < 0.0 || self.angular_drag < 0.0 {
            return invalid("slop and drag must not be negative");
        }
        if self.spring_impulse_limit <= 0.0 {
            return invalid("spring_impulse_limit must be positive");
        }
        let np = &self.narrowphase;
        if np.gjk_max_iterations == 0 || np.epa_max_iterations == 0 {
            return invalid("narrowphase iteration caps must be at least 1");
        }
        if np.epa_tolerance < 0.0 || np.degenerate_epsilon < 0.0 {
            return invalid("narrowphase tolerances must not be negative");
        }
        Ok(())
    }
}

/// The main physics world managing simulation state.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    broadphase: SweepAndPrune,
    contacts: Vec<ContactManifold>,
    debug: Box<dyn DebugSink + Send>,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            broadphase: SweepAndPrune::new(),
            contacts: Vec::new(),
            debug: Box::new(NoDebug),
        }
    }

    /// Like [`new`](Self::new), rejecting invalid configurations.
    pub fn try_new(config: PhysicsConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn set_debug_sink(&mut self, sink: Box<dyn DebugSink + Send>) {
        self.debug = sink;
    }

    /// Contact manifolds from the most recent substep.
    pub fn contacts(&self) -> &[ContactManifold] {
        &self.contacts
    }

    /// Advance the simulation by one frame of `delta_time` seconds.
    pub fn step(&mut self, world: &mut hecs::World, delta_time: f64) -> Result<(), PhysicsError> {
        let frame = if (0.0..=self.config.max_delta_time).contains(&delta_time) {
            delta_time
        } else {
            tracing::warn!(
                delta_time,
                fallback = self.config.fallback_delta_time,
                "frame delta out of range"
            );
            self.config.fallback_delta_time
        };

        let dt = (frame / self.config.substeps as f64) as f32;
        for _ in 0..self.config.substeps {
            self.fixed_step(world, dt)?;
        }
        Ok(())
    }

    /// One substep of `dt` seconds.
    pub fn fixed_step(&mut self, world: &mut hecs::World, dt: f32) -> Result<(), PhysicsError> {
        self.collect_contacts(world)?;

        rigid_body::apply_gravity(world, self.config.gravity);
        rigid_body::integrate_velocities(world, dt);
        rigid_body::update_world_inertia(world)?;

        solver::solve_bounce(world, &mut self.contacts, dt);
        rigid_body::integrate_velocities(world, dt);

        solver::solve_friction(world, &self.contacts, dt);
        solver::solve_springs(world, dt, self.config.spring_impulse_limit, self.debug.as_mut());
        solver::depenetrate(
            world,
            &self.contacts,
            self.config.depenetration_factor,
            self.config.depenetration_slop,
        );

        rigid_body::integrate_velocities(world, dt);
        rigid_body::integrate_positions(world, dt)?;
        rigid_body::apply_drag(world, dt, self.config.linear_drag, self.config.angular_drag);
        Ok(())
    }

    fn collect_contacts(&mut self, world: &hecs::World) -> Result<(), PhysicsError> {
        self.broadphase.update(world)?;
        let pairs = self.broadphase.find_pairs();

        self.contacts.clear();
        let entries = self.broadphase.entries();
        for (i, j) in pairs {
            let (a, b) = (&entries[i], &entries[j]);
            let pair = ShapePair::new(&a.shape, &a.transform, &b.shape, &b.transform);
            if let Some(manifold) = collide(
                a.entity,
                b.entity,
                &pair,
                &self.config.narrowphase,
                self.debug.as_mut(),
            ) {
                for point in manifold.points() {
                    self.debug.draw_arrow(
                        point.position,
                        point.position + manifold.normal * point.depth,
                        CONTACT_COLOR,
                    );
                }
                self.contacts.push(manifold);
            }
        }
        tracing::trace!(contacts = self.contacts.len(), "narrowphase done");
        Ok(())
    }

    /// Nearest collider hit by `ray`.
    pub fn ray_cast(&self, world: &hecs::World, ray: &Ray) -> Option<(hecs::Entity, RayHit)> {
        let mut best: Option<(hecs::Entity, RayHit)> = None;
        for (entity, (collider, transform)) in world.query::<(&Collider, &Transform)>().iter() {
            let placed = collider.placed(transform);
            if let Some(hit) = collider.shape.ray_intersection(ray, &placed) {
                if best.map_or(true, |(_, b)| hit.t < b.t) {
                    best = Some((entity, hit));
                }
            }
        }
        best
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

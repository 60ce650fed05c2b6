//! Rein Collide
//!
//! Narrow-phase collision detection (GJK + EPA) and a sequential impulse
//! rigid body solver on top of a hecs ECS.
//!
//! # Architecture
//!
//! 1. **ecs** - `Transform`, `RigidBody`, `Collider` and `Spring` components
//! 2. **physics::collider** - Support functions and AABBs per shape
//! 3. **physics::narrowphase** - GJK overlap, EPA penetration, contact manifolds
//! 4. **physics::solver** - Bounce, friction, springs and depenetration
//! 5. **physics::raycast** / **physics::grid** - Ray queries against shapes and
//!    static triangle grids
//! 6. **physics::debug** - Optional draw and trace hooks
//!
//! World space is Z-up. Cylinders and capsules are aligned with their local Z.

pub mod ecs;
pub mod error;
pub mod physics;

pub use ecs::prelude::*;
pub use error::{CollisionFailure, PhysicsError};
pub use physics::{PhysicsConfig, PhysicsWorld};

// Re-export glam for convenience
pub use glam;

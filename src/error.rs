//! Error types for the collision and physics pipeline.

use thiserror::Error;

/// Errors surfaced by [`crate::physics::PhysicsWorld`] and resource construction.
///
/// These are integration bugs or bad input, never geometric outcomes. Shapes
/// that do not touch, or pairs whose narrowphase degenerates, are reported
/// through `Option`/[`CollisionFailure`] instead.
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("collider on entity {0:?} has no transform")]
    OrphanedCollider(hecs::Entity),

    #[error("rigid body on entity {0:?} has no transform")]
    OrphanedRigidBody(hecs::Entity),

    #[error("convex hull has no points")]
    EmptyConvexHull,

    #[error("convex hull triangle {triangle} references point {index}, but only {point_count} points exist")]
    HullIndexOutOfRange {
        triangle: usize,
        index: u32,
        point_count: usize,
    },

    #[error("triangle grid: {0}")]
    InvalidGrid(String),

    #[error("invalid physics config: {0}")]
    InvalidConfig(String),
}

/// Why a narrowphase test gave up on a pair.
///
/// The pair is dropped for the current substep; the next substep retries with
/// fresh positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollisionFailure {
    #[error("GJK did not converge within {0} iterations")]
    GjkIterationLimit(u32),

    #[error("GJK simplex is degenerate")]
    DegenerateSimplex,

    #[error("EPA found no face containing the origin projection")]
    NoClosestFeature,

    #[error("EPA closest feature collapsed onto the origin")]
    DegenerateFeature,

    #[error("EPA did not converge within {0} iterations")]
    EpaIterationLimit(u32),
}

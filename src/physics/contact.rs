//! Contact data structures for collision response.

use glam::Vec3;

/// Most contact points a single pair can carry.
pub const MAX_CONTACT_POINTS: usize = 8;

/// Result of a narrowphase test between shapes A and B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionInfo {
    /// World-space contact point on the surface of A.
    pub hit_point: Vec3,
    /// Unit direction in which A must move to separate from B.
    pub normal: Vec3,
    /// Penetration depth (non-negative).
    pub depth: f32,
    /// `normal * depth`: the smallest translation of A that separates the pair.
    pub depenetration: Vec3,
}

/// A single contact point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactPoint {
    /// Contact position in world space.
    pub position: Vec3,
    /// Penetration depth at this point.
    pub depth: f32,
    /// Normal impulse applied by the bounce pass, read back by friction.
    pub normal_impulse: f32,
}

/// Contact points between two entities for one substep.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    pub entity_a: hecs::Entity,
    pub entity_b: hecs::Entity,
    /// Direction A is pushed out of B.
    pub normal: Vec3,
    pub depth: f32,
    points: [ContactPoint; MAX_CONTACT_POINTS],
    count: usize,
}

impl ContactManifold {
    pub fn new(entity_a: hecs::Entity, entity_b: hecs::Entity, normal: Vec3, depth: f32) -> Self {
        Self {
            entity_a,
            entity_b,
            normal,
            depth,
            points: [ContactPoint::default(); MAX_CONTACT_POINTS],
            count: 0,
        }
    }

    /// Single-point manifold from a narrowphase result.
    pub fn from_collision(entity_a: hecs::Entity, entity_b: hecs::Entity, info: &CollisionInfo) -> Self {
        let mut manifold = Self::new(entity_a, entity_b, info.normal, info.depth);
        manifold.push(info.hit_point, info.depth);
        manifold
    }

    /// Add a point. Returns `false` once the manifold is full.
    pub fn push(&mut self, position: Vec3, depth: f32) -> bool {
        if self.count == MAX_CONTACT_POINTS {
            return false;
        }
        self.points[self.count] = ContactPoint {
            position,
            depth,
            normal_impulse: 0.0,
        };
        self.count += 1;
        true
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points[..self.count]
    }

    pub fn points_mut(&mut self) -> &mut [ContactPoint] {
        &mut self.points[..self.count]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifold_capacity() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut manifold = ContactManifold::new(a, b, Vec3::Z, 0.1);
        assert!(manifold.is_empty());

        for i in 0..MAX_CONTACT_POINTS {
            assert!(manifold.push(Vec3::splat(i as f32), 0.1));
        }
        assert!(!manifold.push(Vec3::ZERO, 0.1));
        assert_eq!(manifold.len(), MAX_CONTACT_POINTS);
        assert_eq!(manifold.points()[3].position, Vec3::splat(3.0));
    }

    #[test]
    fn test_from_collision() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let info = CollisionInfo {
            hit_point: Vec3::new(1.0, 0.0, 0.0),
            normal: -Vec3::X,
            depth: 0.5,
            depenetration: Vec3::new(-0.5, 0.0, 0.0),
        };
        let manifold = ContactManifold::from_collision(a, b, &info);
        assert_eq!(manifold.len(), 1);
        assert_eq!(manifold.points()[0].position, info.hit_point);
        assert_eq!(manifold.points()[0].normal_impulse, 0.0);
        assert_eq!(manifold.normal, -Vec3::X);
    }
}

//! Broadphase collision detection using AABB overlap tests.

use crate::ecs::components::physics::{Collider, ColliderShape, RigidBody};
use crate::ecs::components::transform::Transform;
use crate::error::PhysicsError;

use super::collider::PhysicsAabb;

/// A collider snapshot taken at the start of a substep.
#[derive(Debug, Clone)]
pub struct BroadphaseEntry {
    pub entity: hecs::Entity,
    pub shape: ColliderShape,
    /// Owner transform with the collider offset applied.
    pub transform: Transform,
    pub aabb: PhysicsAabb,
    /// Has a rigid body with finite mass.
    pub dynamic: bool,
}

/// Sweep-and-prune broadphase along the X axis.
#[derive(Debug, Default)]
pub struct SweepAndPrune {
    entries: Vec<BroadphaseEntry>,
    order: Vec<usize>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every collider in the world.
    ///
    /// A collider whose entity has no [`Transform`] is an error. Colliders
    /// without a [`RigidBody`] are static.
    pub fn update(&mut self, world: &hecs::World) -> Result<(), PhysicsError> {
        self.entries.clear();
        for (entity, (collider, transform, body)) in world
            .query::<(&Collider, Option<&Transform>, Option<&RigidBody>)>()
            .iter()
        {
            let transform = transform.ok_or(PhysicsError::OrphanedCollider(entity))?;
            let placed = collider.placed(transform);
            let aabb = collider.shape.compute_aabb(&placed);
            self.entries.push(BroadphaseEntry {
                entity,
                shape: collider.shape.clone(),
                transform: placed,
                aabb,
                dynamic: body.is_some_and(|b| !b.is_static()),
            });
        }
        Ok(())
    }

    pub fn entries(&self) -> &[BroadphaseEntry] {
        &self.entries
    }

    /// Index pairs into [`entries`](Self::entries) whose AABBs overlap.
    ///
    /// Pairs are `(i, j)` with `i < j`. Pairs where neither side can move are
    /// skipped.
    pub fn find_pairs(&mut self) -> Vec<(usize, usize)> {
        self.order.clear();
        self.order
            .extend((0..self.entries.len()).filter(|&i| !self.entries[i].aabb.is_empty()));
        let entries = &self.entries;
        self.order
            .sort_by(|&a, &b| entries[a].aabb.min.x.total_cmp(&entries[b].aabb.min.x));

        let mut pairs = Vec::new();
        for (k, &i) in self.order.iter().enumerate() {
            let a = &entries[i];
            for &j in &self.order[k + 1..] {
                let b = &entries[j];
                if b.aabb.min.x >= a.aabb.max.x {
                    break;
                }
                if !a.dynamic && !b.dynamic {
                    continue;
                }
                if a.aabb.overlaps(&b.aabb) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sphere(radius: f32) -> Collider {
        Collider::new(ColliderShape::Sphere { radius })
    }

    #[test]
    fn test_broadphase_overlapping() {
        let mut world = hecs::World::new();
        let shape = ColliderShape::Sphere { radius: 1.0 };
        world.spawn((
            Transform::from_position(Vec3::ZERO),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(1.0),
        ));
        world.spawn((
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(1.0),
        ));

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        assert_eq!(broadphase.find_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn test_broadphase_no_overlap() {
        let mut world = hecs::World::new();
        let shape = ColliderShape::Sphere { radius: 0.5 };
        world.spawn((
            Transform::from_position(Vec3::ZERO),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(0.5),
        ));
        world.spawn((
            Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(0.5),
        ));

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        assert!(broadphase.find_pairs().is_empty());
    }

    #[test]
    fn test_broadphase_overlap_in_x_only() {
        let mut world = hecs::World::new();
        let shape = ColliderShape::Sphere { radius: 1.0 };
        world.spawn((
            Transform::identity(),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(1.0),
        ));
        world.spawn((
            Transform::from_position(Vec3::new(0.5, 5.0, 0.0)),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(1.0),
        ));

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        assert!(broadphase.find_pairs().is_empty());
    }

    #[test]
    fn test_broadphase_static_pairs_skipped() {
        let mut world = hecs::World::new();
        // Static body and a bare collider overlap but neither moves.
        world.spawn((Transform::identity(), RigidBody::new_static(), sphere(1.0)));
        world.spawn((Transform::identity(), sphere(1.0)));

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        assert!(broadphase.find_pairs().is_empty());
    }

    #[test]
    fn test_broadphase_collider_offset() {
        let mut world = hecs::World::new();
        let shape = ColliderShape::Sphere { radius: 0.5 };
        world.spawn((
            Transform::identity(),
            RigidBody::new_dynamic(1.0, &shape),
            sphere(0.5).with_offset(Vec3::new(3.0, 0.0, 0.0)),
        ));
        world.spawn((Transform::from_position(Vec3::new(3.5, 0.0, 0.0)), sphere(0.5)));

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        assert_eq!(broadphase.find_pairs().len(), 1);
        assert!((broadphase.entries()[0].transform.position.x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_broadphase_orphaned_collider() {
        let mut world = hecs::World::new();
        let orphan = world.spawn((sphere(1.0),));

        let mut broadphase = SweepAndPrune::new();
        assert!(matches!(
            broadphase.update(&world),
            Err(PhysicsError::OrphanedCollider(e)) if e == orphan
        ));
    }

    #[test]
    fn test_broadphase_many_bodies_matches_brute_force() {
        let mut world = hecs::World::new();
        let shape = ColliderShape::Cube { radius: 0.6 };
        for i in 0..30 {
            let x = (i % 7) as f32 * 0.9;
            let y = (i / 7) as f32 * 1.1;
            world.spawn((
                Transform::from_position(Vec3::new(x, y, (i % 3) as f32)),
                RigidBody::new_dynamic(1.0, &shape),
                Collider::new(shape.clone()),
            ));
        }

        let mut broadphase = SweepAndPrune::new();
        broadphase.update(&world).unwrap();
        let pairs = broadphase.find_pairs();

        let entries = broadphase.entries();
        let mut expected = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                if entries[i].aabb.overlaps(&entries[j].aabb) {
                    expected.push((i, j));
                }
            }
        }
        assert_eq!(pairs, expected);
    }
}

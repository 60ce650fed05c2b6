//! Uniform XY grid over static level triangles, for ray queries.

use glam::{Vec2, Vec3, Vec3Swizzles};

use crate::error::PhysicsError;

use super::raycast::{ray_triangle_intersection, Ray, RayHit, Triangle};

/// Static triangle soup bucketed into `cells_side x cells_side` columns.
///
/// Each triangle is stored in every cell its XY bounds touch. Cell contents
/// are packed: cell `i` owns `triangles[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone)]
pub struct TriangleGrid {
    low: Vec2,
    high: Vec2,
    cells_side: usize,
    offsets: Vec<u32>,
    triangles: Vec<Triangle>,
}

/// Nearest triangle hit by a grid ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHit {
    pub hit: RayHit,
    pub triangle: Triangle,
}

impl TriangleGrid {
    pub fn build(triangles: &[Triangle], cells_side: usize) -> Result<Self, PhysicsError> {
        if cells_side == 0 {
            return Err(PhysicsError::InvalidGrid("cells_side must be positive".into()));
        }
        if triangles.is_empty() {
            return Err(PhysicsError::InvalidGrid("no triangles".into()));
        }

        let mut low = Vec2::splat(f32::INFINITY);
        let mut high = Vec2::splat(f32::NEG_INFINITY);
        for tri in triangles {
            for p in [tri.a, tri.b, tri.c] {
                low = low.min(p.xy());
                high = high.max(p.xy());
            }
        }
        if !low.is_finite() || !high.is_finite() {
            return Err(PhysicsError::InvalidGrid("non-finite triangle".into()));
        }
        // Pad flat extents so every cell has a positive size.
        let extent = (high - low).max(Vec2::splat(1e-3));
        high = low + extent;

        let mut grid = Self {
            low,
            high,
            cells_side,
            offsets: Vec::new(),
            triangles: Vec::new(),
        };

        let mut buckets: Vec<Vec<Triangle>> = vec![Vec::new(); cells_side * cells_side];
        for tri in triangles {
            let tri_low = tri.a.xy().min(tri.b.xy()).min(tri.c.xy());
            let tri_high = tri.a.xy().max(tri.b.xy()).max(tri.c.xy());
            let (x0, y0) = grid.cell_of(tri_low);
            let (x1, y1) = grid.cell_of(tri_high);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    buckets[x + y * cells_side].push(*tri);
                }
            }
        }

        grid.offsets.reserve(buckets.len() + 1);
        grid.offsets.push(0);
        for bucket in buckets {
            grid.triangles.extend(bucket);
            grid.offsets.push(grid.triangles.len() as u32);
        }

        tracing::debug!(
            cells = cells_side * cells_side,
            stored = grid.triangles.len(),
            "built triangle grid"
        );
        Ok(grid)
    }

    pub fn cell_size(&self) -> Vec2 {
        (self.high - self.low) / self.cells_side as f32
    }

    /// Cell containing `p`, clamped to the grid.
    fn cell_of(&self, p: Vec2) -> (usize, usize) {
        let rel = (p - self.low) / self.cell_size();
        let max = (self.cells_side - 1) as f32;
        (
            rel.x.floor().clamp(0.0, max) as usize,
            rel.y.floor().clamp(0.0, max) as usize,
        )
    }

    fn cell_triangles(&self, x: usize, y: usize) -> &[Triangle] {
        let i = x + y * self.cells_side;
        &self.triangles[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    /// Ray parameter range over which the ray's XY projection is inside the grid.
    fn clip(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut t0 = f32::NEG_INFINITY;
        let mut t1 = f32::INFINITY;
        for axis in 0..2 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d == 0.0 {
                if o < self.low[axis] || o > self.high[axis] {
                    return None;
                }
                continue;
            }
            let a = (self.low[axis] - o) / d;
            let b = (self.high[axis] - o) / d;
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }
        t0 = t0.max(0.0);
        if !ray.infinite {
            t1 = t1.min(1.0);
        }
        (t0 <= t1).then_some((t0, t1))
    }

    /// Walk the cells under the ray in order and return the nearest hit.
    ///
    /// A hit found in one cell is only final once the walk has passed its ray
    /// parameter, since a triangle stored in several cells can be hit beyond
    /// the current cell while a nearer one waits in the next.
    pub fn ray_cast(&self, ray: &Ray) -> Option<GridHit> {
        let (t_start, t_end) = self.clip(ray)?;
        let size = self.cell_size();
        let start = ray.at(t_start).xy();
        let (mut x, mut y) = self.cell_of(start);

        let dir = ray.direction.xy();
        let step = [dir.x.signum() as isize, dir.y.signum() as isize];
        let mut t_max = [f32::INFINITY; 2];
        let mut t_delta = [f32::INFINITY; 2];
        for axis in 0..2 {
            let d = dir[axis];
            if d == 0.0 {
                continue;
            }
            let cell = if axis == 0 { x } else { y };
            let boundary = if d > 0.0 {
                self.low[axis] + (cell + 1) as f32 * size[axis]
            } else {
                self.low[axis] + cell as f32 * size[axis]
            };
            t_max[axis] = (boundary - ray.origin[axis]) / d;
            t_delta[axis] = size[axis] / d.abs();
        }

        let mut best: Option<GridHit> = None;
        for _ in 0..(2 * self.cells_side + 2) {
            for tri in self.cell_triangles(x, y) {
                if let Some((t, point)) = ray_triangle_intersection(ray, tri) {
                    if best.map_or(true, |b| t < b.hit.t) {
                        best = Some(GridHit {
                            hit: RayHit {
                                point,
                                normal: tri.normal,
                                t,
                            },
                            triangle: *tri,
                        });
                    }
                }
            }

            let cell_exit = t_max[0].min(t_max[1]).min(t_end);
            if let Some(found) = best {
                if found.hit.t <= cell_exit {
                    return best;
                }
            }
            if cell_exit >= t_end {
                break;
            }

            let axis = if t_max[0] < t_max[1] { 0 } else { 1 };
            let cell = if axis == 0 { &mut x } else { &mut y };
            let next = *cell as isize + step[axis];
            if next < 0 || next >= self.cells_side as isize {
                break;
            }
            *cell = next as usize;
            t_max[axis] += t_delta[axis];
        }

        best
    }
}

/// Convenience for level geometry given as indexed positions.
pub fn triangles_from_indexed(positions: &[Vec3], indices: &[[u32; 3]]) -> Vec<Triangle> {
    indices
        .iter()
        .filter_map(|tri| {
            let [a, b, c] = tri.map(|i| positions.get(i as usize).copied());
            Some(Triangle::new(a?, b?, c?))
        })
        .collect()
}

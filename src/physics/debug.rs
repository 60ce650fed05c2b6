//! Optional visualization hooks for the collision pipeline.
//!
//! Nothing in the pipeline depends on these being called. The default sink
//! ignores everything.

use glam::Vec3;

use super::narrowphase::epa::EpaFace;
use super::narrowphase::gjk::GjkPoint;

/// Receives debug geometry and GJK/EPA trace events.
pub trait DebugSink {
    fn draw_cube(&mut self, _center: Vec3, _half_size: f32, _color: Vec3) {}
    fn draw_line(&mut self, _from: Vec3, _to: Vec3, _color: Vec3) {}
    fn draw_triangle(&mut self, _a: Vec3, _b: Vec3, _c: Vec3, _color: Vec3) {}
    fn draw_arrow(&mut self, _from: Vec3, _to: Vec3, _color: Vec3) {}

    /// A new support point was found on GJK iteration `iteration`.
    fn gjk_point(&mut self, _iteration: u32, _point: &GjkPoint) {}
    /// Polytope at the start of EPA step `step`.
    fn epa_step(&mut self, _step: u32, _faces: &[EpaFace]) {}
    /// Support point EPA tried to expand towards on step `step`.
    fn epa_new_point(&mut self, _step: u32, _point: &GjkPoint) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDebug;

impl DebugSink for NoDebug {}

/// A colored debug primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugPrimitive {
    Cube {
        center: Vec3,
        half_size: f32,
        color: Vec3,
    },
    Line {
        from: Vec3,
        to: Vec3,
        color: Vec3,
    },
    Triangle {
        a: Vec3,
        b: Vec3,
        c: Vec3,
        color: Vec3,
    },
    Arrow {
        from: Vec3,
        to: Vec3,
        color: Vec3,
    },
}

/// Keeps everything it receives, for offline inspection.
///
/// GJK points and EPA polytopes are stored as shape-A witness positions so
/// they can be drawn in world space next to the colliders.
#[derive(Debug, Default, Clone)]
pub struct DebugRecorder {
    pub primitives: Vec<DebugPrimitive>,
    pub gjk_points: Vec<(u32, Vec3)>,
    pub epa_steps: Vec<Vec<[Vec3; 3]>>,
    pub epa_new_points: Vec<(u32, Vec3)>,
}

impl DebugRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
        self.gjk_points.clear();
        self.epa_steps.clear();
        self.epa_new_points.clear();
    }
}

impl DebugSink for DebugRecorder {
    fn draw_cube(&mut self, center: Vec3, half_size: f32, color: Vec3) {
        self.primitives.push(DebugPrimitive::Cube {
            center,
            half_size,
            color,
        });
    }

    fn draw_line(&mut self, from: Vec3, to: Vec3, color: Vec3) {
        self.primitives.push(DebugPrimitive::Line { from, to, color });
    }

    fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec3) {
        self.primitives
            .push(DebugPrimitive::Triangle { a, b, c, color });
    }

    fn draw_arrow(&mut self, from: Vec3, to: Vec3, color: Vec3) {
        self.primitives.push(DebugPrimitive::Arrow { from, to, color });
    }

    fn gjk_point(&mut self, iteration: u32, point: &GjkPoint) {
        self.gjk_points.push((iteration, point.a));
    }

    fn epa_step(&mut self, _step: u32, faces: &[EpaFace]) {
        self.epa_steps
            .push(faces.iter().map(|f| [f.a.a, f.b.a, f.c.a]).collect());
    }

    fn epa_new_point(&mut self, step: u32, point: &GjkPoint) {
        self.epa_new_points.push((step, point.a));
    }
}

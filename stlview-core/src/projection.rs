/// Viewport mapping, trackball projection and orthographic fitting
use std::f32::consts::FRAC_PI_2;

use nalgebra::{Matrix4, Point3, Vector2, Vector3};

use crate::geometry::BoundingBox;

/// Drawable area in pixels (or any uniform screen unit)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Screen coordinates (y down) to normalized device coordinates in
    /// [-1, 1]², x and y scaled independently
    pub fn drag_point(&self, x: f32, y: f32) -> Vector2<f32> {
        Vector2::new(
            (2.0 * x - self.width) / self.width,
            (self.height - 2.0 * y) / self.height,
        )
    }

    /// Lift a screen point onto the unit trackball hemisphere
    pub fn trackball_point(&self, x: f32, y: f32) -> Vector3<f32> {
        let dxy = self.drag_point(x, y);
        let r = dxy.norm().clamp(0.0, 1.0);
        Vector3::new(dxy.x, dxy.y, (r * FRAC_PI_2).cos()).normalize()
    }

    /// Normalized device coordinates back to screen coordinates (y down)
    pub fn to_screen(&self, ndc: &Point3<f32>) -> (f32, f32) {
        (
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
        )
    }
}

/// Orthographic view volume fitted around a bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoProjection {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl OrthoProjection {
    /// Fit the volume around `bbox` as seen from `view_distance` away.
    ///
    /// An empty box fits a unit volume around the origin. The shorter
    /// viewport side keeps the box's full extent; `zoom` scales the sides.
    pub fn fit(bbox: &BoundingBox, view_distance: f32, viewport: &Viewport, zoom: f32) -> Self {
        let (cx, cy, diam, diagonal) = if bbox.is_empty() {
            (0.0, 0.0, 1.0, 1.0)
        } else {
            let c = bbox.center();
            (c.x, c.y, bbox.max_extent().max(f32::EPSILON), bbox.diagonal())
        };

        let (mut left, mut right) = (cx - diam, cx + diam);
        let (mut bottom, mut top) = (cy - diam, cy + diam);
        let depth = 2.0 * (view_distance + diagonal);

        let aspect = viewport.aspect();
        if aspect < 1.0 {
            bottom /= aspect;
            top /= aspect;
        } else {
            left *= aspect;
            right *= aspect;
        }

        Self {
            left: zoom * left,
            right: zoom * right,
            bottom: zoom * bottom,
            top: zoom * top,
            near: -depth,
            far: depth,
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_orthographic(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }
}

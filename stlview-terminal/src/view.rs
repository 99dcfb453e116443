/// Camera control for the terminal viewer: pointer gestures, centring and
/// orthographic fitting
use log::warn;
use nalgebra::Vector3;
use stlview_core::{trackball_rotation, BoundingBox, OrthoProjection, TrackballCamera, Viewport};

/// Terminal cells are roughly twice as tall as they are wide
const CELL_ASPECT: f32 = 2.0;

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Orbit,
    Pan,
    Zoom,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    mode: DragMode,
    x: f32,
    y: f32,
}

pub struct ViewController {
    camera: TrackballCamera,
    zoom_factor: f32,
    zoom_sensitivity: f32,
    viewport: Viewport,
    drag: Option<Drag>,
}

impl ViewController {
    /// `columns` x `rows` is the size of the drawable grid in cells
    pub fn new(columns: u16, rows: u16, zoom_sensitivity: f32) -> Self {
        Self {
            camera: TrackballCamera::new(),
            zoom_factor: 1.0,
            zoom_sensitivity,
            viewport: Viewport::new(f32::from(columns), f32::from(rows)),
            drag: None,
        }
    }

    pub fn camera(&self) -> &TrackballCamera {
        &self.camera
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    pub fn resize(&mut self, columns: u16, rows: u16) {
        self.viewport = Viewport::new(f32::from(columns), f32::from(rows));
    }

    /// Look at the box centre from `2 * max(extent_x, extent_y)` up the
    /// Z axis, +Y up. The zoom factor goes back to 1.
    pub fn center_view(&mut self, bbox: &BoundingBox) {
        let (center, distance) = if bbox.is_empty() {
            (Vector3::zeros(), 2.0)
        } else {
            let distance = 2.0 * bbox.extent_x().max(bbox.extent_y());
            let distance = if distance > f32::EPSILON {
                distance
            } else {
                2.0 * bbox.max_extent().max(1.0)
            };
            (bbox.center().coords, distance)
        };

        let eye = Vector3::new(0.0, 0.0, distance);
        if let Err(err) = self.camera.look_at(&eye, &center, &Vector3::y()) {
            warn!("cannot centre view on {center:?}: {err}");
            return;
        }
        self.zoom_factor = 1.0;
    }

    /// Orthographic volume around `bbox` for the current camera and grid
    pub fn projection(&self, bbox: &BoundingBox) -> OrthoProjection {
        let fit_viewport = Viewport::new(self.viewport.width, self.viewport.height * CELL_ASPECT);
        OrthoProjection::fit(bbox, self.camera.view_distance(), &fit_viewport, self.zoom_factor)
    }

    pub fn begin_drag(&mut self, mode: DragMode, x: f32, y: f32) {
        self.drag = Some(Drag { mode, x, y });
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn dragging(&self) -> Option<DragMode> {
        self.drag.map(|d| d.mode)
    }

    /// Apply the motion since the last pointer position
    pub fn drag_to(&mut self, x: f32, y: f32) {
        let Some(drag) = self.drag else {
            return;
        };
        let viewport = self.viewport;

        match drag.mode {
            DragMode::Orbit => {
                let from = viewport.trackball_point(drag.x, drag.y);
                let to = viewport.trackball_point(x, y);
                if let Some((axis, angle)) = trackball_rotation(&from, &to) {
                    self.camera.orbit(&axis, angle);
                }
            }
            DragMode::Pan => {
                let delta = viewport.drag_point(x, y) - viewport.drag_point(drag.x, drag.y);
                let distance = self.camera.view_distance();
                self.camera.pan(&(delta * distance));
            }
            DragMode::Zoom => {
                let dy = viewport.drag_point(x, y).y - viewport.drag_point(drag.x, drag.y).y;
                self.adjust_zoom(dy * self.zoom_sensitivity);
            }
        }

        self.drag = Some(Drag { x, y, ..drag });
    }

    /// Orbit about a camera-space axis, as keyboard input does
    pub fn orbit(&mut self, axis: &Vector3<f32>, angle_deg: f32) {
        self.camera.orbit(axis, angle_deg);
    }

    /// Grow (positive) or shrink the visible volume
    pub fn adjust_zoom(&mut self, delta: f32) {
        self.zoom_factor = (self.zoom_factor + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn scale_zoom(&mut self, factor: f32) {
        self.zoom_factor = (self.zoom_factor * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn unit_box() -> BoundingBox {
        BoundingBox::from_points(&[Point3::new(-1.0, -0.5, -2.0), Point3::new(1.0, 0.5, 2.0)])
    }

    fn centered() -> ViewController {
        let mut view = ViewController::new(80, 40, 5.0);
        view.center_view(&unit_box());
        view
    }

    #[test]
    fn test_center_view_distance() {
        let view = centered();
        assert_relative_eq!(view.camera().view_distance(), 4.0);

        let eye = view
            .camera()
            .view_matrix()
            .matrix()
            .transform_point(&Point3::new(0.0, 0.0, 4.0));
        assert_relative_eq!(eye, Point3::origin(), epsilon = 1e-6);
    }

    #[test]
    fn test_center_view_on_empty_or_flat_box() {
        let mut view = ViewController::new(80, 40, 5.0);
        view.center_view(&BoundingBox::empty());
        assert_relative_eq!(view.camera().view_distance(), 2.0);

        let needle = BoundingBox::from_points(&[Point3::new(0.0, 0.0, -3.0), Point3::new(0.0, 0.0, 3.0)]);
        view.center_view(&needle);
        assert_relative_eq!(view.camera().view_distance(), 12.0);
    }

    #[test]
    fn test_pan_drag_scales_with_view_distance() {
        let mut view = centered();

        view.begin_drag(DragMode::Pan, 40.0, 20.0);
        view.drag_to(60.0, 20.0);
        view.end_drag();

        // Half the grid width at distance 4
        assert_relative_eq!(view.camera().look_vector(), Vector3::new(2.0, 0.0, -4.0), epsilon = 1e-5);
        assert!(view.dragging().is_none());
    }

    #[test]
    fn test_orbit_drag_keeps_rotation_orthonormal() {
        let mut view = centered();
        let original = *view.camera().rotation();

        view.begin_drag(DragMode::Orbit, 40.0, 20.0);
        view.drag_to(40.0, 20.0);
        assert_eq!(*view.camera().rotation(), original);

        view.drag_to(55.0, 12.0);
        assert_ne!(*view.camera().rotation(), original);
        assert!(view.camera().rotation().is_orthonormal(1e-5));
    }

    #[test]
    fn test_zoom_drag_is_clamped() {
        let mut view = centered();
        view.begin_drag(DragMode::Zoom, 40.0, 20.0);
        view.drag_to(40.0, 10.0);
        assert_relative_eq!(view.zoom_factor(), 1.0 + 0.5 * 5.0);

        view.drag_to(40.0, 40.0);
        assert_relative_eq!(view.zoom_factor(), MIN_ZOOM);
    }

    #[test]
    fn test_drag_without_begin_is_ignored() {
        let mut view = centered();
        let before = *view.camera();
        view.drag_to(10.0, 10.0);
        assert_eq!(*view.camera(), before);
        assert!(view.dragging().is_none());
    }

    #[test]
    fn test_projection_corrects_for_cells() {
        let view = centered();
        let fit = view.projection(&unit_box());
        // 80 columns against 40 rows of double-height cells is square
        assert_relative_eq!(fit.right - fit.left, fit.top - fit.bottom);
    }
}

/// Trackball camera: orbit, pan and zoom as composed transforms
use nalgebra::{Vector2, Vector3};

use crate::error::CameraError;
use crate::transform::Transform;

/// Minimum length of the trackball rotation axis before a drag counts
const MIN_TRACKBALL_AXIS: f32 = 1.0e-5;

/// Camera state kept as separate rotation and translation transforms.
///
/// `rotation` never carries a translation component, so the eye offset can
/// be read straight out of `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackballCamera {
    rotation: Transform,
    translation: Transform,
}

impl TrackballCamera {
    /// Camera at the origin looking down -Z with +Y up
    pub fn new() -> Self {
        Self {
            rotation: Transform::identity(),
            translation: Transform::identity(),
        }
    }

    pub fn looking_at(
        origin: &Vector3<f32>,
        look_at: &Vector3<f32>,
        up: &Vector3<f32>,
    ) -> Result<Self, CameraError> {
        let up = up.try_normalize(f32::EPSILON).ok_or(CameraError::DegenerateBasis)?;
        let rotation = construct_rotation(origin, look_at, &up).ok_or(CameraError::DegenerateBasis)?;
        Ok(Self {
            rotation,
            translation: Transform::translation(origin),
        })
    }

    /// Replace both transforms, like `gluLookAt`
    pub fn look_at(
        &mut self,
        origin: &Vector3<f32>,
        look_at: &Vector3<f32>,
        up: &Vector3<f32>,
    ) -> Result<(), CameraError> {
        *self = Self::looking_at(origin, look_at, up)?;
        Ok(())
    }

    /// Rotate the eye about the look point. The angle is negated so that a
    /// positive angle follows the screen-space drag direction.
    pub fn orbit(&mut self, axis: &Vector3<f32>, angle_deg: f32) -> &mut Self {
        self.rotation = self.rotation * Transform::rotation(axis, -angle_deg);
        self
    }

    /// Move the look point opposite to the drag, as if dragging the world
    pub fn pan(&mut self, dxy: &Vector2<f32>) -> &mut Self {
        self.translation = self.translation * Transform::translation(&Vector3::new(-dxy.x, -dxy.y, 0.0));
        self
    }

    /// Move the eye along the view axis. Applied on the left: the offset is
    /// in camera space, not world space.
    pub fn zoom(&mut self, distance: f32) -> &mut Self {
        self.translation = Transform::translation(&Vector3::new(0.0, 0.0, distance)) * self.translation;
        self
    }

    pub fn rotation(&self) -> &Transform {
        &self.rotation
    }

    pub fn translation(&self) -> &Transform {
        &self.translation
    }

    /// World-to-eye transform: inverse of `rotation * translation`
    pub fn view_matrix(&self) -> Transform {
        (self.rotation * self.translation).rigid_inverse()
    }

    /// View matrix laid out for column-major graphics APIs
    pub fn view_matrix_column_major(&self) -> [f32; 16] {
        self.view_matrix().to_column_major()
    }

    pub fn look_vector(&self) -> Vector3<f32> {
        -self.translation.translation_part()
    }

    pub fn view_distance(&self) -> f32 {
        self.look_vector().norm()
    }
}

impl Default for TrackballCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Orthonormal view basis with columns `[u | v | n]`, where `n` points from
/// the look point back to the eye. `None` when the inputs are degenerate.
pub fn construct_rotation(
    origin: &Vector3<f32>,
    look_at: &Vector3<f32>,
    up: &Vector3<f32>,
) -> Option<Transform> {
    let n = (origin - look_at).try_normalize(f32::EPSILON)?;
    let u = up.cross(&n).try_normalize(f32::EPSILON)?;
    let v = n.cross(&u);
    Some(Transform::from_basis(&u, &v, &n))
}

/// Axis and angle (degrees) that rotate one trackball point onto another.
///
/// The angle is `90° * |to - from|`, an approximation of the great-circle
/// angle that feels natural under the mouse. `None` for negligible drags.
pub fn trackball_rotation(from: &Vector3<f32>, to: &Vector3<f32>) -> Option<(Vector3<f32>, f32)> {
    let axis = from.cross(to);
    if axis.norm() <= MIN_TRACKBALL_AXIS {
        return None;
    }
    Some((axis.normalize(), 90.0 * (to - from).norm()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;

    #[test]
    fn test_default_camera_is_identity() {
        let camera = TrackballCamera::new();
        assert_relative_eq!(*camera.view_matrix().matrix(), Matrix4::identity());
        assert_eq!(camera.view_distance(), 0.0);

        let explicit = TrackballCamera::looking_at(&Vector3::zeros(), &-Vector3::z(), &Vector3::y()).unwrap();
        assert_relative_eq!(*explicit.rotation().matrix(), Matrix4::identity());
    }

    #[test]
    fn test_construct_rotation_is_orthonormal() {
        let cases = [
            (Vector3::new(0.0, 0.0, 5.0), Vector3::zeros(), Vector3::y()),
            (Vector3::new(3.0, -2.0, 7.0), Vector3::new(1.0, 1.0, 1.0), Vector3::new(0.2, 1.0, 0.1)),
            (Vector3::new(-4.0, 9.0, 0.5), Vector3::new(0.0, -3.0, 2.0), Vector3::z()),
        ];
        for (origin, look_at, up) in cases {
            let r = construct_rotation(&origin, &look_at, &up.normalize()).unwrap();
            assert!(r.is_orthonormal(1e-5), "not orthonormal: {r:?}");
            assert_relative_eq!(r.translation_part(), Vector3::zeros());
            assert_relative_eq!(r.matrix()[(3, 3)], 1.0);
            // Third column points back at the eye
            let n = r.rotation_block().column(2).into_owned();
            assert_relative_eq!(n, (origin - look_at).normalize(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degenerate_basis() {
        let origin = Vector3::new(0.0, 0.0, 1.0);
        assert!(construct_rotation(&origin, &origin, &Vector3::y()).is_none());
        assert!(construct_rotation(&origin, &Vector3::zeros(), &Vector3::z()).is_none());
        assert_eq!(
            TrackballCamera::looking_at(&origin, &Vector3::zeros(), &Vector3::zeros()),
            Err(CameraError::DegenerateBasis)
        );
    }

    #[test]
    fn test_orbit_round_trip() {
        let mut camera =
            TrackballCamera::looking_at(&Vector3::new(0.0, 0.0, 10.0), &Vector3::zeros(), &Vector3::y()).unwrap();
        let original = *camera.rotation();
        let axis = Vector3::new(0.3, 1.0, -0.2);

        camera.orbit(&axis, 35.0).orbit(&axis, -35.0);
        assert_relative_eq!(*camera.rotation().matrix(), *original.matrix(), epsilon = 1e-6);
        assert!(camera.rotation().is_orthonormal(1e-5));
    }

    #[test]
    fn test_pan_round_trip() {
        let mut camera =
            TrackballCamera::looking_at(&Vector3::new(0.0, 0.0, 10.0), &Vector3::zeros(), &Vector3::y()).unwrap();
        let original = *camera.translation();

        camera.pan(&Vector2::new(1.0, 0.0));
        assert_relative_eq!(camera.look_vector(), Vector3::new(1.0, 0.0, -10.0));
        camera.pan(&Vector2::new(-1.0, 0.0));
        assert_relative_eq!(*camera.translation().matrix(), *original.matrix(), epsilon = 1e-6);
    }

    #[test]
    fn test_zoom_moves_along_view_axis() {
        let mut camera =
            TrackballCamera::looking_at(&Vector3::new(0.0, 0.0, 10.0), &Vector3::zeros(), &Vector3::y()).unwrap();
        camera.zoom(-4.0);
        assert_relative_eq!(camera.view_distance(), 6.0);
    }

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let camera =
            TrackballCamera::looking_at(&Vector3::new(0.0, 0.0, 10.0), &Vector3::zeros(), &Vector3::y()).unwrap();
        let view = camera.view_matrix();
        let eye = view.matrix().transform_point(&nalgebra::Point3::new(0.0, 0.0, 10.0));
        assert_relative_eq!(eye, nalgebra::Point3::origin(), epsilon = 1e-6);

        let cols = camera.view_matrix_column_major();
        assert_relative_eq!(cols[14], -10.0);
    }

    #[test]
    fn test_trackball_rotation() {
        let from = Vector3::z();
        assert!(trackball_rotation(&from, &from).is_none());

        let to = Vector3::new(0.6, 0.0, 0.8);
        let (axis, angle) = trackball_rotation(&from, &to).unwrap();
        assert_relative_eq!(axis, Vector3::y(), epsilon = 1e-6);
        assert_relative_eq!(angle, 90.0 * (to - from).norm());
    }
}

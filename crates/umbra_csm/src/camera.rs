//! Camera and light inputs
//!
//! Both are read-only snapshots handed to the pipeline each frame.

use glam::{Mat4, Vec3};

use crate::error::{Result, ShadowError};

/// Camera state needed to rebuild the view frustum
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrustumParams {
    /// World-to-view transform (right-handed, looking down -Z)
    pub view: Mat4,
    /// Vertical field of view in radians
    pub fovy: f32,
    /// Width / height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl CameraFrustumParams {
    pub fn new(view: Mat4, fovy: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            view,
            fovy,
            aspect,
            near,
            far,
        }
    }

    /// Build from a viewport size. A zero height yields a non-finite aspect
    /// that `validate` rejects.
    pub fn from_viewport(view: Mat4, fovy: f32, width: u32, height: u32, near: f32, far: f32) -> Self {
        Self::new(view, fovy, width as f32 / height as f32, near, far)
    }

    /// Check that the parameters describe a usable frustum
    pub fn validate(&self) -> Result<()> {
        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            return Err(ShadowError::DegenerateCamera(format!(
                "aspect ratio {} is not a positive finite value",
                self.aspect
            )));
        }
        if !self.fovy.is_finite() || self.fovy <= 0.0 || self.fovy >= std::f32::consts::PI {
            return Err(ShadowError::DegenerateCamera(format!(
                "vertical fov {} is outside (0, pi)",
                self.fovy
            )));
        }
        if !self.near.is_finite() || !self.far.is_finite() || self.near <= 0.0 {
            return Err(ShadowError::DegenerateCamera(format!(
                "clip planes near={} far={} are not finite and positive",
                self.near, self.far
            )));
        }
        if self.near >= self.far {
            return Err(ShadowError::DegenerateCamera(format!(
                "near plane {} is not in front of far plane {}",
                self.near, self.far
            )));
        }
        let det = self.view.determinant();
        if !self.view.is_finite() || !det.is_finite() || det.abs() < 1e-12 {
            return Err(ShadowError::DegenerateCamera(
                "view matrix is not invertible".into(),
            ));
        }
        Ok(())
    }

    /// Perspective projection matching these parameters (depth range [0, 1])
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.near, self.far)
    }

    /// Positive distance of a world-space point along the view axis
    pub fn view_depth(&self, world: Vec3) -> f32 {
        -self.view.transform_point3(world).z
    }
}

/// Sun-like light with no position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector the light travels along; (0, -1, 0) shines straight down
    pub direction: Vec3,
}

impl DirectionalLight {
    /// Normalize and validate a travel direction
    pub fn new(direction: Vec3) -> Result<Self> {
        let length = direction.length();
        if !length.is_finite() || length < 1e-6 {
            return Err(ShadowError::DegenerateLight(format!(
                "direction {direction:?} has no usable length"
            )));
        }
        Ok(Self {
            direction: direction / length,
        })
    }

    /// Light view looking from the world origin along the travel direction.
    ///
    /// The origin is arbitrary: a directional light has no position, and
    /// the cascade bounds are fit in this frame afterwards.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::ZERO, self.direction, up_hint(self.direction))
    }
}

/// Up vector that is never parallel to the light
fn up_hint(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.9 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> CameraFrustumParams {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 10.0, -1.0), Vec3::Y);
        CameraFrustumParams::new(view, 45f32.to_radians(), 16.0 / 9.0, 5.0, 2000.0)
    }

    #[test]
    fn test_valid_camera() {
        assert!(camera().validate().is_ok());
    }

    #[test]
    fn test_zero_height_viewport_is_degenerate() {
        let cam = camera();
        let broken = CameraFrustumParams::from_viewport(cam.view, cam.fovy, 1280, 0, 5.0, 2000.0);
        let err = broken.validate().unwrap_err();
        assert!(matches!(err, ShadowError::DegenerateCamera(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_inverted_planes_are_degenerate() {
        let cam = CameraFrustumParams {
            near: 100.0,
            far: 100.0,
            ..camera()
        };
        assert!(cam.validate().is_err());
    }

    #[test]
    fn test_singular_view_is_degenerate() {
        let cam = CameraFrustumParams {
            view: Mat4::ZERO,
            ..camera()
        };
        assert!(cam.validate().is_err());
    }

    #[test]
    fn test_view_depth_is_positive_in_front() {
        let cam = camera();
        assert_relative_eq!(cam.view_depth(Vec3::new(0.0, 10.0, -42.0)), 42.0, epsilon = 1e-4);
    }

    #[test]
    fn test_light_direction_normalized() {
        let light = DirectionalLight::new(Vec3::new(0.0, -2.0, 0.0)).unwrap();
        assert_relative_eq!(light.direction.y, -1.0);
        assert!(DirectionalLight::new(Vec3::ZERO).is_err());
        assert!(DirectionalLight::new(Vec3::new(f32::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_light_view_looks_along_direction() {
        let light = DirectionalLight::new(Vec3::new(0.3, -1.0, 0.2)).unwrap();
        let view = light.view_matrix();

        // A point further along the travel direction is further in front (-Z)
        let near = view.transform_point3(light.direction * 10.0);
        let far = view.transform_point3(light.direction * 50.0);
        assert_relative_eq!(near.z, -10.0, epsilon = 1e-4);
        assert_relative_eq!(far.z, -50.0, epsilon = 1e-4);
        assert_relative_eq!(far.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(far.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_vertical_light_has_finite_view() {
        let light = DirectionalLight::new(Vec3::NEG_Y).unwrap();
        assert!(light.view_matrix().is_finite());
    }
}

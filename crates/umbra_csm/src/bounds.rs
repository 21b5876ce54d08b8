//! Light-space bounds of a view-frustum slice
//!
//! For one cascade interval the eight corners of the camera frustum slice
//! are rebuilt in view space, carried to world space, and fit with an
//! axis-aligned box in the light's view frame.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraFrustumParams;

/// Light-space box extents of one cascade.
///
/// `z_near`/`z_far` are distances along the light's -Z axis, so a light-space
/// point `p` is inside when `-p.z` lies in `[z_near, z_far]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl OrthoBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn depth(&self) -> f32 {
        self.z_far - self.z_near
    }

    /// Rectangle area in light space
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Non-empty on every axis
    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.bottom < self.top && self.z_near < self.z_far
    }

    /// Whether a light-space point falls inside (edges inclusive)
    pub fn contains(&self, light_space: Vec3) -> bool {
        let depth = -light_space.z;
        light_space.x >= self.left
            && light_space.x <= self.right
            && light_space.y >= self.bottom
            && light_space.y <= self.top
            && depth >= self.z_near
            && depth <= self.z_far
    }

    /// Orthographic projection onto the wgpu clip volume (depth [0, 1])
    pub fn to_projection(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.z_near,
            self.z_far,
        )
    }
}

/// The eight corners of a frustum slice in light space.
///
/// Transient: built and consumed within a single bounds computation.
#[derive(Clone, Copy, Debug)]
pub struct LightSpaceFrustum {
    pub corners: [Vec3; 8],
}

impl LightSpaceFrustum {
    /// Carry world-space corners into light space
    pub fn from_world(corners: &[Vec3; 8], light_view: &Mat4) -> Self {
        Self {
            corners: corners.map(|c| light_view.transform_point3(c)),
        }
    }

    /// Exact component-wise extents of the corners
    pub fn bounds(&self) -> OrthoBounds {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in &self.corners {
            min = min.min(*corner);
            max = max.max(*corner);
        }

        // The light looks down -Z: the largest z is the closest plane
        OrthoBounds {
            left: min.x,
            right: max.x,
            bottom: min.y,
            top: max.y,
            z_near: -max.z,
            z_far: -min.z,
        }
    }
}

/// World-space corners of the camera frustum between two view distances.
///
/// Order: near face then far face, each as (+x,+y), (-x,+y), (+x,-y), (-x,-y).
pub fn frustum_slice_corners(
    camera: &CameraFrustumParams,
    split_near: f32,
    split_far: f32,
) -> [Vec3; 8] {
    let tan_half_v = (camera.fovy * 0.5).tan();
    let tan_half_h = tan_half_v * camera.aspect;

    let inv_view = camera.view.inverse();
    let mut corners = [Vec3::ZERO; 8];

    for (face, depth) in [split_near, split_far].into_iter().enumerate() {
        let x = depth * tan_half_h;
        let y = depth * tan_half_v;
        let view_corners = [
            Vec3::new(x, y, -depth),
            Vec3::new(-x, y, -depth),
            Vec3::new(x, -y, -depth),
            Vec3::new(-x, -y, -depth),
        ];
        for (i, corner) in view_corners.iter().enumerate() {
            corners[face * 4 + i] = inv_view.transform_point3(*corner);
        }
    }

    corners
}

/// Light-space box around the frustum slice `[split_near, split_far]`.
///
/// No bias or snapping is applied; every slice corner lies inside the
/// result with the extremes touching its faces.
pub fn compute_bounds(
    camera: &CameraFrustumParams,
    light_view: &Mat4,
    split_near: f32,
    split_far: f32,
) -> OrthoBounds {
    let world = frustum_slice_corners(camera, split_near, split_far);
    LightSpaceFrustum::from_world(&world, light_view).bounds()
}

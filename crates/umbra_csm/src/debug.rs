//! Frustum debug drawing
//!
//! Collects colored line-list vertices for camera frusta, cascade slices and
//! cascade light boxes. The drawer is an ordinary value owned by whoever
//! wants the overlay; nothing in the cascade pipeline depends on it.
//!
//! # Example
//!
//! ```ignore
//! let mut drawer = FrustumDebugDrawer::new();
//! drawer.draw_cascades(pipeline.sampling_data()?, &camera);
//! queue.write_buffer(&line_buffer, 0, drawer.vertex_bytes());
//! drawer.clear();
//! ```

use glam::{Mat4, Vec3};

use crate::bounds::{frustum_slice_corners, OrthoBounds};
use crate::camera::CameraFrustumParams;
use crate::pipeline::CascadeSet;

/// Per-cascade colors (RGBA): red, green, blue, yellow
pub const CASCADE_COLORS: [[f32; 4]; 4] = [
    [1.0, 0.2, 0.2, 1.0],
    [0.2, 1.0, 0.2, 1.0],
    [0.2, 0.4, 1.0, 1.0],
    [1.0, 1.0, 0.2, 1.0],
];

/// Camera frustum color (RGBA)
pub const CAMERA_COLOR: [f32; 4] = [1.0, 0.5, 0.0, 1.0];

/// One end of a debug line
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DebugLineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Accumulates line-list geometry until cleared
#[derive(Clone, Debug, Default)]
pub struct FrustumDebugDrawer {
    vertices: Vec<DebugLineVertex>,
}

impl FrustumDebugDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color: [f32; 4]) {
        self.vertices.push(DebugLineVertex {
            position: from.to_array(),
            color,
        });
        self.vertices.push(DebugLineVertex {
            position: to.to_array(),
            color,
        });
    }

    /// Outline of a perspective camera frustum
    pub fn draw_perspective_frustum(&mut self, view: &Mat4, projection: &Mat4, color: [f32; 4]) {
        self.draw_clip_volume(&(*projection * *view), color);
    }

    /// Outline of a light-space box seen through `light_view`
    pub fn draw_orthographic_frustum(&mut self, light_view: &Mat4, bounds: &OrthoBounds, color: [f32; 4]) {
        self.draw_clip_volume(&(bounds.to_projection() * *light_view), color);
    }

    /// Outline of the camera frustum between two view distances
    pub fn draw_camera_slice(&mut self, camera: &CameraFrustumParams, near: f32, far: f32, color: [f32; 4]) {
        self.draw_box(&frustum_slice_corners(camera, near, far), color);
    }

    /// Camera slice and light box of every cascade, colored per cascade
    pub fn draw_cascades(&mut self, set: &CascadeSet, camera: &CameraFrustumParams) {
        self.draw_perspective_frustum(&camera.view, &camera.projection(), CAMERA_COLOR);
        for (i, cascade) in set.cascades.iter().enumerate() {
            let color = CASCADE_COLORS[i % CASCADE_COLORS.len()];
            self.draw_camera_slice(camera, cascade.near_depth, cascade.far_depth, color);
            self.draw_orthographic_frustum(&set.light_view, &cascade.bounds, color);
        }
    }

    pub fn vertices(&self) -> &[DebugLineVertex] {
        &self.vertices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn line_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// World-space corners of a clip volume (NDC depth 0..1)
    fn draw_clip_volume(&mut self, view_proj: &Mat4, color: [f32; 4]) {
        let inv = view_proj.inverse();
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let ndc = Vec3::new(
                if i & 1 == 0 { 1.0 } else { -1.0 },
                if i & 2 == 0 { 1.0 } else { -1.0 },
                if i & 4 == 0 { 0.0 } else { 1.0 },
            );
            *corner = inv.project_point3(ndc);
        }
        self.draw_box(&corners, color);
    }

    /// Twelve edges of a box whose corner index bits select x, y and depth
    fn draw_box(&mut self, corners: &[Vec3; 8], color: [f32; 4]) {
        for a in 0..8 {
            for bit in [1, 2, 4] {
                let b = a | bit;
                if b != a {
                    self.draw_line(corners[a], corners[b], color);
                }
            }
        }
    }
}

//! GPU Cascade Data
//!
//! Uniform block read by the shading pass. The layout matches
//! `CascadeUniforms` in `cascade_sampling.wgsl` and is bytemuck Pod for
//! direct upload.

use crate::config::{CascadeConfig, ShadowClampMode, MAX_CASCADES};
use crate::pipeline::CascadeSet;

/// Lookups outside a cascade's map resolve to shadowed
pub const FLAG_BORDER_SHADOWED: u32 = 1 << 0;

/// Lookups outside a cascade's map repeat the edge texel
pub const FLAG_CLAMP_TO_EDGE: u32 = 1 << 1;

/// Split distance slots (`MAX_CASCADES + 1` rounded up to whole vec4s)
pub const SPLIT_SLOTS: usize = 8;

/// Cascade uniforms for the shading pass (304 bytes, 16-byte aligned)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCascadeUniforms {
    /// View-projection matrix per cascade, column-major
    pub view_proj: [[[f32; 4]; 4]; MAX_CASCADES],

    /// `cascade_count + 1` split distances packed into vec4s
    pub splits: [[f32; 4]; 2],

    /// Number of active cascades (0 disables shadowing)
    pub cascade_count: u32,

    /// Seam band width in view distance
    pub blend_distance: f32,

    /// Depth comparison epsilon
    pub depth_epsilon: f32,

    /// `FLAG_*` bits
    pub flags: u32,
}

impl GpuCascadeUniforms {
    /// No cascades; every fragment is lit
    pub fn disabled() -> Self {
        bytemuck::Zeroable::zeroed()
    }

    pub fn is_enabled(&self) -> bool {
        self.cascade_count > 0
    }

    /// Pack a cascade set with the shading settings of `config`
    pub fn from_cascades(set: &CascadeSet, config: &CascadeConfig) -> Self {
        let mut uniforms = Self::disabled();

        for (slot, cascade) in uniforms.view_proj.iter_mut().zip(&set.cascades) {
            *slot = cascade.view_proj.to_cols_array_2d();
        }
        for (i, split) in set.splits.iter().take(SPLIT_SLOTS).enumerate() {
            uniforms.splits[i / 4][i % 4] = *split;
        }

        uniforms.cascade_count = set.cascades.len().min(MAX_CASCADES) as u32;
        uniforms.blend_distance = config.blend_distance;
        uniforms.depth_epsilon = config.depth_epsilon;

        if config.border_shadowed {
            uniforms.flags |= FLAG_BORDER_SHADOWED;
        }
        if config.clamp_mode == ShadowClampMode::Edge {
            uniforms.flags |= FLAG_CLAMP_TO_EDGE;
        }

        uniforms
    }

    /// Split distance `i` (0 is the camera near plane)
    pub fn split(&self, i: usize) -> f32 {
        self.splits[i / 4][i % 4]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for GpuCascadeUniforms {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::OrthoBounds;
    use crate::pipeline::Cascade;
    use glam::{Mat4, Vec2};

    fn cascade(near: f32, far: f32, scale: f32) -> Cascade {
        Cascade {
            near_depth: near,
            far_depth: far,
            bounds: OrthoBounds {
                left: -1.0,
                right: 1.0,
                bottom: -1.0,
                top: 1.0,
                z_near: 0.0,
                z_far: 1.0,
            },
            projection: Mat4::from_scale(glam::Vec3::splat(scale)),
            view_proj: Mat4::from_scale(glam::Vec3::splat(scale)),
            texel_size: Vec2::ONE,
        }
    }

    #[test]
    fn test_uniform_size_and_alignment() {
        assert_eq!(std::mem::size_of::<GpuCascadeUniforms>(), 304);
        assert_eq!(std::mem::size_of::<GpuCascadeUniforms>() % 16, 0);
        assert_eq!(std::mem::offset_of!(GpuCascadeUniforms, splits), 256);
        assert_eq!(std::mem::offset_of!(GpuCascadeUniforms, cascade_count), 288);
    }

    #[test]
    fn test_disabled() {
        let uniforms = GpuCascadeUniforms::disabled();
        assert!(!uniforms.is_enabled());
        assert!(uniforms.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_from_cascades() {
        let set = CascadeSet {
            splits: vec![5.0, 400.0, 1000.0, 2000.0],
            light_view: Mat4::IDENTITY,
            cascades: vec![
                cascade(5.0, 400.0, 1.0),
                cascade(400.0, 1000.0, 2.0),
                cascade(1000.0, 2000.0, 3.0),
            ],
        };
        let config = CascadeConfig {
            border_shadowed: true,
            ..Default::default()
        };
        let uniforms = GpuCascadeUniforms::from_cascades(&set, &config);

        assert_eq!(uniforms.cascade_count, 3);
        assert_eq!(uniforms.split(0), 5.0);
        assert_eq!(uniforms.split(3), 2000.0);
        assert_eq!(uniforms.split(4), 0.0);
        assert_eq!(uniforms.view_proj[1][0][0], 2.0);
        assert_eq!(uniforms.view_proj[3], [[0.0; 4]; 4]);
        assert_eq!(uniforms.blend_distance, 20.0);
        assert_eq!(uniforms.flags, FLAG_BORDER_SHADOWED);
    }

    #[test]
    fn test_edge_clamp_flag() {
        let set = CascadeSet {
            splits: vec![1.0, 10.0],
            light_view: Mat4::IDENTITY,
            cascades: vec![cascade(1.0, 10.0, 1.0)],
        };
        let config = CascadeConfig {
            clamp_mode: ShadowClampMode::Edge,
            ..Default::default()
        };
        let uniforms = GpuCascadeUniforms::from_cascades(&set, &config);
        assert_eq!(uniforms.flags, FLAG_CLAMP_TO_EDGE);
    }
}

//! Cascade sampling reference
//!
//! CPU rendition of what `cascade_sampling.wgsl` does per fragment: pick
//! the cascade by view depth, project into its shadow map, compare depths,
//! and blend across cascade seams. The shader and this module consume the
//! same [`GpuCascadeUniforms`], so tests here pin down the shader contract.

use glam::{Mat4, Vec2, Vec3};

use crate::config::MAX_CASCADES;
use crate::data::{GpuCascadeUniforms, FLAG_BORDER_SHADOWED, FLAG_CLAMP_TO_EDGE};

/// Cascades contributing to a fragment and the weight of the upper one
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeamBlend {
    pub lower: usize,
    pub upper: usize,
    /// 0 uses `lower` only, 1 uses `upper` only
    pub t: f32,
}

/// Cascade whose interval holds `depth`.
///
/// Intervals are half-open `[splits[i], splits[i + 1])` except the last,
/// which also includes the far plane. Depths outside `[near, far]` select
/// nothing.
pub fn select_cascade(splits: &[f32], depth: f32) -> Option<usize> {
    let count = splits.len().checked_sub(1)?;
    if count == 0 || !depth.is_finite() || depth < splits[0] || depth > splits[count] {
        return None;
    }
    (0..count)
        .find(|&i| depth < splits[i + 1])
        .or(Some(count - 1))
}

/// Cascade pair and weight for `depth`, blending linearly over a band of
/// `blend_distance` centered on each interior split.
pub fn seam_blend(splits: &[f32], depth: f32, blend_distance: f32) -> Option<SeamBlend> {
    let i = select_cascade(splits, depth)?;
    let count = splits.len() - 1;
    let half = blend_distance * 0.5;

    let band = |lower: usize, boundary: f32| SeamBlend {
        lower,
        upper: lower + 1,
        t: ((depth - (boundary - half)) / blend_distance).clamp(0.0, 1.0),
    };

    if half > 0.0 {
        if i > 0 && depth < splits[i] + half {
            return Some(band(i - 1, splits[i]));
        }
        if i + 1 < count && depth >= splits[i + 1] - half {
            return Some(band(i, splits[i + 1]));
        }
    }

    Some(SeamBlend {
        lower: i,
        upper: i,
        t: 0.0,
    })
}

/// 1.0 when the fragment is at or in front of the stored occluder depth
pub fn shadow_test(fragment_depth: f32, stored_depth: f32, epsilon: f32) -> f32 {
    if fragment_depth <= stored_depth + epsilon {
        1.0
    } else {
        0.0
    }
}

/// Shadow-map coordinates of a world point: texture uv in xy (v grows
/// downwards) and depth in z.
pub fn project_to_shadow_map(view_proj: &Mat4, world: Vec3) -> Vec3 {
    let ndc = view_proj.project_point3(world);
    Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z)
}

/// Shadow factor for one fragment (1 lit, 0 shadowed).
///
/// `lookup(layer, uv)` returns the stored depth of a cascade's map at a uv
/// inside `[0, 1]`.
pub fn sample_shadow<F>(
    uniforms: &GpuCascadeUniforms,
    world: Vec3,
    view_depth: f32,
    mut lookup: F,
) -> f32
where
    F: FnMut(usize, Vec2) -> f32,
{
    let count = (uniforms.cascade_count as usize).min(MAX_CASCADES);
    if count == 0 {
        return 1.0;
    }

    let mut splits = [0.0; MAX_CASCADES + 1];
    for (i, split) in splits.iter_mut().enumerate().take(count + 1) {
        *split = uniforms.split(i);
    }

    let Some(blend) = seam_blend(&splits[..=count], view_depth, uniforms.blend_distance) else {
        return 1.0;
    };

    let mut cascade_shadow = |layer: usize| {
        let view_proj = Mat4::from_cols_array_2d(&uniforms.view_proj[layer]);
        let coord = project_to_shadow_map(&view_proj, world);
        let inside = (0.0..=1.0).contains(&coord.x)
            && (0.0..=1.0).contains(&coord.y)
            && (0.0..=1.0).contains(&coord.z);

        if !inside && uniforms.flags & FLAG_CLAMP_TO_EDGE == 0 {
            return if uniforms.flags & FLAG_BORDER_SHADOWED != 0 {
                0.0
            } else {
                1.0
            };
        }

        let coord = coord.clamp(Vec3::ZERO, Vec3::ONE);
        let stored = lookup(layer, Vec2::new(coord.x, coord.y));
        shadow_test(coord.z, stored, uniforms.depth_epsilon)
    };

    let lower = cascade_shadow(blend.lower);
    if blend.upper == blend.lower || blend.t <= 0.0 {
        return lower;
    }
    let upper = cascade_shadow(blend.upper);
    lower + (upper - lower) * blend.t
}

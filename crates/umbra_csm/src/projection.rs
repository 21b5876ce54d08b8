//! Cascade projection building
//!
//! Turns raw light-space bounds into the orthographic projection a cascade
//! renders with: a depth margin so casters outside the slice are not
//! clipped, then optional snapping of the rectangle to the shadow-map texel
//! grid so shadow edges do not crawl while the camera moves.

use glam::{Mat4, Vec2};

use crate::bounds::OrthoBounds;

/// Mantissa bits below the top three that get rounded away from texel steps
const STEP_MANTISSA_MASK: u32 = (1 << 20) - 1;

/// Output of a projection build
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeProjection {
    /// Biased (and possibly snapped) extents
    pub bounds: OrthoBounds,
    /// Orthographic projection of `bounds`
    pub projection: Mat4,
    /// World units covered by one shadow-map texel on each axis
    pub texel_size: Vec2,
}

/// Builds cascade projections with a fixed bias and snapping policy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeProjectionBuilder {
    bias: f32,
    texel_snap: Option<u32>,
}

impl CascadeProjectionBuilder {
    pub fn new(bias: f32, texel_snap: Option<u32>) -> Self {
        Self { bias, texel_snap }
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn texel_snap(&self) -> Option<u32> {
        self.texel_snap
    }

    pub fn build(&self, bounds: &OrthoBounds) -> CascadeProjection {
        let biased = apply_depth_bias(bounds, self.bias);

        let (bounds, texel_size) = match self.texel_snap {
            Some(resolution) => {
                let snapped = snap_to_texel_grid(&biased, resolution);
                let texel = Vec2::new(
                    snapped.width() / resolution as f32,
                    snapped.height() / resolution as f32,
                );
                (snapped, texel)
            }
            None => (biased, Vec2::ZERO),
        };

        CascadeProjection {
            bounds,
            projection: bounds.to_projection(),
            texel_size,
        }
    }
}

/// Bias, snap and project in one call
pub fn build_projection(
    bounds: &OrthoBounds,
    bias: f32,
    texel_snap: Option<u32>,
) -> (OrthoBounds, Mat4) {
    let built = CascadeProjectionBuilder::new(bias, texel_snap).build(bounds);
    (built.bounds, built.projection)
}

/// Push the far plane away and pull the near plane closer by `bias`
pub fn apply_depth_bias(bounds: &OrthoBounds, bias: f32) -> OrthoBounds {
    OrthoBounds {
        z_near: bounds.z_near - bias,
        z_far: bounds.z_far + bias,
        ..*bounds
    }
}

/// Quantize the light-space rectangle to a grid of one texel.
///
/// The step is sized with one spare texel and rounded up to four significant
/// bits, so small changes in the extents leave it bit-identical. The low
/// edge is floored to the grid and the high edge sits exactly `resolution`
/// steps further, which keeps the raw rectangle covered.
pub fn snap_to_texel_grid(bounds: &OrthoBounds, resolution: u32) -> OrthoBounds {
    let (left, right) = snap_axis(bounds.left, bounds.right, resolution);
    let (bottom, top) = snap_axis(bounds.bottom, bounds.top, resolution);
    OrthoBounds {
        left,
        right,
        bottom,
        top,
        ..*bounds
    }
}

fn snap_axis(min: f32, max: f32, resolution: u32) -> (f32, f32) {
    let texels = resolution.max(2) as f32;
    let step = quantize_step((max - min) / (texels - 1.0));
    let low = (min / step).floor() * step;
    (low, low + step * texels)
}

/// Round a positive step up so only its top four significant bits remain
fn quantize_step(step: f32) -> f32 {
    let bits = step.to_bits();
    if bits & STEP_MANTISSA_MASK == 0 {
        return step;
    }
    f32::from_bits((bits | STEP_MANTISSA_MASK) + 1)
}

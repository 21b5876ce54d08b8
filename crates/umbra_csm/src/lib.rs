//! # umbra_csm - Cascaded Shadow Map Core
//!
//! CPU side of directional cascaded shadow mapping for a single sun-like
//! light:
//! - Frustum splitting into contiguous depth ranges
//! - Tight light-space bounds per cascade
//! - Biased, texel-snapped orthographic projections
//! - Per-frame stage tracking from splits to sampling
//! - GPU uniform packing and a CPU reference of the sampling shader
//!
//! ## Architecture
//!
//! 1. **Split**: `FrustumSplitter` divides `[near, far]` into N intervals
//! 2. **Bounds**: `compute_bounds` fits each camera slice in light space
//! 3. **Projection**: `CascadeProjectionBuilder` biases and snaps the box
//! 4. **Pipeline**: `CascadePipeline` runs 1-3 per frame and gates the
//!    depth passes and the shading pass on the frame stage
//!
//! GPU storage and depth-pass submission live in `umbra_gpu`.
//!
//! ## Example
//!
//! ```ignore
//! use umbra_csm::prelude::*;
//!
//! let mut pipeline = CascadePipeline::new(CascadeConfig::load("shadows.toml")?)?;
//!
//! // Per frame
//! let camera = CameraFrustumParams::from_viewport(view, fovy, width, height, 5.0, 2000.0);
//! let light = DirectionalLight::new(Vec3::new(0.3, -1.0, 0.2))?;
//! match pipeline.update(&camera, &light)? {
//!     FrameStatus::Updated | FrameStatus::Reused(_) => { /* render cascades */ }
//!     FrameStatus::Skipped(_) => { /* no shadows this frame */ }
//! }
//! ```
//!
//! # Hot-Reload Support
//!
//! `CascadeConfig` is serde-serializable; build a new pipeline from a
//! reloaded config and resize the GPU store if the resolution changed.

pub mod error;
pub mod config;
pub mod camera;
pub mod split;
pub mod bounds;
pub mod projection;
pub mod pipeline;
pub mod data;
pub mod sampler;
pub mod debug;

// Re-exports
pub use error::{Result, ShadowError};

pub use config::{
    CascadeConfig,
    PolygonOffset,
    ShadowClampMode,
    SplitScheme,
    MAX_CASCADES,
    MAX_RESOLUTION,
    MIN_RESOLUTION,
};

pub use camera::{CameraFrustumParams, DirectionalLight};

pub use split::FrustumSplitter;

pub use bounds::{compute_bounds, frustum_slice_corners, LightSpaceFrustum, OrthoBounds};

pub use projection::{
    apply_depth_bias,
    build_projection,
    snap_to_texel_grid,
    CascadeProjection,
    CascadeProjectionBuilder,
};

pub use pipeline::{Cascade, CascadePipeline, CascadeSet, FrameStage, FrameStatus};

pub use data::GpuCascadeUniforms;

pub use sampler::{project_to_shadow_map, sample_shadow, seam_blend, select_cascade, shadow_test, SeamBlend};

pub use debug::{DebugLineVertex, FrustumDebugDrawer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CameraFrustumParams,
        Cascade,
        CascadeConfig,
        CascadePipeline,
        CascadeSet,
        DirectionalLight,
        FrameStage,
        FrameStatus,
        GpuCascadeUniforms,
        ShadowError,
    };
    pub use glam::{Mat4, Vec3};
}

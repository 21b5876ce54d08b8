//! # umbra_gpu - Cascaded Shadow Map GPU Storage
//!
//! wgpu side of `umbra_csm`:
//! - `ShadowCascadeStore`: depth array texture, per-layer pass targets,
//!   comparison sampler and cascade uniforms
//! - `render_cascades`: ordered depth-only pass per cascade
//! - `CASCADE_SAMPLING_WGSL`: shading-side sampling functions
//!
//! ## Example
//!
//! ```ignore
//! let mut store = ShadowCascadeStore::init(&device, pipeline.config())?;
//! let layout = ShadowCascadeStore::bind_group_layout(&device);
//! let mut bind_group = store.bind_for_read(&device, &layout)?;
//!
//! // Per frame
//! pipeline.update(&camera, &light)?;
//! if pipeline.cascades().is_some() {
//!     render_cascades(&mut pipeline, &store, &queue, &mut encoder, &mut scene)?;
//! }
//!
//! // After a resize, rebuild the bind group
//! store.resize(&device, 2048)?;
//! bind_group = store.bind_for_read(&device, &layout)?;
//!
//! // Shutdown
//! store.deinit()?;
//! ```

pub mod store;
pub mod pass;

pub use store::{ShadowCascadeStore, SHADOW_COMPARE, SHADOW_DEPTH_FORMAT, UNIFORM_SIZE};
pub use pass::{render_cascades, ShadowCasterRenderer};

/// Bind group index the sampling shader expects the store at
pub const SHADOW_BIND_GROUP: u32 = 3;

/// Sampling functions for the shading pass; prepend to a fragment shader
pub const CASCADE_SAMPLING_WGSL: &str = include_str!("shaders/cascade_sampling.wgsl");

//! Cascade depth passes
//!
//! Walks each cascade through its depth-only pass in order and hands the
//! pass to the scene's caster renderer, then publishes the uniforms the
//! shading pass samples with.

use glam::Mat4;
use wgpu::{CommandEncoder, Queue, RenderPass};

use umbra_csm::{Cascade, CascadePipeline, Result, ShadowError};

use crate::store::ShadowCascadeStore;

/// Scene geometry renderer for the depth-only passes.
///
/// Implementors bind a pipeline built with
/// [`ShadowCascadeStore::depth_stencil_state`] and draw every caster with
/// `cascade.view_proj`.
pub trait ShadowCasterRenderer {
    fn draw_shadow_casters(
        &mut self,
        pass: &mut RenderPass<'_>,
        cascade_index: usize,
        cascade: &Cascade,
        light_view: &Mat4,
    );
}

/// Record the depth pass of every cascade and upload the shading uniforms.
///
/// `pipeline` must have built (or reused) this frame's projections; on
/// success it is ready for sampling.
pub fn render_cascades(
    pipeline: &mut CascadePipeline,
    store: &ShadowCascadeStore,
    queue: &Queue,
    encoder: &mut CommandEncoder,
    casters: &mut dyn ShadowCasterRenderer,
) -> Result<()> {
    let count = pipeline.config().count();
    if store.layer_count() as usize != count {
        return Err(ShadowError::InvalidConfiguration(format!(
            "store holds {} layers but the pipeline renders {} cascades",
            store.layer_count(),
            count
        )));
    }

    let light_view = match pipeline.cascades() {
        Some(set) => set.light_view,
        None => {
            return Err(ShadowError::StageOrder {
                expected: "ProjectionsBuilt",
                found: pipeline.stage(),
            })
        }
    };

    for index in 0..count {
        let cascade = *pipeline.begin_cascade(index)?;
        {
            let mut pass = store.bind_for_write(encoder, index)?;
            casters.draw_shadow_casters(&mut pass, index, &cascade, &light_view);
        }
        pipeline.finish_cascade(index)?;
        log::trace!("Cascade {index} depth pass recorded");
    }

    store.write_uniforms(queue, &pipeline.gpu_uniforms()?)
}

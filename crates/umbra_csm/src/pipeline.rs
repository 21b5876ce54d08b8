//! Per-frame cascade pipeline
//!
//! Drives splits, bounds and projections for every cascade and tracks the
//! frame through its stages:
//!
//! ```text
//! Idle -> SplitsComputed -> BoundsComputed(1..N) -> ProjectionsBuilt(1..N)
//!      -> CascadesRendered(1..N) -> ReadyForSampling
//! ```
//!
//! The CPU stages run inside [`CascadePipeline::update`]; the GPU side
//! reports each cascade's depth pass with `begin_cascade`/`finish_cascade`.
//! A stage can never be skipped or repeated.

use glam::Mat4;

use crate::bounds::{compute_bounds, OrthoBounds};
use crate::camera::{CameraFrustumParams, DirectionalLight};
use crate::config::CascadeConfig;
use crate::data::GpuCascadeUniforms;
use crate::error::{Result, ShadowError};
use crate::projection::CascadeProjectionBuilder;
use crate::split::FrustumSplitter;

/// One orthographic shadow slice
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cascade {
    /// View distance where this cascade starts
    pub near_depth: f32,
    /// View distance where this cascade ends
    pub far_depth: f32,
    /// Biased, snapped light-space extents
    pub bounds: OrthoBounds,
    /// Orthographic projection of `bounds`
    pub projection: Mat4,
    /// `projection * light_view`, shared by the depth pass and shading
    pub view_proj: Mat4,
    /// World units per shadow-map texel (x, y)
    pub texel_size: glam::Vec2,
}

/// Every cascade of one frame plus the data they share
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeSet {
    /// `count + 1` split distances from camera near to camera far
    pub splits: Vec<f32>,
    /// Light view the projections were built in
    pub light_view: Mat4,
    pub cascades: Vec<Cascade>,
}

impl CascadeSet {
    pub fn len(&self) -> usize {
        self.cascades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cascades.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Cascade> {
        self.cascades.get(index).ok_or(ShadowError::CascadeOutOfRange {
            index,
            count: self.cascades.len(),
        })
    }
}

/// Where the current frame stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    SplitsComputed,
    /// Bounds computed for this many cascades
    BoundsComputed(usize),
    /// Projections built for this many cascades
    ProjectionsBuilt(usize),
    /// Depth passes finished for this many cascades
    CascadesRendered(usize),
    ReadyForSampling,
}

impl FrameStage {
    /// The only stage allowed after this one for `count` cascades
    pub fn successor(self, count: usize) -> Self {
        match self {
            Self::Idle => Self::SplitsComputed,
            Self::SplitsComputed => Self::BoundsComputed(1),
            Self::BoundsComputed(n) if n < count => Self::BoundsComputed(n + 1),
            Self::BoundsComputed(_) => Self::ProjectionsBuilt(1),
            Self::ProjectionsBuilt(n) if n < count => Self::ProjectionsBuilt(n + 1),
            Self::ProjectionsBuilt(_) => Self::CascadesRendered(1),
            Self::CascadesRendered(n) if n < count => Self::CascadesRendered(n + 1),
            Self::CascadesRendered(_) => Self::ReadyForSampling,
            Self::ReadyForSampling => Self::Idle,
        }
    }
}

/// Outcome of a frame update
#[derive(Debug)]
pub enum FrameStatus {
    /// Fresh cascades were built
    Updated,
    /// Inputs were unusable; last frame's cascades stay in use
    Reused(ShadowError),
    /// Inputs were unusable and no earlier cascades exist
    Skipped(ShadowError),
}

impl FrameStatus {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

/// Owns the cascade configuration and the current frame's cascades
#[derive(Debug)]
pub struct CascadePipeline {
    config: CascadeConfig,
    splitter: FrustumSplitter,
    builder: CascadeProjectionBuilder,
    current: Option<CascadeSet>,
    stage: FrameStage,
    frame: u64,
}

impl CascadePipeline {
    /// Validate the configuration and set up an idle pipeline
    pub fn new(config: CascadeConfig) -> Result<Self> {
        config.validate()?;

        let splitter = FrustumSplitter::new(config.split_scheme.clone());
        let builder = CascadeProjectionBuilder::new(
            config.depth_margin,
            config.texel_snap.then_some(config.resolution),
        );

        log::info!(
            "Cascade pipeline: {} cascades at {}x{}, scheme {:?}",
            config.cascade_count,
            config.resolution,
            config.resolution,
            config.split_scheme
        );

        Ok(Self {
            config,
            splitter,
            builder,
            current: None,
            stage: FrameStage::Idle,
            frame: 0,
        })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Accepted `update` calls so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Cascades of the current frame (possibly reused), at any stage
    pub fn cascades(&self) -> Option<&CascadeSet> {
        self.current.as_ref()
    }

    /// Rebuild every cascade for this frame's camera and light.
    ///
    /// Unusable camera or light input is logged and reported through the
    /// returned status; the previous cascades are kept. Errors are returned
    /// only for stage violations.
    pub fn update(
        &mut self,
        camera: &CameraFrustumParams,
        light: &DirectionalLight,
    ) -> Result<FrameStatus> {
        match self.stage {
            FrameStage::Idle => {}
            FrameStage::ReadyForSampling => self.advance(FrameStage::Idle)?,
            found => {
                return Err(ShadowError::StageOrder {
                    expected: "Idle or ReadyForSampling",
                    found,
                })
            }
        }
        self.frame += 1;

        match self.build(camera, light) {
            Ok(set) => {
                log::debug!(
                    "Frame {}: cascades rebuilt, splits {:?}",
                    self.frame,
                    set.splits
                );
                self.current = Some(set);
                Ok(FrameStatus::Updated)
            }
            // Breakpoints outside this frame's clip range are a per-frame problem
            Err(err @ ShadowError::InvalidConfiguration(_)) => self.recover(err),
            Err(err) if err.is_recoverable() => self.recover(err),
            Err(err) => Err(err),
        }
    }

    fn build(
        &mut self,
        camera: &CameraFrustumParams,
        light: &DirectionalLight,
    ) -> Result<CascadeSet> {
        camera.validate()?;
        let light = DirectionalLight::new(light.direction)?;

        let count = self.config.count();
        let splits = self.splitter.compute_splits(camera.near, camera.far, count)?;
        self.advance(FrameStage::SplitsComputed)?;

        let light_view = light.view_matrix();
        let overlap = self.config.blend_distance * 0.5;

        let mut raw_bounds = Vec::with_capacity(count);
        for i in 0..count {
            // Widen interior edges so both cascades of a seam band cover it
            let near = (splits[i] - overlap).max(camera.near);
            let far = (splits[i + 1] + overlap).min(camera.far);
            let bounds = compute_bounds(camera, &light_view, near, far);
            log::trace!("Cascade {i} raw bounds {bounds:?}");
            raw_bounds.push(bounds);
            self.advance(FrameStage::BoundsComputed(i + 1))?;
        }

        let mut cascades = Vec::with_capacity(count);
        for (i, bounds) in raw_bounds.iter().enumerate() {
            let built = self.builder.build(bounds);
            cascades.push(Cascade {
                near_depth: splits[i],
                far_depth: splits[i + 1],
                bounds: built.bounds,
                projection: built.projection,
                view_proj: built.projection * light_view,
                texel_size: built.texel_size,
            });
            self.advance(FrameStage::ProjectionsBuilt(i + 1))?;
        }

        Ok(CascadeSet {
            splits,
            light_view,
            cascades,
        })
    }

    /// Fall back to last-known-good cascades after a bad frame
    fn recover(&mut self, err: ShadowError) -> Result<FrameStatus> {
        self.stage = FrameStage::Idle;
        match &self.current {
            Some(set) => {
                log::warn!("Shadow update skipped, reusing previous cascades: {err}");
                self.stage = FrameStage::ProjectionsBuilt(set.len());
                Ok(FrameStatus::Reused(err))
            }
            None => {
                log::warn!("Shadow update skipped, no cascades available yet: {err}");
                Ok(FrameStatus::Skipped(err))
            }
        }
    }

    /// Cascade about to receive its depth pass
    pub fn begin_cascade(&self, index: usize) -> Result<&Cascade> {
        let set = self.current.as_ref().ok_or(ShadowError::StageOrder {
            expected: "ProjectionsBuilt",
            found: self.stage,
        })?;
        let cascade = set.get(index)?;

        let ready = match self.stage {
            FrameStage::ProjectionsBuilt(n) => index == 0 && n == set.len(),
            FrameStage::CascadesRendered(n) => index == n,
            _ => false,
        };
        if !ready {
            return Err(ShadowError::StageOrder {
                expected: "the previous cascade's depth pass",
                found: self.stage,
            });
        }
        Ok(cascade)
    }

    /// Record that a cascade's depth pass has been encoded
    pub fn finish_cascade(&mut self, index: usize) -> Result<()> {
        self.begin_cascade(index)?;
        self.advance(FrameStage::CascadesRendered(index + 1))?;
        if index + 1 == self.config.count() {
            self.advance(FrameStage::ReadyForSampling)?;
        }
        Ok(())
    }

    /// Cascades for the shading pass; only once every depth pass is done
    pub fn sampling_data(&self) -> Result<&CascadeSet> {
        match (&self.current, self.stage) {
            (Some(set), FrameStage::ReadyForSampling) => Ok(set),
            (_, found) => Err(ShadowError::StageOrder {
                expected: "ReadyForSampling",
                found,
            }),
        }
    }

    /// Uniform block for the shading pass
    pub fn gpu_uniforms(&self) -> Result<GpuCascadeUniforms> {
        let set = self.sampling_data()?;
        Ok(GpuCascadeUniforms::from_cascades(set, &self.config))
    }

    fn advance(&mut self, next: FrameStage) -> Result<()> {
        let expected = self.stage.successor(self.config.count());
        if next != expected {
            return Err(ShadowError::StageOrder {
                expected: stage_name(expected),
                found: self.stage,
            });
        }
        self.stage = next;
        Ok(())
    }
}

fn stage_name(stage: FrameStage) -> &'static str {
    match stage {
        FrameStage::Idle => "Idle",
        FrameStage::SplitsComputed => "SplitsComputed",
        FrameStage::BoundsComputed(_) => "BoundsComputed",
        FrameStage::ProjectionsBuilt(_) => "ProjectionsBuilt",
        FrameStage::CascadesRendered(_) => "CascadesRendered",
        FrameStage::ReadyForSampling => "ReadyForSampling",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn camera() -> CameraFrustumParams {
        let view = Mat4::look_at_rh(Vec3::new(-70.0, 50.0, 70.0), Vec3::ZERO, Vec3::Y);
        CameraFrustumParams::new(view, 45f32.to_radians(), 16.0 / 9.0, 5.0, 2000.0)
    }

    fn sun() -> DirectionalLight {
        DirectionalLight::new(Vec3::new(0.3, -1.0, 0.2)).unwrap()
    }

    fn render_all(pipeline: &mut CascadePipeline) {
        for i in 0..pipeline.config().count() {
            pipeline.begin_cascade(i).unwrap();
            pipeline.finish_cascade(i).unwrap();
        }
    }

    #[test]
    fn test_stage_successors() {
        let mut stage = FrameStage::Idle;
        let mut seen = vec![stage];
        while stage != FrameStage::ReadyForSampling {
            stage = stage.successor(2);
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                FrameStage::Idle,
                FrameStage::SplitsComputed,
                FrameStage::BoundsComputed(1),
                FrameStage::BoundsComputed(2),
                FrameStage::ProjectionsBuilt(1),
                FrameStage::ProjectionsBuilt(2),
                FrameStage::CascadesRendered(1),
                FrameStage::CascadesRendered(2),
                FrameStage::ReadyForSampling,
            ]
        );
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = CascadeConfig {
            cascade_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            CascadePipeline::new(config),
            Err(ShadowError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_full_frame() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        assert_eq!(pipeline.stage(), FrameStage::Idle);

        let status = pipeline.update(&camera(), &sun()).unwrap();
        assert!(status.is_updated());
        assert_eq!(pipeline.stage(), FrameStage::ProjectionsBuilt(3));

        // Shading must wait for the depth passes
        assert!(pipeline.sampling_data().is_err());

        render_all(&mut pipeline);
        assert_eq!(pipeline.stage(), FrameStage::ReadyForSampling);

        let set = pipeline.sampling_data().unwrap();
        assert_eq!(set.splits, vec![5.0, 400.0, 1000.0, 2000.0]);
        assert_eq!(set.len(), 3);
        for (i, cascade) in set.cascades.iter().enumerate() {
            assert_eq!(cascade.near_depth, set.splits[i]);
            assert_eq!(cascade.far_depth, set.splits[i + 1]);
            assert!(cascade.bounds.is_valid());
            assert_eq!(cascade.view_proj, cascade.projection * set.light_view);
        }
    }

    #[test]
    fn test_cascades_rendered_in_order() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        pipeline.update(&camera(), &sun()).unwrap();

        assert!(pipeline.begin_cascade(1).is_err());
        assert!(pipeline.finish_cascade(2).is_err());
        assert!(matches!(
            pipeline.begin_cascade(7),
            Err(ShadowError::CascadeOutOfRange { index: 7, count: 3 })
        ));

        pipeline.finish_cascade(0).unwrap();
        assert!(pipeline.finish_cascade(0).is_err());
        assert_eq!(pipeline.stage(), FrameStage::CascadesRendered(1));
    }

    #[test]
    fn test_update_before_render_is_rejected() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        pipeline.update(&camera(), &sun()).unwrap();
        assert!(matches!(
            pipeline.update(&camera(), &sun()),
            Err(ShadowError::StageOrder { .. })
        ));
    }

    #[test]
    fn test_degenerate_camera_reuses_previous() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        pipeline.update(&camera(), &sun()).unwrap();
        render_all(&mut pipeline);
        let before = pipeline.cascades().cloned().unwrap();

        let broken = CameraFrustumParams {
            aspect: f32::INFINITY,
            ..camera()
        };
        let status = pipeline.update(&broken, &sun()).unwrap();
        assert!(matches!(status, FrameStatus::Reused(ShadowError::DegenerateCamera(_))));
        assert_eq!(pipeline.stage(), FrameStage::ProjectionsBuilt(3));
        assert_eq!(pipeline.cascades(), Some(&before));

        // The reused cascades still go through the depth passes
        render_all(&mut pipeline);
        assert_eq!(pipeline.sampling_data().unwrap(), &before);
    }

    #[test]
    fn test_degenerate_first_frame_is_skipped() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        let broken = CameraFrustumParams {
            near: 3000.0,
            ..camera()
        };
        let status = pipeline.update(&broken, &sun()).unwrap();
        assert!(matches!(status, FrameStatus::Skipped(_)));
        assert_eq!(pipeline.stage(), FrameStage::Idle);
        assert!(pipeline.cascades().is_none());
        assert!(pipeline.begin_cascade(0).is_err());

        // Next good frame proceeds normally
        assert!(pipeline.update(&camera(), &sun()).unwrap().is_updated());
    }

    #[test]
    fn test_zero_light_is_recoverable() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        let light = DirectionalLight {
            direction: Vec3::ZERO,
        };
        let status = pipeline.update(&camera(), &light).unwrap();
        assert!(matches!(status, FrameStatus::Skipped(ShadowError::DegenerateLight(_))));
    }

    #[test]
    fn test_far_plane_inside_breakpoints_is_skipped() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        let short = CameraFrustumParams {
            far: 900.0,
            ..camera()
        };
        let status = pipeline.update(&short, &sun()).unwrap();
        assert!(matches!(status, FrameStatus::Skipped(ShadowError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_deterministic_projections() {
        let mut a = CascadePipeline::new(CascadeConfig::default()).unwrap();
        let mut b = CascadePipeline::new(CascadeConfig::default()).unwrap();
        a.update(&camera(), &sun()).unwrap();
        b.update(&camera(), &sun()).unwrap();

        let (sa, sb) = (a.cascades().unwrap(), b.cascades().unwrap());
        for (ca, cb) in sa.cascades.iter().zip(&sb.cascades) {
            assert_eq!(ca.view_proj.to_cols_array(), cb.view_proj.to_cols_array());
        }
    }

    #[test]
    fn test_uniforms_require_ready_stage() {
        let mut pipeline = CascadePipeline::new(CascadeConfig::default()).unwrap();
        pipeline.update(&camera(), &sun()).unwrap();
        assert!(pipeline.gpu_uniforms().is_err());

        render_all(&mut pipeline);
        let uniforms = pipeline.gpu_uniforms().unwrap();
        assert_eq!(uniforms.cascade_count, 3);
    }
}

//! Shadow cascade storage
//!
//! One `Depth32Float` 2D array texture with a layer per cascade. Each layer
//! has its own view used as the depth attachment of that cascade's pass; a
//! single array view, a comparison sampler and the cascade uniform buffer
//! are exposed to the shading pass as one bind group.
//!
//! The store has an explicit lifecycle: `init`, any number of `resize`
//! calls, then `deinit`. Every other call after `deinit` fails with
//! `ShadowError::StoreReleased`.

use std::num::NonZeroU64;

use wgpu::*;

use umbra_csm::{
    CascadeConfig, GpuCascadeUniforms, PolygonOffset, Result, ShadowClampMode, ShadowError,
    MAX_RESOLUTION, MIN_RESOLUTION,
};

/// Depth format of every cascade layer
pub const SHADOW_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Depth test used by the caster pipeline and the comparison sampler
pub const SHADOW_COMPARE: CompareFunction = CompareFunction::LessEqual;

/// Size of the cascade uniform block
pub const UNIFORM_SIZE: u64 = std::mem::size_of::<GpuCascadeUniforms>() as u64;

/// GPU objects alive between `init` and `deinit`
#[derive(Debug)]
struct StoreResources {
    texture: Texture,
    layer_views: Vec<TextureView>,
    array_view: TextureView,
    sampler: Sampler,
    uniform_buffer: Buffer,
}

/// Sole owner of the cascade depth array and its bindings
#[derive(Debug)]
pub struct ShadowCascadeStore {
    resources: Option<StoreResources>,
    resolution: u32,
    layer_count: u32,
    clamp_mode: ShadowClampMode,
    border_shadowed: bool,
    hardware_pcf: bool,
    polygon_offset: Option<PolygonOffset>,
    generation: u64,
}

impl ShadowCascadeStore {
    /// Allocate storage for `config.cascade_count` layers at
    /// `config.resolution`.
    ///
    /// Fails with `ResourceAllocation` when the device cannot hold the
    /// array or reports an error while creating it.
    pub fn init(device: &Device, config: &CascadeConfig) -> Result<Self> {
        config.validate()?;

        let mut clamp_mode = config.clamp_mode;
        if clamp_mode == ShadowClampMode::Border
            && !device.features().contains(Features::ADDRESS_MODE_CLAMP_TO_BORDER)
        {
            log::warn!("Device lacks ADDRESS_MODE_CLAMP_TO_BORDER, shadow sampler clamps to edge");
            clamp_mode = ShadowClampMode::Edge;
        }

        let mut store = Self {
            resources: None,
            resolution: config.resolution,
            layer_count: config.cascade_count,
            clamp_mode,
            border_shadowed: config.border_shadowed,
            hardware_pcf: config.hardware_pcf,
            polygon_offset: config.polygon_offset,
            generation: 0,
        };
        store.resources = Some(store.allocate(device)?);

        log::info!(
            "Shadow cascade store: {} layers at {}x{} ({:?} clamp)",
            store.layer_count,
            store.resolution,
            store.resolution,
            store.clamp_mode
        );
        Ok(store)
    }

    /// Reallocate every layer at a new resolution.
    ///
    /// Must not be called while a cascade pass is being recorded; bind
    /// groups from `bind_for_read` are stale afterwards.
    pub fn resize(&mut self, device: &Device, resolution: u32) -> Result<()> {
        if self.resources.is_none() {
            return Err(ShadowError::StoreReleased);
        }
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            return Err(ShadowError::InvalidConfiguration(format!(
                "shadow resolution must be in {MIN_RESOLUTION}..={MAX_RESOLUTION}, got {resolution}"
            )));
        }
        if resolution == self.resolution {
            return Ok(());
        }

        if let Some(old) = self.resources.take() {
            release(old);
        }
        self.resolution = resolution;
        self.resources = Some(self.allocate(device)?);
        self.generation += 1;

        log::info!("Shadow cascade store resized to {resolution}x{resolution}");
        Ok(())
    }

    /// Release all GPU resources. Must be the last call on the store.
    pub fn deinit(&mut self) -> Result<()> {
        let resources = self.resources.take().ok_or(ShadowError::StoreReleased)?;
        release(resources);
        log::info!("Shadow cascade store released");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    /// Addressing the sampler actually uses after feature fallback
    pub fn clamp_mode(&self) -> ShadowClampMode {
        self.clamp_mode
    }

    /// Bumped on every reallocation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Depth attachment view of one cascade layer
    pub fn layer_view(&self, index: usize) -> Result<&TextureView> {
        let resources = self.resources()?;
        resources
            .layer_views
            .get(index)
            .ok_or(ShadowError::CascadeOutOfRange {
                index,
                count: resources.layer_views.len(),
            })
    }

    /// All layers as one `D2Array` view
    pub fn array_view(&self) -> Result<&TextureView> {
        Ok(&self.resources()?.array_view)
    }

    pub fn texture(&self) -> Result<&Texture> {
        Ok(&self.resources()?.texture)
    }

    /// Begin the depth-only pass for one cascade.
    ///
    /// The layer is cleared to the far depth (1.0) and the viewport covers
    /// the full layer.
    pub fn bind_for_write<'e>(
        &self,
        encoder: &'e mut CommandEncoder,
        index: usize,
    ) -> Result<RenderPass<'e>> {
        let view = self.layer_view(index)?;

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("shadow_cascade_pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let size = self.resolution as f32;
        pass.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
        Ok(pass)
    }

    /// Layout of the shading-pass bind group: depth array (0), comparison
    /// sampler (1), cascade uniforms (2)
    pub fn bind_group_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow_cascade_bind_group_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Depth,
                        view_dimension: TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Comparison),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
                    },
                    count: None,
                },
            ],
        })
    }

    /// Bind group exposing the whole array to the shading pass
    pub fn bind_for_read(&self, device: &Device, layout: &BindGroupLayout) -> Result<BindGroup> {
        let resources = self.resources()?;
        Ok(device.create_bind_group(&BindGroupDescriptor {
            label: Some("shadow_cascade_bind_group"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&resources.array_view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&resources.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: resources.uniform_buffer.as_entire_binding(),
                },
            ],
        }))
    }

    /// Upload the cascade uniforms read by the shading pass
    pub fn write_uniforms(&self, queue: &Queue, uniforms: &GpuCascadeUniforms) -> Result<()> {
        let resources = self.resources()?;
        queue.write_buffer(&resources.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        Ok(())
    }

    /// Depth state for the external caster pipeline
    pub fn depth_stencil_state(&self) -> DepthStencilState {
        let bias = match self.polygon_offset {
            Some(offset) => DepthBiasState {
                constant: offset.units,
                slope_scale: offset.factor,
                clamp: 0.0,
            },
            None => DepthBiasState::default(),
        };

        DepthStencilState {
            format: SHADOW_DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: SHADOW_COMPARE,
            stencil: StencilState::default(),
            bias,
        }
    }

    fn resources(&self) -> Result<&StoreResources> {
        self.resources.as_ref().ok_or(ShadowError::StoreReleased)
    }

    fn allocate(&self, device: &Device) -> Result<StoreResources> {
        let limits = device.limits();
        if self.resolution > limits.max_texture_dimension_2d {
            return Err(allocation_error(
                "shadow depth array",
                format!(
                    "resolution {} exceeds device limit {}",
                    self.resolution, limits.max_texture_dimension_2d
                ),
            ));
        }
        if self.layer_count > limits.max_texture_array_layers {
            return Err(allocation_error(
                "shadow depth array",
                format!(
                    "{} layers exceed device limit {}",
                    self.layer_count, limits.max_texture_array_layers
                ),
            ));
        }

        device.push_error_scope(ErrorFilter::OutOfMemory);
        device.push_error_scope(ErrorFilter::Validation);

        let resources = self.create_resources(device);

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            release(resources);
            return Err(allocation_error("shadow depth array", err.to_string()));
        }

        Ok(resources)
    }

    fn create_resources(&self, device: &Device) -> StoreResources {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("shadow_cascade_array"),
            size: Extent3d {
                width: self.resolution,
                height: self.resolution,
                depth_or_array_layers: self.layer_count,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: SHADOW_DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let layer_views = (0..self.layer_count)
            .map(|layer| {
                texture.create_view(&TextureViewDescriptor {
                    label: Some("shadow_cascade_layer"),
                    dimension: Some(TextureViewDimension::D2),
                    aspect: TextureAspect::DepthOnly,
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let array_view = texture.create_view(&TextureViewDescriptor {
            label: Some("shadow_cascade_array_view"),
            dimension: Some(TextureViewDimension::D2Array),
            aspect: TextureAspect::DepthOnly,
            base_array_layer: 0,
            array_layer_count: Some(self.layer_count),
            ..Default::default()
        });

        let (address_mode, border_color) = match self.clamp_mode {
            ShadowClampMode::Border if self.border_shadowed => {
                (AddressMode::ClampToBorder, Some(SamplerBorderColor::TransparentBlack))
            }
            ShadowClampMode::Border => (AddressMode::ClampToBorder, Some(SamplerBorderColor::OpaqueWhite)),
            ShadowClampMode::Edge => (AddressMode::ClampToEdge, None),
        };
        let filter = if self.hardware_pcf {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("shadow_cascade_sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: FilterMode::Nearest,
            compare: Some(SHADOW_COMPARE),
            border_color,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("shadow_cascade_uniforms"),
            size: UNIFORM_SIZE,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        StoreResources {
            texture,
            layer_views,
            array_view,
            sampler,
            uniform_buffer,
        }
    }
}

fn release(resources: StoreResources) {
    resources.texture.destroy();
    resources.uniform_buffer.destroy();
}

fn allocation_error(resource: &'static str, reason: String) -> ShadowError {
    log::error!("Failed to allocate {resource}: {reason}");
    ShadowError::ResourceAllocation { resource, reason }
}

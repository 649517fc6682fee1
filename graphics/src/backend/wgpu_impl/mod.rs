//! wgpu device implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and OpenGL. Commands are recorded into one pending
//! encoder which is submitted on flush, before queue writes and before
//! readbacks, so transfers observe every earlier command.

pub(crate) mod conversion;
mod encoding;

use std::sync::mpsc;
use std::time::Duration;

use crate::context::TextureCopyRegion;
use crate::error::GraphicsError;
use crate::instance::RuntimeParameters;
use crate::shader::CompiledShader;
use crate::types::{
    BufferDescriptor, ClearValue, PipelineDescriptor, TextureDescriptor, TextureDimension,
    align_to,
};

use super::{AttachmentClear, DrawCall, NativeDevice, RenderPassTargets, TextureRef, TextureWrite};
use conversion::{
    convert_binding_kind, convert_blend_mode, convert_buffer_usage, convert_compare_function,
    convert_cull_mode, convert_shader_stages, convert_step_mode, convert_texture_dimension,
    convert_texture_format, convert_texture_usage, convert_topology, convert_vertex_format,
    convert_view_dimension,
};
use encoding::{OpenRenderPass, RenderPassSetup};

const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// wgpu buffer; sizes are rounded up to the 4-byte copy alignment.
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
}

/// wgpu texture with its default sampled view.
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// wgpu render pipeline with one bind group layout per group.
pub struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
}

/// Window surface the back buffer is copied to on present.
struct WindowTarget {
    surface: wgpu::Surface<'static>,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

/// wgpu-based [`NativeDevice`].
pub struct WgpuDevice {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,
    render_pass: Option<OpenRenderPass>,
    linear_sampler: wgpu::Sampler,
    comparison_sampler: wgpu::Sampler,
    window: Option<WindowTarget>,
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuDevice {
    /// Create a new wgpu device with default parameters.
    pub fn new() -> Result<Self, GraphicsError> {
        Self::with_params(&RuntimeParameters::default())
    }

    /// Create a new wgpu device with custom parameters.
    pub fn with_params(params: &RuntimeParameters) -> Result<Self, GraphicsError> {
        let backends = params.wgpu_backend.to_wgpu_backends();

        let mut flags = wgpu::InstanceFlags::default();
        if params.validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}"))
        })?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Render Graph Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Comparison Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            encoder: None,
            render_pass: None,
            linear_sampler,
            comparison_sampler,
            window: None,
        })
    }

    /// Get the wgpu adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Attach a window surface; presented frames are copied into it.
    ///
    /// The surface is configured with `width` x `height` and must be
    /// reconfigured through [`WgpuDevice::resize_surface`] when the window
    /// changes size.
    pub fn attach_surface(
        &mut self,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<(), GraphicsError> {
        let surface = self.instance.create_surface(target).map_err(|e| {
            GraphicsError::InitializationFailed(format!("Surface creation failed: {e}"))
        })?;
        let capabilities = surface.get_capabilities(&self.adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| conversion::texture_format_from_wgpu(*f).is_some())
            .ok_or_else(|| {
                GraphicsError::FeatureNotSupported("no supported surface format".to_string())
            })?;

        let mut window = WindowTarget {
            surface,
            format,
            size: (width, height),
        };
        self.configure_surface(&mut window);
        self.window = Some(window);
        Ok(())
    }

    /// Reconfigure the attached surface after a window resize.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(mut window) = self.window.take() {
            window.size = (width, height);
            self.configure_surface(&mut window);
            self.window = Some(window);
        }
    }

    /// Format of the attached surface, if it is one the graph can render to.
    pub fn surface_format(&self) -> Option<crate::types::TextureFormat> {
        self.window
            .as_ref()
            .and_then(|w| conversion::texture_format_from_wgpu(w.format))
    }

    fn configure_surface(&self, window: &mut WindowTarget) {
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format: window.format,
            width: window.size.0.max(1),
            height: window.size.1.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        window.surface.configure(&self.device, &config);
        log::info!("Configured wgpu surface {}x{}", config.width, config.height);
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Graph Encoder"),
            })
        })
    }

    fn submit_pending(&mut self) -> Option<wgpu::SubmissionIndex> {
        self.encoder
            .take()
            .map(|encoder| self.queue.submit(std::iter::once(encoder.finish())))
    }

    fn wait(&self, submission_index: Option<wgpu::SubmissionIndex>) -> Result<(), GraphicsError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index,
                timeout: Some(POLL_TIMEOUT),
            })
            .map(|_| ())
            .map_err(|e| GraphicsError::Internal(format!("device poll failed: {e}")))
    }

    /// Map a staging buffer and copy its contents out.
    fn map_staging(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>, GraphicsError> {
        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait(None)?;
        rx.recv()
            .map_err(|e| GraphicsError::Internal(format!("readback channel closed: {e}")))?
            .map_err(|e| GraphicsError::Internal(format!("buffer mapping failed: {e}")))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    fn sampler(&self, comparison: bool) -> &wgpu::Sampler {
        if comparison {
            &self.comparison_sampler
        } else {
            &self.linear_sampler
        }
    }
}

/// Array layer and depth of a texel box in wgpu's addressing.
fn copy_origin_and_depth(
    descriptor: &TextureDescriptor,
    array_layer: u32,
    origin: crate::types::Origin3d,
    depth: u32,
) -> (wgpu::Origin3d, u32) {
    if descriptor.dimension == TextureDimension::D3 {
        (
            wgpu::Origin3d {
                x: origin.x,
                y: origin.y,
                z: origin.z,
            },
            depth,
        )
    } else {
        (
            wgpu::Origin3d {
                x: origin.x,
                y: origin.y,
                z: array_layer,
            },
            1,
        )
    }
}

fn texture_aspect(descriptor: &TextureDescriptor) -> wgpu::TextureAspect {
    if descriptor.format.is_depth_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

impl NativeDevice for WgpuDevice {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Pipeline = WgpuPipeline;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<WgpuBuffer, GraphicsError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: align_to(descriptor.size.max(4), wgpu::COPY_BUFFER_ALIGNMENT),
            usage: convert_buffer_usage(descriptor.usage()),
            mapped_at_creation: false,
        });
        Ok(WgpuBuffer { buffer })
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<WgpuTexture, GraphicsError> {
        let max = self.max_mip_levels(descriptor);
        if descriptor.mip_level_count > max {
            return Err(GraphicsError::MipLevelsUnsupported {
                requested: descriptor.mip_level_count,
                max,
            });
        }

        let depth_or_array_layers = match descriptor.dimension {
            TextureDimension::D3 => descriptor.size.depth.max(1),
            _ => descriptor.array_layers(),
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers,
            },
            mip_level_count: descriptor.mip_level_count,
            sample_count: descriptor.sample_count,
            dimension: convert_texture_dimension(descriptor.dimension),
            format: convert_texture_format(descriptor.format),
            usage: convert_texture_usage(descriptor.usage()),
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(convert_view_dimension(descriptor.dimension)),
            aspect: texture_aspect(descriptor),
            ..Default::default()
        });

        Ok(WgpuTexture { texture, view })
    }

    fn max_mip_levels(&self, descriptor: &TextureDescriptor) -> u32 {
        descriptor.full_mip_chain_levels()
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
        shader: &CompiledShader,
    ) -> Result<WgpuPipeline, GraphicsError> {
        let module_for = |stage| -> Result<wgpu::ShaderModule, GraphicsError> {
            let source = shader.source(stage).ok_or_else(|| {
                GraphicsError::ShaderCompilationFailed(format!("missing {stage:?} stage source"))
            })?;
            Ok(self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: descriptor.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            }))
        };
        let vertex_module = module_for(crate::shader::ShaderStage::Vertex)?;
        let fragment_module = match shader.fragment_entry() {
            Some(_) => Some(module_for(crate::shader::ShaderStage::Fragment)?),
            None => None,
        };

        // One layout per group, including empty groups between used ones.
        let bind_group_layouts: Vec<wgpu::BindGroupLayout> = (0..shader.group_count())
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = shader
                    .bindings()
                    .iter()
                    .filter(|b| b.group == group)
                    .map(|b| wgpu::BindGroupLayoutEntry {
                        binding: b.binding,
                        visibility: convert_shader_stages(b.visibility),
                        ty: convert_binding_kind(b.kind),
                        count: None,
                    })
                    .collect();
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: descriptor.label.as_deref(),
                        entries: &entries,
                    })
            })
            .collect();

        let pipeline_layout = {
            let refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: descriptor.label.as_deref(),
                    bind_group_layouts: &refs,
                    immediate_size: 0,
                })
        };

        let vertex_attrs: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attr| wgpu::VertexAttribute {
                        format: convert_vertex_format(attr.format),
                        offset: u64::from(attr.offset),
                        shader_location: attr.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffer_layouts: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_layouts
            .iter()
            .zip(&vertex_attrs)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: u64::from(layout.stride),
                step_mode: convert_step_mode(layout.step_mode),
                attributes,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: convert_texture_format(target.format),
                    blend: convert_blend_mode(target.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(shader.vertex_entry()),
                    buffers: &vertex_buffer_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: fragment_module.as_ref().map(|module| wgpu::FragmentState {
                    module,
                    entry_point: shader.fragment_entry(),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert_topology(descriptor.topology),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: convert_cull_mode(descriptor.cull_mode),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: descriptor
                    .depth_stencil
                    .as_ref()
                    .map(|state| wgpu::DepthStencilState {
                        format: convert_texture_format(state.format),
                        depth_write_enabled: state.depth_write,
                        depth_compare: convert_compare_function(state.depth_compare),
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                multisample: wgpu::MultisampleState {
                    count: descriptor.sample_count.max(1),
                    ..Default::default()
                },
                multiview_mask: None,
                cache: None,
            });

        Ok(WgpuPipeline {
            pipeline,
            bind_group_layouts,
        })
    }

    fn write_buffer(&mut self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let submitted = self.submit_pending();
        if submitted.is_some() {
            log::trace!("WgpuDevice: submitted pending commands before buffer write");
        }
        let len = data.len() as u64;
        if (offset | len) % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(&buffer.buffer, offset, data);
            return Ok(());
        }

        // Patch the bytes into the aligned window around the range. Buffers
        // are allocated at aligned sizes, so the window stays in bounds.
        let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
        let end = align_to(offset + len, wgpu::COPY_BUFFER_ALIGNMENT);
        let mut window = self.read_buffer(buffer, start, end - start)?;
        let skip = (offset - start) as usize;
        window[skip..skip + data.len()].copy_from_slice(data);
        log::trace!("WgpuDevice: unaligned write of {len} bytes at {offset} widened to {start}..{end}");
        self.queue.write_buffer(&buffer.buffer, start, &window);
        Ok(())
    }

    fn write_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        target: TextureWrite,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        self.submit_pending();
        let descriptor = texture.descriptor;
        let (origin, depth) =
            copy_origin_and_depth(descriptor, target.array_layer, target.origin, target.size.depth);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture.texture,
                mip_level: target.mip_level,
                origin,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(target.size.width * descriptor.format.block_size()),
                rows_per_image: Some(target.size.height),
            },
            wgpu::Extent3d {
                width: target.size.width,
                height: target.size.height,
                depth_or_array_layers: depth,
            },
        );
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: &WgpuBuffer,
        src_offset: u64,
        dst: &WgpuBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError> {
        let aligned = (src_offset | dst_offset | size) % wgpu::COPY_BUFFER_ALIGNMENT == 0;
        if !aligned || src.buffer == dst.buffer {
            // wgpu rejects unaligned copies and copies within one buffer.
            let bytes = self.read_buffer(src, src_offset, size)?;
            return self.write_buffer(dst, dst_offset, &bytes);
        }
        self.encoder()
            .copy_buffer_to_buffer(&src.buffer, src_offset, &dst.buffer, dst_offset, size);
        Ok(())
    }

    fn copy_texture(
        &mut self,
        src: TextureRef<'_, Self>,
        dst: TextureRef<'_, Self>,
        region: &TextureCopyRegion,
    ) -> Result<(), GraphicsError> {
        let (src_origin, depth) = copy_origin_and_depth(
            src.descriptor,
            region.src.array_layer,
            region.src.origin,
            region.extent.depth,
        );
        let (dst_origin, _) = copy_origin_and_depth(
            dst.descriptor,
            region.dst.array_layer,
            region.dst.origin,
            region.extent.depth,
        );
        self.encoder().copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture.texture,
                mip_level: region.src.mip_level,
                origin: src_origin,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture.texture,
                mip_level: region.dst.mip_level,
                origin: dst_origin,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: region.extent.width,
                height: region.extent.height,
                depth_or_array_layers: depth,
            },
        );
        Ok(())
    }

    fn clear_texture(&mut self, texture: TextureRef<'_, Self>, value: ClearValue) -> Result<(), GraphicsError> {
        encoding::clear_texture(self, texture, value)
    }

    fn begin_render_pass(&mut self, targets: &RenderPassTargets<'_, Self>) -> Result<(), GraphicsError> {
        let setup = RenderPassSetup::from_targets(targets);
        let pass = setup.begin(self.encoder());
        self.render_pass = Some(pass);
        Ok(())
    }

    fn clear_attachment(&mut self, clear: AttachmentClear) -> Result<(), GraphicsError> {
        let pass = self.render_pass.take().ok_or(GraphicsError::NotInRenderPass)?;
        // Mid-pass clears restart the pass with a clear load op on that attachment.
        let setup = pass.restart_with_clear(clear)?;
        let pass = setup.begin(self.encoder());
        self.render_pass = Some(pass);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), GraphicsError> {
        let bind_groups = encoding::create_bind_groups(self, call)?;
        let pass = self.render_pass.as_mut().ok_or(GraphicsError::NotInRenderPass)?;
        pass.draw(call, &bind_groups);
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), GraphicsError> {
        self.render_pass
            .take()
            .map(drop)
            .ok_or(GraphicsError::NotInRenderPass)
    }

    fn read_buffer(&mut self, buffer: &WgpuBuffer, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        // Copy an aligned superset of the range, then trim.
        let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
        let end = align_to(offset + size, wgpu::COPY_BUFFER_ALIGNMENT).min(buffer.buffer.size());
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read Staging Buffer"),
            size: (end - start).max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        self.encoder()
            .copy_buffer_to_buffer(&buffer.buffer, start, &staging, 0, end - start);
        let index = self.submit_pending();
        self.wait(index)?;

        let data = self.map_staging(&staging)?;
        let skip = (offset - start) as usize;
        Ok(data[skip..skip + size as usize].to_vec())
    }

    fn read_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<Vec<u8>, GraphicsError> {
        encoding::read_texture(self, texture, mip_level, array_layer)
    }

    fn flush(&mut self) -> Result<(), GraphicsError> {
        if let Some(index) = self.submit_pending() {
            self.wait(Some(index))?;
        }
        Ok(())
    }

    fn back_buffer_resized(&mut self, width: u32, height: u32) {
        self.resize_surface(width, height);
    }

    fn present(&mut self, back_buffer: TextureRef<'_, Self>) -> Result<(), GraphicsError> {
        encoding::present(self, back_buffer)
    }
}

static_assertions::assert_impl_all!(WgpuDevice: Send);

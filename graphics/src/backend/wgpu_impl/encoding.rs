//! Render pass, bind group and readback encoding for the wgpu device.

use wgpu::util::DeviceExt;

use crate::backend::dummy::encode_color;
use crate::backend::{
    AttachmentClear, BoundResource, DrawCall, Primitive, RenderPassTargets, TextureRef,
    TextureWrite,
};
use crate::context::LoadOp;
use crate::error::GraphicsError;
use crate::shader::BindingKind;
use crate::types::{ClearValue, Origin3d, TextureUsage, align_to};

use super::conversion::{
    convert_depth_load_op, convert_index_format, convert_load_op, convert_stencil_load_op,
    convert_store_op, texture_format_from_wgpu,
};
use super::{WgpuDevice, copy_origin_and_depth, texture_aspect};

struct ColorView {
    view: wgpu::TextureView,
    ops: wgpu::Operations<wgpu::Color>,
}

struct DepthStencilView {
    view: wgpu::TextureView,
    depth: Option<wgpu::Operations<f32>>,
    stencil: Option<wgpu::Operations<u32>>,
}

/// Attachments of a render pass, kept so the pass can be restarted.
pub(super) struct RenderPassSetup {
    label: String,
    colors: Vec<ColorView>,
    depth_stencil: Option<DepthStencilView>,
}

/// A recording render pass.
pub(super) struct OpenRenderPass {
    setup: RenderPassSetup,
    pass: wgpu::RenderPass<'static>,
}

fn attachment_view(texture: &wgpu::Texture, mip_level: u32, array_layer: u32) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Attachment View"),
        dimension: Some(wgpu::TextureViewDimension::D2),
        base_mip_level: mip_level,
        mip_level_count: Some(1),
        base_array_layer: array_layer,
        array_layer_count: Some(1),
        ..Default::default()
    })
}

impl RenderPassSetup {
    pub(super) fn from_targets(targets: &RenderPassTargets<'_, WgpuDevice>) -> Self {
        let colors = targets
            .colors
            .iter()
            .map(|target| ColorView {
                view: attachment_view(
                    &target.texture.texture.texture,
                    target.mip_level,
                    target.array_layer,
                ),
                ops: wgpu::Operations {
                    load: convert_load_op(target.load_op),
                    store: convert_store_op(target.store_op),
                },
            })
            .collect();

        let depth_stencil = targets.depth_stencil.as_ref().map(|target| {
            let has_stencil = target.texture.descriptor.format.has_stencil();
            DepthStencilView {
                view: attachment_view(&target.texture.texture.texture, 0, 0),
                depth: target.depth.map(|(load, store)| wgpu::Operations {
                    load: convert_depth_load_op(load),
                    store: convert_store_op(store),
                }),
                stencil: target
                    .stencil
                    .filter(|_| has_stencil)
                    .map(|(load, store)| wgpu::Operations {
                        load: convert_stencil_load_op(load),
                        store: convert_store_op(store),
                    }),
            }
        });

        Self {
            label: targets.label.to_string(),
            colors,
            depth_stencil,
        }
    }

    pub(super) fn begin(self, encoder: &mut wgpu::CommandEncoder) -> OpenRenderPass {
        let pass = {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
                .colors
                .iter()
                .map(|color| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &color.view,
                        resolve_target: None,
                        ops: color.ops,
                        depth_slice: None,
                    })
                })
                .collect();
            let depth_stencil_attachment =
                self.depth_stencil
                    .as_ref()
                    .map(|ds| wgpu::RenderPassDepthStencilAttachment {
                        view: &ds.view,
                        depth_ops: ds.depth,
                        stencil_ops: ds.stencil,
                    });
            encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&self.label),
                    color_attachments: &color_attachments,
                    depth_stencil_attachment,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                })
                .forget_lifetime()
        };
        OpenRenderPass { setup: self, pass }
    }

    /// Turn every load op into a load so a restarted pass keeps earlier output.
    fn load_all(&mut self) {
        for color in &mut self.colors {
            color.ops.load = wgpu::LoadOp::Load;
        }
        if let Some(ds) = &mut self.depth_stencil {
            if let Some(depth) = &mut ds.depth {
                depth.load = wgpu::LoadOp::Load;
            }
            if let Some(stencil) = &mut ds.stencil {
                stencil.load = wgpu::LoadOp::Load;
            }
        }
    }
}

impl OpenRenderPass {
    /// End the pass and return its setup with `clear` applied as a load op.
    pub(super) fn restart_with_clear(
        self,
        clear: AttachmentClear,
    ) -> Result<RenderPassSetup, GraphicsError> {
        let OpenRenderPass { mut setup, pass } = self;
        drop(pass);
        setup.load_all();

        match clear {
            AttachmentClear::Color { index, color } => {
                let target = setup.colors.get_mut(index).ok_or_else(|| {
                    GraphicsError::OutOfBounds(format!("color attachment {index}"))
                })?;
                target.ops.load = convert_load_op(LoadOp::Clear(ClearValue::rgba(color)));
            }
            AttachmentClear::DepthStencil { depth, stencil } => {
                let target = setup.depth_stencil.as_mut().ok_or_else(|| {
                    GraphicsError::InvalidParameter(
                        "render pass has no depth/stencil attachment".to_string(),
                    )
                })?;
                if let (Some(value), Some(ops)) = (depth, target.depth.as_mut()) {
                    ops.load = wgpu::LoadOp::Clear(value);
                }
                if let (Some(value), Some(ops)) = (stencil, target.stencil.as_mut()) {
                    ops.load = wgpu::LoadOp::Clear(value);
                }
            }
        }
        Ok(setup)
    }

    pub(super) fn draw(&mut self, call: &DrawCall<'_, WgpuDevice>, bind_groups: &[wgpu::BindGroup]) {
        let pass = &mut self.pass;
        pass.set_pipeline(&call.pipeline.pipeline);
        for (index, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group, &[]);
        }
        for (slot, (buffer, offset)) in call.vertex_buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.buffer.slice(*offset..));
        }
        if let Some((buffer, format, offset)) = call.index_buffer {
            pass.set_index_buffer(buffer.buffer.slice(offset..), convert_index_format(format));
        }

        let instances = 0..call.instance_count;
        match call.primitive {
            Primitive::Array {
                first_vertex,
                vertex_count,
            } => pass.draw(first_vertex..first_vertex + vertex_count, instances),
            Primitive::Indexed {
                first_index,
                index_count,
                base_vertex,
            } => pass.draw_indexed(first_index..first_index + index_count, base_vertex, instances),
        }
    }
}

/// Build one bind group per pipeline group from the draw's bound resources.
pub(super) fn create_bind_groups(
    device: &WgpuDevice,
    call: &DrawCall<'_, WgpuDevice>,
) -> Result<Vec<wgpu::BindGroup>, GraphicsError> {
    let shader = call.shader;
    let offset_alignment = u64::from(
        device
            .device
            .limits()
            .min_storage_buffer_offset_alignment
            .max(device.device.limits().min_uniform_buffer_offset_alignment),
    );

    // Uniform buffers for parameters must outlive the entries borrowing them.
    let mut parameter_buffers = Vec::with_capacity(call.bindings.len());
    for (binding, resource) in shader.bindings().iter().zip(&call.bindings) {
        let buffer = match (resource, binding.kind) {
            (BoundResource::Parameter(bytes), BindingKind::Uniform { size }) => {
                let mut contents = bytes.to_vec();
                contents.resize(align_to(size.max(bytes.len() as u64), 16) as usize, 0);
                Some(
                    device
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(&binding.name),
                            contents: &contents,
                            usage: wgpu::BufferUsages::UNIFORM,
                        }),
                )
            }
            _ => None,
        };
        parameter_buffers.push(buffer);
    }

    let mut groups = Vec::with_capacity(call.pipeline.bind_group_layouts.len());
    for (group, layout) in call.pipeline.bind_group_layouts.iter().enumerate() {
        let mut entries = Vec::new();
        for (slot, binding) in shader.bindings().iter().enumerate() {
            if binding.group as usize != group {
                continue;
            }
            let bound = call
                .bindings
                .get(slot)
                .ok_or_else(|| GraphicsError::MissingBinding(binding.name.clone()))?;
            let resource = match bound {
                BoundResource::Texture(texture) => {
                    wgpu::BindingResource::TextureView(&texture.texture.view)
                }
                BoundResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => {
                    if offset % offset_alignment != 0 {
                        return Err(GraphicsError::InvalidParameter(format!(
                            "binding '{}' offset {offset} is not a multiple of {offset_alignment}",
                            binding.name
                        )));
                    }
                    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer.buffer,
                        offset: *offset,
                        size: wgpu::BufferSize::new(*size),
                    })
                }
                BoundResource::Parameter(_) => parameter_buffers
                    .get(slot)
                    .and_then(Option::as_ref)
                    .map(|buffer| buffer.as_entire_binding())
                    .ok_or_else(|| {
                        GraphicsError::InvalidParameter(format!(
                            "binding '{}' is not a uniform",
                            binding.name
                        ))
                    })?,
                BoundResource::Sampler => wgpu::BindingResource::Sampler(
                    device.sampler(matches!(binding.kind, BindingKind::Sampler { comparison: true })),
                ),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding.binding,
                resource,
            });
        }
        groups.push(device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout,
            entries: &entries,
        }));
    }
    Ok(groups)
}

/// Clear every subresource of a texture.
///
/// Renderable textures are cleared with one render pass per subresource;
/// 3D textures get encoded texels written through the queue.
pub(super) fn clear_texture(
    device: &mut WgpuDevice,
    texture: TextureRef<'_, WgpuDevice>,
    value: ClearValue,
) -> Result<(), GraphicsError> {
    let descriptor = texture.descriptor;
    let format = descriptor.format;

    if !descriptor.usage().contains(TextureUsage::RENDER_ATTACHMENT) {
        let ClearValue::Color { r, g, b, a } = value else {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{format:?} cannot be cleared with {value:?}"
            )));
        };
        let texel = encode_color(format, [r, g, b, a]);
        for mip_level in 0..descriptor.mip_level_count {
            let extent = descriptor.mip_extent(mip_level);
            let data = texel.repeat(extent.texel_count() as usize);
            crate::backend::NativeDevice::write_texture(
                device,
                texture,
                TextureWrite {
                    mip_level,
                    array_layer: 0,
                    origin: Origin3d::ZERO,
                    size: extent,
                },
                &data,
            )?;
        }
        return Ok(());
    }

    let encoder = device.encoder();
    for array_layer in 0..descriptor.array_layers() {
        for mip_level in 0..descriptor.mip_level_count {
            let view = attachment_view(&texture.texture.texture, mip_level, array_layer);
            if format.is_depth_stencil() {
                let depth_ops = wgpu::Operations {
                    load: value
                        .depth_value()
                        .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                    store: wgpu::StoreOp::Store,
                };
                let stencil_ops = format.has_stencil().then(|| wgpu::Operations {
                    load: value
                        .stencil_value()
                        .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                    store: wgpu::StoreOp::Store,
                });
                drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Clear Texture"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &view,
                        depth_ops: Some(depth_ops),
                        stencil_ops,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                }));
            } else {
                drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Clear Texture"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: convert_load_op(LoadOp::Clear(value)),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                }));
            }
        }
    }
    Ok(())
}

/// Read one subresource back through a row-padded staging buffer.
pub(super) fn read_texture(
    device: &mut WgpuDevice,
    texture: TextureRef<'_, WgpuDevice>,
    mip_level: u32,
    array_layer: u32,
) -> Result<Vec<u8>, GraphicsError> {
    let descriptor = texture.descriptor;
    if descriptor.format.has_stencil() {
        return Err(GraphicsError::UnsupportedFormat(format!(
            "{:?} cannot be read back on wgpu",
            descriptor.format
        )));
    }

    let extent = descriptor.mip_extent(mip_level);
    let unpadded_row = extent.width * descriptor.format.block_size();
    let padded_row = align_to(
        u64::from(unpadded_row),
        u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
    ) as u32;
    let rows = extent.height * extent.depth;

    let staging = device.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Buffer"),
        size: u64::from(padded_row) * u64::from(rows),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let (origin, depth) = copy_origin_and_depth(descriptor, array_layer, Origin3d::ZERO, extent.depth);
    device.encoder().copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture.texture.texture,
            mip_level,
            origin,
            aspect: texture_aspect(descriptor),
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(extent.height),
            },
        },
        wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: depth,
        },
    );
    let index = device.submit_pending();
    device.wait(index)?;

    let padded = device.map_staging(&staging)?;
    let mut data = Vec::with_capacity((unpadded_row * rows) as usize);
    for row in padded.chunks_exact(padded_row as usize) {
        data.extend_from_slice(&row[..unpadded_row as usize]);
    }
    Ok(data)
}

/// Copy the back buffer into the window surface and present it.
pub(super) fn present(
    device: &mut WgpuDevice,
    back_buffer: TextureRef<'_, WgpuDevice>,
) -> Result<(), GraphicsError> {
    let Some(window) = device.window.as_ref() else {
        return crate::backend::NativeDevice::flush(device);
    };
    let surface_format = window.format;
    let surface_size = window.size;
    let surface_texture = match window.surface.get_current_texture() {
        Ok(texture) => texture,
        Err(e) => {
            crate::backend::NativeDevice::flush(device)?;
            return Err(match e {
                wgpu::SurfaceError::Outdated => GraphicsError::SurfaceOutdated,
                wgpu::SurfaceError::Lost => GraphicsError::SurfaceLost,
                other => GraphicsError::Internal(format!("surface acquire failed: {other}")),
            });
        }
    };

    let descriptor = back_buffer.descriptor;
    let compatible = texture_format_from_wgpu(surface_format) == Some(descriptor.format)
        && (descriptor.size.width, descriptor.size.height) == surface_size
        && descriptor.sample_count <= 1;
    if compatible {
        device.encoder().copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &back_buffer.texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &surface_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: 1,
            },
        );
    } else {
        log::debug!(
            "Back buffer {:?} does not match surface {:?}, skipping copy",
            descriptor.format,
            surface_format
        );
    }

    crate::backend::NativeDevice::flush(device)?;
    surface_texture.present();
    Ok(())
}

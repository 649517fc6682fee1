//! The command recorder shared by every backend.
//!
//! [`PassContext`] implements [`CommandContext`] once on top of
//! [`NativeDevice`]. It resolves handles against the executing graph's
//! compiled state, enforces the command-context contract and forwards
//! validated calls to the device.

use crate::backend::{
    AttachmentClear, BoundResource, ColorTarget, DepthStencilTarget, DrawCall, NativeDevice,
    Primitive, RenderPassTargets, TextureRef, TextureWrite,
};
use crate::context::{
    ColorAttachment, CommandContext, DepthAttachment, StencilAttachment, TextureCopyLocation,
    TextureCopyRegion, TextureUpload,
};
use crate::error::GraphicsError;
use crate::graph::{PassAccess, ResourceAccess, ResourceHandle};
use crate::shader::{BindingKind, CompiledShader, ShaderStage};
use crate::types::{
    BufferDescriptor, BufferKind, ClearValue, Extent3d, IndexFormat, Origin3d, TextureDimension,
    TextureUsage,
};

use super::arena::{ArenaObject, ResourceArena};
use super::state::{BackBuffer, Binding, CompiledGraphState};
use super::stats::ExecuteStatistics;

/// Resolution of graph handles to backend objects.
pub(crate) struct Resources<'a, D: NativeDevice> {
    arena: &'a mut ResourceArena<D>,
    state: &'a mut CompiledGraphState,
    back_buffer: &'a BackBuffer<D>,
}

impl<'a, D: NativeDevice> Resources<'a, D> {
    pub(crate) fn new(
        arena: &'a mut ResourceArena<D>,
        state: &'a mut CompiledGraphState,
        back_buffer: &'a BackBuffer<D>,
    ) -> Self {
        Self {
            arena,
            state,
            back_buffer,
        }
    }

    fn binding(&self, handle: ResourceHandle) -> Result<Binding, GraphicsError> {
        self.state
            .resolve(handle)
            .ok_or(GraphicsError::InvalidResourceHandle(handle))
    }

    fn object(&self, handle: ResourceHandle) -> Result<Option<&ArenaObject<D>>, GraphicsError> {
        match self.binding(handle)? {
            Binding::Arena(key) => self
                .arena
                .get(key)
                .map(Some)
                .ok_or(GraphicsError::InvalidResourceHandle(handle)),
            Binding::BackBufferColor | Binding::BackBufferDepthStencil => Ok(None),
        }
    }

    /// Resolve a buffer, optionally of one kind.
    fn buffer(
        &self,
        handle: ResourceHandle,
        kind: Option<BufferKind>,
    ) -> Result<(&D::Buffer, &BufferDescriptor), GraphicsError> {
        let expected = kind.map_or("a buffer", BufferKind::name);
        match self.object(handle)? {
            Some(ArenaObject::Buffer { buffer, descriptor })
                if kind.is_none_or(|kind| kind == descriptor.kind) =>
            {
                Ok((buffer, descriptor))
            }
            _ => Err(GraphicsError::ResourceKindMismatch { handle, expected }),
        }
    }

    fn texture(&self, handle: ResourceHandle) -> Result<TextureRef<'_, D>, GraphicsError> {
        match self.binding(handle)? {
            Binding::BackBufferColor => Ok(self.back_buffer.color()),
            Binding::BackBufferDepthStencil => Ok(self.back_buffer.depth_stencil()),
            Binding::Arena(key) => match self.arena.get(key) {
                Some(ArenaObject::Texture {
                    texture,
                    descriptor,
                }) => Ok(TextureRef {
                    texture,
                    descriptor,
                }),
                Some(_) => Err(GraphicsError::ResourceKindMismatch {
                    handle,
                    expected: "a texture",
                }),
                None => Err(GraphicsError::InvalidResourceHandle(handle)),
            },
        }
    }

    fn pipeline(
        &self,
        handle: ResourceHandle,
    ) -> Result<(&D::Pipeline, &CompiledShader, usize), GraphicsError> {
        match self.object(handle)? {
            Some(ArenaObject::Pipeline {
                pipeline,
                shader,
                vertex_slots,
            }) => Ok((pipeline, shader, *vertex_slots)),
            _ => Err(GraphicsError::ResourceKindMismatch {
                handle,
                expected: "a pipeline",
            }),
        }
    }
}

/// Resource set on one pipeline binding slot.
enum SlotResource {
    Texture(ResourceHandle),
    Buffer {
        handle: ResourceHandle,
        offset: u64,
        size: u64,
    },
    Parameter(Vec<u8>),
}

/// Pipeline bound in the open render pass and everything bound with it.
struct BoundPipeline {
    handle: ResourceHandle,
    vertex_buffers: Vec<Option<(ResourceHandle, u64)>>,
    index_buffer: Option<(ResourceHandle, IndexFormat, u64)>,
    slots: Vec<Option<SlotResource>>,
}

struct OpenPass {
    color_count: usize,
    has_depth_stencil: bool,
    pipeline: Option<BoundPipeline>,
}

/// Command context handed to one pass callback.
pub(crate) struct PassContext<'a, D: NativeDevice> {
    device: &'a mut D,
    resources: Resources<'a, D>,
    pass: PassAccess<'a>,
    validate_access: bool,
    render_pass: Option<OpenPass>,
    stats: &'a mut ExecuteStatistics,
}

impl<'a, D: NativeDevice> PassContext<'a, D> {
    pub(crate) fn new(
        device: &'a mut D,
        resources: Resources<'a, D>,
        pass: PassAccess<'a>,
        validate_access: bool,
        stats: &'a mut ExecuteStatistics,
    ) -> Self {
        Self {
            device,
            resources,
            pass,
            validate_access,
            render_pass: None,
            stats,
        }
    }

    /// End a render pass the callback left open.
    ///
    /// Returns true if one was open.
    pub(crate) fn close_render_pass(&mut self) -> Result<bool, GraphicsError> {
        if self.render_pass.take().is_none() {
            return Ok(false);
        }
        self.device.end_render_pass()?;
        Ok(true)
    }

    fn check_access(&self, handle: ResourceHandle, access: ResourceAccess) -> Result<(), GraphicsError> {
        if self.validate_access && !self.pass.allows(handle, access) {
            return Err(GraphicsError::UndeclaredAccess {
                pass: self.pass.name.to_string(),
                handle,
            });
        }
        Ok(())
    }

    fn outside_render_pass(&self) -> Result<(), GraphicsError> {
        match self.render_pass {
            Some(_) => Err(GraphicsError::RenderPassActive),
            None => Ok(()),
        }
    }

    fn open_pass(&self) -> Result<&OpenPass, GraphicsError> {
        self.render_pass.as_ref().ok_or(GraphicsError::NotInRenderPass)
    }

    fn bound_pipeline(&self) -> Result<&BoundPipeline, GraphicsError> {
        self.open_pass()?
            .pipeline
            .as_ref()
            .ok_or(GraphicsError::NoPipelineBound)
    }

    fn bound_pipeline_mut(&mut self) -> Result<&mut BoundPipeline, GraphicsError> {
        self.render_pass
            .as_mut()
            .ok_or(GraphicsError::NotInRenderPass)?
            .pipeline
            .as_mut()
            .ok_or(GraphicsError::NoPipelineBound)
    }

    /// Slot and kind of a named binding of the bound pipeline.
    fn pipeline_slot(&self, name: &str) -> Result<(usize, BindingKind), GraphicsError> {
        let bound = self.bound_pipeline()?;
        let (_, shader, _) = self.resources.pipeline(bound.handle)?;
        let slot = shader
            .slot(name)
            .ok_or_else(|| GraphicsError::UnknownBinding(name.to_string()))?;
        Ok((slot, shader.bindings()[slot].kind))
    }

    fn draw(&mut self, primitive: Primitive, instance_count: u32) -> Result<(), GraphicsError> {
        // Field paths keep the device borrow disjoint from the bindings.
        let bound = self
            .render_pass
            .as_ref()
            .ok_or(GraphicsError::NotInRenderPass)?
            .pipeline
            .as_ref()
            .ok_or(GraphicsError::NoPipelineBound)?;
        let resources = &self.resources;
        let (pipeline, shader, _) = resources.pipeline(bound.handle)?;

        let mut vertex_buffers = Vec::with_capacity(bound.vertex_buffers.len());
        for (slot, entry) in bound.vertex_buffers.iter().enumerate() {
            let (handle, offset) =
                entry.ok_or_else(|| GraphicsError::MissingBinding(format!("vertex buffer {slot}")))?;
            let (buffer, _) = resources.buffer(handle, Some(BufferKind::Vertex))?;
            vertex_buffers.push((buffer, offset));
        }

        let index_buffer = match (primitive, bound.index_buffer) {
            (Primitive::Indexed { .. }, None) => {
                return Err(GraphicsError::MissingBinding("index buffer".to_string()));
            }
            (Primitive::Indexed { .. }, Some((handle, format, offset))) => {
                let (buffer, _) = resources.buffer(handle, Some(BufferKind::Index))?;
                Some((buffer, format, offset))
            }
            (Primitive::Array { .. }, _) => None,
        };

        let mut bindings = Vec::with_capacity(bound.slots.len());
        for (binding, slot) in shader.bindings().iter().zip(&bound.slots) {
            let resource = match (binding.kind, slot) {
                (BindingKind::Sampler { .. }, _) => BoundResource::Sampler,
                (_, None) => return Err(GraphicsError::MissingBinding(binding.name.clone())),
                (_, Some(SlotResource::Texture(handle))) => {
                    BoundResource::Texture(resources.texture(*handle)?)
                }
                (
                    _,
                    Some(SlotResource::Buffer {
                        handle,
                        offset,
                        size,
                    }),
                ) => {
                    let (buffer, _) = resources.buffer(*handle, Some(BufferKind::Shader))?;
                    BoundResource::Buffer {
                        buffer,
                        offset: *offset,
                        size: *size,
                    }
                }
                (_, Some(SlotResource::Parameter(bytes))) => BoundResource::Parameter(bytes),
            };
            bindings.push(resource);
        }

        let call = DrawCall {
            pipeline,
            shader,
            vertex_buffers,
            index_buffer,
            bindings,
            primitive,
            instance_count,
        };
        self.device.draw(&call)?;

        let count = match primitive {
            Primitive::Array { vertex_count, .. } => vertex_count,
            Primitive::Indexed { index_count, .. } => index_count,
        };
        self.stats.draw_calls += 1;
        self.stats.vertices += u64::from(count) * u64::from(instance_count);
        Ok(())
    }
}

/// Fail with `OutOfBounds` unless `offset..offset + size` fits in `len`.
fn check_range(what: &str, len: u64, offset: u64, size: u64) -> Result<(), GraphicsError> {
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(GraphicsError::OutOfBounds(format!(
            "{what}: range {offset}+{size} exceeds {len} bytes"
        ))),
    }
}

fn check_subresource(
    texture: &TextureRef<'_, impl NativeDevice>,
    mip_level: u32,
    array_layer: u32,
) -> Result<(), GraphicsError> {
    let descriptor = texture.descriptor;
    if mip_level >= descriptor.mip_level_count || array_layer >= descriptor.array_layers() {
        return Err(GraphicsError::OutOfBounds(format!(
            "subresource mip {mip_level} layer {array_layer} of a texture with {} mips and {} layers",
            descriptor.mip_level_count,
            descriptor.array_layers()
        )));
    }
    Ok(())
}

fn check_location(
    texture: &TextureRef<'_, impl NativeDevice>,
    location: &TextureCopyLocation,
    region: &TextureCopyRegion,
) -> Result<(), GraphicsError> {
    check_subresource(texture, location.mip_level, location.array_layer)?;
    if !texture
        .descriptor
        .contains_region(location.mip_level, location.origin, region.extent)
    {
        return Err(GraphicsError::OutOfBounds(format!(
            "copy box {:?} at {:?} exceeds mip {}",
            region.extent, location.origin, location.mip_level
        )));
    }
    Ok(())
}

fn require_usage(
    texture: &TextureRef<'_, impl NativeDevice>,
    usage: TextureUsage,
) -> Result<(), GraphicsError> {
    if texture.descriptor.usage().contains(usage) {
        Ok(())
    } else {
        Err(GraphicsError::UnsupportedFormat(format!(
            "{:?} texture with {} samples does not support {usage:?}",
            texture.descriptor.format, texture.descriptor.sample_count
        )))
    }
}

fn texel_bytes(texture: &TextureRef<'_, impl NativeDevice>, region: &TextureCopyRegion) -> u64 {
    region.extent.texel_count() * u64::from(texture.descriptor.format.block_size())
}

impl<D: NativeDevice> CommandContext for PassContext<'_, D> {
    fn pass_name(&self) -> &str {
        self.pass.name
    }

    fn upload_buffer(&mut self, target: ResourceHandle, data: &[u8], offset: u64) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let (buffer, descriptor) = self.resources.buffer(target, None)?;
        self.check_access(target, ResourceAccess::Write)?;
        check_range("upload", descriptor.size, offset, data.len() as u64)?;

        self.device.write_buffer(buffer, offset, data)?;
        self.stats.uploaded_bytes += data.len() as u64;
        Ok(())
    }

    fn upload_texture(
        &mut self,
        texture: ResourceHandle,
        data: &[u8],
        upload: &TextureUpload,
    ) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let target = self.resources.texture(texture)?;
        self.check_access(texture, ResourceAccess::Write)?;

        let descriptor = target.descriptor;
        if upload.format != descriptor.format {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "upload data is {:?}, texture is {:?}",
                upload.format, descriptor.format
            )));
        }
        require_usage(&target, TextureUsage::COPY_DST)?;
        let is_cube = matches!(
            descriptor.dimension,
            TextureDimension::Cube | TextureDimension::CubeArray
        );
        if upload.cube_face.is_some() != is_cube {
            return Err(GraphicsError::InvalidParameter(
                "a cube face is required for cube textures and only for them".to_string(),
            ));
        }

        let layer = upload.layer();
        check_subresource(&target, upload.mip_level, layer)?;
        let (origin, size) = match upload.region {
            Some(region) => (region.origin, region.size),
            None => (Origin3d::ZERO, descriptor.mip_extent(upload.mip_level)),
        };
        if !descriptor.contains_region(upload.mip_level, origin, size) {
            return Err(GraphicsError::OutOfBounds(format!(
                "upload box {size:?} at {origin:?} exceeds mip {}",
                upload.mip_level
            )));
        }
        let expected = size.texel_count() * u64::from(descriptor.format.block_size());
        if (data.len() as u64) < expected {
            return Err(GraphicsError::OutOfBounds(format!(
                "upload needs {expected} bytes, got {}",
                data.len()
            )));
        }

        let write = TextureWrite {
            mip_level: upload.mip_level,
            array_layer: layer,
            origin,
            size,
        };
        self.device
            .write_texture(target, write, &data[..expected as usize])?;
        self.stats.uploaded_bytes += expected;
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        dst: ResourceHandle,
        src: ResourceHandle,
        dst_offset: u64,
        src_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let (src_buffer, src_descriptor) = self.resources.buffer(src, None)?;
        let (dst_buffer, dst_descriptor) = self.resources.buffer(dst, None)?;
        self.check_access(src, ResourceAccess::Read)?;
        self.check_access(dst, ResourceAccess::Write)?;
        check_range("copy source", src_descriptor.size, src_offset, size)?;
        check_range("copy destination", dst_descriptor.size, dst_offset, size)?;

        self.device
            .copy_buffer(src_buffer, src_offset, dst_buffer, dst_offset, size)?;
        self.stats.copied_bytes += size;
        Ok(())
    }

    fn copy_texture(
        &mut self,
        dst: ResourceHandle,
        src: ResourceHandle,
        region: Option<&TextureCopyRegion>,
    ) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let src_texture = self.resources.texture(src)?;
        let dst_texture = self.resources.texture(dst)?;
        self.check_access(src, ResourceAccess::Read)?;
        self.check_access(dst, ResourceAccess::Write)?;

        if src_texture.descriptor.format != dst_texture.descriptor.format {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "cannot copy {:?} into {:?}",
                src_texture.descriptor.format, dst_texture.descriptor.format
            )));
        }
        require_usage(&src_texture, TextureUsage::COPY_SRC)?;
        require_usage(&dst_texture, TextureUsage::COPY_DST)?;

        if let Some(region) = region {
            check_location(&src_texture, &region.src, region)?;
            check_location(&dst_texture, &region.dst, region)?;
            self.device.copy_texture(src_texture, dst_texture, region)?;
            self.stats.copied_bytes += texel_bytes(&src_texture, region);
            return Ok(());
        }

        // Every shared subresource, clipped to the smaller extent.
        let mips = src_texture
            .descriptor
            .mip_level_count
            .min(dst_texture.descriptor.mip_level_count);
        let layers = src_texture
            .descriptor
            .array_layers()
            .min(dst_texture.descriptor.array_layers());
        for mip_level in 0..mips {
            let extent = src_texture
                .descriptor
                .mip_extent(mip_level)
                .min(dst_texture.descriptor.mip_extent(mip_level));
            for array_layer in 0..layers {
                let location = TextureCopyLocation::new(mip_level, array_layer, Origin3d::ZERO);
                let region = TextureCopyRegion::new(location, location, extent);
                self.device.copy_texture(src_texture, dst_texture, &region)?;
                self.stats.copied_bytes += texel_bytes(&src_texture, &region);
            }
        }
        Ok(())
    }

    fn clear_texture_color(&mut self, texture: ResourceHandle, color: [f32; 4]) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let target = self.resources.texture(texture)?;
        self.check_access(texture, ResourceAccess::Write)?;
        if target.descriptor.format.is_depth_stencil() {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{:?} is not a color format",
                target.descriptor.format
            )));
        }
        self.device.clear_texture(target, ClearValue::rgba(color))
    }

    fn clear_texture_depth_stencil(
        &mut self,
        texture: ResourceHandle,
        depth: f32,
        stencil: u32,
    ) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        let target = self.resources.texture(texture)?;
        self.check_access(texture, ResourceAccess::Write)?;
        let format = target.descriptor.format;
        if !format.is_depth_stencil() {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{format:?} is not a depth/stencil format"
            )));
        }
        let value = if format.has_stencil() {
            ClearValue::DepthStencil { depth, stencil }
        } else {
            ClearValue::depth(depth)
        };
        self.device.clear_texture(target, value)
    }

    fn begin_render_pass(
        &mut self,
        colors: &[ColorAttachment],
        depth: Option<DepthAttachment>,
        stencil: Option<StencilAttachment>,
    ) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        if colors.is_empty() && depth.is_none() && stencil.is_none() {
            return Err(GraphicsError::InvalidParameter(
                "render pass has no attachments".to_string(),
            ));
        }

        let mut size = None;
        let mut check_size = |extent: Extent3d| match size {
            None => {
                size = Some((extent.width, extent.height));
                Ok(())
            }
            Some(expected) if expected == (extent.width, extent.height) => Ok(()),
            Some(expected) => Err(GraphicsError::InvalidParameter(format!(
                "attachment size {}x{} differs from {}x{}",
                extent.width, extent.height, expected.0, expected.1
            ))),
        };

        let mut color_targets = Vec::with_capacity(colors.len());
        for attachment in colors {
            let texture = self.resources.texture(attachment.texture)?;
            self.check_access(attachment.texture, ResourceAccess::Write)?;
            if texture.descriptor.format.is_depth_stencil() {
                return Err(GraphicsError::UnsupportedFormat(format!(
                    "{:?} cannot be a color attachment",
                    texture.descriptor.format
                )));
            }
            require_usage(&texture, TextureUsage::RENDER_ATTACHMENT)?;
            check_subresource(&texture, attachment.mip_level, attachment.array_layer)?;
            check_size(texture.descriptor.mip_extent(attachment.mip_level))?;
            color_targets.push(ColorTarget {
                texture,
                mip_level: attachment.mip_level,
                array_layer: attachment.array_layer,
                load_op: attachment.load_op,
                store_op: attachment.store_op,
            });
        }

        let depth_stencil_handle = match (&depth, &stencil) {
            (Some(d), Some(s)) if d.texture != s.texture => {
                return Err(GraphicsError::InvalidParameter(
                    "depth and stencil attachments must use the same texture".to_string(),
                ));
            }
            (Some(d), _) => Some(d.texture),
            (None, Some(s)) => Some(s.texture),
            (None, None) => None,
        };
        let depth_stencil_target = match depth_stencil_handle {
            Some(handle) => {
                let texture = self.resources.texture(handle)?;
                self.check_access(handle, ResourceAccess::Write)?;
                let format = texture.descriptor.format;
                if !format.is_depth_stencil() || (stencil.is_some() && !format.has_stencil()) {
                    return Err(GraphicsError::UnsupportedFormat(format!(
                        "{format:?} cannot be this depth/stencil attachment"
                    )));
                }
                require_usage(&texture, TextureUsage::RENDER_ATTACHMENT)?;
                check_size(texture.descriptor.mip_extent(0))?;
                Some(DepthStencilTarget {
                    texture,
                    depth: depth.map(|d| (d.load_op, d.store_op)),
                    stencil: stencil.map(|s| (s.load_op, s.store_op)),
                })
            }
            None => None,
        };

        let targets = RenderPassTargets {
            label: self.pass.name,
            colors: color_targets,
            depth_stencil: depth_stencil_target,
        };
        self.device.begin_render_pass(&targets)?;
        self.render_pass = Some(OpenPass {
            color_count: colors.len(),
            has_depth_stencil: depth_stencil_handle.is_some(),
            pipeline: None,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), GraphicsError> {
        self.render_pass
            .take()
            .ok_or(GraphicsError::NotInRenderPass)?;
        self.device.end_render_pass()
    }

    fn clear_color_attachment(&mut self, index: usize, color: [f32; 4]) -> Result<(), GraphicsError> {
        let open = self.open_pass()?;
        if index >= open.color_count {
            return Err(GraphicsError::OutOfBounds(format!(
                "color attachment {index} of {}",
                open.color_count
            )));
        }
        self.device
            .clear_attachment(AttachmentClear::Color { index, color })
    }

    fn clear_depth_stencil_attachment(
        &mut self,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<(), GraphicsError> {
        if !self.open_pass()?.has_depth_stencil {
            return Err(GraphicsError::InvalidParameter(
                "render pass has no depth/stencil attachment".to_string(),
            ));
        }
        self.device
            .clear_attachment(AttachmentClear::DepthStencil { depth, stencil })
    }

    fn bind_pipeline(&mut self, pipeline: ResourceHandle) -> Result<(), GraphicsError> {
        self.open_pass()?;
        let (_, shader, vertex_slots) = self.resources.pipeline(pipeline)?;
        let binding_count = shader.bindings().len();
        self.check_access(pipeline, ResourceAccess::Read)?;

        let bound = BoundPipeline {
            handle: pipeline,
            vertex_buffers: vec![None; vertex_slots],
            index_buffer: None,
            slots: std::iter::repeat_with(|| None).take(binding_count).collect(),
        };
        if let Some(open) = self.render_pass.as_mut() {
            open.pipeline = Some(bound);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: ResourceHandle, offset: u64) -> Result<(), GraphicsError> {
        let slot_count = self.bound_pipeline()?.vertex_buffers.len();
        let (_, descriptor) = self.resources.buffer(buffer, Some(BufferKind::Vertex))?;
        self.check_access(buffer, ResourceAccess::Read)?;
        check_range("vertex buffer", descriptor.size, offset, 0)?;
        if slot as usize >= slot_count {
            return Err(GraphicsError::OutOfBounds(format!(
                "vertex slot {slot} of a pipeline with {slot_count} slots"
            )));
        }
        self.bound_pipeline_mut()?.vertex_buffers[slot as usize] = Some((buffer, offset));
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: ResourceHandle,
        format: IndexFormat,
        offset: u64,
    ) -> Result<(), GraphicsError> {
        self.bound_pipeline()?;
        let (_, descriptor) = self.resources.buffer(buffer, Some(BufferKind::Index))?;
        self.check_access(buffer, ResourceAccess::Read)?;
        check_range("index buffer", descriptor.size, offset, 0)?;
        if offset % format.size() != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "index buffer offset {offset} is not aligned to {format:?}"
            )));
        }
        self.bound_pipeline_mut()?.index_buffer = Some((buffer, format, offset));
        Ok(())
    }

    fn bind_texture(&mut self, name: &str, texture: ResourceHandle) -> Result<(), GraphicsError> {
        let (slot, kind) = self.pipeline_slot(name)?;
        if !matches!(kind, BindingKind::Texture { .. }) {
            return Err(GraphicsError::InvalidParameter(format!(
                "binding '{name}' is not a texture"
            )));
        }
        let target = self.resources.texture(texture)?;
        require_usage(&target, TextureUsage::TEXTURE_BINDING)?;
        self.check_access(texture, ResourceAccess::Read)?;
        self.bound_pipeline_mut()?.slots[slot] = Some(SlotResource::Texture(texture));
        Ok(())
    }

    fn bind_shader_buffer(
        &mut self,
        name: &str,
        buffer: ResourceHandle,
        offset: u64,
        size: Option<u64>,
    ) -> Result<(), GraphicsError> {
        let (slot, kind) = self.pipeline_slot(name)?;
        let access = match kind {
            BindingKind::Uniform { .. } | BindingKind::Storage { read_only: true } => {
                ResourceAccess::Read
            }
            BindingKind::Storage { read_only: false } => ResourceAccess::ReadWrite,
            _ => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "binding '{name}' is not a buffer"
                )));
            }
        };
        let (_, descriptor) = self.resources.buffer(buffer, Some(BufferKind::Shader))?;
        self.check_access(buffer, access)?;

        let size = size.unwrap_or_else(|| descriptor.size.saturating_sub(offset));
        check_range("shader buffer binding", descriptor.size, offset, size)?;
        if let BindingKind::Uniform { size: needed } = kind
            && size < needed
        {
            return Err(GraphicsError::OutOfBounds(format!(
                "binding '{name}' needs {needed} bytes, range has {size}"
            )));
        }
        self.bound_pipeline_mut()?.slots[slot] = Some(SlotResource::Buffer {
            handle: buffer,
            offset,
            size,
        });
        Ok(())
    }

    fn set_shader_parameter(&mut self, name: &str, data: &[u8]) -> Result<(), GraphicsError> {
        let (slot, kind) = self.pipeline_slot(name)?;
        let BindingKind::Uniform { size } = kind else {
            return Err(GraphicsError::InvalidParameter(format!(
                "binding '{name}' is not a uniform"
            )));
        };
        if data.len() as u64 > size {
            return Err(GraphicsError::OutOfBounds(format!(
                "binding '{name}' holds {size} bytes, got {}",
                data.len()
            )));
        }
        self.bound_pipeline_mut()?.slots[slot] = Some(SlotResource::Parameter(data.to_vec()));
        Ok(())
    }

    fn draw_array(
        &mut self,
        first_vertex: u32,
        vertex_count: u32,
        instance_count: u32,
    ) -> Result<(), GraphicsError> {
        self.draw(
            Primitive::Array {
                first_vertex,
                vertex_count,
            },
            instance_count,
        )
    }

    fn draw_indexed(
        &mut self,
        first_index: u32,
        index_count: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Result<(), GraphicsError> {
        self.draw(
            Primitive::Indexed {
                first_index,
                index_count,
                base_vertex,
            },
            instance_count,
        )
    }

    fn download_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        self.outside_render_pass()?;
        let (native, descriptor) = self.resources.buffer(buffer, None)?;
        self.check_access(buffer, ResourceAccess::Read)?;
        check_range("download", descriptor.size, offset, size)?;
        self.device.read_buffer(native, offset, size)
    }

    fn download_texture(
        &mut self,
        texture: ResourceHandle,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<Vec<u8>, GraphicsError> {
        self.outside_render_pass()?;
        let source = self.resources.texture(texture)?;
        self.check_access(texture, ResourceAccess::Read)?;
        check_subresource(&source, mip_level, array_layer)?;
        require_usage(&source, TextureUsage::COPY_SRC)?;
        self.device.read_texture(source, mip_level, array_layer)
    }

    fn shader_source(
        &self,
        pipeline: ResourceHandle,
    ) -> Result<Vec<(ShaderStage, String)>, GraphicsError> {
        let (_, shader, _) = self.resources.pipeline(pipeline)?;
        self.check_access(pipeline, ResourceAccess::Read)?;
        Ok(shader.stages().to_vec())
    }

    fn release_stale(&mut self, handle: ResourceHandle) -> Result<(), GraphicsError> {
        self.outside_render_pass()?;
        self.resources.binding(handle)?;
        self.check_access(handle, ResourceAccess::Read)?;
        if !self.resources.state.is_inherited(handle) {
            return Err(GraphicsError::InvalidParameter(format!(
                "{handle} is not an inherited resource"
            )));
        }
        if let Some(key) = self.resources.state.remove_inherited(handle) {
            let destroyed = self.resources.arena.release(key);
            log::debug!(
                "Pass '{}' released stale resource {handle} (destroyed: {destroyed})",
                self.pass.name
            );
        }
        Ok(())
    }
}

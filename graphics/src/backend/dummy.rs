//! CPU-memory device for testing and headless runs.
//!
//! Buffers and textures are plain byte vectors, so uploads, copies, clears and
//! readbacks behave exactly like on a GPU. Draw calls are validated and
//! counted but nothing is rasterized.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{LoadOp, TextureCopyRegion};
use crate::error::GraphicsError;
use crate::shader::CompiledShader;
use crate::types::{
    BufferDescriptor, ClearValue, Extent3d, Origin3d, PipelineDescriptor, TextureDescriptor,
    TextureFormat,
};

use super::{
    AttachmentClear, DrawCall, NativeDevice, RenderPassTargets, TextureRef, TextureWrite,
};

/// Buffer stored in CPU memory.
#[derive(Debug)]
pub struct DummyBuffer {
    data: Mutex<Vec<u8>>,
}

/// Texture stored in CPU memory, one byte vector per (layer, mip) subresource.
#[derive(Debug)]
pub struct DummyTexture {
    mip_levels: u32,
    subresources: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl DummyTexture {
    fn index(&self, mip_level: u32, array_layer: u32) -> usize {
        (array_layer * self.mip_levels + mip_level) as usize
    }
}

/// Pipeline placeholder; only remembers its label.
#[derive(Debug)]
pub struct DummyPipeline {
    label: Option<String>,
}

impl DummyPipeline {
    /// Debug label of the pipeline.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Attachment subresource kept alive while a render pass is open.
struct OpenAttachment {
    subresources: Arc<Mutex<Vec<Vec<u8>>>>,
    index: usize,
    format: TextureFormat,
}

impl OpenAttachment {
    fn clear(&self, value: ClearValue) {
        let mut subresources = self.subresources.lock();
        fill_texels(&mut subresources[self.index], self.format, value);
    }
}

#[derive(Default)]
struct OpenRenderPass {
    colors: Vec<OpenAttachment>,
    depth_stencil: Option<OpenAttachment>,
}

/// CPU-memory [`NativeDevice`].
pub struct DummyDevice {
    max_mip_levels: Option<u32>,
    render_pass: Option<OpenRenderPass>,
    draw_calls: u64,
    presented_frames: u64,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self {
            max_mip_levels: None,
            render_pass: None,
            draw_calls: 0,
            presented_frames: 0,
        }
    }

    /// Limit the number of mip levels textures may have, emulating a device
    /// with a smaller capability.
    pub fn with_max_mip_levels(mut self, max: u32) -> Self {
        self.max_mip_levels = Some(max.max(1));
        self
    }

    /// Draw calls recorded since creation.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Frames presented since creation.
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDevice for DummyDevice {
    type Buffer = DummyBuffer;
    type Texture = DummyTexture;
    type Pipeline = DummyPipeline;

    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<DummyBuffer, GraphicsError> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let size = usize::try_from(descriptor.size).map_err(|_| GraphicsError::OutOfMemory)?;
        Ok(DummyBuffer {
            data: Mutex::new(vec![0; size]),
        })
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<DummyTexture, GraphicsError> {
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{}, {} mips)",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            descriptor.mip_level_count
        );
        if descriptor.mip_level_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture must have at least one mip level".to_string(),
            ));
        }
        let max = self.max_mip_levels(descriptor);
        if descriptor.mip_level_count > max {
            return Err(GraphicsError::MipLevelsUnsupported {
                requested: descriptor.mip_level_count,
                max,
            });
        }

        let mut subresources = Vec::new();
        for _layer in 0..descriptor.array_layers() {
            for level in 0..descriptor.mip_level_count {
                let size = usize::try_from(descriptor.subresource_size(level))
                    .map_err(|_| GraphicsError::OutOfMemory)?;
                subresources.push(vec![0; size]);
            }
        }
        Ok(DummyTexture {
            mip_levels: descriptor.mip_level_count,
            subresources: Arc::new(Mutex::new(subresources)),
        })
    }

    fn max_mip_levels(&self, descriptor: &TextureDescriptor) -> u32 {
        let full = descriptor.full_mip_chain_levels();
        self.max_mip_levels.map_or(full, |limit| limit.min(full))
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
        shader: &CompiledShader,
    ) -> Result<DummyPipeline, GraphicsError> {
        log::trace!(
            "DummyDevice: creating pipeline {:?} ({} bindings)",
            descriptor.label,
            shader.bindings().len()
        );
        Ok(DummyPipeline {
            label: descriptor.label.clone(),
        })
    }

    fn write_buffer(&mut self, buffer: &DummyBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let mut contents = buffer.data.lock();
        let range = byte_range(contents.len(), offset, data.len() as u64)?;
        contents[range].copy_from_slice(data);
        Ok(())
    }

    fn write_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        target: TextureWrite,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let descriptor = texture.descriptor;
        let index = texture.texture.index(target.mip_level, target.array_layer);
        let mut subresources = texture.texture.subresources.lock();
        let layout = SubresourceLayout::new(descriptor, target.mip_level);
        let row = layout.row_bytes(target.size.width);
        for z in 0..target.size.depth {
            for y in 0..target.size.height {
                let src = ((z * target.size.height + y) as usize) * row;
                let dst = layout.offset(Origin3d::new(
                    target.origin.x,
                    target.origin.y + y,
                    target.origin.z + z,
                ));
                subresources[index][dst..dst + row].copy_from_slice(&data[src..src + row]);
            }
        }
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: &DummyBuffer,
        src_offset: u64,
        dst: &DummyBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError> {
        // Read first; src and dst may be the same buffer.
        let bytes = {
            let contents = src.data.lock();
            let range = byte_range(contents.len(), src_offset, size)?;
            contents[range].to_vec()
        };
        self.write_buffer(dst, dst_offset, &bytes)
    }

    fn copy_texture(
        &mut self,
        src: TextureRef<'_, Self>,
        dst: TextureRef<'_, Self>,
        region: &TextureCopyRegion,
    ) -> Result<(), GraphicsError> {
        let extent = region.extent;
        let src_layout = SubresourceLayout::new(src.descriptor, region.src.mip_level);
        let row = src_layout.row_bytes(extent.width);

        let mut rows = Vec::with_capacity(row * (extent.height * extent.depth) as usize);
        {
            let index = src.texture.index(region.src.mip_level, region.src.array_layer);
            let subresources = src.texture.subresources.lock();
            for z in 0..extent.depth {
                for y in 0..extent.height {
                    let origin = region.src.origin;
                    let at = src_layout.offset(Origin3d::new(origin.x, origin.y + y, origin.z + z));
                    rows.extend_from_slice(&subresources[index][at..at + row]);
                }
            }
        }

        self.write_texture(
            dst,
            TextureWrite {
                mip_level: region.dst.mip_level,
                array_layer: region.dst.array_layer,
                origin: region.dst.origin,
                size: extent,
            },
            &rows,
        )
    }

    fn clear_texture(&mut self, texture: TextureRef<'_, Self>, value: ClearValue) -> Result<(), GraphicsError> {
        let format = texture.descriptor.format;
        let mut subresources = texture.texture.subresources.lock();
        for subresource in subresources.iter_mut() {
            fill_texels(subresource, format, value);
        }
        Ok(())
    }

    fn begin_render_pass(&mut self, targets: &RenderPassTargets<'_, Self>) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyDevice: begin render pass '{}' ({} color targets)",
            targets.label,
            targets.colors.len()
        );
        let mut open = OpenRenderPass::default();
        for target in &targets.colors {
            let attachment = OpenAttachment {
                subresources: Arc::clone(&target.texture.texture.subresources),
                index: target.texture.texture.index(target.mip_level, target.array_layer),
                format: target.texture.descriptor.format,
            };
            if let LoadOp::Clear(value) = target.load_op {
                attachment.clear(value);
            }
            open.colors.push(attachment);
        }
        if let Some(target) = &targets.depth_stencil {
            let attachment = OpenAttachment {
                subresources: Arc::clone(&target.texture.texture.subresources),
                index: 0,
                format: target.texture.descriptor.format,
            };
            for ops in [target.depth, target.stencil].into_iter().flatten() {
                if let LoadOp::Clear(value) = ops.0 {
                    attachment.clear(value);
                }
            }
            open.depth_stencil = Some(attachment);
        }
        self.render_pass = Some(open);
        Ok(())
    }

    fn clear_attachment(&mut self, clear: AttachmentClear) -> Result<(), GraphicsError> {
        let pass = self.render_pass.as_ref().ok_or(GraphicsError::NotInRenderPass)?;
        match clear {
            AttachmentClear::Color { index, color } => {
                let attachment = pass.colors.get(index).ok_or_else(|| {
                    GraphicsError::OutOfBounds(format!("color attachment {index}"))
                })?;
                attachment.clear(ClearValue::rgba(color));
            }
            AttachmentClear::DepthStencil { depth, stencil } => {
                let attachment = pass.depth_stencil.as_ref().ok_or_else(|| {
                    GraphicsError::InvalidParameter(
                        "render pass has no depth/stencil attachment".to_string(),
                    )
                })?;
                if let Some(depth) = depth {
                    attachment.clear(ClearValue::Depth(depth));
                }
                if let Some(stencil) = stencil {
                    attachment.clear(ClearValue::Stencil(stencil));
                }
            }
        }
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyDevice: draw {:?} x{} with pipeline {:?}",
            call.primitive,
            call.instance_count,
            call.pipeline.label
        );
        self.draw_calls += 1;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), GraphicsError> {
        self.render_pass.take().map(|_| ()).ok_or(GraphicsError::NotInRenderPass)
    }

    fn read_buffer(&mut self, buffer: &DummyBuffer, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let contents = buffer.data.lock();
        let range = byte_range(contents.len(), offset, size)?;
        Ok(contents[range].to_vec())
    }

    fn read_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<Vec<u8>, GraphicsError> {
        let index = texture.texture.index(mip_level, array_layer);
        let subresources = texture.texture.subresources.lock();
        subresources
            .get(index)
            .cloned()
            .ok_or_else(|| GraphicsError::OutOfBounds(format!("subresource {mip_level}/{array_layer}")))
    }

    fn flush(&mut self) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn present(&mut self, back_buffer: TextureRef<'_, Self>) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyDevice: present {}x{}",
            back_buffer.descriptor.size.width,
            back_buffer.descriptor.size.height
        );
        self.presented_frames += 1;
        Ok(())
    }
}

/// Byte addressing inside one tightly packed subresource.
struct SubresourceLayout {
    extent: Extent3d,
    block_size: usize,
}

impl SubresourceLayout {
    fn new(descriptor: &TextureDescriptor, mip_level: u32) -> Self {
        Self {
            extent: descriptor.mip_extent(mip_level),
            block_size: descriptor.format.block_size() as usize,
        }
    }

    fn row_bytes(&self, width: u32) -> usize {
        width as usize * self.block_size
    }

    fn offset(&self, origin: Origin3d) -> usize {
        let texel = (origin.z as usize * self.extent.height as usize + origin.y as usize)
            * self.extent.width as usize
            + origin.x as usize;
        texel * self.block_size
    }
}

fn byte_range(len: usize, offset: u64, size: u64) -> Result<std::ops::Range<usize>, GraphicsError> {
    let end = offset
        .checked_add(size)
        .filter(|end| *end <= len as u64)
        .ok_or_else(|| {
            GraphicsError::OutOfBounds(format!("range {offset}+{size} exceeds {len} bytes"))
        })?;
    Ok(offset as usize..end as usize)
}

/// Apply a clear to every texel of a subresource.
///
/// Depth/stencil clears only touch the aspect they carry.
fn fill_texels(texels: &mut [u8], format: TextureFormat, value: ClearValue) {
    let block = format.block_size() as usize;
    if format.is_depth_stencil() {
        for texel in texels.chunks_exact_mut(block) {
            if let Some(depth) = value.depth_value() {
                write_depth(texel, format, depth);
            }
            if let Some(stencil) = value.stencil_value() {
                write_stencil(texel, format, stencil);
            }
        }
        return;
    }
    let ClearValue::Color { r, g, b, a } = value else {
        return;
    };
    let encoded = encode_color(format, [r, g, b, a]);
    for texel in texels.chunks_exact_mut(block) {
        texel.copy_from_slice(&encoded);
    }
}

/// Encode an RGBA clear color as one texel of `format`.
pub(crate) fn encode_color(format: TextureFormat, color: [f32; 4]) -> Vec<u8> {
    let [r, g, b, a] = color;
    let f16 = |v: f32| half::f16::from_f32(v).to_le_bytes();
    match format {
        TextureFormat::R8Unorm => vec![unorm8(r)],
        TextureFormat::R8Snorm => vec![snorm8(r) as u8],
        TextureFormat::R8Uint => vec![r.clamp(0.0, 255.0) as u8],
        TextureFormat::R8Sint => vec![r.clamp(-128.0, 127.0) as i8 as u8],
        TextureFormat::R16Unorm => ((r.clamp(0.0, 1.0) * 65535.0).round() as u16)
            .to_le_bytes()
            .to_vec(),
        TextureFormat::R16Float => f16(r).to_vec(),
        TextureFormat::Rg8Unorm => vec![unorm8(r), unorm8(g)],
        TextureFormat::R32Float => r.to_le_bytes().to_vec(),
        TextureFormat::R32Uint => (r.max(0.0) as u32).to_le_bytes().to_vec(),
        TextureFormat::Rg16Float => [f16(r), f16(g)].concat(),
        TextureFormat::Rgba8Unorm => vec![unorm8(r), unorm8(g), unorm8(b), unorm8(a)],
        TextureFormat::Rgba8UnormSrgb => vec![
            unorm8(linear_to_srgb(r)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(b)),
            unorm8(a),
        ],
        TextureFormat::Bgra8Unorm => vec![unorm8(b), unorm8(g), unorm8(r), unorm8(a)],
        TextureFormat::Bgra8UnormSrgb => vec![
            unorm8(linear_to_srgb(b)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(r)),
            unorm8(a),
        ],
        TextureFormat::Rgba16Float => [f16(r), f16(g), f16(b), f16(a)].concat(),
        TextureFormat::Rg32Float => bytemuck::cast_slice(&[r, g]).to_vec(),
        TextureFormat::Rgba32Float => bytemuck::cast_slice(&color).to_vec(),
        TextureFormat::Depth16Unorm
        | TextureFormat::Depth24Plus
        | TextureFormat::Depth24PlusStencil8
        | TextureFormat::Depth32Float
        | TextureFormat::Depth32FloatStencil8 => vec![0; format.block_size() as usize],
    }
}

fn write_depth(texel: &mut [u8], format: TextureFormat, depth: f32) {
    let depth = depth.clamp(0.0, 1.0);
    match format {
        TextureFormat::Depth16Unorm => {
            texel[..2].copy_from_slice(&((depth * 65535.0).round() as u16).to_le_bytes());
        }
        TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => {
            let value = (depth * 16_777_215.0).round() as u32;
            texel[..3].copy_from_slice(&value.to_le_bytes()[..3]);
        }
        TextureFormat::Depth32Float | TextureFormat::Depth32FloatStencil8 => {
            texel[..4].copy_from_slice(&depth.to_le_bytes());
        }
        _ => {}
    }
}

fn write_stencil(texel: &mut [u8], format: TextureFormat, stencil: u32) {
    match format {
        TextureFormat::Depth24PlusStencil8 => texel[3] = stencil as u8,
        TextureFormat::Depth32FloatStencil8 => texel[4] = stencil as u8,
        _ => {}
    }
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn snorm8(value: f32) -> i8 {
    (value.clamp(-1.0, 1.0) * 127.0).round() as i8
}

fn linear_to_srgb(value: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

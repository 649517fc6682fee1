//! Native device abstraction.
//!
//! A backend only implements [`NativeDevice`], a thin set of native calls
//! over its own buffer, texture and pipeline objects. Everything above it
//! (compilation, inheritance, the command-context contract, presentation
//! policy) is shared by every backend through
//! [`GraphRuntime`](crate::runtime::GraphRuntime).
//!
//! # Available Backends
//!
//! - `dummy` (default): CPU-memory device for tests and headless runs
//! - `wgpu-backend` (default): Cross-platform backend using wgpu

pub mod dummy;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

pub use dummy::DummyDevice;
#[cfg(feature = "wgpu-backend")]
pub use wgpu_impl::WgpuDevice;

use crate::context::{LoadOp, StoreOp, TextureCopyRegion};
use crate::error::GraphicsError;
use crate::shader::CompiledShader;
use crate::types::{
    BufferDescriptor, ClearValue, IndexFormat, Origin3d, Extent3d, PipelineDescriptor,
    TextureDescriptor,
};

/// A texture together with the descriptor it was created from.
pub struct TextureRef<'a, D: NativeDevice> {
    /// Backend texture.
    pub texture: &'a D::Texture,
    /// Creation descriptor.
    pub descriptor: &'a TextureDescriptor,
}

impl<D: NativeDevice> Clone for TextureRef<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: NativeDevice> Copy for TextureRef<'_, D> {}

/// Destination of a texel upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureWrite {
    /// Mip level.
    pub mip_level: u32,
    /// Array layer (cube faces counted as layers).
    pub array_layer: u32,
    /// Texel offset.
    pub origin: Origin3d,
    /// Size of the written box.
    pub size: Extent3d,
}

/// One color target of a render pass.
pub struct ColorTarget<'a, D: NativeDevice> {
    /// Target texture.
    pub texture: TextureRef<'a, D>,
    /// Mip level rendered to.
    pub mip_level: u32,
    /// Layer rendered to.
    pub array_layer: u32,
    /// Load operation.
    pub load_op: LoadOp,
    /// Store operation.
    pub store_op: StoreOp,
}

/// Depth/stencil target of a render pass.
pub struct DepthStencilTarget<'a, D: NativeDevice> {
    /// Target texture.
    pub texture: TextureRef<'a, D>,
    /// Depth operations, if the depth aspect is used.
    pub depth: Option<(LoadOp, StoreOp)>,
    /// Stencil operations, if the stencil aspect is used.
    pub stencil: Option<(LoadOp, StoreOp)>,
}

/// Attachments of a render pass.
pub struct RenderPassTargets<'a, D: NativeDevice> {
    /// Label, normally the graph pass name.
    pub label: &'a str,
    /// Color targets in attachment order.
    pub colors: Vec<ColorTarget<'a, D>>,
    /// Optional depth/stencil target.
    pub depth_stencil: Option<DepthStencilTarget<'a, D>>,
}

/// Clear issued inside an open render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachmentClear {
    /// Clear one color attachment.
    Color {
        /// Attachment index.
        index: usize,
        /// RGBA value.
        color: [f32; 4],
    },
    /// Clear the depth and/or stencil aspect.
    DepthStencil {
        /// Depth value.
        depth: Option<f32>,
        /// Stencil value.
        stencil: Option<u32>,
    },
}

/// Resource bound to one pipeline binding slot at draw time.
pub enum BoundResource<'a, D: NativeDevice> {
    /// Sampled texture.
    Texture(TextureRef<'a, D>),
    /// Buffer range.
    Buffer {
        /// Backend buffer.
        buffer: &'a D::Buffer,
        /// Byte offset.
        offset: u64,
        /// Byte size.
        size: u64,
    },
    /// Uniform bytes set with `set_shader_parameter`.
    Parameter(&'a [u8]),
    /// Sampler slot; the backend supplies its own sampler.
    Sampler,
}

/// What a draw call rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Non-indexed draw.
    Array {
        /// First vertex.
        first_vertex: u32,
        /// Vertex count.
        vertex_count: u32,
    },
    /// Indexed draw.
    Indexed {
        /// First index.
        first_index: u32,
        /// Index count.
        index_count: u32,
        /// Value added to each index.
        base_vertex: i32,
    },
}

/// Fully resolved draw.
pub struct DrawCall<'a, D: NativeDevice> {
    /// Bound pipeline.
    pub pipeline: &'a D::Pipeline,
    /// The pipeline's compiled shader.
    pub shader: &'a CompiledShader,
    /// Vertex buffers with offsets, in slot order.
    pub vertex_buffers: Vec<(&'a D::Buffer, u64)>,
    /// Index buffer, format and offset.
    pub index_buffer: Option<(&'a D::Buffer, IndexFormat, u64)>,
    /// Resources in the shader's binding slot order.
    pub bindings: Vec<BoundResource<'a, D>>,
    /// Primitive range.
    pub primitive: Primitive,
    /// Instance count.
    pub instance_count: u32,
}

/// Thin native-call interface a backend implements.
///
/// Calls arrive already validated against the command-context contract:
/// handles are resolved, kinds and bounds are checked, and render-pass
/// nesting is correct.
pub trait NativeDevice: Send + 'static {
    /// Backend buffer object.
    type Buffer: Send + 'static;
    /// Backend texture object.
    type Texture: Send + 'static;
    /// Backend pipeline object.
    type Pipeline: Send + 'static;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Create a buffer.
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Self::Buffer, GraphicsError>;

    /// Create a texture.
    ///
    /// Fails with [`GraphicsError::MipLevelsUnsupported`] when the mip count
    /// exceeds [`NativeDevice::max_mip_levels`].
    fn create_texture(&mut self, descriptor: &TextureDescriptor)
    -> Result<Self::Texture, GraphicsError>;

    /// Largest mip count this device accepts for `descriptor`.
    fn max_mip_levels(&self, descriptor: &TextureDescriptor) -> u32;

    /// Create a pipeline from its descriptor and compiled shader.
    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
        shader: &CompiledShader,
    ) -> Result<Self::Pipeline, GraphicsError>;

    /// Write bytes into a buffer.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Write tightly packed texels into a texture box.
    fn write_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        target: TextureWrite,
        data: &[u8],
    ) -> Result<(), GraphicsError>
    where
        Self: Sized;

    /// Copy a byte range between buffers.
    fn copy_buffer(
        &mut self,
        src: &Self::Buffer,
        src_offset: u64,
        dst: &Self::Buffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError>;

    /// Copy a box between textures of the same format.
    fn copy_texture(
        &mut self,
        src: TextureRef<'_, Self>,
        dst: TextureRef<'_, Self>,
        region: &TextureCopyRegion,
    ) -> Result<(), GraphicsError>
    where
        Self: Sized;

    /// Clear every subresource of a texture.
    fn clear_texture(&mut self, texture: TextureRef<'_, Self>, value: ClearValue)
    -> Result<(), GraphicsError>
    where
        Self: Sized;

    /// Open a render pass.
    fn begin_render_pass(&mut self, targets: &RenderPassTargets<'_, Self>) -> Result<(), GraphicsError>
    where
        Self: Sized;

    /// Clear an attachment of the open render pass.
    fn clear_attachment(&mut self, clear: AttachmentClear) -> Result<(), GraphicsError>;

    /// Record a draw in the open render pass.
    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), GraphicsError>
    where
        Self: Sized;

    /// Close the open render pass.
    fn end_render_pass(&mut self) -> Result<(), GraphicsError>;

    /// Read back a buffer range, waiting for pending work.
    fn read_buffer(&mut self, buffer: &Self::Buffer, offset: u64, size: u64)
    -> Result<Vec<u8>, GraphicsError>;

    /// Read back one tightly packed subresource, waiting for pending work.
    fn read_texture(
        &mut self,
        texture: TextureRef<'_, Self>,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<Vec<u8>, GraphicsError>
    where
        Self: Sized;

    /// Submit recorded work.
    fn flush(&mut self) -> Result<(), GraphicsError>;

    /// The runtime reallocated its back buffer at a new size.
    fn back_buffer_resized(&mut self, _width: u32, _height: u32) {}

    /// Flush and copy the back buffer to the window surface.
    ///
    /// May return [`GraphicsError::SurfaceOutdated`] or
    /// [`GraphicsError::SurfaceLost`]; the runtime ignores both.
    fn present(&mut self, back_buffer: TextureRef<'_, Self>) -> Result<(), GraphicsError>
    where
        Self: Sized;
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}

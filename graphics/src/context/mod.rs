//! The command interface a pass callback records into.
//!
//! A [`CommandContext`] is handed to each pass callback during execution. It
//! resolves graph handles against the compiled state of the graph being
//! executed and forwards commands to the backend. The same recorder drives
//! every backend, so the rules below hold everywhere:
//!
//! - Uploads, copies and whole-texture clears are only allowed outside a
//!   render pass.
//! - Binding, attachment clears and draws are only allowed inside one.
//! - A render pass must be ended before the pass callback returns.
//!
//! # Example
//!
//! ```ignore
//! builder.add_pass("draw", move |ctx| {
//!     ctx.upload_buffer(vertices, bytemuck::cast_slice(&TRIANGLE), 0)?;
//!     ctx.begin_render_pass(&[ColorAttachment::new(color).with_clear_color(0.0, 0.0, 0.0, 1.0)], None, None)?;
//!     ctx.bind_pipeline(pipeline)?;
//!     ctx.bind_vertex_buffer(0, vertices, 0)?;
//!     ctx.draw_array(0, 3, 1)?;
//!     ctx.end_render_pass()
//! });
//! ```

mod target;
mod transfer;

pub use target::{
    ColorAttachment, DepthAttachment, DepthStencilAttachment, LoadOp, StencilAttachment, StoreOp,
};
pub use transfer::{TextureCopyLocation, TextureCopyRegion, TextureRegion, TextureUpload};

use crate::error::GraphicsError;
use crate::graph::ResourceHandle;
use crate::shader::ShaderStage;
use crate::types::IndexFormat;

/// Commands available to a pass callback.
///
/// Every method that takes a handle fails with
/// [`GraphicsError::InvalidResourceHandle`] if the handle does not resolve in
/// the compiled state of the executing graph, and with
/// [`GraphicsError::ResourceKindMismatch`] if it names the wrong kind of
/// resource.
pub trait CommandContext {
    /// Name of the executing pass.
    fn pass_name(&self) -> &str;

    // ------------------------------------------------------------------
    // Transfers (outside render passes)
    // ------------------------------------------------------------------

    /// Write `data` into any buffer at `offset`.
    fn upload_buffer(&mut self, target: ResourceHandle, data: &[u8], offset: u64)
    -> Result<(), GraphicsError>;

    /// Write texel data into a texture subresource.
    fn upload_texture(
        &mut self,
        texture: ResourceHandle,
        data: &[u8],
        upload: &TextureUpload,
    ) -> Result<(), GraphicsError>;

    /// Copy `size` bytes between two buffers.
    fn copy_buffer(
        &mut self,
        dst: ResourceHandle,
        src: ResourceHandle,
        dst_offset: u64,
        src_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError>;

    /// Copy between textures of the same format.
    ///
    /// Without a region, every mip level and layer the two textures share is
    /// copied, clipped to the smaller extent. This is the migration path for
    /// a grown texture inherited as a stale resource.
    fn copy_texture(
        &mut self,
        dst: ResourceHandle,
        src: ResourceHandle,
        region: Option<&TextureCopyRegion>,
    ) -> Result<(), GraphicsError>;

    /// Clear every subresource of a color texture.
    fn clear_texture_color(&mut self, texture: ResourceHandle, color: [f32; 4])
    -> Result<(), GraphicsError>;

    /// Clear every subresource of a depth/stencil texture.
    fn clear_texture_depth_stencil(
        &mut self,
        texture: ResourceHandle,
        depth: f32,
        stencil: u32,
    ) -> Result<(), GraphicsError>;

    // ------------------------------------------------------------------
    // Render passes
    // ------------------------------------------------------------------

    /// Open a render pass with separate depth and stencil attachments.
    ///
    /// When both are given they must name the same texture.
    fn begin_render_pass(
        &mut self,
        colors: &[ColorAttachment],
        depth: Option<DepthAttachment>,
        stencil: Option<StencilAttachment>,
    ) -> Result<(), GraphicsError>;

    /// Open a render pass with a combined depth/stencil attachment.
    fn begin_render_pass_depth_stencil(
        &mut self,
        colors: &[ColorAttachment],
        depth_stencil: Option<DepthStencilAttachment>,
    ) -> Result<(), GraphicsError> {
        match depth_stencil {
            Some(attachment) => {
                let (depth, stencil) = attachment.split();
                self.begin_render_pass(colors, Some(depth), Some(stencil))
            }
            None => self.begin_render_pass(colors, None, None),
        }
    }

    /// Close the current render pass.
    fn end_render_pass(&mut self) -> Result<(), GraphicsError>;

    /// Clear one color attachment of the current render pass.
    fn clear_color_attachment(&mut self, index: usize, color: [f32; 4]) -> Result<(), GraphicsError>;

    /// Clear the depth/stencil attachment of the current render pass.
    fn clear_depth_stencil_attachment(
        &mut self,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<(), GraphicsError>;

    // ------------------------------------------------------------------
    // Binding and drawing (inside render passes)
    // ------------------------------------------------------------------

    /// Bind a pipeline; resets all resource bindings.
    fn bind_pipeline(&mut self, pipeline: ResourceHandle) -> Result<(), GraphicsError>;

    /// Bind a vertex buffer to a slot of the bound pipeline.
    fn bind_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: ResourceHandle,
        offset: u64,
    ) -> Result<(), GraphicsError>;

    /// Bind the index buffer.
    fn bind_index_buffer(
        &mut self,
        buffer: ResourceHandle,
        format: IndexFormat,
        offset: u64,
    ) -> Result<(), GraphicsError>;

    /// Bind a texture to a named pipeline binding.
    fn bind_texture(&mut self, name: &str, texture: ResourceHandle) -> Result<(), GraphicsError>;

    /// Bind a range of a shader buffer to a named pipeline binding.
    ///
    /// `size` of `None` binds to the end of the buffer.
    fn bind_shader_buffer(
        &mut self,
        name: &str,
        buffer: ResourceHandle,
        offset: u64,
        size: Option<u64>,
    ) -> Result<(), GraphicsError>;

    /// Set the bytes of a named uniform binding.
    fn set_shader_parameter(&mut self, name: &str, data: &[u8]) -> Result<(), GraphicsError>;

    /// Non-indexed draw.
    fn draw_array(
        &mut self,
        first_vertex: u32,
        vertex_count: u32,
        instance_count: u32,
    ) -> Result<(), GraphicsError>;

    /// Indexed draw.
    fn draw_indexed(
        &mut self,
        first_index: u32,
        index_count: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Result<(), GraphicsError>;

    // ------------------------------------------------------------------
    // Readback and diagnostics
    // ------------------------------------------------------------------

    /// Read back a range of any buffer. Flushes pending GPU work.
    fn download_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError>;

    /// Read back one subresource of a texture, tightly packed.
    ///
    /// Flushes pending GPU work; expensive.
    fn download_texture(
        &mut self,
        texture: ResourceHandle,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<Vec<u8>, GraphicsError>;

    /// Per-stage shader source of a compiled pipeline.
    fn shader_source(
        &self,
        pipeline: ResourceHandle,
    ) -> Result<Vec<(ShaderStage, String)>, GraphicsError>;

    /// Drop an inherited handle from the compiled state once its contents
    /// have been migrated. The backend object is destroyed when nothing else
    /// references it.
    fn release_stale(&mut self, handle: ResourceHandle) -> Result<(), GraphicsError>;
}

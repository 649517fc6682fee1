//! # RedLilium Render Graph
//!
//! Compile, execute and incrementally recompile render graphs.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphBuilder`] - Declares resources and passes, producing a [`GraphDescriptor`]
//! - [`RenderGraphRuntime`] - Compiles descriptors into persistent graphs behind a [`GraphToken`]
//! - [`CommandContext`] - The command surface each pass callback records into
//! - Multiple backend support: wgpu and Dummy (for testing)
//!
//! Recompiling a graph allocates fresh resources for the new descriptor while
//! sharing any resource it inherits from the previous one, so data can be
//! migrated between the two in the first execution after a recompile.
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_rendergraph::{GraphBuilder, RuntimeParameters, create_runtime};
//!
//! let mut runtime = create_runtime(&RuntimeParameters::new())?;
//! let mut builder = GraphBuilder::new();
//! let color = builder.back_buffer_color();
//! let pass = builder.add_pass("clear", move |ctx| {
//!     ctx.clear_texture_color(color, [0.1, 0.1, 0.1, 1.0])
//! });
//! builder.write(pass, color);
//! let token = runtime.compile(builder.build())?;
//! runtime.execute(token)?;
//! ```

pub mod profiling;

pub mod backend;
pub mod context;
pub mod error;
pub mod graph;
pub mod instance;
pub mod runtime;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use backend::{DummyDevice, NativeDevice};
#[cfg(feature = "wgpu-backend")]
pub use backend::WgpuDevice;
pub use context::{
    ColorAttachment, CommandContext, DepthAttachment, DepthStencilAttachment, LoadOp,
    StencilAttachment, StoreOp, TextureCopyLocation, TextureCopyRegion, TextureRegion,
    TextureUpload,
};
pub use error::GraphicsError;
pub use graph::{GraphBuilder, GraphDescriptor, GraphId, PassHandle, ResourceAccess, ResourceHandle};
pub use instance::{BackendType, RuntimeParameters, WgpuBackendType, create_runtime};
pub use runtime::{
    ExecuteStatistics, GraphRuntime, GraphToken, RenderGraphRuntime, VramUsage, WindowSurface,
};
pub use shader::{NagaShaderCompiler, ShaderCompiler, ShaderStage};
pub use types::{
    BlendMode, BufferKind, ClearValue, CompareFunction, CullMode, Extent3d, IndexFormat, Origin3d,
    PipelineDescriptor, PrimitiveTopology, ShaderBufferDescriptor, ShaderBufferLayout, ShaderType,
    TextureDescriptor, TextureDimension, TextureFormat, VertexAttributeFormat,
    VertexBufferLayout,
};

/// Render graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

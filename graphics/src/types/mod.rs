//! Common types and descriptors for graph resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used by graph builders, command contexts and backends.

mod buffer;
mod common;
mod pipeline;
mod texture;

pub(crate) use buffer::align_to;
pub use buffer::{
    BufferDescriptor, BufferKind, BufferUsage, IndexFormat, ShaderBufferDescriptor,
    ShaderBufferLayout, ShaderType,
};
pub use common::{ClearValue, Extent3d, Origin3d};
pub use pipeline::{
    BlendMode, ColorTargetState, CompareFunction, CullMode, DepthStencilState,
    PipelineDescriptor, PrimitiveTopology, VertexAttribute, VertexAttributeFormat,
    VertexBufferLayout, VertexStepMode,
};
pub use texture::{CubeFace, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage};

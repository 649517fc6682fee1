//! Shader compilation and binding reflection.
//!
//! Pipelines are compiled once, when a graph is compiled. The
//! [`ShaderCompiler`] resolves the final per-stage source and reflects the
//! shader's resource bindings into a [`CompiledShader`], whose binding table
//! maps binding names to slots. Command contexts resolve `bind_texture`,
//! `bind_shader_buffer` and `set_shader_parameter` through that table.
//!
//! # Example
//!
//! ```ignore
//! use redlilium_rendergraph::shader::{NagaShaderCompiler, ShaderCompiler};
//!
//! let mut compiler = NagaShaderCompiler::new();
//! compiler.register_include("common/camera.wgsl", CAMERA_WGSL);
//! let compiled = compiler.compile(&descriptor)?;
//! assert!(compiled.binding("camera").is_some());
//! ```

mod composer;
mod reflect;

use std::collections::HashMap;

use bitflags::bitflags;

pub use composer::ShaderComposer;
pub use reflect::NagaShaderCompiler;

use crate::error::GraphicsError;
use crate::types::{PipelineDescriptor, TextureDimension};

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

bitflags! {
    /// Set of stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Fragment stage.
        const FRAGMENT = 1 << 1;
    }
}

/// Scalar type a texture binding returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    /// Floating point.
    Float,
    /// Depth comparison texture.
    Depth,
    /// Signed integer.
    Sint,
    /// Unsigned integer.
    Uint,
}

/// What a shader binding expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Uniform block of a fixed size; satisfied by `set_shader_parameter`
    /// or `bind_shader_buffer`.
    Uniform {
        /// Block size in bytes.
        size: u64,
    },
    /// Storage buffer; satisfied by `bind_shader_buffer`.
    Storage {
        /// Whether the shader only reads it.
        read_only: bool,
    },
    /// Sampled texture; satisfied by `bind_texture`.
    Texture {
        /// View dimension.
        dimension: TextureDimension,
        /// Returned scalar type.
        sample_type: TextureSampleType,
        /// Whether the texture is multisampled.
        multisampled: bool,
    },
    /// Sampler; supplied by the backend.
    Sampler {
        /// Comparison sampler.
        comparison: bool,
    },
}

/// One reflected resource binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderBinding {
    /// Variable name in the shader.
    pub name: String,
    /// Bind group index.
    pub group: u32,
    /// Binding index within the group.
    pub binding: u32,
    /// Expected resource.
    pub kind: BindingKind,
    /// Stages that use the binding.
    pub visibility: ShaderStages,
}

/// Output of pipeline shader compilation.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stages: Vec<(ShaderStage, String)>,
    vertex_entry: String,
    fragment_entry: Option<String>,
    bindings: Vec<ShaderBinding>,
    slots: HashMap<String, usize>,
}

impl CompiledShader {
    /// Assemble a compiled shader. Bindings are sorted by group and binding;
    /// the binding table is built from their names.
    pub fn new(
        stages: Vec<(ShaderStage, String)>,
        vertex_entry: String,
        fragment_entry: Option<String>,
        mut bindings: Vec<ShaderBinding>,
    ) -> Self {
        bindings.sort_by_key(|b| (b.group, b.binding));
        let slots = bindings
            .iter()
            .enumerate()
            .map(|(slot, b)| (b.name.clone(), slot))
            .collect();
        Self {
            stages,
            vertex_entry,
            fragment_entry,
            bindings,
            slots,
        }
    }

    /// Per-stage source after include resolution.
    pub fn stages(&self) -> &[(ShaderStage, String)] {
        &self.stages
    }

    /// Source of one stage.
    pub fn source(&self, stage: ShaderStage) -> Option<&str> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, src)| src.as_str())
    }

    /// Vertex entry point.
    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    /// Fragment entry point.
    pub fn fragment_entry(&self) -> Option<&str> {
        self.fragment_entry.as_deref()
    }

    /// Reflected bindings in slot order.
    pub fn bindings(&self) -> &[ShaderBinding] {
        &self.bindings
    }

    /// Slot of a named binding.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Named binding.
    pub fn binding(&self, name: &str) -> Option<&ShaderBinding> {
        self.slot(name).map(|slot| &self.bindings[slot])
    }

    /// Number of bind groups the pipeline layout needs.
    pub fn group_count(&self) -> u32 {
        self.bindings.iter().map(|b| b.group + 1).max().unwrap_or(0)
    }
}

/// Turns pipeline descriptors into compiled shaders.
pub trait ShaderCompiler: Send {
    /// Resolve, validate and reflect the pipeline's shader.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ShaderCompilationFailed`] if the source does
    /// not parse or validate, or an entry point is missing.
    fn compile(&self, descriptor: &PipelineDescriptor) -> Result<CompiledShader, GraphicsError>;
}

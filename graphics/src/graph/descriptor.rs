//! The immutable output of a graph builder.

use std::collections::{BTreeMap, HashMap};

use crate::error::GraphicsError;
use crate::types::{PipelineDescriptor, ShaderBufferDescriptor, TextureDescriptor};

use super::{GraphId, Pass, ResourceHandle};

/// What a handle refers to within one descriptor.
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    /// Vertex buffer of the given size.
    VertexBuffer(u64),
    /// Index buffer of the given size.
    IndexBuffer(u64),
    /// Shader buffer.
    ShaderBuffer(&'a ShaderBufferDescriptor),
    /// Texture.
    Texture(&'a TextureDescriptor),
    /// Pipeline.
    Pipeline(&'a PipelineDescriptor),
    /// Alias of a handle from the previous compilation of the same graph.
    Inherited(ResourceHandle),
    /// The shared back-buffer color target.
    BackBufferColor,
    /// The shared back-buffer depth/stencil target.
    BackBufferDepthStencil,
}

/// Complete description of one graph: ordered passes, resource allocations
/// and inheritance from a previous compilation.
///
/// Produced by [`GraphBuilder::build`](super::GraphBuilder::build) and
/// consumed by `compile` or `recompile`.
#[derive(Debug)]
pub struct GraphDescriptor {
    pub(crate) id: GraphId,
    pub(crate) passes: Vec<Pass>,
    pub(crate) vertex_buffers: BTreeMap<ResourceHandle, u64>,
    pub(crate) index_buffers: BTreeMap<ResourceHandle, u64>,
    pub(crate) shader_buffers: BTreeMap<ResourceHandle, ShaderBufferDescriptor>,
    pub(crate) textures: BTreeMap<ResourceHandle, TextureDescriptor>,
    pub(crate) pipelines: BTreeMap<ResourceHandle, PipelineDescriptor>,
    pub(crate) inherited: BTreeMap<ResourceHandle, ResourceHandle>,
    pub(crate) allows_inheritance: bool,
}

impl GraphDescriptor {
    /// Identity shared by every handle of this descriptor.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Passes in execution order.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Number of passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Number of resources that need a fresh backend allocation.
    pub fn resource_count(&self) -> usize {
        self.vertex_buffers.len()
            + self.index_buffers.len()
            + self.shader_buffers.len()
            + self.textures.len()
            + self.pipelines.len()
    }

    /// Inheritance table: new handle to previous handle.
    pub fn inherited(&self) -> &BTreeMap<ResourceHandle, ResourceHandle> {
        &self.inherited
    }

    /// Whether this descriptor was built for a recompile.
    pub fn allows_inheritance(&self) -> bool {
        self.allows_inheritance
    }

    /// Look up what `handle` refers to.
    pub fn declaration(&self, handle: ResourceHandle) -> Option<Declaration<'_>> {
        if handle.graph() != self.id {
            return None;
        }
        if handle.is_back_buffer_color() {
            return Some(Declaration::BackBufferColor);
        }
        if handle.is_back_buffer_depth_stencil() {
            return Some(Declaration::BackBufferDepthStencil);
        }
        if let Some(size) = self.vertex_buffers.get(&handle) {
            return Some(Declaration::VertexBuffer(*size));
        }
        if let Some(size) = self.index_buffers.get(&handle) {
            return Some(Declaration::IndexBuffer(*size));
        }
        if let Some(desc) = self.shader_buffers.get(&handle) {
            return Some(Declaration::ShaderBuffer(desc));
        }
        if let Some(desc) = self.textures.get(&handle) {
            return Some(Declaration::Texture(desc));
        }
        if let Some(desc) = self.pipelines.get(&handle) {
            return Some(Declaration::Pipeline(desc));
        }
        self.inherited
            .get(&handle)
            .map(|old| Declaration::Inherited(*old))
    }

    /// Check the structural invariants of the descriptor.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidResourceHandle`] if a pass accesses a handle
    ///   that is not declared in this descriptor.
    /// - [`GraphicsError::InvalidParameter`] if a handle is declared twice or
    ///   belongs to another descriptor.
    /// - [`GraphicsError::InheritanceWithoutPrevious`] if the descriptor
    ///   inherits resources but was built for an initial compile.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if !self.inherited.is_empty() && !self.allows_inheritance {
            return Err(GraphicsError::InheritanceWithoutPrevious);
        }

        let mut seen: HashMap<ResourceHandle, usize> = HashMap::new();
        let declared = self
            .vertex_buffers
            .keys()
            .chain(self.index_buffers.keys())
            .chain(self.shader_buffers.keys())
            .chain(self.textures.keys())
            .chain(self.pipelines.keys())
            .chain(self.inherited.keys());
        for handle in declared {
            if handle.graph() != self.id || handle.is_back_buffer() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "handle {handle} does not belong to graph {}",
                    self.id.value()
                )));
            }
            *seen.entry(*handle).or_default() += 1;
        }
        if let Some((handle, _)) = seen.iter().find(|(_, count)| **count > 1) {
            return Err(GraphicsError::InvalidParameter(format!(
                "handle {handle} is declared more than once"
            )));
        }

        for old in self.inherited.values() {
            if old.graph() == self.id {
                return Err(GraphicsError::InvalidParameter(format!(
                    "handle {old} cannot inherit from its own graph"
                )));
            }
        }

        for pass in &self.passes {
            for handle in pass.accessed() {
                if self.declaration(*handle).is_none() {
                    return Err(GraphicsError::InvalidResourceHandle(*handle));
                }
            }
        }
        Ok(())
    }
}

//! Mutable construction of graph descriptors.

use std::collections::BTreeMap;

use crate::error::GraphicsError;
use crate::types::{PipelineDescriptor, ShaderBufferDescriptor, TextureDescriptor};

use super::{
    GraphDescriptor, GraphId, Pass, PassCallback, PassHandle, ResourceAccess, ResourceHandle,
};

/// Builder for a [`GraphDescriptor`].
///
/// Each `create_*` call returns a fresh handle; handles are never reused
/// within a builder. Passes execute in the order they are added.
///
/// Use [`GraphBuilder::new`] for a graph that will be compiled for the first
/// time, and [`GraphBuilder::inheriting`] for a graph passed to `recompile`,
/// which may carry resources over from the previous compilation.
///
/// # Example
///
/// ```ignore
/// let mut builder = GraphBuilder::new();
/// let vertices = builder.create_vertex_buffer(64);
/// let pass = builder.add_pass("upload", move |ctx| {
///     ctx.upload_buffer(vertices, &[0u8; 64], 0)
/// });
/// builder.write(pass, vertices);
/// let token = runtime.compile(builder.build())?;
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    id: GraphId,
    next_index: u32,
    passes: Vec<Pass>,
    vertex_buffers: BTreeMap<ResourceHandle, u64>,
    index_buffers: BTreeMap<ResourceHandle, u64>,
    shader_buffers: BTreeMap<ResourceHandle, ShaderBufferDescriptor>,
    textures: BTreeMap<ResourceHandle, TextureDescriptor>,
    pipelines: BTreeMap<ResourceHandle, PipelineDescriptor>,
    inherited: BTreeMap<ResourceHandle, ResourceHandle>,
    allows_inheritance: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a builder for an initial compile.
    pub fn new() -> Self {
        Self {
            id: GraphId::next(),
            next_index: ResourceHandle::FIRST_DECLARED,
            passes: Vec::new(),
            vertex_buffers: BTreeMap::new(),
            index_buffers: BTreeMap::new(),
            shader_buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            inherited: BTreeMap::new(),
            allows_inheritance: false,
        }
    }

    /// Create a builder for a recompile; it may inherit resources.
    pub fn inheriting() -> Self {
        Self {
            allows_inheritance: true,
            ..Self::new()
        }
    }

    /// Identity shared by every handle this builder creates.
    pub fn id(&self) -> GraphId {
        self.id
    }

    fn next_handle(&mut self) -> ResourceHandle {
        let handle = ResourceHandle::new(self.id, self.next_index);
        self.next_index += 1;
        handle
    }

    /// Declare a vertex buffer of `size` bytes.
    pub fn create_vertex_buffer(&mut self, size: u64) -> ResourceHandle {
        let handle = self.next_handle();
        self.vertex_buffers.insert(handle, size);
        handle
    }

    /// Declare an index buffer of `size` bytes.
    pub fn create_index_buffer(&mut self, size: u64) -> ResourceHandle {
        let handle = self.next_handle();
        self.index_buffers.insert(handle, size);
        handle
    }

    /// Declare a shader buffer from a byte size or a structured layout.
    pub fn create_shader_buffer(
        &mut self,
        descriptor: impl Into<ShaderBufferDescriptor>,
    ) -> ResourceHandle {
        let handle = self.next_handle();
        self.shader_buffers.insert(handle, descriptor.into());
        handle
    }

    /// Declare a texture.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> ResourceHandle {
        let handle = self.next_handle();
        self.textures.insert(handle, descriptor);
        handle
    }

    /// Declare a pipeline.
    pub fn create_pipeline(&mut self, descriptor: PipelineDescriptor) -> ResourceHandle {
        let handle = self.next_handle();
        self.pipelines.insert(handle, descriptor);
        handle
    }

    /// Carry a resource over from the previous compilation of this graph.
    ///
    /// The returned handle refers to the same backend object as `old` did in
    /// the previously compiled state; no allocation or copy happens.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InheritanceWithoutPrevious`] on a builder created with
    ///   [`GraphBuilder::new`].
    /// - [`GraphicsError::InvalidResourceHandle`] if `old` was minted by this
    ///   builder.
    pub fn inherit_resource(&mut self, old: ResourceHandle) -> Result<ResourceHandle, GraphicsError> {
        if !self.allows_inheritance {
            return Err(GraphicsError::InheritanceWithoutPrevious);
        }
        if old.graph() == self.id {
            return Err(GraphicsError::InvalidResourceHandle(old));
        }
        let handle = self.next_handle();
        self.inherited.insert(handle, old);
        Ok(handle)
    }

    /// Handle of the shared back-buffer color target.
    pub fn back_buffer_color(&self) -> ResourceHandle {
        ResourceHandle::new(self.id, ResourceHandle::BACK_BUFFER_COLOR)
    }

    /// Handle of the shared back-buffer depth/stencil target.
    pub fn back_buffer_depth_stencil(&self) -> ResourceHandle {
        ResourceHandle::new(self.id, ResourceHandle::BACK_BUFFER_DEPTH_STENCIL)
    }

    /// Append a pass. Passes run in the order they are added.
    pub fn add_pass<F>(&mut self, name: impl Into<String>, callback: F) -> PassHandle
    where
        F: FnMut(&mut dyn crate::context::CommandContext) -> Result<(), GraphicsError>
            + Send
            + 'static,
    {
        let callback: PassCallback = Box::new(callback);
        let index = self.passes.len() as u32;
        self.passes.push(Pass::new(name.into(), callback));
        PassHandle::new(self.id, index)
    }

    /// Declare that `pass` reads `handle`.
    pub fn read(&mut self, pass: PassHandle, handle: ResourceHandle) {
        self.declare(pass, handle, ResourceAccess::Read);
    }

    /// Declare that `pass` writes `handle`.
    pub fn write(&mut self, pass: PassHandle, handle: ResourceHandle) {
        self.declare(pass, handle, ResourceAccess::Write);
    }

    /// Declare that `pass` reads and writes `handle`.
    pub fn read_write(&mut self, pass: PassHandle, handle: ResourceHandle) {
        self.declare(pass, handle, ResourceAccess::ReadWrite);
    }

    fn declare(&mut self, pass: PassHandle, handle: ResourceHandle, access: ResourceAccess) {
        assert!(
            pass.graph() == self.id && pass.index() < self.passes.len(),
            "pass handle {pass:?} does not belong to this builder"
        );
        assert!(
            handle.graph() == self.id && handle.index() < self.next_index,
            "resource handle {handle} does not belong to this builder"
        );
        self.passes[pass.index()].declare(handle, access);
    }

    /// Finish building. The builder is consumed.
    pub fn build(self) -> GraphDescriptor {
        log::trace!(
            "Built graph {} with {} passes",
            self.id.value(),
            self.passes.len()
        );
        GraphDescriptor {
            id: self.id,
            passes: self.passes,
            vertex_buffers: self.vertex_buffers,
            index_buffers: self.index_buffers,
            shader_buffers: self.shader_buffers,
            textures: self.textures,
            pipelines: self.pipelines,
            inherited: self.inherited,
            allows_inheritance: self.allows_inheritance,
        }
    }
}

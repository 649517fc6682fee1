//! Per-token mapping from graph handles to backend objects.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{NativeDevice, TextureRef};
use crate::error::GraphicsError;
use crate::graph::{GraphId, ResourceHandle};
use crate::types::{TextureDescriptor, TextureFormat};

use super::arena::{ResourceArena, ResourceKey};

/// What a handle resolves to in a compiled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// Object in the runtime's arena.
    Arena(ResourceKey),
    /// The runtime's back-buffer color texture.
    BackBufferColor,
    /// The runtime's back-buffer depth/stencil texture.
    BackBufferDepthStencil,
}

/// Resolved resources of one compiled graph.
///
/// Each arena key held here accounts for exactly one reference in the arena.
#[derive(Debug)]
pub(crate) struct CompiledGraphState {
    graph: GraphId,
    bindings: HashMap<ResourceHandle, ResourceKey>,
    inherited: BTreeSet<ResourceHandle>,
}

impl CompiledGraphState {
    pub(crate) fn new(graph: GraphId) -> Self {
        Self {
            graph,
            bindings: HashMap::new(),
            inherited: BTreeSet::new(),
        }
    }

    /// Bind a freshly allocated object. The state takes over its reference.
    pub(crate) fn insert(&mut self, handle: ResourceHandle, key: ResourceKey) {
        self.bindings.insert(handle, key);
    }

    /// Bind a shared object. The caller must already have retained `key`.
    pub(crate) fn insert_inherited(&mut self, handle: ResourceHandle, key: ResourceKey) {
        self.bindings.insert(handle, key);
        self.inherited.insert(handle);
    }

    /// Resolve `handle`; back-buffer handles of this graph always resolve.
    pub(crate) fn resolve(&self, handle: ResourceHandle) -> Option<Binding> {
        if handle.graph() != self.graph {
            return None;
        }
        if handle.is_back_buffer_color() {
            return Some(Binding::BackBufferColor);
        }
        if handle.is_back_buffer_depth_stencil() {
            return Some(Binding::BackBufferDepthStencil);
        }
        self.bindings.get(&handle).copied().map(Binding::Arena)
    }

    /// Arena key of a non-back-buffer handle.
    pub(crate) fn key(&self, handle: ResourceHandle) -> Option<ResourceKey> {
        match self.resolve(handle)? {
            Binding::Arena(key) => Some(key),
            _ => None,
        }
    }

    pub(crate) fn is_inherited(&self, handle: ResourceHandle) -> bool {
        self.inherited.contains(&handle)
    }

    /// Unbind an inherited handle and return its key for release.
    pub(crate) fn remove_inherited(&mut self, handle: ResourceHandle) -> Option<ResourceKey> {
        if !self.inherited.remove(&handle) {
            return None;
        }
        self.bindings.remove(&handle)
    }

    /// Arena keys referenced by this state, one per handle.
    pub(crate) fn keys(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.bindings.values().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Drop every reference this state holds.
    ///
    /// Returns how many objects were destroyed.
    pub(crate) fn release_all<D: NativeDevice>(self, arena: &mut ResourceArena<D>) -> usize {
        self.bindings
            .into_values()
            .filter(|key| arena.release(*key))
            .count()
    }
}

/// The color and depth/stencil targets shared by every graph of a runtime.
pub(crate) struct BackBuffer<D: NativeDevice> {
    color: D::Texture,
    color_descriptor: TextureDescriptor,
    depth_stencil: D::Texture,
    depth_stencil_descriptor: TextureDescriptor,
}

impl<D: NativeDevice> BackBuffer<D> {
    pub(crate) fn create(
        device: &mut D,
        (width, height): (u32, u32),
        color_format: TextureFormat,
        depth_stencil_format: TextureFormat,
    ) -> Result<Self, GraphicsError> {
        let color_descriptor = TextureDescriptor::new_2d(width.max(1), height.max(1), color_format)
            .with_label("Back Buffer Color");
        let depth_stencil_descriptor =
            TextureDescriptor::new_2d(width.max(1), height.max(1), depth_stencil_format)
                .with_label("Back Buffer Depth/Stencil");
        Ok(Self {
            color: device.create_texture(&color_descriptor)?,
            color_descriptor,
            depth_stencil: device.create_texture(&depth_stencil_descriptor)?,
            depth_stencil_descriptor,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        let size = self.color_descriptor.size;
        (size.width, size.height)
    }

    pub(crate) fn color(&self) -> TextureRef<'_, D> {
        TextureRef {
            texture: &self.color,
            descriptor: &self.color_descriptor,
        }
    }

    pub(crate) fn depth_stencil(&self) -> TextureRef<'_, D> {
        TextureRef {
            texture: &self.depth_stencil,
            descriptor: &self.depth_stencil_descriptor,
        }
    }
}

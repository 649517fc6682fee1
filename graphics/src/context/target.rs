//! Render pass attachment types.

use crate::graph::ResourceHandle;
use crate::types::ClearValue;

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }

    /// Create a clear operation with a stencil value.
    pub fn clear_stencil(stencil: u32) -> Self {
        Self::Clear(ClearValue::Stencil(stencil))
    }

    /// The clear value, if this is a clear.
    pub fn clear_value(&self) -> Option<ClearValue> {
        match self {
            Self::Clear(value) => Some(*value),
            _ => None,
        }
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// A color attachment for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// Texture to render to; may be the back-buffer color handle.
    pub texture: ResourceHandle,
    /// Mip level to render to.
    pub mip_level: u32,
    /// Array layer to render to.
    pub array_layer: u32,
    /// Operation when loading the attachment.
    pub load_op: LoadOp,
    /// Operation when storing the attachment.
    pub store_op: StoreOp,
}

impl ColorAttachment {
    /// Create a color attachment that loads and stores mip 0, layer 0.
    pub fn new(texture: ResourceHandle) -> Self {
        Self {
            texture,
            mip_level: 0,
            array_layer: 0,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
        }
    }

    /// Render to a specific mip level and layer.
    pub fn with_subresource(mut self, mip_level: u32, array_layer: u32) -> Self {
        self.mip_level = mip_level;
        self.array_layer = array_layer;
        self
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Set a clear color.
    pub fn with_clear_color(mut self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.load_op = LoadOp::clear_color(r, g, b, a);
        self
    }
}

/// Depth component of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// Depth texture.
    pub texture: ResourceHandle,
    /// Operation when loading depth.
    pub load_op: LoadOp,
    /// Operation when storing depth.
    pub store_op: StoreOp,
}

impl DepthAttachment {
    /// Create a depth attachment that loads and stores.
    pub fn new(texture: ResourceHandle) -> Self {
        Self {
            texture,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
        }
    }

    /// Clear depth to a specific value.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.load_op = LoadOp::clear_depth(depth);
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }
}

/// Stencil component of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilAttachment {
    /// Stencil texture.
    pub texture: ResourceHandle,
    /// Operation when loading stencil.
    pub load_op: LoadOp,
    /// Operation when storing stencil.
    pub store_op: StoreOp,
}

impl StencilAttachment {
    /// Create a stencil attachment that loads and stores.
    pub fn new(texture: ResourceHandle) -> Self {
        Self {
            texture,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
        }
    }

    /// Clear stencil to a specific value.
    pub fn with_clear_stencil(mut self, stencil: u32) -> Self {
        self.load_op = LoadOp::clear_stencil(stencil);
        self
    }
}

/// Combined depth/stencil attachment backed by a single texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachment {
    /// Depth/stencil texture.
    pub texture: ResourceHandle,
    /// Operation when loading depth.
    pub depth_load_op: LoadOp,
    /// Operation when storing depth.
    pub depth_store_op: StoreOp,
    /// Operation when loading stencil.
    pub stencil_load_op: LoadOp,
    /// Operation when storing stencil.
    pub stencil_store_op: StoreOp,
}

impl DepthStencilAttachment {
    /// Create a depth/stencil attachment that loads and stores both aspects.
    pub fn new(texture: ResourceHandle) -> Self {
        Self {
            texture,
            depth_load_op: LoadOp::default(),
            depth_store_op: StoreOp::default(),
            stencil_load_op: LoadOp::default(),
            stencil_store_op: StoreOp::default(),
        }
    }

    /// Clear depth to a specific value.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.depth_load_op = LoadOp::clear_depth(depth);
        self
    }

    /// Clear stencil to a specific value.
    pub fn with_clear_stencil(mut self, stencil: u32) -> Self {
        self.stencil_load_op = LoadOp::clear_stencil(stencil);
        self
    }

    /// Split into separate depth and stencil aspects.
    pub fn split(&self) -> (DepthAttachment, StencilAttachment) {
        (
            DepthAttachment {
                texture: self.texture,
                load_op: self.depth_load_op,
                store_op: self.depth_store_op,
            },
            StencilAttachment {
                texture: self.texture,
                load_op: self.stencil_load_op,
                store_op: self.stencil_store_op,
            },
        )
    }
}

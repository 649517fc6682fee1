//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 4;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// The role a graph buffer was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute storage.
    Vertex,
    /// Index storage.
    Index,
    /// Buffer readable and writable from shaders.
    Shader,
}

impl BufferKind {
    /// Usage flags a backend buffer of this kind is created with.
    ///
    /// Every graph buffer can be a copy source and destination so that
    /// stale resources can be migrated and contents downloaded.
    pub fn usage(self) -> BufferUsage {
        let base = BufferUsage::COPY_SRC | BufferUsage::COPY_DST;
        match self {
            Self::Vertex => base | BufferUsage::VERTEX,
            Self::Index => base | BufferUsage::INDEX,
            Self::Shader => base | BufferUsage::STORAGE | BufferUsage::UNIFORM,
        }
    }

    /// Human readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "a vertex buffer",
            Self::Index => "an index buffer",
            Self::Shader => "a shader buffer",
        }
    }
}

/// Descriptor for creating a backend buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Declared role.
    pub kind: BufferKind,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, kind: BufferKind) -> Self {
        Self {
            label: None,
            size,
            kind,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Usage flags derived from the buffer kind.
    pub fn usage(&self) -> BufferUsage {
        self.kind.usage()
    }
}

// ============================================================================
// Shader buffer layouts
// ============================================================================

/// Shader-visible member types understood by [`ShaderBufferLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Uint,
    /// Two component float vector.
    Vec2,
    /// Three component float vector.
    Vec3,
    /// Four component float vector.
    Vec4,
    /// Column-major 3x3 float matrix.
    Mat3,
    /// Column-major 4x4 float matrix.
    Mat4,
}

impl ShaderType {
    /// Storage-buffer (std430) alignment in bytes.
    pub fn align(self) -> u64 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat3 | Self::Mat4 => 16,
        }
    }

    /// Storage-buffer (std430) size in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LayoutField {
    name: String,
    ty: ShaderType,
    array_len: Option<u32>,
}

/// Structured layout of a shader buffer.
///
/// Fields are laid out with storage-buffer alignment rules; the struct can be
/// repeated to describe an array of structs.
///
/// # Example
///
/// ```ignore
/// let layout = ShaderBufferLayout::new()
///     .with_field("transform", ShaderType::Mat4)
///     .with_field("tint", ShaderType::Vec3)
///     .with_array("weights", ShaderType::Float, 4)
///     .repeated(128);
/// let handle = builder.create_shader_buffer(layout);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderBufferLayout {
    fields: Vec<LayoutField>,
    count: u32,
}

impl Default for ShaderBufferLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderBufferLayout {
    /// Create an empty layout describing a single struct.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            count: 1,
        }
    }

    /// Append a scalar, vector or matrix field.
    pub fn with_field(mut self, name: impl Into<String>, ty: ShaderType) -> Self {
        self.fields.push(LayoutField {
            name: name.into(),
            ty,
            array_len: None,
        });
        self
    }

    /// Append a fixed-size array field.
    pub fn with_array(mut self, name: impl Into<String>, ty: ShaderType, len: u32) -> Self {
        self.fields.push(LayoutField {
            name: name.into(),
            ty,
            array_len: Some(len),
        });
        self
    }

    /// Repeat the struct `count` times.
    pub fn repeated(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Struct alignment: the largest member alignment.
    pub fn align(&self) -> u64 {
        self.fields.iter().map(|f| f.ty.align()).max().unwrap_or(4)
    }

    /// Byte offset of a named field within one struct.
    pub fn offset_of(&self, name: &str) -> Option<u64> {
        let mut offset = 0;
        for field in &self.fields {
            offset = align_to(offset, field.ty.align());
            if field.name == name {
                return Some(offset);
            }
            offset += field_size(field);
        }
        None
    }

    /// Size of one struct including trailing padding.
    pub fn struct_size(&self) -> u64 {
        let mut offset = 0;
        for field in &self.fields {
            offset = align_to(offset, field.ty.align());
            offset += field_size(field);
        }
        align_to(offset, self.align())
    }

    /// Total buffer size for all repetitions.
    pub fn size(&self) -> u64 {
        self.struct_size() * u64::from(self.count)
    }
}

fn field_size(field: &LayoutField) -> u64 {
    match field.array_len {
        Some(len) => align_to(field.ty.size(), field.ty.align()) * u64::from(len),
        None => field.ty.size(),
    }
}

/// Round `value` up to a multiple of `align`.
pub(crate) fn align_to(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// How the size of a shader buffer is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShaderBufferDescriptor {
    /// Explicit byte size.
    Size(u64),
    /// Size derived from a structured layout.
    Layout(ShaderBufferLayout),
}

impl ShaderBufferDescriptor {
    /// Byte size of the buffer.
    pub fn size(&self) -> u64 {
        match self {
            Self::Size(size) => *size,
            Self::Layout(layout) => layout.size(),
        }
    }
}

impl From<u64> for ShaderBufferDescriptor {
    fn from(size: u64) -> Self {
        Self::Size(size)
    }
}

impl From<ShaderBufferLayout> for ShaderBufferDescriptor {
    fn from(layout: ShaderBufferLayout) -> Self {
        Self::Layout(layout)
    }
}

/// Index element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

//! Pipeline descriptors: shader source, vertex input and fixed-function state.

use super::TextureFormat;

/// Vertex attribute data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit signed integer.
    Int,
    /// Four 32-bit signed integers.
    Int4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Four 32-bit unsigned integers.
    Uint4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Uint | Self::Unorm8x4 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 | Self::Int4 | Self::Uint4 => 16,
        }
    }
}

/// How the vertex buffer advances: per-vertex or per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Buffer advances once per vertex (default).
    #[default]
    Vertex,
    /// Buffer advances once per instance.
    Instance,
}

/// One attribute read from a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Data format.
    pub format: VertexAttributeFormat,
    /// Byte offset within one element.
    pub offset: u32,
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Stride in bytes between consecutive elements.
    pub stride: u32,
    /// How the buffer advances.
    pub step_mode: VertexStepMode,
    /// Attributes read from this slot.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// Create a per-vertex layout with the given stride.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            step_mode: VertexStepMode::Vertex,
            attributes: Vec::new(),
        }
    }

    /// Create a per-instance layout.
    pub fn per_instance(stride: u32) -> Self {
        Self {
            step_mode: VertexStepMode::Instance,
            ..Self::new(stride)
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, location: u32, format: VertexAttributeFormat, offset: u32) -> Self {
        self.attributes.push(VertexAttribute {
            location,
            format,
            offset,
        });
        self
    }
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Connected lines.
    LineStrip,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles.
    TriangleStrip,
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    #[default]
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if new < old.
    #[default]
    Less,
    /// Passes if new <= old.
    LessEqual,
    /// Passes if new == old.
    Equal,
    /// Passes if new > old.
    Greater,
    /// Passes if new >= old.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Color blending preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite the destination.
    #[default]
    Opaque,
    /// Source over destination with straight alpha.
    Alpha,
    /// Source over destination with premultiplied alpha.
    Premultiplied,
    /// Source added to destination.
    Additive,
}

/// Color output of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetState {
    /// Attachment format.
    pub format: TextureFormat,
    /// Blending preset.
    pub blend: BlendMode,
}

/// Depth/stencil configuration of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Depth attachment format.
    pub format: TextureFormat,
    /// Whether depth is written.
    pub depth_write: bool,
    /// Depth test.
    pub depth_compare: CompareFunction,
}

/// Descriptor for a graph pipeline.
///
/// Shaders are WGSL; the vertex and fragment entry points may live in the
/// same source.
///
/// # Example
///
/// ```ignore
/// let pipeline = builder.create_pipeline(
///     PipelineDescriptor::new(SHADER)
///         .with_vertex_layout(VertexBufferLayout::new(8).with_attribute(0, VertexAttributeFormat::Float2, 0))
///         .with_color_target(TextureFormat::Bgra8Unorm, BlendMode::Opaque)
///         .with_label("triangle"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// WGSL source.
    pub source: String,
    /// Vertex entry point.
    pub vertex_entry: String,
    /// Fragment entry point; `None` for depth-only pipelines.
    pub fragment_entry: Option<String>,
    /// Vertex buffer slots, in slot order.
    pub vertex_layouts: Vec<VertexBufferLayout>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Color outputs, in attachment order.
    pub color_targets: Vec<ColorTargetState>,
    /// Depth/stencil state.
    pub depth_stencil: Option<DepthStencilState>,
    /// Sample count of the attachments.
    pub sample_count: u32,
}

impl PipelineDescriptor {
    /// Create a descriptor with `vs_main`/`fs_main` entry points.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            label: None,
            source: source.into(),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: Some("fs_main".to_string()),
            vertex_layouts: Vec::new(),
            topology: PrimitiveTopology::default(),
            cull_mode: CullMode::default(),
            color_targets: Vec::new(),
            depth_stencil: None,
            sample_count: 1,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the entry points.
    pub fn with_entry_points(mut self, vertex: impl Into<String>, fragment: Option<&str>) -> Self {
        self.vertex_entry = vertex.into();
        self.fragment_entry = fragment.map(str::to_string);
        self
    }

    /// Append a vertex buffer slot.
    pub fn with_vertex_layout(mut self, layout: VertexBufferLayout) -> Self {
        self.vertex_layouts.push(layout);
        self
    }

    /// Set the topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set face culling.
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Append a color output.
    pub fn with_color_target(mut self, format: TextureFormat, blend: BlendMode) -> Self {
        self.color_targets.push(ColorTargetState { format, blend });
        self
    }

    /// Set depth testing.
    pub fn with_depth(mut self, format: TextureFormat, depth_write: bool, compare: CompareFunction) -> Self {
        self.depth_stencil = Some(DepthStencilState {
            format,
            depth_write,
            depth_compare: compare,
        });
        self
    }

    /// Set the sample count.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }
}

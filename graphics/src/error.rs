//! Render graph error types.

use std::fmt;

use crate::graph::ResourceHandle;

/// Errors that can occur while compiling or executing render graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize a backend.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// Shader parsing, validation or pipeline creation failed.
    ShaderCompilationFailed(String),
    /// A requested feature is not supported.
    FeatureNotSupported(String),
    /// The operation exists in the API but has no implementation yet.
    NotImplemented(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// The GPU device was lost.
    DeviceLost,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// An internal error occurred.
    Internal(String),
    /// The surface is outdated and needs to be reconfigured.
    SurfaceOutdated,
    /// The surface was lost and needs to be recreated.
    SurfaceLost,

    /// A handle does not resolve in the compiled state of the graph.
    InvalidResourceHandle(ResourceHandle),
    /// An inheritance entry names a handle the previous state does not know.
    InvalidInheritedHandle(ResourceHandle),
    /// Inheritance was requested for a graph that has no previous state.
    InheritanceWithoutPrevious,
    /// The graph token was destroyed or belongs to another runtime.
    InvalidToken,
    /// A texture asked for more mip levels than the backend can allocate.
    MipLevelsUnsupported {
        /// Requested mip level count.
        requested: u32,
        /// Largest count the backend accepts for this texture.
        max: u32,
    },
    /// A binding or draw call was issued with no pipeline bound.
    NoPipelineBound,
    /// The command is only valid inside a render pass.
    NotInRenderPass,
    /// The command is only valid outside a render pass.
    RenderPassActive,
    /// A pass callback returned while its render pass was still open.
    RenderPassNotEnded(String),
    /// A handle was used as a different kind of resource than it was declared as.
    ResourceKindMismatch {
        /// The offending handle.
        handle: ResourceHandle,
        /// What the command expected.
        expected: &'static str,
    },
    /// The bound pipeline has no binding with this name.
    UnknownBinding(String),
    /// A draw was issued while a pipeline binding or vertex slot was unset.
    MissingBinding(String),
    /// A pass touched a handle it did not declare in its access sets.
    UndeclaredAccess {
        /// Pass name.
        pass: String,
        /// The undeclared handle.
        handle: ResourceHandle,
    },
    /// The data format does not match the resource format.
    UnsupportedFormat(String),
    /// An offset or size falls outside the resource.
    OutOfBounds(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::ShaderCompilationFailed(msg) => write!(f, "shader compilation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::NotImplemented(what) => write!(f, "not implemented: {what}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::SurfaceOutdated => write!(f, "surface outdated, needs reconfiguration"),
            Self::SurfaceLost => write!(f, "surface lost, needs recreation"),
            Self::InvalidResourceHandle(handle) => {
                write!(f, "invalid resource handle {handle}")
            }
            Self::InvalidInheritedHandle(handle) => {
                write!(f, "invalid resource handle inherited by pass: {handle}")
            }
            Self::InheritanceWithoutPrevious => {
                write!(f, "resource inheritance requires a previously compiled graph")
            }
            Self::InvalidToken => write!(f, "invalid or destroyed graph token"),
            Self::MipLevelsUnsupported { requested, max } => {
                write!(f, "{requested} mip levels requested, backend supports {max}")
            }
            Self::NoPipelineBound => write!(f, "no pipeline bound"),
            Self::NotInRenderPass => write!(f, "command requires an active render pass"),
            Self::RenderPassActive => write!(f, "command is not allowed inside a render pass"),
            Self::RenderPassNotEnded(pass) => {
                write!(f, "pass '{pass}' returned without ending its render pass")
            }
            Self::ResourceKindMismatch { handle, expected } => {
                write!(f, "resource {handle} is not {expected}")
            }
            Self::UnknownBinding(name) => write!(f, "bound pipeline has no binding '{name}'"),
            Self::MissingBinding(name) => write!(f, "pipeline binding '{name}' is not set"),
            Self::UndeclaredAccess { pass, handle } => {
                write!(f, "pass '{pass}' accessed undeclared resource {handle}")
            }
            Self::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
            Self::OutOfBounds(msg) => write!(f, "out of bounds: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_mip_error_display() {
        let err = GraphicsError::MipLevelsUnsupported {
            requested: 12,
            max: 9,
        };
        assert_eq!(err.to_string(), "12 mip levels requested, backend supports 9");
    }

    #[test]
    fn test_not_implemented_display() {
        let err = GraphicsError::NotImplemented("graph cache".to_string());
        assert_eq!(err.to_string(), "not implemented: graph cache");
    }
}

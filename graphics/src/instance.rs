//! Runtime configuration and backend selection.
//!
//! [`RuntimeParameters`] describes how a runtime is created; [`create_runtime`]
//! picks the backend once at startup and returns it behind the object-safe
//! [`RenderGraphRuntime`] trait.
//!
//! # Example
//!
//! ```ignore
//! use redlilium_rendergraph::{BackendType, RuntimeParameters, create_runtime};
//!
//! let params = RuntimeParameters::new()
//!     .with_backend(BackendType::Auto)
//!     .with_back_buffer_size(1280, 720);
//! let mut runtime = create_runtime(&params)?;
//! ```

use crate::backend::DummyDevice;
use crate::error::GraphicsError;
use crate::runtime::{GraphRuntime, RenderGraphRuntime};
use crate::types::TextureFormat;

/// Backend used by a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// wgpu if it initializes, otherwise the dummy device.
    #[default]
    Auto,
    /// CPU-memory device; always available.
    Dummy,
    /// wgpu device; fails if no adapter is found.
    Wgpu,
}

/// Graphics API wgpu runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WgpuBackendType {
    /// Platform default (Vulkan, Metal or DX12).
    #[default]
    Auto,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// DirectX 12.
    Dx12,
    /// OpenGL / WebGL.
    Gl,
}

#[cfg(feature = "wgpu-backend")]
impl WgpuBackendType {
    /// wgpu backend mask for this selection.
    pub fn to_wgpu_backends(self) -> wgpu::Backends {
        match self {
            Self::Auto => wgpu::Backends::PRIMARY,
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Metal => wgpu::Backends::METAL,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Gl => wgpu::Backends::GL,
        }
    }
}

/// Parameters for creating a render graph runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeParameters {
    /// Backend selection.
    pub backend: BackendType,
    /// API used by the wgpu backend.
    pub wgpu_backend: WgpuBackendType,
    /// Initial back-buffer size, used until a window reports its own.
    pub back_buffer_size: (u32, u32),
    /// Back-buffer color format.
    pub back_buffer_color_format: TextureFormat,
    /// Back-buffer depth/stencil format.
    pub back_buffer_depth_format: TextureFormat,
    /// Check every command against the pass's declared reads and writes.
    pub validate_pass_access: bool,
    /// Enable the graphics API validation layer.
    pub validation: bool,
}

impl RuntimeParameters {
    /// Default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Select the wgpu graphics API.
    pub fn with_wgpu_backend(mut self, wgpu_backend: WgpuBackendType) -> Self {
        self.wgpu_backend = wgpu_backend;
        self
    }

    /// Set the initial back-buffer size.
    pub fn with_back_buffer_size(mut self, width: u32, height: u32) -> Self {
        self.back_buffer_size = (width.max(1), height.max(1));
        self
    }

    /// Set the back-buffer formats.
    pub fn with_back_buffer_formats(mut self, color: TextureFormat, depth: TextureFormat) -> Self {
        self.back_buffer_color_format = color;
        self.back_buffer_depth_format = depth;
        self
    }

    /// Enable or disable pass access validation.
    pub fn with_pass_access_validation(mut self, enabled: bool) -> Self {
        self.validate_pass_access = enabled;
        self
    }

    /// Enable or disable the graphics API validation layer.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            wgpu_backend: WgpuBackendType::Auto,
            back_buffer_size: (800, 600),
            back_buffer_color_format: TextureFormat::Rgba8Unorm,
            back_buffer_depth_format: TextureFormat::Depth32Float,
            validate_pass_access: cfg!(debug_assertions),
            validation: cfg!(debug_assertions),
        }
    }
}

/// Create a runtime on the backend selected by `params`.
///
/// # Errors
///
/// Returns [`GraphicsError::InitializationFailed`] if an explicitly requested
/// backend is unavailable.
pub fn create_runtime(
    params: &RuntimeParameters,
) -> Result<Box<dyn RenderGraphRuntime>, GraphicsError> {
    match params.backend {
        BackendType::Dummy => {
            log::info!("Creating render graph runtime on the dummy device");
            Ok(Box::new(GraphRuntime::new(DummyDevice::new(), params)?))
        }
        BackendType::Wgpu => create_wgpu_runtime(params),
        BackendType::Auto => match create_wgpu_runtime(params) {
            Ok(runtime) => Ok(runtime),
            Err(e) => {
                log::warn!("wgpu backend unavailable ({e}), falling back to the dummy device");
                Ok(Box::new(GraphRuntime::new(DummyDevice::new(), params)?))
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_runtime(
    params: &RuntimeParameters,
) -> Result<Box<dyn RenderGraphRuntime>, GraphicsError> {
    let device = crate::backend::WgpuDevice::with_params(params)?;
    log::info!("Creating render graph runtime on wgpu");
    Ok(Box::new(GraphRuntime::new(device, params)?))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_runtime(
    _params: &RuntimeParameters,
) -> Result<Box<dyn RenderGraphRuntime>, GraphicsError> {
    Err(GraphicsError::InitializationFailed(
        "wgpu backend is not compiled in".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let params = RuntimeParameters::new()
            .with_backend(BackendType::Dummy)
            .with_back_buffer_size(0, 32)
            .with_pass_access_validation(true);
        assert_eq!(params.backend, BackendType::Dummy);
        assert_eq!(params.back_buffer_size, (1, 32));
        assert!(params.validate_pass_access);
    }

    #[test]
    fn test_create_dummy_runtime() {
        let params = RuntimeParameters::new().with_backend(BackendType::Dummy);
        let runtime = create_runtime(&params).expect("dummy runtime");
        assert_eq!(runtime.backend_name(), "Dummy");
        assert_eq!(runtime.graph_count(), 0);
    }
}

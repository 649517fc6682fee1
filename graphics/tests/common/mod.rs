//! Common utilities for render graph integration tests.
//!
//! This module provides shared test infrastructure that can be reused
//! across different backend implementations.

use std::sync::Arc;

use parking_lot::Mutex;
use redlilium_rendergraph::{
    BackendType, CommandContext, GraphicsError, RenderGraphRuntime, RuntimeParameters,
    WgpuBackendType, create_runtime,
};

/// Width and height of the back buffer used by tests.
pub const BACK_BUFFER_SIZE: (u32, u32) = (64, 32);

/// Solid-color triangle with one uniform parameter block.
#[allow(dead_code)]
pub const TRIANGLE_SHADER: &str = r#"
struct Params {
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return params.color;
}
"#;

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy device (CPU memory, no GPU).
    Dummy,
    /// WebGPU backend (via wgpu).
    WebGpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            #[cfg(feature = "wgpu-backend")]
            Backend::WebGpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::WebGpu => false,
        }
    }

    /// Runtime parameters selecting this backend.
    pub fn to_runtime_parameters(self) -> RuntimeParameters {
        let params = RuntimeParameters::new()
            .with_back_buffer_size(BACK_BUFFER_SIZE.0, BACK_BUFFER_SIZE.1)
            .with_pass_access_validation(true);
        match self {
            Backend::Dummy => params.with_backend(BackendType::Dummy),
            Backend::WebGpu => params
                .with_backend(BackendType::Wgpu)
                .with_wgpu_backend(WgpuBackendType::Auto),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context owning one runtime.
pub struct TestContext {
    /// The backend being tested.
    #[allow(dead_code)]
    pub backend: Backend,
    /// The runtime under test.
    pub runtime: Box<dyn RenderGraphRuntime>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available (no adapter on this
    /// machine, or not compiled in).
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }

        let runtime = match create_runtime(&backend.to_runtime_parameters()) {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Backend {backend:?} failed to initialize: {e}");
                return None;
            }
        };
        Some(Self { backend, runtime })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Slot a pass callback writes results into.
#[allow(dead_code)]
pub type Capture<T> = Arc<Mutex<Option<T>>>;

/// Create an empty capture slot.
#[allow(dead_code)]
pub fn capture<T>() -> Capture<T> {
    Arc::new(Mutex::new(None))
}

/// Log of the order passes ran in.
#[allow(dead_code)]
pub type PassLog = Arc<Mutex<Vec<String>>>;

/// Pass callback that appends its pass name to `log`.
#[allow(dead_code)]
pub fn record_name(
    log: &PassLog,
) -> impl FnMut(&mut dyn CommandContext) -> Result<(), GraphicsError> + Send + 'static {
    let log = Arc::clone(log);
    move |ctx| {
        log.lock().push(ctx.pass_name().to_string());
        Ok(())
    }
}

/// Generate a deterministic byte pattern.
#[allow(dead_code)]
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 + 3) as u8).collect()
}

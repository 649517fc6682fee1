//! # RedLilium Render Graph Demos
//!
//! Demo programs showcasing the render graph runtime.
//!
//! ## Available Demos
//!
//! - `graph_demo` - Compile, execute, grow and destroy a graph headlessly

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Graph description: builders, descriptors, passes and handles.
//!
//! A graph is described once through a [`GraphBuilder`] and frozen into a
//! [`GraphDescriptor`]. The descriptor is handed to a
//! [`RenderGraphRuntime`](crate::runtime::RenderGraphRuntime), which allocates
//! backend objects for its resources and runs its passes every frame.
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Runtime | [`RenderGraphRuntime`](crate::runtime::RenderGraphRuntime) | Compile, execute, destroy |
//! | **Descriptor** | [`GraphDescriptor`] | Passes and resource declarations (this module) |
//! | Pass | [`Pass`] | Callback plus declared reads and writes |
//! | Context | [`CommandContext`](crate::context::CommandContext) | Commands recorded by a pass |
//!
//! # Example
//!
//! ```ignore
//! use redlilium_rendergraph::{GraphBuilder, ColorAttachment, LoadOp};
//!
//! let mut builder = GraphBuilder::new();
//! let color = builder.back_buffer_color();
//! let pass = builder.add_pass("clear", move |ctx| {
//!     ctx.begin_render_pass(
//!         &[ColorAttachment::new(color).with_clear_color(0.1, 0.1, 0.1, 1.0)],
//!         None,
//!         None,
//!     )?;
//!     ctx.end_render_pass()
//! });
//! builder.write(pass, color);
//! let descriptor = builder.build();
//! ```

mod builder;
mod descriptor;
mod pass;
mod resource;

pub use builder::GraphBuilder;
pub use descriptor::{Declaration, GraphDescriptor};
pub(crate) use pass::PassAccess;
pub use pass::{Pass, PassCallback, PassHandle};
pub use resource::{GraphId, ResourceAccess, ResourceHandle};

//! Compile, execute and destroy render graphs.
//!
//! A [`RenderGraphRuntime`] turns [`GraphDescriptor`]s into persistent
//! compiled graphs identified by [`GraphToken`]s. Every compiled graph owns
//! its backend objects through a reference-counted arena; the only resources
//! shared between graphs are the runtime's back-buffer color and
//! depth/stencil targets.
//!
//! ```text
//! GraphBuilder ──build──▶ GraphDescriptor ──compile──▶ GraphToken
//!                                              │
//!                   recompile(token, descriptor)◀──┤
//!                                              ├──execute──▶ ExecuteStatistics
//!                                              └──destroy
//! ```
//!
//! [`GraphRuntime`] is the single implementation, generic over the
//! [`NativeDevice`] it drives; [`create_runtime`](crate::create_runtime)
//! picks the device at startup.

mod arena;
mod recorder;
mod state;
mod stats;

pub use stats::{ExecuteStatistics, VramUsage};

use std::collections::HashSet;
use std::path::Path;

use slotmap::{SlotMap, new_key_type};

use crate::backend::NativeDevice;
use crate::error::GraphicsError;
use crate::graph::{GraphDescriptor, Pass, ResourceHandle};
use crate::instance::RuntimeParameters;
use crate::shader::{NagaShaderCompiler, ShaderCompiler};
use crate::types::{BufferDescriptor, BufferKind, TextureDescriptor, TextureFormat};
use crate::{frame_mark, profile_plot, profile_scope};

use arena::{ArenaObject, Footprint, ResourceArena, ResourceKey};
use recorder::{PassContext, Resources};
use state::{BackBuffer, CompiledGraphState};

new_key_type! {
    /// Identifies one compiled graph inside a runtime.
    ///
    /// Tokens are generational: a destroyed token never aliases a graph
    /// compiled later.
    pub struct GraphToken;
}

/// Window the runtime presents to.
pub trait WindowSurface: Send {
    /// Current drawable size in pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Show the frame the device presented.
    fn present(&mut self) -> Result<(), GraphicsError>;
}

/// Object-safe interface of a render graph runtime.
pub trait RenderGraphRuntime: Send {
    /// Name of the backend driving this runtime.
    fn backend_name(&self) -> &'static str;

    /// Allocate a descriptor's resources and return a token for it.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InheritanceWithoutPrevious`] if the descriptor
    ///   inherits resources.
    /// - Validation, shader and allocation errors; nothing stays allocated.
    fn compile(&mut self, descriptor: GraphDescriptor) -> Result<GraphToken, GraphicsError>;

    /// Replace a compiled graph with a new descriptor.
    ///
    /// Every declared resource is freshly allocated; inherited handles share
    /// the previous state's objects. The previous state is then released. On
    /// error the previous state and passes stay live.
    fn recompile(&mut self, token: GraphToken, descriptor: GraphDescriptor)
    -> Result<(), GraphicsError>;

    /// Run a compiled graph's passes in order, then present.
    fn execute(&mut self, token: GraphToken) -> Result<ExecuteStatistics, GraphicsError>;

    /// Run several compiled graphs in order and present once.
    fn execute_batch(&mut self, tokens: &[GraphToken]) -> Result<ExecuteStatistics, GraphicsError>;

    /// Release a compiled graph. The token is invalid afterwards.
    fn destroy(&mut self, token: GraphToken) -> Result<(), GraphicsError>;

    /// Whether `token` names a live compiled graph.
    fn is_compiled(&self, token: GraphToken) -> bool;

    /// Number of live compiled graphs.
    fn graph_count(&self) -> usize;

    /// Number of backend objects alive across every compiled graph.
    ///
    /// Objects shared through inheritance count once.
    fn live_object_count(&self) -> usize;

    /// Memory referenced by a compiled graph.
    fn vram_usage(&self, token: GraphToken) -> Result<VramUsage, GraphicsError>;

    /// Attach the window to present to and size the back buffer after it.
    fn set_window(&mut self, window: Box<dyn WindowSurface>) -> Result<(), GraphicsError>;

    /// Resize the back buffer to the window's drawable size.
    ///
    /// Returns true if the back buffer was reallocated.
    fn update_back_buffer(&mut self) -> Result<bool, GraphicsError>;

    /// Current back-buffer size.
    fn back_buffer_size(&self) -> (u32, u32);

    /// Persist the pipeline cache.
    fn save_cache(&self, path: &Path) -> Result<(), GraphicsError>;

    /// Load a persisted pipeline cache.
    fn load_cache(&mut self, path: &Path) -> Result<(), GraphicsError>;
}

struct CompiledGraph {
    passes: Vec<Pass>,
    state: CompiledGraphState,
}

/// Render graph runtime over one native device.
pub struct GraphRuntime<D: NativeDevice> {
    device: D,
    compiler: Box<dyn ShaderCompiler>,
    arena: ResourceArena<D>,
    graphs: SlotMap<GraphToken, CompiledGraph>,
    back_buffer: BackBuffer<D>,
    back_buffer_formats: (TextureFormat, TextureFormat),
    window: Option<Box<dyn WindowSurface>>,
    validate_pass_access: bool,
}

impl<D: NativeDevice> GraphRuntime<D> {
    /// Create a runtime and its back buffer.
    pub fn new(mut device: D, params: &RuntimeParameters) -> Result<Self, GraphicsError> {
        let back_buffer = BackBuffer::create(
            &mut device,
            params.back_buffer_size,
            params.back_buffer_color_format,
            params.back_buffer_depth_format,
        )?;
        log::debug!(
            "Render graph runtime on {} with a {}x{} back buffer",
            device.name(),
            params.back_buffer_size.0,
            params.back_buffer_size.1
        );
        Ok(Self {
            device,
            compiler: Box::new(NagaShaderCompiler::new()),
            arena: ResourceArena::new(),
            graphs: SlotMap::with_key(),
            back_buffer,
            back_buffer_formats: (
                params.back_buffer_color_format,
                params.back_buffer_depth_format,
            ),
            window: None,
            validate_pass_access: params.validate_pass_access,
        })
    }

    /// Replace the shader compiler used for pipelines.
    pub fn with_shader_compiler(mut self, compiler: impl ShaderCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    /// The native device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The native device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Allocate every resource the descriptor declares into a fresh state.
    ///
    /// On error everything allocated so far is released.
    fn allocate(&mut self, descriptor: &GraphDescriptor) -> Result<CompiledGraphState, GraphicsError> {
        let mut state = CompiledGraphState::new(descriptor.id());
        if let Err(e) = self.allocate_into(descriptor, &mut state) {
            state.release_all(&mut self.arena);
            return Err(e);
        }
        Ok(state)
    }

    fn allocate_into(
        &mut self,
        descriptor: &GraphDescriptor,
        state: &mut CompiledGraphState,
    ) -> Result<(), GraphicsError> {
        let buffers = descriptor
            .vertex_buffers
            .iter()
            .map(|(handle, size)| (*handle, *size, BufferKind::Vertex))
            .chain(
                descriptor
                    .index_buffers
                    .iter()
                    .map(|(handle, size)| (*handle, *size, BufferKind::Index)),
            )
            .chain(
                descriptor
                    .shader_buffers
                    .iter()
                    .map(|(handle, desc)| (*handle, desc.size(), BufferKind::Shader)),
            );
        for (handle, size, kind) in buffers {
            let buffer_descriptor = BufferDescriptor::new(size, kind).with_label(handle.to_string());
            let buffer = self.device.create_buffer(&buffer_descriptor)?;
            let key = self.arena.insert(ArenaObject::Buffer {
                buffer,
                descriptor: buffer_descriptor,
            });
            state.insert(handle, key);
        }

        for (handle, texture_descriptor) in &descriptor.textures {
            let (texture, created) = self.create_texture(texture_descriptor)?;
            let key = self.arena.insert(ArenaObject::Texture {
                texture,
                descriptor: created,
            });
            state.insert(*handle, key);
        }

        for (handle, pipeline_descriptor) in &descriptor.pipelines {
            let shader = self.compiler.compile(pipeline_descriptor)?;
            let pipeline = self.device.create_pipeline(pipeline_descriptor, &shader)?;
            let key = self.arena.insert(ArenaObject::Pipeline {
                pipeline,
                shader,
                vertex_slots: pipeline_descriptor.vertex_layouts.len(),
            });
            state.insert(*handle, key);
        }
        Ok(())
    }

    /// Create a texture, retrying once with the device's mip limit.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<(D::Texture, TextureDescriptor), GraphicsError> {
        match self.device.create_texture(descriptor) {
            Ok(texture) => Ok((texture, descriptor.clone())),
            Err(GraphicsError::MipLevelsUnsupported { requested, max }) => {
                let max = max.min(self.device.max_mip_levels(descriptor)).max(1);
                log::warn!(
                    "Texture {:?} requested {requested} mip levels, {} supports {max}; retrying",
                    descriptor.label,
                    self.device.name()
                );
                let fallback = descriptor.clone().with_mip_levels(max);
                let texture = self.device.create_texture(&fallback)?;
                Ok((texture, fallback))
            }
            Err(e) => Err(e),
        }
    }

    /// Run one graph's passes, accumulating into `stats`.
    fn run_passes(&mut self, token: GraphToken, stats: &mut ExecuteStatistics) -> Result<(), GraphicsError> {
        let graph = self.graphs.get_mut(token).ok_or(GraphicsError::InvalidToken)?;
        for pass in &mut graph.passes {
            profile_scope!("pass");
            let (access, callback) = pass.split();
            let name = access.name;
            let resources = Resources::new(&mut self.arena, &mut graph.state, &self.back_buffer);
            let mut ctx = PassContext::new(
                &mut self.device,
                resources,
                access,
                self.validate_pass_access,
                stats,
            );

            let result = callback(&mut ctx);
            let left_open = ctx.close_render_pass();
            result?;
            if left_open? {
                return Err(GraphicsError::RenderPassNotEnded(name.to_string()));
            }
            stats.passes += 1;
        }
        stats.vram += vram_of(&self.arena, &graph.state);
        Ok(())
    }

    /// Hand the back buffer to the device and the window.
    ///
    /// If the drawable was resized since the back buffer was sized, only
    /// pending work is flushed.
    fn present(&mut self) -> Result<(), GraphicsError> {
        profile_scope!("present");
        let back_buffer_size = self.back_buffer.size();
        let result = match self.window.as_mut() {
            None => self.device.present(self.back_buffer.color()),
            Some(window) if window.drawable_size() != back_buffer_size => {
                log::trace!("Drawable resized mid-frame, skipping back buffer copy");
                self.device.flush()
            }
            Some(window) => self
                .device
                .present(self.back_buffer.color())
                .and_then(|()| window.present()),
        };
        match result {
            Err(e @ (GraphicsError::SurfaceOutdated | GraphicsError::SurfaceLost)) => {
                log::debug!("Ignoring transient presentation error: {e}");
                Ok(())
            }
            other => other,
        }
    }

    fn finish_frame(&mut self, stats: &ExecuteStatistics) -> Result<(), GraphicsError> {
        self.present()?;
        frame_mark!();
        profile_plot!("vram_bytes", stats.vram.total());
        Ok(())
    }
}

/// Memory referenced by a state, counting shared objects once.
fn vram_of<D: NativeDevice>(arena: &ResourceArena<D>, state: &CompiledGraphState) -> VramUsage {
    let keys: HashSet<ResourceKey> = state.keys().collect();
    let mut usage = VramUsage::default();
    for (footprint, bytes) in keys.into_iter().filter_map(|key| arena.footprint(key)) {
        match footprint {
            Footprint::VertexBuffer => usage.vertex_buffers += bytes,
            Footprint::IndexBuffer => usage.index_buffers += bytes,
            Footprint::ShaderBuffer => usage.shader_buffers += bytes,
            Footprint::Texture => usage.textures += bytes,
        }
    }
    usage
}

impl<D: NativeDevice> RenderGraphRuntime for GraphRuntime<D> {
    fn backend_name(&self) -> &'static str {
        self.device.name()
    }

    fn compile(&mut self, descriptor: GraphDescriptor) -> Result<GraphToken, GraphicsError> {
        profile_scope!("compile");
        descriptor.validate()?;
        if !descriptor.inherited().is_empty() {
            return Err(GraphicsError::InheritanceWithoutPrevious);
        }

        let state = self.allocate(&descriptor)?;
        let resource_count = state.len();
        let pass_count = descriptor.pass_count();
        let token = self.graphs.insert(CompiledGraph {
            passes: descriptor.passes,
            state,
        });
        log::debug!("Compiled graph {token:?}: {pass_count} passes, {resource_count} resources");
        Ok(token)
    }

    fn recompile(
        &mut self,
        token: GraphToken,
        descriptor: GraphDescriptor,
    ) -> Result<(), GraphicsError> {
        profile_scope!("recompile");
        descriptor.validate()?;
        let graph = self.graphs.get(token).ok_or(GraphicsError::InvalidToken)?;

        let mut inherited: Vec<(ResourceHandle, ResourceKey)> =
            Vec::with_capacity(descriptor.inherited().len());
        for (new, old) in descriptor.inherited() {
            let key = graph
                .state
                .key(*old)
                .ok_or(GraphicsError::InvalidInheritedHandle(*old))?;
            inherited.push((*new, key));
        }

        let mut state = self.allocate(&descriptor)?;
        for (handle, key) in &inherited {
            self.arena.retain(*key);
            state.insert_inherited(*handle, *key);
        }

        let Some(graph) = self.graphs.get_mut(token) else {
            state.release_all(&mut self.arena);
            return Err(GraphicsError::InvalidToken);
        };
        let previous = std::mem::replace(&mut graph.state, state);
        graph.passes = descriptor.passes;
        let destroyed = previous.release_all(&mut self.arena);
        log::debug!(
            "Recompiled graph {token:?}: {} inherited, {destroyed} objects destroyed",
            inherited.len()
        );
        Ok(())
    }

    fn execute(&mut self, token: GraphToken) -> Result<ExecuteStatistics, GraphicsError> {
        profile_scope!("execute");
        let mut stats = ExecuteStatistics::default();
        self.run_passes(token, &mut stats)?;
        self.finish_frame(&stats)?;
        Ok(stats)
    }

    fn execute_batch(&mut self, tokens: &[GraphToken]) -> Result<ExecuteStatistics, GraphicsError> {
        profile_scope!("execute_batch");
        if tokens.iter().any(|token| !self.graphs.contains_key(*token)) {
            return Err(GraphicsError::InvalidToken);
        }
        let mut stats = ExecuteStatistics::default();
        for token in tokens {
            self.run_passes(*token, &mut stats)?;
        }
        self.finish_frame(&stats)?;
        Ok(stats)
    }

    fn destroy(&mut self, token: GraphToken) -> Result<(), GraphicsError> {
        let graph = self.graphs.remove(token).ok_or(GraphicsError::InvalidToken)?;
        let destroyed = graph.state.release_all(&mut self.arena);
        log::debug!("Destroyed graph {token:?}: {destroyed} objects released");
        Ok(())
    }

    fn is_compiled(&self, token: GraphToken) -> bool {
        self.graphs.contains_key(token)
    }

    fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    fn live_object_count(&self) -> usize {
        self.arena.len()
    }

    fn vram_usage(&self, token: GraphToken) -> Result<VramUsage, GraphicsError> {
        let graph = self.graphs.get(token).ok_or(GraphicsError::InvalidToken)?;
        Ok(vram_of(&self.arena, &graph.state))
    }

    fn set_window(&mut self, window: Box<dyn WindowSurface>) -> Result<(), GraphicsError> {
        self.window = Some(window);
        self.update_back_buffer()?;
        Ok(())
    }

    fn update_back_buffer(&mut self) -> Result<bool, GraphicsError> {
        let Some(window) = self.window.as_ref() else {
            return Ok(false);
        };
        let (width, height) = window.drawable_size();
        let size = (width.max(1), height.max(1));
        if size == self.back_buffer.size() {
            return Ok(false);
        }

        let (color_format, depth_format) = self.back_buffer_formats;
        self.back_buffer = BackBuffer::create(&mut self.device, size, color_format, depth_format)?;
        self.device.back_buffer_resized(size.0, size.1);
        log::debug!("Back buffer reallocated at {}x{}", size.0, size.1);
        Ok(true)
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.back_buffer.size()
    }

    fn save_cache(&self, _path: &Path) -> Result<(), GraphicsError> {
        Err(GraphicsError::NotImplemented("graph cache".to_string()))
    }

    fn load_cache(&mut self, _path: &Path) -> Result<(), GraphicsError> {
        Err(GraphicsError::NotImplemented("graph cache".to_string()))
    }
}

static_assertions::assert_impl_all!(GraphRuntime<crate::backend::DummyDevice>: Send);
static_assertions::assert_obj_safe!(RenderGraphRuntime);

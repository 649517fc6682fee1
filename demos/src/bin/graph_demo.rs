//! # Graph Demo
//!
//! Headless demo of the render graph runtime lifecycle:
//! - compile a graph that uploads a triangle and draws it to the back buffer
//! - execute it for a number of frames
//! - recompile it with a larger vertex buffer, migrating the old contents
//!   through an inherited handle in the first frame after the recompile
//! - destroy it
//!
//! ```bash
//! cargo run --bin graph_demo -- --backend dummy --frames 8 --grow-at 4
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use redlilium_rendergraph::{
    BackendType, BlendMode, ColorAttachment, GraphBuilder, GraphDescriptor, GraphicsError,
    PipelineDescriptor, ResourceHandle, RuntimeParameters, TextureFormat, VertexAttributeFormat,
    VertexBufferLayout, create_runtime,
};

const SHADER: &str = r#"
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

const TRIANGLE: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
const COLOR: [f32; 4] = [0.9, 0.2, 0.3, 1.0];

/// Graphics backend selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// wgpu if an adapter is found, otherwise the dummy device.
    #[default]
    Auto,
    /// Cross-platform backend via wgpu.
    Wgpu,
    /// CPU-memory device for testing and CI environments.
    Dummy,
}

impl From<CliBackend> for BackendType {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Auto => BackendType::Auto,
            CliBackend::Wgpu => BackendType::Wgpu,
            CliBackend::Dummy => BackendType::Dummy,
        }
    }
}

/// Render graph runtime demo.
#[derive(Parser, Debug)]
#[command(name = "graph_demo", about = "Compile, execute and recompile a render graph")]
struct Args {
    /// Graphics backend.
    #[arg(long, value_enum, default_value_t = CliBackend::Auto)]
    backend: CliBackend,

    /// Back-buffer width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Back-buffer height in pixels.
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Number of frames to execute.
    #[arg(long, default_value_t = 8)]
    frames: u32,

    /// Frame at which the graph is recompiled with a larger vertex buffer.
    #[arg(long, default_value_t = 4)]
    grow_at: u32,
}

fn triangle_pipeline() -> PipelineDescriptor {
    PipelineDescriptor::new(SHADER)
        .with_vertex_layout(
            VertexBufferLayout::new(8).with_attribute(0, VertexAttributeFormat::Float2, 0),
        )
        .with_color_target(TextureFormat::Rgba8Unorm, BlendMode::Opaque)
        .with_label("triangle")
}

/// The initial graph: upload the triangle every frame, then draw it.
fn initial_graph(vertex_bytes: u64) -> (GraphDescriptor, ResourceHandle) {
    let mut builder = GraphBuilder::new();
    let vertices = builder.create_vertex_buffer(vertex_bytes);
    let pipeline = builder.create_pipeline(triangle_pipeline());
    let color = builder.back_buffer_color();

    let pass = builder.add_pass("triangle", move |ctx| {
        ctx.upload_buffer(vertices, bytemuck::cast_slice(&TRIANGLE), 0)?;
        ctx.begin_render_pass(
            &[ColorAttachment::new(color).with_clear_color(0.05, 0.05, 0.08, 1.0)],
            None,
            None,
        )?;
        ctx.bind_pipeline(pipeline)?;
        ctx.bind_vertex_buffer(0, vertices, 0)?;
        ctx.set_shader_parameter("params", bytemuck::cast_slice(&COLOR))?;
        ctx.draw_array(0, 3, 1)?;
        ctx.end_render_pass()
    });
    builder.write(pass, vertices);
    builder.read(pass, pipeline);
    builder.write(pass, color);
    (builder.build(), vertices)
}

/// The grown graph: migrate the old vertices once, then draw two instances.
fn grown_graph(
    vertex_bytes: u64,
    previous: ResourceHandle,
    previous_bytes: u64,
) -> Result<GraphDescriptor, GraphicsError> {
    let mut builder = GraphBuilder::inheriting();
    let vertices = builder.create_vertex_buffer(vertex_bytes);
    let stale = builder.inherit_resource(previous)?;
    let pipeline = builder.create_pipeline(triangle_pipeline());
    let color = builder.back_buffer_color();

    let migrated = Arc::new(AtomicBool::new(false));
    let pass = builder.add_pass("triangle", move |ctx| {
        if !migrated.swap(true, Ordering::Relaxed) {
            ctx.copy_buffer(vertices, stale, 0, 0, previous_bytes)?;
            ctx.release_stale(stale)?;
            log::info!("Migrated {previous_bytes} vertex bytes into the grown buffer");
        }
        ctx.begin_render_pass(
            &[ColorAttachment::new(color).with_clear_color(0.05, 0.05, 0.08, 1.0)],
            None,
            None,
        )?;
        ctx.bind_pipeline(pipeline)?;
        ctx.bind_vertex_buffer(0, vertices, 0)?;
        ctx.set_shader_parameter("params", bytemuck::cast_slice(&COLOR))?;
        ctx.draw_array(0, 3, 2)?;
        ctx.end_render_pass()
    });
    builder.read_write(pass, vertices);
    builder.read(pass, stale);
    builder.read(pass, pipeline);
    builder.write(pass, color);
    Ok(builder.build())
}

fn run(args: &Args) -> Result<(), GraphicsError> {
    let params = RuntimeParameters::new()
        .with_backend(args.backend.into())
        .with_back_buffer_size(args.width, args.height);
    let mut runtime = create_runtime(&params)?;
    log::info!(
        "Runtime on {} with a {:?} back buffer",
        runtime.backend_name(),
        runtime.back_buffer_size()
    );

    let (descriptor, vertices) = initial_graph(64);
    let token = runtime.compile(descriptor)?;

    for frame in 0..args.frames {
        if frame == args.grow_at {
            runtime.recompile(token, grown_graph(128, vertices, 64)?)?;
            log::info!("Frame {frame}: recompiled with a 128 byte vertex buffer");
        }
        let stats = runtime.execute(token)?;
        log::info!(
            "Frame {frame}: {} passes, {} draws, {} vertices, {} B uploaded, {} B copied, {} B VRAM",
            stats.passes,
            stats.draw_calls,
            stats.vertices,
            stats.uploaded_bytes,
            stats.copied_bytes,
            stats.vram.total()
        );
    }

    runtime.destroy(token)?;
    log::info!("Destroyed graph; {} graphs remain", runtime.graph_count());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting RedLilium Render Graph Demo");
    log::info!("Render graph version: {}", redlilium_rendergraph::VERSION);

    if let Err(e) = run(&args) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

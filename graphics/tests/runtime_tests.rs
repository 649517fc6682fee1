//! Integration tests for compiling, recompiling and executing render graphs.
//!
//! Tests are parameterized using `rstest` to run against every backend;
//! backends without an adapter on this machine are skipped.
//!
//! # Test Categories
//!
//! - **Handle Tests**: handles only resolve in the graph that minted them
//! - **Recompile Tests**: inherited resources keep their contents, grown
//!   resources can be migrated and released
//! - **Execution Tests**: pass ordering, statistics, shared back buffer
//! - **Lifetime Tests**: destroyed tokens are rejected everywhere
//!
//! ```bash
//! cargo test --test runtime_tests
//! ```

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rstest::rstest;

use common::{
    Backend, PassLog, TRIANGLE_SHADER, TestContext, capture, generate_test_pattern, record_name,
};
use redlilium_rendergraph::{
    BlendMode, ColorAttachment, GraphBuilder, GraphicsError, PipelineDescriptor, ShaderStage,
    TextureDescriptor, TextureFormat, TextureUpload, VertexAttributeFormat, VertexBufferLayout,
};

const TRIANGLE: [f32; 16] = [
    -1.0, -1.0, 3.0, -1.0, -1.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

fn triangle_pipeline() -> PipelineDescriptor {
    PipelineDescriptor::new(TRIANGLE_SHADER)
        .with_vertex_layout(
            VertexBufferLayout::new(8).with_attribute(0, VertexAttributeFormat::Float2, 0),
        )
        .with_color_target(TextureFormat::Rgba8Unorm, BlendMode::Opaque)
        .with_label("triangle")
}

// ============================================================================
// Handle Tests
// ============================================================================

/// A handle minted by one graph never resolves while executing another.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_handle_scoped_to_graph(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = GraphBuilder::new();
    let foreign = builder.create_vertex_buffer(64);
    ctx.runtime.compile(builder.build()).unwrap();

    let mut builder = GraphBuilder::new();
    let own = builder.create_vertex_buffer(64);
    let pass = builder.add_pass("upload", move |ctx| ctx.upload_buffer(foreign, &[0; 64], 0));
    builder.write(pass, own);
    let token = ctx.runtime.compile(builder.build()).unwrap();

    assert_eq!(
        ctx.runtime.execute(token),
        Err(GraphicsError::InvalidResourceHandle(foreign))
    );
}

/// A graph whose pipeline fails to compile leaves nothing allocated.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_failed_compile_allocates_nothing(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = GraphBuilder::new();
    builder.create_vertex_buffer(64);
    builder.create_pipeline(PipelineDescriptor::new("fn vs_main( {"));

    assert!(matches!(
        ctx.runtime.compile(builder.build()),
        Err(GraphicsError::ShaderCompilationFailed(_))
    ));
    assert_eq!(ctx.runtime.graph_count(), 0);
}

// ============================================================================
// Recompile Tests
// ============================================================================

/// An inherited handle refers to the same object as the handle it aliases.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_inherited_resource_keeps_contents(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let pattern = generate_test_pattern(256);

    let mut builder = GraphBuilder::new();
    let old = builder.create_shader_buffer(256u64);
    let data = pattern.clone();
    let pass = builder.add_pass("fill", move |ctx| ctx.upload_buffer(old, &data, 0));
    builder.write(pass, old);
    let token = ctx.runtime.compile(builder.build()).unwrap();
    ctx.runtime.execute(token).unwrap();

    let readback = capture::<Vec<u8>>();
    let mut builder = GraphBuilder::inheriting();
    let inherited = builder.inherit_resource(old).unwrap();
    let slot = Arc::clone(&readback);
    let pass = builder.add_pass("read", move |ctx| {
        *slot.lock() = Some(ctx.download_buffer(inherited, 0, 256)?);
        Ok(())
    });
    builder.read(pass, inherited);
    ctx.runtime.recompile(token, builder.build()).unwrap();
    ctx.runtime.execute(token).unwrap();

    assert_eq!(readback.lock().as_deref(), Some(pattern.as_slice()));
    let usage = ctx.runtime.vram_usage(token).unwrap();
    assert_eq!(usage.shader_buffers, 256);
}

/// The handle a pass used before recompiling is unknown afterwards unless
/// it was inherited.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_old_handle_invalid_after_recompile(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let mut builder = GraphBuilder::new();
    let old = builder.create_index_buffer(32);
    let token = ctx.runtime.compile(builder.build()).unwrap();

    let mut builder = GraphBuilder::inheriting();
    let fresh = builder.create_index_buffer(32);
    let pass = builder.add_pass("stale", move |ctx| ctx.upload_buffer(old, &[0; 4], 0));
    builder.write(pass, fresh);
    ctx.runtime.recompile(token, builder.build()).unwrap();

    assert_eq!(
        ctx.runtime.execute(token),
        Err(GraphicsError::InvalidResourceHandle(old))
    );
}

/// Inheriting a handle the previous state never had fails and keeps the
/// previous state live.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_recompile_with_unknown_inheritance(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let log = PassLog::default();
    let mut builder = GraphBuilder::new();
    builder.create_vertex_buffer(64);
    builder.add_pass("original", record_name(&log));
    let token = ctx.runtime.compile(builder.build()).unwrap();

    let unrelated = GraphBuilder::new().create_vertex_buffer(64);
    let mut builder = GraphBuilder::inheriting();
    builder.inherit_resource(unrelated).unwrap();
    builder.add_pass("replacement", record_name(&log));
    assert_eq!(
        ctx.runtime.recompile(token, builder.build()),
        Err(GraphicsError::InvalidInheritedHandle(unrelated))
    );

    ctx.runtime.execute(token).unwrap();
    assert_eq!(*log.lock(), vec!["original".to_string()]);
    assert_eq!(ctx.runtime.vram_usage(token).unwrap().vertex_buffers, 64);
}

/// Compiling a descriptor that inherits resources is rejected.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_compile_rejects_inheritance(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let previous = GraphBuilder::new().create_vertex_buffer(16);
    let mut builder = GraphBuilder::inheriting();
    builder.inherit_resource(previous).unwrap();

    assert_eq!(
        ctx.runtime.compile(builder.build()),
        Err(GraphicsError::InheritanceWithoutPrevious)
    );
}

/// A grown texture receives the old contents through a whole-texture copy.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_texture_growth_migration(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    const OLD: u32 = 16;
    const NEW: u32 = 32;
    let texels = generate_test_pattern((OLD * OLD * 4) as usize);

    let mut builder = GraphBuilder::new();
    let old = builder.create_texture(TextureDescriptor::new_2d(OLD, OLD, TextureFormat::Rgba8Unorm));
    let data = texels.clone();
    let pass = builder.add_pass("fill", move |ctx| {
        ctx.upload_texture(old, &data, &TextureUpload::new(TextureFormat::Rgba8Unorm))
    });
    builder.write(pass, old);
    let token = ctx.runtime.compile(builder.build()).unwrap();
    ctx.runtime.execute(token).unwrap();

    let readback = capture::<Vec<u8>>();
    let mut builder = GraphBuilder::inheriting();
    let grown = builder.create_texture(TextureDescriptor::new_2d(NEW, NEW, TextureFormat::Rgba8Unorm));
    let stale = builder.inherit_resource(old).unwrap();
    let slot = Arc::clone(&readback);
    let pass = builder.add_pass("migrate", move |ctx| {
        ctx.copy_texture(grown, stale, None)?;
        ctx.release_stale(stale)?;
        *slot.lock() = Some(ctx.download_texture(grown, 0, 0)?);
        Ok(())
    });
    builder.read_write(pass, grown);
    builder.read(pass, stale);
    ctx.runtime.recompile(token, builder.build()).unwrap();
    let stats = ctx.runtime.execute(token).unwrap();

    let migrated = readback.lock().take().unwrap();
    assert_eq!(migrated.len(), (NEW * NEW * 4) as usize);
    let old_row = (OLD * 4) as usize;
    let new_row = (NEW * 4) as usize;
    for row in 0..OLD as usize {
        assert_eq!(
            &migrated[row * new_row..row * new_row + old_row],
            &texels[row * old_row..(row + 1) * old_row],
            "row {row} differs"
        );
    }
    assert_eq!(stats.copied_bytes, u64::from(OLD * OLD * 4));
    assert_eq!(stats.vram.textures, u64::from(NEW * NEW * 4));
}

/// Using a stale handle after releasing it fails.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_released_stale_handle_is_invalid(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let mut builder = GraphBuilder::new();
    let old = builder.create_vertex_buffer(16);
    let token = ctx.runtime.compile(builder.build()).unwrap();

    let mut builder = GraphBuilder::inheriting();
    let fresh = builder.create_vertex_buffer(16);
    let stale = builder.inherit_resource(old).unwrap();
    let pass = builder.add_pass("release", move |ctx| {
        assert!(matches!(
            ctx.release_stale(fresh),
            Err(GraphicsError::InvalidParameter(_))
        ));
        ctx.release_stale(stale)?;
        ctx.download_buffer(stale, 0, 16).map(|_| ())
    });
    builder.read(pass, fresh);
    builder.read(pass, stale);
    ctx.runtime.recompile(token, builder.build()).unwrap();

    assert_eq!(
        ctx.runtime.execute(token),
        Err(GraphicsError::InvalidResourceHandle(stale))
    );
    assert_eq!(ctx.runtime.vram_usage(token).unwrap().vertex_buffers, 16);
}

// ============================================================================
// Execution Tests
// ============================================================================

/// Passes run in declaration order, once per execution.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_pass_order(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let log = PassLog::default();
    let mut builder = GraphBuilder::new();
    for name in ["shadow", "gbuffer", "lighting", "post"] {
        builder.add_pass(name, record_name(&log));
    }
    let token = ctx.runtime.compile(builder.build()).unwrap();

    let first = ctx.runtime.execute(token).unwrap();
    ctx.runtime.execute(token).unwrap();

    assert_eq!(first.passes, 4);
    assert_eq!(
        *log.lock(),
        ["shadow", "gbuffer", "lighting", "post", "shadow", "gbuffer", "lighting", "post"]
    );
}

/// A batch runs every graph in order and sums their statistics.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_execute_batch(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let log = PassLog::default();
    let mut tokens = Vec::new();
    for (name, size) in [("first", 32), ("second", 96)] {
        let mut builder = GraphBuilder::new();
        builder.create_index_buffer(size);
        builder.add_pass(name, record_name(&log));
        tokens.push(ctx.runtime.compile(builder.build()).unwrap());
    }

    let stats = ctx.runtime.execute_batch(&tokens).unwrap();
    assert_eq!(stats.passes, 2);
    assert_eq!(stats.vram.index_buffers, 128);
    assert_eq!(*log.lock(), ["first", "second"]);

    ctx.runtime.destroy(tokens[0]).unwrap();
    assert_eq!(
        ctx.runtime.execute_batch(&tokens),
        Err(GraphicsError::InvalidToken)
    );
    assert_eq!(log.lock().len(), 2, "no pass runs when a token is invalid");
}

/// The back buffer is shared: one graph clears it, another reads it.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_back_buffer_shared_between_graphs(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = GraphBuilder::new();
    let color = builder.back_buffer_color();
    let pass = builder.add_pass("clear", move |ctx| {
        ctx.clear_texture_color(color, [1.0, 0.0, 0.0, 1.0])
    });
    builder.write(pass, color);
    let writer = ctx.runtime.compile(builder.build()).unwrap();

    let readback = capture::<Vec<u8>>();
    let mut builder = GraphBuilder::new();
    let color = builder.back_buffer_color();
    let slot = Arc::clone(&readback);
    let pass = builder.add_pass("read", move |ctx| {
        *slot.lock() = Some(ctx.download_texture(color, 0, 0)?);
        Ok(())
    });
    builder.read(pass, color);
    let reader = ctx.runtime.compile(builder.build()).unwrap();

    ctx.runtime.execute(writer).unwrap();
    ctx.runtime.execute(reader).unwrap();

    let pixels = readback.lock().take().unwrap();
    let (width, height) = ctx.runtime.back_buffer_size();
    assert_eq!(pixels.len(), (width * height * 4) as usize);
    assert!(pixels.chunks_exact(4).all(|texel| texel == [255, 0, 0, 255]));
}

/// Upload, draw, then grow the vertex buffer and migrate its contents.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_vertex_buffer_growth_end_to_end(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let vertices: &[u8] = bytemuck::cast_slice(&TRIANGLE);
    assert_eq!(vertices.len(), 64);

    let mut builder = GraphBuilder::new();
    let vb = builder.create_vertex_buffer(64);
    let pipeline = builder.create_pipeline(triangle_pipeline());
    let color = builder.back_buffer_color();
    let pass = builder.add_pass("draw", move |ctx| {
        ctx.upload_buffer(vb, bytemuck::cast_slice(&TRIANGLE), 0)?;
        ctx.begin_render_pass(&[ColorAttachment::new(color)], None, None)?;
        ctx.bind_pipeline(pipeline)?;
        ctx.bind_vertex_buffer(0, vb, 0)?;
        ctx.set_shader_parameter("params", bytemuck::cast_slice(&[0.0f32, 1.0, 0.0, 1.0]))?;
        ctx.draw_array(0, 3, 1)?;
        ctx.end_render_pass()
    });
    builder.write(pass, vb);
    builder.read(pass, pipeline);
    builder.write(pass, color);
    let token = ctx.runtime.compile(builder.build()).unwrap();

    let stats = ctx.runtime.execute(token).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 3);
    assert_eq!(stats.vram.vertex_buffers, 64);

    let migrated = Arc::new(AtomicBool::new(false));
    let readback = capture::<Vec<u8>>();
    let mut builder = GraphBuilder::inheriting();
    let grown = builder.create_vertex_buffer(128);
    let pipeline = builder.create_pipeline(triangle_pipeline());
    let stale = builder.inherit_resource(vb).unwrap();
    let color = builder.back_buffer_color();
    let done = Arc::clone(&migrated);
    let slot = Arc::clone(&readback);
    let pass = builder.add_pass("draw", move |ctx| {
        if !done.swap(true, Ordering::Relaxed) {
            ctx.copy_buffer(grown, stale, 0, 0, 64)?;
            ctx.release_stale(stale)?;
        }
        ctx.begin_render_pass(&[ColorAttachment::new(color)], None, None)?;
        ctx.bind_pipeline(pipeline)?;
        ctx.bind_vertex_buffer(0, grown, 0)?;
        ctx.set_shader_parameter("params", bytemuck::cast_slice(&[0.0f32, 1.0, 0.0, 1.0]))?;
        ctx.draw_array(0, 3, 1)?;
        ctx.end_render_pass()?;
        *slot.lock() = Some(ctx.download_buffer(grown, 0, 64)?);
        Ok(())
    });
    builder.read_write(pass, grown);
    builder.read(pass, stale);
    builder.read(pass, pipeline);
    builder.write(pass, color);
    ctx.runtime.recompile(token, builder.build()).unwrap();

    let stats = ctx.runtime.execute(token).unwrap();
    assert!(migrated.load(Ordering::Relaxed));
    assert_eq!(readback.lock().as_deref(), Some(vertices));
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.copied_bytes, 64);
    assert_eq!(stats.vram.vertex_buffers, 128);

    // Later frames skip the migration.
    let stats = ctx.runtime.execute(token).unwrap();
    assert_eq!(stats.copied_bytes, 0);
    assert_eq!(readback.lock().as_deref(), Some(vertices));
}

/// Index buffers of three u16 indices are not a multiple of four bytes long;
/// uploads and migrations must still land byte for byte.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_unaligned_index_buffer_growth(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let indices: [u16; 3] = [1, 2, 3];
    let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
    assert_eq!(index_bytes.len(), 6);

    let mut builder = GraphBuilder::new();
    let ib = builder.create_index_buffer(6);
    let pass = builder.add_pass("upload", move |ctx| {
        ctx.upload_buffer(ib, bytemuck::cast_slice(&indices), 0)
    });
    builder.write(pass, ib);
    let token = ctx.runtime.compile(builder.build()).unwrap();
    ctx.runtime.execute(token).unwrap();

    let migrated = Arc::new(AtomicBool::new(false));
    let readback = capture::<Vec<u8>>();
    let mut builder = GraphBuilder::inheriting();
    let grown = builder.create_index_buffer(12);
    let stale = builder.inherit_resource(ib).unwrap();
    let done = Arc::clone(&migrated);
    let slot = Arc::clone(&readback);
    let pass = builder.add_pass("migrate", move |ctx| {
        if !done.swap(true, Ordering::Relaxed) {
            ctx.copy_buffer(grown, stale, 0, 0, 6)?;
            ctx.release_stale(stale)?;
            ctx.upload_buffer(grown, bytemuck::cast_slice(&[4u16, 5, 6]), 6)?;
        }
        *slot.lock() = Some(ctx.download_buffer(grown, 0, 12)?);
        Ok(())
    });
    builder.read_write(pass, grown);
    builder.read(pass, stale);
    ctx.runtime.recompile(token, builder.build()).unwrap();

    let stats = ctx.runtime.execute(token).unwrap();
    assert!(migrated.load(Ordering::Relaxed));
    assert_eq!(stats.copied_bytes, 6);
    assert_eq!(stats.uploaded_bytes, 6);
    assert_eq!(stats.vram.index_buffers, 12);

    let expected: &[u8] = bytemuck::cast_slice(&[1u16, 2, 3, 4, 5, 6]);
    assert_eq!(readback.lock().as_deref(), Some(expected));
}

/// A pipeline unrelated to the change is inherited instead of rebuilt and
/// keeps drawing after the recompile.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_inherited_pipeline_keeps_drawing(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = GraphBuilder::new();
    builder.create_vertex_buffer(64);
    let pipeline = builder.create_pipeline(triangle_pipeline());
    builder.create_texture(TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
    let token = ctx.runtime.compile(builder.build()).unwrap();
    assert_eq!(ctx.runtime.live_object_count(), 3);

    let sources = capture::<Vec<(ShaderStage, String)>>();
    let mut builder = GraphBuilder::inheriting();
    let grown = builder.create_vertex_buffer(128);
    let kept = builder.inherit_resource(pipeline).unwrap();
    let color = builder.back_buffer_color();
    let slot = Arc::clone(&sources);
    let pass = builder.add_pass("draw", move |ctx| {
        ctx.upload_buffer(grown, bytemuck::cast_slice(&TRIANGLE), 0)?;
        *slot.lock() = Some(ctx.shader_source(kept)?);
        ctx.begin_render_pass(&[ColorAttachment::new(color)], None, None)?;
        ctx.bind_pipeline(kept)?;
        ctx.bind_vertex_buffer(0, grown, 0)?;
        ctx.set_shader_parameter("params", bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 1.0]))?;
        ctx.draw_array(0, 3, 1)?;
        ctx.end_render_pass()
    });
    builder.write(pass, grown);
    builder.read(pass, kept);
    builder.write(pass, color);
    ctx.runtime.recompile(token, builder.build()).unwrap();

    // The old vertex buffer and texture are gone; the pipeline is shared.
    assert_eq!(ctx.runtime.live_object_count(), 2);

    let stats = ctx.runtime.execute(token).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 3);
    assert_eq!(stats.vram.vertex_buffers, 128);
    assert_eq!(stats.vram.textures, 0);
    assert_eq!(ctx.runtime.live_object_count(), 2);

    let stages = sources.lock().take().unwrap();
    assert!(stages.iter().any(|(stage, _)| *stage == ShaderStage::Vertex));
    assert!(stages.iter().all(|(_, source)| source.contains("vs_main")));
}

// ============================================================================
// Lifetime Tests
// ============================================================================

/// A destroyed token is rejected by every operation.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_destroy_invalidates_token(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = GraphBuilder::new();
    builder.create_texture(TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm));
    let doomed = ctx.runtime.compile(builder.build()).unwrap();
    let survivor = ctx.runtime.compile(GraphBuilder::new().build()).unwrap();
    assert_eq!(ctx.runtime.graph_count(), 2);

    ctx.runtime.destroy(doomed).unwrap();
    assert!(!ctx.runtime.is_compiled(doomed));
    assert_eq!(ctx.runtime.graph_count(), 1);
    assert_eq!(ctx.runtime.execute(doomed), Err(GraphicsError::InvalidToken));
    assert_eq!(ctx.runtime.destroy(doomed), Err(GraphicsError::InvalidToken));
    assert_eq!(ctx.runtime.vram_usage(doomed), Err(GraphicsError::InvalidToken));
    assert_eq!(
        ctx.runtime.recompile(doomed, GraphBuilder::inheriting().build()),
        Err(GraphicsError::InvalidToken)
    );

    // A fresh token never aliases the destroyed one.
    let fresh = ctx.runtime.compile(GraphBuilder::new().build()).unwrap();
    assert_ne!(fresh, doomed);
    ctx.runtime.execute(survivor).unwrap();
}

/// Cache persistence is not available.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_cache_not_implemented(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };
    let path = std::env::temp_dir().join("rendergraph.cache");

    assert!(matches!(
        ctx.runtime.save_cache(&path),
        Err(GraphicsError::NotImplemented(_))
    ));
    assert!(matches!(
        ctx.runtime.load_cache(&path),
        Err(GraphicsError::NotImplemented(_))
    ));
}

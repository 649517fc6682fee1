//! Command context contract tests.
//!
//! Every backend shares one recorder, so each misuse below must fail the
//! same way on every backend.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, Capture, TRIANGLE_SHADER, TestContext, capture};
use redlilium_rendergraph::{
    BlendMode, ColorAttachment, CommandContext, GraphBuilder, GraphicsError, IndexFormat,
    PipelineDescriptor, ResourceHandle, ShaderStage, TextureDescriptor, TextureFormat,
    TextureUpload, VertexAttributeFormat, VertexBufferLayout,
};

struct Fixture {
    vertices: ResourceHandle,
    indices: ResourceHandle,
    texture: ResourceHandle,
    pipeline: ResourceHandle,
    color: ResourceHandle,
    undeclared: ResourceHandle,
}

/// Compile a graph with one pass running `check`, execute it once and return
/// what `check` reported.
fn run_checks<F>(ctx: &mut TestContext, check: F) -> Vec<Result<(), GraphicsError>>
where
    F: Fn(&mut dyn CommandContext, &Fixture) -> Vec<Result<(), GraphicsError>> + Send + 'static,
{
    let mut builder = GraphBuilder::new();
    let fixture = Fixture {
        vertices: builder.create_vertex_buffer(64),
        indices: builder.create_index_buffer(12),
        texture: builder.create_texture(TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm)),
        pipeline: builder.create_pipeline(
            PipelineDescriptor::new(TRIANGLE_SHADER)
                .with_vertex_layout(
                    VertexBufferLayout::new(8).with_attribute(0, VertexAttributeFormat::Float2, 0),
                )
                .with_color_target(TextureFormat::Rgba8Unorm, BlendMode::Opaque),
        ),
        color: builder.back_buffer_color(),
        undeclared: builder.create_shader_buffer(16u64),
    };
    let (vertices, indices, texture, pipeline, color) = (
        fixture.vertices,
        fixture.indices,
        fixture.texture,
        fixture.pipeline,
        fixture.color,
    );

    let results: Capture<Vec<Result<(), GraphicsError>>> = capture();
    let slot = Arc::clone(&results);
    let pass = builder.add_pass("checks", move |ctx| {
        *slot.lock() = Some(check(ctx, &fixture));
        Ok(())
    });
    builder.read_write(pass, vertices);
    builder.read_write(pass, indices);
    builder.read_write(pass, texture);
    builder.read(pass, pipeline);
    builder.write(pass, color);

    let token = ctx.runtime.compile(builder.build()).unwrap();
    ctx.runtime.execute(token).unwrap();
    results.lock().take().unwrap()
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_commands_outside_render_pass(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let results = run_checks(&mut ctx, |ctx, f| {
        vec![
            ctx.bind_pipeline(f.pipeline),
            ctx.bind_vertex_buffer(0, f.vertices, 0),
            ctx.draw_array(0, 3, 1),
            ctx.clear_color_attachment(0, [0.0; 4]),
            ctx.end_render_pass(),
        ]
    });
    assert!(results.iter().all(|r| *r == Err(GraphicsError::NotInRenderPass)));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_commands_inside_render_pass(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let results = run_checks(&mut ctx, |ctx, f| {
        let mut results = vec![ctx.begin_render_pass(&[ColorAttachment::new(f.color)], None, None)];
        results.push(ctx.begin_render_pass(&[ColorAttachment::new(f.color)], None, None));
        results.push(ctx.upload_buffer(f.vertices, &[0; 8], 0));
        results.push(ctx.copy_buffer(f.vertices, f.vertices, 0, 32, 8));
        results.push(ctx.clear_texture_color(f.texture, [0.0; 4]));
        results.push(ctx.release_stale(f.vertices));
        results.push(ctx.bind_vertex_buffer(0, f.vertices, 0));
        results.push(ctx.draw_array(0, 3, 1));
        results.push(ctx.end_render_pass());
        results
    });
    assert_eq!(results[0], Ok(()));
    for result in &results[1..6] {
        assert_eq!(*result, Err(GraphicsError::RenderPassActive));
    }
    assert_eq!(results[6], Err(GraphicsError::NoPipelineBound));
    assert_eq!(results[7], Err(GraphicsError::NoPipelineBound));
    assert_eq!(results[8], Ok(()));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_draw_requires_every_binding(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let results = run_checks(&mut ctx, |ctx, f| {
        let mut results = vec![
            ctx.begin_render_pass(&[ColorAttachment::new(f.color)], None, None),
            ctx.bind_pipeline(f.pipeline),
        ];
        results.push(ctx.draw_array(0, 3, 1));
        results.push(ctx.bind_vertex_buffer(0, f.vertices, 0));
        results.push(ctx.draw_array(0, 3, 1));
        results.push(ctx.draw_indexed(0, 3, 0, 1));
        results.push(ctx.set_shader_parameter("missing", &[0; 16]));
        results.push(ctx.set_shader_parameter("params", &[0; 16]));
        results.push(ctx.bind_index_buffer(f.indices, IndexFormat::Uint32, 2));
        results.push(ctx.bind_index_buffer(f.indices, IndexFormat::Uint16, 0));
        results.push(ctx.draw_indexed(0, 3, 0, 2));
        results.push(ctx.end_render_pass());
        results
    });
    assert_eq!(&results[..2], &[Ok(()), Ok(())]);
    assert_eq!(
        results[2],
        Err(GraphicsError::MissingBinding("vertex buffer 0".to_string()))
    );
    assert_eq!(results[3], Ok(()));
    assert_eq!(
        results[4],
        Err(GraphicsError::MissingBinding("params".to_string()))
    );
    assert_eq!(
        results[5],
        Err(GraphicsError::MissingBinding("index buffer".to_string()))
    );
    assert_eq!(
        results[6],
        Err(GraphicsError::UnknownBinding("missing".to_string()))
    );
    assert_eq!(results[7], Ok(()));
    assert!(matches!(results[8], Err(GraphicsError::InvalidParameter(_))));
    assert_eq!(&results[9..], &[Ok(()), Ok(()), Ok(())]);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_resource_misuse(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let results = run_checks(&mut ctx, |ctx, f| {
        vec![
            ctx.upload_buffer(f.texture, &[0; 4], 0),
            ctx.clear_texture_color(f.vertices, [0.0; 4]),
            ctx.upload_buffer(f.vertices, &[0; 8], 60),
            ctx.download_buffer(f.indices, 8, 8).map(|_| ()),
            ctx.download_texture(f.texture, 1, 0).map(|_| ()),
            ctx.upload_texture(f.texture, &[0; 64], &TextureUpload::new(TextureFormat::Bgra8Unorm)),
            ctx.upload_buffer(f.undeclared, &[0; 4], 0),
            ctx.upload_buffer(f.vertices, &[1; 64], 0),
        ]
    });
    assert!(matches!(
        results[0],
        Err(GraphicsError::ResourceKindMismatch { expected: "a buffer", .. })
    ));
    assert!(matches!(
        results[1],
        Err(GraphicsError::ResourceKindMismatch { expected: "a texture", .. })
    ));
    assert!(matches!(results[2], Err(GraphicsError::OutOfBounds(_))));
    assert!(matches!(results[3], Err(GraphicsError::OutOfBounds(_))));
    assert!(matches!(results[4], Err(GraphicsError::OutOfBounds(_))));
    assert!(matches!(results[5], Err(GraphicsError::UnsupportedFormat(_))));
    assert!(matches!(
        &results[6],
        Err(GraphicsError::UndeclaredAccess { pass, .. }) if pass == "checks"
    ));
    assert_eq!(results[7], Ok(()));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_copy_within_buffer(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let readback: Capture<Vec<u8>> = capture();
    let slot = Arc::clone(&readback);
    let results = run_checks(&mut ctx, move |ctx, f| {
        let data: Vec<u8> = (0..32).collect();
        let results = vec![
            ctx.upload_buffer(f.vertices, &data, 0),
            ctx.copy_buffer(f.vertices, f.vertices, 32, 0, 32),
            ctx.copy_buffer(f.vertices, f.vertices, 48, 0, 32),
        ];
        *slot.lock() = ctx.download_buffer(f.vertices, 0, 64).ok();
        results
    });

    assert_eq!(&results[..2], &[Ok(()), Ok(())]);
    assert!(matches!(results[2], Err(GraphicsError::OutOfBounds(_))));
    let contents = readback.lock().take().unwrap();
    assert_eq!(&contents[..32], &contents[32..]);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_pass_must_end_render_pass(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        return;
    };

    let mut builder = GraphBuilder::new();
    let color = builder.back_buffer_color();
    let pass = builder.add_pass("leaky", move |ctx| {
        ctx.begin_render_pass(&[ColorAttachment::new(color)], None, None)
    });
    builder.write(pass, color);
    let token = ctx.runtime.compile(builder.build()).unwrap();

    assert_eq!(
        ctx.runtime.execute(token),
        Err(GraphicsError::RenderPassNotEnded("leaky".to_string()))
    );
    // The runtime closed the pass, so the next frame starts clean.
    assert_eq!(
        ctx.runtime.execute(token),
        Err(GraphicsError::RenderPassNotEnded("leaky".to_string()))
    );
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_shader_source(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let sources: Capture<Vec<(ShaderStage, String)>> = capture();
    let slot = Arc::clone(&sources);
    let results = run_checks(&mut ctx, move |ctx, f| {
        let result = ctx.shader_source(f.pipeline).map(|stages| {
            *slot.lock() = Some(stages);
        });
        vec![result, ctx.shader_source(f.vertices).map(|_| ())]
    });

    assert_eq!(results[0], Ok(()));
    assert!(matches!(
        results[1],
        Err(GraphicsError::ResourceKindMismatch { expected: "a pipeline", .. })
    ));
    let stages = sources.lock().take().unwrap();
    assert!(stages.iter().any(|(stage, _)| *stage == ShaderStage::Vertex));
    assert!(stages.iter().all(|(_, source)| source.contains("vs_main")));
}

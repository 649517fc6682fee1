use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use redlilium_rendergraph::{
    DummyDevice, GraphBuilder, GraphDescriptor, GraphRuntime, RenderGraphRuntime, ResourceHandle,
    RuntimeParameters, TextureDescriptor, TextureFormat,
};

fn runtime() -> GraphRuntime<DummyDevice> {
    let params = RuntimeParameters::new()
        .with_back_buffer_size(256, 256)
        .with_pass_access_validation(false);
    GraphRuntime::new(DummyDevice::new(), &params).expect("dummy runtime")
}

/// Graph with `passes` passes, each uploading into its own vertex buffer.
fn upload_graph(passes: usize) -> GraphDescriptor {
    let mut builder = GraphBuilder::new();
    for i in 0..passes {
        let buffer = builder.create_vertex_buffer(256);
        let pass = builder.add_pass(format!("pass_{i}"), move |ctx| {
            ctx.upload_buffer(buffer, &[0xAB; 256], 0)
        });
        builder.write(pass, buffer);
    }
    builder.build()
}

/// Graph declaring `count` textures, optionally inheriting `previous`.
fn texture_graph(count: usize, previous: &[ResourceHandle]) -> (GraphDescriptor, Vec<ResourceHandle>) {
    let mut builder = if previous.is_empty() {
        GraphBuilder::new()
    } else {
        GraphBuilder::inheriting()
    };
    let handles = (0..count)
        .map(|_| {
            builder.create_texture(TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm))
        })
        .collect();
    for old in previous {
        builder.inherit_resource(*old).expect("inheriting builder");
    }
    (builder.build(), handles)
}

// ---------------------------------------------------------------------------
// Graph construction
// ---------------------------------------------------------------------------

fn bench_graph_build_small(c: &mut Criterion) {
    c.bench_function("graph_build_4_passes", |b| {
        b.iter(|| black_box(upload_graph(4)));
    });
}

fn bench_graph_build_large(c: &mut Criterion) {
    c.bench_function("graph_build_64_passes", |b| {
        b.iter(|| black_box(upload_graph(64)));
    });
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn bench_compile_destroy(c: &mut Criterion) {
    let mut runtime = runtime();
    c.bench_function("compile_destroy_32_textures", |b| {
        b.iter_batched(
            || texture_graph(32, &[]).0,
            |descriptor| {
                let token = runtime.compile(descriptor).expect("compile");
                runtime.destroy(token).expect("destroy");
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_recompile_inheriting(c: &mut Criterion) {
    let mut runtime = runtime();
    let (descriptor, mut handles) = texture_graph(16, &[]);
    let token = runtime.compile(descriptor).expect("compile");

    c.bench_function("recompile_16_textures_inheriting", |b| {
        b.iter(|| {
            let (descriptor, fresh) = texture_graph(16, &handles);
            runtime.recompile(token, descriptor).expect("recompile");
            handles = fresh;
        });
    });
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn bench_execute(c: &mut Criterion) {
    let mut runtime = runtime();
    let token = runtime.compile(upload_graph(16)).expect("compile");
    c.bench_function("execute_16_upload_passes", |b| {
        b.iter(|| black_box(runtime.execute(token).expect("execute")));
    });
}

criterion_group!(
    benches,
    bench_graph_build_small,
    bench_graph_build_large,
    bench_compile_destroy,
    bench_recompile_inheriting,
    bench_execute,
);

criterion_main!(benches);

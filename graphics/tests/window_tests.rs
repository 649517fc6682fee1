//! Presentation and device capability tests on the dummy device.
//!
//! These drive [`GraphRuntime`] directly so the device's counters can be
//! inspected after each frame.

use std::sync::Arc;

use parking_lot::Mutex;
use redlilium_rendergraph::{
    DummyDevice, GraphBuilder, GraphRuntime, GraphicsError, RenderGraphRuntime, RuntimeParameters,
    TextureDescriptor, TextureFormat, WindowSurface,
};

/// Shared state of a [`FakeWindow`].
#[derive(Debug, Default)]
struct WindowState {
    size: (u32, u32),
    presented: u32,
    error: Option<GraphicsError>,
}

/// Window whose drawable size the test controls.
struct FakeWindow(Arc<Mutex<WindowState>>);

impl WindowSurface for FakeWindow {
    fn drawable_size(&self) -> (u32, u32) {
        self.0.lock().size
    }

    fn present(&mut self) -> Result<(), GraphicsError> {
        let mut state = self.0.lock();
        match state.error.take() {
            Some(e) => Err(e),
            None => {
                state.presented += 1;
                Ok(())
            }
        }
    }
}

fn runtime(device: DummyDevice) -> GraphRuntime<DummyDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    let params = RuntimeParameters::new()
        .with_back_buffer_size(64, 32)
        .with_pass_access_validation(true);
    GraphRuntime::new(device, &params).unwrap()
}

fn attach_window(runtime: &mut GraphRuntime<DummyDevice>, size: (u32, u32)) -> Arc<Mutex<WindowState>> {
    let state = Arc::new(Mutex::new(WindowState {
        size,
        ..Default::default()
    }));
    runtime
        .set_window(Box::new(FakeWindow(Arc::clone(&state))))
        .unwrap();
    state
}

#[test]
fn test_set_window_sizes_back_buffer() {
    let mut runtime = runtime(DummyDevice::new());
    assert_eq!(runtime.back_buffer_size(), (64, 32));

    attach_window(&mut runtime, (320, 200));
    assert_eq!(runtime.back_buffer_size(), (320, 200));
    assert_eq!(runtime.update_back_buffer(), Ok(false));
}

#[test]
fn test_resize_skips_presentation_until_updated() {
    let mut runtime = runtime(DummyDevice::new());
    let window = attach_window(&mut runtime, (64, 32));
    let token = runtime.compile(GraphBuilder::new().build()).unwrap();

    runtime.execute(token).unwrap();
    assert_eq!(runtime.device().presented_frames(), 1);
    assert_eq!(window.lock().presented, 1);

    // Resized mid-frame: flush only.
    window.lock().size = (80, 40);
    runtime.execute(token).unwrap();
    assert_eq!(runtime.device().presented_frames(), 1);
    assert_eq!(window.lock().presented, 1);

    assert_eq!(runtime.update_back_buffer(), Ok(true));
    assert_eq!(runtime.back_buffer_size(), (80, 40));
    runtime.execute(token).unwrap();
    assert_eq!(runtime.device().presented_frames(), 2);
    assert_eq!(window.lock().presented, 2);
}

#[test]
fn test_zero_sized_drawable_is_clamped() {
    let mut runtime = runtime(DummyDevice::new());
    let window = attach_window(&mut runtime, (64, 32));

    window.lock().size = (0, 0);
    assert_eq!(runtime.update_back_buffer(), Ok(true));
    assert_eq!(runtime.back_buffer_size(), (1, 1));
}

#[test]
fn test_transient_surface_errors_are_swallowed() {
    let mut runtime = runtime(DummyDevice::new());
    let window = attach_window(&mut runtime, (64, 32));
    let token = runtime.compile(GraphBuilder::new().build()).unwrap();

    window.lock().error = Some(GraphicsError::SurfaceOutdated);
    assert!(runtime.execute(token).is_ok());
    window.lock().error = Some(GraphicsError::SurfaceLost);
    assert!(runtime.execute(token).is_ok());

    window.lock().error = Some(GraphicsError::DeviceLost);
    assert_eq!(runtime.execute(token), Err(GraphicsError::DeviceLost));
}

#[test]
fn test_back_buffer_handles_follow_resize() {
    let mut runtime = runtime(DummyDevice::new());
    let window = attach_window(&mut runtime, (16, 8));

    let sizes = Arc::new(Mutex::new(Vec::new()));
    let mut builder = GraphBuilder::new();
    let color = builder.back_buffer_color();
    let seen = Arc::clone(&sizes);
    let pass = builder.add_pass("read", move |ctx| {
        seen.lock().push(ctx.download_texture(color, 0, 0)?.len());
        Ok(())
    });
    builder.read(pass, color);
    let token = runtime.compile(builder.build()).unwrap();

    runtime.execute(token).unwrap();
    window.lock().size = (32, 8);
    runtime.update_back_buffer().unwrap();
    runtime.execute(token).unwrap();

    assert_eq!(*sizes.lock(), [16 * 8 * 4, 32 * 8 * 4]);
}

#[test]
fn test_mip_levels_fall_back_to_device_limit() {
    let mut runtime = runtime(DummyDevice::new().with_max_mip_levels(2));

    let mut builder = GraphBuilder::new();
    let texture = builder.create_texture(
        TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm).with_full_mip_chain(),
    );
    let results = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&results);
    let pass = builder.add_pass("read", move |ctx| {
        let mut seen = seen.lock();
        seen.push(ctx.download_texture(texture, 1, 0).map(|texels| texels.len()));
        seen.push(ctx.download_texture(texture, 2, 0).map(|texels| texels.len()));
        Ok(())
    });
    builder.read(pass, texture);
    let token = runtime.compile(builder.build()).unwrap();
    let stats = runtime.execute(token).unwrap();

    let results = results.lock();
    assert_eq!(results[0], Ok(32 * 32 * 4));
    assert!(matches!(results[1], Err(GraphicsError::OutOfBounds(_))));
    assert_eq!(stats.vram.textures, (64 * 64 + 32 * 32) * 4);
}

#[test]
fn test_graph_runtime_is_object_safe() {
    let runtime: Box<dyn RenderGraphRuntime> = Box::new(runtime(DummyDevice::new()));
    assert_eq!(runtime.backend_name(), "Dummy");
    assert_eq!(runtime.graph_count(), 0);
}

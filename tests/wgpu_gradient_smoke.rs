use neat_gradient::backend::SceneBackend;
use neat_gradient::renderer::GpuScene;
use neat_gradient::scene::SceneState;
use neat_gradient::{
    BackendPreference, Canvas, ControllerOptions, GradientConfig, GradientController,
    GradientError,
};

fn gpu_controller(config: &GradientConfig, width: u32, height: u32) -> Option<GradientController> {
    let result = GradientController::with_options(
        config,
        Canvas::Headless { width, height },
        ControllerOptions {
            backend: BackendPreference::Gpu,
            ..ControllerOptions::default()
        },
    );
    match result {
        Ok(controller) => Some(controller),
        Err(error) if error.downcast_ref::<GradientError>() == Some(&GradientError::NoAdapter) => {
            eprintln!("Skipping test: no GPU adapter found");
            None
        }
        Err(error) => panic!("gpu controller failed to initialize: {error:?}"),
    }
}

#[test]
fn wgpu_gradient_renders_non_empty_opaque_frame() {
    let Some(mut controller) = gpu_controller(&GradientConfig::default(), 64, 64) else {
        return;
    };
    assert_eq!(controller.backend_name(), "wgpu");
    controller.seek(1.0);
    controller.frame().expect("frame should render");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = controller
        .download_as_png(dir.path().join("smoke"))
        .expect("download should succeed");
    let image = image::open(&path).expect("decode").to_rgba8();
    assert_eq!(image.dimensions(), (64, 64));
    assert!(image.pixels().all(|pixel| pixel.0[3] == 255));

    let first = image.get_pixel(0, 0).0;
    assert!(
        image.pixels().any(|pixel| pixel.0 != first),
        "gradient frame should not be a flat fill"
    );
}

#[test]
fn wgpu_survives_resize_texture_and_trail() {
    let mut config = GradientConfig::default();
    config.enable_procedural_texture = true;
    config.mouse_distortion_strength = 1.0;
    config.wireframe = true;
    let Some(mut controller) = gpu_controller(&config, 48, 32) else {
        return;
    };

    let start = std::time::Instant::now();
    controller.pointer_moved(10.0, 10.0);
    controller.frame_at(start).expect("first frame");
    controller.observe_resize_at(80, 40, start);
    controller
        .frame_at(start + std::time::Duration::from_millis(150))
        .expect("frame after resize");

    let stats = controller.stats();
    assert_eq!(stats.resizes, 1);
    assert_eq!(stats.texture_generations, 1);
    assert!(stats.trail_passes >= 1);
    assert_eq!(controller.size(), (80, 40));

    controller.destroy();
    controller.destroy();
    assert!(!controller.frame().expect("frame after destroy"));
}

#[test]
fn unpreserved_backbuffer_cannot_be_read() {
    let scene = SceneState::new(8, 16, 16);
    let mut gpu = match GpuScene::headless(16, 16, &scene.plane, false) {
        Ok(gpu) => gpu,
        Err(error) if error.downcast_ref::<GradientError>() == Some(&GradientError::NoAdapter) => {
            eprintln!("Skipping test: no GPU adapter found");
            return;
        }
        Err(error) => panic!("headless scene failed: {error:?}"),
    };
    let error = gpu.read_pixels().expect_err("backbuffer is not preserved");
    assert_eq!(
        error.downcast_ref::<GradientError>(),
        Some(&GradientError::DrawingBufferNotPreserved)
    );
    gpu.dispose();
    assert!(gpu.is_disposed());
}

#[test]
fn oversized_targets_fit_the_device_limit() {
    let scene = SceneState::new(8, 16, 16);
    let mut gpu = match GpuScene::headless(16, 16, &scene.plane, true) {
        Ok(gpu) => gpu,
        Err(error) if error.downcast_ref::<GradientError>() == Some(&GradientError::NoAdapter) => {
            eprintln!("Skipping test: no GPU adapter found");
            return;
        }
        Err(error) => panic!("headless scene failed: {error:?}"),
    };
    let limit = gpu.max_dimension();
    gpu.resize(limit * 2, limit)
        .expect("oversized resize should be scaled down");
    assert_eq!(gpu.size(), (limit, limit / 2));
    gpu.dispose();
}

use std::time::{Duration, Instant};

use neat_gradient::config::default_colors;
use neat_gradient::{
    BackendPreference, Canvas, ColorSlot, ControllerOptions, GradientConfig, GradientController,
    GradientError,
};

fn software_options() -> ControllerOptions {
    ControllerOptions {
        backend: BackendPreference::Software,
        ..ControllerOptions::default()
    }
}

fn controller(config: &GradientConfig, width: u32, height: u32) -> GradientController {
    GradientController::with_options(
        config,
        Canvas::Headless { width, height },
        software_options(),
    )
    .expect("software controller should build")
}

fn error_kind(error: &anyhow::Error) -> Option<&GradientError> {
    error.downcast_ref::<GradientError>()
}

#[test]
fn default_construction_scenario() {
    let mut config = GradientConfig::default();
    config.colors = default_colors().into_iter().take(4).collect();
    let controller = controller(&config, 32, 24);

    let params = controller.params();
    assert!(!params.wireframe());
    assert_eq!(params.background_alpha(), 1.0);
    assert!((params.normalized().speed - 0.2).abs() < 1.0e-6);
    assert_eq!(controller.mesh_count(), 1);
    assert_eq!(controller.backend_name(), "software");
}

#[test]
fn destroy_before_first_frame_is_clean() {
    let mut controller = controller(&GradientConfig::default(), 16, 16);
    controller.observe_resize(40, 40);
    controller.pointer_moved(3.0, 4.0);
    controller.destroy();

    assert!(!controller.is_alive());
    assert!(!controller.resize_pending());
    assert_eq!(controller.stats().frames, 0);
    assert!(!controller.frame().expect("frame after destroy is a no-op"));
    controller.destroy();
}

#[test]
fn resize_burst_applies_once_with_final_size() {
    let mut controller = controller(&GradientConfig::default(), 16, 16);
    let start = Instant::now();
    for (step, size) in [20_u32, 24, 28, 32].into_iter().enumerate() {
        controller.observe_resize_at(size, size / 2, start + Duration::from_millis(step as u64 * 30));
    }

    controller
        .frame_at(start + Duration::from_millis(120))
        .expect("frame inside the window");
    assert_eq!(controller.stats().resizes, 0);
    assert_eq!(controller.size(), (16, 16));

    controller
        .frame_at(start + Duration::from_millis(200))
        .expect("frame after the window");
    assert_eq!(controller.stats().resizes, 1);
    assert_eq!(controller.size(), (32, 16));

    controller
        .frame_at(start + Duration::from_millis(400))
        .expect("later frame");
    assert_eq!(controller.stats().resizes, 1);
}

#[test]
fn oversized_canvas_is_scaled_to_the_backend_limit() {
    let controller = controller(&GradientConfig::default(), 33_000, 16_500);
    assert_eq!(controller.size(), (8192, 4096));
    assert_eq!(controller.mesh_count(), 1);
}

#[test]
fn resize_is_ignored_without_an_observer() {
    let mut controller = GradientController::with_options(
        &GradientConfig::default(),
        Canvas::Headless {
            width: 16,
            height: 16,
        },
        ControllerOptions {
            resize_observer: false,
            ..software_options()
        },
    )
    .expect("controller");
    let start = Instant::now();
    controller.observe_resize_at(64, 64, start);
    controller
        .frame_at(start + Duration::from_secs(1))
        .expect("frame");
    assert_eq!(controller.size(), (16, 16));
    assert_eq!(controller.stats().resizes, 0);
}

#[test]
fn resolution_change_rebuilds_the_single_mesh() {
    let mut controller = controller(&GradientConfig::default(), 16, 16);
    controller.frame().expect("frame");
    controller.params_mut().set_resolution(0.5);
    controller.frame().expect("frame");
    controller.frame().expect("frame");

    assert_eq!(controller.stats().scene_rebuilds, 1);
    assert_eq!(controller.scene().plane.subdivisions, 120);
    assert_eq!(controller.mesh_count(), 1);
}

#[test]
fn texture_regenerates_only_when_enabled_and_changed() {
    let mut controller = controller(&GradientConfig::default(), 16, 16);
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 0);

    controller.params_mut().set_enable_procedural_texture(true);
    controller.frame().expect("frame");
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 1);

    // Same key again: nothing to do.
    controller.params_mut().set_texture_seed(333);
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 1);

    controller.params_mut().set_texture_seed(334);
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 2);

    // Disabled: changes wait until it is switched back on.
    controller.params_mut().set_enable_procedural_texture(false);
    controller.params_mut().set_texture_band_density(4.0);
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 2);

    controller.params_mut().set_enable_procedural_texture(true);
    controller.frame().expect("frame");
    assert_eq!(controller.stats().texture_generations, 3);
}

#[test]
fn trail_draws_then_clears_once() {
    let mut config = GradientConfig::default();
    config.mouse_distortion_strength = 1.0;
    config.mouse_decay_rate = 0.90;
    let mut controller = controller(&config, 16, 16);

    controller.frame().expect("idle frame");
    assert_eq!(controller.stats().trail_passes, 0);

    controller.pointer_moved(8.0, 8.0);
    let start = Instant::now();
    let mut frame = 0_u64;
    while controller.trail().visible_count() > 0 || frame == 0 {
        controller
            .frame_at(start + Duration::from_millis(frame * 16))
            .expect("frame");
        frame += 1;
        assert!(frame < 200, "brush never faded");
    }
    let passes = controller.stats().trail_passes;
    assert!(passes >= 2);

    controller
        .frame_at(start + Duration::from_millis(frame * 16))
        .expect("frame");
    controller
        .frame_at(start + Duration::from_millis((frame + 1) * 16))
        .expect("frame");
    assert_eq!(controller.stats().trail_passes, passes);
}

#[test]
fn colors_beyond_six_are_ignored() {
    let mut config = GradientConfig::default();
    config.colors = (0..8)
        .map(|index| ColorSlot::new(format!("#0{index}0000"), true))
        .collect();
    let mut controller = controller(&config, 8, 8);
    controller.frame().expect("frame");
    assert_eq!(controller.uniforms().active_colors, 6.0);
    assert!((0..6).all(|slot| controller.uniforms().slot_enabled(slot)));
}

#[test]
fn png_download_appends_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut controller = controller(&GradientConfig::default(), 12, 10);

    let error = controller
        .download_as_png(dir.path().join("early"))
        .expect_err("nothing rendered yet");
    assert_eq!(error_kind(&error), Some(&GradientError::NothingRendered));

    controller.frame().expect("frame");
    let path = controller
        .download_as_png(dir.path().join("shot"))
        .expect("download");
    assert_eq!(path, dir.path().join("shot.png"));

    let image = image::open(&path).expect("written PNG should decode").to_rgba8();
    assert_eq!(image.dimensions(), (12, 10));
    assert!(image.pixels().all(|pixel| pixel.0[3] == 255));

    controller.destroy();
    let error = controller
        .download_as_png(dir.path().join("late.png"))
        .expect_err("destroyed controller");
    assert_eq!(error_kind(&error), Some(&GradientError::Destroyed));
}

#[test]
fn download_requires_a_preserved_drawing_buffer() {
    let mut controller = GradientController::with_options(
        &GradientConfig::default(),
        Canvas::Headless {
            width: 8,
            height: 8,
        },
        ControllerOptions {
            preserve_drawing_buffer: false,
            ..software_options()
        },
    )
    .expect("controller");
    controller.frame().expect("frame");
    let error = controller
        .download_as_png("never")
        .expect_err("drawing buffer not preserved");
    assert_eq!(
        error_kind(&error),
        Some(&GradientError::DrawingBufferNotPreserved)
    );
}

#[test]
fn seek_makes_snapshots_reproducible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut first = controller(&GradientConfig::default(), 16, 16);
    let mut second = controller(&GradientConfig::default(), 16, 16);
    first.seek(3.25);
    second.seek(3.25);
    first.frame().expect("frame");
    second.frame().expect("frame");

    let a = first.download_as_png(dir.path().join("a")).expect("a");
    let b = second.download_as_png(dir.path().join("b")).expect("b");
    let a = image::open(a).expect("decode a").to_rgba8();
    let b = image::open(b).expect("decode b").to_rgba8();
    assert_eq!(a.as_raw(), b.as_raw());
}

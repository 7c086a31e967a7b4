//! Frame benchmarks: software frame, GPU frame and texture generation.
//! Run: cargo bench
//!
//! The GPU benchmark is skipped if no adapter is available.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neat_gradient::texture_gen::generate;
use neat_gradient::{
    BackendPreference, Canvas, ControllerOptions, GradientConfig, GradientController,
    GradientParams,
};

fn controller(backend: BackendPreference, width: u32, height: u32) -> Option<GradientController> {
    GradientController::with_options(
        &GradientConfig::default(),
        Canvas::Headless { width, height },
        ControllerOptions {
            backend,
            ..ControllerOptions::default()
        },
    )
    .map_err(|error| eprintln!("skipping {backend:?} benchmark: {error:#}"))
    .ok()
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_frame");
    group.sample_size(20);

    if let Some(mut software) = controller(BackendPreference::Software, 160, 90) {
        group.bench_function("software_160x90", |b| {
            b.iter(|| black_box(software.frame().expect("software frame")));
        });
    }

    if let Some(mut gpu) = controller(BackendPreference::Gpu, 1280, 720) {
        group.bench_function("gpu_720p", |b| {
            b.iter(|| black_box(gpu.frame().expect("gpu frame")));
        });
    }

    group.finish();
}

fn bench_texture(c: &mut Criterion) {
    let settings = GradientParams::new(&GradientConfig::default()).texture_settings();
    let mut group = c.benchmark_group("procedural_texture");
    group.sample_size(10);
    group.bench_function("generate_512", |b| {
        b.iter(|| black_box(generate(&settings, 512).expect("texture")));
    });
    group.finish();
}

criterion_group!(benches, bench_frames, bench_texture);
criterion_main!(benches);

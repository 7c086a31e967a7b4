//! Gradient controller: owns the parameter state, the scene and one render
//! backend, and drives them one display frame at a time.
//!
//! Hosts call [`GradientController::frame`] once per display refresh. Pointer
//! and resize notifications are buffered and folded in at the next frame, so
//! the controller never does GPU work from inside an event callback.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backend::{fit_to_limit, FrameInputs, SceneBackend};
use crate::config::GradientConfig;
use crate::error::GradientError;
use crate::mouse_trail::{centered_position, MouseTrail, PointerInbox, TrailPass};
use crate::params::GradientParams;
use crate::renderer::GpuScene;
use crate::scene::{GradientUniforms, SceneState};
use crate::software::SoftwareScene;
use crate::texture_gen::{self, TextureSettings, TEXTURE_SIZE};

pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_COLOR_REFRESH: Duration = Duration::from_millis(100);

/// Where the controller draws.
pub enum Canvas {
    Headless {
        width: u32,
        height: u32,
    },
    #[cfg(feature = "play")]
    Window(std::sync::Arc<winit::window::Window>),
}

impl Canvas {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Headless { width, height } => (*width, *height),
            #[cfg(feature = "play")]
            Self::Window(window) => {
                let size = window.inner_size();
                (size.width, size.height)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// GPU when an adapter exists, software otherwise.
    #[default]
    Auto,
    Gpu,
    Software,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub backend: BackendPreference,
    /// Keep the rendered frame readable for [`GradientController::download_as_png`].
    pub preserve_drawing_buffer: bool,
    /// When false, resize notifications are ignored and the canvas keeps its
    /// construction size.
    pub resize_observer: bool,
    pub resize_debounce: Duration,
    /// Upper bound on the interval between color uploads when colors are
    /// unchanged.
    pub color_refresh: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            preserve_drawing_buffer: true,
            resize_observer: true,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            color_refresh: DEFAULT_COLOR_REFRESH,
        }
    }
}

/// Trailing-edge debounce for resize bursts.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    delay: Duration,
    pending: Option<(u32, u32)>,
    deadline: Option<Instant>,
}

impl ResizeDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            deadline: None,
        }
    }

    /// Record a size and push the deadline out.
    pub fn observe(&mut self, width: u32, height: u32, now: Instant) {
        self.pending = Some((width, height));
        self.deadline = Some(now + self.delay);
    }

    /// The last observed size once the burst has been quiet for the delay.
    pub fn due(&mut self, now: Instant) -> Option<(u32, u32)> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Work counters, for hosts and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub frames: u64,
    pub resizes: u64,
    pub scene_rebuilds: u64,
    pub texture_generations: u64,
    pub trail_passes: u64,
    pub color_uploads: u64,
}

pub struct GradientController {
    params: GradientParams,
    options: ControllerOptions,
    backend: Box<dyn SceneBackend>,
    scene: SceneState,
    uniforms: GradientUniforms,
    trail: MouseTrail,
    pointer: PointerInbox,
    resize: ResizeDebouncer,
    width: u32,
    height: u32,
    time: f32,
    last_tick: Option<Instant>,
    last_color_upload: Option<Instant>,
    texture_key: Option<TextureSettings>,
    stats: ControllerStats,
    alive: bool,
}

impl GradientController {
    pub fn new(config: &GradientConfig, canvas: Canvas) -> Result<Self> {
        Self::with_options(config, canvas, ControllerOptions::default())
    }

    pub fn with_options(
        config: &GradientConfig,
        canvas: Canvas,
        options: ControllerOptions,
    ) -> Result<Self> {
        let (width, height) = canvas.size();
        if width == 0 || height == 0 {
            return Err(GradientError::MissingCanvas { width, height }.into());
        }

        let mut params = GradientParams::new(config);
        // Construction builds the mesh directly.
        params.take_mesh_dirty();
        let mut scene = SceneState::new(params.normalized().subdivisions, width, height);
        let backend = create_backend(canvas, &scene, &options)?;
        // Oversized canvases come back scaled to the backend limit.
        let (width, height) = backend.size();
        scene.refit(width, height);

        let mut uniforms = GradientUniforms::default();
        uniforms.write_scene(&scene, width, height);

        info!(
            width,
            height,
            backend = backend.name(),
            subdivisions = scene.plane.subdivisions,
            "gradient controller created"
        );

        Ok(Self {
            params,
            resize: ResizeDebouncer::new(options.resize_debounce),
            options,
            backend,
            scene,
            uniforms,
            trail: MouseTrail::new(),
            pointer: PointerInbox::default(),
            width,
            height,
            time: 0.0,
            last_tick: None,
            last_color_upload: None,
            texture_key: None,
            stats: ControllerStats::default(),
            alive: true,
        })
    }

    pub fn params(&self) -> &GradientParams {
        &self.params
    }

    /// Setters take effect on the next frame.
    pub fn params_mut(&mut self) -> &mut GradientParams {
        &mut self.params
    }

    pub fn apply_config(&mut self, config: &GradientConfig) {
        self.params.apply_config(config);
    }

    pub fn config(&self) -> GradientConfig {
        self.params.config().clone()
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn mesh_count(&self) -> usize {
        if self.alive {
            self.scene.mesh_count()
        } else {
            0
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn uniforms(&self) -> &GradientUniforms {
        &self.uniforms
    }

    pub fn trail(&self) -> &MouseTrail {
        &self.trail
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn resize_pending(&self) -> bool {
        self.resize.is_pending()
    }

    /// Set the animation clock, for reproducible snapshots.
    pub fn seek(&mut self, time: f32) {
        self.time = time;
    }

    /// Canvas-local pointer position in pixels, origin top-left.
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if !self.alive {
            return;
        }
        self.pointer
            .push(centered_position(x, y, self.width, self.height));
    }

    pub fn observe_resize(&mut self, width: u32, height: u32) {
        self.observe_resize_at(width, height, Instant::now());
    }

    pub fn observe_resize_at(&mut self, width: u32, height: u32, now: Instant) {
        if !self.alive || !self.options.resize_observer {
            return;
        }
        self.resize.observe(width, height, now);
    }

    pub fn frame(&mut self) -> Result<bool> {
        self.frame_at(Instant::now())
    }

    /// One render-loop tick. Returns `Ok(false)` once destroyed.
    pub fn frame_at(&mut self, now: Instant) -> Result<bool> {
        if !self.alive {
            return Ok(false);
        }

        if let Some((width, height)) = self.resize.due(now) {
            self.apply_resize(width, height)?;
        }

        if self.params.take_mesh_dirty() {
            self.rebuild_scene()?;
        }

        let delta = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_tick = Some(now);
        self.time += delta * self.params.normalized().speed;

        if let Some(position) = self.pointer.take() {
            let normalized = self.params.normalized();
            let diameter =
                normalized.mouse_distortion_radius * self.width.min(self.height) as f32;
            self.trail.stamp(position, diameter);
        }

        self.uniforms
            .write_scalars(self.params.normalized(), self.time);

        let colors_changed = self.params.take_colors_changed();
        let refresh_due = self
            .last_color_upload
            .map_or(true, |last| now.saturating_duration_since(last) >= self.options.color_refresh);
        if colors_changed || refresh_due {
            self.uniforms
                .write_colors(self.params.shader_colors(), self.params.colors().len());
            self.last_color_upload = Some(now);
            self.stats.color_uploads += 1;
        }

        self.refresh_texture()?;

        let normalized = *self.params.normalized();
        self.trail.advance(normalized.mouse_decay_rate);
        let trail_pass = self
            .trail
            .plan_pass(normalized.mouse_distortion_strength);
        if trail_pass != TrailPass::Skip {
            self.stats.trail_passes += 1;
        }

        self.backend.render(&FrameInputs {
            scene: &self.scene,
            uniforms: &self.uniforms,
            background: normalized.background_color,
            background_alpha: normalized.background_alpha,
            wireframe: normalized.wireframe,
            trail: &self.trail,
            trail_pass,
        })?;

        self.stats.frames += 1;
        Ok(true)
    }

    /// Write the last rendered frame as PNG. `.png` is appended when the name
    /// lacks it. Returns the path written.
    pub fn download_as_png(&mut self, filename: impl AsRef<Path>) -> Result<PathBuf> {
        if !self.alive {
            return Err(GradientError::Destroyed.into());
        }
        if !self.options.preserve_drawing_buffer {
            return Err(GradientError::DrawingBufferNotPreserved.into());
        }

        let path = png_path(filename.as_ref());
        let pixels = self.backend.read_pixels()?;
        let (width, height) = self.backend.size();
        image::save_buffer(&path, &pixels, width, height, image::ColorType::Rgba8)
            .with_context(|| format!("failed to write PNG {}", path.display()))?;
        info!(path = %path.display(), width, height, "frame saved");
        Ok(path)
    }

    /// Stop the loop and release every backend resource. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.resize.cancel();
        self.pointer.clear();
        self.trail.reset();
        self.backend.dispose();
        self.texture_key = None;
        info!(frames = self.stats.frames, "gradient controller destroyed");
    }

    fn apply_resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            debug!(width, height, "ignoring zero-area resize");
            return Ok(());
        }
        let limit = self.backend.max_dimension();
        let fitted = fit_to_limit(width, height, limit);
        if fitted != (width, height) {
            warn!(width, height, limit, "resize exceeds the backend limit; scaling down");
        }
        let (width, height) = fitted;
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.backend.resize(width, height)?;
        self.width = width;
        self.height = height;
        self.scene.refit(width, height);
        self.uniforms.write_scene(&self.scene, width, height);
        self.stats.resizes += 1;
        debug!(width, height, "resize applied");
        Ok(())
    }

    fn rebuild_scene(&mut self) -> Result<()> {
        let subdivisions = self.params.normalized().subdivisions;
        self.scene = SceneState::new(subdivisions, self.width, self.height);
        self.backend.rebuild_mesh(&self.scene.plane)?;
        self.uniforms
            .write_scene(&self.scene, self.width, self.height);
        self.stats.scene_rebuilds += 1;
        debug!(subdivisions, "scene rebuilt");
        Ok(())
    }

    fn refresh_texture(&mut self) -> Result<()> {
        if !self.params.enable_procedural_texture() || !self.params.texture_dirty() {
            return Ok(());
        }
        self.params.clear_texture_dirty();

        let settings = self.params.texture_settings();
        if self.texture_key.as_ref() == Some(&settings) {
            return Ok(());
        }

        let started = Instant::now();
        let bitmap = texture_gen::generate(&settings, TEXTURE_SIZE)
            .context("procedural texture generation failed")?;
        self.backend.upload_texture(&bitmap)?;
        debug!(
            seed = settings.seed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "procedural texture regenerated"
        );
        self.texture_key = Some(settings);
        self.stats.texture_generations += 1;
        Ok(())
    }
}

impl Drop for GradientController {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_backend(
    canvas: Canvas,
    scene: &SceneState,
    options: &ControllerOptions,
) -> Result<Box<dyn SceneBackend>> {
    let (width, height) = canvas.size();
    match canvas {
        Canvas::Headless { .. } => match options.backend {
            BackendPreference::Software => {
                Ok(Box::new(SoftwareScene::new(width, height, &scene.plane)))
            }
            BackendPreference::Gpu => Ok(Box::new(GpuScene::headless(
                width,
                height,
                &scene.plane,
                options.preserve_drawing_buffer,
            )?)),
            BackendPreference::Auto => {
                match GpuScene::headless(width, height, &scene.plane, options.preserve_drawing_buffer)
                {
                    Ok(gpu) => Ok(Box::new(gpu)),
                    Err(error)
                        if error.downcast_ref::<GradientError>()
                            == Some(&GradientError::NoAdapter) =>
                    {
                        warn!("no GPU adapter; falling back to the software renderer");
                        Ok(Box::new(SoftwareScene::new(width, height, &scene.plane)))
                    }
                    Err(error) => Err(error),
                }
            }
        },
        #[cfg(feature = "play")]
        Canvas::Window(window) => {
            if options.backend == BackendPreference::Software {
                warn!("window canvases always render on the GPU");
            }
            Ok(Box::new(GpuScene::for_window(
                window,
                width,
                height,
                &scene.plane,
                options.preserve_drawing_buffer,
            )?))
        }
    }
}

fn png_path(filename: &Path) -> PathBuf {
    let has_png = filename
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if has_png {
        filename.to_path_buf()
    } else {
        let mut name = filename.as_os_str().to_owned();
        name.push(".png");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn software(width: u32, height: u32) -> GradientController {
        GradientController::with_options(
            &GradientConfig::default(),
            Canvas::Headless { width, height },
            ControllerOptions {
                backend: BackendPreference::Software,
                ..ControllerOptions::default()
            },
        )
        .expect("software controller")
    }

    #[test]
    fn debouncer_keeps_last_size_of_burst() {
        let start = Instant::now();
        let mut debouncer = ResizeDebouncer::new(Duration::from_millis(100));
        debouncer.observe(10, 10, start);
        debouncer.observe(20, 20, start + Duration::from_millis(50));
        assert_eq!(debouncer.due(start + Duration::from_millis(120)), None);
        assert_eq!(
            debouncer.due(start + Duration::from_millis(150)),
            Some((20, 20))
        );
        assert_eq!(debouncer.due(start + Duration::from_millis(300)), None);
    }

    #[test]
    fn png_extension_is_appended_once() {
        assert_eq!(png_path(Path::new("shot")), PathBuf::from("shot.png"));
        assert_eq!(png_path(Path::new("shot.PNG")), PathBuf::from("shot.PNG"));
        assert_eq!(
            png_path(Path::new("shot.v2")),
            PathBuf::from("shot.v2.png")
        );
    }

    #[test]
    fn zero_area_canvas_is_rejected() {
        let error = GradientController::new(
            &GradientConfig::default(),
            Canvas::Headless {
                width: 0,
                height: 10,
            },
        )
        .err()
        .expect("zero-area canvas must fail");
        assert_eq!(
            error.downcast_ref::<GradientError>(),
            Some(&GradientError::MissingCanvas {
                width: 0,
                height: 10
            })
        );
    }

    #[test]
    fn time_advances_by_normalized_speed() {
        let mut controller = software(16, 16);
        let start = Instant::now();
        controller.frame_at(start).expect("first frame");
        controller
            .frame_at(start + Duration::from_secs(1))
            .expect("second frame");
        assert!((controller.time() - 0.2).abs() < 1.0e-4);
    }

    #[test]
    fn colors_upload_on_change_or_refresh() {
        let mut controller = software(16, 16);
        let start = Instant::now();
        controller.frame_at(start).expect("frame");
        controller
            .frame_at(start + Duration::from_millis(16))
            .expect("frame");
        assert_eq!(controller.stats().color_uploads, 1);

        controller.params_mut().set_color_enabled(1, false);
        controller
            .frame_at(start + Duration::from_millis(32))
            .expect("frame");
        assert_eq!(controller.stats().color_uploads, 2);
        assert!(!controller.uniforms().slot_enabled(1));

        controller
            .frame_at(start + Duration::from_millis(140))
            .expect("frame");
        assert_eq!(controller.stats().color_uploads, 3);
    }

    #[test]
    fn pointer_positions_coalesce_into_one_stamp() {
        let mut controller = software(100, 100);
        controller.params_mut().set_mouse_distortion_strength(1.0);
        controller.pointer_moved(10.0, 10.0);
        controller.pointer_moved(60.0, 40.0);
        // (60, 40) from the top-left of a 100x100 canvas is (10, 10) centered.
        controller.frame_at(Instant::now()).expect("frame");
        assert_eq!(controller.trail().visible_count(), 1);
        let brush = controller
            .trail()
            .visible()
            .next()
            .expect("one visible brush");
        assert_eq!(brush.position, glam::Vec2::new(10.0, 10.0));
        assert!((brush.scale - 25.0).abs() < 1.0e-4);
    }

    #[test]
    fn destroyed_controller_is_inert() {
        let mut controller = software(8, 8);
        controller.observe_resize(20, 20);
        controller.destroy();
        controller.destroy();
        assert!(!controller.resize_pending());
        assert!(!controller.frame().expect("frame after destroy"));
        assert_eq!(controller.mesh_count(), 0);
    }
}

use anyhow::Result;

use crate::config::Rgb;
use crate::mouse_trail::{MouseTrail, TrailPass};
use crate::scene::{GradientUniforms, PlaneGeometry, SceneState};
use crate::texture_gen::ProceduralBitmap;

/// Everything a backend needs to draw one frame.
pub struct FrameInputs<'a> {
    pub scene: &'a SceneState,
    pub uniforms: &'a GradientUniforms,
    pub background: Rgb,
    pub background_alpha: f32,
    pub wireframe: bool,
    pub trail: &'a MouseTrail,
    pub trail_pass: TrailPass,
}

/// Drawing surface owned by the controller.
///
/// Resource lifetimes follow the controller: a backend is built once, resized
/// in place, and disposed exactly once. Calls after `dispose` are no-ops.
pub trait SceneBackend {
    fn name(&self) -> &'static str;

    fn size(&self) -> (u32, u32);

    /// Largest width or height the backend can allocate.
    fn max_dimension(&self) -> u32;

    /// Reallocate size-dependent targets (backbuffer, depth, mouse mask).
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Replace the plane mesh.
    fn rebuild_mesh(&mut self, plane: &PlaneGeometry) -> Result<()>;

    fn upload_texture(&mut self, bitmap: &ProceduralBitmap) -> Result<()>;

    fn render(&mut self, frame: &FrameInputs<'_>) -> Result<()>;

    /// Straight RGBA8 of the last rendered frame, row-major, no padding.
    fn read_pixels(&mut self) -> Result<Vec<u8>>;

    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Scale `width x height` down to fit `max` on both axes, keeping the aspect
/// ratio. Sizes already inside the limit come back unchanged.
pub fn fit_to_limit(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(longest);
    let fit = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max);
    (fit(width), fit(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_inside_the_limit_are_untouched() {
        assert_eq!(fit_to_limit(1280, 720, 8192), (1280, 720));
        assert_eq!(fit_to_limit(8192, 8192, 8192), (8192, 8192));
    }

    #[test]
    fn oversized_canvas_keeps_its_aspect() {
        assert_eq!(fit_to_limit(10_000, 5_000, 8192), (8192, 4096));
        assert_eq!(fit_to_limit(33_000, 33_000, 8192), (8192, 8192));
        assert_eq!(fit_to_limit(u32::MAX, 1, 8192), (8192, 1));
    }
}

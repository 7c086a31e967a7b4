//! Normalized parameter state behind the controller's setters.
//!
//! Each user-facing field keeps its raw value (what getters return and what
//! export writes) next to the shader-ready value produced by a fixed transform.
//! Setters always write through the transform.

use crate::config::{ColorSlot, GradientConfig, Rgb, COLOR_SLOTS};
use crate::texture_gen::{ShapeCounts, TextureSettings};

pub const SPEED_DIVISOR: f32 = 20.0;
pub const PRESSURE_DIVISOR: f32 = 4.0;
pub const WAVE_FREQUENCY_FACTOR: f32 = 0.04;
pub const WAVE_AMPLITUDE_FACTOR: f32 = 0.75;
pub const COLOR_BLENDING_DIVISOR: f32 = 10.0;
pub const LIGHTING_DIVISOR: f32 = 100.0;
pub const SATURATION_DIVISOR: f32 = 10.0;

pub const BASE_SUBDIVISIONS: f32 = 240.0;
pub const MIN_SUBDIVISIONS: u32 = 2;
pub const MAX_SUBDIVISIONS: u32 = 512;

pub const MOUSE_DECAY_MIN: f32 = 0.90;
pub const MOUSE_DECAY_MAX: f32 = 0.99;
pub const MOUSE_RADIUS_MIN: f32 = 0.01;
pub const MOUSE_RADIUS_MAX: f32 = 1.0;

/// Shader-ready values, read every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedParams {
    pub speed: f32,
    pub horizontal_pressure: f32,
    pub vertical_pressure: f32,
    pub wave_frequency_x: f32,
    pub wave_frequency_y: f32,
    pub wave_amplitude: f32,
    pub shadows: f32,
    pub highlights: f32,
    pub color_saturation: f32,
    pub color_brightness: f32,
    pub color_blending: f32,
    pub background_color: Rgb,
    pub background_alpha: f32,
    pub wireframe: bool,
    pub subdivisions: u32,
    pub grain_intensity: f32,
    pub grain_sparsity: f32,
    pub grain_scale: f32,
    pub grain_speed: f32,
    pub y_offset: f32,
    pub y_offset_wave_multiplier: f32,
    pub y_offset_color_multiplier: f32,
    pub y_offset_flow_multiplier: f32,
    pub flow_distortion_a: f32,
    pub flow_distortion_b: f32,
    pub flow_scale: f32,
    pub flow_ease: f32,
    pub flow_enabled: bool,
    pub mouse_distortion_strength: f32,
    pub mouse_distortion_radius: f32,
    pub mouse_decay_rate: f32,
    pub mouse_darken: f32,
    pub texture_enabled: bool,
    pub texture_ease: f32,
}

/// One of the six color slots as the shader sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderColor {
    pub rgb: Rgb,
    pub enabled: bool,
    pub influence: f32,
}

impl ShaderColor {
    pub const INACTIVE: Self = Self {
        rgb: Rgb::BLACK,
        enabled: false,
        influence: 0.0,
    };
}

macro_rules! linear_param {
    ($(#[$meta:meta])* $field:ident, $setter:ident, |$raw:ident| $normalized:expr) => {
        $(#[$meta])*
        pub fn $field(&self) -> f32 {
            self.config.$field
        }

        pub fn $setter(&mut self, value: f32) {
            self.config.$field = value;
            let $raw = value;
            self.normalized.$field = $normalized;
        }
    };
}

macro_rules! texture_param {
    ($field:ident, $setter:ident, $ty:ty, |$raw:ident| $stored:expr) => {
        pub fn $field(&self) -> $ty {
            self.config.$field
        }

        pub fn $setter(&mut self, value: $ty) {
            let $raw = value;
            let stored = $stored;
            if self.config.$field != stored {
                self.config.$field = stored;
                self.texture_dirty = true;
            }
        }
    };
}

/// Owned mutable gradient state: raw config, normalized values and the
/// change flags the render loop consumes.
#[derive(Debug, Clone)]
pub struct GradientParams {
    config: GradientConfig,
    normalized: NormalizedParams,
    shader_colors: [ShaderColor; COLOR_SLOTS],
    colors_changed: bool,
    texture_dirty: bool,
    mesh_dirty: bool,
}

impl GradientParams {
    pub fn new(config: &GradientConfig) -> Self {
        let mut params = Self {
            config: GradientConfig::default(),
            normalized: normalized_placeholder(),
            shader_colors: [ShaderColor::INACTIVE; COLOR_SLOTS],
            colors_changed: true,
            texture_dirty: true,
            mesh_dirty: false,
        };
        params.apply_config(config);
        params.colors_changed = true;
        params.texture_dirty = true;
        params.mesh_dirty = false;
        params
    }

    /// Push every field of `config` through its setter.
    pub fn apply_config(&mut self, config: &GradientConfig) {
        self.set_colors(config.colors.clone());
        self.set_speed(config.speed);
        self.set_horizontal_pressure(config.horizontal_pressure);
        self.set_vertical_pressure(config.vertical_pressure);
        self.set_wave_frequency_x(config.wave_frequency_x);
        self.set_wave_frequency_y(config.wave_frequency_y);
        self.set_wave_amplitude(config.wave_amplitude);
        self.set_shadows(config.shadows);
        self.set_highlights(config.highlights);
        self.set_color_saturation(config.color_saturation);
        self.set_color_brightness(config.color_brightness);
        self.set_color_blending(config.color_blending);
        self.set_background_color(&config.background_color);
        self.set_background_alpha(config.background_alpha);
        self.set_wireframe(config.wireframe);
        self.set_resolution(config.resolution);
        self.set_grain_intensity(config.grain_intensity);
        self.set_grain_sparsity(config.grain_sparsity);
        self.set_grain_scale(config.grain_scale);
        self.set_grain_speed(config.grain_speed);
        self.set_y_offset(config.y_offset);
        self.set_y_offset_wave_multiplier(config.y_offset_wave_multiplier);
        self.set_y_offset_color_multiplier(config.y_offset_color_multiplier);
        self.set_y_offset_flow_multiplier(config.y_offset_flow_multiplier);
        self.set_flow_distortion_a(config.flow_distortion_a);
        self.set_flow_distortion_b(config.flow_distortion_b);
        self.set_flow_scale(config.flow_scale);
        self.set_flow_ease(config.flow_ease);
        self.set_flow_enabled(config.flow_enabled);
        self.set_mouse_distortion_strength(config.mouse_distortion_strength);
        self.set_mouse_distortion_radius(config.mouse_distortion_radius);
        self.set_mouse_decay_rate(config.mouse_decay_rate);
        self.set_mouse_darken(config.mouse_darken);
        self.set_enable_procedural_texture(config.enable_procedural_texture);
        self.set_texture_void_likelihood(config.texture_void_likelihood);
        self.set_texture_void_width_min(config.texture_void_width_min);
        self.set_texture_void_width_max(config.texture_void_width_max);
        self.set_texture_band_density(config.texture_band_density);
        self.set_texture_color_blending(config.texture_color_blending);
        self.set_texture_seed(config.texture_seed);
        self.set_texture_ease(config.texture_ease);
        self.set_procedural_background_color(&config.procedural_background_color);
        self.set_texture_shape_triangles(config.texture_shape_triangles);
        self.set_texture_shape_circles(config.texture_shape_circles);
        self.set_texture_shape_bars(config.texture_shape_bars);
        self.set_texture_shape_squiggles(config.texture_shape_squiggles);
    }

    /// Raw values as last set.
    pub fn config(&self) -> &GradientConfig {
        &self.config
    }

    pub fn normalized(&self) -> &NormalizedParams {
        &self.normalized
    }

    linear_param!(speed, set_speed, |raw| raw / SPEED_DIVISOR);
    linear_param!(horizontal_pressure, set_horizontal_pressure, |raw| raw / PRESSURE_DIVISOR);
    linear_param!(vertical_pressure, set_vertical_pressure, |raw| raw / PRESSURE_DIVISOR);
    linear_param!(wave_frequency_x, set_wave_frequency_x, |raw| raw * WAVE_FREQUENCY_FACTOR);
    linear_param!(wave_frequency_y, set_wave_frequency_y, |raw| raw * WAVE_FREQUENCY_FACTOR);
    linear_param!(wave_amplitude, set_wave_amplitude, |raw| raw * WAVE_AMPLITUDE_FACTOR);
    linear_param!(shadows, set_shadows, |raw| raw / LIGHTING_DIVISOR);
    linear_param!(highlights, set_highlights, |raw| raw / LIGHTING_DIVISOR);
    linear_param!(color_saturation, set_color_saturation, |raw| raw / SATURATION_DIVISOR);
    linear_param!(color_brightness, set_color_brightness, |raw| raw);
    linear_param!(color_blending, set_color_blending, |raw| raw / COLOR_BLENDING_DIVISOR);
    linear_param!(grain_intensity, set_grain_intensity, |raw| raw);
    linear_param!(grain_sparsity, set_grain_sparsity, |raw| raw);
    linear_param!(grain_speed, set_grain_speed, |raw| raw);
    linear_param!(y_offset, set_y_offset, |raw| raw);
    linear_param!(y_offset_wave_multiplier, set_y_offset_wave_multiplier, |raw| raw);
    linear_param!(y_offset_color_multiplier, set_y_offset_color_multiplier, |raw| raw);
    linear_param!(y_offset_flow_multiplier, set_y_offset_flow_multiplier, |raw| raw);
    linear_param!(flow_distortion_a, set_flow_distortion_a, |raw| raw);
    linear_param!(flow_distortion_b, set_flow_distortion_b, |raw| raw);
    linear_param!(flow_scale, set_flow_scale, |raw| raw);

    /// A grain scale of zero would divide by zero in the shader; it means 1.
    pub fn grain_scale(&self) -> f32 {
        self.config.grain_scale
    }

    pub fn set_grain_scale(&mut self, value: f32) {
        self.config.grain_scale = value;
        self.normalized.grain_scale = if value == 0.0 { 1.0 } else { value };
    }

    pub fn background_color(&self) -> &str {
        &self.config.background_color
    }

    pub fn set_background_color(&mut self, hex: &str) {
        self.config.background_color = hex.to_owned();
        self.normalized.background_color = Rgb::parse_or_black(hex);
    }

    pub fn background_alpha(&self) -> f32 {
        self.config.background_alpha
    }

    pub fn set_background_alpha(&mut self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.config.background_alpha = clamped;
        self.normalized.background_alpha = clamped;
    }

    pub fn wireframe(&self) -> bool {
        self.config.wireframe
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        self.config.wireframe = enabled;
        self.normalized.wireframe = enabled;
    }

    pub fn resolution(&self) -> f32 {
        self.config.resolution
    }

    /// Mesh density. A change in subdivision count rebuilds the scene on the
    /// next frame.
    pub fn set_resolution(&mut self, value: f32) {
        let clamped = value.clamp(0.05, 2.0);
        self.config.resolution = clamped;
        let subdivisions = subdivisions_for(clamped);
        if subdivisions != self.normalized.subdivisions {
            self.normalized.subdivisions = subdivisions;
            self.mesh_dirty = true;
        }
    }

    pub fn flow_ease(&self) -> f32 {
        self.config.flow_ease
    }

    pub fn set_flow_ease(&mut self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.config.flow_ease = clamped;
        self.normalized.flow_ease = clamped;
    }

    pub fn flow_enabled(&self) -> bool {
        self.config.flow_enabled
    }

    pub fn set_flow_enabled(&mut self, enabled: bool) {
        self.config.flow_enabled = enabled;
        self.normalized.flow_enabled = enabled;
    }

    pub fn mouse_distortion_strength(&self) -> f32 {
        self.config.mouse_distortion_strength
    }

    pub fn set_mouse_distortion_strength(&mut self, value: f32) {
        let clamped = value.max(0.0);
        self.config.mouse_distortion_strength = clamped;
        self.normalized.mouse_distortion_strength = clamped;
    }

    pub fn mouse_distortion_radius(&self) -> f32 {
        self.config.mouse_distortion_radius
    }

    pub fn set_mouse_distortion_radius(&mut self, value: f32) {
        let clamped = value.clamp(MOUSE_RADIUS_MIN, MOUSE_RADIUS_MAX);
        self.config.mouse_distortion_radius = clamped;
        self.normalized.mouse_distortion_radius = clamped;
    }

    pub fn mouse_decay_rate(&self) -> f32 {
        self.config.mouse_decay_rate
    }

    pub fn set_mouse_decay_rate(&mut self, value: f32) {
        let clamped = value.clamp(MOUSE_DECAY_MIN, MOUSE_DECAY_MAX);
        self.config.mouse_decay_rate = clamped;
        self.normalized.mouse_decay_rate = clamped;
    }

    pub fn mouse_darken(&self) -> f32 {
        self.config.mouse_darken
    }

    pub fn set_mouse_darken(&mut self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.config.mouse_darken = clamped;
        self.normalized.mouse_darken = clamped;
    }

    pub fn enable_procedural_texture(&self) -> bool {
        self.config.enable_procedural_texture
    }

    pub fn set_enable_procedural_texture(&mut self, enabled: bool) {
        if enabled && !self.config.enable_procedural_texture {
            self.texture_dirty = true;
        }
        self.config.enable_procedural_texture = enabled;
        self.normalized.texture_enabled = enabled;
    }

    pub fn texture_ease(&self) -> f32 {
        self.config.texture_ease
    }

    pub fn set_texture_ease(&mut self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.config.texture_ease = clamped;
        self.normalized.texture_ease = clamped;
    }

    texture_param!(texture_void_likelihood, set_texture_void_likelihood, f32, |raw| raw.clamp(0.0, 1.0));
    texture_param!(texture_void_width_min, set_texture_void_width_min, f32, |raw| raw.max(1.0));
    texture_param!(texture_void_width_max, set_texture_void_width_max, f32, |raw| raw.max(1.0));
    texture_param!(texture_band_density, set_texture_band_density, f32, |raw| raw.max(0.05));
    texture_param!(texture_color_blending, set_texture_color_blending, f32, |raw| raw.clamp(0.0, 1.0));
    texture_param!(texture_seed, set_texture_seed, u32, |raw| raw);
    texture_param!(texture_shape_triangles, set_texture_shape_triangles, u32, |raw| raw);
    texture_param!(texture_shape_circles, set_texture_shape_circles, u32, |raw| raw);
    texture_param!(texture_shape_bars, set_texture_shape_bars, u32, |raw| raw);
    texture_param!(texture_shape_squiggles, set_texture_shape_squiggles, u32, |raw| raw);

    pub fn procedural_background_color(&self) -> &str {
        &self.config.procedural_background_color
    }

    pub fn set_procedural_background_color(&mut self, hex: &str) {
        if self.config.procedural_background_color != hex {
            self.config.procedural_background_color = hex.to_owned();
            self.texture_dirty = true;
        }
    }

    pub fn colors(&self) -> &[ColorSlot] {
        &self.config.colors
    }

    pub fn set_colors(&mut self, colors: Vec<ColorSlot>) {
        if self.config.colors != colors {
            self.config.colors = colors;
            self.texture_dirty = true;
        }
        self.refresh_shader_colors();
    }

    /// Returns `false` when `index` has no configured color.
    pub fn set_color_value(&mut self, index: usize, hex: &str) -> bool {
        let Some(slot) = self.config.colors.get_mut(index) else {
            return false;
        };
        if slot.color_value != hex {
            slot.color_value = hex.to_owned();
            self.texture_dirty = true;
        }
        self.refresh_shader_colors();
        true
    }

    /// Returns `false` when `index` has no configured color.
    pub fn set_color_enabled(&mut self, index: usize, enabled: bool) -> bool {
        let Some(slot) = self.config.colors.get_mut(index) else {
            return false;
        };
        if slot.enabled != enabled {
            slot.enabled = enabled;
            self.texture_dirty = true;
        }
        self.refresh_shader_colors();
        true
    }

    /// Returns `false` when `index` has no configured color.
    pub fn set_color_influence(&mut self, index: usize, influence: Option<f32>) -> bool {
        let Some(slot) = self.config.colors.get_mut(index) else {
            return false;
        };
        slot.influence = influence.map(|value| value.clamp(0.0, 1.0));
        self.refresh_shader_colors();
        true
    }

    /// The fixed-capacity slot array the shader consumes.
    pub fn shader_colors(&self) -> &[ShaderColor; COLOR_SLOTS] {
        &self.shader_colors
    }

    /// Color-pressure controls only act on the live noise mix, which the
    /// procedural texture replaces.
    pub fn color_pressure_available(&self) -> bool {
        !self.config.enable_procedural_texture
    }

    /// Everything the procedural texture depends on.
    pub fn texture_settings(&self) -> TextureSettings {
        let min = self.config.texture_void_width_min;
        let max = self.config.texture_void_width_max.max(min);
        TextureSettings {
            void_likelihood: self.config.texture_void_likelihood,
            void_width_min: min,
            void_width_max: max,
            band_density: self.config.texture_band_density,
            color_blending: self.config.texture_color_blending,
            seed: self.config.texture_seed,
            background: Rgb::parse_or_black(&self.config.procedural_background_color),
            shapes: ShapeCounts {
                triangles: self.config.texture_shape_triangles,
                circles: self.config.texture_shape_circles,
                bars: self.config.texture_shape_bars,
                squiggles: self.config.texture_shape_squiggles,
            },
            colors: self
                .config
                .active_colors()
                .map(|slot| Rgb::parse_or_black(&slot.color_value))
                .collect(),
        }
    }

    pub fn take_colors_changed(&mut self) -> bool {
        std::mem::take(&mut self.colors_changed)
    }

    pub fn texture_dirty(&self) -> bool {
        self.texture_dirty
    }

    pub fn clear_texture_dirty(&mut self) {
        self.texture_dirty = false;
    }

    pub fn take_mesh_dirty(&mut self) -> bool {
        std::mem::take(&mut self.mesh_dirty)
    }

    fn refresh_shader_colors(&mut self) {
        let mut slots = [ShaderColor::INACTIVE; COLOR_SLOTS];
        for (slot, color) in slots.iter_mut().zip(self.config.colors.iter()) {
            *slot = ShaderColor {
                rgb: Rgb::parse_or_black(&color.color_value),
                enabled: color.enabled,
                influence: color
                    .influence
                    .map_or(1.0, |value| value.clamp(0.0, 1.0)),
            };
        }
        self.shader_colors = slots;
        self.colors_changed = true;
    }
}

pub fn subdivisions_for(resolution: f32) -> u32 {
    ((BASE_SUBDIVISIONS * resolution).round() as u32).clamp(MIN_SUBDIVISIONS, MAX_SUBDIVISIONS)
}

fn normalized_placeholder() -> NormalizedParams {
    NormalizedParams {
        speed: 0.0,
        horizontal_pressure: 0.0,
        vertical_pressure: 0.0,
        wave_frequency_x: 0.0,
        wave_frequency_y: 0.0,
        wave_amplitude: 0.0,
        shadows: 0.0,
        highlights: 0.0,
        color_saturation: 0.0,
        color_brightness: 1.0,
        color_blending: 0.0,
        background_color: Rgb::WHITE,
        background_alpha: 1.0,
        wireframe: false,
        subdivisions: subdivisions_for(1.0),
        grain_intensity: 0.0,
        grain_sparsity: 0.0,
        grain_scale: 1.0,
        grain_speed: 0.0,
        y_offset: 0.0,
        y_offset_wave_multiplier: 0.0,
        y_offset_color_multiplier: 0.0,
        y_offset_flow_multiplier: 0.0,
        flow_distortion_a: 0.0,
        flow_distortion_b: 0.0,
        flow_scale: 1.0,
        flow_ease: 0.0,
        flow_enabled: true,
        mouse_distortion_strength: 0.0,
        mouse_distortion_radius: 0.25,
        mouse_decay_rate: 0.96,
        mouse_darken: 0.0,
        texture_enabled: false,
        texture_ease: 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GradientParams {
        GradientParams::new(&GradientConfig::default())
    }

    #[test]
    fn texture_setters_only_mark_dirty_on_change() {
        let mut params = params();
        params.clear_texture_dirty();

        params.set_texture_seed(333);
        assert!(!params.texture_dirty(), "same seed must not dirty the texture");

        params.set_texture_seed(334);
        assert!(params.texture_dirty());
    }

    #[test]
    fn resolution_change_marks_mesh_dirty_once() {
        let mut params = params();
        assert!(!params.take_mesh_dirty());

        params.set_resolution(0.5);
        assert_eq!(params.normalized().subdivisions, 120);
        assert!(params.take_mesh_dirty());
        assert!(!params.take_mesh_dirty());
    }

    #[test]
    fn void_width_bounds_are_ordered_for_generation() {
        let mut params = params();
        params.set_texture_void_width_min(400.0);
        params.set_texture_void_width_max(100.0);
        let settings = params.texture_settings();
        assert_eq!(settings.void_width_min, 400.0);
        assert_eq!(settings.void_width_max, 400.0);
    }

    #[test]
    fn influence_defaults_to_full() {
        let params = params();
        assert_eq!(params.shader_colors()[0].influence, 1.0);
    }

    #[test]
    fn out_of_range_color_index_is_reported() {
        let mut params = params();
        assert!(!params.set_color_enabled(12, true));
        assert!(!params.set_color_value(6, "#000000"));
    }
}

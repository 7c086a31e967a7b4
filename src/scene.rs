//! Scene state: one displaced plane, one orthographic camera and the uniform
//! block the gradient program reads.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::config::COLOR_SLOTS;
use crate::params::{NormalizedParams, ShaderColor};

pub const PLANE_WIDTH: f32 = 50.0;
pub const PLANE_HEIGHT: f32 = 80.0;
/// Rotation of the plane about X.
pub const PLANE_TILT: f32 = -std::f32::consts::PI / 3.5;

pub const CAMERA_Z: f32 = 50.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;

const REFERENCE_AREA: f32 = 1_000_000.0;
const MIN_AREA_SCALE: f32 = 0.35;
const MAX_AREA_SCALE: f32 = 1.6;
const MAX_VISIBLE_WIDTH: f32 = 45.0;
const MAX_VISIBLE_HEIGHT: f32 = 48.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

/// Subdivided plane in the XY plane facing +Z. Row 0 is the top edge.
#[derive(Debug, Clone)]
pub struct PlaneGeometry {
    pub subdivisions: u32,
    pub vertices: Vec<PlaneVertex>,
    pub triangles: Vec<u32>,
    /// Triangle edges, each listed once.
    pub lines: Vec<u32>,
}

impl PlaneGeometry {
    pub fn new(width: f32, height: f32, subdivisions: u32) -> Self {
        let segments = subdivisions.max(1);
        let stride = segments + 1;
        let mut vertices = Vec::with_capacity((stride * stride) as usize);
        for iy in 0..stride {
            let v = iy as f32 / segments as f32;
            for ix in 0..stride {
                let u = ix as f32 / segments as f32;
                vertices.push(PlaneVertex {
                    position: [(u - 0.5) * width, (0.5 - v) * height, 0.0],
                    uv: [u, 1.0 - v],
                    normal: [0.0, 0.0, 1.0],
                });
            }
        }

        let quads = (segments * segments) as usize;
        let mut triangles = Vec::with_capacity(quads * 6);
        let mut lines = Vec::with_capacity(quads * 6 + segments as usize * 4);
        for iy in 0..segments {
            for ix in 0..segments {
                let a = iy * stride + ix;
                let b = (iy + 1) * stride + ix;
                let c = (iy + 1) * stride + ix + 1;
                let d = iy * stride + ix + 1;
                triangles.extend_from_slice(&[a, b, d, b, c, d]);

                lines.extend_from_slice(&[a, d, a, b, b, d]);
                if iy + 1 == segments {
                    lines.extend_from_slice(&[b, c]);
                }
                if ix + 1 == segments {
                    lines.extend_from_slice(&[d, c]);
                }
            }
        }

        Self {
            subdivisions: segments,
            vertices,
            triangles,
            lines,
        }
    }
}

/// Orthographic camera at `z = CAMERA_Z` looking down -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    /// Visible plane extent in world units.
    pub visible: Vec2,
}

impl OrthoCamera {
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            visible: visible_extent(width, height),
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let half = self.visible * 0.5;
        let projection =
            Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, CAMERA_NEAR, CAMERA_FAR);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, CAMERA_Z), Vec3::ZERO, Vec3::Y);
        projection * view
    }
}

/// Area-preserving framing: the visible plane area grows with the viewport
/// area, portrait viewports zoom out, and the result never exceeds the plane.
pub fn visible_extent(width: u32, height: u32) -> Vec2 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    let aspect = width / height;

    let base = PLANE_WIDTH * PLANE_HEIGHT / 4.0;
    let scale = (width * height / REFERENCE_AREA).clamp(MIN_AREA_SCALE, MAX_AREA_SCALE);
    let area = base * scale;

    let mut visible_width = (area * aspect).sqrt();
    let mut visible_height = area / visible_width;
    if aspect < 1.0 {
        let zoom = 1.0 + 0.5 * (1.0 - aspect);
        visible_width *= zoom;
        visible_height *= zoom;
    }

    let shrink = (MAX_VISIBLE_WIDTH / visible_width)
        .min(MAX_VISIBLE_HEIGHT / visible_height)
        .min(1.0);
    Vec2::new(visible_width * shrink, visible_height * shrink)
}

/// The single mesh and its framing.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub camera: OrthoCamera,
    pub plane: PlaneGeometry,
    pub model: Mat4,
}

impl SceneState {
    pub fn new(subdivisions: u32, width: u32, height: u32) -> Self {
        Self {
            camera: OrthoCamera::fit(width, height),
            plane: PlaneGeometry::new(PLANE_WIDTH, PLANE_HEIGHT, subdivisions),
            model: Mat4::from_rotation_x(PLANE_TILT),
        }
    }

    pub fn refit(&mut self, width: u32, height: u32) {
        self.camera = OrthoCamera::fit(width, height);
    }

    pub fn mesh_count(&self) -> usize {
        1
    }
}

/// Mirror of the WGSL `Uniforms` block. Rows of four scalars keep the layout
/// identical on both sides without explicit padding rules.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GradientUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],

    pub wave_frequency_x: f32,
    pub wave_frequency_y: f32,
    pub wave_amplitude: f32,
    pub time: f32,

    pub horizontal_pressure: f32,
    pub vertical_pressure: f32,
    pub color_blending: f32,
    pub active_colors: f32,

    pub shadows: f32,
    pub highlights: f32,
    pub saturation: f32,
    pub brightness: f32,

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

    pub flow_enabled: f32,
    pub mouse_distortion_strength: f32,
    pub mouse_darken: f32,
    pub texture_enabled: f32,

    pub texture_ease: f32,
    pub resolution_x: f32,
    pub resolution_y: f32,
    pub _pad0: f32,

    pub colors: [[f32; 4]; COLOR_SLOTS],
    pub color_enabled: [[f32; 4]; 2],
}

impl Default for GradientUniforms {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            brightness: 1.0,
            grain_scale: 1.0,
            flow_scale: 1.0,
            resolution_x: 1.0,
            resolution_y: 1.0,
            ..Self::zeroed()
        }
    }
}

impl GradientUniforms {
    pub fn write_scene(&mut self, scene: &SceneState, width: u32, height: u32) {
        self.view_proj = scene.camera.view_proj().to_cols_array_2d();
        self.model = scene.model.to_cols_array_2d();
        self.resolution_x = width.max(1) as f32;
        self.resolution_y = height.max(1) as f32;
    }

    /// Hot-path scalar write; every field by name, no lookups.
    pub fn write_scalars(&mut self, params: &NormalizedParams, time: f32) {
        self.time = time;
        self.wave_frequency_x = params.wave_frequency_x;
        self.wave_frequency_y = params.wave_frequency_y;
        self.wave_amplitude = params.wave_amplitude;

        self.horizontal_pressure = params.horizontal_pressure;
        self.vertical_pressure = params.vertical_pressure;
        self.color_blending = params.color_blending;

        self.shadows = params.shadows;
        self.highlights = params.highlights;
        self.saturation = params.color_saturation;
        self.brightness = params.color_brightness;

        self.grain_intensity = params.grain_intensity;
        self.grain_sparsity = params.grain_sparsity;
        self.grain_scale = params.grain_scale;
        self.grain_speed = params.grain_speed;

        self.y_offset = params.y_offset;
        self.y_offset_wave_multiplier = params.y_offset_wave_multiplier;
        self.y_offset_color_multiplier = params.y_offset_color_multiplier;
        self.y_offset_flow_multiplier = params.y_offset_flow_multiplier;

        self.flow_distortion_a = params.flow_distortion_a;
        self.flow_distortion_b = params.flow_distortion_b;
        self.flow_scale = params.flow_scale;
        self.flow_ease = params.flow_ease;
        self.flow_enabled = flag(params.flow_enabled);

        self.mouse_distortion_strength = params.mouse_distortion_strength;
        self.mouse_darken = params.mouse_darken;
        self.texture_enabled = flag(params.texture_enabled);
        self.texture_ease = params.texture_ease;
    }

    /// `configured` is the number of slots the configuration fills.
    pub fn write_colors(&mut self, colors: &[ShaderColor; COLOR_SLOTS], configured: usize) {
        self.active_colors = configured.min(COLOR_SLOTS) as f32;
        self.color_enabled = [[0.0; 4]; 2];
        for (index, color) in colors.iter().enumerate() {
            let [r, g, b] = color.rgb.as_array();
            self.colors[index] = [r, g, b, color.influence];
            self.color_enabled[index / 4][index % 4] = flag(color.enabled);
        }
    }

    pub fn slot_enabled(&self, index: usize) -> bool {
        self.color_enabled[index / 4][index % 4] > 0.5
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgb;

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<GradientUniforms>(), 384);
        assert_eq!(std::mem::size_of::<GradientUniforms>() % 16, 0);
        assert_eq!(std::mem::offset_of!(GradientUniforms, colors), 256);
    }

    #[test]
    fn plane_counts_follow_subdivisions() {
        let plane = PlaneGeometry::new(PLANE_WIDTH, PLANE_HEIGHT, 4);
        assert_eq!(plane.vertices.len(), 25);
        assert_eq!(plane.triangles.len(), 4 * 4 * 6);
        // 3 edges per quad plus the closing bottom row and right column.
        assert_eq!(plane.lines.len(), (4 * 4 * 3 + 4 + 4) * 2);
        assert!(plane.triangles.iter().all(|&index| index < 25));
    }

    #[test]
    fn plane_spans_its_extent() {
        let plane = PlaneGeometry::new(PLANE_WIDTH, PLANE_HEIGHT, 2);
        let first = plane.vertices[0].position;
        let last = plane.vertices[8].position;
        assert_eq!(first, [-25.0, 40.0, 0.0]);
        assert_eq!(last, [25.0, -40.0, 0.0]);
    }

    #[test]
    fn framing_preserves_aspect_in_landscape() {
        let extent = visible_extent(1200, 600);
        assert!((extent.x / extent.y - 2.0).abs() < 1e-4);
        assert!(extent.x <= MAX_VISIBLE_WIDTH + 1e-4);
        assert!(extent.y <= MAX_VISIBLE_HEIGHT + 1e-4);
    }

    #[test]
    fn portrait_zooms_out() {
        let square = visible_extent(500, 500);
        let portrait = visible_extent(400, 625);
        // Equal pixel area, so the only difference is the portrait zoom.
        let square_area = square.x * square.y;
        let portrait_area = portrait.x * portrait.y;
        assert!(portrait_area > square_area);
    }

    #[test]
    fn small_viewports_use_the_minimum_scale() {
        let tiny = visible_extent(10, 10);
        let small = visible_extent(100, 100);
        assert_eq!(tiny, small);
        assert!((tiny.x * tiny.y - 1000.0 * MIN_AREA_SCALE).abs() < 1e-2);
    }

    #[test]
    fn color_write_pads_and_flags_slots() {
        let mut uniforms = GradientUniforms::default();
        let mut colors = [ShaderColor::INACTIVE; COLOR_SLOTS];
        colors[0] = ShaderColor {
            rgb: Rgb::WHITE,
            enabled: true,
            influence: 1.0,
        };
        colors[1] = ShaderColor {
            rgb: Rgb::BLACK,
            enabled: true,
            influence: 0.5,
        };
        uniforms.write_colors(&colors, 2);
        assert_eq!(uniforms.active_colors, 2.0);
        assert!(uniforms.slot_enabled(1));
        assert!(!uniforms.slot_enabled(5));
        assert_eq!(uniforms.colors[1][3], 0.5);
        assert_eq!(uniforms.colors[4], [0.0; 4]);
    }
}

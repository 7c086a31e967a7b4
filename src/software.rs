//! CPU backend.
//!
//! Shades every pixel with the same math as the gradient program, projecting
//! the camera frustum onto the undisplaced tilted plane. Used for headless
//! snapshots without an adapter and for tests.

use anyhow::Result;
use glam::{Vec2, Vec3};
use tracing::{debug, warn};

use crate::backend::{fit_to_limit, FrameInputs, SceneBackend};
use crate::error::GradientError;
use crate::mouse_trail::{brush_texel, composite_over, Brush, TrailPass};
use crate::noise::{fbm3, perlin3, simplex3};
use crate::scene::{GradientUniforms, PlaneGeometry, PLANE_HEIGHT, PLANE_TILT, PLANE_WIDTH};
use crate::texture_gen::ProceduralBitmap;

const COLOR_NOISE_SCALE: f32 = 0.1;
const COLOR_TIME_SCALE: f32 = 0.1;
const TEXTURE_TILING: f32 = 1.5;

/// Matches the default wgpu 2D texture limit.
pub const SOFTWARE_MAX_DIMENSION: u32 = 8192;

pub struct SoftwareScene {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    rendered: bool,
    subdivisions: u32,
    texture: Option<ProceduralBitmap>,
    /// Brushes as of the last trail draw; stands in for the mask target.
    mask: Vec<Brush>,
    disposed: bool,
}

impl SoftwareScene {
    pub fn new(width: u32, height: u32, plane: &PlaneGeometry) -> Self {
        let (width, height) = clamp_canvas(width, height);
        Self {
            width,
            height,
            pixels: pixel_buffer(width, height),
            rendered: false,
            subdivisions: plane.subdivisions,
            texture: None,
            mask: Vec::new(),
            disposed: false,
        }
    }

    fn sample_mask(&self, point: Vec2) -> [f32; 4] {
        self.mask.iter().fold([0.0; 4], |acc, brush| {
            let local = (point - brush.position) / (brush.scale * 0.5).max(1.0e-6);
            composite_over(acc, brush_texel(local, brush.rotation, brush.opacity))
        })
    }
}

impl SceneBackend for SoftwareScene {
    fn name(&self) -> &'static str {
        "software"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn max_dimension(&self) -> u32 {
        SOFTWARE_MAX_DIMENSION
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let (width, height) = clamp_canvas(width, height);
        self.width = width;
        self.height = height;
        self.pixels = pixel_buffer(width, height);
        self.rendered = false;
        Ok(())
    }

    fn rebuild_mesh(&mut self, plane: &PlaneGeometry) -> Result<()> {
        self.subdivisions = plane.subdivisions;
        Ok(())
    }

    fn upload_texture(&mut self, bitmap: &ProceduralBitmap) -> Result<()> {
        if !self.disposed {
            self.texture = Some(bitmap.clone());
        }
        Ok(())
    }

    fn render(&mut self, frame: &FrameInputs<'_>) -> Result<()> {
        if self.disposed {
            return Ok(());
        }

        match frame.trail_pass {
            TrailPass::Draw => {
                self.mask.clear();
                self.mask.extend(frame.trail.visible().copied());
            }
            TrailPass::Clear => self.mask.clear(),
            TrailPass::Skip => {}
        }

        let u = frame.uniforms;
        let (width, height) = (self.width as f32, self.height as f32);
        let half_visible = frame.scene.camera.visible * 0.5;
        let cos_tilt = PLANE_TILT.cos();
        let grid = Grid {
            cell: Vec2::new(
                PLANE_WIDTH / self.subdivisions as f32,
                PLANE_HEIGHT / self.subdivisions as f32,
            ),
            pixel: Vec2::new(
                frame.scene.camera.visible.x / width,
                frame.scene.camera.visible.y / height / cos_tilt,
            ),
        };
        let [br, bg, bb] = frame.background.to_bytes();
        let background = [br, bg, bb, unit_to_byte(frame.background_alpha)];

        let mut pixels = std::mem::take(&mut self.pixels);
        for (index, px) in pixels.chunks_exact_mut(4).enumerate() {
            let frag = Vec2::new(
                (index as u32 % self.width) as f32 + 0.5,
                (index as u32 / self.width) as f32 + 0.5,
            );
            let ndc = Vec2::new(frag.x / width * 2.0 - 1.0, 1.0 - frag.y / height * 2.0);
            let plane = Vec2::new(
                ndc.x * half_visible.x,
                ndc.y * half_visible.y / cos_tilt,
            );

            let outside =
                plane.x.abs() > PLANE_WIDTH * 0.5 || plane.y.abs() > PLANE_HEIGHT * 0.5;
            if outside || (frame.wireframe && !grid.covers(plane)) {
                px.copy_from_slice(&background);
                continue;
            }

            let trail_point = Vec2::new(frag.x - width * 0.5, height * 0.5 - frag.y);
            let mouse = self.sample_mask(trail_point);
            let color = shade(u, plane, frag, mouse, self.texture.as_ref());
            px.copy_from_slice(&[
                unit_to_byte(color.x),
                unit_to_byte(color.y),
                unit_to_byte(color.z),
                255,
            ]);
        }
        self.pixels = pixels;
        self.rendered = true;
        debug!(width = self.width, height = self.height, "software frame rendered");
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>> {
        if self.disposed {
            return Err(GradientError::Destroyed.into());
        }
        if !self.rendered {
            return Err(GradientError::NothingRendered.into());
        }
        Ok(self.pixels.clone())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pixels = Vec::new();
        self.texture = None;
        self.mask.clear();
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

struct Grid {
    cell: Vec2,
    pixel: Vec2,
}

impl Grid {
    /// Whether a plane point lies within half a pixel of a subdivision line.
    fn covers(&self, plane: Vec2) -> bool {
        let offset = plane + Vec2::new(PLANE_WIDTH, PLANE_HEIGHT) * 0.5;
        let cells = offset / self.cell;
        let distance = (cells - cells.round()).abs() * self.cell;
        distance.x <= self.pixel.x * 0.5 || distance.y <= self.pixel.y * 0.5
    }
}

fn shade(
    u: &GradientUniforms,
    plane: Vec2,
    frag: Vec2,
    mouse: [f32; 4],
    texture: Option<&ProceduralBitmap>,
) -> Vec3 {
    let uv = Vec2::new(plane.x / PLANE_WIDTH + 0.5, plane.y / PLANE_HEIGHT + 0.5);
    let t = u.time;

    let wave_y = plane.y + u.y_offset * u.y_offset_wave_multiplier;
    let displacement = perlin3(Vec3::new(
        u.wave_frequency_x * plane.x + t,
        u.wave_frequency_y * wave_y + t,
        t,
    ));
    let flow_uv = warp_uv(u, uv);
    let base = mix_colors(u, flow_uv);

    let push = (Vec2::new(mouse[1], mouse[2]) * 2.0 - Vec2::splat(mouse[3]))
        * u.mouse_distortion_strength;
    let parallax = Vec2::new(0.0, u.y_offset * u.y_offset_color_multiplier * 0.5);
    let texture_uv = (flow_uv + push).lerp(uv + push, u.texture_ease) * TEXTURE_TILING + parallax;
    let textured = texture
        .map(|bitmap| {
            let [r, g, b, _] = bitmap.sample_repeat(texture_uv.x, texture_uv.y);
            Vec3::new(r, g, b)
        })
        .unwrap_or(Vec3::ZERO);

    let mut color = base.lerp(textured, u.texture_enabled);

    let d = displacement * 0.5 + 0.5;
    color += Vec3::splat(u.highlights * d);
    color -= Vec3::splat(u.shadows * (1.0 - d));
    color = adjust_saturation(color, u.saturation);
    color *= u.brightness;
    color *= 1.0 - u.mouse_darken * mouse[3];

    let grain = fbm3(Vec3::new(
        frag.x / u.grain_scale * 0.1,
        frag.y / u.grain_scale * 0.1,
        t * u.grain_speed * 10.0,
    ));
    if grain > u.grain_sparsity {
        color += Vec3::splat(grain * u.grain_intensity * 0.2);
    }

    color.clamp(Vec3::ZERO, Vec3::ONE)
}

fn flow_field(u: &GradientUniforms, uv: Vec2) -> Vec2 {
    let mut q = uv;
    for i in 1..4 {
        let fi = i as f32;
        q.x += u.flow_distortion_a / fi * (fi * u.flow_scale * q.y + u.time).cos();
        q.y += u.flow_distortion_b / fi * (fi * u.flow_scale * q.x + u.time).cos();
    }
    q
}

fn warp_uv(u: &GradientUniforms, uv: Vec2) -> Vec2 {
    if u.flow_enabled < 0.5 {
        return uv;
    }
    let scrolled = uv + Vec2::new(0.0, u.y_offset * u.y_offset_flow_multiplier);
    flow_field(u, scrolled).lerp(uv, u.flow_ease)
}

fn mix_colors(u: &GradientUniforms, uv: Vec2) -> Vec3 {
    let mut color = Vec3::from_slice(&u.colors[0][..3]);
    let pressure = Vec2::new(u.horizontal_pressure, u.vertical_pressure);
    let noise_cord = uv * Vec2::new(PLANE_WIDTH, PLANE_HEIGHT) * COLOR_NOISE_SCALE * pressure
        + Vec2::new(0.0, u.y_offset * u.y_offset_color_multiplier);
    let blend = u.color_blending.max(1.0e-4);
    let t = u.time * COLOR_TIME_SCALE;
    let count = u.active_colors as usize;

    for i in 1..count.min(u.colors.len()) {
        let fi = i as f32;
        let noise_flow = 5.0 + 0.3 * fi;
        let noise_speed = 10.0 + 0.3 * fi;
        let noise_seed = 1.0 + 10.0 * fi;

        let n = simplex3(Vec3::new(
            noise_cord.x * 0.3 + t * noise_flow,
            noise_cord.y * 0.4,
            t * noise_speed + noise_seed,
        )) - 0.1 * fi
            + 0.5 * u.color_blending;
        let n = n.clamp(0.0, 0.9 + 0.02 * fi);

        let enabled = if u.slot_enabled(i) { 1.0 } else { 0.0 };
        let amount = smoothstep(0.0, blend, n) * u.colors[i][3] * enabled;
        color = color.lerp(Vec3::from_slice(&u.colors[i][..3]), amount);
    }
    color
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn adjust_saturation(color: Vec3, amount: f32) -> Vec3 {
    let (h, s, v) = rgb_to_hsv(color.clamp(Vec3::ZERO, Vec3::ONE));
    hsv_to_rgb(h, (s * (1.0 + amount)).clamp(0.0, 1.0), v)
}

fn rgb_to_hsv(c: Vec3) -> (f32, f32, f32) {
    let max = c.max_element();
    let min = c.min_element();
    let delta = max - min;
    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == c.x {
        ((c.y - c.z) / delta).rem_euclid(6.0) / 6.0
    } else if max == c.y {
        ((c.z - c.x) / delta + 2.0) / 6.0
    } else {
        ((c.x - c.y) / delta + 4.0) / 6.0
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let k = Vec3::new(1.0, 2.0 / 3.0, 1.0 / 3.0);
    let p = ((Vec3::splat(h) + k).fract() * 6.0 - Vec3::splat(3.0)).abs();
    v * Vec3::ONE.lerp((p - Vec3::ONE).clamp(Vec3::ZERO, Vec3::ONE), s)
}

fn clamp_canvas(width: u32, height: u32) -> (u32, u32) {
    let fitted = fit_to_limit(width, height, SOFTWARE_MAX_DIMENSION);
    if fitted != (width, height) {
        warn!(
            width,
            height,
            fitted_width = fitted.0,
            fitted_height = fitted.1,
            "canvas exceeds the software limit; scaling down"
        );
    }
    fitted
}

fn pixel_buffer(width: u32, height: u32) -> Vec<u8> {
    vec![0; width as usize * height as usize * 4]
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

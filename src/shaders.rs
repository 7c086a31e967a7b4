//! WGSL sources.
//!
//! The gradient program is assembled from fixed fragments once per process;
//! nothing in it depends on controller state.

use std::sync::OnceLock;

use crate::noise::NOISE_WGSL;

const UNIFORMS_WGSL: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,

    wave_frequency_x: f32,
    wave_frequency_y: f32,
    wave_amplitude: f32,
    time: f32,

    horizontal_pressure: f32,
    vertical_pressure: f32,
    color_blending: f32,
    active_colors: f32,

    shadows: f32,
    highlights: f32,
    saturation: f32,
    brightness: f32,

    grain_intensity: f32,
    grain_sparsity: f32,
    grain_scale: f32,
    grain_speed: f32,

    y_offset: f32,
    y_offset_wave_multiplier: f32,
    y_offset_color_multiplier: f32,
    y_offset_flow_multiplier: f32,

    flow_distortion_a: f32,
    flow_distortion_b: f32,
    flow_scale: f32,
    flow_ease: f32,

    flow_enabled: f32,
    mouse_distortion_strength: f32,
    mouse_darken: f32,
    texture_enabled: f32,

    texture_ease: f32,
    resolution_x: f32,
    resolution_y: f32,
    _pad0: f32,

    // rgb + influence
    colors: array<vec4<f32>, 6>,
    // one flag per slot, packed four to a vector
    color_enabled: array<vec4<f32>, 2>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var mouse_tex: texture_2d<f32>;
@group(0) @binding(2) var mouse_sampler: sampler;
@group(0) @binding(3) var procedural_tex: texture_2d<f32>;
@group(0) @binding(4) var procedural_sampler: sampler;
"#;

const COLOR_WGSL: &str = r#"
fn rgb_to_hsv(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    let p = mix(vec4<f32>(c.bg, k.wz), vec4<f32>(c.gb, k.xy), step(c.b, c.g));
    let q = mix(vec4<f32>(p.xyw, c.r), vec4<f32>(c.r, p.yzx), step(p.x, c.r));
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

fn hsv_to_rgb(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(c.xxx + k.xyz) * 6.0 - k.www);
    return c.z * mix(k.xxx, clamp(p - k.xxx, vec3<f32>(0.0), vec3<f32>(1.0)), c.y);
}

fn adjust_saturation(color: vec3<f32>, amount: f32) -> vec3<f32> {
    var hsv = rgb_to_hsv(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)));
    hsv.y = clamp(hsv.y * (1.0 + amount), 0.0, 1.0);
    return hsv_to_rgb(hsv);
}
"#;

const VERTEX_WGSL: &str = r#"
const PLANE_SIZE: vec2<f32> = vec2<f32>(50.0, 80.0);
const COLOR_NOISE_SCALE: f32 = 0.1;
const COLOR_TIME_SCALE: f32 = 0.1;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) flow_uv: vec2<f32>,
    @location(3) displacement: f32,
}

fn flow_field(uv: vec2<f32>) -> vec2<f32> {
    var q = uv;
    for (var i = 1; i < 4; i = i + 1) {
        let fi = f32(i);
        q.x = q.x + u.flow_distortion_a / fi * cos(fi * u.flow_scale * q.y + u.time);
        q.y = q.y + u.flow_distortion_b / fi * cos(fi * u.flow_scale * q.x + u.time);
    }
    return q;
}

fn warp_uv(uv: vec2<f32>) -> vec2<f32> {
    if u.flow_enabled < 0.5 {
        return uv;
    }
    let scrolled = uv + vec2<f32>(0.0, u.y_offset * u.y_offset_flow_multiplier);
    return mix(flow_field(scrolled), uv, u.flow_ease);
}

fn slot_enabled(i: i32) -> f32 {
    return u.color_enabled[i / 4][i % 4];
}

fn mix_colors(uv: vec2<f32>) -> vec3<f32> {
    var color = u.colors[0].rgb;
    let pressure = vec2<f32>(u.horizontal_pressure, u.vertical_pressure);
    let noise_cord = uv * PLANE_SIZE * COLOR_NOISE_SCALE * pressure
        + vec2<f32>(0.0, u.y_offset * u.y_offset_color_multiplier);
    let blend = max(u.color_blending, 1.0e-4);
    let t = u.time * COLOR_TIME_SCALE;
    let count = i32(u.active_colors);

    for (var i = 1; i < 6; i = i + 1) {
        if i >= count {
            break;
        }
        let fi = f32(i);
        let noise_flow = 5.0 + 0.3 * fi;
        let noise_speed = 10.0 + 0.3 * fi;
        let noise_seed = 1.0 + 10.0 * fi;
        let noise_freq = vec2<f32>(0.3, 0.4);

        var n = snoise(vec3<f32>(
            noise_cord.x * noise_freq.x + t * noise_flow,
            noise_cord.y * noise_freq.y,
            t * noise_speed + noise_seed
        )) - 0.1 * fi + 0.5 * u.color_blending;
        n = clamp(n, 0.0, 0.9 + 0.02 * fi);

        let amount = smoothstep(0.0, blend, n) * u.colors[i].w * slot_enabled(i);
        color = mix(color, u.colors[i].rgb, amount);
    }
    return color;
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    let t = u.time;
    let wave_y = input.position.y + u.y_offset * u.y_offset_wave_multiplier;
    let displacement = cnoise(vec3<f32>(
        u.wave_frequency_x * input.position.x + t,
        u.wave_frequency_y * wave_y + t,
        t
    ));
    let displaced = input.position + input.normal * displacement * u.wave_amplitude;

    let flow_uv = warp_uv(input.uv);

    var out: VertexOutput;
    out.clip = u.view_proj * u.model * vec4<f32>(displaced, 1.0);
    out.color = mix_colors(flow_uv);
    out.uv = input.uv;
    out.flow_uv = flow_uv;
    out.displacement = displacement;
    return out;
}
"#;

const FRAGMENT_WGSL: &str = r#"
const TEXTURE_TILING: f32 = 1.5;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    // Sampled unconditionally: both textures are always bound.
    let screen_uv = input.clip.xy / vec2<f32>(u.resolution_x, u.resolution_y);
    let mouse = textureSample(mouse_tex, mouse_sampler, screen_uv);
    let push = (mouse.gb * 2.0 - vec2<f32>(mouse.a)) * u.mouse_distortion_strength;

    let uv = input.uv + push;
    let flow_uv = input.flow_uv + push;
    let parallax = vec2<f32>(0.0, u.y_offset * u.y_offset_color_multiplier * 0.5);
    let texture_uv = mix(flow_uv, uv, u.texture_ease) * TEXTURE_TILING + parallax;
    let textured = textureSample(procedural_tex, procedural_sampler, texture_uv).rgb;

    var color = mix(input.color, textured, u.texture_enabled);

    let d = input.displacement * 0.5 + 0.5;
    color = color + vec3<f32>(u.highlights * d);
    color = color - vec3<f32>(u.shadows * (1.0 - d));
    color = adjust_saturation(color, u.saturation);
    color = color * u.brightness;
    color = color * (1.0 - u.mouse_darken * mouse.a);

    let grain_point = vec3<f32>(
        input.clip.xy / u.grain_scale * 0.1,
        u.time * u.grain_speed * 10.0
    );
    let grain = fbm(grain_point);
    let gated = select(0.0, grain, grain > u.grain_sparsity);
    color = color + vec3<f32>(gated * u.grain_intensity * 0.2);

    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;

/// Brush stamps into the half-resolution mouse mask.
pub const TRAIL_WGSL: &str = r#"
struct TrailCamera {
    half_extent: vec2<f32>,
    _pad0: vec2<f32>,
}

@group(0) @binding(0) var<uniform> camera: TrailCamera;

struct BrushInput {
    @location(0) position: vec2<f32>,
    @location(1) scale: f32,
    @location(2) rotation: f32,
    @location(3) opacity: f32,
}

struct BrushOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) rotation: f32,
    @location(2) opacity: f32,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, brush: BrushInput) -> BrushOutput {
    var corners = array<vec2<f32>, 4>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, 1.0)
    );
    let local = corners[vertex_index];
    let world = brush.position + local * brush.scale * 0.5;

    var out: BrushOutput;
    out.clip = vec4<f32>(world / camera.half_extent, 0.0, 1.0);
    out.local = local;
    out.rotation = brush.rotation;
    out.opacity = brush.opacity;
    return out;
}

@fragment
fn fs_main(input: BrushOutput) -> @location(0) vec4<f32> {
    let distance = length(input.local);
    let falloff = clamp(1.0 - distance, 0.0, 1.0);
    let amount = falloff * falloff * (3.0 - 2.0 * falloff) * input.opacity;
    let n = select(vec2<f32>(0.0), input.local / max(distance, 1.0e-6), distance > 0.0);
    let c = cos(input.rotation);
    let s = sin(input.rotation);
    let direction = vec2<f32>(c * n.x - s * n.y, s * n.x + c * n.y);
    return vec4<f32>(amount, (direction * 0.5 + vec2<f32>(0.5)) * amount, amount);
}
"#;

/// Full-screen copy of the backbuffer to the window surface.
pub const BLIT_WGSL: &str = r#"
@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(3.0, 1.0)
    );

    var out: VertexOutput;
    let p = positions[vertex_index];
    out.position = vec4<f32>(p, 0.0, 1.0);
    out.uv = p * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5, 0.5);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(source_tex, source_sampler, input.uv);
}
"#;

/// Complete gradient program: uniform block, noise, color helpers, vertex
/// and fragment stages.
pub fn gradient_program() -> &'static str {
    static SOURCE: OnceLock<String> = OnceLock::new();
    SOURCE.get_or_init(|| {
        [
            UNIFORMS_WGSL,
            NOISE_WGSL,
            COLOR_WGSL,
            VERTEX_WGSL,
            FRAGMENT_WGSL,
        ]
        .concat()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_is_assembled_once() {
        let first = gradient_program();
        let second = gradient_program();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn program_declares_entry_points_and_noise() {
        let source = gradient_program();
        for needle in ["fn vs_main", "fn fs_main", "fn cnoise", "fn snoise", "fn fbm"] {
            assert!(source.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn auxiliary_shaders_have_entry_points() {
        for source in [TRAIL_WGSL, BLIT_WGSL] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
        }
    }
}

//! Procedural texture generator.
//!
//! Produces a tileable RGBA bitmap of banded "matter" stripes separated by
//! empty "void" runs. Output depends only on [`TextureSettings`]; the same
//! settings yield a byte-identical bitmap on every invocation.

use std::f32::consts::TAU;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tiny_skia::{
    Color, FillRule, GradientStop, LineCap, LinearGradient, Paint, PathBuilder, Pixmap, Point,
    Rect, SpreadMode, Stroke, Transform,
};

use crate::config::Rgb;
use crate::rng::SinRandom;

/// Side length of the generated square texture.
pub const TEXTURE_SIZE: u32 = 1024;

const SEGMENTATION_SEED_OFFSET: u32 = 1000;
const GRADIENT_ALPHA: f32 = 0.85;
const MATTER_WIDTH_MIN: f32 = 50.0;
const MATTER_WIDTH_SPAN: f32 = 200.0;
const STRIPE_BASE_WIDTH: f32 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeCounts {
    pub triangles: u32,
    pub circles: u32,
    pub bars: u32,
    pub squiggles: u32,
}

/// Every input the bitmap depends on. Equality of two settings values means
/// the cached bitmap can be reused.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSettings {
    pub void_likelihood: f32,
    pub void_width_min: f32,
    pub void_width_max: f32,
    pub band_density: f32,
    pub color_blending: f32,
    pub seed: u32,
    pub background: Rgb,
    pub shapes: ShapeCounts,
    /// Active colors in slot order.
    pub colors: Vec<Rgb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Void,
    Matter,
}

/// One horizontal run of the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: u32,
    pub width: u32,
    pub kind: RunKind,
}

/// RGBA8 pixels, row-major. Taken from a premultiplied pixmap; every pixel is
/// opaque, so the bytes are also valid straight alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProceduralBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ProceduralBitmap {
    /// Pixel at `(u, v)` with repeat addressing, nearest filtering.
    pub fn sample_repeat(&self, u: f32, v: f32) -> [f32; 4] {
        let x = (u.rem_euclid(1.0) * self.width as f32) as u32;
        let y = (v.rem_euclid(1.0) * self.height as f32) as u32;
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let idx = ((y * self.width + x) * 4) as usize;
        let px = &self.rgba[idx..idx + 4];
        [
            f32::from(px[0]) / 255.0,
            f32::from(px[1]) / 255.0,
            f32::from(px[2]) / 255.0,
            f32::from(px[3]) / 255.0,
        ]
    }

    /// Full mip chain down to 1x1, level 0 first.
    pub fn mip_chain(&self) -> Result<Vec<RgbaImage>> {
        let base = RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .context("procedural bitmap has inconsistent dimensions")?;
        let mut levels = vec![base];
        let (mut width, mut height) = (self.width, self.height);
        while width > 1 || height > 1 {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let previous = levels.last().context("mip chain lost its base level")?;
            let next = imageops::resize(previous, width, height, FilterType::Triangle);
            levels.push(next);
        }
        Ok(levels)
    }

    pub fn fingerprint(&self) -> u64 {
        fnv1a64(&self.rgba)
    }
}

/// Render the texture at `size × size`.
pub fn generate(settings: &TextureSettings, size: u32) -> Result<ProceduralBitmap> {
    let mut rng = SinRandom::new(settings.seed);
    let source = render_source(settings, size, &mut rng)?;

    let mut layout_rng = SinRandom::with_offset(settings.seed, SEGMENTATION_SEED_OFFSET);
    let runs = segment(settings, size, &mut layout_rng);
    let masked = render_masked(settings, &source, &runs, &mut layout_rng)?;

    Ok(ProceduralBitmap {
        width: size,
        height: size,
        rgba: masked.take(),
    })
}

/// Split `[0, size)` into alternating void and matter runs.
pub fn segment(settings: &TextureSettings, size: u32, rng: &mut SinRandom) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut x = 0_u32;
    while x < size {
        let (kind, width) = if rng.next_f32() < settings.void_likelihood {
            let max = settings.void_width_max.max(settings.void_width_min);
            (RunKind::Void, rng.range(settings.void_width_min, max))
        } else {
            let width = MATTER_WIDTH_MIN + (rng.next_f32() * MATTER_WIDTH_SPAN).floor();
            (RunKind::Matter, width)
        };
        let width = (width.round() as u32).clamp(1, size - x);
        runs.push(Run {
            start: x,
            width,
            kind,
        });
        x += width;
    }
    runs
}

pub fn stripe_width(band_density: f32) -> u32 {
    ((STRIPE_BASE_WIDTH / band_density.max(0.05)).round() as u32).max(1)
}

fn render_source(settings: &TextureSettings, size: u32, rng: &mut SinRandom) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(size, size).context("failed to create source pixmap")?;
    pixmap.fill(opaque(settings.background));
    let extent = size as f32;

    let top = blend_color(settings, rng);
    let bottom = blend_color(settings, rng);
    let gradient = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(0.0, extent),
        vec![
            GradientStop::new(0.0, with_alpha(top, GRADIENT_ALPHA)),
            GradientStop::new(1.0, with_alpha(bottom, GRADIENT_ALPHA)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    )
    .context("failed to build background gradient")?;
    let mut paint = Paint {
        shader: gradient,
        anti_alias: true,
        ..Paint::default()
    };
    let full = Rect::from_xywh(0.0, 0.0, extent, extent).context("invalid texture extent")?;
    pixmap.fill_rect(full, &paint, Transform::identity(), None);

    paint = Paint {
        anti_alias: true,
        ..Paint::default()
    };

    for _ in 0..settings.shapes.triangles {
        let cx = rng.next_f32() * extent;
        let cy = rng.next_f32() * extent;
        let radius = rng.range(40.0, 240.0) * 0.5;
        let angle = rng.next_f32() * TAU;
        paint.set_color(opaque(blend_color(settings, rng)));
        let mut builder = PathBuilder::new();
        for corner in 0..3 {
            let theta = angle + corner as f32 * TAU / 3.0;
            let (px, py) = (cx + radius * theta.cos(), cy + radius * theta.sin());
            if corner == 0 {
                builder.move_to(px, py);
            } else {
                builder.line_to(px, py);
            }
        }
        builder.close();
        if let Some(path) = builder.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    for _ in 0..settings.shapes.circles {
        let cx = rng.next_f32() * extent;
        let cy = rng.next_f32() * extent;
        let radius = rng.range(20.0, 200.0);
        let stroke = Stroke {
            width: rng.range(4.0, 24.0),
            ..Stroke::default()
        };
        paint.set_color(opaque(blend_color(settings, rng)));
        if let Some(path) = PathBuilder::from_circle(cx, cy, radius) {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    for _ in 0..settings.shapes.bars {
        let cx = rng.next_f32() * extent;
        let cy = rng.next_f32() * extent;
        let width = rng.range(20.0, 80.0);
        let height = rng.range(100.0, 600.0);
        let degrees = rng.next_f32() * 360.0;
        paint.set_color(opaque(blend_color(settings, rng)));
        if let Some(rect) = Rect::from_xywh(cx - width / 2.0, cy - height / 2.0, width, height) {
            pixmap.fill_rect(rect, &paint, Transform::from_rotate_at(degrees, cx, cy), None);
        }
    }

    for _ in 0..settings.shapes.squiggles {
        let mut x = rng.next_f32() * extent;
        let mut y = rng.next_f32() * extent;
        let stroke = Stroke {
            width: rng.range(3.0, 15.0),
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        paint.set_color(opaque(blend_color(settings, rng)));
        let mut builder = PathBuilder::new();
        builder.move_to(x, y);
        for _ in 0..3 {
            let c1 = (x + rng.range(-100.0, 100.0), y + rng.range(-100.0, 100.0));
            let c2 = (x + rng.range(-100.0, 100.0), y + rng.range(-100.0, 100.0));
            x += rng.range(-100.0, 100.0);
            y += rng.range(-100.0, 100.0);
            builder.cubic_to(c1.0, c1.1, c2.0, c2.1, x, y);
        }
        if let Some(path) = builder.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    Ok(pixmap)
}

fn render_masked(
    settings: &TextureSettings,
    source: &Pixmap,
    runs: &[Run],
    rng: &mut SinRandom,
) -> Result<Pixmap> {
    let size = source.width();
    let mut masked = Pixmap::new(size, source.height()).context("failed to create masked pixmap")?;
    masked.fill(opaque(settings.background));

    let stripe = stripe_width(settings.band_density).min(size);
    let offsets = (size - stripe + 1) as usize;
    let row_len = size as usize;
    let source_pixels = source.pixels();
    let target_pixels = masked.pixels_mut();

    for run in runs.iter().filter(|run| run.kind == RunKind::Matter) {
        let end = run.start + run.width;
        let mut x = run.start;
        while x < end {
            let src_x = rng.index(offsets);
            let width = stripe.min(end - x) as usize;
            for row in 0..source.height() as usize {
                let src = row * row_len + src_x;
                let dst = row * row_len + x as usize;
                target_pixels[dst..dst + width].copy_from_slice(&source_pixels[src..src + width]);
            }
            x += width as u32;
        }
    }

    Ok(masked)
}

/// Mix of two random active colors, or the void color when none is active.
fn blend_color(settings: &TextureSettings, rng: &mut SinRandom) -> Rgb {
    if settings.colors.is_empty() {
        return settings.background;
    }
    let a = settings.colors[rng.index(settings.colors.len())];
    let b = settings.colors[rng.index(settings.colors.len())];
    a.mix(b, rng.next_f32() * settings.color_blending)
}

fn opaque(color: Rgb) -> Color {
    with_alpha(color, 1.0)
}

fn with_alpha(color: Rgb, alpha: f32) -> Color {
    let [r, g, b] = color.to_bytes();
    Color::from_rgba8(r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
}

pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

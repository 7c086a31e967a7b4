//! Mouse trail simulation.
//!
//! Pointer moves land in a [`PointerInbox`] that keeps only the latest
//! position. Once per frame the controller drains it into [`MouseTrail`],
//! which stamps the next brush of a fixed ring and decays every visible one.
//! The renderers draw visible brushes into a half-resolution mask that the
//! gradient shader samples as a UV offset.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::rng::XorShift64;

pub const BRUSH_POOL_SIZE: usize = 50;
/// Radians added to every visible brush per frame.
pub const ROTATION_STEP: f32 = 0.02;
/// Brushes below this opacity are hidden.
pub const HIDE_THRESHOLD: f32 = 0.002;

const ROTATION_SEED: u64 = 0x6E65_6174;

/// At most one pending pointer position, consumed once per frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerInbox {
    pending: Option<Vec2>,
}

impl PointerInbox {
    /// Replaces any position not yet consumed.
    pub fn push(&mut self, position: Vec2) {
        self.pending = Some(position);
    }

    pub fn take(&mut self) -> Option<Vec2> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

/// Canvas pixel coordinates (origin top-left) to trail space (origin at the
/// canvas center, y up).
pub fn centered_position(x: f32, y: f32, width: u32, height: u32) -> Vec2 {
    Vec2::new(x - width as f32 / 2.0, height as f32 / 2.0 - y)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub position: Vec2,
    /// Diameter in trail-space units.
    pub scale: f32,
    pub rotation: f32,
    pub opacity: f32,
    pub visible: bool,
}

impl Brush {
    const HIDDEN: Self = Self {
        position: Vec2::ZERO,
        scale: 0.0,
        rotation: 0.0,
        opacity: 0.0,
        visible: false,
    };
}

/// What the off-screen mask needs this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailPass {
    /// Redraw visible brushes.
    Draw,
    /// Nothing visible any more, but the mask still holds the last stamps.
    Clear,
    Skip,
}

/// Per-instance data for the GPU brush pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BrushInstance {
    pub position: [f32; 2],
    pub scale: f32,
    pub rotation: f32,
    pub opacity: f32,
    pub _pad: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct MouseTrail {
    brushes: [Brush; BRUSH_POOL_SIZE],
    next: usize,
    rng: XorShift64,
    mask_dirty: bool,
}

impl Default for MouseTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl MouseTrail {
    pub fn new() -> Self {
        Self {
            brushes: [Brush::HIDDEN; BRUSH_POOL_SIZE],
            next: 0,
            rng: XorShift64::from_seed(ROTATION_SEED),
            mask_dirty: false,
        }
    }

    /// Claim the oldest slot for a fresh stamp at full opacity.
    pub fn stamp(&mut self, position: Vec2, diameter: f32) {
        let rotation = self.rng.next_unit() * std::f32::consts::TAU;
        self.brushes[self.next] = Brush {
            position,
            scale: diameter,
            rotation,
            opacity: 1.0,
            visible: true,
        };
        self.next = (self.next + 1) % BRUSH_POOL_SIZE;
    }

    /// Rotate and fade every visible brush by one frame.
    pub fn advance(&mut self, decay_rate: f32) {
        for brush in self.brushes.iter_mut().filter(|brush| brush.visible) {
            brush.rotation += ROTATION_STEP;
            brush.opacity *= decay_rate;
            if brush.opacity < HIDE_THRESHOLD {
                brush.visible = false;
            }
        }
    }

    /// Decide the off-screen work for this frame and record that the mask
    /// will hold stamps after a draw.
    pub fn plan_pass(&mut self, strength: f32) -> TrailPass {
        if strength > 0.0 && self.visible_count() > 0 {
            self.mask_dirty = true;
            TrailPass::Draw
        } else if self.mask_dirty {
            self.mask_dirty = false;
            TrailPass::Clear
        } else {
            TrailPass::Skip
        }
    }

    pub fn visible_count(&self) -> usize {
        self.brushes.iter().filter(|brush| brush.visible).count()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Brush> {
        self.brushes.iter().filter(|brush| brush.visible)
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }

    pub fn instances(&self) -> Vec<BrushInstance> {
        self.visible()
            .map(|brush| BrushInstance {
                position: brush.position.to_array(),
                scale: brush.scale,
                rotation: brush.rotation,
                opacity: brush.opacity,
                _pad: [0.0; 3],
            })
            .collect()
    }

    /// Hide every brush; the next pass clears the mask if it holds anything.
    pub fn reset(&mut self) {
        for brush in &mut self.brushes {
            brush.visible = false;
        }
        self.next = 0;
    }
}

/// Premultiplied brush color at `local`, where the brush spans `[-1, 1]²`.
///
/// Alpha is the distortion amount; green/blue carry the push direction as
/// `gb * 2 - a`. Mirrors the brush fragment shader.
pub fn brush_texel(local: Vec2, rotation: f32, opacity: f32) -> [f32; 4] {
    let distance = local.length();
    if distance >= 1.0 {
        return [0.0; 4];
    }
    let falloff = 1.0 - distance;
    let amount = falloff * falloff * (3.0 - 2.0 * falloff) * opacity;
    let direction = Vec2::from_angle(rotation).rotate(local.normalize_or_zero());
    [
        amount,
        (direction.x * 0.5 + 0.5) * amount,
        (direction.y * 0.5 + 0.5) * amount,
        amount,
    ]
}

/// Premultiplied "over" of `src` onto `dst`.
pub fn composite_over(dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let keep = 1.0 - src[3];
    [
        src[0] + dst[0] * keep,
        src[1] + dst[1] * keep,
        src[2] + dst[2] * keep,
        src[3] + dst[3] * keep,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_keeps_only_latest_position() {
        let mut inbox = PointerInbox::default();
        inbox.push(Vec2::new(1.0, 1.0));
        inbox.push(Vec2::new(2.0, 2.0));
        inbox.push(Vec2::new(3.0, 4.0));
        assert_eq!(inbox.take(), Some(Vec2::new(3.0, 4.0)));
        assert_eq!(inbox.take(), None);
    }

    #[test]
    fn centering_inverts_y() {
        let p = centered_position(0.0, 0.0, 200, 100);
        assert_eq!(p, Vec2::new(-100.0, 50.0));
        let p = centered_position(200.0, 100.0, 200, 100);
        assert_eq!(p, Vec2::new(100.0, -50.0));
    }

    #[test]
    fn pool_is_round_robin() {
        let mut trail = MouseTrail::new();
        for i in 0..BRUSH_POOL_SIZE + 3 {
            trail.stamp(Vec2::new(i as f32, 0.0), 10.0);
        }
        assert_eq!(trail.visible_count(), BRUSH_POOL_SIZE);
        // The three oldest slots were reused.
        assert_eq!(trail.brushes()[0].position.x, BRUSH_POOL_SIZE as f32);
        assert_eq!(trail.brushes()[2].position.x, (BRUSH_POOL_SIZE + 2) as f32);
        assert_eq!(trail.brushes()[3].position.x, 3.0);
    }

    #[test]
    fn brushes_fade_rotate_and_hide() {
        let mut trail = MouseTrail::new();
        trail.stamp(Vec2::ZERO, 10.0);
        let start = trail.brushes()[0].rotation;

        trail.advance(0.9);
        let brush = trail.brushes()[0];
        assert!((brush.opacity - 0.9).abs() < 1e-6);
        assert!((brush.rotation - start - ROTATION_STEP).abs() < 1e-6);

        // 0.9^59 < 0.002
        for _ in 0..60 {
            trail.advance(0.9);
        }
        assert_eq!(trail.visible_count(), 0);
    }

    #[test]
    fn mask_gets_one_clearing_pass_after_fade() {
        let mut trail = MouseTrail::new();
        assert_eq!(trail.plan_pass(1.0), TrailPass::Skip);

        trail.stamp(Vec2::ZERO, 10.0);
        assert_eq!(trail.plan_pass(1.0), TrailPass::Draw);

        trail.reset();
        assert_eq!(trail.plan_pass(1.0), TrailPass::Clear);
        assert_eq!(trail.plan_pass(1.0), TrailPass::Skip);
    }

    #[test]
    fn zero_strength_skips_drawing() {
        let mut trail = MouseTrail::new();
        trail.stamp(Vec2::ZERO, 10.0);
        assert_eq!(trail.plan_pass(0.0), TrailPass::Skip);
    }

    #[test]
    fn brush_texel_encodes_direction_premultiplied() {
        let texel = brush_texel(Vec2::new(0.5, 0.0), 0.0, 1.0);
        let amount = texel[3];
        assert!(amount > 0.0);
        let dx = texel[1] * 2.0 - amount;
        let dy = texel[2] * 2.0 - amount;
        assert!((dx - amount).abs() < 1e-5, "push points outward along +x");
        assert!(dy.abs() < 1e-5);
        assert_eq!(brush_texel(Vec2::new(1.0, 0.0), 0.0, 1.0), [0.0; 4]);
    }
}

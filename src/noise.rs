//! Classic Perlin and simplex 3D noise, in WGSL for the gradient program and
//! mirrored on the CPU for the software backend.
//!
//! Both sides use the `mod289` permutation polynomial, so a given coordinate
//! yields the same value (up to float rounding) on either backend.

use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

/// `cnoise`, `snoise` and `fbm` for the gradient program.
pub const NOISE_WGSL: &str = r#"
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
  return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
  return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
  return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
  return 1.79284291400159 - 0.85373472095314 * r;
}

fn fade3(t: vec3<f32>) -> vec3<f32> {
  return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

fn cnoise(p: vec3<f32>) -> f32 {
  var pi0 = floor(p);
  var pi1 = pi0 + vec3<f32>(1.0);
  pi0 = mod289_3(pi0);
  pi1 = mod289_3(pi1);
  let pf0 = fract(p);
  let pf1 = pf0 - vec3<f32>(1.0);
  let ix = vec4<f32>(pi0.x, pi1.x, pi0.x, pi1.x);
  let iy = vec4<f32>(pi0.y, pi0.y, pi1.y, pi1.y);
  let iz0 = vec4<f32>(pi0.z);
  let iz1 = vec4<f32>(pi1.z);

  let ixy = permute4(permute4(ix) + iy);
  let ixy0 = permute4(ixy + iz0);
  let ixy1 = permute4(ixy + iz1);

  var gx0 = ixy0 * (1.0 / 7.0);
  var gy0 = fract(floor(gx0) * (1.0 / 7.0)) - 0.5;
  gx0 = fract(gx0);
  let gz0 = vec4<f32>(0.5) - abs(gx0) - abs(gy0);
  let sz0 = step(gz0, vec4<f32>(0.0));
  gx0 = gx0 - sz0 * (step(vec4<f32>(0.0), gx0) - 0.5);
  gy0 = gy0 - sz0 * (step(vec4<f32>(0.0), gy0) - 0.5);

  var gx1 = ixy1 * (1.0 / 7.0);
  var gy1 = fract(floor(gx1) * (1.0 / 7.0)) - 0.5;
  gx1 = fract(gx1);
  let gz1 = vec4<f32>(0.5) - abs(gx1) - abs(gy1);
  let sz1 = step(gz1, vec4<f32>(0.0));
  gx1 = gx1 - sz1 * (step(vec4<f32>(0.0), gx1) - 0.5);
  gy1 = gy1 - sz1 * (step(vec4<f32>(0.0), gy1) - 0.5);

  var g000 = vec3<f32>(gx0.x, gy0.x, gz0.x);
  var g100 = vec3<f32>(gx0.y, gy0.y, gz0.y);
  var g010 = vec3<f32>(gx0.z, gy0.z, gz0.z);
  var g110 = vec3<f32>(gx0.w, gy0.w, gz0.w);
  var g001 = vec3<f32>(gx1.x, gy1.x, gz1.x);
  var g101 = vec3<f32>(gx1.y, gy1.y, gz1.y);
  var g011 = vec3<f32>(gx1.z, gy1.z, gz1.z);
  var g111 = vec3<f32>(gx1.w, gy1.w, gz1.w);

  let norm0 = taylor_inv_sqrt4(vec4<f32>(dot(g000, g000), dot(g010, g010), dot(g100, g100), dot(g110, g110)));
  g000 = g000 * norm0.x;
  g010 = g010 * norm0.y;
  g100 = g100 * norm0.z;
  g110 = g110 * norm0.w;
  let norm1 = taylor_inv_sqrt4(vec4<f32>(dot(g001, g001), dot(g011, g011), dot(g101, g101), dot(g111, g111)));
  g001 = g001 * norm1.x;
  g011 = g011 * norm1.y;
  g101 = g101 * norm1.z;
  g111 = g111 * norm1.w;

  let n000 = dot(g000, pf0);
  let n100 = dot(g100, vec3<f32>(pf1.x, pf0.y, pf0.z));
  let n010 = dot(g010, vec3<f32>(pf0.x, pf1.y, pf0.z));
  let n110 = dot(g110, vec3<f32>(pf1.x, pf1.y, pf0.z));
  let n001 = dot(g001, vec3<f32>(pf0.x, pf0.y, pf1.z));
  let n101 = dot(g101, vec3<f32>(pf1.x, pf0.y, pf1.z));
  let n011 = dot(g011, vec3<f32>(pf0.x, pf1.y, pf1.z));
  let n111 = dot(g111, pf1);

  let fade_xyz = fade3(pf0);
  let n_z = mix(vec4<f32>(n000, n100, n010, n110), vec4<f32>(n001, n101, n011, n111), vec4<f32>(fade_xyz.z));
  let n_yz = mix(n_z.xy, n_z.zw, vec2<f32>(fade_xyz.y));
  let n_xyz = mix(n_yz.x, n_yz.y, fade_xyz.x);
  return 2.2 * n_xyz;
}

fn snoise(v: vec3<f32>) -> f32 {
  let c = vec2<f32>(1.0 / 6.0, 1.0 / 3.0);
  let d = vec4<f32>(0.0, 0.5, 1.0, 2.0);

  var i = floor(v + dot(v, c.yyy));
  let x0 = v - i + dot(i, c.xxx);

  let g = step(x0.yzx, x0.xyz);
  let l = 1.0 - g;
  let i1 = min(g.xyz, l.zxy);
  let i2 = max(g.xyz, l.zxy);

  let x1 = x0 - i1 + c.xxx;
  let x2 = x0 - i2 + c.yyy;
  let x3 = x0 - d.yyy;

  i = mod289_3(i);
  let p = permute4(permute4(permute4(
      i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
    + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
    + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

  let n_ = 0.142857142857;
  let ns = n_ * d.wyz - d.xzx;

  let j = p - 49.0 * floor(p * ns.z * ns.z);
  let x_ = floor(j * ns.z);
  let y_ = floor(j - 7.0 * x_);

  let x = x_ * ns.x + ns.yyyy;
  let y = y_ * ns.x + ns.yyyy;
  let h = 1.0 - abs(x) - abs(y);

  let b0 = vec4<f32>(x.xy, y.xy);
  let b1 = vec4<f32>(x.zw, y.zw);
  let s0 = floor(b0) * 2.0 + 1.0;
  let s1 = floor(b1) * 2.0 + 1.0;
  let sh = -step(h, vec4<f32>(0.0));

  let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
  let a1 = b1.xzyw + s1.xzyw * sh.zzww;

  var p0 = vec3<f32>(a0.xy, h.x);
  var p1 = vec3<f32>(a0.zw, h.y);
  var p2 = vec3<f32>(a1.xy, h.z);
  var p3 = vec3<f32>(a1.zw, h.w);

  let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0, p0), dot(p1, p1), dot(p2, p2), dot(p3, p3)));
  p0 = p0 * norm.x;
  p1 = p1 * norm.y;
  p2 = p2 * norm.z;
  p3 = p3 * norm.w;

  var m = max(vec4<f32>(0.6) - vec4<f32>(dot(x0, x0), dot(x1, x1), dot(x2, x2), dot(x3, x3)), vec4<f32>(0.0));
  m = m * m;
  return 42.0 * dot(m * m, vec4<f32>(dot(p0, x0), dot(p1, x1), dot(p2, x2), dot(p3, x3)));
}

fn fbm(p: vec3<f32>) -> f32 {
  var value = 0.0;
  var amplitude = 0.5;
  var q = p;
  for (var octave = 0; octave < 4; octave = octave + 1) {
    value = value + amplitude * snoise(q);
    q = q * 2.0;
    amplitude = amplitude * 0.5;
  }
  return value;
}
"#;

/// Classic Perlin noise, roughly in `[-1, 1]`.
pub fn perlin3(p: Vec3) -> f32 {
    let pi0 = mod289_3(p.floor());
    let pi1 = mod289_3(p.floor() + Vec3::ONE);
    let pf0 = fract3(p);
    let pf1 = pf0 - Vec3::ONE;
    let ix = Vec4::new(pi0.x, pi1.x, pi0.x, pi1.x);
    let iy = Vec4::new(pi0.y, pi0.y, pi1.y, pi1.y);

    let ixy = permute(permute(ix) + iy);
    let ixy0 = permute(ixy + Vec4::splat(pi0.z));
    let ixy1 = permute(ixy + Vec4::splat(pi1.z));

    let (gx0, gy0, gz0) = lattice_gradients(ixy0);
    let (gx1, gy1, gz1) = lattice_gradients(ixy1);

    let mut g000 = Vec3::new(gx0.x, gy0.x, gz0.x);
    let mut g100 = Vec3::new(gx0.y, gy0.y, gz0.y);
    let mut g010 = Vec3::new(gx0.z, gy0.z, gz0.z);
    let mut g110 = Vec3::new(gx0.w, gy0.w, gz0.w);
    let mut g001 = Vec3::new(gx1.x, gy1.x, gz1.x);
    let mut g101 = Vec3::new(gx1.y, gy1.y, gz1.y);
    let mut g011 = Vec3::new(gx1.z, gy1.z, gz1.z);
    let mut g111 = Vec3::new(gx1.w, gy1.w, gz1.w);

    let norm0 = taylor_inv_sqrt(Vec4::new(
        g000.dot(g000),
        g010.dot(g010),
        g100.dot(g100),
        g110.dot(g110),
    ));
    g000 *= norm0.x;
    g010 *= norm0.y;
    g100 *= norm0.z;
    g110 *= norm0.w;
    let norm1 = taylor_inv_sqrt(Vec4::new(
        g001.dot(g001),
        g011.dot(g011),
        g101.dot(g101),
        g111.dot(g111),
    ));
    g001 *= norm1.x;
    g011 *= norm1.y;
    g101 *= norm1.z;
    g111 *= norm1.w;

    let n000 = g000.dot(pf0);
    let n100 = g100.dot(Vec3::new(pf1.x, pf0.y, pf0.z));
    let n010 = g010.dot(Vec3::new(pf0.x, pf1.y, pf0.z));
    let n110 = g110.dot(Vec3::new(pf1.x, pf1.y, pf0.z));
    let n001 = g001.dot(Vec3::new(pf0.x, pf0.y, pf1.z));
    let n101 = g101.dot(Vec3::new(pf1.x, pf0.y, pf1.z));
    let n011 = g011.dot(Vec3::new(pf0.x, pf1.y, pf1.z));
    let n111 = g111.dot(pf1);

    let fade_xyz = fade(pf0);
    let n_z = Vec4::new(n000, n100, n010, n110).lerp(Vec4::new(n001, n101, n011, n111), fade_xyz.z);
    let n_yz = Vec2::new(n_z.x, n_z.y).lerp(Vec2::new(n_z.z, n_z.w), fade_xyz.y);
    2.2 * (n_yz.x + (n_yz.y - n_yz.x) * fade_xyz.x)
}

/// Simplex noise, roughly in `[-1, 1]`.
pub fn simplex3(v: Vec3) -> f32 {
    const C: Vec2 = Vec2::new(1.0 / 6.0, 1.0 / 3.0);

    let i = (v + Vec3::splat(v.dot(Vec3::splat(C.y)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C.x)));

    let g = step3(x0.yzx(), x0);
    let l = Vec3::ONE - g;
    let i1 = g.min(l.zxy());
    let i2 = g.max(l.zxy());

    let x1 = x0 - i1 + Vec3::splat(C.x);
    let x2 = x0 - i2 + Vec3::splat(C.y);
    let x3 = x0 - Vec3::splat(0.5);

    let i = mod289_3(i);
    let p = permute(
        permute(
            permute(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    let n_ = 0.142_857_14_f32;
    let ns = Vec3::new(2.0, 0.5, 1.0) * n_ - Vec3::new(0.0, 1.0, 0.0);

    let j = p - (p * ns.z * ns.z).floor() * 49.0;
    let x_ = (j * ns.z).floor();
    let y_ = (j - x_ * 7.0).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);
    let s0 = b0.floor() * 2.0 + Vec4::ONE;
    let s1 = b1.floor() * 2.0 + Vec4::ONE;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = b0.xzyw() + s0.xzyw() * sh.xxyy();
    let a1 = b1.xzyw() + s1.xzyw() * sh.zzww();

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    let m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
        .max(Vec4::ZERO);
    let m = m * m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// Four octaves of simplex noise.
pub fn fbm3(p: Vec3) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut q = p;
    for _ in 0..4 {
        value += amplitude * simplex3(q);
        q *= 2.0;
        amplitude *= 0.5;
    }
    value
}

fn lattice_gradients(ixy: Vec4) -> (Vec4, Vec4, Vec4) {
    let gx = ixy * (1.0 / 7.0);
    let gy = fract4(gx.floor() * (1.0 / 7.0)) - Vec4::splat(0.5);
    let gx = fract4(gx);
    let gz = Vec4::splat(0.5) - gx.abs() - gy.abs();
    let sz = step4(gz, Vec4::ZERO);
    let gx = gx - sz * (step4(Vec4::ZERO, gx) - Vec4::splat(0.5));
    let gy = gy - sz * (step4(Vec4::ZERO, gy) - Vec4::splat(0.5));
    (gx, gy, gz)
}

fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: Vec4) -> Vec4 {
    mod289_4((x * 34.0 + Vec4::ONE) * x)
}

fn taylor_inv_sqrt(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - r * 0.853_734_7
}

fn fade(t: Vec3) -> Vec3 {
    t * t * t * (t * (t * 6.0 - Vec3::splat(15.0)) + Vec3::splat(10.0))
}

// GLSL-style fract (x - floor(x)), also correct for negatives.
fn fract3(v: Vec3) -> Vec3 {
    v - v.floor()
}

fn fract4(v: Vec4) -> Vec4 {
    v - v.floor()
}

fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::select(x.cmpge(edge), Vec3::ONE, Vec3::ZERO)
}

fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::select(x.cmpge(edge), Vec4::ONE, Vec4::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid(f: impl Fn(Vec3) -> f32) -> Vec<f32> {
        let mut out = Vec::new();
        for x in 0..12 {
            for y in 0..12 {
                for z in 0..4 {
                    out.push(f(Vec3::new(
                        x as f32 * 0.37 - 2.0,
                        y as f32 * 0.41 - 3.0,
                        z as f32 * 0.73,
                    )));
                }
            }
        }
        out
    }

    #[test]
    fn perlin_stays_in_expected_range_and_varies() {
        let values = sample_grid(perlin3);
        assert!(values.iter().all(|v| v.abs() <= 1.1), "perlin out of range");
        let spread = values.iter().cloned().fold(f32::MIN, f32::max)
            - values.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread > 0.3, "perlin looks flat: spread {spread}");
    }

    #[test]
    fn perlin_is_zero_on_integer_lattice() {
        assert!(perlin3(Vec3::new(3.0, -2.0, 5.0)).abs() < 1e-5);
    }

    #[test]
    fn simplex_stays_in_expected_range_and_varies() {
        let values = sample_grid(simplex3);
        assert!(values.iter().all(|v| v.abs() <= 1.1), "simplex out of range");
        assert!(values.iter().any(|v| *v > 0.1));
        assert!(values.iter().any(|v| *v < -0.1));
    }

    #[test]
    fn noise_is_continuous() {
        let p = Vec3::new(1.234, -0.77, 0.5);
        let step = Vec3::splat(1e-3);
        assert!((simplex3(p) - simplex3(p + step)).abs() < 0.05);
        assert!((perlin3(p) - perlin3(p + step)).abs() < 0.05);
    }

    #[test]
    fn fbm_is_deterministic() {
        let a = sample_grid(fbm3);
        let b = sample_grid(fbm3);
        assert_eq!(a, b);
    }

    #[test]
    fn wgsl_source_declares_noise_entry_points() {
        assert!(NOISE_WGSL.contains("fn cnoise(p: vec3<f32>) -> f32"));
        assert!(NOISE_WGSL.contains("fn snoise(v: vec3<f32>) -> f32"));
        assert!(NOISE_WGSL.contains("fn fbm(p: vec3<f32>) -> f32"));
    }
}

use neat_gradient::config::Rgb;
use neat_gradient::texture_gen::{generate, ShapeCounts, TextureSettings};

fn settings(seed: u32) -> TextureSettings {
    TextureSettings {
        void_likelihood: 0.45,
        void_width_min: 20.0,
        void_width_max: 48.0,
        band_density: 2.15,
        color_blending: 0.01,
        seed,
        background: Rgb::BLACK,
        shapes: ShapeCounts {
            triangles: 20,
            circles: 15,
            bars: 15,
            squiggles: 10,
        },
        colors: vec![
            Rgb::parse_or_black("#FF5373"),
            Rgb::parse_or_black("#FFC858"),
            Rgb::parse_or_black("#17E7FF"),
        ],
    }
}

#[test]
fn same_seed_and_settings_give_identical_bitmaps() {
    let first = generate(&settings(333), 128).expect("generate");
    let second = generate(&settings(333), 128).expect("generate");
    assert_eq!(first.rgba, second.rgba);
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn different_seeds_give_different_bitmaps() {
    let first = generate(&settings(333), 128).expect("generate");
    let second = generate(&settings(334), 128).expect("generate");
    assert_ne!(first.fingerprint(), second.fingerprint());
}

#[test]
fn bitmap_is_square_and_opaque() {
    let bitmap = generate(&settings(7), 64).expect("generate");
    assert_eq!((bitmap.width, bitmap.height), (64, 64));
    assert_eq!(bitmap.rgba.len(), 64 * 64 * 4);
    assert!(bitmap.rgba.chunks_exact(4).all(|pixel| pixel[3] == 255));
}

#[test]
fn no_active_colors_still_generates() {
    let mut settings = settings(11);
    settings.colors.clear();
    let bitmap = generate(&settings, 32).expect("generate without colors");
    assert_eq!(bitmap.rgba.len(), 32 * 32 * 4);
}

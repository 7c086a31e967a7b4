use neat_gradient::config::{default_colors, ColorSlot, COLOR_SLOTS};
use neat_gradient::{GradientConfig, GradientParams};

fn params() -> GradientParams {
    GradientParams::new(&GradientConfig::default())
}

#[test]
fn linear_setters_apply_documented_transforms() {
    let mut params = params();
    params.set_speed(20.0);
    params.set_wave_frequency_x(10.0);
    params.set_color_blending(10.0);
    params.set_horizontal_pressure(8.0);
    params.set_wave_amplitude(4.0);
    params.set_shadows(50.0);
    params.set_color_saturation(5.0);

    let normalized = params.normalized();
    assert_eq!(normalized.speed, 1.0);
    assert!((normalized.wave_frequency_x - 0.4).abs() < 1.0e-6);
    assert_eq!(normalized.color_blending, 1.0);
    assert_eq!(normalized.horizontal_pressure, 2.0);
    assert_eq!(normalized.wave_amplitude, 3.0);
    assert_eq!(normalized.shadows, 0.5);
    assert_eq!(normalized.color_saturation, 0.5);

    assert_eq!(params.speed(), 20.0);
    assert_eq!(params.wave_frequency_x(), 10.0);
}

#[test]
fn default_speed_normalizes_to_a_fifth() {
    assert!((params().normalized().speed - 0.2).abs() < 1.0e-6);
}

#[test]
fn mouse_decay_rate_is_clamped() {
    let mut params = params();
    params.set_mouse_decay_rate(0.5);
    assert_eq!(params.normalized().mouse_decay_rate, 0.90);
    params.set_mouse_decay_rate(1.5);
    assert_eq!(params.normalized().mouse_decay_rate, 0.99);
    params.set_mouse_decay_rate(0.95);
    assert_eq!(params.normalized().mouse_decay_rate, 0.95);
}

#[test]
fn mouse_radius_is_clamped() {
    let mut params = params();
    params.set_mouse_distortion_radius(0.0);
    assert_eq!(params.normalized().mouse_distortion_radius, 0.01);
    params.set_mouse_distortion_radius(4.0);
    assert_eq!(params.normalized().mouse_distortion_radius, 1.0);
}

#[test]
fn zero_grain_scale_means_one() {
    let mut params = params();
    params.set_grain_scale(0.0);
    assert_eq!(params.normalized().grain_scale, 1.0);
    params.set_grain_scale(3.5);
    assert_eq!(params.normalized().grain_scale, 3.5);
    params.set_grain_scale(-2.0);
    assert_eq!(params.normalized().grain_scale, -2.0);
}

#[test]
fn short_color_lists_leave_trailing_slots_inactive() {
    let mut config = GradientConfig::default();
    config.colors = vec![
        ColorSlot::new("#FF0000", true),
        ColorSlot::new("#00FF00", true),
    ];
    let params = GradientParams::new(&config);

    let slots = params.shader_colors();
    assert_eq!(slots.len(), COLOR_SLOTS);
    for slot in &slots[2..] {
        assert!(!slot.enabled);
        assert_eq!(slot.influence, 0.0);
    }
    assert!(slots[0].enabled && slots[1].enabled);
}

#[test]
fn toggling_a_slot_keeps_other_hex_values() {
    let mut params = params();
    let before: Vec<String> = params
        .colors()
        .iter()
        .map(|slot| slot.color_value.clone())
        .collect();

    assert!(params.set_color_enabled(2, false));
    assert!(params.set_color_enabled(4, true));

    let after: Vec<String> = params
        .colors()
        .iter()
        .map(|slot| slot.color_value.clone())
        .collect();
    assert_eq!(before, after);
    assert!(!params.colors()[2].enabled);
    assert!(params.colors()[4].enabled);
}

#[test]
fn color_pressure_is_unavailable_with_texture() {
    let mut params = params();
    assert!(params.color_pressure_available());
    params.set_enable_procedural_texture(true);
    assert!(!params.color_pressure_available());
}

#[test]
fn resolution_maps_to_clamped_subdivisions() {
    let mut params = params();
    assert_eq!(params.normalized().subdivisions, 240);
    params.set_resolution(0.0);
    assert_eq!(params.resolution(), 0.05);
    assert_eq!(params.normalized().subdivisions, 12);
    params.set_resolution(10.0);
    assert_eq!(params.resolution(), 2.0);
    assert_eq!(params.normalized().subdivisions, 480);
}

#[test]
fn apply_config_round_trips_raw_values() {
    let mut config = GradientConfig::default();
    config.speed = 7.0;
    config.mouse_darken = 0.3;
    config.texture_seed = 42;
    config.colors = default_colors().into_iter().take(3).collect();

    let mut params = GradientParams::new(&GradientConfig::default());
    params.apply_config(&config);
    assert_eq!(params.config(), &config);
}

//! Animated, parametric mesh gradients.
//!
//! A [`GradientController`] owns one canvas. It keeps the parameter state,
//! builds the tilted plane scene and drives a render backend (wgpu, or the
//! CPU mirror in [`software`]) once per display frame.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod mouse_trail;
pub mod noise;
pub mod params;
#[cfg(feature = "play")]
pub mod play;
pub mod renderer;
pub mod rng;
pub mod scene;
pub mod shaders;
pub mod software;
pub mod texture_gen;

pub use config::{ColorSlot, GradientConfig, Rgb};
pub use controller::{
    BackendPreference, Canvas, ControllerOptions, ControllerStats, GradientController,
};
pub use error::{ConfigError, GradientError};
pub use params::GradientParams;

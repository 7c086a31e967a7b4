use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neat_gradient::config::load_config;
use neat_gradient::{BackendPreference, Canvas, ControllerOptions, GradientController};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("NEAT_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "neat")]
#[command(about = "Animated mesh gradient renderer")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import a configuration and summarize it.
    Check { config: PathBuf },
    /// Write the normalized export text.
    Export {
        config: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Render one frame to PNG.
    Render {
        config: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        /// Animation clock in seconds.
        #[arg(long, default_value_t = 0.0)]
        time: f32,
        /// Use the CPU renderer even when a GPU is available.
        #[arg(long)]
        software: bool,
    },
    /// Open a live window with hot reload.
    #[cfg(feature = "play")]
    Play {
        config: PathBuf,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Export { config, output } => run_export(&config, output.as_deref()),
        Commands::Render {
            config,
            output,
            width,
            height,
            time,
            software,
        } => run_render(&config, &output, width, height, time, software),
        #[cfg(feature = "play")]
        Commands::Play {
            config,
            width,
            height,
        } => neat_gradient::play::run_play(&config, neat_gradient::play::PlayArgs { width, height }),
    }
}

fn init_tracing() {
    let filter = std::env::var("NEAT_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let active = config.active_colors().count();

    println!(
        "OK: {} (speed {}, {} color(s), {} active)",
        config_path.display(),
        config.speed,
        config.colors.len(),
        active
    );
    println!(
        "Procedural texture: {}",
        if config.enable_procedural_texture {
            "on"
        } else {
            "off"
        }
    );
    Ok(())
}

fn run_export(config_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let text = config.export_string();
    match output_path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_render(
    config_path: &Path,
    output_path: &Path,
    width: u32,
    height: u32,
    time: f32,
    software: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let options = ControllerOptions {
        backend: if software {
            BackendPreference::Software
        } else {
            BackendPreference::Auto
        },
        preserve_drawing_buffer: true,
        ..ControllerOptions::default()
    };
    let mut controller =
        GradientController::with_options(&config, Canvas::Headless { width, height }, options)?;
    controller.seek(time);
    controller.frame()?;
    let written = controller.download_as_png(output_path)?;
    controller.destroy();

    println!("Wrote {} ({})", written.display(), controller.backend_name());
    Ok(())
}

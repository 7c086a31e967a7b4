#![cfg(feature = "play")]
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event as WinitEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::config::load_config;
use crate::controller::{Canvas, ControllerOptions, GradientController};

#[derive(Debug, Clone, Copy)]
pub struct PlayArgs {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Snapshot,
    ToggleWireframe,
    ToggleTexture,
    Quit,
}

pub fn run_play(config_path: &Path, args: PlayArgs) -> Result<()> {
    let config_path = canonical_config_path(config_path);
    let config = load_config(&config_path)?;

    let event_loop = EventLoop::new().context("failed to create play event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("neat - {}", config_path.display()))
            .with_inner_size(PhysicalSize::new(args.width.max(1), args.height.max(1)))
            .build(&event_loop)
            .context("failed to create preview window")?,
    );

    let mut controller = GradientController::with_options(
        &config,
        Canvas::Window(window.clone()),
        ControllerOptions::default(),
    )
    .with_context(|| format!("failed to start gradient for {}", config_path.display()))?;

    let (watch_tx, watch_rx) = mpsc::channel::<()>();
    let watcher_config = config_path.clone();
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if should_reload(&event) && event_targets_config(&event, &watcher_config) {
                    let _ = watch_tx.send(());
                }
            }
            Err(error) => {
                warn!(%error, "config watcher error");
            }
        })
        .context("failed to create file watcher")?;
    let watch_root = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    watcher
        .watch(&watch_root, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_root.display()))?;

    info!(
        width = args.width,
        height = args.height,
        backend = controller.backend_name(),
        "play started; S snapshot, W wireframe, T texture, Esc quit"
    );

    event_loop
        .run(move |event, target| {
            // Keep the watcher alive for the life of the loop.
            let _ = &watcher;
            target.set_control_flow(ControlFlow::Poll);

            match event {
                WinitEvent::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested => {
                            controller.destroy();
                            target.exit();
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            controller.pointer_moved(position.x as f32, position.y as f32);
                        }
                        WindowEvent::Resized(size) => {
                            controller.observe_resize(size.width, size.height);
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state != ElementState::Pressed || event.repeat {
                                return;
                            }
                            match key_action(event.physical_key) {
                                Some(KeyAction::Quit) => {
                                    controller.destroy();
                                    target.exit();
                                }
                                Some(action) => apply_key_action(&mut controller, action),
                                None => {}
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(error) = controller.frame() {
                                error!("render error: {error:#}");
                            }
                        }
                        _ => {}
                    }
                }
                WinitEvent::AboutToWait => {
                    let mut config_dirty = false;
                    while watch_rx.try_recv().is_ok() {
                        config_dirty = true;
                    }
                    if config_dirty {
                        try_hot_reload(&config_path, &mut controller);
                    }
                    if controller.is_alive() {
                        window.request_redraw();
                    }
                }
                _ => {}
            }
        })
        .map_err(|error| anyhow!("play event loop terminated: {error}"))
}

fn apply_key_action(controller: &mut GradientController, action: KeyAction) {
    match action {
        KeyAction::Snapshot => {
            let name = snapshot_name(Local::now());
            match controller.download_as_png(&name) {
                Ok(path) => info!(path = %path.display(), "snapshot written"),
                Err(error) => warn!("snapshot failed: {error:#}"),
            }
        }
        KeyAction::ToggleWireframe => {
            let params = controller.params_mut();
            let next = !params.wireframe();
            params.set_wireframe(next);
            info!(wireframe = next, "wireframe toggled");
        }
        KeyAction::ToggleTexture => {
            let params = controller.params_mut();
            let next = !params.enable_procedural_texture();
            params.set_enable_procedural_texture(next);
            info!(enabled = next, "procedural texture toggled");
        }
        KeyAction::Quit => {}
    }
}

fn key_action(key: PhysicalKey) -> Option<KeyAction> {
    match key {
        PhysicalKey::Code(KeyCode::KeyS) => Some(KeyAction::Snapshot),
        PhysicalKey::Code(KeyCode::KeyW) => Some(KeyAction::ToggleWireframe),
        PhysicalKey::Code(KeyCode::KeyT) => Some(KeyAction::ToggleTexture),
        PhysicalKey::Code(KeyCode::Escape) => Some(KeyAction::Quit),
        _ => None,
    }
}

fn snapshot_name(now: DateTime<Local>) -> String {
    format!("neat-{}.png", now.format("%Y%m%d-%H%M%S"))
}

/// Parse errors keep the running configuration.
fn try_hot_reload(config_path: &Path, controller: &mut GradientController) {
    match load_config(config_path) {
        Ok(config) => {
            controller.apply_config(&config);
            info!(path = %config_path.display(), "config reloaded");
        }
        Err(error) => {
            warn!("reload failed, keeping previous config: {error:#}");
        }
    }
}

fn should_reload(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any
    )
}

fn event_targets_config(event: &Event, config_path: &Path) -> bool {
    if event.paths.is_empty() {
        return true;
    }

    event.paths.iter().any(|path| {
        path == config_path
            || std::fs::canonicalize(path)
                .map(|resolved| resolved == config_path)
                .unwrap_or(false)
    })
}

fn canonical_config_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(
            key_action(PhysicalKey::Code(KeyCode::KeyS)),
            Some(KeyAction::Snapshot)
        );
        assert_eq!(
            key_action(PhysicalKey::Code(KeyCode::Escape)),
            Some(KeyAction::Quit)
        );
        assert_eq!(key_action(PhysicalKey::Code(KeyCode::KeyQ)), None);
    }

    #[test]
    fn snapshot_names_are_timestamped() {
        let at = Local
            .with_ymd_and_hms(2026, 3, 4, 5, 6, 7)
            .single()
            .expect("unambiguous local time");
        assert_eq!(snapshot_name(at), "neat-20260304-050607.png");
    }

    #[test]
    fn removals_do_not_trigger_reload() {
        let path = PathBuf::from("/tmp/gradient.yaml");
        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone());
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone());
        assert!(should_reload(&modify) && event_targets_config(&modify, &path));
        assert!(should_reload(&create));
        assert!(!should_reload(&remove));
    }

    #[test]
    fn unrelated_paths_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/other.yaml"));
        assert!(!event_targets_config(&event, Path::new("/tmp/gradient.yaml")));
    }
}

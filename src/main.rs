use std::{cell::RefCell, path::PathBuf, rc::Rc};

use anyhow::Context;
use vulkan_bootstrap::{config::RendererConfig, renderer::Renderer};
use winit::{
    event::{Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
};

const DEFAULT_CONFIG: &str = "renderer.toml";

fn load_config() -> anyhow::Result<RendererConfig> {
    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None if PathBuf::from(DEFAULT_CONFIG).is_file() => PathBuf::from(DEFAULT_CONFIG),
        None => return Ok(RendererConfig::default()),
    };
    RendererConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn run() -> anyhow::Result<()> {
    let config = load_config()?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut renderer = Some(Renderer::start(&event_loop, &config).context("renderer startup")?);
    let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::default();
    let loop_failure = failure.clone();

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        }
        | Event::WindowEvent {
            event:
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(KeyCode::Escape),
                            ..
                        },
                    ..
                },
            ..
        } => {
            elwt.exit();
        }
        Event::WindowEvent {
            event: WindowEvent::Resized(size),
            ..
        } if size.width > 0 && size.height > 0 => {
            if let Some(renderer) = renderer.as_mut() {
                if let Err(e) = renderer.resize() {
                    record_failure(
                        &mut loop_failure.borrow_mut(),
                        anyhow::Error::new(e).context("recreating swapchain"),
                    );
                    elwt.exit();
                }
            }
        }
        Event::LoopExiting => {
            if let Some(renderer) = renderer.take() {
                renderer.stop();
            }
        }
        _ => (),
    })?;

    finish(failure.take())
}

/// Keeps the first fatal error raised inside the event loop.
fn record_failure(slot: &mut Option<anyhow::Error>, error: anyhow::Error) {
    if slot.is_none() {
        *slot = Some(error);
    }
}

fn finish(failure: Option<anyhow::Error>) -> anyhow::Result<()> {
    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

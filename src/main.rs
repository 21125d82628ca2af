//! Particle Sea - procedural particle animation in a window
//!
//! The window is the host: it owns the frame loop, mounts the engine once
//! the surface exists, forwards resizes and disposes on exit.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use cli::Args;
use particle_sea::camera::Viewport;
use particle_sea::engine::{EngineConfig, EngineHandle, FrameLoop};
use particle_sea::rendering::RenderSystem;
use particle_sea::theme::ThemeDescriptor;

/// Main application state
struct App {
    theme: ThemeDescriptor,
    config: EngineConfig,

    window: Option<Arc<Window>>,
    engine: Option<EngineHandle<RenderSystem>>,
    frames: FrameLoop,
}

impl App {
    fn new(theme: ThemeDescriptor, config: EngineConfig) -> Self {
        Self {
            theme,
            config,
            window: None,
            engine: None,
            frames: FrameLoop::new(),
        }
    }

    fn viewport(window: &Window) -> Viewport {
        let size = window.inner_size();
        Viewport::new(size.width, size.height).with_pixel_ratio(window.scale_factor() as f32)
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if !self.frames.wants_frame() {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Particle Sea")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.render.window_width,
                self.config.render.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let mounted = pollster::block_on(RenderSystem::new(Arc::clone(&window), &self.theme))
            .and_then(|backend| {
                EngineHandle::mount(
                    &self.theme,
                    Self::viewport(&window),
                    self.config.clone(),
                    backend,
                    &mut self.frames,
                )
            });

        match mounted {
            Ok(engine) => {
                tracing::info!("Press ESC to quit");
                self.engine = Some(engine);
                self.window = Some(window);
            }
            Err(e) => {
                tracing::error!("Failed to mount particle engine: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => self.shutdown(event_loop),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let (Some(window), Some(engine)) = (&self.window, &mut self.engine) {
                    engine.on_resize(Self::viewport(window));
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(engine) = self.engine.as_mut() else {
                    return;
                };
                match engine.frame() {
                    Ok(report) => {
                        tracing::trace!(spawned = report.spawned(), "Frame rendered");
                    }
                    Err(e) => {
                        tracing::error!("Render loop stopped: {}", e);
                        self.shutdown(event_loop);
                    }
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("particle_sea=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let theme = args.theme();
    if !theme.enabled {
        tracing::info!("Theme '{}' has effects disabled, nothing to render", theme.id);
        return;
    }

    let config = args.engine_config();
    tracing::info!(theme = %theme.id, seed = config.seed, "Starting particle sea");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!("Failed to create event loop: {}", e);
            return;
        }
    };

    let mut app = App::new(theme, config);
    if let Err(e) = event_loop.run_app(&mut app) {
        tracing::error!("Event loop error: {}", e);
    }
}

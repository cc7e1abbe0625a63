use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use viewport_presenter::cli::Cli;
use viewport_presenter::core::{SurfaceErrorAction, WgpuBackend, WindowSurface};
use viewport_presenter::logging::init_logging;
use viewport_presenter::{GfxError, ViewportPresenter};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Everything that lives as long as the window.
struct Presentation {
    surface: WindowSurface,
    backend: WgpuBackend,
    presenter: ViewportPresenter<WgpuBackend>,
    offscreen: wgpu::TextureView,
}

impl Presentation {
    fn new(window: Arc<Window>, cli: &Cli) -> anyhow::Result<Self> {
        let config = cli.backend_config();
        let surface =
            WindowSurface::new(window, &config).context("failed to configure window surface")?;
        let backend = WgpuBackend::new(surface.gpu().clone(), config);
        let presenter =
            ViewportPresenter::try_new(&backend).context("failed to build viewport presenter")?;

        let size = cli.texture_size.max(1);
        let offscreen = surface
            .gpu()
            .device()
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Offscreen Color Attachment"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OFFSCREEN_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "presenting a {size}x{size} attachment, surface format {:?}",
            surface.format()
        );

        Ok(Self {
            surface,
            backend,
            presenter,
            offscreen,
        })
    }

    /// Render-to-texture pass: clear the attachment to a color cycling with time.
    fn draw_offscreen(&self, seconds: f64) {
        let gpu = self.surface.gpu();
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Encoder"),
            });

        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Offscreen Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(cycle_color(seconds)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        gpu.queue().submit(Some(encoder.finish()));
    }

    fn render(&mut self, seconds: f64) -> anyhow::Result<()> {
        self.draw_offscreen(seconds);

        let frame = match self.surface.acquire() {
            Ok(frame) => frame,
            Err(GfxError::Surface(err)) => match self.surface.handle_error(&err) {
                SurfaceErrorAction::Fatal => return Err(err).context("surface lost for good"),
                action => {
                    log::debug!("frame skipped ({action:?}): {err}");
                    return Ok(());
                }
            },
            Err(err) => return Err(err.into()),
        };

        self.backend.bind_framebuffer(Some(frame.target().clone()));
        self.presenter.render(&self.offscreen);
        self.backend.bind_framebuffer(None);

        frame.present();
        Ok(())
    }
}

fn cycle_color(seconds: f64) -> wgpu::Color {
    let phase = |offset: f64| 0.5 + 0.5 * (seconds + offset).sin();
    wgpu::Color {
        r: phase(0.0),
        g: phase(2.1),
        b: phase(4.2),
        a: 1.0,
    }
}

struct App {
    cli: Cli,
    window: Option<Arc<Window>>,
    presentation: Option<Presentation>,
    start: Instant,
}

impl App {
    fn new(cli: Cli) -> Self {
        Self {
            cli,
            window: None,
            presentation: None,
            start: Instant::now(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Viewport Presenter")
                .with_inner_size(winit::dpi::LogicalSize::new(self.cli.width, self.cli.height)),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Presentation::new(window.clone(), &self.cli) {
            Ok(presentation) => {
                self.window = Some(window);
                self.presentation = Some(presentation);
            }
            Err(e) => {
                log::error!("{e:#}");
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
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(presentation) = &mut self.presentation {
                    presentation.surface.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let seconds = self.start.elapsed().as_secs_f64();
                if let Some(presentation) = &mut self.presentation {
                    if let Err(e) = presentation.render(seconds) {
                        log::error!("render error: {e:#}");
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logging_config());

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = App::new(cli);

    log::info!("Viewport Presenter - Escape to quit");
    event_loop.run_app(&mut app)?;

    Ok(())
}

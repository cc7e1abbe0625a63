use std::sync::Arc;

use wgpu::{Surface, SurfaceConfiguration};
use winit::window::Window;

use super::backend::RenderTarget;
use super::gpu_context::GpuContext;
use crate::config::BackendConfig;
use crate::error::{GfxError, GfxResult};

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// One acquired swapchain image.
///
/// Bind [`SurfaceFrame::target`] as the framebuffer, draw, then [`present`](Self::present).
pub struct SurfaceFrame {
    surface_texture: wgpu::SurfaceTexture,
    target: RenderTarget,
}

impl SurfaceFrame {
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn present(self) {
        drop(self.target);
        self.surface_texture.present();
    }
}

/// Window surface (swapchain) configured for a [`GpuContext`].
pub struct WindowSurface {
    gpu: GpuContext,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
}

impl WindowSurface {
    /// Create the surface, pick an adapter able to present to it, and configure it
    pub fn new(window: Arc<Window>, config: &BackendConfig) -> GfxResult<Self> {
        let size = window.inner_size();

        let instance = GpuContext::create_instance(config);
        let surface = instance.create_surface(window)?;
        let gpu = pollster::block_on(GpuContext::for_surface(&instance, &surface, config))?;

        let surface_caps = surface.get_capabilities(gpu.adapter());
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GfxError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &surface_config);

        log::debug!(
            "surface configured: {}x{} {:?}",
            surface_config.width,
            surface_config.height,
            surface_format
        );

        Ok(Self {
            gpu,
            surface,
            surface_config,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    /// Get current surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Resize the surface; zero sizes (minimized windows) are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface
            .configure(self.gpu.device(), &self.surface_config);
    }

    /// Acquire the next swapchain image
    pub fn acquire(&self) -> GfxResult<SurfaceFrame> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Ok(SurfaceFrame {
            target: RenderTarget::new(view, self.surface_config.format),
            surface_texture,
        })
    }

    /// Converts a `SurfaceError` into a higher-level action, reconfiguring when needed.
    pub fn handle_error(&self, err: &wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = surface_error_action(err);
        if action == SurfaceErrorAction::Reconfigured {
            self.surface
                .configure(self.gpu.device(), &self.surface_config);
        }
        action
    }
}

fn surface_error_action(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        _ => SurfaceErrorAction::SkipFrame,
    }
}

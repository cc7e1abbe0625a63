use std::sync::Arc;
use wgpu::{Adapter, Buffer, Device, DeviceDescriptor, Instance, Queue, Surface};

use crate::config::BackendConfig;
use crate::error::{GfxError, GfxResult};

/// Shared GPU device and queue
///
/// Cheap to clone (Arc); the backend, surfaces and callers creating their own
/// textures all use the same device.
#[derive(Clone)]
pub struct GpuContext {
    adapter: Arc<Adapter>,
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl GpuContext {
    /// Create a GPU context without a surface (offscreen rendering, tests)
    pub async fn new(config: &BackendConfig) -> GfxResult<Self> {
        let instance = Self::create_instance(config);
        let adapter = Self::request_adapter(&instance, None, config).await?;
        Self::from_adapter(adapter).await
    }

    /// Create a GPU context whose adapter can present to `surface`
    ///
    /// `surface` must have been created from `instance`.
    pub async fn for_surface(
        instance: &Instance,
        surface: &Surface<'_>,
        config: &BackendConfig,
    ) -> GfxResult<Self> {
        let adapter = Self::request_adapter(instance, Some(surface), config).await?;
        Self::from_adapter(adapter).await
    }

    /// Instance honoring the configured backends
    pub fn create_instance(config: &BackendConfig) -> Instance {
        Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        })
    }

    async fn from_adapter(adapter: Adapter) -> GfxResult<Self> {
        let info = adapter.get_info();
        log::debug!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = Self::request_device(&adapter).await?;
        Ok(Self {
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Get reference to the adapter
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Get reference to the queue
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Read back the contents of a `MAP_READ` buffer, blocking until the GPU is done
    pub fn read_buffer_sync(&self, buffer: &Buffer) -> GfxResult<Vec<u8>> {
        let buffer_slice = buffer.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .ok();

        match receiver.recv() {
            Ok(Ok(())) => {
                let data = buffer_slice.get_mapped_range();
                let result = data.to_vec();
                drop(data);
                buffer.unmap();
                Ok(result)
            }
            Ok(Err(e)) => Err(GfxError::BufferMap(e.to_string())),
            Err(_) => Err(GfxError::BufferMap(
                "channel closed before receiving result".into(),
            )),
        }
    }

    async fn request_adapter(
        instance: &Instance,
        surface: Option<&Surface<'_>>,
        config: &BackendConfig,
    ) -> GfxResult<Adapter> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await?;
        Ok(adapter)
    }

    async fn request_device(adapter: &Adapter) -> GfxResult<(Device, Queue)> {
        let device = adapter
            .request_device(&DeviceDescriptor {
                label: Some("viewport presenter device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await?;
        Ok(device)
    }
}

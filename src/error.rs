//! Error types for the library

use thiserror::Error;

use crate::traits::ShaderStage;

/// Errors raised by the graphics backends
#[derive(Error, Debug)]
pub enum GfxError {
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("no {stage} shader source was set before linking")]
    MissingShaderSource { stage: ShaderStage },

    #[error("program failed to link:\n{log}")]
    Link { log: String },

    #[error("unsupported resource binding `{name}` (group {group}, binding {binding})")]
    UnsupportedBinding {
        name: String,
        group: u32,
        binding: u32,
    },

    #[error("GPU validation error: {0}")]
    Validation(String),

    #[error("No suitable GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("surface reports no supported formats for this adapter")]
    NoSurfaceFormat,

    #[error("Buffer mapping failed: {0}")]
    BufferMap(String),
}

/// Convenience type alias for Results with [`GfxError`]
pub type GfxResult<T> = std::result::Result<T, GfxError>;

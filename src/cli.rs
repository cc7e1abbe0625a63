// cli.rs - Command-line interface configuration
use clap::{Parser, ValueEnum};

use crate::config::BackendConfig;
use crate::logging::LoggingConfig;

/// Sampler filter used when presenting the off-screen attachment.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

impl From<Filter> for wgpu::FilterMode {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "viewport-presenter")]
#[command(about = "Presents an off-screen render target to the window", long_about = None)]
pub struct Cli {
    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Edge length of the square off-screen texture
    #[arg(long = "texture-size", default_value_t = 64)]
    pub texture_size: u32,

    /// Sampler filter applied when the texture is stretched over the window
    #[arg(long, value_enum, default_value_t = Filter::Nearest)]
    pub filter: Filter,

    /// Log filter in env_logger syntax; overrides RUST_LOG
    #[arg(long = "log")]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            filter: self.filter.into(),
            ..BackendConfig::default()
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        match &self.log_filter {
            Some(filter) => LoggingConfig::with_filter(filter.as_str()),
            None => LoggingConfig::default(),
        }
    }
}

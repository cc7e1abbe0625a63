/// Initialization parameters for the wgpu backend.
///
/// Keep this minimal; add flags only when a concrete backend requirement exists.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backends wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,

    /// Magnification/minification filter of the sampler bound with every texture.
    pub filter: wgpu::FilterMode,

    /// Number of texture units exposed through `active_texture`.
    ///
    /// 16 matches the minimum fragment texture unit count of desktop GL.
    pub max_texture_units: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::default(),
            filter: wgpu::FilterMode::Linear,
            max_texture_units: 16,
        }
    }
}

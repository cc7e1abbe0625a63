pub mod backend;
pub mod geometry;
pub mod gpu_context;
pub mod program;
pub mod reflect;
pub mod surface;

pub use backend::{BindingSnapshot, RenderTarget, ShaderHandle, WgpuBackend};
pub use geometry::WgpuGeometry;
pub use gpu_context::GpuContext;
pub use program::WgpuProgram;
pub use surface::{SurfaceErrorAction, SurfaceFrame, WindowSurface};

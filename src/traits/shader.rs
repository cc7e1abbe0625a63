use std::fmt;

use super::binding::Bindable;
use crate::error::GfxResult;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A vertex + fragment shader pair compiled and linked into one program.
pub trait ShaderProgram: Bindable {
    fn set_vertex_shader(&mut self, source: &str);

    fn set_fragment_shader(&mut self, source: &str);

    /// Compiles both stages and links them.
    ///
    /// On failure the error carries the human-readable diagnostic log.
    fn link(&mut self) -> GfxResult<()>;

    fn is_linked(&self) -> bool;

    /// Sets an integer uniform, typically a sampler's texture unit.
    fn set_uniform(&self, name: &str, value: i32);
}

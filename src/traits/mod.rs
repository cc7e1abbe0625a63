pub mod backend;
pub mod binding;
pub mod geometry;
pub mod shader;

pub use backend::*;
pub use binding::*;
pub use geometry::*;
pub use shader::*;

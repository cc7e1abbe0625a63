use super::geometry::GeometryBuffer;
use super::shader::ShaderProgram;

/// A graphics context owning the global binding points.
///
/// Implementations are cheap handles to a context that lives on one thread;
/// clones refer to the same context.
pub trait GraphicsBackend: Clone {
    /// Handle to an existing 2D texture owned by the caller.
    type Texture: ?Sized;
    type Geometry: GeometryBuffer;
    type Program: ShaderProgram;

    fn create_geometry(&self) -> Self::Geometry;

    fn create_program(&self) -> Self::Program;

    /// Selects the texture unit that `bind_texture_2d` targets.
    fn active_texture(&self, unit: u32);

    /// Binds `texture` to the active unit, or clears the unit with `None`.
    fn bind_texture_2d(&self, texture: Option<&Self::Texture>);

    /// Clears the generic vertex array binding.
    fn unbind_vertex_array(&self);
}

use std::rc::Rc;

use crate::error::{GfxError, GfxResult};
use crate::traits::{
    Bound, GeometryBuffer, GraphicsBackend, Primitive, ShaderProgram, TextureUnitBinding,
};

/// Floats per interleaved quad vertex: position (3), color (3), texture coordinate (2).
pub const FLOATS_PER_VERTEX: usize = 8;

/// Byte stride of one quad vertex.
pub const VERTEX_STRIDE: usize = FLOATS_PER_VERTEX * std::mem::size_of::<f32>();

pub const POSITION_ATTRIBUTE: u32 = 0;
pub const COLOR_ATTRIBUTE: u32 = 1;
pub const TEX_COORD_ATTRIBUTE: u32 = 2;

/// Texture unit the presented texture is bound to.
pub const PRESENT_TEXTURE_UNIT: u32 = 0;

/// Name of the sampled texture in the fragment stage.
pub const SAMPLER_UNIFORM: &str = "tex";

const W: f32 = 1.0;
const H: f32 = 1.0;

/// Unit quad covering the whole viewport in normalized device coordinates.
///
/// Corner colors only make the corners tell apart in debugging tools; the
/// fragment stage does not read them.
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 4 * FLOATS_PER_VERTEX] = [
    // x   y    z     r    g    b     u    v
    -W, -H, 0.0,  1.0, 0.0, 0.0,  0.0, 0.0,
     W, -H, 0.0,  0.0, 1.0, 0.0,  1.0, 0.0,
     W,  H, 0.0,  0.0, 0.0, 1.0,  1.0, 1.0,
    -W,  H, 0.0,  1.0, 1.0, 0.0,  0.0, 1.0,
];

/// Two counter-clockwise triangles.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// `(index, components, offset)` of the quad's attributes; all share [`VERTEX_STRIDE`].
pub const QUAD_ATTRIBUTES: [(u32, u32, usize); 3] = [
    (POSITION_ATTRIBUTE, 3, 0),
    (COLOR_ATTRIBUTE, 3, 3 * std::mem::size_of::<f32>()),
    (TEX_COORD_ATTRIBUTE, 2, 6 * std::mem::size_of::<f32>()),
];

/// Vertex stage: position is already in clip space; color and texture
/// coordinate are forwarded. wgpu textures have a top-left origin, so `v` is
/// flipped to keep a rendered attachment upright.
pub const VERTEX_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) tex_coord: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(in.position, 1.0);
    out.color = vec4<f32>(in.color, 1.0);
    out.tex_coord = vec2<f32>(in.tex_coord.x, 1.0 - in.tex_coord.y);
    return out;
}
"#;

/// Fragment stage: outputs the texture sample, ignoring the interpolated color.
pub const FRAGMENT_SHADER: &str = r#"
@group(0) @binding(0) var tex: texture_2d<f32>;
@group(0) @binding(1) var tex_sampler: sampler;

struct FragmentInput {
    @location(0) color: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
};

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    return textureSample(tex, tex_sampler, in.tex_coord);
}
"#;

/// Presents a texture by drawing it over the whole currently bound framebuffer.
///
/// Geometry and program are built once in [`ViewportPresenter::new`] and
/// released when the presenter drops. The presenter never keeps the texture
/// handed to [`ViewportPresenter::render`].
pub struct ViewportPresenter<B: GraphicsBackend> {
    backend: B,
    geometry: Rc<B::Geometry>,
    program: Rc<B::Program>,
    link_error: Option<GfxError>,
}

impl<B: GraphicsBackend> ViewportPresenter<B> {
    /// Builds the quad geometry and links the presentation program.
    ///
    /// A link failure is logged and kept; see [`is_ready`](Self::is_ready) and
    /// [`link_error`](Self::link_error).
    pub fn new(backend: &B) -> Self {
        let geometry = Rc::new(create_quad(backend));

        let mut program = backend.create_program();
        program.set_vertex_shader(VERTEX_SHADER);
        program.set_fragment_shader(FRAGMENT_SHADER);
        let link_error = program.link().err();

        if let Some(err) = &link_error {
            log::error!("viewport presenter program unusable: {err}");
        } else {
            log::debug!(
                "viewport presenter ready ({} vertices, {} indices)",
                geometry.vertex_count(),
                geometry.index_count()
            );
        }

        Self {
            backend: backend.clone(),
            geometry,
            program: Rc::new(program),
            link_error,
        }
    }

    /// Like [`new`](Self::new) but fails when the program did not link.
    pub fn try_new(backend: &B) -> GfxResult<Self> {
        let mut presenter = Self::new(backend);
        match presenter.link_error.take() {
            Some(err) => Err(err),
            None => Ok(presenter),
        }
    }

    /// Draws `texture` over the full viewport.
    ///
    /// Every binding made here is cleared again before returning, so the
    /// global binding points are left neutral for unrelated draws.
    pub fn render(&self, texture: &B::Texture) {
        let texture_unit = TextureUnitBinding::new(&self.backend, PRESENT_TEXTURE_UNIT, texture);
        let geometry = Bound::new(&*self.geometry);
        let program = Bound::new(&*self.program);

        program.set_uniform(SAMPLER_UNIFORM, PRESENT_TEXTURE_UNIT as i32);
        geometry.render(Primitive::Triangles);

        drop(program);
        drop(geometry);
        drop(texture_unit);
    }

    pub fn geometry(&self) -> &Rc<B::Geometry> {
        &self.geometry
    }

    pub fn program(&self) -> &Rc<B::Program> {
        &self.program
    }

    /// Whether the presentation program linked.
    pub fn is_ready(&self) -> bool {
        self.program.is_linked()
    }

    pub fn link_error(&self) -> Option<&GfxError> {
        self.link_error.as_ref()
    }
}

fn create_quad<B: GraphicsBackend>(backend: &B) -> B::Geometry {
    let mut geometry = backend.create_geometry();
    geometry.write_vertex_data(&QUAD_VERTICES);
    geometry.write_index_data(&QUAD_INDICES);
    for (index, components, offset) in QUAD_ATTRIBUTES {
        geometry.set_attribute_definition(index, components, VERTEX_STRIDE, offset);
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflect::{self, BindingKind};
    use crate::traits::ShaderStage;

    fn vertex(i: usize) -> &'static [f32] {
        &QUAD_VERTICES[i * FLOATS_PER_VERTEX..(i + 1) * FLOATS_PER_VERTEX]
    }

    #[test]
    fn test_stride_is_32_bytes() {
        assert_eq!(VERTEX_STRIDE, 32);
    }

    #[test]
    fn test_attribute_offsets() {
        assert_eq!(QUAD_ATTRIBUTES, [(0, 3, 0), (1, 3, 12), (2, 2, 24)]);

        let floats: u32 = QUAD_ATTRIBUTES.iter().map(|(_, c, _)| c).sum();
        assert_eq!(floats as usize, FLOATS_PER_VERTEX);
    }

    #[test]
    fn test_quad_corners_span_ndc() {
        assert_eq!(&vertex(0)[..2], &[-1.0, -1.0]);
        assert_eq!(&vertex(1)[..2], &[1.0, -1.0]);
        assert_eq!(&vertex(2)[..2], &[1.0, 1.0]);
        assert_eq!(&vertex(3)[..2], &[-1.0, 1.0]);
        assert!((0..4).all(|i| vertex(i)[2] == 0.0));
    }

    #[test]
    fn test_quad_tex_coords_span_unit_square() {
        let uvs: Vec<[f32; 2]> = (0..4).map(|i| [vertex(i)[6], vertex(i)[7]]).collect();
        assert_eq!(uvs, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_quad_indices_form_two_triangles() {
        assert_eq!(&QUAD_INDICES[..3], &[0, 1, 2]);
        assert_eq!(&QUAD_INDICES[3..], &[2, 3, 0]);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < 4));
    }

    #[test]
    fn test_shader_entry_points() {
        let vs = reflect::reflect(VERTEX_SHADER).unwrap();
        let fs = reflect::reflect(FRAGMENT_SHADER).unwrap();
        assert_eq!(vs.entry_points.len(), 1);
        assert_eq!(vs.entry_point(ShaderStage::Vertex), Some("vs_main"));
        assert_eq!(fs.entry_points.len(), 1);
        assert_eq!(fs.entry_point(ShaderStage::Fragment), Some("fs_main"));
    }

    #[test]
    fn test_fragment_samples_named_texture() {
        let bindings = reflect::reflect(FRAGMENT_SHADER).unwrap().bindings;
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].name, SAMPLER_UNIFORM);
        assert_eq!(bindings[0].kind, BindingKind::Texture2d);
        assert_eq!(bindings[1].kind, BindingKind::Sampler);
        assert!(reflect::reflect(VERTEX_SHADER).unwrap().bindings.is_empty());
    }
}

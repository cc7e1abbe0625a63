use super::binding::Bindable;

/// Primitive topology used for a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// Memory layout of one float vertex attribute inside an interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDefinition {
    /// Shader input slot (`@location` / attribute index).
    pub index: u32,
    /// Number of `f32` components, 1 to 4.
    pub components: u32,
    /// Distance in bytes between two consecutive vertices.
    pub stride: usize,
    /// Byte offset of the first component inside a vertex.
    pub offset: usize,
}

impl AttributeDefinition {
    pub const fn new(index: u32, components: u32, stride: usize, offset: usize) -> Self {
        Self {
            index,
            components,
            stride,
            offset,
        }
    }

    /// Size of the attribute in bytes.
    pub const fn size(&self) -> usize {
        self.components as usize * std::mem::size_of::<f32>()
    }
}

/// GPU-resident vertex and index data plus its attribute layout.
///
/// Binding activates the vertex state; `render` issues a draw using the
/// geometry's own indices (or vertices when no index data was written).
pub trait GeometryBuffer: Bindable {
    /// Uploads raw interleaved vertex floats, replacing previous data.
    fn write_vertex_data(&mut self, data: &[f32]);

    /// Uploads triangle indices, replacing previous data.
    fn write_index_data(&mut self, data: &[u32]);

    /// Declares the layout of the attribute at `index`.
    ///
    /// Redefining an index replaces its previous definition.
    fn set_attribute_definition(
        &mut self,
        index: u32,
        components: u32,
        stride: usize,
        offset: usize,
    );

    /// Attribute definitions, ordered by index.
    fn attributes(&self) -> &[AttributeDefinition];

    /// Number of whole vertices in the vertex data, derived from the attribute stride.
    fn vertex_count(&self) -> usize;

    fn index_count(&self) -> usize;

    /// Issues the draw call for `primitive`.
    fn render(&self, primitive: Primitive);
}

/// Vertex count of `float_count` interleaved floats laid out by `attributes`.
///
/// Returns 0 when no attribute defines a stride.
pub fn vertex_count_for(float_count: usize, attributes: &[AttributeDefinition]) -> usize {
    let stride = attributes.first().map_or(0, |a| a.stride);
    if stride == 0 {
        return 0;
    }
    (float_count * std::mem::size_of::<f32>()) / stride
}

/// Inserts or replaces `definition`, keeping the list ordered by index.
pub fn upsert_attribute(attributes: &mut Vec<AttributeDefinition>, definition: AttributeDefinition) {
    match attributes.binary_search_by_key(&definition.index, |a| a.index) {
        Ok(pos) => attributes[pos] = definition,
        Err(pos) => attributes.insert(pos, definition),
    }
}

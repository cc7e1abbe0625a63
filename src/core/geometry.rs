use std::rc::Rc;

use wgpu::util::DeviceExt;

use super::backend::{DrawCall, Shared};
use crate::traits::{
    upsert_attribute, vertex_count_for, AttributeDefinition, Bindable, GeometryBuffer, Primitive,
};

/// Vertex and index buffers on the GPU plus their attribute layout.
///
/// Writes replace the whole buffer. Binding marks this geometry as the
/// context's current vertex array.
pub struct WgpuGeometry {
    shared: Rc<Shared>,
    id: u64,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    vertex_floats: usize,
    index_count: usize,
    attributes: Vec<AttributeDefinition>,
}

impl WgpuGeometry {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        let id = shared.next_id();
        Self {
            shared,
            id,
            vertex_buffer: None,
            index_buffer: None,
            vertex_floats: 0,
            index_count: 0,
            attributes: Vec::new(),
        }
    }

    fn upload(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> Option<wgpu::Buffer> {
        if contents.is_empty() {
            return None;
        }
        let buffer = self
            .shared
            .gpu()
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        Some(buffer)
    }
}

impl Bindable for WgpuGeometry {
    fn bind(&self) {
        self.shared.bind_vertex_array(Some(self.id));
    }

    fn release(&self) {
        if self.shared.bound_vertex_array() == Some(self.id) {
            self.shared.bind_vertex_array(None);
        }
    }
}

impl GeometryBuffer for WgpuGeometry {
    fn write_vertex_data(&mut self, data: &[f32]) {
        self.vertex_buffer = self.upload(
            "Viewport Vertex Buffer",
            bytemuck::cast_slice(data),
            wgpu::BufferUsages::VERTEX,
        );
        self.vertex_floats = data.len();
    }

    fn write_index_data(&mut self, data: &[u32]) {
        self.index_buffer = self.upload(
            "Viewport Index Buffer",
            bytemuck::cast_slice(data),
            wgpu::BufferUsages::INDEX,
        );
        self.index_count = data.len();
    }

    fn set_attribute_definition(
        &mut self,
        index: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) {
        let definition = AttributeDefinition::new(index, components, stride, offset);
        if !(1..=4).contains(&components) {
            log::error!("attribute {index}: {components} components not supported, ignored");
            return;
        }
        if offset + definition.size() > stride {
            log::error!("attribute {index}: offset {offset} overruns stride {stride}, ignored");
            return;
        }
        if let Some(other) = self
            .attributes
            .iter()
            .find(|a| a.index != index && a.stride != stride)
        {
            log::warn!(
                "attribute {index}: stride {stride} differs from attribute {} ({}); \
                 all attributes share one interleaved buffer",
                other.index,
                other.stride
            );
        }
        upsert_attribute(&mut self.attributes, definition);
    }

    fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    fn vertex_count(&self) -> usize {
        vertex_count_for(self.vertex_floats, &self.attributes)
    }

    fn index_count(&self) -> usize {
        self.index_count
    }

    fn render(&self, primitive: Primitive) {
        if self.shared.bound_vertex_array() != Some(self.id) {
            log::warn!("geometry {} drawn while not bound", self.id);
        }
        let Some(vertices) = self.vertex_buffer.as_ref() else {
            log::warn!("geometry {} has no vertex data", self.id);
            return;
        };

        let call = match self.index_buffer.as_ref() {
            Some(indices) => DrawCall::Indexed {
                indices,
                count: self.index_count as u32,
            },
            None => DrawCall::Arrays {
                count: self.vertex_count() as u32,
            },
        };
        self.shared.draw(vertices, &self.attributes, primitive, call);
    }
}

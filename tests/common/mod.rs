//! Recording test double for the graphics collaborators.
//!
//! Every call made against the backend, its geometries and its programs is
//! appended to one shared log, and the binding points are tracked so tests can
//! check what was bound at draw time and what is left bound afterwards.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use viewport_presenter::traits::{
    upsert_attribute, vertex_count_for, AttributeDefinition, Bindable, GeometryBuffer,
    GraphicsBackend, Primitive, ShaderProgram, ShaderStage,
};
use viewport_presenter::{shader_info_log, GfxError, GfxResult, InfoLogQuery};

/// A texture the test double can bind: an id plus the uniform color it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeTexture {
    pub id: u32,
    pub size: u32,
    pub color: [u8; 4],
}

impl FakeTexture {
    pub fn solid(id: u32, size: u32, color: [u8; 4]) -> Self {
        Self { id, size, color }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    UnbindVertexArray,
    WriteVertexData(usize),
    WriteIndexData(usize),
    SetAttribute(AttributeDefinition),
    BindGeometry,
    ReleaseGeometry,
    SetShaderSource(ShaderStage),
    Link,
    BindProgram,
    ReleaseProgram,
    SetUniform(String, i32),
    Draw {
        primitive: Primitive,
        indexed: bool,
        count: usize,
    },
}

/// What the binding points held when a draw was issued.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub primitive: Primitive,
    pub count: usize,
    pub indexed: bool,
    pub unit_textures: BTreeMap<u32, FakeTexture>,
    pub uniforms: BTreeMap<String, i32>,
    pub program_bound: bool,
    pub vertex_array_bound: bool,
}

impl DrawRecord {
    /// Texture sampled through the uniform `name`, resolved like a sampler uniform.
    pub fn sampled_texture(&self, name: &str) -> Option<&FakeTexture> {
        let unit = self.uniforms.get(name).copied().unwrap_or(0);
        self.unit_textures.get(&(unit as u32))
    }
}

/// Binding points after a sequence of calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingState {
    pub active_unit: u32,
    pub bound_units: Vec<u32>,
    pub vertex_array_bound: bool,
    pub program_bound: bool,
}

impl BindingState {
    pub fn is_neutral(&self) -> bool {
        self.bound_units.is_empty() && !self.vertex_array_bound && !self.program_bound
    }
}

#[derive(Default)]
struct Inner {
    calls: RefCell<Vec<Call>>,
    draws: RefCell<Vec<DrawRecord>>,
    active_unit: Cell<u32>,
    units: RefCell<BTreeMap<u32, FakeTexture>>,
    vertex_array_bound: Cell<bool>,
    program_bound: Cell<bool>,
    uniforms: RefCell<BTreeMap<String, i32>>,
    shader_logs: RefCell<Vec<String>>,
    reject_stage: Cell<Option<ShaderStage>>,
}

#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Rc<Inner>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose compiler rejects every source of `stage`.
    pub fn rejecting(stage: ShaderStage) -> Self {
        let backend = Self::default();
        backend.inner.reject_stage.set(Some(stage));
        backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.borrow_mut().clear();
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.inner.draws.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.inner.calls.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn state(&self) -> BindingState {
        BindingState {
            active_unit: self.inner.active_unit.get(),
            bound_units: self.inner.units.borrow().keys().copied().collect(),
            vertex_array_bound: self.inner.vertex_array_bound.get(),
            program_bound: self.inner.program_bound.get(),
        }
    }

    fn record(&self, call: Call) {
        self.inner.calls.borrow_mut().push(call);
    }

    /// Fake compiler: rejects unbalanced braces and the configured stage.
    fn compile(&self, stage: ShaderStage, source: &str) -> (usize, bool) {
        let opened = source.matches('{').count();
        let closed = source.matches('}').count();

        let log = if self.inner.reject_stage.get() == Some(stage) {
            format!("error: {stage} stage rejected by test compiler")
        } else if opened != closed {
            format!("error: unbalanced braces ({opened} opened, {closed} closed)")
        } else {
            String::new()
        };

        let ok = log.is_empty();
        let mut logs = self.inner.shader_logs.borrow_mut();
        logs.push(log);
        (logs.len() - 1, ok)
    }
}

impl InfoLogQuery for RecordingBackend {
    type ShaderId = usize;

    fn info_log_length(&self, shader: usize) -> usize {
        match self.inner.shader_logs.borrow().get(shader) {
            Some(log) if !log.is_empty() => log.len() + 1,
            _ => 0,
        }
    }

    fn read_info_log(&self, shader: usize, buf: &mut [u8]) -> usize {
        let logs = self.inner.shader_logs.borrow();
        let Some(log) = logs.get(shader) else { return 0 };
        let n = log.len().min(buf.len());
        buf[..n].copy_from_slice(&log.as_bytes()[..n]);
        n
    }
}

impl GraphicsBackend for RecordingBackend {
    type Texture = FakeTexture;
    type Geometry = RecordingGeometry;
    type Program = RecordingProgram;

    fn create_geometry(&self) -> RecordingGeometry {
        RecordingGeometry {
            backend: self.clone(),
            vertices: Vec::new(),
            indices: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn create_program(&self) -> RecordingProgram {
        RecordingProgram {
            backend: self.clone(),
            vertex_source: None,
            fragment_source: None,
            linked: false,
        }
    }

    fn active_texture(&self, unit: u32) {
        self.record(Call::ActiveTexture(unit));
        self.inner.active_unit.set(unit);
    }

    fn bind_texture_2d(&self, texture: Option<&FakeTexture>) {
        self.record(Call::BindTexture(texture.map(|t| t.id)));
        let unit = self.inner.active_unit.get();
        let mut units = self.inner.units.borrow_mut();
        match texture {
            Some(texture) => {
                units.insert(unit, texture.clone());
            }
            None => {
                units.remove(&unit);
            }
        }
    }

    fn unbind_vertex_array(&self) {
        self.record(Call::UnbindVertexArray);
        self.inner.vertex_array_bound.set(false);
    }
}

pub struct RecordingGeometry {
    backend: RecordingBackend,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    attributes: Vec<AttributeDefinition>,
}

impl RecordingGeometry {
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl Bindable for RecordingGeometry {
    fn bind(&self) {
        self.backend.record(Call::BindGeometry);
        self.backend.inner.vertex_array_bound.set(true);
    }

    fn release(&self) {
        self.backend.record(Call::ReleaseGeometry);
        self.backend.inner.vertex_array_bound.set(false);
    }
}

impl GeometryBuffer for RecordingGeometry {
    fn write_vertex_data(&mut self, data: &[f32]) {
        self.backend.record(Call::WriteVertexData(data.len()));
        self.vertices = data.to_vec();
    }

    fn write_index_data(&mut self, data: &[u32]) {
        self.backend.record(Call::WriteIndexData(data.len()));
        self.indices = data.to_vec();
    }

    fn set_attribute_definition(
        &mut self,
        index: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) {
        let definition = AttributeDefinition::new(index, components, stride, offset);
        self.backend.record(Call::SetAttribute(definition));
        upsert_attribute(&mut self.attributes, definition);
    }

    fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    fn vertex_count(&self) -> usize {
        vertex_count_for(self.vertices.len(), &self.attributes)
    }

    fn index_count(&self) -> usize {
        self.indices.len()
    }

    fn render(&self, primitive: Primitive) {
        let indexed = !self.indices.is_empty();
        let count = if indexed {
            self.indices.len()
        } else {
            self.vertex_count()
        };
        self.backend.record(Call::Draw {
            primitive,
            indexed,
            count,
        });

        let inner = &self.backend.inner;
        inner.draws.borrow_mut().push(DrawRecord {
            primitive,
            count,
            indexed,
            unit_textures: inner.units.borrow().clone(),
            uniforms: inner.uniforms.borrow().clone(),
            program_bound: inner.program_bound.get(),
            vertex_array_bound: inner.vertex_array_bound.get(),
        });
    }
}

pub struct RecordingProgram {
    backend: RecordingBackend,
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    linked: bool,
}

impl RecordingProgram {
    fn compile_stage(&self, stage: ShaderStage) -> GfxResult<()> {
        let source = match stage {
            ShaderStage::Vertex => self.vertex_source.as_deref(),
            ShaderStage::Fragment => self.fragment_source.as_deref(),
        };
        let source = source.ok_or(GfxError::MissingShaderSource { stage })?;

        let (handle, ok) = self.backend.compile(stage, source);
        if ok {
            Ok(())
        } else {
            Err(GfxError::ShaderCompile {
                stage,
                log: shader_info_log(&self.backend, handle),
            })
        }
    }
}

impl Bindable for RecordingProgram {
    fn bind(&self) {
        self.backend.record(Call::BindProgram);
        self.backend.inner.program_bound.set(self.linked);
    }

    fn release(&self) {
        self.backend.record(Call::ReleaseProgram);
        self.backend.inner.program_bound.set(false);
        self.backend.inner.uniforms.borrow_mut().clear();
    }
}

impl ShaderProgram for RecordingProgram {
    fn set_vertex_shader(&mut self, source: &str) {
        self.backend.record(Call::SetShaderSource(ShaderStage::Vertex));
        self.vertex_source = Some(source.to_owned());
    }

    fn set_fragment_shader(&mut self, source: &str) {
        self.backend.record(Call::SetShaderSource(ShaderStage::Fragment));
        self.fragment_source = Some(source.to_owned());
    }

    fn link(&mut self) -> GfxResult<()> {
        self.backend.record(Call::Link);
        self.linked = false;
        self.compile_stage(ShaderStage::Vertex)?;
        self.compile_stage(ShaderStage::Fragment)?;
        self.linked = true;
        Ok(())
    }

    fn is_linked(&self) -> bool {
        self.linked
    }

    fn set_uniform(&self, name: &str, value: i32) {
        self.backend
            .record(Call::SetUniform(name.to_owned(), value));
        if self.backend.inner.program_bound.get() {
            self.backend
                .inner
                .uniforms
                .borrow_mut()
                .insert(name.to_owned(), value);
        }
    }
}

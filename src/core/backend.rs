use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::geometry::WgpuGeometry;
use super::gpu_context::GpuContext;
use super::program::{LinkedProgram, PipelineKey, WgpuProgram};
use crate::config::BackendConfig;
use crate::error::GfxResult;
use crate::info_log::InfoLogQuery;
use crate::traits::{AttributeDefinition, GraphicsBackend, Primitive};

/// Color attachment draws are rendered into (the "bound framebuffer").
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl RenderTarget {
    pub fn new(view: wgpu::TextureView, format: wgpu::TextureFormat) -> Self {
        Self { view, format }
    }

    /// Default view of `texture`, keeping the texture's format.
    pub fn from_texture(texture: &wgpu::Texture) -> Self {
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            format: texture.format(),
        }
    }
}

/// Identifier of a compiled shader stage, indexing the backend's info-log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) usize);

/// Read-only view of the emulated binding points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSnapshot {
    pub active_unit: u32,
    /// Units that currently hold a texture.
    pub bound_texture_units: Vec<u32>,
    pub vertex_array_bound: bool,
    pub program_bound: bool,
    pub framebuffer_bound: bool,
}

impl BindingSnapshot {
    /// No texture, vertex array or program bound. The framebuffer is not considered.
    pub fn is_neutral(&self) -> bool {
        self.bound_texture_units.is_empty() && !self.vertex_array_bound && !self.program_bound
    }
}

#[derive(Default)]
struct BindingState {
    active_unit: u32,
    /// Set when the last `active_texture` named a unit out of range.
    unit_rejected: bool,
    texture_units: Vec<Option<wgpu::TextureView>>,
    vertex_array: Option<u64>,
    program: Option<Rc<LinkedProgram>>,
    framebuffer: Option<RenderTarget>,
}

impl BindingState {
    /// Makes `unit` active. An out-of-range unit keeps the previous one but
    /// disables texture binds until a valid unit is selected.
    fn select_unit(&mut self, unit: u32) -> bool {
        if (unit as usize) < self.texture_units.len() {
            self.active_unit = unit;
            self.unit_rejected = false;
            true
        } else {
            self.unit_rejected = true;
            false
        }
    }

    /// Slot a texture bind goes to, if any.
    fn bind_slot(&mut self) -> Option<&mut Option<wgpu::TextureView>> {
        if self.unit_rejected {
            return None;
        }
        self.texture_units.get_mut(self.active_unit as usize)
    }
}

/// How the vertices of a draw are addressed.
pub(crate) enum DrawCall<'a> {
    Indexed { indices: &'a wgpu::Buffer, count: u32 },
    Arrays { count: u32 },
}

/// Context state shared by the backend handle, its geometries and programs.
pub(crate) struct Shared {
    gpu: GpuContext,
    config: BackendConfig,
    sampler: wgpu::Sampler,
    bindings: RefCell<BindingState>,
    shader_logs: RefCell<Vec<Vec<u8>>>,
    next_id: Cell<u64>,
}

impl Shared {
    pub(crate) fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn store_shader_log(&self, log: String) -> ShaderHandle {
        let mut logs = self.shader_logs.borrow_mut();
        logs.push(log.into_bytes());
        ShaderHandle(logs.len() - 1)
    }

    pub(crate) fn bind_vertex_array(&self, id: Option<u64>) {
        self.bindings.borrow_mut().vertex_array = id;
    }

    pub(crate) fn bound_vertex_array(&self) -> Option<u64> {
        self.bindings.borrow().vertex_array
    }

    pub(crate) fn use_program(&self, program: Option<Rc<LinkedProgram>>) {
        self.bindings.borrow_mut().program = program;
    }

    /// Encodes one render pass drawing into the bound framebuffer and submits it.
    pub(crate) fn draw(
        &self,
        vertices: &wgpu::Buffer,
        attributes: &[AttributeDefinition],
        primitive: Primitive,
        call: DrawCall<'_>,
    ) {
        let state = self.bindings.borrow();
        let Some(target) = state.framebuffer.as_ref() else {
            log::warn!("draw skipped: no framebuffer bound");
            return;
        };
        let Some(program) = state.program.as_ref() else {
            log::warn!("draw skipped: no program bound");
            return;
        };

        let device = self.gpu.device();
        let key = PipelineKey {
            attributes: attributes.to_vec(),
            primitive,
            format: target.format,
        };
        let pipeline = match program.pipeline(device, &key) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                log::error!("draw skipped: {err}");
                return;
            }
        };
        let bind_groups = match program.bind_groups(device, &self.sampler, &state.texture_units) {
            Ok(groups) => groups,
            Err(err) => {
                log::error!("draw skipped: {err}");
                return;
            }
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Viewport Draw Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewport Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&pipeline);
            for (index, group) in bind_groups.iter().enumerate() {
                render_pass.set_bind_group(index as u32, group, &[]);
            }
            render_pass.set_vertex_buffer(0, vertices.slice(..));

            match call {
                DrawCall::Indexed { indices, count } => {
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..count, 0, 0..1);
                    log::trace!("draw {primitive:?}: {count} indices");
                }
                DrawCall::Arrays { count } => {
                    render_pass.draw(0..count, 0..1);
                    log::trace!("draw {primitive:?}: {count} vertices");
                }
            }
        }

        self.gpu.queue().submit(Some(encoder.finish()));
    }
}

impl InfoLogQuery for Shared {
    type ShaderId = ShaderHandle;

    fn info_log_length(&self, shader: ShaderHandle) -> usize {
        // Reported like a C API would: text plus terminator.
        match self.shader_logs.borrow().get(shader.0) {
            Some(log) if !log.is_empty() => log.len() + 1,
            _ => 0,
        }
    }

    fn read_info_log(&self, shader: ShaderHandle, buf: &mut [u8]) -> usize {
        let logs = self.shader_logs.borrow();
        let Some(log) = logs.get(shader.0) else { return 0 };

        let n = log.len().min(buf.len());
        buf[..n].copy_from_slice(&log[..n]);
        if n < buf.len() {
            buf[n] = 0;
            return n + 1;
        }
        n
    }
}

/// Graphics backend emulating immediate-mode binding points on top of wgpu.
///
/// Texture units, the vertex array, the program and the framebuffer are global
/// binding points of the context; every clone of the handle shares them. The
/// handle is `!Send`: the context belongs to the thread that created it.
#[derive(Clone)]
pub struct WgpuBackend {
    shared: Rc<Shared>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, config: BackendConfig) -> Self {
        let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Viewport Texture Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: config.filter,
            min_filter: config.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bindings = BindingState {
            texture_units: vec![None; config.max_texture_units as usize],
            ..Default::default()
        };

        Self {
            shared: Rc::new(Shared {
                gpu,
                config,
                sampler,
                bindings: RefCell::new(bindings),
                shader_logs: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Creates a backend on a headless GPU context.
    pub fn headless(config: BackendConfig) -> GfxResult<Self> {
        let gpu = pollster::block_on(GpuContext::new(&config))?;
        Ok(Self::new(gpu, config))
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.shared.gpu
    }

    pub fn config(&self) -> &BackendConfig {
        &self.shared.config
    }

    /// Selects the color attachment subsequent draws render into.
    pub fn bind_framebuffer(&self, target: Option<RenderTarget>) {
        self.shared.bindings.borrow_mut().framebuffer = target;
    }

    pub fn binding_snapshot(&self) -> BindingSnapshot {
        let state = self.shared.bindings.borrow();
        BindingSnapshot {
            active_unit: state.active_unit,
            bound_texture_units: state
                .texture_units
                .iter()
                .enumerate()
                .filter(|(_, view)| view.is_some())
                .map(|(unit, _)| unit as u32)
                .collect(),
            vertex_array_bound: state.vertex_array.is_some(),
            program_bound: state.program.is_some(),
            framebuffer_bound: state.framebuffer.is_some(),
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    type Texture = wgpu::TextureView;
    type Geometry = WgpuGeometry;
    type Program = WgpuProgram;

    fn create_geometry(&self) -> WgpuGeometry {
        WgpuGeometry::new(Rc::clone(&self.shared))
    }

    fn create_program(&self) -> WgpuProgram {
        WgpuProgram::new(Rc::clone(&self.shared))
    }

    fn active_texture(&self, unit: u32) {
        if !self.shared.bindings.borrow_mut().select_unit(unit) {
            log::warn!(
                "texture unit {unit} out of range (max {})",
                self.shared.config.max_texture_units
            );
        }
    }

    fn bind_texture_2d(&self, texture: Option<&wgpu::TextureView>) {
        let mut state = self.shared.bindings.borrow_mut();
        match state.bind_slot() {
            Some(slot) => *slot = texture.cloned(),
            None => log::warn!("texture bind ignored: no valid texture unit active"),
        }
    }

    fn unbind_vertex_array(&self) {
        self.shared.bind_vertex_array(None);
    }
}

impl InfoLogQuery for WgpuBackend {
    type ShaderId = ShaderHandle;

    fn info_log_length(&self, shader: ShaderHandle) -> usize {
        self.shared.info_log_length(shader)
    }

    fn read_info_log(&self, shader: ShaderHandle, buf: &mut [u8]) -> usize {
        self.shared.read_info_log(shader, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_neutrality() {
        let mut snapshot = BindingSnapshot {
            active_unit: 3,
            bound_texture_units: Vec::new(),
            vertex_array_bound: false,
            program_bound: false,
            framebuffer_bound: true,
        };
        assert!(snapshot.is_neutral());

        snapshot.bound_texture_units.push(0);
        assert!(!snapshot.is_neutral());
    }

    fn state_with_units(count: usize) -> BindingState {
        BindingState {
            texture_units: vec![None; count],
            ..Default::default()
        }
    }

    #[test]
    fn test_rejected_unit_disables_binds() {
        let mut state = state_with_units(4);
        assert!(state.select_unit(2));
        assert!(state.bind_slot().is_some());

        assert!(!state.select_unit(4));
        assert_eq!(state.active_unit, 2);
        assert!(state.bind_slot().is_none());
    }

    #[test]
    fn test_valid_unit_reenables_binds() {
        let mut state = state_with_units(4);
        assert!(!state.select_unit(16));
        assert!(state.bind_slot().is_none());

        assert!(state.select_unit(3));
        assert_eq!(state.active_unit, 3);
        assert!(state.bind_slot().is_some());
    }
}

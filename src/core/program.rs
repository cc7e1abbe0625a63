use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::backend::{ShaderHandle, Shared};
use super::reflect::{self, BindingKind, ResourceBinding, ShaderInterface};
use crate::error::{GfxError, GfxResult};
use crate::info_log::shader_info_log;
use crate::traits::{AttributeDefinition, Bindable, Primitive, ShaderProgram, ShaderStage};

/// Everything a render pipeline depends on besides the program itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub attributes: Vec<AttributeDefinition>,
    pub primitive: Primitive,
    pub format: wgpu::TextureFormat,
}

struct CompiledStage {
    handle: ShaderHandle,
    module: wgpu::ShaderModule,
}

/// A program after a successful link.
pub(crate) struct LinkedProgram {
    vertex: CompiledStage,
    fragment: CompiledStage,
    vertex_entry: String,
    fragment_entry: String,
    bindings: Vec<ResourceBinding>,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: RefCell<HashMap<String, i32>>,
    pipelines: RefCell<HashMap<PipelineKey, Rc<wgpu::RenderPipeline>>>,
}

impl LinkedProgram {
    /// Render pipeline for `key`, created on first use.
    pub(crate) fn pipeline(
        &self,
        device: &wgpu::Device,
        key: &PipelineKey,
    ) -> GfxResult<Rc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.borrow().get(key) {
            return Ok(Rc::clone(pipeline));
        }

        let stride = key.attributes.first().map_or(0, |a| a.stride) as u64;
        let attributes: Vec<wgpu::VertexAttribute> = key
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.components),
                offset: a.offset as u64,
                shader_location: a.index,
            })
            .collect();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let topology = topology(key.primitive);
        let strip_index_format = topology
            .is_strip()
            .then_some(wgpu::IndexFormat::Uint32);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Viewport Render Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex.module,
                entry_point: Some(&self.vertex_entry),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment.module,
                entry_point: Some(&self.fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GfxError::Validation(err.to_string()));
        }

        log::debug!(
            "created pipeline for {:?} into {:?} ({} attributes)",
            key.primitive,
            key.format,
            key.attributes.len()
        );

        let pipeline = Rc::new(pipeline);
        self.pipelines
            .borrow_mut()
            .insert(key.clone(), Rc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Bind groups for the program's resources.
    ///
    /// A texture binding named `n` samples the view in the unit stored in
    /// uniform `n` (0 when unset); sampler bindings receive `sampler`.
    pub(crate) fn bind_groups(
        &self,
        device: &wgpu::Device,
        sampler: &wgpu::Sampler,
        texture_units: &[Option<wgpu::TextureView>],
    ) -> GfxResult<Vec<wgpu::BindGroup>> {
        let uniforms = self.uniforms.borrow();
        let mut groups = Vec::with_capacity(self.bind_group_layouts.len());

        for (group, layout) in self.bind_group_layouts.iter().enumerate() {
            let mut entries = Vec::new();
            for binding in self.bindings.iter().filter(|b| b.group as usize == group) {
                let resource = match binding.kind {
                    BindingKind::Texture2d => {
                        let unit = uniforms.get(&binding.name).copied().unwrap_or(0);
                        let view = usize::try_from(unit)
                            .ok()
                            .and_then(|u| texture_units.get(u))
                            .and_then(Option::as_ref)
                            .ok_or_else(|| {
                                GfxError::Validation(format!(
                                    "no texture bound to unit {unit} for `{}`",
                                    binding.name
                                ))
                            })?;
                        wgpu::BindingResource::TextureView(view)
                    }
                    BindingKind::Sampler => wgpu::BindingResource::Sampler(sampler),
                    BindingKind::Other => {
                        return Err(GfxError::UnsupportedBinding {
                            name: binding.name.clone(),
                            group: binding.group,
                            binding: binding.binding,
                        })
                    }
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: binding.binding,
                    resource,
                });
            }

            groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Viewport Texture Bind Group"),
                layout,
                entries: &entries,
            }));
        }
        Ok(groups)
    }

    fn has_texture(&self, name: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.kind == BindingKind::Texture2d && b.name == name)
    }
}

/// WGSL vertex + fragment program.
///
/// `link` compiles both stages, reflects their entry points and texture/sampler
/// bindings, and builds the pipeline layout. Render pipelines are created on
/// first draw for each vertex layout, primitive and target format.
pub struct WgpuProgram {
    shared: Rc<Shared>,
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    stage_handles: Vec<(ShaderStage, ShaderHandle)>,
    linked: Option<Rc<LinkedProgram>>,
    link_log: String,
}

impl WgpuProgram {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self {
            shared,
            vertex_source: None,
            fragment_source: None,
            stage_handles: Vec::new(),
            linked: None,
            link_log: String::new(),
        }
    }

    /// Handle of the most recently compiled `stage`, for [`shader_info_log`].
    pub fn shader_handle(&self, stage: ShaderStage) -> Option<ShaderHandle> {
        self.stage_handles
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, handle)| *handle)
    }

    /// Diagnostics of the last link; empty after a successful link.
    pub fn link_log(&self) -> &str {
        &self.link_log
    }

    fn compile(&mut self, stage: ShaderStage) -> GfxResult<CompiledStage> {
        let source = match stage {
            ShaderStage::Vertex => self.vertex_source.as_deref(),
            ShaderStage::Fragment => self.fragment_source.as_deref(),
        }
        .ok_or(GfxError::MissingShaderSource { stage })?;

        let device = self.shared.gpu().device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                ShaderStage::Vertex => "Viewport Vertex Shader",
                ShaderStage::Fragment => "Viewport Fragment Shader",
            }),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let scope_error = pollster::block_on(device.pop_error_scope());
        let info = pollster::block_on(module.get_compilation_info());

        let mut log = format_messages(&info.messages);
        if log.is_empty() {
            if let Some(err) = &scope_error {
                log = err.to_string();
            }
        }
        let failed = scope_error.is_some()
            || info
                .messages
                .iter()
                .any(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error));

        let handle = self.shared.store_shader_log(log);
        self.stage_handles.push((stage, handle));

        if failed {
            return Err(GfxError::ShaderCompile {
                stage,
                log: shader_info_log(&*self.shared, handle),
            });
        }
        Ok(CompiledStage { handle, module })
    }

    fn compile_and_link(&mut self) -> GfxResult<LinkedProgram> {
        let vertex = self.compile(ShaderStage::Vertex)?;
        let fragment = self.compile(ShaderStage::Fragment)?;
        self.link_stages(vertex, fragment)
    }

    fn link_stages(
        &self,
        vertex: CompiledStage,
        fragment: CompiledStage,
    ) -> GfxResult<LinkedProgram> {
        let vertex_interface =
            reflect::reflect(self.vertex_source.as_deref().unwrap_or_default())?;
        let fragment_interface =
            reflect::reflect(self.fragment_source.as_deref().unwrap_or_default())?;

        let vertex_entry = entry_point(&vertex_interface, ShaderStage::Vertex)?;
        let fragment_entry = entry_point(&fragment_interface, ShaderStage::Fragment)?;

        let mut bindings = vertex_interface.bindings;
        for binding in fragment_interface.bindings {
            match bindings
                .iter()
                .find(|b| b.group == binding.group && b.binding == binding.binding)
            {
                Some(existing) if *existing == binding => {}
                Some(existing) => {
                    return Err(GfxError::Link {
                        log: format!(
                            "`{}` and `{}` both use group {} binding {}",
                            existing.name, binding.name, binding.group, binding.binding
                        ),
                    })
                }
                None => bindings.push(binding),
            }
        }
        if let Some(unsupported) = bindings.iter().find(|b| b.kind == BindingKind::Other) {
            return Err(GfxError::UnsupportedBinding {
                name: unsupported.name.clone(),
                group: unsupported.group,
                binding: unsupported.binding,
            });
        }

        let device = self.shared.gpu().device();
        let group_count = bindings.iter().map(|b| b.group as usize + 1).max().unwrap_or(0);
        let bind_group_layouts: Vec<wgpu::BindGroupLayout> = (0..group_count)
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                    .iter()
                    .filter(|b| b.group as usize == group)
                    .map(layout_entry)
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Viewport Texture Bind Group Layout"),
                    entries: &entries,
                })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Viewport Render Pipeline Layout"),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });

        Ok(LinkedProgram {
            vertex,
            fragment,
            vertex_entry,
            fragment_entry,
            bindings,
            bind_group_layouts,
            pipeline_layout,
            uniforms: RefCell::new(HashMap::new()),
            pipelines: RefCell::new(HashMap::new()),
        })
    }
}

impl Bindable for WgpuProgram {
    fn bind(&self) {
        match &self.linked {
            Some(linked) => self.shared.use_program(Some(Rc::clone(linked))),
            None => log::warn!("binding a program that is not linked"),
        }
    }

    fn release(&self) {
        self.shared.use_program(None);
    }
}

impl ShaderProgram for WgpuProgram {
    fn set_vertex_shader(&mut self, source: &str) {
        self.vertex_source = Some(source.to_string());
    }

    fn set_fragment_shader(&mut self, source: &str) {
        self.fragment_source = Some(source.to_string());
    }

    fn link(&mut self) -> GfxResult<()> {
        self.linked = None;
        self.link_log.clear();

        match self.compile_and_link() {
            Ok(linked) => {
                log::debug!(
                    "linked program ({} -> {}, {} bindings, shaders {:?}/{:?})",
                    linked.vertex_entry,
                    linked.fragment_entry,
                    linked.bindings.len(),
                    linked.vertex.handle,
                    linked.fragment.handle
                );
                self.linked = Some(Rc::new(linked));
                Ok(())
            }
            Err(err) => {
                self.link_log = err.to_string();
                Err(err)
            }
        }
    }

    fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    fn set_uniform(&self, name: &str, value: i32) {
        let Some(linked) = &self.linked else {
            log::warn!("uniform `{name}` set on a program that is not linked");
            return;
        };
        if !linked.has_texture(name) {
            log::debug!("uniform `{name}` is not an active sampler, ignored");
            return;
        }
        linked.uniforms.borrow_mut().insert(name.to_string(), value);
    }
}

fn entry_point(interface: &ShaderInterface, stage: ShaderStage) -> GfxResult<String> {
    interface
        .entry_point(stage)
        .map(str::to_owned)
        .ok_or_else(|| GfxError::Link {
            log: format!("{stage} stage declares no @{stage} entry point"),
        })
}

fn layout_entry(binding: &ResourceBinding) -> wgpu::BindGroupLayoutEntry {
    let ty = match binding.kind {
        BindingKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        _ => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: binding.binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty,
        count: None,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn topology(primitive: Primitive) -> wgpu::PrimitiveTopology {
    match primitive {
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn format_messages(messages: &[wgpu::CompilationMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let kind = match m.message_type {
                wgpu::CompilationMessageType::Error => "error",
                wgpu::CompilationMessageType::Warning => "warning",
                _ => "info",
            };
            match &m.location {
                Some(loc) => format!(
                    "{kind}: {}:{}: {}",
                    loc.line_number, loc.line_position, m.message
                ),
                None => format!("{kind}: {}", m.message),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! WGSL reflection.
//!
//! wgpu does not expose the interface of a shader module, so linking parses
//! each stage with naga's WGSL front end and reads entry points and
//! `@group/@binding` resources from the resulting module.

use naga::{ImageClass, ImageDimension, ScalarKind, TypeInner};

use crate::error::{GfxError, GfxResult};
use crate::traits::ShaderStage;

/// A shader entry point, e.g. `@vertex fn vs_main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub stage: ShaderStage,
    pub name: String,
}

/// Kind of a reflected resource binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Texture2d,
    Sampler,
    /// Anything else (buffers, storage textures, other texture dimensions).
    Other,
}

/// A module-scope `var` carrying `@group` and `@binding` attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub group: u32,
    pub binding: u32,
    pub name: String,
    pub kind: BindingKind,
}

/// Entry points and resource bindings of one WGSL source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    /// Vertex and fragment entry points in declaration order; compute ones are skipped.
    pub entry_points: Vec<EntryPoint>,
    /// Bound module-scope variables in declaration order.
    pub bindings: Vec<ResourceBinding>,
}

impl ShaderInterface {
    pub fn entry_point(&self, stage: ShaderStage) -> Option<&str> {
        self.entry_points
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.name.as_str())
    }
}

/// Parses `source` and collects its interface.
pub fn reflect(source: &str) -> GfxResult<ShaderInterface> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| GfxError::Link {
        log: err.emit_to_string(source),
    })?;

    let entry_points = module
        .entry_points
        .iter()
        .filter_map(|ep| {
            let stage = match ep.stage {
                naga::ShaderStage::Vertex => ShaderStage::Vertex,
                naga::ShaderStage::Fragment => ShaderStage::Fragment,
                _ => return None,
            };
            Some(EntryPoint {
                stage,
                name: ep.name.clone(),
            })
        })
        .collect();

    let bindings = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            Some(ResourceBinding {
                group: binding.group,
                binding: binding.binding,
                name: var.name.clone().unwrap_or_default(),
                kind: binding_kind(&module.types[var.ty].inner),
            })
        })
        .collect();

    Ok(ShaderInterface {
        entry_points,
        bindings,
    })
}

fn binding_kind(inner: &TypeInner) -> BindingKind {
    match *inner {
        TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            class:
                ImageClass::Sampled {
                    kind: ScalarKind::Float,
                    multi: false,
                },
        } => BindingKind::Texture2d,
        TypeInner::Sampler { comparison: false } => BindingKind::Sampler,
        _ => BindingKind::Other,
    }
}

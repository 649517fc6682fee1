//! WGSL compilation and binding reflection with naga.

use crate::error::GraphicsError;
use crate::profile_scope;
use crate::types::{PipelineDescriptor, TextureDimension};

use super::{
    BindingKind, CompiledShader, ShaderBinding, ShaderCompiler, ShaderComposer, ShaderStage,
    ShaderStages, TextureSampleType,
};

/// Default [`ShaderCompiler`]: resolves includes, then parses, validates and
/// reflects WGSL with naga.
#[derive(Debug, Clone, Default)]
pub struct NagaShaderCompiler {
    composer: ShaderComposer,
}

impl NagaShaderCompiler {
    /// Create a compiler without registered includes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `source` available to `#include "path"` directives.
    pub fn register_include(&mut self, path: &str, source: &str) {
        self.composer.register_include(path, source);
    }

    /// The include composer.
    pub fn composer(&self) -> &ShaderComposer {
        &self.composer
    }
}

impl ShaderCompiler for NagaShaderCompiler {
    fn compile(&self, descriptor: &PipelineDescriptor) -> Result<CompiledShader, GraphicsError> {
        profile_scope!("shader_compile");

        let source = self.composer.resolve(&descriptor.source)?;
        let module = naga::front::wgsl::parse_str(&source).map_err(|e| {
            GraphicsError::ShaderCompilationFailed(format!(
                "{}: {}",
                label(descriptor),
                e.emit_to_string(&source)
            ))
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        let info = validator.validate(&module).map_err(|e| {
            GraphicsError::ShaderCompilationFailed(format!(
                "{}: validation error: {e}",
                label(descriptor)
            ))
        })?;

        let vertex_index = find_entry_point(&module, &descriptor.vertex_entry, naga::ShaderStage::Vertex)
            .ok_or_else(|| missing_entry(descriptor, &descriptor.vertex_entry))?;
        let fragment_index = match &descriptor.fragment_entry {
            Some(name) => Some(
                find_entry_point(&module, name, naga::ShaderStage::Fragment)
                    .ok_or_else(|| missing_entry(descriptor, name))?,
            ),
            None => None,
        };

        let mut bindings = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            let Some(resource) = &var.binding else {
                continue;
            };

            let mut visibility = ShaderStages::empty();
            if !info.get_entry_point(vertex_index)[handle].is_empty() {
                visibility |= ShaderStages::VERTEX;
            }
            if let Some(index) = fragment_index
                && !info.get_entry_point(index)[handle].is_empty()
            {
                visibility |= ShaderStages::FRAGMENT;
            }
            if visibility.is_empty() {
                continue;
            }

            let name = var
                .name
                .clone()
                .unwrap_or_else(|| format!("binding_{}_{}", resource.group, resource.binding));
            let kind = binding_kind(&module, var).map_err(|reason| {
                GraphicsError::ShaderCompilationFailed(format!(
                    "{}: binding '{name}': {reason}",
                    label(descriptor)
                ))
            })?;

            bindings.push(ShaderBinding {
                name,
                group: resource.group,
                binding: resource.binding,
                kind,
                visibility,
            });
        }

        let mut stages = vec![(ShaderStage::Vertex, source.clone())];
        if fragment_index.is_some() {
            stages.push((ShaderStage::Fragment, source));
        }

        log::trace!(
            "Compiled shader '{}' with {} bindings",
            label(descriptor),
            bindings.len()
        );

        Ok(CompiledShader::new(
            stages,
            descriptor.vertex_entry.clone(),
            descriptor.fragment_entry.clone(),
            bindings,
        ))
    }
}

fn label(descriptor: &PipelineDescriptor) -> &str {
    descriptor.label.as_deref().unwrap_or("unnamed pipeline")
}

fn missing_entry(descriptor: &PipelineDescriptor, name: &str) -> GraphicsError {
    GraphicsError::ShaderCompilationFailed(format!(
        "{}: entry point '{name}' not found",
        label(descriptor)
    ))
}

fn find_entry_point(module: &naga::Module, name: &str, stage: naga::ShaderStage) -> Option<usize> {
    module
        .entry_points
        .iter()
        .position(|ep| ep.name == name && ep.stage == stage)
}

fn binding_kind(module: &naga::Module, var: &naga::GlobalVariable) -> Result<BindingKind, String> {
    let inner = &module.types[var.ty].inner;
    match var.space {
        naga::AddressSpace::Uniform => Ok(BindingKind::Uniform {
            size: u64::from(inner.size(module.to_ctx())),
        }),
        naga::AddressSpace::Storage { access } => Ok(BindingKind::Storage {
            read_only: !access.contains(naga::StorageAccess::STORE),
        }),
        naga::AddressSpace::Handle => match inner {
            naga::TypeInner::Sampler { comparison } => Ok(BindingKind::Sampler {
                comparison: *comparison,
            }),
            naga::TypeInner::Image {
                dim,
                arrayed,
                class,
            } => {
                let dimension = match (dim, arrayed) {
                    (naga::ImageDimension::D2, false) => TextureDimension::D2,
                    (naga::ImageDimension::D2, true) => TextureDimension::D2Array,
                    (naga::ImageDimension::D3, _) => TextureDimension::D3,
                    (naga::ImageDimension::Cube, false) => TextureDimension::Cube,
                    (naga::ImageDimension::Cube, true) => TextureDimension::CubeArray,
                    _ => return Err("1D textures are not supported".to_string()),
                };
                let (sample_type, multisampled) = match class {
                    naga::ImageClass::Sampled { kind, multi } => {
                        let sample_type = match kind {
                            naga::ScalarKind::Sint => TextureSampleType::Sint,
                            naga::ScalarKind::Uint => TextureSampleType::Uint,
                            _ => TextureSampleType::Float,
                        };
                        (sample_type, *multi)
                    }
                    naga::ImageClass::Depth { multi } => (TextureSampleType::Depth, *multi),
                    _ => return Err("storage textures are not supported".to_string()),
                };
                Ok(BindingKind::Texture {
                    dimension,
                    sample_type,
                    multisampled,
                })
            }
            _ => Err("unsupported handle type".to_string()),
        },
        _ => Err("unsupported address space".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureFormat, VertexAttributeFormat, VertexBufferLayout, BlendMode};

    const TEXTURED: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    tint: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;
@group(1) @binding(0) var<storage, read> offsets: array<vec4<f32>>;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @builtin(instance_index) instance: u32) -> VsOut {
    var out: VsOut;
    out.position = camera.view_proj * (vec4<f32>(pos, 0.0, 1.0) + offsets[instance]);
    out.uv = pos;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, in.uv) * camera.tint;
}
"#;

    fn descriptor(source: &str) -> PipelineDescriptor {
        PipelineDescriptor::new(source)
            .with_vertex_layout(
                VertexBufferLayout::new(8).with_attribute(0, VertexAttributeFormat::Float2, 0),
            )
            .with_color_target(TextureFormat::Rgba8Unorm, BlendMode::Opaque)
    }

    #[test]
    fn test_reflects_bindings() {
        let compiled = NagaShaderCompiler::new()
            .compile(&descriptor(TEXTURED))
            .expect("compile");

        let camera = compiled.binding("camera").expect("camera");
        assert_eq!(camera.kind, BindingKind::Uniform { size: 80 });
        assert_eq!(camera.visibility, ShaderStages::VERTEX | ShaderStages::FRAGMENT);

        let albedo = compiled.binding("albedo").expect("albedo");
        assert!(matches!(
            albedo.kind,
            BindingKind::Texture {
                dimension: TextureDimension::D2,
                sample_type: TextureSampleType::Float,
                multisampled: false
            }
        ));
        assert_eq!(albedo.visibility, ShaderStages::FRAGMENT);

        let offsets = compiled.binding("offsets").expect("offsets");
        assert_eq!(offsets.kind, BindingKind::Storage { read_only: true });
        assert_eq!(offsets.group, 1);

        assert!(matches!(
            compiled.binding("albedo_sampler").map(|b| b.kind),
            Some(BindingKind::Sampler { comparison: false })
        ));
        assert_eq!(compiled.group_count(), 2);
        assert_eq!(compiled.stages().len(), 2);
    }

    #[test]
    fn test_missing_entry_point() {
        let desc = descriptor(TEXTURED).with_entry_points("vs_other", Some("fs_main"));
        let err = NagaShaderCompiler::new().compile(&desc).unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderCompilationFailed(msg) if msg.contains("vs_other")));
    }

    #[test]
    fn test_parse_error() {
        let err = NagaShaderCompiler::new()
            .compile(&descriptor("fn broken( {"))
            .unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderCompilationFailed(_)));
    }

    #[test]
    fn test_includes_are_resolved() {
        let mut compiler = NagaShaderCompiler::new();
        compiler.register_include(
            "fullscreen.wgsl",
            "@vertex\nfn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {\n    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);\n}",
        );
        let source = "#include \"fullscreen.wgsl\"\n@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}";
        let compiled = compiler.compile(&PipelineDescriptor::new(source)).expect("compile");
        let vertex = compiled.source(ShaderStage::Vertex).expect("vertex source");
        assert!(vertex.contains("fn vs_main"));
        assert!(compiled.bindings().is_empty());
    }
}

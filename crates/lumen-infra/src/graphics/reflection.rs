// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shader reflection on top of `naga`.

use lumen_core::{
    BindingKind, ReflectedBinding, ShaderDesc, ShaderError, ShaderInput, ShaderReflection, ShaderReflector,
    ShaderSource, ShaderStage, ShaderStageFlags, UniformBlock, UniformMember,
};

/// Reflects GLSL, WGSL and SPIR-V through `naga`'s front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct NagaReflector;

impl ShaderReflector for NagaReflector {
    fn reflect(&self, shader: &ShaderDesc) -> Result<ShaderReflection, ShaderError> {
        let module = parse_module(shader)?;
        reflect_module(&module, shader)
    }
}

pub(crate) fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Compute => naga::ShaderStage::Compute,
    }
}

/// Parses `shader` into a `naga` module. Parse errors become
/// [`ShaderError::CompilationFailed`] carrying the front end's message.
pub(crate) fn parse_module(shader: &ShaderDesc) -> Result<naga::Module, ShaderError> {
    let failed = |log: String| ShaderError::CompilationFailed {
        label: shader.debug_name.clone(),
        log,
    };
    match &shader.source {
        ShaderSource::Glsl(source) => {
            let options = naga::front::glsl::Options::from(naga_stage(shader.stage));
            naga::front::glsl::Frontend::default()
                .parse(&options, source)
                .map_err(|e| failed(e.emit_to_string(source)))
        }
        ShaderSource::Wgsl(source) => {
            naga::front::wgsl::parse_str(source).map_err(|e| failed(e.emit_to_string(source)))
        }
        ShaderSource::SpirV(words) => {
            naga::front::spv::parse_u8_slice(bytemuck::cast_slice(words), &naga::front::spv::Options::default())
                .map_err(|e| failed(e.to_string()))
        }
    }
}

fn entry_point<'m>(module: &'m naga::Module, shader: &ShaderDesc) -> Option<&'m naga::EntryPoint> {
    let stage = naga_stage(shader.stage);
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == shader.entry_point)
        .or_else(|| module.entry_points.iter().find(|ep| ep.stage == stage))
}

fn location_of(binding: Option<&naga::Binding>) -> Option<u32> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

fn vertex_inputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<ShaderInput> {
    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        if let Some(location) = location_of(argument.binding.as_ref()) {
            inputs.push(ShaderInput {
                location,
                name: argument.name.clone(),
            });
            continue;
        }
        if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
            for member in members {
                if let Some(location) = location_of(member.binding.as_ref()) {
                    inputs.push(ShaderInput {
                        location,
                        name: member.name.clone(),
                    });
                }
            }
        }
    }
    inputs.sort_by_key(|i| i.location);
    inputs
}

fn uniform_block(module: &naga::Module, var: &naga::GlobalVariable, rb: &naga::ResourceBinding) -> UniformBlock {
    let ty = &module.types[var.ty];
    let size = ty.inner.size(module.to_ctx());
    let members = match &ty.inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| {
                Some(UniformMember {
                    name: m.name.clone()?,
                    offset: m.offset,
                    size: module.types[m.ty].inner.size(module.to_ctx()),
                })
            })
            .collect(),
        _ => var
            .name
            .iter()
            .map(|name| UniformMember {
                name: name.clone(),
                offset: 0,
                size,
            })
            .collect(),
    };
    UniformBlock {
        name: ty.name.clone().or_else(|| var.name.clone()),
        set: rb.group,
        binding: rb.binding,
        size,
        members,
    }
}

/// Extracts inputs, uniform blocks and resource bindings of one stage.
pub(crate) fn reflect_module(module: &naga::Module, shader: &ShaderDesc) -> Result<ShaderReflection, ShaderError> {
    let entry = entry_point(module, shader).ok_or_else(|| ShaderError::InvalidEntryPoint {
        label: shader.debug_name.clone(),
        entry_point: shader.entry_point.clone(),
    })?;

    let mut reflection = ShaderReflection::default();
    if shader.stage == ShaderStage::Vertex {
        reflection.inputs = vertex_inputs(module, entry);
    }

    let stages = ShaderStageFlags::of(shader.stage);
    for (_, var) in module.global_variables.iter() {
        let Some(rb) = var.binding.as_ref() else {
            continue;
        };
        let kind = match var.space {
            naga::AddressSpace::Uniform => {
                reflection.uniform_blocks.push(uniform_block(module, var, rb));
                BindingKind::UniformBuffer
            }
            naga::AddressSpace::Storage { .. } => BindingKind::StorageBuffer,
            naga::AddressSpace::Handle => match module.types[var.ty].inner {
                naga::TypeInner::Image { .. } => BindingKind::Texture,
                naga::TypeInner::Sampler { .. } => BindingKind::Sampler,
                _ => continue,
            },
            _ => continue,
        };
        reflection.bindings.push(ReflectedBinding {
            name: var.name.clone(),
            set: rb.group,
            binding: rb.binding,
            kind,
            stages,
        });
    }
    log::trace!(
        "NagaReflector: '{}' has {} inputs, {} bindings",
        shader.debug_name,
        reflection.inputs.len(),
        reflection.bindings.len()
    );
    Ok(reflection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{PipelineDesc, ShaderStage};

    const VERTEX: &str = r#"
struct Globals {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> globals: Globals;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = globals.mvp * vec4<f32>(input.position, 1.0);
    out.uv = input.uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
struct Globals {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv) * globals.tint;
}
"#;

    #[test]
    fn wgsl_vertex_stage_reflects_inputs_and_block_layout() {
        let desc = ShaderDesc::wgsl("vs", ShaderStage::Vertex, VERTEX, "vs_main");
        let reflection = NagaReflector.reflect(&desc).unwrap();
        let locations: Vec<u32> = reflection.inputs.iter().map(|i| i.location).collect();
        assert_eq!(locations, vec![0, 1]);
        let block = &reflection.uniform_blocks[0];
        assert_eq!(block.name.as_deref(), Some("Globals"));
        assert_eq!(block.size, 80);
        assert_eq!(block.member("tint").map(|m| m.offset), Some(64));
    }

    #[test]
    fn pipeline_reflection_merges_stages() {
        let desc = PipelineDesc::new("lit")
            .with_shader(ShaderDesc::wgsl("vs", ShaderStage::Vertex, VERTEX, "vs_main"))
            .with_shader(ShaderDesc::wgsl("fs", ShaderStage::Fragment, FRAGMENT, "fs_main"));
        let reflection = NagaReflector.reflect_pipeline(&desc).unwrap();
        assert_eq!(reflection.inputs.len(), 2);
        assert_eq!(reflection.uniform_blocks.len(), 1);
        assert_eq!(reflection.bindings.len(), 3);
        let globals = reflection.bindings.iter().find(|b| b.binding == 0).unwrap();
        assert_eq!(globals.stages, ShaderStageFlags::VERTEX_FRAGMENT);
        let texture = reflection.bindings.iter().find(|b| b.binding == 1).unwrap();
        assert_eq!(texture.kind, BindingKind::Texture);
        assert_eq!(texture.stages, ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn glsl_blocks_are_reflected() {
        let source = r#"#version 450
layout(location = 0) in vec3 a_position;
layout(std140, binding = 0) uniform Camera {
    mat4 u_view_proj;
    float u_time;
};
void main() {
    gl_Position = u_view_proj * vec4(a_position, u_time);
}
"#;
        let reflection = NagaReflector
            .reflect(&ShaderDesc::glsl("glsl-vs", ShaderStage::Vertex, source))
            .unwrap();
        assert_eq!(reflection.inputs.len(), 1);
        let (block, member) = reflection.find_uniform("u_time").unwrap();
        assert_eq!(block.name.as_deref(), Some("Camera"));
        assert_eq!(member.offset, 64);
    }

    #[test]
    fn parse_errors_become_compilation_failures() {
        let desc = ShaderDesc::wgsl("broken", ShaderStage::Vertex, "fn vs_main( {", "vs_main");
        assert!(matches!(
            NagaReflector.reflect(&desc),
            Err(ShaderError::CompilationFailed { .. })
        ));
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let desc = ShaderDesc::wgsl("fs-as-vs", ShaderStage::Vertex, FRAGMENT, "vs_main");
        assert!(matches!(
            NagaReflector.reflect(&desc),
            Err(ShaderError::InvalidEntryPoint { .. })
        ));
    }
}

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

//! Shaders and pipelines shared by the integration tests.

#![allow(dead_code)]

use lumen_core::{Device, GraphicsApi, Pipeline, PipelineDesc, ShaderDesc, ShaderResourceLayout, ShaderStage};
use std::sync::Arc;

pub const GL_VERTEX: &str = r#"#version 450
layout(location = 0) in vec3 a_position;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
void main() {
    gl_Position = globals.u_mvp * vec4(a_position, 1.0);
}
"#;

pub const GL_FRAGMENT: &str = r#"#version 450
layout(location = 0) out vec4 o_color;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
layout(binding = 1) uniform float u_time;
void main() {
    o_color = globals.u_tint * u_time;
}
"#;

pub const WGSL_UNLIT: &str = r#"
struct Globals {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(index) - 1.0;
    return globals.mvp * vec4<f32>(x, 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, vec2<f32>(0.5, 0.5)) * globals.tint;
}
"#;

/// An unlit pipeline in the shading language `api` consumes.
pub fn unlit_desc(api: GraphicsApi) -> PipelineDesc {
    match api {
        GraphicsApi::OpenGl => PipelineDesc::new("unlit")
            .with_shader(ShaderDesc::glsl("unlit.vert", ShaderStage::Vertex, GL_VERTEX))
            .with_shader(ShaderDesc::glsl("unlit.frag", ShaderStage::Fragment, GL_FRAGMENT)),
        GraphicsApi::Dx12 | GraphicsApi::Vulkan => PipelineDesc::new("unlit")
            .with_shader(ShaderDesc::wgsl("unlit.vs", ShaderStage::Vertex, WGSL_UNLIT, "vs_main"))
            .with_shader(ShaderDesc::wgsl("unlit.fs", ShaderStage::Fragment, WGSL_UNLIT, "fs_main"))
            .with_resource_layout(
                ShaderResourceLayout::new()
                    .uniform_buffer("Globals", 0, 0)
                    .texture("albedo", 0, 1)
                    .sampler("albedo_sampler", 0, 2),
            ),
    }
}

/// Builds [`unlit_desc`] on `device` and checks that it linked.
pub fn unlit_pipeline(device: &mut dyn Device) -> Arc<Pipeline> {
    let pipeline = device.create_pipeline(&unlit_desc(device.backend_type()));
    assert!(pipeline.is_linked(), "{}", pipeline.compile_log());
    pipeline
}

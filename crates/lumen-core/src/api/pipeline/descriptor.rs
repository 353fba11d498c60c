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

//! The descriptor a pipeline is built from.

use super::layout::{ShaderResourceLayout, VertexLayout};
use super::state::RenderState;
use crate::api::shader::ShaderDesc;
use crate::api::util::{MatrixLayout, PrimitiveType, ShaderStage};
use crate::error::PipelineError;

/// A descriptor used to create a [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    /// Debug name.
    pub debug_name: String,
    /// One descriptor per stage.
    pub shaders: Vec<ShaderDesc>,
    /// Fixed-function state.
    pub render_state: RenderState,
    /// Declared resource bindings.
    pub resource_layout: ShaderResourceLayout,
    /// Vertex input layout; `None` for attribute-less draws.
    pub vertex_layout: Option<VertexLayout>,
    /// Primitive assembly.
    pub primitive_type: PrimitiveType,
    /// Majorness of matrices passed to `set_uniform`.
    pub matrix_layout: MatrixLayout,
}

impl PipelineDesc {
    /// A pipeline with default state and no declared bindings.
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            shaders: Vec::new(),
            render_state: RenderState::default(),
            resource_layout: ShaderResourceLayout::default(),
            vertex_layout: None,
            primitive_type: PrimitiveType::Triangles,
            matrix_layout: MatrixLayout::ColumnMajor,
        }
    }

    /// Adds a stage.
    pub fn with_shader(mut self, shader: ShaderDesc) -> Self {
        self.shaders.push(shader);
        self
    }

    /// Sets the fixed-function state.
    pub fn with_render_state(mut self, state: RenderState) -> Self {
        self.render_state = state;
        self
    }

    /// Sets the declared bindings.
    pub fn with_resource_layout(mut self, layout: ShaderResourceLayout) -> Self {
        self.resource_layout = layout;
        self
    }

    /// Sets the vertex input layout.
    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = Some(layout);
        self
    }

    /// Sets the primitive type.
    pub fn with_primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.primitive_type = primitive_type;
        self
    }

    /// The descriptor of `stage`, if present.
    pub fn shader(&self, stage: ShaderStage) -> Option<&ShaderDesc> {
        self.shaders.iter().find(|s| s.stage == stage)
    }

    /// Structural checks that do not need a backend: one shader per stage, a
    /// vertex stage for graphics pipelines, no duplicate bindings.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (i, shader) in self.shaders.iter().enumerate() {
            if self.shaders[..i].iter().any(|s| s.stage == shader.stage) {
                return Err(PipelineError::LinkFailed {
                    label: self.debug_name.clone(),
                    log: format!("stage {:?} is provided more than once", shader.stage),
                });
            }
        }
        let compute_only = self.shaders.len() == 1 && self.shaders[0].stage == ShaderStage::Compute;
        if !compute_only && self.shader(ShaderStage::Vertex).is_none() {
            return Err(PipelineError::MissingStage {
                label: self.debug_name.clone(),
                stage: "vertex",
            });
        }
        self.resource_layout.validate(&self.debug_name)
    }
}

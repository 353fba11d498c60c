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

//! Pipeline state objects.
//!
//! A [`Pipeline`] is one linked GPU program plus its fixed-function state. It
//! is always handed out, even when building failed: a failed pipeline reports
//! [`Pipeline::is_linked`] as `false`, keeps the compiler/linker output in
//! [`Pipeline::compile_log`], and devices skip draws while it is bound.

pub mod descriptor;
pub mod layout;
pub mod parameters;
pub mod state;

pub use self::descriptor::*;
pub use self::layout::*;
pub use self::parameters::*;
pub use self::state::*;

use super::reflection::ShaderReflection;
use super::resource::{Bindable, BindingCategory, GpuResource, NativeHandle};
use crate::threading::lock;
use std::sync::Mutex;

/// Build outcome of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// Whether every stage compiled and the program linked.
    pub linked: bool,
    /// Compiler and linker output. Non-empty when `linked` is `false`.
    pub log: String,
}

/// A compiled and linked GPU program with its render state.
#[derive(Debug)]
pub struct Pipeline {
    desc: PipelineDesc,
    native: NativeHandle,
    status: PipelineStatus,
    reflection: Option<ShaderReflection>,
    parameters: Mutex<ParameterCache>,
}

impl Pipeline {
    /// A successfully linked pipeline. `log` may carry compiler warnings.
    pub fn linked(
        desc: PipelineDesc,
        native: NativeHandle,
        reflection: Option<ShaderReflection>,
        log: String,
    ) -> Self {
        Self {
            desc,
            native,
            status: PipelineStatus { linked: true, log },
            reflection,
            parameters: Mutex::new(ParameterCache::default()),
        }
    }

    /// A pipeline whose build failed.
    pub fn failed(desc: PipelineDesc, native: NativeHandle, log: String) -> Self {
        let log = if log.trim().is_empty() {
            format!("pipeline '{}' failed to build", desc.debug_name)
        } else {
            log
        };
        Self {
            desc,
            native,
            status: PipelineStatus { linked: false, log },
            reflection: None,
            parameters: Mutex::new(ParameterCache::default()),
        }
    }

    /// The descriptor the pipeline was built from.
    pub fn desc(&self) -> &PipelineDesc {
        &self.desc
    }

    /// Whether the pipeline can be used for drawing.
    pub fn is_linked(&self) -> bool {
        self.status.linked
    }

    /// Compiler and linker output.
    pub fn compile_log(&self) -> &str {
        &self.status.log
    }

    /// Build outcome.
    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    /// Reflected interface, for backends that reflect.
    pub fn reflection(&self) -> Option<&ShaderReflection> {
        self.reflection.as_ref()
    }

    /// The fixed-function state.
    pub fn render_state(&self) -> &RenderState {
        &self.desc.render_state
    }

    /// Stores a uniform value; it is written on the next commit.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        lock(&self.parameters).set(name, value.into());
    }

    /// The cached value of a uniform.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        lock(&self.parameters).get(name)
    }

    /// Whether uniforms changed since the last commit.
    pub fn has_dirty_parameters(&self) -> bool {
        lock(&self.parameters).is_dirty()
    }

    /// Takes the changed uniforms for a commit.
    pub fn take_dirty_parameters(&self) -> Vec<(String, UniformValue)> {
        lock(&self.parameters).take_dirty()
    }

    /// Forces every cached uniform to be written again on the next commit.
    pub fn invalidate_parameters(&self) {
        lock(&self.parameters).mark_all_dirty();
    }
}

impl GpuResource for Pipeline {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

impl Bindable for Pipeline {
    fn binding_category(&self) -> BindingCategory {
        BindingCategory::Pipeline
    }
}

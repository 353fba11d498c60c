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

//! Shader stage descriptors and compiled shader objects.

use super::resource::{GpuResource, NativeHandle};
use super::util::ShaderStage;

/// Payload of a shader stage. The immediate backend consumes GLSL text, the
/// descriptor-table backend consumes WGSL or SPIR-V.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// GLSL source text.
    Glsl(String),
    /// WGSL source text.
    Wgsl(String),
    /// SPIR-V words.
    SpirV(Vec<u32>),
}

impl ShaderSource {
    /// Short name of the payload kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ShaderSource::Glsl(_) => "GLSL",
            ShaderSource::Wgsl(_) => "WGSL",
            ShaderSource::SpirV(_) => "SPIR-V",
        }
    }
}

/// A descriptor for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    /// Debug name, used in compile logs.
    pub debug_name: String,
    /// The stage this shader runs in.
    pub stage: ShaderStage,
    /// The source payload.
    pub source: ShaderSource,
    /// Entry point function; GLSL always uses `main`.
    pub entry_point: String,
}

impl ShaderDesc {
    /// A GLSL stage with a `main` entry point.
    pub fn glsl(debug_name: impl Into<String>, stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            stage,
            source: ShaderSource::Glsl(source.into()),
            entry_point: "main".to_string(),
        }
    }

    /// A WGSL stage.
    pub fn wgsl(
        debug_name: impl Into<String>,
        stage: ShaderStage,
        source: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            debug_name: debug_name.into(),
            stage,
            source: ShaderSource::Wgsl(source.into()),
            entry_point: entry_point.into(),
        }
    }

    /// A SPIR-V stage.
    pub fn spirv(
        debug_name: impl Into<String>,
        stage: ShaderStage,
        words: Vec<u32>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            debug_name: debug_name.into(),
            stage,
            source: ShaderSource::SpirV(words),
            entry_point: entry_point.into(),
        }
    }
}

/// A compiled shader stage.
#[derive(Debug)]
pub struct Shader {
    desc: ShaderDesc,
    native: NativeHandle,
}

impl Shader {
    /// Wraps a native shader compiled from `desc`.
    pub fn new(desc: ShaderDesc, native: NativeHandle) -> Self {
        Self { desc, native }
    }

    /// The descriptor the shader was compiled from.
    pub fn desc(&self) -> &ShaderDesc {
        &self.desc
    }

    /// The stage.
    pub fn stage(&self) -> ShaderStage {
        self.desc.stage
    }
}

impl GpuResource for Shader {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

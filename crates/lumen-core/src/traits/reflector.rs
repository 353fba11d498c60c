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

use crate::api::{PipelineDesc, ShaderDesc, ShaderReflection, ShaderStage};
use crate::error::ShaderError;

/// Recovers binding metadata from shader code.
pub trait ShaderReflector: Send + Sync {
    /// Reflects one stage.
    fn reflect(&self, shader: &ShaderDesc) -> Result<ShaderReflection, ShaderError>;

    /// Reflects and merges every stage of `desc`. Vertex inputs are only
    /// taken from the vertex stage.
    fn reflect_pipeline(&self, desc: &PipelineDesc) -> Result<ShaderReflection, ShaderError> {
        let mut merged = ShaderReflection::default();
        for shader in &desc.shaders {
            let mut stage = self.reflect(shader)?;
            if shader.stage != ShaderStage::Vertex {
                stage.inputs.clear();
            }
            merged.merge(stage);
        }
        Ok(merged)
    }
}

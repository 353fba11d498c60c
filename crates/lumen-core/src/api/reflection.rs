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

//! Binding metadata recovered from shader code.
//!
//! The shape is the same whatever the shader language; only the
//! [`ShaderReflector`](crate::traits::ShaderReflector) implementation differs.

use super::util::{BindingKind, ShaderStageFlags};

/// A vertex-stage input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    /// Input location.
    pub location: u32,
    /// Declared name, when the language keeps one.
    pub name: Option<String>,
}

/// A member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    /// Member name.
    pub name: String,
    /// Byte offset inside the block.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
}

/// A uniform (constant) buffer read by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    /// Block type name (`Globals` in `uniform Globals { ... }`).
    pub name: Option<String>,
    /// Descriptor set.
    pub set: u32,
    /// Binding within the set.
    pub binding: u32,
    /// Unaligned size of the block in bytes.
    pub size: u32,
    /// Members in declaration order.
    pub members: Vec<UniformMember>,
}

impl UniformBlock {
    /// Finds a member by its unqualified name.
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// An opaque or buffer binding read by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// Variable name, when present.
    pub name: Option<String>,
    /// Descriptor set.
    pub set: u32,
    /// Binding within the set.
    pub binding: u32,
    /// What the binding holds.
    pub kind: BindingKind,
    /// Stages that read the binding.
    pub stages: ShaderStageFlags,
}

/// Everything a pipeline needs to know about its shaders' interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Vertex inputs, ascending by location.
    pub inputs: Vec<ShaderInput>,
    /// Uniform blocks.
    pub uniform_blocks: Vec<UniformBlock>,
    /// All resource bindings, uniform blocks included.
    pub bindings: Vec<ReflectedBinding>,
}

impl ShaderReflection {
    /// Folds the reflection of another stage into this one. Bindings seen by
    /// both stages are merged and their visibility widened.
    pub fn merge(&mut self, other: ShaderReflection) {
        for binding in other.bindings {
            match self
                .bindings
                .iter_mut()
                .find(|b| b.set == binding.set && b.binding == binding.binding)
            {
                Some(existing) => existing.stages.widen(binding.stages),
                None => self.bindings.push(binding),
            }
        }
        for block in other.uniform_blocks {
            if !self
                .uniform_blocks
                .iter()
                .any(|b| b.set == block.set && b.binding == block.binding)
            {
                self.uniform_blocks.push(block);
            }
        }
        for input in other.inputs {
            if !self.inputs.iter().any(|i| i.location == input.location) {
                self.inputs.push(input);
            }
        }
        self.inputs.sort_by_key(|i| i.location);
    }

    /// Resolves a uniform name to its block and member.
    ///
    /// Accepts a bare member name (`u_mvp`) or a block-qualified one
    /// (`Globals.u_mvp`). Bare names match the first block declaring them.
    pub fn find_uniform(&self, name: &str) -> Option<(&UniformBlock, &UniformMember)> {
        if let Some((block_name, member_name)) = name.split_once('.') {
            return self
                .uniform_blocks
                .iter()
                .filter(|b| b.name.as_deref() == Some(block_name))
                .find_map(|b| b.member(member_name).map(|m| (b, m)));
        }
        self.uniform_blocks
            .iter()
            .find_map(|b| b.member(name).map(|m| (b, m)))
    }
}

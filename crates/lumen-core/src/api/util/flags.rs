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

//! Which shader stages read a resource binding.
//!
//! Layouts declare a visibility per binding and reflection reports the
//! stages that actually read it. A pipeline is only valid when the declared
//! visibility covers the reflected one.

use super::enums::ShaderStage;

const fn bit(stage: ShaderStage) -> u8 {
    match stage {
        ShaderStage::Vertex => 0b001,
        ShaderStage::Fragment => 0b010,
        ShaderStage::Compute => 0b100,
    }
}

/// Set of shader stages a binding is visible to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderStageFlags(u8);

impl ShaderStageFlags {
    /// Visible to no stage.
    pub const NONE: Self = Self(0);
    /// Vertex stage only.
    pub const VERTEX: Self = Self::of(ShaderStage::Vertex);
    /// Fragment stage only.
    pub const FRAGMENT: Self = Self::of(ShaderStage::Fragment);
    /// Compute stage only.
    pub const COMPUTE: Self = Self::of(ShaderStage::Compute);
    /// The graphics stages, the default for declared bindings.
    pub const VERTEX_FRAGMENT: Self = Self::VERTEX.with(ShaderStage::Fragment);

    /// Visible to `stage` only.
    pub const fn of(stage: ShaderStage) -> Self {
        Self(bit(stage))
    }

    /// This set plus `stage`.
    pub const fn with(self, stage: ShaderStage) -> Self {
        Self(self.0 | bit(stage))
    }

    /// Adds every stage of `other`. Used when two stages of a pipeline read
    /// the same binding.
    pub fn widen(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Whether `stage` is in the set.
    pub const fn sees(self, stage: ShaderStage) -> bool {
        self.0 & bit(stage) != 0
    }

    /// Whether every stage in `other` is also in this set.
    pub const fn covers(self, other: Self) -> bool {
        other.0 & !self.0 == 0
    }

    /// Whether no stage is in the set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The stages in the set, in pipeline order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |&s| self.sees(s))
    }
}

impl Default for ShaderStageFlags {
    fn default() -> Self {
        Self::VERTEX_FRAGMENT
    }
}

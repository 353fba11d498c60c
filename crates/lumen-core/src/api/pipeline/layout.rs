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

//! Declared resource bindings and vertex input layouts of a pipeline.

use crate::api::util::{BindingKind, ShaderStageFlags, VertexFormat, VertexStepMode};
use crate::error::PipelineError;

/// One named binding slot a pipeline reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBindingDesc {
    /// Name of the binding, matching the shader declaration.
    pub name: String,
    /// Descriptor set (bind group) index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// What the slot holds.
    pub kind: BindingKind,
    /// Stages that can see the slot.
    pub visibility: ShaderStageFlags,
}

/// The full list of bindings a pipeline declares, in declaration order.
///
/// Texture slot `n` of `bind_texture` refers to the `n`-th [`BindingKind::Texture`]
/// entry; the `n`-th [`BindingKind::Sampler`] entry samples it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderResourceLayout {
    /// Declared bindings.
    pub bindings: Vec<ResourceBindingDesc>,
}

impl ShaderResourceLayout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, set: u32, binding: u32, kind: BindingKind) -> Self {
        self.bindings.push(ResourceBindingDesc {
            name: name.to_string(),
            set,
            binding,
            kind,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
        });
        self
    }

    /// Declares a uniform buffer.
    pub fn uniform_buffer(self, name: &str, set: u32, binding: u32) -> Self {
        self.push(name, set, binding, BindingKind::UniformBuffer)
    }

    /// Declares a storage buffer.
    pub fn storage_buffer(self, name: &str, set: u32, binding: u32) -> Self {
        self.push(name, set, binding, BindingKind::StorageBuffer)
    }

    /// Declares a sampled texture.
    pub fn texture(self, name: &str, set: u32, binding: u32) -> Self {
        self.push(name, set, binding, BindingKind::Texture)
    }

    /// Declares a sampler.
    pub fn sampler(self, name: &str, set: u32, binding: u32) -> Self {
        self.push(name, set, binding, BindingKind::Sampler)
    }

    /// Restricts the binding declared last to `visibility`.
    pub fn visible_to(mut self, visibility: ShaderStageFlags) -> Self {
        if let Some(last) = self.bindings.last_mut() {
            last.visibility = visibility;
        }
        self
    }

    /// Looks a binding up by location.
    pub fn find(&self, set: u32, binding: u32) -> Option<&ResourceBindingDesc> {
        self.bindings.iter().find(|b| b.set == set && b.binding == binding)
    }

    /// The binding behind texture slot `slot`.
    pub fn texture_slot(&self, slot: u32) -> Option<&ResourceBindingDesc> {
        self.of_kind(BindingKind::Texture).nth(slot as usize)
    }

    /// Index of the texture slot a binding belongs to, if it is a texture or
    /// sampler binding.
    pub fn slot_of(&self, set: u32, binding: u32) -> Option<u32> {
        let target = self.find(set, binding)?;
        match target.kind {
            BindingKind::Texture | BindingKind::Sampler => self
                .of_kind(target.kind)
                .position(|b| b.set == set && b.binding == binding)
                .map(|p| p as u32),
            BindingKind::UniformBuffer | BindingKind::StorageBuffer => None,
        }
    }

    /// Number of declared texture slots.
    pub fn texture_slot_count(&self) -> u32 {
        self.of_kind(BindingKind::Texture).count() as u32
    }

    /// Iterates bindings of one kind in declaration order.
    pub fn of_kind(&self, kind: BindingKind) -> impl Iterator<Item = &ResourceBindingDesc> {
        self.bindings.iter().filter(move |b| b.kind == kind)
    }

    /// Distinct set indices, ascending.
    pub fn sets(&self) -> Vec<u32> {
        let mut sets: Vec<u32> = self.bindings.iter().map(|b| b.set).collect();
        sets.sort_unstable();
        sets.dedup();
        sets
    }

    /// Rejects duplicate `(set, binding)` pairs.
    pub fn validate(&self, label: &str) -> Result<(), PipelineError> {
        for (i, a) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|b| b.set == a.set && b.binding == a.binding) {
                return Err(PipelineError::LayoutCreationFailed(format!(
                    "pipeline '{label}' declares (set {}, binding {}) twice",
                    a.set, a.binding
                )));
            }
        }
        Ok(())
    }
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset within one vertex.
    pub offset: u64,
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    /// Bytes between consecutive elements.
    pub stride: u64,
    /// Per-vertex or per-instance stepping.
    pub step_mode: VertexStepMode,
    /// Attributes read from the buffer.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// Tightly packs `attributes` in order and derives the stride.
    pub fn packed(attributes: &[(u32, VertexFormat)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(location, format)| {
                let attribute = VertexAttribute {
                    location,
                    format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();
        Self {
            stride: offset,
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }

    /// Switches the slot to per-instance stepping.
    pub fn per_instance(mut self) -> Self {
        self.step_mode = VertexStepMode::Instance;
        self
    }
}

/// All vertex buffer slots a pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    /// Buffer slots in order.
    pub buffers: Vec<VertexBufferLayout>,
}

impl VertexLayout {
    /// A layout with a single buffer slot.
    pub fn single(buffer: VertexBufferLayout) -> Self {
        Self { buffers: vec![buffer] }
    }

    /// Finds the attribute feeding `location`.
    pub fn find_attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.buffers
            .iter()
            .flat_map(|b| b.attributes.iter())
            .find(|a| a.location == location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material_layout() -> ShaderResourceLayout {
        ShaderResourceLayout::new()
            .uniform_buffer("Globals", 0, 0)
            .texture("albedo", 0, 1)
            .sampler("albedo_sampler", 0, 2)
            .texture("normal", 1, 0)
            .sampler("normal_sampler", 1, 1)
    }

    #[test]
    fn texture_slots_follow_declaration_order() {
        let layout = material_layout();
        assert_eq!(layout.texture_slot_count(), 2);
        assert_eq!(layout.texture_slot(0).map(|b| b.name.as_str()), Some("albedo"));
        assert_eq!(layout.texture_slot(1).map(|b| b.name.as_str()), Some("normal"));
        assert!(layout.texture_slot(2).is_none());
        assert_eq!(layout.slot_of(1, 1), Some(1));
        assert_eq!(layout.slot_of(0, 0), None);
        assert_eq!(layout.sets(), vec![0, 1]);
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let layout = ShaderResourceLayout::new().texture("a", 0, 0).sampler("b", 0, 0);
        assert!(layout.validate("dup").is_err());
        assert!(material_layout().validate("ok").is_ok());
    }

    #[test]
    fn packed_layout_derives_offsets_and_stride() {
        let layout = VertexBufferLayout::packed(&[
            (0, VertexFormat::Float32x3),
            (1, VertexFormat::Float32x2),
            (2, VertexFormat::Unorm8x4),
        ]);
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 20);
        let vertex = VertexLayout::single(layout);
        assert_eq!(vertex.find_attribute(2).map(|a| a.format), Some(VertexFormat::Unorm8x4));
        assert!(vertex.find_attribute(3).is_none());
    }
}

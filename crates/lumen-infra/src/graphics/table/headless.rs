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

//! An in-memory [`TableApi`] for tests and machines without DX12.
//!
//! Objects are bookkept like a driver would, WGSL and SPIR-V are checked
//! with naga, and the same rules a debug layer enforces (descriptor kinds,
//! complete tables, draws inside passes) are recorded as validation errors
//! instead of crashing. The simulated GPU only retires work when the
//! device waits on a fence, which makes frame pacing observable.

use super::api::{
    BufferHeap, DescriptorResource, DescriptorWrite, TableApi, TableCopy, TableLimits, TablePass,
    TablePipelineDesc, BACK_BUFFER,
};
use super::conversions::buffer_heap;
use crate::graphics::reflection::{naga_stage, parse_module};
use lumen_core::{
    AdapterInfo, BindingKind, BufferDesc, DeviceConfig, DrawIndexedParams, DrawParams, IndexFormat, ResourceState,
    SamplerDesc, ScissorRect, ShaderDesc, ShaderResourceLayout, ShaderSource, ShaderStage, TextureDesc,
    TextureFormat, Viewport,
};
use std::collections::HashMap;

/// Calls a [`HeadlessTable`] has received, by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCallCounts {
    /// `draw` and `draw_indexed` calls.
    pub draws: u32,
    /// Passes opened.
    pub passes: u32,
    /// Passes opened with at least one clear.
    pub clears: u32,
    /// Recorded transitions.
    pub barriers: u32,
    /// `write_buffer` calls.
    pub buffer_writes: u32,
    /// `write_texture_rows` calls.
    pub texture_writes: u32,
    /// Descriptor tables written.
    pub descriptor_writes: u32,
    /// `set_descriptor_table` calls.
    pub table_binds: u32,
    /// `set_pipeline_state` calls.
    pub pipeline_binds: u32,
    /// Pipeline state objects created.
    pub pipeline_states: u32,
    /// `copy_texture` calls.
    pub copies: u32,
    /// `submit` calls.
    pub submits: u32,
    /// `wait_for_fence` calls.
    pub fence_waits: u32,
    /// `present` calls.
    pub presents: u32,
}

#[derive(Debug)]
enum HeadlessObject {
    Buffer(Vec<u8>),
    Texture { height: u32, row_bytes: u64 },
    Sampler,
    Module(ShaderStage),
    RootSignature(ShaderResourceLayout),
    PipelineState,
    Heap {
        root_signature: u64,
        tables: u32,
        written: HashMap<u32, Vec<DescriptorWrite>>,
    },
}

/// D3D12-shaped driver without a GPU.
#[derive(Debug)]
pub struct HeadlessTable {
    next_id: u64,
    objects: HashMap<u64, HeadlessObject>,
    heaps: HashMap<u64, BufferHeap>,
    limits: TableLimits,
    back_buffer: (u32, u32),
    pass_open: bool,
    bound_state: u64,
    submitted: u64,
    completed: u64,
    errors: Vec<String>,
    counts: TableCallCounts,
}

impl HeadlessTable {
    /// A driver with D3D12 feature level 12_0 limits. The back buffer size
    /// and the expected matrix layout come from `config`.
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            next_id: 1,
            objects: HashMap::new(),
            heaps: HashMap::new(),
            limits: TableLimits {
                max_texture_size: 16384,
                max_color_attachments: 8,
                max_vertex_attributes: 16,
                max_uniform_buffer_size: 64 * 1024,
                max_texture_slots: 16,
                constant_alignment: 256,
                supports_compute: true,
                matrix_layout: config.matrix_layout,
            },
            back_buffer: (config.width.max(1), config.height.max(1)),
            pass_open: false,
            bound_state: 0,
            submitted: 0,
            completed: 0,
            errors: Vec::new(),
            counts: TableCallCounts::default(),
        }
    }

    fn insert(&mut self, object: HeadlessObject) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    fn error(&mut self, message: String) {
        log::debug!("HeadlessTable: {message}");
        self.errors.push(message);
    }

    fn is_texture(&self, id: u64) -> bool {
        id == BACK_BUFFER || matches!(self.objects.get(&id), Some(HeadlessObject::Texture { .. }))
    }

    /// Call counters so far.
    pub fn counts(&self) -> TableCallCounts {
        self.counts
    }

    /// Validation errors recorded so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Contents of a buffer.
    pub fn buffer_contents(&self, buffer: u64) -> Option<&[u8]> {
        match self.objects.get(&buffer) {
            Some(HeadlessObject::Buffer(data)) => Some(data),
            _ => None,
        }
    }

    /// Heap a buffer was placed in.
    pub fn buffer_heap(&self, buffer: u64) -> Option<BufferHeap> {
        self.heaps.get(&buffer).copied()
    }

    /// Descriptors last written to `table` of `heap`.
    pub fn descriptor_table(&self, heap: u64, table: u32) -> Option<&[DescriptorWrite]> {
        match self.objects.get(&heap) {
            Some(HeadlessObject::Heap { written, .. }) => written.get(&table).map(Vec::as_slice),
            _ => None,
        }
    }

    /// The pipeline state object bound last.
    pub fn bound_pipeline_state(&self) -> u64 {
        self.bound_state
    }

    /// Highest fence value handed out.
    pub fn submitted_fence(&self) -> u64 {
        self.submitted
    }

    /// Highest fence value the simulated GPU has retired.
    pub fn retired_fence(&self) -> u64 {
        self.completed
    }

    /// Number of live objects of every kind.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    fn check_descriptor(&self, layout: &ShaderResourceLayout, write: &DescriptorWrite) -> Result<(), String> {
        let Some(declared) = layout.find(write.set, write.binding) else {
            return Err(format!("(set {}, binding {}) is not in the root signature", write.set, write.binding));
        };
        let (expected, object) = match write.resource {
            DescriptorResource::ConstantBuffer { buffer, .. } => (BindingKind::UniformBuffer, buffer),
            DescriptorResource::StorageBuffer(buffer) => (BindingKind::StorageBuffer, buffer),
            DescriptorResource::Texture(texture) => (BindingKind::Texture, texture),
            DescriptorResource::Sampler(sampler) => (BindingKind::Sampler, sampler),
        };
        if declared.kind != expected {
            return Err(format!(
                "'{}' is declared as {:?} but written as {expected:?}",
                declared.name, declared.kind
            ));
        }
        let valid = match (expected, self.objects.get(&object)) {
            (BindingKind::UniformBuffer | BindingKind::StorageBuffer, Some(HeadlessObject::Buffer(_))) => true,
            (BindingKind::Texture, Some(HeadlessObject::Texture { .. })) => true,
            (BindingKind::Sampler, Some(HeadlessObject::Sampler)) => true,
            _ => false,
        };
        if !valid {
            return Err(format!("'{}' points at missing object {object}", declared.name));
        }
        if let DescriptorResource::ConstantBuffer { offset, .. } = write.resource {
            if offset % self.limits.constant_alignment as u64 != 0 {
                return Err(format!("'{}' constant view at unaligned offset {offset}", declared.name));
            }
        }
        Ok(())
    }
}

impl TableApi for HeadlessTable {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            device_name: "Headless D3D12".to_string(),
            vendor_name: "lumen".to_string(),
            driver_version: "12.0 (headless)".to_string(),
        }
    }

    fn limits(&self) -> TableLimits {
        self.limits
    }

    fn back_buffer_format(&self) -> TextureFormat {
        TextureFormat::Bgra8Unorm
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.back_buffer
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.back_buffer = (width.max(1), height.max(1));
    }

    // --- Resources ---

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<u64, String> {
        let mut contents = vec![0; desc.size as usize];
        if let Some(data) = &desc.initial_data {
            let len = data.len().min(contents.len());
            contents[..len].copy_from_slice(&data[..len]);
        }
        let id = self.insert(HeadlessObject::Buffer(contents));
        self.heaps.insert(id, buffer_heap(desc.usage));
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: u64, offset: u64, data: &[u8]) {
        self.counts.buffer_writes += 1;
        let range = offset as usize..offset as usize + data.len();
        let written = match self.objects.get_mut(&buffer) {
            Some(HeadlessObject::Buffer(contents)) => contents
                .get_mut(range)
                .map(|dst| dst.copy_from_slice(data))
                .is_some(),
            _ => false,
        };
        if !written {
            self.error(format!("write of {} bytes at {offset} outside buffer {buffer}", data.len()));
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<u64, String> {
        if desc.width > self.limits.max_texture_size || desc.height > self.limits.max_texture_size {
            return Err(format!("{}x{} exceeds the adapter limit", desc.width, desc.height));
        }
        Ok(self.insert(HeadlessObject::Texture {
            height: desc.height,
            row_bytes: desc.width as u64 * desc.format.bytes_per_pixel() as u64,
        }))
    }

    fn write_texture_rows(&mut self, texture: u64, y: u32, rows: u32, data: &[u8]) {
        self.counts.texture_writes += 1;
        let fits = match self.objects.get(&texture) {
            Some(HeadlessObject::Texture { height, row_bytes }) => {
                y + rows <= *height && data.len() as u64 == rows as u64 * row_bytes
            }
            _ => false,
        };
        if !fits {
            self.error(format!("rows {y}..{} do not fit texture {texture}", y + rows));
        }
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<u64, String> {
        Ok(self.insert(HeadlessObject::Sampler))
    }

    fn destroy(&mut self, object: u64) {
        if self.objects.remove(&object).is_none() {
            self.error(format!("destroy of unknown object {object}"));
        }
        self.heaps.remove(&object);
    }

    // --- Pipelines ---

    fn compile_module(&mut self, shader: &ShaderDesc) -> Result<u64, String> {
        if matches!(shader.source, ShaderSource::Glsl(_)) {
            return Err("GLSL is not accepted; provide WGSL or SPIR-V".to_string());
        }
        let module = parse_module(shader).map_err(|e| e.to_string())?;
        let stage = naga_stage(shader.stage);
        if !module
            .entry_points
            .iter()
            .any(|ep| ep.stage == stage && ep.name == shader.entry_point)
        {
            return Err(format!("no {:?} entry point named '{}'", shader.stage, shader.entry_point));
        }
        Ok(self.insert(HeadlessObject::Module(shader.stage)))
    }

    fn create_root_signature(&mut self, label: &str, layout: &ShaderResourceLayout) -> Result<u64, String> {
        layout.validate(label).map_err(|e| e.to_string())?;
        Ok(self.insert(HeadlessObject::RootSignature(layout.clone())))
    }

    fn create_pipeline_state(&mut self, desc: &TablePipelineDesc<'_>) -> Result<u64, String> {
        if !matches!(self.objects.get(&desc.root_signature), Some(HeadlessObject::RootSignature(_))) {
            return Err(format!("'{}': unknown root signature {}", desc.label, desc.root_signature));
        }
        for stage in desc.stages {
            match self.objects.get(&stage.module) {
                Some(HeadlessObject::Module(compiled)) if *compiled == stage.stage => {}
                _ => return Err(format!("'{}': module {} is not a {:?} stage", desc.label, stage.module, stage.stage)),
            }
        }
        if !desc.stages.iter().any(|s| s.stage == ShaderStage::Vertex) {
            return Err(format!("'{}': no vertex stage", desc.label));
        }
        if desc.targets.colors.len() as u32 > self.limits.max_color_attachments {
            return Err(format!("'{}': too many color targets", desc.label));
        }
        self.counts.pipeline_states += 1;
        Ok(self.insert(HeadlessObject::PipelineState))
    }

    fn create_descriptor_heap(&mut self, root_signature: u64, tables: u32) -> Result<u64, String> {
        if !matches!(self.objects.get(&root_signature), Some(HeadlessObject::RootSignature(_))) {
            return Err(format!("unknown root signature {root_signature}"));
        }
        Ok(self.insert(HeadlessObject::Heap {
            root_signature,
            tables,
            written: HashMap::new(),
        }))
    }

    fn write_descriptor_table(&mut self, heap: u64, table: u32, writes: &[DescriptorWrite]) {
        self.counts.descriptor_writes += 1;
        let (root_signature, tables) = match self.objects.get(&heap) {
            Some(HeadlessObject::Heap {
                root_signature, tables, ..
            }) => (*root_signature, *tables),
            _ => return self.error(format!("write to unknown heap {heap}")),
        };
        if table >= tables {
            return self.error(format!("table {table} outside heap {heap} of {tables}"));
        }
        let Some(HeadlessObject::RootSignature(layout)) = self.objects.get(&root_signature) else {
            return self.error(format!("heap {heap} outlived its root signature"));
        };
        let mut problems: Vec<String> = writes
            .iter()
            .filter_map(|w| self.check_descriptor(layout, w).err())
            .collect();
        for declared in &layout.bindings {
            if !writes.iter().any(|w| w.set == declared.set && w.binding == declared.binding) {
                problems.push(format!("'{}' left empty in table {table}", declared.name));
            }
        }
        for problem in problems {
            self.error(problem);
        }
        if let Some(HeadlessObject::Heap { written, .. }) = self.objects.get_mut(&heap) {
            written.insert(table, writes.to_vec());
        }
    }

    // --- Recording ---

    fn begin_pass(&mut self, pass: &TablePass<'_>) {
        self.pass_open = true;
        self.bound_state = 0;
        self.counts.passes += 1;
        if pass.clear.is_some_and(|c| c.clears_anything()) {
            self.counts.clears += 1;
        }
        let missing: Vec<u64> = pass
            .colors
            .iter()
            .copied()
            .chain(pass.depth)
            .filter(|id| !self.is_texture(*id))
            .collect();
        for id in missing {
            self.error(format!("pass '{}' targets missing texture {id}", pass.label));
        }
    }

    fn end_pass(&mut self) {
        if !self.pass_open {
            self.error("end_pass without an open pass".to_string());
        }
        self.pass_open = false;
    }

    fn transition(&mut self, texture: u64, before: ResourceState, after: ResourceState) {
        self.counts.barriers += 1;
        if before == after {
            self.error(format!("redundant transition of {texture} to {after:?}"));
        }
        if !self.is_texture(texture) {
            self.error(format!("transition of missing texture {texture}"));
        }
    }

    fn set_pipeline_state(&mut self, pipeline_state: u64) {
        self.counts.pipeline_binds += 1;
        if !self.pass_open {
            self.error("pipeline state bound outside a pass".to_string());
        }
        if !matches!(self.objects.get(&pipeline_state), Some(HeadlessObject::PipelineState)) {
            self.error(format!("unknown pipeline state {pipeline_state}"));
        }
        self.bound_state = pipeline_state;
    }

    fn set_descriptor_table(&mut self, heap: u64, table: u32) {
        self.counts.table_binds += 1;
        if self.descriptor_table(heap, table).is_none() {
            self.error(format!("table {table} of heap {heap} bound before it was written"));
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: u64) {
        if self.buffer_contents(buffer).is_none() {
            self.error(format!("vertex slot {slot} bound to missing buffer {buffer}"));
        }
    }

    fn set_index_buffer(&mut self, buffer: u64, _format: IndexFormat) {
        if self.buffer_contents(buffer).is_none() {
            self.error(format!("index buffer {buffer} is missing"));
        }
    }

    fn set_viewport(&mut self, _viewport: &Viewport) {}

    fn set_scissor(&mut self, _rect: &ScissorRect) {}

    fn draw(&mut self, _params: &DrawParams) {
        self.counts.draws += 1;
        if !self.pass_open || self.bound_state == 0 {
            self.error("draw without a pass and pipeline state".to_string());
        }
    }

    fn draw_indexed(&mut self, _params: &DrawIndexedParams) {
        self.counts.draws += 1;
        if !self.pass_open || self.bound_state == 0 {
            self.error("indexed draw without a pass and pipeline state".to_string());
        }
    }

    fn copy_texture(&mut self, copy: &TableCopy) {
        self.counts.copies += 1;
        if self.pass_open {
            self.error("copy inside a render pass".to_string());
        }
        if !self.is_texture(copy.source) || !self.is_texture(copy.destination) {
            self.error(format!("copy between {} and {} references a missing texture", copy.source, copy.destination));
        }
    }

    // --- Submission ---

    fn submit(&mut self) -> u64 {
        self.pass_open = false;
        self.counts.submits += 1;
        self.submitted += 1;
        self.submitted
    }

    fn completed_fence(&mut self) -> u64 {
        self.completed
    }

    fn wait_for_fence(&mut self, value: u64) {
        self.counts.fence_waits += 1;
        self.completed = self.completed.max(value.min(self.submitted));
    }

    fn present(&mut self) {
        self.counts.presents += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{BufferType, BufferUsage, GraphicsApi};

    const WGSL: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

    fn driver() -> HeadlessTable {
        HeadlessTable::new(&DeviceConfig::headless(GraphicsApi::Dx12))
    }

    #[test]
    fn modules_need_a_matching_entry_point() {
        let mut api = driver();
        let ok = ShaderDesc::wgsl("ok", ShaderStage::Vertex, WGSL, "vs_main");
        assert!(api.compile_module(&ok).is_ok());
        let wrong = ShaderDesc::wgsl("wrong", ShaderStage::Vertex, WGSL, "main");
        assert!(api.compile_module(&wrong).unwrap_err().contains("entry point"));
        let glsl = ShaderDesc::glsl("glsl", ShaderStage::Vertex, "void main() {}");
        assert!(api.compile_module(&glsl).unwrap_err().contains("GLSL"));
    }

    #[test]
    fn buffers_are_placed_by_update_frequency() {
        let mut api = driver();
        let vertices = api
            .create_buffer(&BufferDesc::new("vertices", BufferType::Vertex, 64))
            .unwrap();
        let particles = api
            .create_buffer(&BufferDesc::new("particles", BufferType::Vertex, 64).usage(BufferUsage::Stream))
            .unwrap();
        assert_eq!(api.buffer_heap(vertices), Some(BufferHeap::Default));
        assert_eq!(api.buffer_heap(particles), Some(BufferHeap::Upload));
        api.destroy(particles);
        assert_eq!(api.buffer_heap(particles), None);
    }

    #[test]
    fn fences_retire_only_when_waited_on() {
        let mut api = driver();
        let fence = api.submit();
        assert_eq!(fence, 1);
        assert_eq!(api.completed_fence(), 0);
        api.wait_for_fence(fence);
        assert_eq!(api.completed_fence(), 1);
        api.wait_for_fence(9);
        assert_eq!(api.completed_fence(), 1);
    }

    #[test]
    fn descriptor_kinds_are_checked_against_the_root_signature() {
        let mut api = driver();
        let layout = ShaderResourceLayout::new().uniform_buffer("Globals", 0, 0).texture("albedo", 0, 1);
        let root = api.create_root_signature("test", &layout).unwrap();
        let heap = api.create_descriptor_heap(root, 4).unwrap();
        let buffer = api
            .create_buffer(&BufferDesc::new("constants", BufferType::Uniform, 256))
            .unwrap();

        api.write_descriptor_table(
            heap,
            0,
            &[DescriptorWrite {
                set: 0,
                binding: 1,
                resource: DescriptorResource::ConstantBuffer {
                    buffer,
                    offset: 0,
                    size: 256,
                },
            }],
        );
        let errors = api.errors().join("\n");
        assert!(errors.contains("declared as Texture"), "{errors}");
        assert!(errors.contains("'Globals' left empty"), "{errors}");
        api.write_descriptor_table(heap, 9, &[]);
        assert!(api.errors().last().unwrap().contains("outside heap"));
    }
}

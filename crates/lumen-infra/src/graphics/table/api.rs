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

//! The descriptor-table model the deferred backend drives.
//!
//! Everything the device creates is an opaque `u64` owned by the driver.
//! The shape follows D3D12: shaders compile into modules, a root signature
//! describes the declared bindings, pipeline state objects bake the render
//! state and target formats, and descriptor heaps hold tables that are
//! written and bound per draw. Work is recorded into passes and retired by
//! monotonically increasing fence values.

use lumen_core::{
    AdapterInfo, BufferDesc, ClearParams, DrawIndexedParams, DrawParams, IndexFormat, MatrixLayout, PrimitiveType,
    RenderState, ResourceState, SamplerDesc, ScissorRect, ShaderDesc, ShaderResourceLayout, ShaderStage,
    TextureDesc, TextureFormat, VertexLayout, Viewport,
};

/// Object id standing for the swap chain's current back buffer wherever a
/// texture is expected. Drivers never allocate it.
pub const BACK_BUFFER: u64 = 0;

/// Memory a buffer is placed in, chosen from its update frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferHeap {
    /// GPU-local memory, filled through a copy when created.
    Default,
    /// CPU-visible memory rewritten through queue writes.
    Upload,
}

/// Limits reported by a [`TableApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    /// Largest texture edge.
    pub max_texture_size: u32,
    /// Color targets per pass.
    pub max_color_attachments: u32,
    /// Vertex attributes per pipeline.
    pub max_vertex_attributes: u32,
    /// Largest constant buffer view.
    pub max_uniform_buffer_size: u32,
    /// Texture bindings visible to one pipeline.
    pub max_texture_slots: u32,
    /// Alignment of constant buffer views.
    pub constant_alignment: u32,
    /// Whether compute pipelines are available.
    pub supports_compute: bool,
    /// Matrix layout shaders expect in constant buffers.
    pub matrix_layout: MatrixLayout,
}

/// Attachment formats a pipeline state object is built against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TargetFormats {
    /// One format per color attachment.
    pub colors: Vec<TextureFormat>,
    /// Depth attachment format.
    pub depth: Option<TextureFormat>,
}

/// A compiled stage of a pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStage<'a> {
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Module returned by [`TableApi::compile_module`].
    pub module: u64,
    /// Entry point inside the module.
    pub entry_point: &'a str,
}

/// Everything baked into a pipeline state object.
#[derive(Debug, Clone, Copy)]
pub struct TablePipelineDesc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Root signature the state object binds against.
    pub root_signature: u64,
    /// Compiled stages.
    pub stages: &'a [TableStage<'a>],
    /// Vertex input, if the pipeline reads vertex buffers.
    pub vertex_layout: Option<&'a VertexLayout>,
    /// Primitive topology.
    pub primitive: PrimitiveType,
    /// Fixed-function state.
    pub render_state: RenderState,
    /// Attachment formats.
    pub targets: &'a TargetFormats,
}

/// The view a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    /// A constant buffer view over part of a buffer.
    ConstantBuffer {
        /// Buffer object.
        buffer: u64,
        /// Byte offset, a multiple of the constant alignment.
        offset: u64,
        /// Bytes visible to the shader.
        size: u64,
    },
    /// A whole buffer bound for storage access.
    StorageBuffer(u64),
    /// A shader resource view of a texture.
    Texture(u64),
    /// A sampler object.
    Sampler(u64),
}

/// One descriptor of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    /// Descriptor set (root table) index.
    pub set: u32,
    /// Binding inside the set.
    pub binding: u32,
    /// The view.
    pub resource: DescriptorResource,
}

/// Targets and load operations of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct TablePass<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Color attachments, [`BACK_BUFFER`] for the swap chain.
    pub colors: &'a [u64],
    /// Depth attachment.
    pub depth: Option<u64>,
    /// Clear values; attachments not cleared are loaded.
    pub clear: Option<&'a ClearParams>,
}

/// A one-to-one texel copy between two textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCopy {
    /// Source texture or [`BACK_BUFFER`].
    pub source: u64,
    /// Destination texture or [`BACK_BUFFER`].
    pub destination: u64,
    /// Top-left texel read.
    pub source_origin: (u32, u32),
    /// Top-left texel written.
    pub destination_origin: (u32, u32),
    /// Copied width.
    pub width: u32,
    /// Copied height.
    pub height: u32,
}

/// Native entry points used by [`TableDevice`](super::TableDevice).
///
/// Creation calls return the driver's message on failure. Recording calls
/// are fire-and-forget; misuse is reported through the driver's own
/// validation.
pub trait TableApi {
    /// Adapter name, vendor and driver.
    fn adapter_info(&self) -> AdapterInfo;

    /// Device limits.
    fn limits(&self) -> TableLimits;

    /// Format of the swap chain.
    fn back_buffer_format(&self) -> TextureFormat;

    /// Size of the swap chain.
    fn back_buffer_size(&self) -> (u32, u32);

    /// Resizes the swap chain.
    fn resize(&mut self, width: u32, height: u32);

    // --- Resources ---

    /// Creates a buffer with its initial contents.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<u64, String>;

    /// Schedules a write into a buffer before the next submission.
    fn write_buffer(&mut self, buffer: u64, offset: u64, data: &[u8]);

    /// Creates a texture with its initial contents.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<u64, String>;

    /// Overwrites `rows` full rows of level 0 starting at row `y`.
    fn write_texture_rows(&mut self, texture: u64, y: u32, rows: u32, data: &[u8]);

    /// Creates a sampler.
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<u64, String>;

    /// Destroys any object created by this driver.
    fn destroy(&mut self, object: u64);

    // --- Pipelines ---

    /// Compiles one WGSL or SPIR-V stage.
    fn compile_module(&mut self, shader: &ShaderDesc) -> Result<u64, String>;

    /// Builds a root signature with one descriptor per declared binding.
    fn create_root_signature(&mut self, label: &str, layout: &ShaderResourceLayout) -> Result<u64, String>;

    /// Builds a pipeline state object.
    fn create_pipeline_state(&mut self, desc: &TablePipelineDesc<'_>) -> Result<u64, String>;

    /// Allocates a heap of `tables` descriptor tables for a root signature.
    fn create_descriptor_heap(&mut self, root_signature: u64, tables: u32) -> Result<u64, String>;

    /// Fills table `table` of `heap`.
    fn write_descriptor_table(&mut self, heap: u64, table: u32, writes: &[DescriptorWrite]);

    // --- Recording ---

    /// Opens a render pass, closing any open one.
    fn begin_pass(&mut self, pass: &TablePass<'_>);

    /// Closes the open render pass.
    fn end_pass(&mut self);

    /// Records a state transition.
    fn transition(&mut self, texture: u64, before: ResourceState, after: ResourceState);

    /// Binds a pipeline state object.
    fn set_pipeline_state(&mut self, pipeline_state: u64);

    /// Binds table `table` of `heap` to the root signature's sets.
    fn set_descriptor_table(&mut self, heap: u64, table: u32);

    /// Binds a whole buffer to a vertex input slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: u64);

    /// Binds an index buffer.
    fn set_index_buffer(&mut self, buffer: u64, format: IndexFormat);

    /// Sets the viewport, top-left origin.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Sets the scissor rectangle, top-left origin.
    fn set_scissor(&mut self, rect: &ScissorRect);

    /// Non-indexed draw.
    fn draw(&mut self, params: &DrawParams);

    /// Indexed draw.
    fn draw_indexed(&mut self, params: &DrawIndexedParams);

    /// Copies texels between textures outside any pass.
    fn copy_texture(&mut self, copy: &TableCopy);

    // --- Submission ---

    /// Closes and executes the recorded work, returning the fence value
    /// signaled once it completes.
    fn submit(&mut self) -> u64;

    /// Highest fence value known to be reached.
    fn completed_fence(&mut self) -> u64;

    /// Blocks until `value` is reached.
    fn wait_for_fence(&mut self, value: u64);

    /// Presents the back buffer rendered since the last present.
    fn present(&mut self);
}

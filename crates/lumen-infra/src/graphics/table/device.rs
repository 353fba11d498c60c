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

//! The deferred backend device.

use super::api::{
    DescriptorResource, DescriptorWrite, TableApi, TableCopy, TableLimits, TablePass, TablePipelineDesc, TableStage,
    TargetFormats, BACK_BUFFER,
};
use super::barrier::StateTracker;
use super::frame::FrameResources;
use super::headless::HeadlessTable;
use super::heap::HeapRegions;
use crate::graphics::reflection::NagaReflector;
use anyhow::{anyhow, Result};
use lumen_core::{
    align_up, AdapterInfo, BindingKind, BlitParams, Buffer, BufferDesc, BufferType, ClearParams, CommandBuffer,
    CullMode, Device, DeviceConfig, DrawIndexedParams, DrawParams, FrameTracker, Framebuffer, FramebufferDesc,
    GpuResource, GraphicsApi, GraphicsCapabilities, NativeHandle, Pipeline, PipelineDesc, PipelineError,
    PrimitiveType, RecordingError, ReleaseQueue, ReleasedResource, RenderPassParams, RenderState, RenderStats,
    ResourceError, ResourceKind, ResourceState, SamplerDesc, ScissorRect, Shader, ShaderDesc, ShaderError,
    ShaderReflection, ShaderReflector, ShaderSource, ShaderStage, Texture, TextureDesc, TextureFilter,
    TextureFormat, TextureType, Uploadable, VertexArray, VertexArrayDesc, Viewport, WindowSurface,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

const BACKEND: &str = "Direct3D 12";
const NULL_BUFFER_SIZE: u64 = 256;

/// CPU shadow of a uniform block and the ring view holding its last upload.
#[derive(Debug)]
struct ConstantBlock {
    set: u32,
    binding: u32,
    data: Vec<u8>,
    /// `(frame serial, offset, size)` of the last upload.
    view: Option<(u64, u64, u64)>,
    stale: bool,
}

/// Native objects behind one linked pipeline.
#[derive(Debug)]
struct PipelineObjects {
    root_signature: u64,
    heap: u64,
    regions: HeapRegions,
    modules: Vec<(ShaderStage, u64, String)>,
    states: HashMap<(TargetFormats, RenderState), u64>,
    blocks: Vec<ConstantBlock>,
}

#[derive(Debug)]
struct PassState {
    formats: TargetFormats,
    size: (u32, u32),
    explicit: bool,
}

fn is_triangles(primitive: PrimitiveType) -> bool {
    match primitive {
        PrimitiveType::Triangles | PrimitiveType::TriangleStrip => true,
        PrimitiveType::Points | PrimitiveType::Lines | PrimitiveType::LineStrip => false,
    }
}

fn capabilities(limits: &TableLimits) -> GraphicsCapabilities {
    GraphicsCapabilities {
        api: GraphicsApi::Dx12,
        max_texture_size: limits.max_texture_size,
        max_color_attachments: limits.max_color_attachments,
        max_vertex_attributes: limits.max_vertex_attributes,
        max_uniform_buffer_size: limits.max_uniform_buffer_size,
        constant_buffer_alignment: limits.constant_alignment,
        max_texture_slots: limits.max_texture_slots,
        supports_multithreading: true,
        supports_compute: limits.supports_compute,
        matrix_layout: limits.matrix_layout,
    }
}

/// Checks reflected shader interfaces against the declared layouts.
fn check_interface(desc: &PipelineDesc, reflection: &ShaderReflection) -> Result<(), PipelineError> {
    for input in &reflection.inputs {
        let declared = desc
            .vertex_layout
            .as_ref()
            .is_some_and(|layout| layout.find_attribute(input.location).is_some());
        if !declared {
            return Err(PipelineError::MissingVertexInput {
                label: desc.debug_name.clone(),
                location: input.location,
                name: input.name.clone(),
            });
        }
    }
    for binding in &reflection.bindings {
        let Some(declared) = desc.resource_layout.find(binding.set, binding.binding) else {
            return Err(PipelineError::UndeclaredBinding {
                label: desc.debug_name.clone(),
                set: binding.set,
                binding: binding.binding,
            });
        };
        if declared.kind != binding.kind {
            return Err(PipelineError::LayoutCreationFailed(format!(
                "pipeline '{}': '{}' is declared as {:?} but the shader uses {:?}",
                desc.debug_name, declared.name, declared.kind, binding.kind
            )));
        }
        if !declared.visibility.covers(binding.stages) {
            return Err(PipelineError::LayoutCreationFailed(format!(
                "pipeline '{}': '{}' is visible to {:?} but read by {:?}",
                desc.debug_name,
                declared.name,
                declared.visibility.stages().collect::<Vec<_>>(),
                binding.stages.stages().collect::<Vec<_>>()
            )));
        }
    }
    Ok(())
}

/// Deferred device over any [`TableApi`].
///
/// Draws are recorded into passes opened on demand and submitted on
/// `flush`/`present`. The device keeps `frames_in_flight` frame slots, each
/// with a fence value, a constant ring and the objects released while it
/// recorded; a slot is reused only after its fence has completed. Texture
/// states are tracked so transitions are recorded only on change, and
/// descriptor tables are written from the current bindings right before
/// every draw.
pub struct TableDevice<T: TableApi> {
    api: T,
    window: Option<Arc<dyn WindowSurface>>,
    info: AdapterInfo,
    caps: GraphicsCapabilities,
    stats: RenderStats,
    frame: FrameTracker,
    releases: ReleaseQueue,
    reflector: NagaReflector,

    frames: Vec<FrameResources>,
    frame_serial: u64,
    frame_index: usize,
    max_draws_per_pipeline: u32,
    back_buffer_size: (u32, u32),

    white_texture: Arc<Texture>,
    default_sampler: u64,
    null_constants: u64,
    null_storage: u64,
    samplers: HashMap<SamplerDesc, u64>,
    tracker: StateTracker,
    pipelines: HashMap<u64, PipelineObjects>,
    next_local: u64,

    current_pipeline: Option<Arc<Pipeline>>,
    current_vertex_array: Option<Arc<VertexArray>>,
    current_framebuffer: Option<Arc<Framebuffer>>,
    bound_textures: Vec<Option<Arc<Texture>>>,
    render_state: RenderState,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    pass: Option<PassState>,
    bound_state: u64,
    vertex_input_applied: bool,
    dynamic_state_dirty: bool,
    recorded: bool,

    tracked_buffers: Vec<Weak<Buffer>>,
    tracked_textures: Vec<Weak<Texture>>,
}

impl<T: TableApi> std::fmt::Debug for TableDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDevice")
            .field("info", &self.info)
            .field("phase", &self.frame.phase())
            .field("frame_index", &self.frame_index)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TableDevice<HeadlessTable> {
    /// A device over the in-memory driver.
    pub fn headless(config: &DeviceConfig) -> Result<Self> {
        Self::new(HeadlessTable::new(config), None, config)
    }
}

impl<T: TableApi> TableDevice<T> {
    /// Wraps a driver. `window`, when given, is polled for its size at every
    /// `begin_frame`.
    pub fn new(mut api: T, window: Option<Arc<dyn WindowSurface>>, config: &DeviceConfig) -> Result<Self> {
        let info = api.adapter_info();
        let limits = api.limits();
        let caps = capabilities(&limits);
        if let Some(window) = &window {
            let (width, height) = window.framebuffer_size();
            api.resize(width, height);
        }
        let back_buffer_size = api.back_buffer_size();

        let mut frames = Vec::with_capacity(config.frame_count());
        for index in 0..config.frame_count() {
            let ring = BufferDesc::new(
                format!("lumen.constants.{index}"),
                BufferType::Uniform,
                config.constant_ring_size,
            );
            let buffer = api
                .create_buffer(&ring)
                .map_err(|e| anyhow!("TableDevice: failed to create constant ring {index}: {e}"))?;
            frames.push(FrameResources::new(
                buffer,
                config.constant_ring_size,
                limits.constant_alignment as u64,
            ));
        }

        let white = TextureDesc::new_2d("lumen.default_white", TextureFormat::Rgba8Unorm, 1, 1)
            .with_data(vec![255; 4])
            .with_sampler(SamplerDesc {
                min_filter: TextureFilter::Nearest,
                mag_filter: TextureFilter::Nearest,
                ..Default::default()
            });
        let raw = api
            .create_texture(&white)
            .map_err(|e| anyhow!("TableDevice: failed to create the default texture: {e}"))?;
        let white_texture = Arc::new(Texture::new(
            white,
            NativeHandle::detached(GraphicsApi::Dx12, ResourceKind::Texture, raw),
        ));
        let default_sampler = api
            .create_sampler(&SamplerDesc::default())
            .map_err(|e| anyhow!("TableDevice: failed to create the default sampler: {e}"))?;
        let null_constants = api
            .create_buffer(&BufferDesc::new("lumen.null_constants", BufferType::Uniform, NULL_BUFFER_SIZE))
            .map_err(|e| anyhow!("TableDevice: failed to create the null constant buffer: {e}"))?;
        let null_storage = api
            .create_buffer(&BufferDesc::new("lumen.null_storage", BufferType::Storage, NULL_BUFFER_SIZE))
            .map_err(|e| anyhow!("TableDevice: failed to create the null storage buffer: {e}"))?;

        log::info!(
            "TableDevice: using '{}' ({}), driver {}, {} frames in flight",
            info.device_name,
            info.vendor_name,
            info.driver_version,
            frames.len()
        );

        Ok(Self {
            api,
            window,
            info,
            stats: RenderStats::default(),
            frame: FrameTracker::new("TableDevice"),
            releases: ReleaseQueue::new(),
            reflector: NagaReflector,
            frames,
            frame_serial: 0,
            frame_index: 0,
            max_draws_per_pipeline: config.max_draws_per_pipeline.max(1),
            back_buffer_size,
            white_texture,
            default_sampler,
            null_constants,
            null_storage,
            samplers: HashMap::new(),
            tracker: StateTracker::default(),
            pipelines: HashMap::new(),
            next_local: 1,
            current_pipeline: None,
            current_vertex_array: None,
            current_framebuffer: None,
            bound_textures: vec![None; caps.max_texture_slots as usize],
            render_state: RenderState::default(),
            viewport: None,
            scissor: None,
            pass: None,
            bound_state: 0,
            vertex_input_applied: false,
            dynamic_state_dirty: true,
            recorded: false,
            tracked_buffers: Vec::new(),
            tracked_textures: Vec::new(),
            caps,
        })
    }

    /// The underlying driver.
    pub fn api(&self) -> &T {
        &self.api
    }

    /// Object id of the texture bound for `None`.
    pub fn default_texture_raw(&self) -> u64 {
        self.white_texture.raw()
    }

    /// The descriptor heap of a linked pipeline.
    pub fn pipeline_heap(&self, pipeline: &Pipeline) -> Option<u64> {
        self.pipelines.get(&pipeline.raw()).map(|p| p.heap)
    }

    /// Pipeline state objects built for `pipeline` so far.
    pub fn pipeline_state_count(&self, pipeline: &Pipeline) -> usize {
        self.pipelines.get(&pipeline.raw()).map_or(0, |p| p.states.len())
    }

    /// The frame slot currently recording.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    fn handle(&self, kind: ResourceKind, raw: u64, size: u64) -> NativeHandle {
        NativeHandle::new(GraphicsApi::Dx12, kind, raw, size, self.releases.sender())
    }

    fn local_id(&mut self) -> u64 {
        let id = self.next_local;
        self.next_local += 1;
        id
    }

    fn track<R>(list: &mut Vec<Weak<R>>, resource: &Arc<R>) {
        list.retain(|w| w.strong_count() > 0);
        list.push(Arc::downgrade(resource));
    }

    // --- Lifetime ---

    fn destroy_pipeline_objects(&mut self, objects: PipelineObjects) {
        for (_, state) in objects.states {
            self.api.destroy(state);
        }
        self.api.destroy(objects.heap);
        self.api.destroy(objects.root_signature);
        for (_, module, _) in objects.modules {
            self.api.destroy(module);
        }
    }

    fn destroy_released(&mut self, released: Vec<ReleasedResource>) {
        for resource in released {
            match resource.kind {
                ResourceKind::Buffer | ResourceKind::Shader => self.api.destroy(resource.raw),
                ResourceKind::Texture => {
                    self.tracker.forget(resource.raw);
                    self.api.destroy(resource.raw);
                }
                ResourceKind::Pipeline => {
                    if let Some(objects) = self.pipelines.remove(&resource.raw) {
                        self.destroy_pipeline_objects(objects);
                    }
                }
                // Framebuffers and vertex arrays own no driver objects.
                ResourceKind::Framebuffer | ResourceKind::VertexArray => {}
            }
            self.stats.resource_released(resource.kind, resource.size_bytes);
            log::trace!("TableDevice: released {:?} {}", resource.kind, resource.raw);
        }
    }

    /// Blocks until the GPU is done with frame slot `index`.
    fn wait_for_frame(&mut self, index: usize) {
        let fence = self.frames[index].fence_value;
        if fence > self.api.completed_fence() {
            log::trace!("TableDevice: waiting for fence {fence} of frame slot {index}");
            self.api.wait_for_fence(fence);
        }
    }

    fn submit(&mut self) {
        self.end_pass_if_open();
        if !self.recorded {
            return;
        }
        let fence = self.api.submit();
        self.frames[self.frame_index].fence_value = fence;
        self.recorded = false;
    }

    // --- Uploads ---

    fn flush_buffer(&mut self, buffer: &Buffer) {
        for write in buffer.take_pending() {
            self.api.write_buffer(buffer.raw(), write.offset, &write.data);
        }
    }

    fn flush_texture(&mut self, texture: &Texture) {
        let desc = texture.desc();
        let pending = texture.take_pending();
        if pending.is_empty() {
            return;
        }
        if desc.texture_type != TextureType::Texture2D {
            log::warn!(
                "TableDevice: staged writes to {:?} texture '{}' are not supported; dropped",
                desc.texture_type,
                desc.debug_name
            );
            return;
        }
        let row_bytes = desc.width as u64 * desc.format.bytes_per_pixel() as u64;
        for write in pending {
            let len = write.data.len() as u64;
            if write.offset % row_bytes != 0 || len % row_bytes != 0 {
                log::warn!(
                    "TableDevice: write of {len} bytes at {} into '{}' does not cover whole rows; dropped",
                    write.offset,
                    desc.debug_name
                );
                continue;
            }
            let y = (write.offset / row_bytes) as u32;
            let rows = (len / row_bytes) as u32;
            self.api.write_texture_rows(texture.raw(), y, rows, &write.data);
        }
    }

    // --- Passes and state ---

    fn barrier(&mut self, texture: u64, state: ResourceState) {
        if let Some(transition) = self.tracker.transition(texture, state) {
            self.api
                .transition(transition.texture, transition.before, transition.after);
            self.recorded = true;
        }
    }

    /// Attachments of the current render target.
    fn targets(&self) -> (Vec<u64>, Option<u64>, TargetFormats, (u32, u32)) {
        match &self.current_framebuffer {
            Some(framebuffer) => {
                let desc = framebuffer.desc();
                let colors = desc.color_attachments.iter().map(|t| t.raw()).collect();
                let depth = desc.depth_attachment.as_ref().map(|t| t.raw());
                let formats = TargetFormats {
                    colors: desc.color_attachments.iter().map(|t| t.format()).collect(),
                    depth: desc.depth_attachment.as_ref().map(|t| t.format()),
                };
                let size = framebuffer.extent().unwrap_or(self.back_buffer_size);
                (colors, depth, formats, size)
            }
            None => (
                vec![BACK_BUFFER],
                None,
                TargetFormats {
                    colors: vec![self.api.back_buffer_format()],
                    depth: None,
                },
                self.back_buffer_size,
            ),
        }
    }

    fn begin_pass(&mut self, label: &str, clear: Option<&ClearParams>, explicit: bool) {
        self.end_pass_if_open();
        let (colors, depth, formats, size) = self.targets();
        for &color in &colors {
            self.barrier(color, ResourceState::Write);
        }
        if let Some(depth) = depth {
            self.barrier(depth, ResourceState::Write);
        }
        self.api.begin_pass(&TablePass {
            label,
            colors: &colors,
            depth,
            clear,
        });
        self.pass = Some(PassState {
            formats,
            size,
            explicit,
        });
        self.bound_state = 0;
        self.vertex_input_applied = false;
        self.dynamic_state_dirty = true;
        self.recorded = true;
    }

    fn end_pass_if_open(&mut self) {
        if self.pass.take().is_some() {
            self.api.end_pass();
        }
    }

    /// Resolves the pipeline state object for the current targets and render
    /// state, building a new variant the first time a combination is used.
    fn resolve_pipeline_state(&mut self, pipeline: &Pipeline) -> Option<u64> {
        let formats = self.pass.as_ref()?.formats.clone();
        let objects = self.pipelines.get_mut(&pipeline.raw())?;
        let key = (formats, self.render_state);
        if let Some(state) = objects.states.get(&key) {
            return Some(*state);
        }
        let desc = pipeline.desc();
        let stages: Vec<TableStage<'_>> = objects
            .modules
            .iter()
            .map(|(stage, module, entry_point)| TableStage {
                stage: *stage,
                module: *module,
                entry_point,
            })
            .collect();
        let created = self.api.create_pipeline_state(&TablePipelineDesc {
            label: &desc.debug_name,
            root_signature: objects.root_signature,
            stages: &stages,
            vertex_layout: desc.vertex_layout.as_ref(),
            primitive: desc.primitive_type,
            render_state: key.1,
            targets: &key.0,
        });
        match created {
            Ok(state) => {
                log::debug!(
                    "TableDevice: built state variant {} of '{}' for {:?}",
                    objects.states.len(),
                    desc.debug_name,
                    key.0
                );
                objects.states.insert(key, state);
                Some(state)
            }
            Err(e) => {
                log::error!("TableDevice: no state object for '{}': {e}", desc.debug_name);
                None
            }
        }
    }

    fn apply_vertex_input(&mut self, indexed: bool) -> bool {
        let Some(vertex_array) = self.current_vertex_array.clone() else {
            return !indexed;
        };
        if !self.vertex_input_applied {
            let desc = vertex_array.desc();
            for (slot, (buffer, _)) in desc.vertex_buffers.iter().enumerate() {
                self.api.set_vertex_buffer(slot as u32, buffer.raw());
            }
            if let Some((buffer, format)) = &desc.index_buffer {
                self.api.set_index_buffer(buffer.raw(), *format);
            }
            self.vertex_input_applied = true;
        }
        !indexed || vertex_array.index_buffer().is_some()
    }

    fn apply_dynamic_state(&mut self) {
        if !self.dynamic_state_dirty {
            return;
        }
        let (width, height) = self.pass.as_ref().map_or(self.back_buffer_size, |p| p.size);
        let viewport = self.viewport.unwrap_or(Viewport::new(width as f32, height as f32));
        self.api.set_viewport(&viewport);
        let scissor = self.scissor.unwrap_or(ScissorRect::new(width, height));
        self.api.set_scissor(&scissor);
        self.dynamic_state_dirty = false;
    }

    fn sampler_for(&mut self, desc: &SamplerDesc) -> u64 {
        if let Some(sampler) = self.samplers.get(desc) {
            return *sampler;
        }
        match self.api.create_sampler(desc) {
            Ok(sampler) => {
                self.samplers.insert(*desc, sampler);
                sampler
            }
            Err(e) => {
                log::warn!("TableDevice: failed to create sampler {desc:?}: {e}; using the default");
                self.default_sampler
            }
        }
    }

    /// Uploads the uniform blocks of `raw` whose ring view does not belong
    /// to the recording frame.
    fn upload_blocks(&mut self, raw: u64, force: bool) -> bool {
        let serial = self.frame_serial;
        let Some(objects) = self.pipelines.get_mut(&raw) else {
            return false;
        };
        let ring = &mut self.frames[self.frame_index].ring;
        for block in &mut objects.blocks {
            let current = block.view.is_some_and(|(s, _, _)| s == serial);
            if current && !block.stale && !force {
                continue;
            }
            let Some((offset, size)) = ring.allocate(block.data.len() as u64) else {
                log::warn!(
                    "TableDevice: constant ring of frame slot {} is full ({} bytes used)",
                    self.frame_index,
                    ring.used()
                );
                block.stale = true;
                return false;
            };
            self.api.write_buffer(ring.buffer(), offset, &block.data);
            block.view = Some((serial, offset, size));
            block.stale = false;
        }
        true
    }

    /// Writes and binds a descriptor table for the next draw of `pipeline`.
    fn bind_descriptors(&mut self, pipeline: &Pipeline) -> bool {
        let layout = &pipeline.desc().resource_layout;
        let slots = layout.texture_slot_count() as usize;
        let textures: Vec<Arc<Texture>> = (0..slots)
            .map(|slot| {
                self.bound_textures
                    .get(slot)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| Arc::clone(&self.white_texture))
            })
            .collect();
        for texture in &textures {
            self.barrier(texture.raw(), ResourceState::Read);
        }
        let samplers: Vec<u64> = (0..layout.of_kind(BindingKind::Sampler).count())
            .map(|slot| match self.bound_textures.get(slot).cloned().flatten() {
                Some(texture) => self.sampler_for(&texture.desc().sampler),
                None => self.default_sampler,
            })
            .collect();

        if !self.upload_blocks(pipeline.raw(), false) {
            return false;
        }
        let frame = self.frame_index;
        let ring = self.frames[frame].ring.buffer();
        let Some(objects) = self.pipelines.get_mut(&pipeline.raw()) else {
            return false;
        };
        let Some(table) = objects.regions.next(frame) else {
            log::warn!(
                "TableDevice: '{}' used all {} descriptor tables of this frame; draw skipped",
                pipeline.debug_name(),
                self.max_draws_per_pipeline
            );
            return false;
        };
        let mut texture_slot = 0;
        let mut sampler_slot = 0;
        let mut writes = Vec::with_capacity(layout.bindings.len());
        for binding in &layout.bindings {
            let resource = match binding.kind {
                BindingKind::UniformBuffer => {
                    let view = objects
                        .blocks
                        .iter()
                        .find(|b| b.set == binding.set && b.binding == binding.binding)
                        .and_then(|b| b.view);
                    match view {
                        Some((_, offset, size)) => DescriptorResource::ConstantBuffer {
                            buffer: ring,
                            offset,
                            size,
                        },
                        None => DescriptorResource::ConstantBuffer {
                            buffer: self.null_constants,
                            offset: 0,
                            size: NULL_BUFFER_SIZE,
                        },
                    }
                }
                BindingKind::StorageBuffer => DescriptorResource::StorageBuffer(self.null_storage),
                BindingKind::Texture => {
                    let texture = textures[texture_slot].raw();
                    texture_slot += 1;
                    DescriptorResource::Texture(texture)
                }
                BindingKind::Sampler => {
                    let sampler = samplers[sampler_slot];
                    sampler_slot += 1;
                    DescriptorResource::Sampler(sampler)
                }
            };
            writes.push(DescriptorWrite {
                set: binding.set,
                binding: binding.binding,
                resource,
            });
        }
        let heap = objects.heap;
        self.api.write_descriptor_table(heap, table, &writes);
        self.api.set_descriptor_table(heap, table);
        true
    }

    /// A draw with no pipeline bound is accounted like on every other
    /// backend, but there is no pipeline state object to record it against.
    fn count_unpipelined_draw(&mut self, operation: &str, count: u32, instances: u32) {
        if !self.frame.allows(operation) {
            return;
        }
        log::debug!("TableDevice: {operation} without a pipeline is counted but not recorded");
        self.stats.record_draw(PrimitiveType::Triangles, count, instances);
    }

    /// Records everything a draw needs. `None` means the draw is skipped.
    fn prepare_draw(&mut self, operation: &str, indexed: bool) -> Option<PrimitiveType> {
        if !self.frame.allows(operation) {
            return None;
        }
        let pipeline = self.current_pipeline.clone()?;
        if !pipeline.is_linked() {
            log::debug!(
                "TableDevice: {operation} skipped, pipeline '{}' is not linked",
                pipeline.debug_name()
            );
            return None;
        }
        let primitive = pipeline.desc().primitive_type;
        if self.render_state.cull_mode == CullMode::FrontAndBack && is_triangles(primitive) {
            log::debug!("TableDevice: {operation} skipped, every face is culled");
            return None;
        }
        if self.pass.is_none() {
            self.begin_pass("implicit", None, false);
        }
        if pipeline.has_dirty_parameters() {
            self.commit_parameters(&pipeline);
        }
        let state = self.resolve_pipeline_state(&pipeline)?;
        if self.bound_state != state {
            self.api.set_pipeline_state(state);
            self.bound_state = state;
        }
        if !self.apply_vertex_input(indexed) {
            log::debug!("TableDevice: {operation} skipped, no index buffer bound");
            return None;
        }
        self.apply_dynamic_state();
        if !self.bind_descriptors(&pipeline) {
            return None;
        }
        Some(primitive)
    }

    // --- Pipelines ---

    fn build_pipeline(&mut self, desc: &PipelineDesc) -> Result<(u64, ShaderReflection), PipelineError> {
        desc.validate()?;
        if desc.shader(ShaderStage::Vertex).is_none() {
            return Err(PipelineError::LinkFailed {
                label: desc.debug_name.clone(),
                log: "compute-only pipelines cannot be drawn with".to_string(),
            });
        }
        if let Some(glsl) = desc.shaders.iter().find(|s| matches!(s.source, ShaderSource::Glsl(_))) {
            return Err(ShaderError::UnsupportedSource {
                label: glsl.debug_name.clone(),
                backend: BACKEND.to_string(),
            }
            .into());
        }
        let reflection = self.reflector.reflect_pipeline(desc)?;
        check_interface(desc, &reflection)?;

        let mut created = Vec::new();
        match self.create_pipeline_objects(desc, &reflection, &mut created) {
            Ok(raw) => Ok((raw, reflection)),
            Err(err) => {
                for object in created.into_iter().rev() {
                    self.api.destroy(object);
                }
                Err(err)
            }
        }
    }

    fn create_pipeline_objects(
        &mut self,
        desc: &PipelineDesc,
        reflection: &ShaderReflection,
        created: &mut Vec<u64>,
    ) -> Result<u64, PipelineError> {
        let mut modules = Vec::with_capacity(desc.shaders.len());
        for shader in &desc.shaders {
            let module = self
                .api
                .compile_module(shader)
                .map_err(|log| ShaderError::CompilationFailed {
                    label: shader.debug_name.clone(),
                    log,
                })?;
            created.push(module);
            modules.push((shader.stage, module, shader.entry_point.clone()));
        }
        let root_signature = self
            .api
            .create_root_signature(&desc.debug_name, &desc.resource_layout)
            .map_err(PipelineError::LayoutCreationFailed)?;
        created.push(root_signature);
        let regions = HeapRegions::new(self.frames.len(), self.max_draws_per_pipeline);
        let heap = self
            .api
            .create_descriptor_heap(root_signature, regions.capacity())
            .map_err(PipelineError::LayoutCreationFailed)?;
        created.push(heap);

        let targets = TargetFormats {
            colors: vec![self.api.back_buffer_format()],
            depth: None,
        };
        let stages: Vec<TableStage<'_>> = modules
            .iter()
            .map(|(stage, module, entry_point)| TableStage {
                stage: *stage,
                module: *module,
                entry_point,
            })
            .collect();
        let primary = self
            .api
            .create_pipeline_state(&TablePipelineDesc {
                label: &desc.debug_name,
                root_signature,
                stages: &stages,
                vertex_layout: desc.vertex_layout.as_ref(),
                primitive: desc.primitive_type,
                render_state: desc.render_state,
                targets: &targets,
            })
            .map_err(|log| PipelineError::LinkFailed {
                label: desc.debug_name.clone(),
                log,
            })?;

        let alignment = self.caps.constant_buffer_alignment as u64;
        let blocks = reflection
            .uniform_blocks
            .iter()
            .map(|block| ConstantBlock {
                set: block.set,
                binding: block.binding,
                data: vec![0; align_up(block.size.max(16) as u64, alignment) as usize],
                view: None,
                stale: true,
            })
            .collect();
        let mut states = HashMap::new();
        states.insert((targets, desc.render_state), primary);
        self.pipelines.insert(
            primary,
            PipelineObjects {
                root_signature,
                heap,
                regions,
                modules,
                states,
                blocks,
            },
        );
        Ok(primary)
    }
}

impl<T: TableApi> Device for TableDevice<T> {
    fn device_name(&self) -> &str {
        &self.info.device_name
    }

    fn vendor_name(&self) -> &str {
        &self.info.vendor_name
    }

    fn driver_version(&self) -> &str {
        &self.info.driver_version
    }

    fn backend_type(&self) -> GraphicsApi {
        GraphicsApi::Dx12
    }

    fn capabilities(&self) -> &GraphicsCapabilities {
        &self.caps
    }

    fn stats(&self) -> RenderStats {
        self.stats.clone()
    }

    // --- Resource creation ---

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<Buffer>, ResourceError> {
        desc.validate()?;
        let raw = self.api.create_buffer(desc).map_err(|e| {
            log::error!("TableDevice: failed to create buffer '{}': {e}", desc.debug_name);
            ResourceError::BackendError(e)
        })?;
        let buffer = Arc::new(Buffer::new(desc.clone(), self.handle(ResourceKind::Buffer, raw, desc.size)));
        self.stats.resource_created(ResourceKind::Buffer, desc.size);
        Self::track(&mut self.tracked_buffers, &buffer);
        Ok(buffer)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<Texture>, ResourceError> {
        desc.validate()?;
        let max = self.caps.max_texture_size;
        if desc.width > max || desc.height > max {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture '{}': {}x{} exceeds the device limit of {max}",
                desc.debug_name, desc.width, desc.height
            )));
        }
        let raw = self.api.create_texture(desc).map_err(|e| {
            log::error!("TableDevice: failed to create texture '{}': {e}", desc.debug_name);
            ResourceError::BackendError(e)
        })?;
        let size = desc.total_size();
        let texture = Arc::new(Texture::new(desc.clone(), self.handle(ResourceKind::Texture, raw, size)));
        self.stats.resource_created(ResourceKind::Texture, size);
        Self::track(&mut self.tracked_textures, &texture);
        Ok(texture)
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>, ResourceError> {
        if matches!(desc.source, ShaderSource::Glsl(_)) {
            return Err(ShaderError::UnsupportedSource {
                label: desc.debug_name.clone(),
                backend: BACKEND.to_string(),
            }
            .into());
        }
        let raw = self.api.compile_module(desc).map_err(|log| {
            log::error!("TableDevice: shader '{}' failed to compile:\n{log}", desc.debug_name);
            ShaderError::CompilationFailed {
                label: desc.debug_name.clone(),
                log,
            }
        })?;
        self.stats.resource_created(ResourceKind::Shader, 0);
        Ok(Arc::new(Shader::new(desc.clone(), self.handle(ResourceKind::Shader, raw, 0))))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Arc<Pipeline> {
        match self.build_pipeline(desc) {
            Ok((raw, reflection)) => {
                self.stats.resource_created(ResourceKind::Pipeline, 0);
                log::debug!("TableDevice: built pipeline '{}' as state {raw}", desc.debug_name);
                Arc::new(Pipeline::linked(
                    desc.clone(),
                    self.handle(ResourceKind::Pipeline, raw, 0),
                    Some(reflection),
                    String::new(),
                ))
            }
            Err(err) => {
                let log = err.to_string();
                log::error!("TableDevice: pipeline '{}' failed to build: {log}", desc.debug_name);
                Arc::new(Pipeline::failed(
                    desc.clone(),
                    NativeHandle::detached(GraphicsApi::Dx12, ResourceKind::Pipeline, 0),
                    log,
                ))
            }
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<Framebuffer>, ResourceError> {
        desc.validate(self.caps.max_color_attachments)?;
        let raw = self.local_id();
        Ok(Arc::new(Framebuffer::new(
            desc.clone(),
            self.handle(ResourceKind::Framebuffer, raw, 0),
        )))
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<Arc<VertexArray>, ResourceError> {
        desc.validate()?;
        let max = self.caps.max_vertex_attributes;
        if let Some(attribute) = desc
            .vertex_buffers
            .iter()
            .flat_map(|(_, layout)| layout.attributes.iter())
            .find(|a| a.location >= max)
        {
            return Err(ResourceError::InvalidDescriptor(format!(
                "vertex array '{}': location {} exceeds the device limit of {max}",
                desc.debug_name, attribute.location
            )));
        }
        let raw = self.local_id();
        Ok(Arc::new(VertexArray::new(
            desc.clone(),
            self.handle(ResourceKind::VertexArray, raw, 0),
        )))
    }

    // --- Frame control ---

    fn begin_frame(&mut self) {
        if !self.frame.begin() {
            return;
        }
        if self.recorded {
            log::warn!(
                "TableDevice: frame slot {} was never submitted; submitting it before the next frame",
                self.frame_index
            );
            self.flush_uploads();
            self.submit();
        }
        self.frame_serial += 1;
        self.frame_index = (self.frame_serial % self.frames.len() as u64) as usize;
        let index = self.frame_index;
        self.wait_for_frame(index);

        let retired = std::mem::take(&mut self.frames[index].released);
        self.destroy_released(retired);
        self.frames[index].released = self.releases.drain();
        self.frames[index].ring.reset();
        for objects in self.pipelines.values_mut() {
            objects.regions.rewind(index);
        }
        self.stats.begin_frame();

        if let Some(window) = &self.window {
            let size = window.framebuffer_size();
            if size != self.back_buffer_size {
                log::debug!("TableDevice: back buffer resized to {}x{}", size.0, size.1);
                self.api.resize(size.0, size.1);
                self.back_buffer_size = self.api.back_buffer_size();
                self.tracker.forget(BACK_BUFFER);
            }
        }
    }

    fn end_frame(&mut self) {
        if self.pass.as_ref().is_some_and(|p| p.explicit) {
            log::warn!("TableDevice: end_frame with an open render pass; closing it");
        }
        self.end_pass_if_open();
        if let Some(ms) = self.frame.end() {
            self.stats.frame_time_ms = ms;
        }
    }

    fn flush(&mut self) {
        self.flush_uploads();
        self.submit();
        self.frame.submitted();
    }

    fn finish(&mut self) {
        self.flush_uploads();
        self.submit();
        let last = self.frames.iter().map(|f| f.fence_value).max().unwrap_or(0);
        if last > self.api.completed_fence() {
            self.api.wait_for_fence(last);
        }
        let mut retired = self.releases.drain();
        for frame in &mut self.frames {
            retired.append(&mut frame.released);
        }
        self.destroy_released(retired);
        self.frame.submitted();
    }

    fn present(&mut self) {
        self.flush_uploads();
        self.end_pass_if_open();
        if self.tracker.state(BACK_BUFFER) == ResourceState::Write {
            self.barrier(BACK_BUFFER, ResourceState::Read);
        }
        self.submit();
        self.api.present();
        self.frame.submitted();
    }

    // --- State and drawing ---

    fn set_render_state(&mut self, state: &RenderState) {
        self.render_state = *state;
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = Some(*viewport);
        self.dynamic_state_dirty = true;
    }

    fn set_scissor(&mut self, rect: Option<&ScissorRect>) {
        self.scissor = rect.copied();
        self.dynamic_state_dirty = true;
    }

    fn clear(&mut self, params: &ClearParams) {
        if !self.frame.allows("clear") || !params.clears_anything() {
            return;
        }
        let explicit = self.pass.as_ref().is_some_and(|p| p.explicit);
        self.begin_pass("clear", Some(params), explicit);
    }

    fn draw(&mut self, params: &DrawParams) {
        if params.instance_count == 0 {
            log::debug!("TableDevice: draw skipped, zero instances");
            return;
        }
        if self.current_pipeline.is_none() {
            self.count_unpipelined_draw("draw", params.vertex_count, params.instance_count);
            return;
        }
        let Some(primitive) = self.prepare_draw("draw", false) else {
            return;
        };
        self.api.draw(params);
        self.stats
            .record_draw(primitive, params.vertex_count, params.instance_count);
    }

    fn draw_indexed(&mut self, params: &DrawIndexedParams) {
        if params.instance_count == 0 {
            log::debug!("TableDevice: draw_indexed skipped, zero instances");
            return;
        }
        if self.current_pipeline.is_none() {
            self.count_unpipelined_draw("draw_indexed", params.index_count, params.instance_count);
            return;
        }
        let Some(primitive) = self.prepare_draw("draw_indexed", true) else {
            return;
        };
        self.api.draw_indexed(params);
        self.stats
            .record_draw(primitive, params.index_count, params.instance_count);
    }

    fn bind_pipeline(&mut self, pipeline: Option<&Arc<Pipeline>>) {
        let Some(pipeline) = pipeline else {
            self.current_pipeline = None;
            return;
        };
        self.current_pipeline = Some(Arc::clone(pipeline));
        if !pipeline.is_linked() {
            log::debug!("TableDevice: bound unlinked pipeline '{}'", pipeline.debug_name());
            return;
        }
        self.render_state = *pipeline.render_state();
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&Arc<VertexArray>>) {
        if let Some(vertex_array) = vertex_array {
            let desc = vertex_array.desc();
            let buffers = desc
                .vertex_buffers
                .iter()
                .map(|(b, _)| b)
                .chain(desc.index_buffer.iter().map(|(b, _)| b));
            for buffer in buffers {
                if buffer.has_pending() {
                    self.flush_buffer(buffer);
                }
            }
        }
        let previous = self.current_vertex_array.as_ref().map(|v| v.raw());
        if previous != vertex_array.map(|v| v.raw()) {
            self.vertex_input_applied = false;
        }
        self.current_vertex_array = vertex_array.cloned();
    }

    fn bind_texture(&mut self, texture: Option<&Arc<Texture>>, slot: u32) {
        let Some(bound) = self.bound_textures.get(slot as usize) else {
            log::warn!(
                "TableDevice: texture slot {slot} exceeds the {} available; ignored",
                self.caps.max_texture_slots
            );
            return;
        };
        if bound.as_ref().map(|t| t.raw()) == texture.map(|t| t.raw()) {
            return;
        }
        if let Some(texture) = texture {
            if texture.has_pending() {
                self.flush_texture(texture);
            }
        }
        self.bound_textures[slot as usize] = texture.cloned();
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&Arc<Framebuffer>>) {
        let current = self.current_framebuffer.as_ref().map(|f| f.raw());
        if current == framebuffer.map(|f| f.raw()) {
            return;
        }
        self.end_pass_if_open();
        self.current_framebuffer = framebuffer.cloned();
    }

    fn begin_render_pass(&mut self, params: &RenderPassParams) {
        if !self.frame.allows("begin_render_pass") {
            return;
        }
        if self.pass.as_ref().is_some_and(|p| p.explicit) {
            log::warn!(
                "TableDevice: render pass '{}' begun inside another pass; closing the previous one",
                params.label
            );
        }
        self.bind_framebuffer(params.framebuffer.as_ref());
        self.viewport = None;
        self.begin_pass(&params.label, params.clear.as_ref(), true);
    }

    fn end_render_pass(&mut self) {
        if !self.pass.as_ref().is_some_and(|p| p.explicit) {
            log::warn!("TableDevice: end_render_pass without begin_render_pass; ignored");
            return;
        }
        self.end_pass_if_open();
    }

    fn resource_barrier(&mut self, texture: &Arc<Texture>, state: ResourceState) {
        self.barrier(texture.raw(), state);
    }

    fn blit(&mut self, params: &BlitParams) {
        if !params.color {
            if params.depth {
                log::warn!("TableDevice: depth blits are not supported; ignored");
            }
            return;
        }
        if !params.is_one_to_one() {
            log::warn!("TableDevice: scaled blits are not supported; ignored");
            return;
        }
        let attachment = |framebuffer: &Option<Arc<Framebuffer>>| match framebuffer {
            Some(f) => f.desc().color_attachments.first().map(|t| t.raw()),
            None => Some(BACK_BUFFER),
        };
        let (Some(source), Some(destination)) = (attachment(&params.source), attachment(&params.destination)) else {
            log::warn!("TableDevice: blit between framebuffers without color attachments; ignored");
            return;
        };
        if source == destination {
            log::warn!("TableDevice: blit source and destination are the same texture; ignored");
            return;
        }
        self.end_pass_if_open();
        self.barrier(source, ResourceState::Read);
        self.barrier(destination, ResourceState::Write);
        self.api.copy_texture(&TableCopy {
            source,
            destination,
            source_origin: (params.source_rect.x, params.source_rect.y),
            destination_origin: (params.destination_rect.x, params.destination_rect.y),
            width: params.source_rect.width,
            height: params.source_rect.height,
        });
        self.recorded = true;
    }

    fn commit_parameters(&mut self, pipeline: &Pipeline) {
        let dirty = pipeline.take_dirty_parameters();
        if dirty.is_empty() {
            return;
        }
        if !pipeline.is_linked() {
            log::debug!("TableDevice: '{}' is not linked; uniforms dropped", pipeline.debug_name());
            return;
        }
        let transpose = pipeline.desc().matrix_layout != self.caps.matrix_layout;
        let (Some(reflection), Some(objects)) = (pipeline.reflection(), self.pipelines.get_mut(&pipeline.raw()))
        else {
            log::debug!("TableDevice: '{}' has no uniform state", pipeline.debug_name());
            return;
        };
        let mut changed = false;
        for (name, value) in dirty {
            let target = reflection.find_uniform(&name).and_then(|(block, member)| {
                objects
                    .blocks
                    .iter_mut()
                    .find(|b| b.set == block.set && b.binding == block.binding)
                    .map(|b| (b, member))
            });
            let Some((block, member)) = target else {
                log::debug!(
                    "TableDevice: pipeline '{}' has no uniform '{name}'; dropped",
                    pipeline.debug_name()
                );
                continue;
            };
            let mut bytes = value.to_bytes(transpose);
            bytes.truncate(member.size as usize);
            let start = member.offset as usize;
            let Some(slot) = block.data.get_mut(start..start + bytes.len()) else {
                continue;
            };
            slot.copy_from_slice(&bytes);
            block.stale = true;
            changed = true;
        }
        if changed {
            self.upload_blocks(pipeline.raw(), false);
        }
    }

    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        buffer.stage_write(offset, data)?;
        self.flush_buffer(buffer);
        Ok(())
    }

    fn flush_uploads(&mut self) {
        let buffers: Vec<Arc<Buffer>> = self.tracked_buffers.iter().filter_map(Weak::upgrade).collect();
        for buffer in &buffers {
            if buffer.has_pending() {
                self.flush_buffer(buffer);
            }
        }
        let textures: Vec<Arc<Texture>> = self.tracked_textures.iter().filter_map(Weak::upgrade).collect();
        for texture in &textures {
            if texture.has_pending() {
                self.flush_texture(texture);
            }
        }
        self.tracked_buffers.retain(|w| w.strong_count() > 0);
        self.tracked_textures.retain(|w| w.strong_count() > 0);
    }

    // --- Execution ---

    fn execute_command_list(&mut self, list: &CommandBuffer) -> Result<usize, RecordingError> {
        list.execute(self)
    }
}

impl<T: TableApi> Drop for TableDevice<T> {
    fn drop(&mut self) {
        self.end_pass_if_open();
        if self.recorded {
            let fence = self.api.submit();
            self.frames[self.frame_index].fence_value = fence;
        }
        let last = self.frames.iter().map(|f| f.fence_value).max().unwrap_or(0);
        if last > self.api.completed_fence() {
            self.api.wait_for_fence(last);
        }
        self.current_pipeline = None;
        self.current_vertex_array = None;
        self.current_framebuffer = None;
        self.bound_textures.clear();
        let mut retired = self.releases.drain();
        for frame in &mut self.frames {
            retired.append(&mut frame.released);
        }
        self.destroy_released(retired);
        let pipelines: Vec<PipelineObjects> = self.pipelines.drain().map(|(_, p)| p).collect();
        for objects in pipelines {
            self.destroy_pipeline_objects(objects);
        }
        for (_, sampler) in self.samplers.drain() {
            self.api.destroy(sampler);
        }
        self.api.destroy(self.default_sampler);
        self.api.destroy(self.white_texture.raw());
        self.api.destroy(self.null_constants);
        self.api.destroy(self.null_storage);
        for frame in &self.frames {
            self.api.destroy(frame.ring.buffer());
        }
        log::debug!("TableDevice: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lumen_core::{
        BlendMode, IndexFormat, MatrixLayout, ShaderResourceLayout, ShaderStageFlags, UniformValue,
        VertexBufferLayout, VertexFormat, VertexLayout,
    };

    const UNLIT: &str = r#"
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

    const MESH: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position + vec3<f32>(uv, 0.0), 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

    fn config() -> DeviceConfig {
        DeviceConfig::headless(GraphicsApi::Dx12)
    }

    fn device() -> TableDevice<HeadlessTable> {
        TableDevice::headless(&config()).unwrap()
    }

    fn unlit_layout() -> ShaderResourceLayout {
        ShaderResourceLayout::new()
            .uniform_buffer("Globals", 0, 0)
            .texture("albedo", 0, 1)
            .sampler("albedo_sampler", 0, 2)
    }

    fn unlit_desc() -> PipelineDesc {
        PipelineDesc::new("unlit")
            .with_shader(ShaderDesc::wgsl("unlit.vs", ShaderStage::Vertex, UNLIT, "vs_main"))
            .with_shader(ShaderDesc::wgsl("unlit.fs", ShaderStage::Fragment, UNLIT, "fs_main"))
            .with_resource_layout(unlit_layout())
    }

    fn mesh_desc(layout: VertexLayout) -> PipelineDesc {
        PipelineDesc::new("mesh")
            .with_shader(ShaderDesc::wgsl("mesh.vs", ShaderStage::Vertex, MESH, "vs_main"))
            .with_shader(ShaderDesc::wgsl("mesh.fs", ShaderStage::Fragment, MESH, "fs_main"))
            .with_vertex_layout(layout)
    }

    /// Descriptors written for the `nth` draw of `pipeline` in the current frame.
    fn table_of(device: &TableDevice<HeadlessTable>, pipeline: &Pipeline, nth: u32) -> Vec<DescriptorWrite> {
        let heap = device.pipeline_heap(pipeline).unwrap();
        let table = device.frame_index() as u32 * config().max_draws_per_pipeline + nth;
        device.api().descriptor_table(heap, table).unwrap().to_vec()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }

    fn constants(device: &TableDevice<HeadlessTable>, writes: &[DescriptorWrite]) -> Vec<f32> {
        let (buffer, offset, size) = writes
            .iter()
            .find_map(|w| match w.resource {
                DescriptorResource::ConstantBuffer { buffer, offset, size } => Some((buffer, offset, size)),
                _ => None,
            })
            .unwrap();
        let contents = device.api().buffer_contents(buffer).unwrap();
        floats(&contents[offset as usize..(offset + size) as usize])
    }

    #[test]
    fn capabilities_come_from_the_driver_limits() {
        let device = device();
        let caps = device.capabilities();
        assert_eq!(caps.api, GraphicsApi::Dx12);
        assert_eq!(caps.constant_buffer_alignment, 256);
        assert_eq!(caps.max_texture_size, 16384);
        assert_eq!(caps.matrix_layout, MatrixLayout::ColumnMajor);
        assert_eq!(device.frames_in_flight(), 2);
        assert!(device.supports_multithreading());
    }

    #[test]
    fn clear_and_draw_record_one_pass() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        assert!(pipeline.is_linked(), "{}", pipeline.compile_log());

        device.begin_frame();
        device.clear(&ClearParams::color([0.1, 0.2, 0.3, 1.0]));
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        device.present();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices, 3);
        assert_eq!(stats.triangles, 1);
        let counts = device.api().counts();
        assert_eq!(counts.draws, 1);
        assert_eq!(counts.passes, 1);
        assert_eq!(counts.clears, 1);
        assert_eq!(counts.submits, 1);
        assert_eq!(counts.presents, 1);
        assert!(device.api().errors().is_empty(), "{:?}", device.api().errors());
    }

    #[test]
    fn draws_without_a_pipeline_are_counted_but_not_recorded() {
        let mut device = device();
        device.begin_frame();
        device.draw(&DrawParams::new(3));
        device.end_frame();
        device.flush();
        assert_eq!(device.stats().draw_calls, 1);
        assert_eq!(device.stats().vertices, 3);
        assert_eq!(device.api().counts().draws, 0);
        assert_eq!(device.api().counts().submits, 0);
    }

    #[test]
    fn zero_instance_draws_are_skipped() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3).instanced(0));
        device.bind_pipeline(None);
        device.draw(&DrawParams::new(3).instanced(0));
        assert_eq!(device.stats().draw_calls, 0);
        assert_eq!(device.api().counts().draws, 0);
    }

    #[test]
    fn work_outside_a_frame_is_skipped() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        device.bind_pipeline(Some(&pipeline));
        device.clear(&ClearParams::default());
        device.draw(&DrawParams::new(3));
        assert_eq!(device.api().counts().passes, 0);
        assert_eq!(device.stats().draw_calls, 0);
    }

    #[test]
    fn bindings_read_outside_their_visibility_fail_the_build() {
        let mut device = device();
        let layout = ShaderResourceLayout::new()
            .uniform_buffer("Globals", 0, 0)
            .visible_to(ShaderStageFlags::FRAGMENT)
            .texture("albedo", 0, 1)
            .sampler("albedo_sampler", 0, 2);
        let pipeline = device.create_pipeline(&unlit_desc().with_resource_layout(layout));
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("Globals"), "{}", pipeline.compile_log());
    }

    #[test]
    fn glsl_is_rejected_with_a_log() {
        let mut device = device();
        let desc = PipelineDesc::new("gl-only")
            .with_shader(ShaderDesc::glsl("v", ShaderStage::Vertex, "#version 450\nvoid main() {}"));
        let pipeline = device.create_pipeline(&desc);
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains(BACKEND));
        assert!(device.create_shader(&desc.shaders[0]).is_err());
    }

    #[test]
    fn shader_inputs_must_exist_in_the_vertex_layout() {
        let mut device = device();
        let partial = VertexLayout::single(VertexBufferLayout::packed(&[(0, VertexFormat::Float32x3)]));
        let pipeline = device.create_pipeline(&mesh_desc(partial));
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("location 1"), "{}", pipeline.compile_log());

        let full = VertexLayout::single(VertexBufferLayout::packed(&[
            (0, VertexFormat::Float32x3),
            (1, VertexFormat::Float32x2),
        ]));
        let pipeline = device.create_pipeline(&mesh_desc(full));
        assert!(pipeline.is_linked(), "{}", pipeline.compile_log());
    }

    #[test]
    fn reflected_bindings_must_be_declared() {
        let mut device = device();
        let before = device.api().live_objects();
        let desc = unlit_desc().with_resource_layout(ShaderResourceLayout::new().uniform_buffer("Globals", 0, 0));
        let pipeline = device.create_pipeline(&desc);
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("binding 1"), "{}", pipeline.compile_log());
        assert_eq!(device.api().live_objects(), before);
        assert_eq!(device.stats().pipeline_count, 0);
    }

    #[test]
    fn empty_texture_slots_use_the_default_texture() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.bind_texture(None, 0);
        device.draw(&DrawParams::new(3));

        let writes = table_of(&device, &pipeline, 0);
        let texture = writes.iter().find(|w| w.binding == 1).unwrap();
        assert_eq!(texture.resource, DescriptorResource::Texture(device.default_texture_raw()));
        assert!(device.api().errors().is_empty(), "{:?}", device.api().errors());
    }

    #[test]
    fn bound_textures_fill_their_slot_and_sampler() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        let texture = device
            .create_texture(&TextureDesc::new_2d("albedo", TextureFormat::Rgba8Unorm, 4, 4))
            .unwrap();
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.bind_texture(Some(&texture), 0);
        device.draw(&DrawParams::new(3));
        device.draw(&DrawParams::new(3));

        let writes = table_of(&device, &pipeline, 1);
        assert_eq!(writes[1].resource, DescriptorResource::Texture(texture.raw()));
        assert!(matches!(writes[2].resource, DescriptorResource::Sampler(_)));
        // One transition to the sampled state despite two draws.
        assert_eq!(device.tracker.state(texture.raw()), ResourceState::Read);
        assert!(device.api().errors().is_empty(), "{:?}", device.api().errors());
    }

    #[test]
    fn uniforms_land_at_their_reflected_offsets() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        pipeline.set_uniform("Globals.tint", [0.5f32, 0.25, 1.0, 1.0]);
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));

        let values = constants(&device, &table_of(&device, &pipeline, 0));
        assert_relative_eq!(values[16], 0.5);
        assert_relative_eq!(values[17], 0.25);
        assert_relative_eq!(values[18], 1.0);
    }

    #[test]
    fn row_major_matrices_are_transposed() {
        let mut device = device();
        let mut desc = unlit_desc();
        desc.matrix_layout = MatrixLayout::RowMajor;
        let pipeline = device.create_pipeline(&desc);
        let mut mvp = [0.0f32; 16];
        mvp[3] = 5.0;
        pipeline.set_uniform("mvp", mvp);
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));

        let values = constants(&device, &table_of(&device, &pipeline, 0));
        assert_relative_eq!(values[12], 5.0);
        assert_relative_eq!(values[3], 0.0);
    }

    #[test]
    fn committing_twice_writes_once() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        device.begin_frame();
        pipeline.set_uniform("tint", UniformValue::Vec4([1.0; 4]));
        device.commit_parameters(&pipeline);
        let writes = device.api().counts().buffer_writes;
        device.commit_parameters(&pipeline);
        assert_eq!(device.api().counts().buffer_writes, writes);

        pipeline.set_uniform("unknown", 1.0f32);
        device.commit_parameters(&pipeline);
        assert_eq!(device.api().counts().buffer_writes, writes);
    }

    #[test]
    fn repeated_barriers_are_recorded_once() {
        let mut device = device();
        let texture = device
            .create_texture(&TextureDesc::render_target("target", TextureFormat::Rgba8Unorm, 8, 8))
            .unwrap();
        device.resource_barrier(&texture, ResourceState::Read);
        device.resource_barrier(&texture, ResourceState::Read);
        assert_eq!(device.api().counts().barriers, 1);
        device.resource_barrier(&texture, ResourceState::Write);
        assert_eq!(device.api().counts().barriers, 2);
    }

    #[test]
    fn frame_slots_wait_for_their_fence() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        for _ in 0..3 {
            device.begin_frame();
            device.bind_pipeline(Some(&pipeline));
            device.draw(&DrawParams::new(3));
            device.end_frame();
            device.present();
        }
        let counts = device.api().counts();
        assert_eq!(counts.submits, 3);
        assert_eq!(counts.fence_waits, 1);
        assert_eq!(device.api().retired_fence(), 1);
    }

    #[test]
    fn unsubmitted_frames_are_fenced_under_their_own_slot() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        pipeline.set_uniform("tint", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));

        device.begin_frame();
        let skipped_slot = device.frame_index();
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.end_frame();

        device.begin_frame();
        assert_eq!(device.api().counts().submits, 1);
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        device.present();

        device.begin_frame();
        assert_eq!(device.frame_index(), skipped_slot);
        let counts = device.api().counts();
        assert_eq!(counts.submits, 2);
        assert_eq!(counts.fence_waits, 1);
        assert_eq!(device.api().retired_fence(), 1);
    }

    #[test]
    fn released_objects_outlive_the_frames_that_used_them() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        let frame = |device: &mut TableDevice<HeadlessTable>| {
            device.begin_frame();
            device.bind_pipeline(Some(&pipeline));
            device.draw(&DrawParams::new(3));
            device.end_frame();
            device.present();
        };
        frame(&mut device);
        let buffer = device
            .create_buffer(&BufferDesc::new("transient", BufferType::Vertex, 64))
            .unwrap();
        let live = device.api().live_objects();
        drop(buffer);
        frame(&mut device);
        frame(&mut device);
        assert_eq!(device.api().live_objects(), live);
        frame(&mut device);
        assert_eq!(device.api().live_objects(), live - 1);
        assert_eq!(device.stats().buffer_count, 0);
    }

    #[test]
    fn finish_destroys_pending_releases() {
        let mut device = device();
        let buffer = device
            .create_buffer(&BufferDesc::new("transient", BufferType::Vertex, 64))
            .unwrap();
        let live = device.api().live_objects();
        drop(buffer);
        device.finish();
        assert_eq!(device.api().live_objects(), live - 1);
    }

    #[test]
    fn exhausted_heap_regions_skip_draws_until_the_next_frame() {
        let config = DeviceConfig {
            max_draws_per_pipeline: 2,
            ..config()
        };
        let mut device = TableDevice::headless(&config).unwrap();
        let pipeline = device.create_pipeline(&unlit_desc());
        for _ in 0..2 {
            device.begin_frame();
            device.bind_pipeline(Some(&pipeline));
            for _ in 0..3 {
                device.draw(&DrawParams::new(3));
            }
            assert_eq!(device.stats().draw_calls, 2);
            device.end_frame();
            device.present();
        }
        assert_eq!(device.api().counts().draws, 4);
    }

    #[test]
    fn culling_every_face_skips_triangle_draws() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.set_render_state(&RenderState {
            cull_mode: CullMode::FrontAndBack,
            ..RenderState::default()
        });
        device.draw(&DrawParams::new(3));
        assert_eq!(device.stats().draw_calls, 0);
    }

    #[test]
    fn new_targets_and_states_build_state_variants() {
        let mut device = device();
        let pipeline = device.create_pipeline(&unlit_desc());
        let color = device
            .create_texture(&TextureDesc::render_target("hdr", TextureFormat::Rgba16Float, 64, 64))
            .unwrap();
        let framebuffer = device
            .create_framebuffer(&FramebufferDesc::new("hdr").with_color(color))
            .unwrap();
        assert_eq!(device.pipeline_state_count(&pipeline), 1);

        device.begin_frame();
        device.begin_render_pass(&RenderPassParams::new("hdr").with_framebuffer(Arc::clone(&framebuffer)));
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.draw(&DrawParams::new(3));
        assert_eq!(device.pipeline_state_count(&pipeline), 2);
        device.set_render_state(&RenderState {
            blend_mode: BlendMode::Additive,
            ..*pipeline.render_state()
        });
        device.draw(&DrawParams::new(3));
        device.end_render_pass();
        assert_eq!(device.pipeline_state_count(&pipeline), 3);
        assert_eq!(device.api().counts().pipeline_binds, 2);
        assert!(device.api().errors().is_empty(), "{:?}", device.api().errors());
    }

    #[test]
    fn indexed_draws_need_an_index_buffer() {
        let mut device = device();
        let layout = VertexBufferLayout::packed(&[(0, VertexFormat::Float32x3), (1, VertexFormat::Float32x2)]);
        let pipeline = device.create_pipeline(&mesh_desc(VertexLayout::single(layout.clone())));
        let vertices = device
            .create_buffer(&BufferDesc::new("vertices", BufferType::Vertex, 60))
            .unwrap();
        let indices = device
            .create_buffer(&BufferDesc::new("indices", BufferType::Index, 12))
            .unwrap();
        let plain = device
            .create_vertex_array(
                &VertexArrayDesc::new("plain").with_vertex_buffer(Arc::clone(&vertices), layout.clone()),
            )
            .unwrap();
        let indexed = device
            .create_vertex_array(
                &VertexArrayDesc::new("indexed")
                    .with_vertex_buffer(vertices, layout)
                    .with_index_buffer(indices, IndexFormat::Uint16),
            )
            .unwrap();

        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.bind_vertex_array(Some(&plain));
        device.draw_indexed(&DrawIndexedParams::new(6));
        assert_eq!(device.stats().draw_calls, 0);
        device.bind_vertex_array(Some(&indexed));
        device.draw_indexed(&DrawIndexedParams::new(6));
        assert_eq!(device.stats().draw_calls, 1);
        assert!(device.api().errors().is_empty(), "{:?}", device.api().errors());
    }

    #[test]
    fn blits_copy_between_attachments() {
        let mut device = device();
        let source = device
            .create_texture(&TextureDesc::render_target("a", TextureFormat::Rgba8Unorm, 16, 16))
            .unwrap();
        let destination = device
            .create_texture(&TextureDesc::render_target("b", TextureFormat::Rgba8Unorm, 16, 16))
            .unwrap();
        let a = device
            .create_framebuffer(&FramebufferDesc::new("a").with_color(source))
            .unwrap();
        let b = device
            .create_framebuffer(&FramebufferDesc::new("b").with_color(destination))
            .unwrap();
        device.blit(&BlitParams::color(Some(a.clone()), Some(b.clone()), 16, 16));
        assert_eq!(device.api().counts().copies, 1);
        assert_eq!(device.api().counts().barriers, 2);

        let mut scaled = BlitParams::color(Some(a), Some(b), 16, 16);
        scaled.destination_rect = ScissorRect::new(8, 8);
        device.blit(&scaled);
        assert_eq!(device.api().counts().copies, 1);
    }
}

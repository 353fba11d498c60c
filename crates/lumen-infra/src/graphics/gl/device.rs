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

//! The immediate backend device.

use super::api::{GlApi, GlAttribute, GlBlit, GlTextureSpec, GlVertexBuffer};
use super::conversions::{min_filter, GlFormat, GlVertexFormat, IntoGl};
use super::headless::HeadlessGl;
use super::state::{apply_render_state, BindingCache};
use crate::graphics::reflection::NagaReflector;
use anyhow::{anyhow, Result};
use lumen_core::{
    AdapterInfo, BindingCategory, BindingKind, BlitParams, Buffer, BufferDesc, ClearParams, CommandBuffer,
    Device, DeviceConfig, DrawIndexedParams, DrawParams, FrameTracker, Framebuffer, FramebufferDesc, GpuResource,
    GraphicsApi, GraphicsCapabilities, MatrixLayout, NativeHandle, Pipeline, PipelineDesc, PipelineError,
    PrimitiveType, RecordingError, ReleaseQueue, RenderPassParams, RenderState, RenderStats, ResourceError,
    ResourceKind, ResourceState, ScissorRect, Shader, ShaderDesc, ShaderError, ShaderReflector, ShaderSource,
    Texture, TextureDesc, TextureFilter, TextureFormat, TextureType, Uploadable, VertexArray, VertexArrayDesc,
    VertexStepMode, Viewport, WindowSurface,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A uniform block of a linked program, backed by its own buffer.
#[derive(Debug)]
struct BlockBuffer {
    binding: u32,
    buffer: u32,
}

#[derive(Debug, Default)]
struct ProgramEntry {
    locations: HashMap<String, Option<u32>>,
    blocks: Vec<BlockBuffer>,
}

fn binding_category(kind: ResourceKind) -> Option<BindingCategory> {
    match kind {
        ResourceKind::Pipeline => Some(BindingCategory::Pipeline),
        ResourceKind::VertexArray => Some(BindingCategory::VertexArray),
        ResourceKind::Framebuffer => Some(BindingCategory::Framebuffer),
        ResourceKind::Texture => Some(BindingCategory::Texture),
        ResourceKind::Buffer | ResourceKind::Shader => None,
    }
}

fn texture_spec(desc: &TextureDesc) -> GlTextureSpec<'_> {
    let format: GlFormat = desc.format.into_gl();
    let depth = match desc.texture_type {
        TextureType::Texture3D => desc.depth,
        TextureType::Texture2DArray => desc.array_size,
        TextureType::Texture2D | TextureType::TextureCube => 1,
    };
    GlTextureSpec {
        target: desc.texture_type.into_gl(),
        internal_format: format.internal,
        format: format.format,
        ty: format.ty,
        width: desc.width,
        height: desc.height,
        depth,
        mip_levels: desc.mip_levels,
        min_filter: min_filter(desc.sampler.min_filter, desc.mip_levels),
        mag_filter: desc.sampler.mag_filter.into_gl(),
        wrap: [
            desc.sampler.wrap_u.into_gl(),
            desc.sampler.wrap_v.into_gl(),
            desc.sampler.wrap_w.into_gl(),
        ],
        data: desc.initial_data.as_deref(),
    }
}

/// Immediate-mode device over any [`GlApi`].
///
/// Commands turn into GL calls as they arrive. The device keeps the "current"
/// pipeline, vertex array, framebuffer and texture units itself and skips
/// calls that would rebind what is already bound.
pub struct GlDevice<A: GlApi> {
    api: A,
    window: Option<Arc<dyn WindowSurface>>,
    info: AdapterInfo,
    caps: GraphicsCapabilities,
    stats: RenderStats,
    frame: FrameTracker,
    releases: ReleaseQueue,
    reflector: NagaReflector,

    bindings: BindingCache,
    applied_state: Option<RenderState>,
    current_pipeline: Option<Arc<Pipeline>>,
    current_vertex_array: Option<Arc<VertexArray>>,
    programs: HashMap<u64, ProgramEntry>,
    default_texture: Arc<Texture>,
    surface_size: (u32, u32),
    target_size: (u32, u32),
    render_pass_open: bool,

    tracked_buffers: Vec<Weak<Buffer>>,
    tracked_textures: Vec<Weak<Texture>>,
}

impl<A: GlApi> std::fmt::Debug for GlDevice<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDevice")
            .field("info", &self.info)
            .field("phase", &self.frame.phase())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl GlDevice<HeadlessGl> {
    /// A device over the in-memory driver.
    pub fn headless(config: &DeviceConfig) -> Result<Self> {
        Self::new(HeadlessGl::new(), None, config)
    }
}

impl<A: GlApi> GlDevice<A> {
    /// Wraps a driver whose context is current on this thread.
    pub fn new(mut api: A, window: Option<Arc<dyn WindowSurface>>, config: &DeviceConfig) -> Result<Self> {
        let info = api.adapter_info();
        let caps = Self::query_capabilities(&api);
        let surface_size = window
            .as_ref()
            .map_or((config.width, config.height), |w| w.framebuffer_size());

        let white = TextureDesc::new_2d("lumen.default_white", TextureFormat::Rgba8Unorm, 1, 1)
            .with_data(vec![255; 4])
            .with_sampler(lumen_core::SamplerDesc {
                min_filter: TextureFilter::Nearest,
                mag_filter: TextureFilter::Nearest,
                ..Default::default()
            });
        let raw = api
            .create_texture(&texture_spec(&white))
            .map_err(|e| anyhow!("GlDevice: failed to create the default texture: {e}"))?;
        let default_texture = Arc::new(Texture::new(
            white,
            NativeHandle::detached(GraphicsApi::OpenGl, ResourceKind::Texture, raw as u64),
        ));

        let initial_state = RenderState::default();
        apply_render_state(&mut api, None, &initial_state);

        log::info!(
            "GlDevice: using '{}' ({}), driver {}",
            info.device_name,
            info.vendor_name,
            info.driver_version
        );
        if !config.vsync {
            log::debug!("GlDevice: swap interval is owned by the window's context");
        }

        Ok(Self {
            api,
            window,
            info,
            caps,
            stats: RenderStats::default(),
            frame: FrameTracker::new("GlDevice"),
            releases: ReleaseQueue::new(),
            reflector: NagaReflector,
            bindings: BindingCache::default(),
            applied_state: Some(initial_state),
            current_pipeline: None,
            current_vertex_array: None,
            programs: HashMap::new(),
            default_texture,
            surface_size,
            target_size: surface_size,
            render_pass_open: false,
            tracked_buffers: Vec::new(),
            tracked_textures: Vec::new(),
        })
    }

    fn query_capabilities(api: &A) -> GraphicsCapabilities {
        let baseline = GraphicsCapabilities::baseline(GraphicsApi::OpenGl);
        let get = |parameter: u32, fallback: u32| match api.get_integer(parameter) {
            value if value > 0 => value as u32,
            _ => fallback,
        };
        let units = get(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS, baseline.max_texture_slots + 1);
        GraphicsCapabilities {
            api: GraphicsApi::OpenGl,
            max_texture_size: get(glow::MAX_TEXTURE_SIZE, baseline.max_texture_size),
            max_color_attachments: get(glow::MAX_COLOR_ATTACHMENTS, baseline.max_color_attachments),
            max_vertex_attributes: get(glow::MAX_VERTEX_ATTRIBS, baseline.max_vertex_attributes),
            max_uniform_buffer_size: get(glow::MAX_UNIFORM_BLOCK_SIZE, baseline.max_uniform_buffer_size),
            constant_buffer_alignment: get(
                glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT,
                baseline.constant_buffer_alignment,
            ),
            // The last unit is reserved for uploads.
            max_texture_slots: units.saturating_sub(1).min(32),
            supports_multithreading: true,
            supports_compute: api.get_integer(glow::MAX_COMPUTE_WORK_GROUP_INVOCATIONS) > 0,
            matrix_layout: MatrixLayout::ColumnMajor,
        }
    }

    /// The underlying driver.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Native name of the texture bound for `None`.
    pub fn default_texture_raw(&self) -> u64 {
        self.default_texture.raw()
    }

    /// Number of programs with live uniform state.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    // --- Lifetime ---

    fn process_releases(&mut self) {
        for released in self.releases.drain() {
            let raw = released.raw as u32;
            match released.kind {
                ResourceKind::Buffer => self.api.delete_buffer(raw),
                ResourceKind::Texture => self.api.delete_texture(raw),
                ResourceKind::Shader => self.api.delete_shader(raw),
                ResourceKind::Pipeline => {
                    if let Some(entry) = self.programs.remove(&released.raw) {
                        for block in entry.blocks {
                            self.api.delete_buffer(block.buffer);
                        }
                    }
                    self.api.delete_program(raw);
                }
                ResourceKind::Framebuffer => self.api.delete_framebuffer(raw),
                ResourceKind::VertexArray => self.api.delete_vertex_array(raw),
            }
            if let Some(category) = binding_category(released.kind) {
                self.bindings.forget_object(category, released.raw);
            }
            self.stats.resource_released(released.kind, released.size_bytes);
            log::trace!("GlDevice: released {:?} {}", released.kind, released.raw);
        }
    }

    fn handle(&self, kind: ResourceKind, raw: u32, size: u64) -> NativeHandle {
        NativeHandle::new(GraphicsApi::OpenGl, kind, raw as u64, size, self.releases.sender())
    }

    // --- Uploads ---

    fn flush_buffer(&mut self, buffer: &Buffer) {
        let target = buffer.desc().buffer_type.into_gl();
        for write in buffer.take_pending() {
            self.api
                .buffer_sub_data(target, buffer.raw() as u32, write.offset as usize, &write.data);
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
                "GlDevice: staged writes to {:?} texture '{}' are not supported; dropped",
                desc.texture_type,
                desc.debug_name
            );
            return;
        }
        let row_bytes = desc.width as u64 * desc.format.bytes_per_pixel() as u64;
        let spec = texture_spec(desc);
        for write in pending {
            let len = write.data.len() as u64;
            if write.offset % row_bytes != 0 || len % row_bytes != 0 {
                log::warn!(
                    "GlDevice: write of {len} bytes at {} into '{}' does not cover whole rows; dropped",
                    write.offset,
                    desc.debug_name
                );
                continue;
            }
            let y = (write.offset / row_bytes) as u32;
            let rows = (len / row_bytes) as u32;
            self.api.texture_rows(&spec, texture.raw() as u32, y, rows, &write.data);
        }
    }

    // --- Binding helpers ---

    fn bind_texture_raw(&mut self, texture: &Texture, slot: u32) {
        if self.bindings.bind(BindingCategory::Texture, slot, texture.raw()) {
            let target = texture.desc().texture_type.into_gl();
            self.api.bind_texture(slot, target, texture.raw() as u32);
        }
    }

    /// Binds the default texture to every slot the pipeline samples from
    /// that has nothing bound yet.
    fn fill_unbound_slots(&mut self, pipeline: &Pipeline) {
        let declared = pipeline.desc().resource_layout.texture_slot_count();
        let reflected = pipeline.reflection().map_or(0, |r| {
            r.bindings
                .iter()
                .filter(|b| b.kind == BindingKind::Texture)
                .map(|b| b.binding + 1)
                .max()
                .unwrap_or(0)
        });
        let slots = declared.max(reflected).min(self.caps.max_texture_slots);
        for slot in 0..slots {
            if self.bindings.get(BindingCategory::Texture, slot).is_none() {
                let texture = Arc::clone(&self.default_texture);
                self.bind_texture_raw(&texture, slot);
            }
        }
    }

    /// Resolves the draw mode of the current pipeline. `None` means the draw
    /// must be skipped.
    fn prepare_draw(&mut self, operation: &str) -> Option<PrimitiveType> {
        if !self.frame.allows(operation) {
            return None;
        }
        let Some(pipeline) = self.current_pipeline.clone() else {
            log::trace!("GlDevice: {operation} issued without a pipeline");
            return Some(PrimitiveType::Triangles);
        };
        if !pipeline.is_linked() {
            log::debug!(
                "GlDevice: {operation} skipped, pipeline '{}' is not linked",
                pipeline.debug_name()
            );
            return None;
        }
        if pipeline.has_dirty_parameters() {
            self.commit_parameters(&pipeline);
        }
        self.fill_unbound_slots(&pipeline);
        Some(pipeline.desc().primitive_type)
    }

    /// Converts a top-left rectangle to GL's bottom-left origin.
    fn flip_y(&self, y: i32, height: i32) -> i32 {
        self.target_size.1 as i32 - y - height
    }

    fn track<T>(list: &mut Vec<Weak<T>>, resource: &Arc<T>) {
        list.retain(|w| w.strong_count() > 0);
        list.push(Arc::downgrade(resource));
    }
}

impl<A: GlApi> Device for GlDevice<A> {
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
        GraphicsApi::OpenGl
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
        let raw = self
            .api
            .create_buffer(
                desc.buffer_type.into_gl(),
                desc.size as usize,
                desc.initial_data.as_deref(),
                desc.usage.into_gl(),
            )
            .map_err(|e| {
                log::error!("GlDevice: failed to create buffer '{}': {e}", desc.debug_name);
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
        let raw = self.api.create_texture(&texture_spec(desc)).map_err(|e| {
            log::error!("GlDevice: failed to create texture '{}': {e}", desc.debug_name);
            ResourceError::BackendError(e)
        })?;
        let size = desc.total_size();
        let texture = Arc::new(Texture::new(desc.clone(), self.handle(ResourceKind::Texture, raw, size)));
        self.stats.resource_created(ResourceKind::Texture, size);
        Self::track(&mut self.tracked_textures, &texture);
        Ok(texture)
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>, ResourceError> {
        let ShaderSource::Glsl(source) = &desc.source else {
            return Err(ShaderError::UnsupportedSource {
                label: desc.debug_name.clone(),
                backend: "OpenGL".to_string(),
            }
            .into());
        };
        let raw = self.api.compile_shader(desc.stage.into_gl(), source).map_err(|log| {
            log::error!("GlDevice: shader '{}' failed to compile:\n{log}", desc.debug_name);
            ShaderError::CompilationFailed {
                label: desc.debug_name.clone(),
                log,
            }
        })?;
        self.stats.resource_created(ResourceKind::Shader, 0);
        Ok(Arc::new(Shader::new(desc.clone(), self.handle(ResourceKind::Shader, raw, 0))))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Arc<Pipeline> {
        let failed = |log: String| {
            log::error!("GlDevice: pipeline '{}' failed to build: {log}", desc.debug_name);
            Arc::new(Pipeline::failed(
                desc.clone(),
                NativeHandle::detached(GraphicsApi::OpenGl, ResourceKind::Pipeline, 0),
                log,
            ))
        };
        if let Err(err) = desc.validate() {
            return failed(err.to_string());
        }

        let mut compiled = Vec::with_capacity(desc.shaders.len());
        let mut compile_error = None;
        for shader in &desc.shaders {
            let result = match &shader.source {
                ShaderSource::Glsl(source) => self
                    .api
                    .compile_shader(shader.stage.into_gl(), source)
                    .map_err(|log| ShaderError::CompilationFailed {
                        label: shader.debug_name.clone(),
                        log,
                    }),
                _ => Err(ShaderError::UnsupportedSource {
                    label: shader.debug_name.clone(),
                    backend: "OpenGL".to_string(),
                }),
            };
            match result {
                Ok(raw) => compiled.push(raw),
                Err(err) => {
                    compile_error = Some(err);
                    break;
                }
            }
        }
        let linked = match compile_error {
            Some(err) => Err(PipelineError::from(err)),
            None => self.api.link_program(&compiled).map_err(|log| PipelineError::LinkFailed {
                label: desc.debug_name.clone(),
                log,
            }),
        };
        for shader in compiled {
            self.api.delete_shader(shader);
        }
        let program = match linked {
            Ok(program) => program,
            Err(err) => return failed(err.to_string()),
        };

        let reflection = match self.reflector.reflect_pipeline(desc) {
            Ok(reflection) => Some(reflection),
            Err(err) => {
                log::debug!("GlDevice: no reflection for '{}': {err}", desc.debug_name);
                None
            }
        };
        let mut entry = ProgramEntry::default();
        for block in reflection.iter().flat_map(|r| r.uniform_blocks.iter()) {
            let size = block.size.max(16).div_ceil(16) * 16;
            match self
                .api
                .create_buffer(glow::UNIFORM_BUFFER, size as usize, None, glow::DYNAMIC_DRAW)
            {
                Ok(buffer) => entry.blocks.push(BlockBuffer {
                    binding: block.binding,
                    buffer,
                }),
                Err(e) => log::warn!(
                    "GlDevice: no buffer for block {:?} of '{}': {e}",
                    block.name,
                    desc.debug_name
                ),
            }
        }
        self.programs.insert(program as u64, entry);
        self.stats.resource_created(ResourceKind::Pipeline, 0);
        log::debug!("GlDevice: linked pipeline '{}' as program {program}", desc.debug_name);
        Arc::new(Pipeline::linked(
            desc.clone(),
            self.handle(ResourceKind::Pipeline, program, 0),
            reflection,
            String::new(),
        ))
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<Framebuffer>, ResourceError> {
        desc.validate(self.caps.max_color_attachments)?;
        let colors: Vec<u32> = desc.color_attachments.iter().map(|t| t.raw() as u32).collect();
        let depth = desc.depth_attachment.as_ref().map(|t| {
            let attachment = if t.format().has_stencil() {
                glow::DEPTH_STENCIL_ATTACHMENT
            } else {
                glow::DEPTH_ATTACHMENT
            };
            (t.raw() as u32, attachment)
        });
        let result = self.api.create_framebuffer(&colors, depth);
        // Creation leaves the default framebuffer bound.
        let current = self.bindings.get(BindingCategory::Framebuffer, 0).unwrap_or(0);
        if current != 0 {
            self.api.bind_framebuffer(current as u32);
        }
        let raw = result.map_err(|e| {
            log::error!("GlDevice: failed to create framebuffer '{}': {e}", desc.debug_name);
            ResourceError::BackendError(e)
        })?;
        Ok(Arc::new(Framebuffer::new(
            desc.clone(),
            self.handle(ResourceKind::Framebuffer, raw, 0),
        )))
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<Arc<VertexArray>, ResourceError> {
        desc.validate()?;
        let mut buffers = Vec::with_capacity(desc.vertex_buffers.len());
        for (buffer, layout) in &desc.vertex_buffers {
            let mut attributes = Vec::with_capacity(layout.attributes.len());
            for attribute in &layout.attributes {
                if attribute.location >= self.caps.max_vertex_attributes {
                    return Err(ResourceError::InvalidDescriptor(format!(
                        "vertex array '{}': location {} exceeds the device limit of {}",
                        desc.debug_name, attribute.location, self.caps.max_vertex_attributes
                    )));
                }
                let format: GlVertexFormat = attribute.format.into_gl();
                attributes.push(GlAttribute {
                    location: attribute.location,
                    components: format.components,
                    ty: format.ty,
                    normalized: format.normalized,
                    integer: format.integer,
                    offset: attribute.offset as i32,
                });
            }
            buffers.push(GlVertexBuffer {
                buffer: buffer.raw() as u32,
                stride: layout.stride as i32,
                divisor: match layout.step_mode {
                    VertexStepMode::Vertex => 0,
                    VertexStepMode::Instance => 1,
                },
                attributes,
            });
        }
        let index = desc.index_buffer.as_ref().map(|(b, _)| b.raw() as u32);
        let result = self.api.create_vertex_array(&buffers, index);
        let current = self.bindings.get(BindingCategory::VertexArray, 0).unwrap_or(0);
        if current != 0 {
            self.api.bind_vertex_array(current as u32);
        }
        let raw = result.map_err(|e| {
            log::error!("GlDevice: failed to create vertex array '{}': {e}", desc.debug_name);
            ResourceError::BackendError(e)
        })?;
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
        self.process_releases();
        self.stats.begin_frame();
        if let Some(window) = &self.window {
            self.surface_size = window.framebuffer_size();
        }
        if self.bindings.get(BindingCategory::Framebuffer, 0).unwrap_or(0) == 0 {
            self.target_size = self.surface_size;
        }
    }

    fn end_frame(&mut self) {
        if self.render_pass_open {
            log::warn!("GlDevice: end_frame with an open render pass; closing it");
            self.render_pass_open = false;
        }
        if let Some(ms) = self.frame.end() {
            self.stats.frame_time_ms = ms;
        }
    }

    fn flush(&mut self) {
        self.flush_uploads();
        self.api.flush();
        self.frame.submitted();
    }

    fn finish(&mut self) {
        self.flush_uploads();
        self.api.finish();
        self.process_releases();
        self.frame.submitted();
    }

    fn present(&mut self) {
        match &self.window {
            Some(window) => window.swap_buffers(),
            None => self.api.flush(),
        }
        self.frame.submitted();
    }

    // --- State and drawing ---

    fn set_render_state(&mut self, state: &RenderState) {
        if self.applied_state.as_ref() == Some(state) {
            return;
        }
        apply_render_state(&mut self.api, self.applied_state.as_ref(), state);
        self.applied_state = Some(*state);
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        let height = viewport.height as i32;
        let y = self.flip_y(viewport.y as i32, height);
        self.api.viewport(
            viewport.x as i32,
            y,
            viewport.width as i32,
            height,
            viewport.min_depth,
            viewport.max_depth,
        );
    }

    fn set_scissor(&mut self, rect: Option<&ScissorRect>) {
        match rect {
            Some(rect) => {
                let y = self.flip_y(rect.y as i32, rect.height as i32);
                self.api.set_enabled(glow::SCISSOR_TEST, true);
                self.api.scissor(rect.x as i32, y, rect.width as i32, rect.height as i32);
            }
            None => self.api.set_enabled(glow::SCISSOR_TEST, false),
        }
    }

    fn clear(&mut self, params: &ClearParams) {
        if !self.frame.allows("clear") || !params.clears_anything() {
            return;
        }
        let mut mask = 0;
        if params.clear_color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if params.clear_stencil {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        // Depth clears honor the depth mask.
        let unmask_depth = params.clear_depth && self.applied_state.is_some_and(|s| !s.depth_write);
        if params.clear_depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if unmask_depth {
            self.api.depth_mask(true);
        }
        self.api.clear(mask, params.color, params.depth, params.stencil as i32);
        if unmask_depth {
            self.api.depth_mask(false);
        }
    }

    fn draw(&mut self, params: &DrawParams) {
        if params.instance_count == 0 {
            log::debug!("GlDevice: draw skipped, zero instances");
            return;
        }
        let Some(primitive) = self.prepare_draw("draw") else {
            return;
        };
        self.api.draw_arrays(
            primitive.into_gl(),
            params.first_vertex as i32,
            params.vertex_count as i32,
            params.instance_count as i32,
        );
        self.stats
            .record_draw(primitive, params.vertex_count, params.instance_count);
    }

    fn draw_indexed(&mut self, params: &DrawIndexedParams) {
        if params.instance_count == 0 {
            log::debug!("GlDevice: draw_indexed skipped, zero instances");
            return;
        }
        let Some(format) = self
            .current_vertex_array
            .as_ref()
            .and_then(|v| v.index_buffer().map(|(_, format)| *format))
        else {
            log::debug!("GlDevice: draw_indexed skipped, no index buffer bound");
            return;
        };
        let Some(primitive) = self.prepare_draw("draw_indexed") else {
            return;
        };
        self.api.draw_elements(
            primitive.into_gl(),
            params.index_count as i32,
            format.into_gl(),
            (params.first_index as u64 * format.size()) as i32,
            params.base_vertex,
            params.instance_count as i32,
        );
        self.stats
            .record_draw(primitive, params.index_count, params.instance_count);
    }

    fn bind_pipeline(&mut self, pipeline: Option<&Arc<Pipeline>>) {
        let Some(pipeline) = pipeline else {
            if self.bindings.bind(BindingCategory::Pipeline, 0, 0) {
                self.api.use_program(0);
            }
            self.current_pipeline = None;
            return;
        };
        self.current_pipeline = Some(Arc::clone(pipeline));
        if !pipeline.is_linked() {
            log::debug!("GlDevice: bound unlinked pipeline '{}'", pipeline.debug_name());
            return;
        }
        if self.bindings.bind(BindingCategory::Pipeline, 0, pipeline.raw()) {
            self.api.use_program(pipeline.raw() as u32);
            if let Some(entry) = self.programs.get(&pipeline.raw()) {
                for block in &entry.blocks {
                    self.api.bind_uniform_buffer(block.binding, block.buffer);
                }
            }
        }
        self.set_render_state(pipeline.render_state());
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
        let raw = vertex_array.map_or(0, |v| v.raw());
        if self.bindings.bind(BindingCategory::VertexArray, 0, raw) {
            self.api.bind_vertex_array(raw as u32);
        }
        self.current_vertex_array = vertex_array.cloned();
    }

    fn bind_texture(&mut self, texture: Option<&Arc<Texture>>, slot: u32) {
        if slot >= self.caps.max_texture_slots {
            log::warn!(
                "GlDevice: texture slot {slot} exceeds the {} available; ignored",
                self.caps.max_texture_slots
            );
            return;
        }
        let texture = match texture {
            Some(texture) => {
                if texture.has_pending() {
                    self.flush_texture(texture);
                }
                Arc::clone(texture)
            }
            None => Arc::clone(&self.default_texture),
        };
        self.bind_texture_raw(&texture, slot);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&Arc<Framebuffer>>) {
        let raw = framebuffer.map_or(0, |f| f.raw());
        if self.bindings.bind(BindingCategory::Framebuffer, 0, raw) {
            self.api.bind_framebuffer(raw as u32);
        }
        self.target_size = framebuffer
            .and_then(|f| f.extent())
            .unwrap_or(self.surface_size);
    }

    fn begin_render_pass(&mut self, params: &RenderPassParams) {
        if !self.frame.allows("begin_render_pass") {
            return;
        }
        if self.render_pass_open {
            log::warn!(
                "GlDevice: render pass '{}' begun inside another pass; closing the previous one",
                params.label
            );
        }
        self.bind_framebuffer(params.framebuffer.as_ref());
        let (width, height) = self.target_size;
        self.set_viewport(&Viewport::new(width as f32, height as f32));
        if let Some(clear) = &params.clear {
            self.clear(clear);
        }
        self.render_pass_open = true;
    }

    fn end_render_pass(&mut self) {
        if !self.render_pass_open {
            log::warn!("GlDevice: end_render_pass without begin_render_pass; ignored");
            return;
        }
        self.render_pass_open = false;
    }

    fn resource_barrier(&mut self, texture: &Arc<Texture>, state: ResourceState) {
        log::trace!("GlDevice: barrier on '{}' to {state:?} is implicit", texture.debug_name());
    }

    fn blit(&mut self, params: &BlitParams) {
        let mut mask = 0;
        if params.color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if params.depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if mask == 0 {
            return;
        }
        let rect = |r: &ScissorRect| [r.x as i32, r.y as i32, (r.x + r.width) as i32, (r.y + r.height) as i32];
        let filter = if params.depth {
            glow::NEAREST
        } else {
            params.filter.into_gl()
        };
        self.api.blit_framebuffer(&GlBlit {
            source: params.source.as_ref().map_or(0, |f| f.raw() as u32),
            destination: params.destination.as_ref().map_or(0, |f| f.raw() as u32),
            source_rect: rect(&params.source_rect),
            destination_rect: rect(&params.destination_rect),
            mask,
            filter,
        });
        // The copy rebinds both framebuffer targets.
        let current = self.bindings.get(BindingCategory::Framebuffer, 0).unwrap_or(0);
        self.api.bind_framebuffer(current as u32);
    }

    fn commit_parameters(&mut self, pipeline: &Pipeline) {
        let dirty = pipeline.take_dirty_parameters();
        if dirty.is_empty() {
            return;
        }
        if !pipeline.is_linked() {
            log::debug!("GlDevice: '{}' is not linked; uniforms dropped", pipeline.debug_name());
            return;
        }
        let program = pipeline.raw();
        let transpose = pipeline.desc().matrix_layout != self.caps.matrix_layout;
        let Some(entry) = self.programs.get_mut(&program) else {
            log::debug!("GlDevice: program {program} has no uniform state");
            return;
        };
        // Uniform writes target the current program.
        let previous = self.bindings.get(BindingCategory::Pipeline, 0);
        if previous != Some(program) {
            self.api.use_program(program as u32);
        }
        for (name, value) in dirty {
            let value = if transpose { value.transposed() } else { value };
            let api = &mut self.api;
            let location = *entry
                .locations
                .entry(name.clone())
                .or_insert_with(|| api.uniform_location(program as u32, &name));
            if let Some(location) = location {
                self.api.set_uniform(location, &value);
                continue;
            }
            let member = pipeline.reflection().and_then(|r| r.find_uniform(&name));
            let block = member.and_then(|(block, member)| {
                entry
                    .blocks
                    .iter()
                    .find(|b| b.binding == block.binding)
                    .map(|b| (b.buffer, member))
            });
            match block {
                Some((buffer, member)) => {
                    let mut bytes = value.to_bytes(false);
                    bytes.truncate(member.size as usize);
                    self.api
                        .buffer_sub_data(glow::UNIFORM_BUFFER, buffer, member.offset as usize, &bytes);
                }
                None => log::debug!(
                    "GlDevice: pipeline '{}' has no uniform '{name}'; dropped",
                    pipeline.debug_name()
                ),
            }
        }
        if previous != Some(program) {
            self.api.use_program(previous.unwrap_or(0) as u32);
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

impl<A: GlApi> Drop for GlDevice<A> {
    fn drop(&mut self) {
        self.api.finish();
        self.current_pipeline = None;
        self.current_vertex_array = None;
        self.process_releases();
        for (_, entry) in self.programs.drain() {
            for block in entry.blocks {
                self.api.delete_buffer(block.buffer);
            }
        }
        self.api.delete_texture(self.default_texture.raw() as u32);
        log::debug!("GlDevice: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{BufferType, ShaderStage, UniformValue};

    const VERTEX: &str = r#"#version 450
layout(location = 0) in vec3 a_position;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
layout(binding = 2) uniform mat4 u_model;
void main() {
    gl_Position = globals.u_mvp * u_model * vec4(a_position, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 450
layout(location = 0) out vec4 o_color;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
layout(binding = 1) uniform float u_time;
void main() {
    o_color = globals.u_tint * u_time;
}
"#;

    // Plain uniforms get locations in declaration order across stages.
    const U_MODEL: u32 = 0;
    const U_TIME: u32 = 1;

    fn device() -> GlDevice<HeadlessGl> {
        GlDevice::headless(&DeviceConfig::headless(GraphicsApi::OpenGl)).unwrap()
    }

    fn lit_desc() -> PipelineDesc {
        PipelineDesc::new("lit")
            .with_shader(ShaderDesc::glsl("lit.vert", ShaderStage::Vertex, VERTEX))
            .with_shader(ShaderDesc::glsl("lit.frag", ShaderStage::Fragment, FRAGMENT))
    }

    #[test]
    fn capabilities_come_from_the_driver() {
        let device = device();
        let caps = device.capabilities();
        assert_eq!(caps.max_texture_size, 8192);
        assert_eq!(caps.max_color_attachments, 8);
        assert_eq!(caps.max_texture_slots, 31);
        assert_eq!(caps.matrix_layout, MatrixLayout::ColumnMajor);
        assert!(device.supports_multithreading());
    }

    #[test]
    fn clear_and_draw_are_counted() {
        let mut device = device();
        device.begin_frame();
        device.clear(&ClearParams::color([0.1, 0.2, 0.3, 1.0]));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        device.present();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices, 3);
        assert_eq!(stats.triangles, 1);
        assert_eq!(device.api().counts().draws, 1);
        assert_eq!(device.api().counts().clears, 1);
    }

    #[test]
    fn work_outside_a_frame_is_skipped() {
        let mut device = device();
        device.clear(&ClearParams::default());
        device.draw(&DrawParams::new(3));
        assert_eq!(device.api().counts().draws, 0);
        assert_eq!(device.api().counts().clears, 0);
        assert_eq!(device.stats().draw_calls, 0);
    }

    #[test]
    fn zero_instance_draws_are_skipped() {
        let mut device = device();
        device.begin_frame();
        device.draw(&DrawParams::new(3).instanced(0));
        assert_eq!(device.api().counts().draws, 0);
        assert_eq!(device.stats().draw_calls, 0);
        device.draw(&DrawParams::new(3).instanced(2));
        assert_eq!(device.api().counts().draws, 1);
        assert_eq!(device.stats().vertices, 6);
    }

    #[test]
    fn second_begin_frame_is_ignored() {
        let mut device = device();
        device.begin_frame();
        device.draw(&DrawParams::new(3));
        device.begin_frame();
        assert_eq!(device.stats().frame_number, 1);
        assert_eq!(device.stats().draw_calls, 1);
    }

    #[test]
    fn pipeline_links_and_reflects() {
        let mut device = device();
        let pipeline = device.create_pipeline(&lit_desc());
        assert!(pipeline.is_linked(), "{}", pipeline.compile_log());
        let reflection = pipeline.reflection().unwrap();
        let (block, member) = reflection.find_uniform("Globals.u_tint").unwrap();
        assert_eq!(block.binding, 0);
        assert_eq!(member.offset, 64);
        assert_eq!(device.stats().pipeline_count, 1);
        assert_eq!(device.program_count(), 1);
    }

    #[test]
    fn link_failure_keeps_the_log() {
        let mut device = device();
        let desc = PipelineDesc::new("half").with_shader(ShaderDesc::glsl("half.vert", ShaderStage::Vertex, VERTEX));
        let pipeline = device.create_pipeline(&desc);
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("fragment"));
        assert_eq!(device.stats().pipeline_count, 0);
    }

    #[test]
    fn compile_failure_names_the_stage() {
        let mut device = device();
        let desc = PipelineDesc::new("broken")
            .with_shader(ShaderDesc::glsl("broken.vert", ShaderStage::Vertex, "#version 450\nvoid main() { oops }"))
            .with_shader(ShaderDesc::glsl("lit.frag", ShaderStage::Fragment, FRAGMENT));
        let pipeline = device.create_pipeline(&desc);
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("broken.vert"));
        // No shader object outlives the failed build besides the default texture.
        assert_eq!(device.api().live_objects(), 1);
    }

    #[test]
    fn non_glsl_sources_are_rejected() {
        let mut device = device();
        let wgsl = ShaderDesc::wgsl("sky", ShaderStage::Vertex, "@vertex fn main() {}", "main");
        assert!(matches!(
            device.create_shader(&wgsl),
            Err(ResourceError::Shader(ShaderError::UnsupportedSource { .. }))
        ));
        let pipeline = device.create_pipeline(&PipelineDesc::new("sky").with_shader(wgsl));
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("OpenGL"));
    }

    #[test]
    fn unlinked_pipeline_skips_draws() {
        let mut device = device();
        let broken = device.create_pipeline(&PipelineDesc::new("empty"));
        assert!(!broken.is_linked());
        device.begin_frame();
        device.bind_pipeline(Some(&broken));
        device.draw(&DrawParams::new(3));
        assert_eq!(device.api().counts().draws, 0);
        assert_eq!(device.stats().draw_calls, 0);
    }

    #[test]
    fn uniforms_commit_once_per_change() {
        let mut device = device();
        let pipeline = device.create_pipeline(&lit_desc());
        let program = pipeline.raw() as u32;
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));

        pipeline.set_uniform("u_time", 2.0f32);
        pipeline.set_uniform("u_tint", [1.0f32, 0.5, 0.25, 1.0]);
        pipeline.set_uniform("u_missing", 1.0f32);
        device.commit_parameters(&pipeline);

        assert_eq!(device.api().uniform_value(program, U_TIME), Some(UniformValue::Float(2.0)));
        let after_first = device.api().counts();
        assert_eq!(after_first.uniform_writes, 1);
        assert_eq!(after_first.buffer_writes, 1);

        device.commit_parameters(&pipeline);
        pipeline.set_uniform("u_time", 2.0f32);
        device.commit_parameters(&pipeline);
        assert_eq!(device.api().counts(), after_first);
    }

    #[test]
    fn row_major_matrices_are_transposed() {
        let mut device = device();
        let mut desc = lit_desc();
        desc.matrix_layout = MatrixLayout::RowMajor;
        let pipeline = device.create_pipeline(&desc);
        device.bind_pipeline(Some(&pipeline));

        let mut row_major = [0.0f32; 16];
        row_major[3] = 5.0; // row 0, column 3: a translation in x
        pipeline.set_uniform("u_model", row_major);
        device.commit_parameters(&pipeline);

        let Some(UniformValue::Mat4(uploaded)) = device.api().uniform_value(pipeline.raw() as u32, U_MODEL) else {
            panic!("u_model was not written");
        };
        assert_eq!(uploaded[12], 5.0);
        assert_eq!(uploaded[3], 0.0);
    }

    #[test]
    fn draws_flush_dirty_uniforms() {
        let mut device = device();
        let pipeline = device.create_pipeline(&lit_desc());
        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        pipeline.set_uniform("u_time", 4.0f32);
        device.draw(&DrawParams::new(3));
        assert!(!pipeline.has_dirty_parameters());
        assert_eq!(
            device.api().uniform_value(pipeline.raw() as u32, U_TIME),
            Some(UniformValue::Float(4.0))
        );
    }

    #[test]
    fn unbound_slot_gets_the_default_texture() {
        let mut device = device();
        device.bind_texture(None, 2);
        assert_eq!(device.api().texture_on_unit(2) as u64, device.default_texture_raw());
    }

    #[test]
    fn rebinding_a_texture_is_free() {
        let mut device = device();
        let texture = device
            .create_texture(&TextureDesc::new_2d("albedo", TextureFormat::Rgba8Unorm, 4, 4))
            .unwrap();
        device.bind_texture(Some(&texture), 0);
        device.bind_texture(Some(&texture), 0);
        assert_eq!(device.api().counts().texture_binds, 1);
        assert_eq!(device.api().texture_on_unit(0) as u64, texture.raw());
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut device = device();
        let slots = device.capabilities().max_texture_slots;
        device.bind_texture(None, slots);
        assert_eq!(device.api().counts().texture_binds, 0);
    }

    #[test]
    fn dropped_resources_are_released_at_frame_start() {
        let mut device = device();
        let buffer = device
            .create_buffer(&BufferDesc::new("scratch", BufferType::Vertex, 256))
            .unwrap();
        assert_eq!(device.stats().buffer_count, 1);
        assert_eq!(device.stats().memory_bytes, 256);
        let live = device.api().live_objects();

        drop(buffer);
        assert_eq!(device.stats().buffer_count, 1);
        device.begin_frame();
        assert_eq!(device.stats().buffer_count, 0);
        assert_eq!(device.stats().memory_bytes, 0);
        assert_eq!(device.api().live_objects(), live - 1);
    }

    #[test]
    fn update_buffer_writes_through() {
        let mut device = device();
        let buffer = device
            .create_buffer(&BufferDesc::new("instances", BufferType::Vertex, 8))
            .unwrap();
        device.update_buffer(&buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            device.api().buffer_contents(buffer.raw() as u32),
            Some(&[0, 0, 0, 0, 1, 2, 3, 4][..])
        );
        assert!(matches!(
            device.update_buffer(&buffer, 6, &[0; 4]),
            Err(ResourceError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn staged_texture_rows_upload_on_bind() {
        let mut device = device();
        let texture = device
            .create_texture(&TextureDesc::new_2d("atlas", TextureFormat::R8Unorm, 4, 4))
            .unwrap();
        texture.stage_write(4, &[9; 8]).unwrap();
        texture.stage_write(1, &[9; 2]).unwrap();
        device.bind_texture(Some(&texture), 0);
        // The partial-row write is dropped.
        assert_eq!(device.api().counts().texture_writes, 1);
        assert!(!texture.has_pending());
    }

    #[test]
    fn flush_uploads_drains_every_live_resource() {
        let mut device = device();
        let buffer = device
            .create_buffer(&BufferDesc::new("streamed", BufferType::Uniform, 16))
            .unwrap();
        buffer.stage_write(0, &[7; 16]).unwrap();
        device.flush_uploads();
        assert_eq!(device.api().buffer_contents(buffer.raw() as u32), Some(&[7; 16][..]));
    }

    #[test]
    fn indexed_draw_needs_an_index_buffer() {
        let mut device = device();
        device.begin_frame();
        device.draw_indexed(&DrawIndexedParams::new(6));
        assert_eq!(device.api().counts().draws, 0);

        let vertices = device
            .create_buffer(&BufferDesc::new("quad", BufferType::Vertex, 48))
            .unwrap();
        let indices = device
            .create_buffer(&BufferDesc::with_data(
                "quad.idx",
                BufferType::Index,
                bytemuck::cast_slice(&[0u16, 1, 2, 2, 3, 0]),
            ))
            .unwrap();
        let layout = lumen_core::VertexBufferLayout::packed(&[(0, lumen_core::VertexFormat::Float32x3)]);
        let vertex_array = device
            .create_vertex_array(
                &VertexArrayDesc::new("quad")
                    .with_vertex_buffer(vertices, layout)
                    .with_index_buffer(indices, lumen_core::IndexFormat::Uint16),
            )
            .unwrap();
        device.bind_vertex_array(Some(&vertex_array));
        device.draw_indexed(&DrawIndexedParams::new(6));
        assert_eq!(device.api().counts().draws, 1);
        assert_eq!(device.stats().triangles, 2);
    }

    #[test]
    fn framebuffer_binding_tracks_the_driver() {
        let mut device = device();
        let color = device
            .create_texture(&TextureDesc::render_target("hdr", TextureFormat::Rgba16Float, 64, 32))
            .unwrap();
        let depth = device
            .create_texture(&TextureDesc::render_target("depth", TextureFormat::Depth24PlusStencil8, 64, 32))
            .unwrap();
        let framebuffer = device
            .create_framebuffer(&FramebufferDesc::new("offscreen").with_color(color).with_depth(depth))
            .unwrap();

        device.begin_frame();
        device.begin_render_pass(
            &RenderPassParams::new("offscreen")
                .with_framebuffer(Arc::clone(&framebuffer))
                .with_clear(ClearParams::default()),
        );
        assert_eq!(device.api().bound_framebuffer() as u64, framebuffer.raw());
        device.end_render_pass();
        device.blit(&BlitParams::color(Some(Arc::clone(&framebuffer)), None, 64, 32));
        assert_eq!(device.api().counts().blits, 1);
        assert_eq!(device.api().bound_framebuffer() as u64, framebuffer.raw());
    }

    #[test]
    fn command_lists_dispatch_through_the_device() {
        let mut device = device();
        let list = device.create_command_list("main").unwrap();
        list.begin().unwrap();
        list.clear(ClearParams::default()).unwrap();
        list.draw(DrawParams::new(6)).unwrap();
        list.end().unwrap();

        device.begin_frame();
        assert_eq!(device.execute_command_list(&list), Ok(2));
        device.end_frame();
        assert_eq!(device.stats().triangles, 2);
    }
}

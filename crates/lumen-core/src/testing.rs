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

//! A device that records the calls it receives, for unit tests.

use crate::api::*;
use crate::error::{RecordingError, ResourceError};
use crate::traits::Device;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    BeginFrame,
    EndFrame,
    Clear,
    Draw(u32),
    DrawIndexed(u32),
    BindPipeline(Option<u64>),
    BindVertexArray(Option<u64>),
    BindTexture(Option<u64>, u32),
    BindFramebuffer(Option<u64>),
    SetRenderState,
    SetViewport,
    SetScissor(bool),
    BeginRenderPass(String),
    EndRenderPass,
    Barrier(u64, ResourceState),
    Blit,
    Commit(usize),
    UpdateBuffer(u64, usize),
    FlushUploads,
}

pub(crate) struct RecordingDevice {
    pub calls: Vec<Call>,
    pub on_draw: Option<Box<dyn FnMut() + Send>>,
    stats: RenderStats,
    caps: GraphicsCapabilities,
    releases: ReleaseQueue,
    next_raw: u64,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            on_draw: None,
            stats: RenderStats::default(),
            caps: GraphicsCapabilities::baseline(GraphicsApi::OpenGl),
            releases: ReleaseQueue::new(),
            next_raw: 1,
        }
    }
}

impl RecordingDevice {
    fn handle(&mut self, kind: ResourceKind, size: u64) -> NativeHandle {
        let raw = self.next_raw;
        self.next_raw += 1;
        self.stats.resource_created(kind, size);
        NativeHandle::new(GraphicsApi::OpenGl, kind, raw, size, self.releases.sender())
    }

    pub fn texture(&mut self, name: &str) -> Arc<Texture> {
        self.create_texture(&TextureDesc::new_2d(name, TextureFormat::Rgba8Unorm, 4, 4))
            .unwrap()
    }

    pub fn buffer(&mut self, name: &str, size: u64) -> Arc<Buffer> {
        self.create_buffer(&BufferDesc::new(name, BufferType::Vertex, size))
            .unwrap()
    }
}

impl Device for RecordingDevice {
    fn device_name(&self) -> &str {
        "recording"
    }
    fn vendor_name(&self) -> &str {
        "lumen"
    }
    fn driver_version(&self) -> &str {
        "0"
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

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<Buffer>, ResourceError> {
        desc.validate()?;
        let native = self.handle(ResourceKind::Buffer, desc.size);
        Ok(Arc::new(Buffer::new(desc.clone(), native)))
    }
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<Texture>, ResourceError> {
        desc.validate()?;
        let native = self.handle(ResourceKind::Texture, desc.total_size());
        Ok(Arc::new(Texture::new(desc.clone(), native)))
    }
    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>, ResourceError> {
        let native = self.handle(ResourceKind::Shader, 0);
        Ok(Arc::new(Shader::new(desc.clone(), native)))
    }
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Arc<Pipeline> {
        let native = self.handle(ResourceKind::Pipeline, 0);
        Arc::new(Pipeline::linked(desc.clone(), native, None, String::new()))
    }
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<Framebuffer>, ResourceError> {
        let native = self.handle(ResourceKind::Framebuffer, 0);
        Ok(Arc::new(Framebuffer::new(desc.clone(), native)))
    }
    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<Arc<VertexArray>, ResourceError> {
        let native = self.handle(ResourceKind::VertexArray, 0);
        Ok(Arc::new(VertexArray::new(desc.clone(), native)))
    }

    fn begin_frame(&mut self) {
        self.stats.begin_frame();
        self.calls.push(Call::BeginFrame);
    }
    fn end_frame(&mut self) {
        self.calls.push(Call::EndFrame);
    }
    fn flush(&mut self) {}
    fn finish(&mut self) {}
    fn present(&mut self) {}

    fn set_render_state(&mut self, _state: &RenderState) {
        self.calls.push(Call::SetRenderState);
    }
    fn set_viewport(&mut self, _viewport: &Viewport) {
        self.calls.push(Call::SetViewport);
    }
    fn set_scissor(&mut self, rect: Option<&ScissorRect>) {
        self.calls.push(Call::SetScissor(rect.is_some()));
    }
    fn clear(&mut self, _params: &ClearParams) {
        self.calls.push(Call::Clear);
    }
    fn draw(&mut self, params: &DrawParams) {
        if let Some(hook) = self.on_draw.as_mut() {
            hook();
        }
        self.stats
            .record_draw(PrimitiveType::Triangles, params.vertex_count, params.instance_count);
        self.calls.push(Call::Draw(params.vertex_count));
    }
    fn draw_indexed(&mut self, params: &DrawIndexedParams) {
        self.stats
            .record_draw(PrimitiveType::Triangles, params.index_count, params.instance_count);
        self.calls.push(Call::DrawIndexed(params.index_count));
    }
    fn bind_pipeline(&mut self, pipeline: Option<&Arc<Pipeline>>) {
        self.calls.push(Call::BindPipeline(pipeline.map(|p| p.raw())));
    }
    fn bind_vertex_array(&mut self, vertex_array: Option<&Arc<VertexArray>>) {
        self.calls.push(Call::BindVertexArray(vertex_array.map(|v| v.raw())));
    }
    fn bind_texture(&mut self, texture: Option<&Arc<Texture>>, slot: u32) {
        self.calls.push(Call::BindTexture(texture.map(|t| t.raw()), slot));
    }
    fn bind_framebuffer(&mut self, framebuffer: Option<&Arc<Framebuffer>>) {
        self.calls.push(Call::BindFramebuffer(framebuffer.map(|f| f.raw())));
    }
    fn begin_render_pass(&mut self, params: &RenderPassParams) {
        self.calls.push(Call::BeginRenderPass(params.label.clone()));
    }
    fn end_render_pass(&mut self) {
        self.calls.push(Call::EndRenderPass);
    }
    fn resource_barrier(&mut self, texture: &Arc<Texture>, state: ResourceState) {
        self.calls.push(Call::Barrier(texture.raw(), state));
    }
    fn blit(&mut self, _params: &BlitParams) {
        self.calls.push(Call::Blit);
    }
    fn commit_parameters(&mut self, pipeline: &Pipeline) {
        let dirty = pipeline.take_dirty_parameters();
        self.calls.push(Call::Commit(dirty.len()));
    }
    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        buffer.stage_write(offset, data)?;
        self.calls.push(Call::UpdateBuffer(offset, data.len()));
        Ok(())
    }
    fn flush_uploads(&mut self) {
        self.calls.push(Call::FlushUploads);
    }

    fn execute_command_list(&mut self, list: &CommandBuffer) -> Result<usize, RecordingError> {
        list.execute(self)
    }
}

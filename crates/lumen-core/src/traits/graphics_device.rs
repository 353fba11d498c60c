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

use crate::api::{
    BlitParams, Buffer, BufferDesc, ClearParams, CommandBuffer, DrawIndexedParams, DrawParams, Framebuffer,
    FramebufferDesc, GraphicsApi, GraphicsCapabilities, Pipeline, PipelineDesc, RenderPassParams, RenderState,
    RenderStats, ResourceState, ScissorRect, Shader, ShaderDesc, Texture, TextureDesc, VertexArray,
    VertexArrayDesc, Viewport,
};
use crate::error::{RecordingError, ResourceError};
use std::sync::Arc;

/// The single entry point higher layers render through.
///
/// A device creates every resource object, runs the per-frame state machine
/// (`begin_frame` → `end_frame` → `flush`/`present`) and applies commands,
/// either called directly or dispatched from a [`CommandBuffer`]. It is
/// object safe and used as `&mut dyn Device` or `Box<dyn Device>`.
///
/// Failures never panic across this boundary: creation returns an error (or,
/// for pipelines, an unlinked pipeline carrying its log), and protocol
/// violations are logged and ignored.
pub trait Device {
    /// Adapter or renderer name.
    fn device_name(&self) -> &str;

    /// Vendor name.
    fn vendor_name(&self) -> &str;

    /// Driver version string.
    fn driver_version(&self) -> &str;

    /// The native API.
    fn backend_type(&self) -> GraphicsApi;

    /// Limits queried at creation.
    fn capabilities(&self) -> &GraphicsCapabilities;

    /// A copy of the current statistics.
    fn stats(&self) -> RenderStats;

    /// Whether command lists may be recorded on other threads.
    fn supports_multithreading(&self) -> bool {
        self.capabilities().supports_multithreading
    }

    // --- Resource creation ---

    /// Creates a buffer, uploading `initial_data` if any.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<Buffer>, ResourceError>;

    /// Creates a texture, uploading `initial_data` if any.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<Texture>, ResourceError>;

    /// Compiles a single shader stage.
    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>, ResourceError>;

    /// Builds a pipeline. Always returns a pipeline; check
    /// [`Pipeline::is_linked`].
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Arc<Pipeline>;

    /// Creates a framebuffer from existing textures.
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<Framebuffer>, ResourceError>;

    /// Creates a vertex input binding.
    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<Arc<VertexArray>, ResourceError>;

    /// Creates an empty command list.
    fn create_command_list(&mut self, name: &str) -> Result<Arc<CommandBuffer>, ResourceError> {
        Ok(Arc::new(CommandBuffer::new(name)))
    }

    // --- Frame control ---

    /// Starts a frame. Ignored with a warning while a frame is recording.
    fn begin_frame(&mut self);

    /// Ends the frame started by `begin_frame`.
    fn end_frame(&mut self);

    /// Submits recorded GPU work without waiting.
    fn flush(&mut self);

    /// Submits and waits until the GPU is idle.
    fn finish(&mut self);

    /// Shows the back buffer.
    fn present(&mut self);

    // --- State and drawing ---

    /// Applies fixed-function state.
    fn set_render_state(&mut self, state: &RenderState);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Sets the scissor rectangle; `None` disables scissoring.
    fn set_scissor(&mut self, rect: Option<&ScissorRect>);

    /// Clears the current render target.
    fn clear(&mut self, params: &ClearParams);

    /// Draws with the bound pipeline and vertex array.
    fn draw(&mut self, params: &DrawParams);

    /// Draws indexed primitives with the bound vertex array's index buffer.
    fn draw_indexed(&mut self, params: &DrawIndexedParams);

    /// Binds a pipeline and applies its render state.
    fn bind_pipeline(&mut self, pipeline: Option<&Arc<Pipeline>>);

    /// Binds vertex input, flushing staged writes of its buffers.
    fn bind_vertex_array(&mut self, vertex_array: Option<&Arc<VertexArray>>);

    /// Binds a texture to `slot`; `None` binds the default white texture.
    fn bind_texture(&mut self, texture: Option<&Arc<Texture>>, slot: u32);

    /// Binds a framebuffer; `None` is the back buffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<&Arc<Framebuffer>>);

    /// Starts a render pass.
    fn begin_render_pass(&mut self, params: &RenderPassParams);

    /// Ends the current render pass.
    fn end_render_pass(&mut self);

    /// Transitions `texture` to `state`. Backends without explicit
    /// transitions ignore it.
    fn resource_barrier(&mut self, texture: &Arc<Texture>, state: ResourceState);

    /// Copies between framebuffers.
    fn blit(&mut self, params: &BlitParams);

    /// Writes the pipeline's dirty uniforms to the GPU.
    fn commit_parameters(&mut self, pipeline: &Pipeline);

    /// Writes `data` into `buffer` at `offset`.
    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Copies every staged buffer and texture write to the GPU.
    fn flush_uploads(&mut self);

    // --- Execution ---

    /// Dispatches every command of `list` to this device.
    fn execute_command_list(&mut self, list: &CommandBuffer) -> Result<usize, RecordingError>;

    /// Executes `lists` in order and returns the number of commands
    /// dispatched. Lists that cannot execute are skipped.
    fn execute_command_lists(&mut self, lists: &[Arc<CommandBuffer>]) -> usize {
        let mut dispatched = 0;
        for list in lists {
            match self.execute_command_list(list) {
                Ok(count) => dispatched += count,
                Err(err) => log::warn!("{}: skipped command list: {err}", self.backend_type()),
            }
        }
        dispatched
    }
}

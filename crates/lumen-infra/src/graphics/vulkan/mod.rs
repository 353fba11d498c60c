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

//! Reserved Vulkan backend.
//!
//! Nothing is implemented. [`VulkanDevice::probe`] always fails so the
//! factory falls back to OpenGL, and a device built directly with
//! [`VulkanDevice::unavailable`] rejects every creation.

use anyhow::{bail, Result};
use lumen_core::{
    BlitParams, Buffer, BufferDesc, ClearParams, CommandBuffer, Device, DeviceConfig, DrawIndexedParams, DrawParams,
    Framebuffer, FramebufferDesc, GraphicsApi, GraphicsCapabilities, NativeHandle, Pipeline, PipelineDesc,
    RecordingError, RenderPassParams, RenderState, RenderStats, ResourceError, ResourceKind, ResourceState,
    ScissorRect, Shader, ShaderDesc, Texture, TextureDesc, VertexArray, VertexArrayDesc, Viewport, WindowSurface,
};
use std::sync::Arc;

const NOT_IMPLEMENTED: &str = "the Vulkan backend is not implemented";

fn unsupported(what: &str) -> ResourceError {
    log::error!("VulkanDevice: cannot create {what}: {NOT_IMPLEMENTED}");
    ResourceError::Unsupported(format!("{what}: {NOT_IMPLEMENTED}"))
}

/// A device that fails closed.
#[derive(Debug)]
pub struct VulkanDevice {
    caps: GraphicsCapabilities,
    stats: RenderStats,
}

impl VulkanDevice {
    /// Checks whether a Vulkan device can be created. Always fails.
    pub fn probe(_config: &DeviceConfig, _window: Option<&Arc<dyn WindowSurface>>) -> Result<Self> {
        bail!(NOT_IMPLEMENTED)
    }

    /// The fail-closed device itself, bypassing the probe.
    pub fn unavailable() -> Self {
        Self {
            caps: GraphicsCapabilities::baseline(GraphicsApi::Vulkan),
            stats: RenderStats::default(),
        }
    }
}

impl Device for VulkanDevice {
    fn device_name(&self) -> &str {
        "unavailable"
    }

    fn vendor_name(&self) -> &str {
        "none"
    }

    fn driver_version(&self) -> &str {
        ""
    }

    fn backend_type(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn capabilities(&self) -> &GraphicsCapabilities {
        &self.caps
    }

    fn stats(&self) -> RenderStats {
        self.stats.clone()
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<Buffer>, ResourceError> {
        Err(unsupported(&format!("buffer '{}'", desc.debug_name)))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<Texture>, ResourceError> {
        Err(unsupported(&format!("texture '{}'", desc.debug_name)))
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>, ResourceError> {
        Err(unsupported(&format!("shader '{}'", desc.debug_name)))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Arc<Pipeline> {
        log::error!("VulkanDevice: cannot build pipeline '{}': {NOT_IMPLEMENTED}", desc.debug_name);
        Arc::new(Pipeline::failed(
            desc.clone(),
            NativeHandle::detached(GraphicsApi::Vulkan, ResourceKind::Pipeline, 0),
            NOT_IMPLEMENTED.to_string(),
        ))
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<Framebuffer>, ResourceError> {
        Err(unsupported(&format!("framebuffer '{}'", desc.debug_name)))
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<Arc<VertexArray>, ResourceError> {
        Err(unsupported(&format!("vertex array '{}'", desc.debug_name)))
    }

    fn create_command_list(&mut self, name: &str) -> Result<Arc<CommandBuffer>, ResourceError> {
        Err(unsupported(&format!("command list '{name}'")))
    }

    // --- Frame control and commands are ignored ---

    fn begin_frame(&mut self) {
        log::debug!("VulkanDevice: begin_frame ignored");
    }

    fn end_frame(&mut self) {}

    fn flush(&mut self) {}

    fn finish(&mut self) {}

    fn present(&mut self) {}

    fn set_render_state(&mut self, _state: &RenderState) {}

    fn set_viewport(&mut self, _viewport: &Viewport) {}

    fn set_scissor(&mut self, _rect: Option<&ScissorRect>) {}

    fn clear(&mut self, _params: &ClearParams) {}

    fn draw(&mut self, _params: &DrawParams) {}

    fn draw_indexed(&mut self, _params: &DrawIndexedParams) {}

    fn bind_pipeline(&mut self, _pipeline: Option<&Arc<Pipeline>>) {}

    fn bind_vertex_array(&mut self, _vertex_array: Option<&Arc<VertexArray>>) {}

    fn bind_texture(&mut self, _texture: Option<&Arc<Texture>>, _slot: u32) {}

    fn bind_framebuffer(&mut self, _framebuffer: Option<&Arc<Framebuffer>>) {}

    fn begin_render_pass(&mut self, _params: &RenderPassParams) {}

    fn end_render_pass(&mut self) {}

    fn resource_barrier(&mut self, _texture: &Arc<Texture>, _state: ResourceState) {}

    fn blit(&mut self, _params: &BlitParams) {}

    fn commit_parameters(&mut self, _pipeline: &Pipeline) {}

    fn update_buffer(&mut self, buffer: &Buffer, _offset: u64, _data: &[u8]) -> Result<(), ResourceError> {
        Err(unsupported(&format!("upload into '{}'", buffer.desc().debug_name)))
    }

    fn flush_uploads(&mut self) {}

    fn execute_command_list(&mut self, list: &CommandBuffer) -> Result<usize, RecordingError> {
        list.execute(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{BufferType, ShaderStage, TextureFormat};

    #[test]
    fn the_probe_always_fails() {
        let config = DeviceConfig::headless(GraphicsApi::Vulkan);
        let err = VulkanDevice::probe(&config, None).unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn every_creation_fails_closed() {
        let mut device = VulkanDevice::unavailable();
        assert_eq!(device.backend_type(), GraphicsApi::Vulkan);
        assert!(matches!(
            device.create_buffer(&BufferDesc::new("b", BufferType::Vertex, 16)),
            Err(ResourceError::Unsupported(_))
        ));
        assert!(device
            .create_texture(&TextureDesc::new_2d("t", TextureFormat::Rgba8Unorm, 4, 4))
            .is_err());
        assert!(device
            .create_shader(&ShaderDesc::wgsl("s", ShaderStage::Vertex, "", "main"))
            .is_err());
        assert!(device.create_command_list("list").is_err());

        let pipeline = device.create_pipeline(&PipelineDesc::new("p"));
        assert!(!pipeline.is_linked());
        assert!(pipeline.compile_log().contains("not implemented"));
    }

    #[test]
    fn commands_do_not_touch_stats() {
        let mut device = VulkanDevice::unavailable();
        device.begin_frame();
        device.clear(&ClearParams::color([0.0, 0.0, 0.0, 1.0]));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        assert_eq!(device.stats().draw_calls, 0);
    }
}

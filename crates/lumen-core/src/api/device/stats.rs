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

//! Per-frame and lifetime statistics written by devices.

use crate::api::util::{PrimitiveType, ResourceKind};

/// Counters maintained by a device.
///
/// `draw_calls`, `triangles` and `vertices` cover the current frame and are
/// reset by `begin_frame`. Resource counts and `memory_bytes` persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    /// A sequential counter for begun frames.
    pub frame_number: u64,
    /// Draw calls issued this frame.
    pub draw_calls: u32,
    /// Triangles submitted this frame.
    pub triangles: u64,
    /// Vertices submitted this frame.
    pub vertices: u64,
    /// CPU time between the last `begin_frame` and `end_frame`.
    pub frame_time_ms: f32,
    /// GPU time of the last completed frame, when the backend measures it.
    pub gpu_time_ms: f32,
    /// Live buffers.
    pub buffer_count: u32,
    /// Live textures.
    pub texture_count: u32,
    /// Live shaders.
    pub shader_count: u32,
    /// Live pipelines.
    pub pipeline_count: u32,
    /// Bytes held by live buffers and textures.
    pub memory_bytes: u64,
}

impl RenderStats {
    /// Clears the per-frame counters and advances the frame number.
    pub fn begin_frame(&mut self) {
        self.frame_number += 1;
        self.draw_calls = 0;
        self.triangles = 0;
        self.vertices = 0;
    }

    /// Accounts for one draw. A draw with zero instances draws nothing and is
    /// not counted.
    pub fn record_draw(&mut self, primitive: PrimitiveType, vertex_count: u32, instance_count: u32) {
        if instance_count == 0 {
            return;
        }
        let instances = instance_count as u64;
        self.draw_calls += 1;
        self.vertices += vertex_count as u64 * instances;
        self.triangles += primitive.triangle_count(vertex_count) as u64 * instances;
    }

    /// Accounts for a newly created resource.
    pub fn resource_created(&mut self, kind: ResourceKind, size_bytes: u64) {
        if let Some(count) = self.counter(kind) {
            *count += 1;
        }
        self.memory_bytes += size_bytes;
    }

    /// Accounts for a destroyed resource.
    pub fn resource_released(&mut self, kind: ResourceKind, size_bytes: u64) {
        if let Some(count) = self.counter(kind) {
            *count = count.saturating_sub(1);
        }
        self.memory_bytes = self.memory_bytes.saturating_sub(size_bytes);
    }

    fn counter(&mut self, kind: ResourceKind) -> Option<&mut u32> {
        match kind {
            ResourceKind::Buffer => Some(&mut self.buffer_count),
            ResourceKind::Texture => Some(&mut self.texture_count),
            ResourceKind::Shader => Some(&mut self.shader_count),
            ResourceKind::Pipeline => Some(&mut self.pipeline_count),
            ResourceKind::Framebuffer | ResourceKind::VertexArray => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_frame_resets_only_frame_counters() {
        let mut stats = RenderStats::default();
        stats.resource_created(ResourceKind::Buffer, 256);
        stats.record_draw(PrimitiveType::Triangles, 6, 2);
        assert_eq!(stats.vertices, 12);
        assert_eq!(stats.triangles, 4);
        stats.begin_frame();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.vertices, 0);
        assert_eq!(stats.buffer_count, 1);
        assert_eq!(stats.memory_bytes, 256);
        assert_eq!(stats.frame_number, 1);
    }

    #[test]
    fn zero_instance_draws_are_not_counted() {
        let mut stats = RenderStats::default();
        stats.record_draw(PrimitiveType::Triangles, 3, 0);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.vertices, 0);
        stats.record_draw(PrimitiveType::Triangles, 3, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices, 3);
    }

    #[test]
    fn release_never_underflows() {
        let mut stats = RenderStats::default();
        stats.resource_released(ResourceKind::Texture, 64);
        assert_eq!(stats.texture_count, 0);
        assert_eq!(stats.memory_bytes, 0);
    }
}

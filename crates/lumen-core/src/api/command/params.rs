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

//! Payloads carried by [`Command`](super::Command)s.

use crate::api::framebuffer::Framebuffer;
use crate::api::util::TextureFilter;
use std::sync::Arc;

/// Which attachments to clear, and to what.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearParams {
    /// Clear the color attachments.
    pub clear_color: bool,
    /// Clear the depth attachment.
    pub clear_depth: bool,
    /// Clear the stencil attachment.
    pub clear_stencil: bool,
    /// Linear RGBA clear color.
    pub color: [f32; 4],
    /// Depth clear value.
    pub depth: f32,
    /// Stencil clear value.
    pub stencil: u32,
}

impl Default for ClearParams {
    fn default() -> Self {
        Self {
            clear_color: true,
            clear_depth: true,
            clear_stencil: false,
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearParams {
    /// Clears color only.
    pub fn color(color: [f32; 4]) -> Self {
        Self {
            clear_color: true,
            clear_depth: false,
            color,
            ..Self::default()
        }
    }

    /// Clears depth only.
    pub fn depth(depth: f32) -> Self {
        Self {
            clear_color: false,
            clear_depth: true,
            depth,
            ..Self::default()
        }
    }

    /// Whether any attachment is cleared.
    pub fn clears_anything(&self) -> bool {
        self.clear_color || self.clear_depth || self.clear_stencil
    }
}

/// A non-indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    /// Vertices per instance.
    pub vertex_count: u32,
    /// Instance count; `0` is treated as `1`.
    pub instance_count: u32,
    /// First vertex.
    pub first_vertex: u32,
    /// First instance.
    pub first_instance: u32,
}

impl DrawParams {
    /// One instance of `vertex_count` vertices.
    pub fn new(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Sets the instance count.
    pub fn instanced(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

/// An indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedParams {
    /// Indices per instance.
    pub index_count: u32,
    /// Instance count; `0` is treated as `1`.
    pub instance_count: u32,
    /// First index read from the index buffer.
    pub first_index: u32,
    /// Value added to each index.
    pub base_vertex: i32,
    /// First instance.
    pub first_instance: u32,
}

impl DrawIndexedParams {
    /// One instance of `index_count` indices.
    pub fn new(index_count: u32) -> Self {
        Self {
            index_count,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    /// Sets the instance count.
    pub fn instanced(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

/// Viewport transform in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A full-depth viewport at the origin.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// A rectangle at the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Starts a render pass on `framebuffer` (the back buffer when `None`).
#[derive(Debug, Clone, Default)]
pub struct RenderPassParams {
    /// Pass label for debuggers.
    pub label: String,
    /// Render target.
    pub framebuffer: Option<Arc<Framebuffer>>,
    /// Clear performed at the start of the pass.
    pub clear: Option<ClearParams>,
}

impl RenderPassParams {
    /// A pass on the back buffer that loads the previous contents.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Renders into `framebuffer`.
    pub fn with_framebuffer(mut self, framebuffer: Arc<Framebuffer>) -> Self {
        self.framebuffer = Some(framebuffer);
        self
    }

    /// Clears at the start of the pass.
    pub fn with_clear(mut self, clear: ClearParams) -> Self {
        self.clear = Some(clear);
        self
    }
}

/// Copies a region between framebuffers (`None` is the back buffer).
#[derive(Debug, Clone)]
pub struct BlitParams {
    /// Source framebuffer.
    pub source: Option<Arc<Framebuffer>>,
    /// Destination framebuffer.
    pub destination: Option<Arc<Framebuffer>>,
    /// Source region.
    pub source_rect: ScissorRect,
    /// Destination region.
    pub destination_rect: ScissorRect,
    /// Copy the color attachment.
    pub color: bool,
    /// Copy the depth attachment.
    pub depth: bool,
    /// Filter applied when the regions differ in size.
    pub filter: TextureFilter,
}

impl BlitParams {
    /// A same-size color copy of `width` × `height` pixels.
    pub fn color(
        source: Option<Arc<Framebuffer>>,
        destination: Option<Arc<Framebuffer>>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            source,
            destination,
            source_rect: ScissorRect::new(width, height),
            destination_rect: ScissorRect::new(width, height),
            color: true,
            depth: false,
            filter: TextureFilter::Nearest,
        }
    }

    /// Whether source and destination regions have the same size.
    pub fn is_one_to_one(&self) -> bool {
        self.source_rect.width == self.destination_rect.width
            && self.source_rect.height == self.destination_rect.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_presets() {
        assert!(ClearParams::color([1.0; 4]).clear_color);
        assert!(!ClearParams::color([1.0; 4]).clear_depth);
        assert!(ClearParams::depth(0.0).clear_depth);
        let none = ClearParams {
            clear_color: false,
            clear_depth: false,
            ..ClearParams::default()
        };
        assert!(!none.clears_anything());
    }

    #[test]
    fn blit_scaling_is_detected() {
        let mut blit = BlitParams::color(None, None, 64, 64);
        assert!(blit.is_one_to_one());
        blit.destination_rect = ScissorRect::new(32, 32);
        assert!(!blit.is_one_to_one());
    }
}

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

//! The narrow slice of OpenGL the immediate backend drives.
//!
//! Object names are plain `u32`s with `0` meaning "none", and every enum is
//! a raw GL constant produced by [`super::conversions`]. This keeps the
//! device logic independent of the function loader, so the same
//! [`GlDevice`](super::GlDevice) runs over `glow` or in memory.

use lumen_core::{AdapterInfo, UniformValue};

/// GL-side description of a texture to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlTextureSpec<'a> {
    /// Bind target (`TEXTURE_2D`, `TEXTURE_CUBE_MAP`, ...).
    pub target: u32,
    /// Sized internal format.
    pub internal_format: u32,
    /// Pixel transfer format.
    pub format: u32,
    /// Pixel transfer type.
    pub ty: u32,
    /// Width of level 0.
    pub width: u32,
    /// Height of level 0.
    pub height: u32,
    /// Depth of level 0, or the layer count of array textures.
    pub depth: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Minification filter.
    pub min_filter: u32,
    /// Magnification filter.
    pub mag_filter: u32,
    /// Wrap modes along S, T and R.
    pub wrap: [u32; 3],
    /// Tightly packed texels of level 0, layer after layer.
    pub data: Option<&'a [u8]>,
}

/// One attribute pointer of a vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlAttribute {
    /// Attribute index.
    pub location: u32,
    /// Component count.
    pub components: i32,
    /// Component type.
    pub ty: u32,
    /// Whether integer data is normalized to `[0, 1]`.
    pub normalized: bool,
    /// Whether the shader reads the attribute as an integer.
    pub integer: bool,
    /// Byte offset inside one element.
    pub offset: i32,
}

/// A vertex buffer with its attribute pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlVertexBuffer {
    /// Buffer name.
    pub buffer: u32,
    /// Bytes between elements.
    pub stride: i32,
    /// `0` for per-vertex data, `1` for per-instance data.
    pub divisor: u32,
    /// Attributes read from the buffer.
    pub attributes: Vec<GlAttribute>,
}

/// A framebuffer-to-framebuffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlBlit {
    /// Read framebuffer, `0` for the back buffer.
    pub source: u32,
    /// Draw framebuffer, `0` for the back buffer.
    pub destination: u32,
    /// Source corners `[x0, y0, x1, y1]`.
    pub source_rect: [i32; 4],
    /// Destination corners `[x0, y0, x1, y1]`.
    pub destination_rect: [i32; 4],
    /// Buffer bits to copy.
    pub mask: u32,
    /// `NEAREST` or `LINEAR`.
    pub filter: u32,
}

/// OpenGL entry points used by [`GlDevice`](super::GlDevice).
///
/// Creation calls return the driver's message on failure; everything else
/// is fire-and-forget like the underlying API.
pub trait GlApi {
    /// Renderer, vendor and version strings.
    fn adapter_info(&self) -> AdapterInfo;

    /// Reads an integer limit such as `MAX_TEXTURE_SIZE`.
    fn get_integer(&self, parameter: u32) -> i32;

    // --- Buffers ---

    /// Allocates a buffer of `size` bytes, filled from `data` if given.
    fn create_buffer(&mut self, target: u32, size: usize, data: Option<&[u8]>, usage: u32) -> Result<u32, String>;

    /// Overwrites part of a buffer.
    fn buffer_sub_data(&mut self, target: u32, buffer: u32, offset: usize, data: &[u8]);

    /// Binds a whole buffer to an indexed uniform binding point.
    fn bind_uniform_buffer(&mut self, index: u32, buffer: u32);

    /// Deletes a buffer.
    fn delete_buffer(&mut self, buffer: u32);

    // --- Textures ---

    /// Allocates a texture with its sampling parameters.
    fn create_texture(&mut self, spec: &GlTextureSpec<'_>) -> Result<u32, String>;

    /// Overwrites `rows` full rows of level 0 starting at row `y`.
    fn texture_rows(&mut self, spec: &GlTextureSpec<'_>, texture: u32, y: u32, rows: u32, data: &[u8]);

    /// Binds `texture` to texture unit `unit`.
    fn bind_texture(&mut self, unit: u32, target: u32, texture: u32);

    /// Deletes a texture.
    fn delete_texture(&mut self, texture: u32);

    // --- Programs ---

    /// Compiles one stage.
    fn compile_shader(&mut self, stage: u32, source: &str) -> Result<u32, String>;

    /// Deletes a shader object.
    fn delete_shader(&mut self, shader: u32);

    /// Links compiled stages into a program.
    fn link_program(&mut self, shaders: &[u32]) -> Result<u32, String>;

    /// Deletes a program.
    fn delete_program(&mut self, program: u32);

    /// Makes `program` current; `0` unbinds.
    fn use_program(&mut self, program: u32);

    /// Location of a default-block uniform.
    fn uniform_location(&mut self, program: u32, name: &str) -> Option<u32>;

    /// Writes a value to a uniform location of the current program.
    /// Matrices are already in the layout the shader expects.
    fn set_uniform(&mut self, location: u32, value: &UniformValue);

    // --- Vertex input ---

    /// Creates a vertex array object capturing the given buffers.
    fn create_vertex_array(&mut self, buffers: &[GlVertexBuffer], index_buffer: Option<u32>) -> Result<u32, String>;

    /// Binds a vertex array; `0` unbinds.
    fn bind_vertex_array(&mut self, vertex_array: u32);

    /// Deletes a vertex array.
    fn delete_vertex_array(&mut self, vertex_array: u32);

    // --- Framebuffers ---

    /// Creates a framebuffer from color attachments and an optional
    /// `(texture, attachment point)` depth attachment.
    fn create_framebuffer(&mut self, colors: &[u32], depth: Option<(u32, u32)>) -> Result<u32, String>;

    /// Binds a framebuffer for drawing; `0` is the back buffer.
    fn bind_framebuffer(&mut self, framebuffer: u32);

    /// Copies between framebuffers.
    fn blit_framebuffer(&mut self, blit: &GlBlit);

    /// Deletes a framebuffer.
    fn delete_framebuffer(&mut self, framebuffer: u32);

    // --- Fixed-function state ---

    /// `glEnable` / `glDisable`.
    fn set_enabled(&mut self, capability: u32, enabled: bool);

    /// Blend factors.
    fn blend_func(&mut self, src: u32, dst: u32);

    /// Depth comparison.
    fn depth_func(&mut self, func: u32);

    /// Depth writes.
    fn depth_mask(&mut self, write: bool);

    /// Culled faces.
    fn cull_face(&mut self, face: u32);

    /// `FILL` or `LINE`.
    fn polygon_mode(&mut self, mode: u32);

    /// Viewport rectangle and depth range.
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32, near: f32, far: f32);

    /// Scissor rectangle.
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);

    // --- Drawing ---

    /// Clears the buffers in `mask` of the bound framebuffer.
    fn clear(&mut self, mask: u32, color: [f32; 4], depth: f32, stencil: i32);

    /// Non-indexed instanced draw.
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32, instances: i32);

    /// Indexed instanced draw from the bound vertex array's index buffer.
    fn draw_elements(&mut self, mode: u32, count: i32, index_type: u32, byte_offset: i32, base_vertex: i32, instances: i32);

    /// `glFlush`.
    fn flush(&mut self);

    /// `glFinish`.
    fn finish(&mut self);
}

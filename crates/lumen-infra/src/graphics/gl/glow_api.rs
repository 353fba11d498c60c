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

//! [`GlApi`] over a real OpenGL context loaded with `glow`.

use super::api::{GlApi, GlBlit, GlTextureSpec, GlVertexBuffer};
use anyhow::{bail, Result};
use glow::HasContext;
use lumen_core::{AdapterInfo, UniformValue, WindowSurface};
use std::num::NonZeroU32;

fn native<T>(name: u32, wrap: fn(NonZeroU32) -> T) -> Option<T> {
    NonZeroU32::new(name).map(wrap)
}

/// OpenGL entry points resolved from a window's current context.
///
/// Object creation and uploads go through a scratch texture unit and the
/// copy targets, so they never disturb the texture unit bindings the device
/// caches.
pub struct GlowApi {
    gl: glow::Context,
    scratch_unit: u32,
}

impl std::fmt::Debug for GlowApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowApi")
            .field("scratch_unit", &self.scratch_unit)
            .finish_non_exhaustive()
    }
}

impl GlowApi {
    /// Wraps an already loaded context. The context must be current on the
    /// calling thread for as long as the driver is used.
    pub fn new(gl: glow::Context) -> Self {
        // SAFETY: plain state queries and setters on the current context.
        let scratch_unit = unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            (gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS) - 1).max(0) as u32
        };
        Self { gl, scratch_unit }
    }

    /// Loads the GL entry points through the window's context.
    pub fn from_window(window: &dyn WindowSurface) -> Result<Self> {
        if !window.has_gl_context() {
            bail!("the window has no current OpenGL context");
        }
        // SAFETY: the window owns a current context and resolves its entry
        // points; the returned pointers stay valid while the window lives.
        let gl = unsafe { glow::Context::from_loader_function(|name| window.gl_proc_address(name)) };
        let api = Self::new(gl);
        let version = api.adapter_info().driver_version;
        if version.is_empty() {
            bail!("the OpenGL context reports no version string");
        }
        Ok(api)
    }

    /// Texture unit reserved for uploads.
    pub fn scratch_unit(&self) -> u32 {
        self.scratch_unit
    }

    unsafe fn allocate_levels(&self, spec: &GlTextureSpec<'_>) {
        let gl = &self.gl;
        for level in 0..spec.mip_levels.max(1) {
            let w = (spec.width >> level).max(1);
            let h = (spec.height >> level).max(1);
            let level0_data = if level == 0 { spec.data } else { None };
            match spec.target {
                glow::TEXTURE_CUBE_MAP => {
                    let face_bytes = level0_data.map_or(0, |d| d.len() / 6);
                    for face in 0..6u32 {
                        let start = face as usize * face_bytes;
                        let slice = level0_data.and_then(|d| d.get(start..start + face_bytes));
                        gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            level as i32,
                            spec.internal_format as i32,
                            w as i32,
                            h as i32,
                            0,
                            spec.format,
                            spec.ty,
                            glow::PixelUnpackData::Slice(slice),
                        );
                    }
                }
                glow::TEXTURE_3D | glow::TEXTURE_2D_ARRAY => {
                    let d = if spec.target == glow::TEXTURE_3D {
                        (spec.depth >> level).max(1)
                    } else {
                        spec.depth
                    };
                    gl.tex_image_3d(
                        spec.target,
                        level as i32,
                        spec.internal_format as i32,
                        w as i32,
                        h as i32,
                        d as i32,
                        0,
                        spec.format,
                        spec.ty,
                        glow::PixelUnpackData::Slice(level0_data),
                    );
                }
                _ => gl.tex_image_2d(
                    spec.target,
                    level as i32,
                    spec.internal_format as i32,
                    w as i32,
                    h as i32,
                    0,
                    spec.format,
                    spec.ty,
                    glow::PixelUnpackData::Slice(level0_data),
                ),
            }
        }
    }
}

// SAFETY (whole impl): every call targets the context loaded in `new`, which
// the caller keeps current; object names come from this same context.
impl GlApi for GlowApi {
    fn adapter_info(&self) -> AdapterInfo {
        unsafe {
            AdapterInfo {
                device_name: self.gl.get_parameter_string(glow::RENDERER),
                vendor_name: self.gl.get_parameter_string(glow::VENDOR),
                driver_version: self.gl.get_parameter_string(glow::VERSION),
            }
        }
    }

    fn get_integer(&self, parameter: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(parameter) }
    }

    fn create_buffer(&mut self, _target: u32, size: usize, data: Option<&[u8]>, usage: u32) -> Result<u32, String> {
        unsafe {
            let buffer = self.gl.create_buffer()?;
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(buffer));
            match data {
                Some(data) if data.len() == size => self.gl.buffer_data_u8_slice(glow::COPY_WRITE_BUFFER, data, usage),
                _ => {
                    self.gl.buffer_data_size(glow::COPY_WRITE_BUFFER, size as i32, usage);
                    if let Some(data) = data {
                        self.gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, 0, data);
                    }
                }
            }
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
            Ok(buffer.0.get())
        }
    }

    fn buffer_sub_data(&mut self, _target: u32, buffer: u32, offset: usize, data: &[u8]) {
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, native(buffer, glow::NativeBuffer));
            self.gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset as i32, data);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
    }

    fn bind_uniform_buffer(&mut self, index: u32, buffer: u32) {
        unsafe {
            self.gl.bind_buffer_base(glow::UNIFORM_BUFFER, index, native(buffer, glow::NativeBuffer));
        }
    }

    fn delete_buffer(&mut self, buffer: u32) {
        if let Some(buffer) = native(buffer, glow::NativeBuffer) {
            unsafe { self.gl.delete_buffer(buffer) }
        }
    }

    fn create_texture(&mut self, spec: &GlTextureSpec<'_>) -> Result<u32, String> {
        unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.active_texture(glow::TEXTURE0 + self.scratch_unit);
            self.gl.bind_texture(spec.target, Some(texture));
            let parameters = [
                (glow::TEXTURE_MIN_FILTER, spec.min_filter),
                (glow::TEXTURE_MAG_FILTER, spec.mag_filter),
                (glow::TEXTURE_WRAP_S, spec.wrap[0]),
                (glow::TEXTURE_WRAP_T, spec.wrap[1]),
                (glow::TEXTURE_WRAP_R, spec.wrap[2]),
                (glow::TEXTURE_MAX_LEVEL, spec.mip_levels.saturating_sub(1)),
            ];
            for (parameter, value) in parameters {
                self.gl.tex_parameter_i32(spec.target, parameter, value as i32);
            }
            self.allocate_levels(spec);
            self.gl.bind_texture(spec.target, None);
            match self.gl.get_error() {
                glow::NO_ERROR => Ok(texture.0.get()),
                code => {
                    self.gl.delete_texture(texture);
                    Err(format!("texture allocation failed with GL error {code:#x}"))
                }
            }
        }
    }

    fn texture_rows(&mut self, spec: &GlTextureSpec<'_>, texture: u32, y: u32, rows: u32, data: &[u8]) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + self.scratch_unit);
            self.gl.bind_texture(spec.target, native(texture, glow::NativeTexture));
            self.gl.tex_sub_image_2d(
                spec.target,
                0,
                0,
                y as i32,
                spec.width as i32,
                rows as i32,
                spec.format,
                spec.ty,
                glow::PixelUnpackData::Slice(Some(data)),
            );
            self.gl.bind_texture(spec.target, None);
        }
    }

    fn bind_texture(&mut self, unit: u32, target: u32, texture: u32) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(target, native(texture, glow::NativeTexture));
        }
    }

    fn delete_texture(&mut self, texture: u32) {
        if let Some(texture) = native(texture, glow::NativeTexture) {
            unsafe { self.gl.delete_texture(texture) }
        }
    }

    fn compile_shader(&mut self, stage: u32, source: &str) -> Result<u32, String> {
        unsafe {
            let shader = self.gl.create_shader(stage)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(shader.0.get())
            } else {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                Err(log)
            }
        }
    }

    fn delete_shader(&mut self, shader: u32) {
        if let Some(shader) = native(shader, glow::NativeShader) {
            unsafe { self.gl.delete_shader(shader) }
        }
    }

    fn link_program(&mut self, shaders: &[u32]) -> Result<u32, String> {
        unsafe {
            let program = self.gl.create_program()?;
            let attached: Vec<_> = shaders.iter().filter_map(|&s| native(s, glow::NativeShader)).collect();
            for &shader in &attached {
                self.gl.attach_shader(program, shader);
            }
            self.gl.link_program(program);
            for &shader in &attached {
                self.gl.detach_shader(program, shader);
            }
            if self.gl.get_program_link_status(program) {
                Ok(program.0.get())
            } else {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                Err(log)
            }
        }
    }

    fn delete_program(&mut self, program: u32) {
        if let Some(program) = native(program, glow::NativeProgram) {
            unsafe { self.gl.delete_program(program) }
        }
    }

    fn use_program(&mut self, program: u32) {
        unsafe { self.gl.use_program(native(program, glow::NativeProgram)) }
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<u32> {
        let program = native(program, glow::NativeProgram)?;
        unsafe { self.gl.get_uniform_location(program, name).map(|l| l.0) }
    }

    fn set_uniform(&mut self, location: u32, value: &UniformValue) {
        let location = glow::NativeUniformLocation(location);
        let l = Some(&location);
        unsafe {
            match *value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(l, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32_slice(l, &v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32_slice(l, &v),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32_slice(l, &v),
                UniformValue::Int(v) => self.gl.uniform_1_i32(l, v),
                UniformValue::UInt(v) => self.gl.uniform_1_u32(l, v),
                UniformValue::Bool(v) => self.gl.uniform_1_i32(l, v as i32),
                UniformValue::Mat3(m) => self.gl.uniform_matrix_3_f32_slice(l, false, &m),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(l, false, &m),
            }
        }
    }

    fn create_vertex_array(&mut self, buffers: &[GlVertexBuffer], index_buffer: Option<u32>) -> Result<u32, String> {
        unsafe {
            let vertex_array = self.gl.create_vertex_array()?;
            self.gl.bind_vertex_array(Some(vertex_array));
            for slot in buffers {
                self.gl.bind_buffer(glow::ARRAY_BUFFER, native(slot.buffer, glow::NativeBuffer));
                for attribute in &slot.attributes {
                    self.gl.enable_vertex_attrib_array(attribute.location);
                    if attribute.integer {
                        self.gl.vertex_attrib_pointer_i32(
                            attribute.location,
                            attribute.components,
                            attribute.ty,
                            slot.stride,
                            attribute.offset,
                        );
                    } else {
                        self.gl.vertex_attrib_pointer_f32(
                            attribute.location,
                            attribute.components,
                            attribute.ty,
                            attribute.normalized,
                            slot.stride,
                            attribute.offset,
                        );
                    }
                    self.gl.vertex_attrib_divisor(attribute.location, slot.divisor);
                }
            }
            if let Some(index_buffer) = index_buffer {
                self.gl
                    .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, native(index_buffer, glow::NativeBuffer));
            }
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(vertex_array.0.get())
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        unsafe { self.gl.bind_vertex_array(native(vertex_array, glow::NativeVertexArray)) }
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        if let Some(vertex_array) = native(vertex_array, glow::NativeVertexArray) {
            unsafe { self.gl.delete_vertex_array(vertex_array) }
        }
    }

    fn create_framebuffer(&mut self, colors: &[u32], depth: Option<(u32, u32)>) -> Result<u32, String> {
        unsafe {
            let framebuffer = self.gl.create_framebuffer()?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            let mut draw_buffers = Vec::with_capacity(colors.len());
            for (i, &color) in colors.iter().enumerate() {
                let attachment = glow::COLOR_ATTACHMENT0 + i as u32;
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    native(color, glow::NativeTexture),
                    0,
                );
                draw_buffers.push(attachment);
            }
            if let Some((texture, attachment)) = depth {
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    native(texture, glow::NativeTexture),
                    0,
                );
            }
            if draw_buffers.is_empty() {
                draw_buffers.push(glow::NONE);
            }
            self.gl.draw_buffers(&draw_buffers);
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status == glow::FRAMEBUFFER_COMPLETE {
                Ok(framebuffer.0.get())
            } else {
                self.gl.delete_framebuffer(framebuffer);
                Err(format!("framebuffer incomplete (status {status:#x})"))
            }
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: u32) {
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, native(framebuffer, glow::NativeFramebuffer))
        }
    }

    fn blit_framebuffer(&mut self, blit: &GlBlit) {
        let [sx0, sy0, sx1, sy1] = blit.source_rect;
        let [dx0, dy0, dx1, dy1] = blit.destination_rect;
        unsafe {
            self.gl
                .bind_framebuffer(glow::READ_FRAMEBUFFER, native(blit.source, glow::NativeFramebuffer));
            self.gl
                .bind_framebuffer(glow::DRAW_FRAMEBUFFER, native(blit.destination, glow::NativeFramebuffer));
            self.gl
                .blit_framebuffer(sx0, sy0, sx1, sy1, dx0, dy0, dx1, dy1, blit.mask, blit.filter);
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        if let Some(framebuffer) = native(framebuffer, glow::NativeFramebuffer) {
            unsafe { self.gl.delete_framebuffer(framebuffer) }
        }
    }

    fn set_enabled(&mut self, capability: u32, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability);
            } else {
                self.gl.disable(capability);
            }
        }
    }

    fn blend_func(&mut self, src: u32, dst: u32) {
        unsafe { self.gl.blend_func(src, dst) }
    }

    fn depth_func(&mut self, func: u32) {
        unsafe { self.gl.depth_func(func) }
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn cull_face(&mut self, face: u32) {
        unsafe { self.gl.cull_face(face) }
    }

    fn polygon_mode(&mut self, mode: u32) {
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32, near: f32, far: f32) {
        unsafe {
            self.gl.viewport(x, y, width, height);
            self.gl.depth_range_f32(near, far);
        }
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.scissor(x, y, width, height) }
    }

    fn clear(&mut self, mask: u32, color: [f32; 4], depth: f32, stencil: i32) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear_depth_f32(depth);
            self.gl.clear_stencil(stencil);
            self.gl.clear(mask);
        }
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32, instances: i32) {
        unsafe {
            if instances > 1 {
                self.gl.draw_arrays_instanced(mode, first, count, instances);
            } else {
                self.gl.draw_arrays(mode, first, count);
            }
        }
    }

    fn draw_elements(&mut self, mode: u32, count: i32, index_type: u32, byte_offset: i32, base_vertex: i32, instances: i32) {
        unsafe {
            self.gl
                .draw_elements_instanced_base_vertex(mode, count, index_type, byte_offset, instances, base_vertex);
        }
    }

    fn flush(&mut self) {
        unsafe { self.gl.flush() }
    }

    fn finish(&mut self) {
        unsafe { self.gl.finish() }
    }
}

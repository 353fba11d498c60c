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

//! An in-memory [`GlApi`] for tests and machines without a GL context.
//!
//! Object names are allocated like a driver would, GLSL is checked with
//! naga's GLSL front end, and every call that reaches the "GPU" is counted
//! so tests can assert on what the device actually issued.

use super::api::{GlApi, GlBlit, GlTextureSpec, GlVertexBuffer};
use lumen_core::{AdapterInfo, UniformValue};
use std::collections::{HashMap, HashSet};

/// Calls a [`HeadlessGl`] has received, by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlCallCounts {
    /// `draw_arrays` and `draw_elements` calls.
    pub draws: u32,
    /// `clear` calls.
    pub clears: u32,
    /// Values written through `set_uniform`.
    pub uniform_writes: u32,
    /// `buffer_sub_data` calls.
    pub buffer_writes: u32,
    /// `texture_rows` calls.
    pub texture_writes: u32,
    /// `use_program` calls.
    pub program_binds: u32,
    /// `bind_texture` calls.
    pub texture_binds: u32,
    /// Fixed-function state calls (enable, blend, depth, cull, polygon mode).
    pub state_changes: u32,
    /// `blit_framebuffer` calls.
    pub blits: u32,
}

#[derive(Debug)]
struct HeadlessProgram {
    uniforms: Vec<String>,
}

/// OpenGL without a GPU.
#[derive(Debug)]
pub struct HeadlessGl {
    next_name: u32,
    buffers: HashMap<u32, Vec<u8>>,
    textures: HashMap<u32, (u32, u32)>,
    shaders: HashMap<u32, (u32, naga::Module)>,
    programs: HashMap<u32, HeadlessProgram>,
    vertex_arrays: HashSet<u32>,
    framebuffers: HashSet<u32>,
    limits: HashMap<u32, i32>,
    current_program: u32,
    bound_framebuffer: u32,
    texture_units: HashMap<u32, u32>,
    uniform_values: HashMap<(u32, u32), UniformValue>,
    counts: GlCallCounts,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGl {
    /// A driver with GL 4.5-like limits.
    pub fn new() -> Self {
        let limits = HashMap::from([
            (glow::MAX_TEXTURE_SIZE, 8192),
            (glow::MAX_COLOR_ATTACHMENTS, 8),
            (glow::MAX_VERTEX_ATTRIBS, 16),
            (glow::MAX_UNIFORM_BLOCK_SIZE, 64 * 1024),
            (glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS, 32),
            (glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT, 256),
        ]);
        Self {
            next_name: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashSet::new(),
            framebuffers: HashSet::new(),
            limits,
            current_program: 0,
            bound_framebuffer: 0,
            texture_units: HashMap::new(),
            uniform_values: HashMap::new(),
            counts: GlCallCounts::default(),
        }
    }

    fn allocate(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    /// Call counters so far.
    pub fn counts(&self) -> GlCallCounts {
        self.counts
    }

    /// The texture bound to `unit`, `0` if none.
    pub fn texture_on_unit(&self, unit: u32) -> u32 {
        self.texture_units.get(&unit).copied().unwrap_or(0)
    }

    /// The current program.
    pub fn current_program(&self) -> u32 {
        self.current_program
    }

    /// The framebuffer bound for drawing.
    pub fn bound_framebuffer(&self) -> u32 {
        self.bound_framebuffer
    }

    /// The last value written to `location` of `program`.
    pub fn uniform_value(&self, program: u32, location: u32) -> Option<UniformValue> {
        self.uniform_values.get(&(program, location)).copied()
    }

    /// Contents of a buffer.
    pub fn buffer_contents(&self, buffer: u32) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Number of live objects of every kind, shaders included.
    pub fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.shaders.len()
            + self.programs.len()
            + self.vertex_arrays.len()
            + self.framebuffers.len()
    }

    fn naga_stage(stage: u32) -> Option<naga::ShaderStage> {
        match stage {
            glow::VERTEX_SHADER => Some(naga::ShaderStage::Vertex),
            glow::FRAGMENT_SHADER => Some(naga::ShaderStage::Fragment),
            glow::COMPUTE_SHADER => Some(naga::ShaderStage::Compute),
            _ => None,
        }
    }
}

impl GlApi for HeadlessGl {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            device_name: "Headless GL".to_string(),
            vendor_name: "lumen".to_string(),
            driver_version: "4.5 (headless)".to_string(),
        }
    }

    fn get_integer(&self, parameter: u32) -> i32 {
        self.limits.get(&parameter).copied().unwrap_or(0)
    }

    fn create_buffer(&mut self, _target: u32, size: usize, data: Option<&[u8]>, _usage: u32) -> Result<u32, String> {
        let mut contents = vec![0; size];
        if let Some(data) = data {
            let len = data.len().min(size);
            contents[..len].copy_from_slice(&data[..len]);
        }
        let name = self.allocate();
        self.buffers.insert(name, contents);
        Ok(name)
    }

    fn buffer_sub_data(&mut self, _target: u32, buffer: u32, offset: usize, data: &[u8]) {
        self.counts.buffer_writes += 1;
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            if let Some(dst) = contents.get_mut(offset..offset + data.len()) {
                dst.copy_from_slice(data);
            }
        }
    }

    fn bind_uniform_buffer(&mut self, _index: u32, _buffer: u32) {}

    fn delete_buffer(&mut self, buffer: u32) {
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, spec: &GlTextureSpec<'_>) -> Result<u32, String> {
        let max = self.get_integer(glow::MAX_TEXTURE_SIZE) as u32;
        if spec.width > max || spec.height > max {
            return Err(format!("GL_INVALID_VALUE: {}x{} exceeds {max}", spec.width, spec.height));
        }
        let name = self.allocate();
        self.textures.insert(name, (spec.width, spec.height));
        Ok(name)
    }

    fn texture_rows(&mut self, _spec: &GlTextureSpec<'_>, _texture: u32, _y: u32, _rows: u32, _data: &[u8]) {
        self.counts.texture_writes += 1;
    }

    fn bind_texture(&mut self, unit: u32, _target: u32, texture: u32) {
        self.counts.texture_binds += 1;
        self.texture_units.insert(unit, texture);
    }

    fn delete_texture(&mut self, texture: u32) {
        self.textures.remove(&texture);
        self.texture_units.retain(|_, bound| *bound != texture);
    }

    fn compile_shader(&mut self, stage: u32, source: &str) -> Result<u32, String> {
        let naga_stage = Self::naga_stage(stage).ok_or_else(|| format!("GL_INVALID_ENUM: shader type {stage:#x}"))?;
        let module = naga::front::glsl::Frontend::default()
            .parse(&naga::front::glsl::Options::from(naga_stage), source)
            .map_err(|e| e.emit_to_string(source))?;
        let name = self.allocate();
        self.shaders.insert(name, (stage, module));
        Ok(name)
    }

    fn delete_shader(&mut self, shader: u32) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, shaders: &[u32]) -> Result<u32, String> {
        let mut stages = Vec::new();
        let mut uniforms = Vec::new();
        for name in shaders {
            let (stage, module) = self
                .shaders
                .get(name)
                .ok_or_else(|| format!("error: shader object {name} does not exist"))?;
            if stages.contains(stage) {
                return Err(format!("error: more than one shader of type {stage:#x} attached"));
            }
            stages.push(*stage);
            for (_, var) in module.global_variables.iter() {
                let plain = var.space == naga::AddressSpace::Uniform
                    && !matches!(module.types[var.ty].inner, naga::TypeInner::Struct { .. });
                if let (true, Some(uniform)) = (plain, &var.name) {
                    if !uniforms.contains(uniform) {
                        uniforms.push(uniform.clone());
                    }
                }
            }
        }
        let compute = stages == [glow::COMPUTE_SHADER];
        if !compute && !stages.contains(&glow::VERTEX_SHADER) {
            return Err("error: no vertex shader attached".to_string());
        }
        if !compute && !stages.contains(&glow::FRAGMENT_SHADER) {
            return Err("error: no fragment shader attached".to_string());
        }
        let name = self.allocate();
        self.programs.insert(name, HeadlessProgram { uniforms });
        Ok(name)
    }

    fn delete_program(&mut self, program: u32) {
        self.programs.remove(&program);
        self.uniform_values.retain(|(p, _), _| *p != program);
        if self.current_program == program {
            self.current_program = 0;
        }
    }

    fn use_program(&mut self, program: u32) {
        self.counts.program_binds += 1;
        self.current_program = program;
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|p| p as u32)
    }

    fn set_uniform(&mut self, location: u32, value: &UniformValue) {
        self.counts.uniform_writes += 1;
        self.uniform_values.insert((self.current_program, location), *value);
    }

    fn create_vertex_array(&mut self, buffers: &[GlVertexBuffer], index_buffer: Option<u32>) -> Result<u32, String> {
        let referenced = buffers.iter().map(|b| b.buffer).chain(index_buffer);
        for buffer in referenced {
            if !self.buffers.contains_key(&buffer) {
                return Err(format!("GL_INVALID_OPERATION: buffer {buffer} does not exist"));
            }
        }
        let name = self.allocate();
        self.vertex_arrays.insert(name);
        Ok(name)
    }

    fn bind_vertex_array(&mut self, _vertex_array: u32) {}

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn create_framebuffer(&mut self, colors: &[u32], depth: Option<(u32, u32)>) -> Result<u32, String> {
        let attachments = colors.iter().copied().chain(depth.map(|(t, _)| t));
        for texture in attachments {
            if !self.textures.contains_key(&texture) {
                return Err("GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_string());
            }
        }
        let name = self.allocate();
        self.framebuffers.insert(name);
        Ok(name)
    }

    fn bind_framebuffer(&mut self, framebuffer: u32) {
        self.bound_framebuffer = framebuffer;
    }

    fn blit_framebuffer(&mut self, _blit: &GlBlit) {
        self.counts.blits += 1;
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == framebuffer {
            self.bound_framebuffer = 0;
        }
    }

    fn set_enabled(&mut self, _capability: u32, _enabled: bool) {
        self.counts.state_changes += 1;
    }

    fn blend_func(&mut self, _src: u32, _dst: u32) {
        self.counts.state_changes += 1;
    }

    fn depth_func(&mut self, _func: u32) {
        self.counts.state_changes += 1;
    }

    fn depth_mask(&mut self, _write: bool) {
        self.counts.state_changes += 1;
    }

    fn cull_face(&mut self, _face: u32) {
        self.counts.state_changes += 1;
    }

    fn polygon_mode(&mut self, _mode: u32) {
        self.counts.state_changes += 1;
    }

    fn viewport(&mut self, _x: i32, _y: i32, _width: i32, _height: i32, _near: f32, _far: f32) {}

    fn scissor(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {}

    fn clear(&mut self, _mask: u32, _color: [f32; 4], _depth: f32, _stencil: i32) {
        self.counts.clears += 1;
    }

    fn draw_arrays(&mut self, _mode: u32, _first: i32, _count: i32, _instances: i32) {
        self.counts.draws += 1;
    }

    fn draw_elements(
        &mut self,
        _mode: u32,
        _count: i32,
        _index_type: u32,
        _byte_offset: i32,
        _base_vertex: i32,
        _instances: i32,
    ) {
        self.counts.draws += 1;
    }

    fn flush(&mut self) {}

    fn finish(&mut self) {}
}

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

//! Translation tables from `lumen-core` enums to GL constants.

use lumen_core::{
    BlendMode, BufferType, BufferUsage, CullMode, DepthFunc, IndexFormat, PrimitiveType, ShaderStage, TextureFilter,
    TextureFormat, TextureType, TextureWrap, VertexFormat,
};

/// A local extension trait converting engine types into GL constants,
/// keeping a `.into_gl()` call syntax despite the orphan rules.
pub trait IntoGl<T> {
    /// Converts `self` into its GL counterpart.
    fn into_gl(self) -> T;
}

/// Internal format plus pixel transfer format and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlFormat {
    /// Sized internal format.
    pub internal: u32,
    /// Transfer format.
    pub format: u32,
    /// Transfer component type.
    pub ty: u32,
}

/// Attribute pointer parameters of a vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVertexFormat {
    /// Component count.
    pub components: i32,
    /// Component type.
    pub ty: u32,
    /// Normalized integer data.
    pub normalized: bool,
    /// Read as integers by the shader.
    pub integer: bool,
}

// --- Buffers ---

impl IntoGl<u32> for BufferType {
    fn into_gl(self) -> u32 {
        match self {
            BufferType::Vertex => glow::ARRAY_BUFFER,
            BufferType::Index => glow::ELEMENT_ARRAY_BUFFER,
            BufferType::Uniform => glow::UNIFORM_BUFFER,
            BufferType::Storage => glow::SHADER_STORAGE_BUFFER,
            BufferType::Staging => glow::COPY_READ_BUFFER,
        }
    }
}

impl IntoGl<u32> for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
            BufferUsage::Stream => glow::STREAM_DRAW,
        }
    }
}

impl IntoGl<u32> for IndexFormat {
    fn into_gl(self) -> u32 {
        match self {
            IndexFormat::Uint16 => glow::UNSIGNED_SHORT,
            IndexFormat::Uint32 => glow::UNSIGNED_INT,
        }
    }
}

// --- Textures ---

impl IntoGl<u32> for TextureType {
    fn into_gl(self) -> u32 {
        match self {
            TextureType::Texture2D => glow::TEXTURE_2D,
            TextureType::Texture3D => glow::TEXTURE_3D,
            TextureType::TextureCube => glow::TEXTURE_CUBE_MAP,
            TextureType::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        }
    }
}

impl IntoGl<GlFormat> for TextureFormat {
    fn into_gl(self) -> GlFormat {
        let (internal, format, ty) = match self {
            TextureFormat::R8Unorm => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
            TextureFormat::Rg8Unorm => (glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba8Unorm => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba8UnormSrgb => (glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
            TextureFormat::Bgra8Unorm => (glow::RGBA8, glow::BGRA, glow::UNSIGNED_BYTE),
            TextureFormat::Bgra8UnormSrgb => (glow::SRGB8_ALPHA8, glow::BGRA, glow::UNSIGNED_BYTE),
            TextureFormat::R16Float => (glow::R16F, glow::RED, glow::HALF_FLOAT),
            TextureFormat::Rg16Float => (glow::RG16F, glow::RG, glow::HALF_FLOAT),
            TextureFormat::Rgba16Float => (glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
            TextureFormat::R32Float => (glow::R32F, glow::RED, glow::FLOAT),
            TextureFormat::Rg32Float => (glow::RG32F, glow::RG, glow::FLOAT),
            TextureFormat::Rgba32Float => (glow::RGBA32F, glow::RGBA, glow::FLOAT),
            TextureFormat::Depth16Unorm => (glow::DEPTH_COMPONENT16, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT),
            TextureFormat::Depth24Plus => (glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT, glow::UNSIGNED_INT),
            TextureFormat::Depth24PlusStencil8 => (glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8),
            TextureFormat::Depth32Float => (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT),
        };
        GlFormat { internal, format, ty }
    }
}

impl IntoGl<u32> for TextureWrap {
    fn into_gl(self) -> u32 {
        match self {
            TextureWrap::Repeat => glow::REPEAT,
            TextureWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
            TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
            TextureWrap::ClampToBorder => glow::CLAMP_TO_BORDER,
        }
    }
}

impl IntoGl<u32> for TextureFilter {
    fn into_gl(self) -> u32 {
        match self {
            TextureFilter::Nearest => glow::NEAREST,
            TextureFilter::Linear => glow::LINEAR,
        }
    }
}

/// Minification filter, picking a mipmapped variant when the texture has
/// more than one level.
pub fn min_filter(filter: TextureFilter, mip_levels: u32) -> u32 {
    match (filter, mip_levels > 1) {
        (TextureFilter::Nearest, false) => glow::NEAREST,
        (TextureFilter::Linear, false) => glow::LINEAR,
        (TextureFilter::Nearest, true) => glow::NEAREST_MIPMAP_NEAREST,
        (TextureFilter::Linear, true) => glow::LINEAR_MIPMAP_LINEAR,
    }
}

// --- Programs ---

impl IntoGl<u32> for ShaderStage {
    fn into_gl(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
            ShaderStage::Compute => glow::COMPUTE_SHADER,
        }
    }
}

// --- Vertex input and primitives ---

impl IntoGl<GlVertexFormat> for VertexFormat {
    fn into_gl(self) -> GlVertexFormat {
        let (components, ty, normalized, integer) = match self {
            VertexFormat::Float32 => (1, glow::FLOAT, false, false),
            VertexFormat::Float32x2 => (2, glow::FLOAT, false, false),
            VertexFormat::Float32x3 => (3, glow::FLOAT, false, false),
            VertexFormat::Float32x4 => (4, glow::FLOAT, false, false),
            VertexFormat::Unorm8x4 => (4, glow::UNSIGNED_BYTE, true, false),
            VertexFormat::Uint32 => (1, glow::UNSIGNED_INT, false, true),
            VertexFormat::Uint32x4 => (4, glow::UNSIGNED_INT, false, true),
        };
        GlVertexFormat {
            components,
            ty,
            normalized,
            integer,
        }
    }
}

impl IntoGl<u32> for PrimitiveType {
    fn into_gl(self) -> u32 {
        match self {
            PrimitiveType::Points => glow::POINTS,
            PrimitiveType::Lines => glow::LINES,
            PrimitiveType::LineStrip => glow::LINE_STRIP,
            PrimitiveType::Triangles => glow::TRIANGLES,
            PrimitiveType::TriangleStrip => glow::TRIANGLE_STRIP,
        }
    }
}

// --- Fixed-function state ---

/// Blend factors `(src, dst)`, or `None` when blending is off.
impl IntoGl<Option<(u32, u32)>> for BlendMode {
    fn into_gl(self) -> Option<(u32, u32)> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::AlphaBlend => Some((glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA)),
            BlendMode::Additive => Some((glow::SRC_ALPHA, glow::ONE)),
            BlendMode::Multiply => Some((glow::DST_COLOR, glow::ZERO)),
            BlendMode::PremultipliedAlpha => Some((glow::ONE, glow::ONE_MINUS_SRC_ALPHA)),
        }
    }
}

impl IntoGl<u32> for DepthFunc {
    fn into_gl(self) -> u32 {
        match self {
            DepthFunc::Never => glow::NEVER,
            DepthFunc::Less => glow::LESS,
            DepthFunc::Equal => glow::EQUAL,
            DepthFunc::LessEqual => glow::LEQUAL,
            DepthFunc::Greater => glow::GREATER,
            DepthFunc::NotEqual => glow::NOTEQUAL,
            DepthFunc::GreaterEqual => glow::GEQUAL,
            DepthFunc::Always => glow::ALWAYS,
        }
    }
}

/// Culled faces, or `None` when culling is off.
impl IntoGl<Option<u32>> for CullMode {
    fn into_gl(self) -> Option<u32> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(glow::FRONT),
            CullMode::Back => Some(glow::BACK),
            CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
        }
    }
}

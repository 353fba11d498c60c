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

//! Generic rendering enums.
//!
//! Every enum that a backend translates into a native value exposes an `ALL`
//! table so conversion tables can be checked for totality.

use serde::{Deserialize, Serialize};

/// The role a buffer plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Per-vertex attribute data.
    Vertex,
    /// Index data for indexed draws.
    Index,
    /// Constant data read by shaders through a uniform block.
    Uniform,
    /// Read/write shader storage.
    Storage,
    /// CPU-visible transfer source.
    Staging,
}

impl BufferType {
    /// Every buffer type.
    pub const ALL: [BufferType; 5] = [
        BufferType::Vertex,
        BufferType::Index,
        BufferType::Uniform,
        BufferType::Storage,
        BufferType::Staging,
    ];
}

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

impl BufferUsage {
    /// Every buffer usage hint.
    pub const ALL: [BufferUsage; 3] = [BufferUsage::Static, BufferUsage::Dynamic, BufferUsage::Stream];
}

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// A single 2D image.
    #[default]
    Texture2D,
    /// A volume texture.
    Texture3D,
    /// Six 2D faces.
    TextureCube,
    /// An array of 2D layers.
    Texture2DArray,
}

impl TextureType {
    /// Every texture type.
    pub const ALL: [TextureType; 4] = [
        TextureType::Texture2D,
        TextureType::Texture3D,
        TextureType::TextureCube,
        TextureType::Texture2DArray,
    ];
}

/// Defines the memory format of pixels in a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    // 8-bit formats
    /// One 8-bit unsigned normalized component.
    R8Unorm,
    /// Two 8-bit unsigned normalized components.
    Rg8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA).
    #[default]
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA) in the sRGB color space.
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned normalized components (BGRA).
    Bgra8Unorm,
    /// Four 8-bit unsigned normalized components (BGRA) in the sRGB color space.
    Bgra8UnormSrgb,
    // 16-bit float formats
    /// One 16-bit float component.
    R16Float,
    /// Two 16-bit float components.
    Rg16Float,
    /// Four 16-bit float components.
    Rgba16Float,
    // 32-bit float formats
    /// One 32-bit float component.
    R32Float,
    /// Two 32-bit float components.
    Rg32Float,
    /// Four 32-bit float components.
    Rgba32Float,
    // Depth/stencil formats
    /// A 16-bit unsigned normalized depth format.
    Depth16Unorm,
    /// A 24-bit depth format.
    Depth24Plus,
    /// A 24-bit depth format with an 8-bit stencil component.
    Depth24PlusStencil8,
    /// A 32-bit float depth format.
    Depth32Float,
}

impl TextureFormat {
    /// Every texture format.
    pub const ALL: [TextureFormat; 16] = [
        TextureFormat::R8Unorm,
        TextureFormat::Rg8Unorm,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb,
        TextureFormat::R16Float,
        TextureFormat::Rg16Float,
        TextureFormat::Rgba16Float,
        TextureFormat::R32Float,
        TextureFormat::Rg32Float,
        TextureFormat::Rgba32Float,
        TextureFormat::Depth16Unorm,
        TextureFormat::Depth24Plus,
        TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32Float,
    ];

    /// Returns the size in bytes of a single texel.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Float | TextureFormat::Depth16Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::Depth24Plus
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth and depth/stencil formats.
    pub const fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32Float
        )
    }

    /// Returns `true` if the format carries a stencil component.
    pub const fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }
}

/// Texel filtering used when sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation between texels.
    #[default]
    Linear,
}

impl TextureFilter {
    /// Every filter mode.
    pub const ALL: [TextureFilter; 2] = [TextureFilter::Nearest, TextureFilter::Linear];
}

/// Addressing mode for coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirroredRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Clamp to the border color.
    ClampToBorder,
}

impl TextureWrap {
    /// Every wrap mode.
    pub const ALL: [TextureWrap; 4] = [
        TextureWrap::Repeat,
        TextureWrap::MirroredRepeat,
        TextureWrap::ClampToEdge,
        TextureWrap::ClampToBorder,
    ];
}

/// Defines the programmable stage in the graphics pipeline a shader module is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The fragment (or pixel) shader stage.
    Fragment,
    /// The compute shader stage.
    Compute,
}

impl ShaderStage {
    /// Every shader stage.
    pub const ALL: [ShaderStage; 3] = [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute];
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Each vertex is a point.
    Points,
    /// Every two vertices form a line.
    Lines,
    /// Consecutive vertices form a connected line.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    Triangles,
    /// Each vertex after the second forms a triangle with the previous two.
    TriangleStrip,
}

impl PrimitiveType {
    /// Every primitive type.
    pub const ALL: [PrimitiveType; 5] = [
        PrimitiveType::Points,
        PrimitiveType::Lines,
        PrimitiveType::LineStrip,
        PrimitiveType::Triangles,
        PrimitiveType::TriangleStrip,
    ];

    /// Number of triangles produced by `vertex_count` vertices of this type.
    pub const fn triangle_count(&self, vertex_count: u32) -> u32 {
        match self {
            PrimitiveType::Triangles => vertex_count / 3,
            PrimitiveType::TriangleStrip => vertex_count.saturating_sub(2),
            PrimitiveType::Points | PrimitiveType::Lines | PrimitiveType::LineStrip => 0,
        }
    }
}

/// Color blending presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Blending disabled.
    #[default]
    Opaque,
    /// `src * a + dst * (1 - a)`.
    AlphaBlend,
    /// `src + dst`.
    Additive,
    /// `src * dst`.
    Multiply,
    /// `src + dst * (1 - a)`, for colors already multiplied by alpha.
    PremultipliedAlpha,
}

impl BlendMode {
    /// Every blend mode.
    pub const ALL: [BlendMode; 5] = [
        BlendMode::Opaque,
        BlendMode::AlphaBlend,
        BlendMode::Additive,
        BlendMode::Multiply,
        BlendMode::PremultipliedAlpha,
    ];
}

/// Comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    /// Never passes.
    Never,
    /// Passes if the incoming depth is smaller.
    #[default]
    Less,
    /// Passes if the depths are equal.
    Equal,
    /// Passes if the incoming depth is smaller or equal.
    LessEqual,
    /// Passes if the incoming depth is greater.
    Greater,
    /// Passes if the depths differ.
    NotEqual,
    /// Passes if the incoming depth is greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

impl DepthFunc {
    /// Every depth comparison.
    pub const ALL: [DepthFunc; 8] = [
        DepthFunc::Never,
        DepthFunc::Less,
        DepthFunc::Equal,
        DepthFunc::LessEqual,
        DepthFunc::Greater,
        DepthFunc::NotEqual,
        DepthFunc::GreaterEqual,
        DepthFunc::Always,
    ];
}

/// Which faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
    /// Cull every polygon.
    FrontAndBack,
}

impl CullMode {
    /// Every cull mode.
    pub const ALL: [CullMode; 4] = [CullMode::None, CullMode::Front, CullMode::Back, CullMode::FrontAndBack];
}

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Every index format.
    pub const ALL: [IndexFormat; 2] = [IndexFormat::Uint16, IndexFormat::Uint32];

    /// Size of one index in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Four normalized bytes.
    Unorm8x4,
    /// One 32-bit unsigned integer.
    Uint32,
    /// Four 32-bit unsigned integers.
    Uint32x4,
}

impl VertexFormat {
    /// Every vertex format.
    pub const ALL: [VertexFormat; 7] = [
        VertexFormat::Float32,
        VertexFormat::Float32x2,
        VertexFormat::Float32x3,
        VertexFormat::Float32x4,
        VertexFormat::Unorm8x4,
        VertexFormat::Uint32,
        VertexFormat::Uint32x4,
    ];

    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Unorm8x4 | VertexFormat::Uint32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }

    /// Number of components.
    pub const fn components(&self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 => 1,
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 | VertexFormat::Unorm8x4 | VertexFormat::Uint32x4 => 4,
        }
    }
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance once per vertex.
    #[default]
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// The number of samples per pixel for Multisample Anti-Aliasing (MSAA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    /// 1 sample per pixel (MSAA disabled).
    #[default]
    X1,
    /// 2 samples per pixel.
    X2,
    /// 4 samples per pixel.
    X4,
    /// 8 samples per pixel.
    X8,
}

impl SampleCount {
    /// The sample count as an integer.
    pub const fn count(&self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
        }
    }
}

/// Abstract access state of a resource, tracked by backends with explicit
/// state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// State not known yet; the resource was never transitioned.
    #[default]
    Unknown,
    /// Read by shaders or as a copy source.
    Read,
    /// Written as a render target, depth target or copy destination.
    Write,
    /// Read and written in the same pass (unordered access).
    ReadWrite,
}

impl ResourceState {
    /// Every resource state.
    pub const ALL: [ResourceState; 4] = [
        ResourceState::Unknown,
        ResourceState::Read,
        ResourceState::Write,
        ResourceState::ReadWrite,
    ];
}

/// Majorness of matrix data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixLayout {
    /// Columns are contiguous in memory.
    #[default]
    ColumnMajor,
    /// Rows are contiguous in memory.
    RowMajor,
}

/// The kind of resource a shader binding slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// A uniform (constant) buffer.
    UniformBuffer,
    /// A storage buffer.
    StorageBuffer,
    /// A sampled texture.
    Texture,
    /// A sampler.
    Sampler,
}

/// The kind of a GPU resource object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A [`Buffer`](crate::api::buffer::Buffer).
    Buffer,
    /// A [`Texture`](crate::api::texture::Texture).
    Texture,
    /// A [`Shader`](crate::api::shader::Shader).
    Shader,
    /// A [`Pipeline`](crate::api::pipeline::Pipeline).
    Pipeline,
    /// A [`Framebuffer`](crate::api::framebuffer::Framebuffer).
    Framebuffer,
    /// A [`VertexArray`](crate::api::vertex_array::VertexArray).
    VertexArray,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_count_per_primitive_type() {
        assert_eq!(PrimitiveType::Triangles.triangle_count(9), 3);
        assert_eq!(PrimitiveType::TriangleStrip.triangle_count(5), 3);
        assert_eq!(PrimitiveType::TriangleStrip.triangle_count(1), 0);
        assert_eq!(PrimitiveType::Lines.triangle_count(6), 0);
    }

    #[test]
    fn depth_formats_are_flagged() {
        let depth: Vec<_> = TextureFormat::ALL.iter().filter(|f| f.is_depth()).collect();
        assert_eq!(depth.len(), 4);
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
    }

    #[test]
    fn vertex_format_sizes_match_components() {
        for format in VertexFormat::ALL {
            assert_eq!(format.size() % 4, 0);
            assert!(format.components() >= 1);
        }
        assert_eq!(VertexFormat::Float32x3.size(), 12);
    }
}

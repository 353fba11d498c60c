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

//! Translation tables from `lumen-core` enums to `wgpu` types.

use super::api::BufferHeap;
use lumen_core::{
    BindingKind, BlendMode, BufferType, BufferUsage, CullMode, DepthFunc, IndexFormat, PrimitiveType, ShaderStage,
    ShaderStageFlags, TextureFilter, TextureFormat, TextureType, TextureWrap, VertexFormat, VertexStepMode,
};

/// A local extension trait to convert engine types into `wgpu` types.
/// This avoids the orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into its `wgpu` counterpart.
    fn into_wgpu(self) -> T;
}

// --- Buffers ---

impl IntoWgpu<wgpu::BufferUsages> for BufferType {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let role = match self {
            BufferType::Vertex => wgpu::BufferUsages::VERTEX,
            BufferType::Index => wgpu::BufferUsages::INDEX,
            BufferType::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferType::Storage => wgpu::BufferUsages::STORAGE,
            BufferType::Staging => wgpu::BufferUsages::COPY_SRC,
        };
        role | wgpu::BufferUsages::COPY_DST
    }
}

/// Heap a buffer with this update frequency lives in. Only static buffers
/// stay in GPU-local memory.
pub fn buffer_heap(usage: BufferUsage) -> BufferHeap {
    match usage {
        BufferUsage::Static => BufferHeap::Default,
        BufferUsage::Dynamic | BufferUsage::Stream => BufferHeap::Upload,
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

// --- Textures ---

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
            TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth16Unorm => wgpu::TextureFormat::Depth16Unorm,
            TextureFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

/// Reverse lookup for swap chain formats. Formats with no engine
/// counterpart return `None`.
pub fn from_wgpu_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    TextureFormat::ALL.into_iter().find(|f| f.into_wgpu() == format)
}

impl IntoWgpu<wgpu::TextureDimension> for TextureType {
    fn into_wgpu(self) -> wgpu::TextureDimension {
        match self {
            TextureType::Texture2D | TextureType::TextureCube | TextureType::Texture2DArray => {
                wgpu::TextureDimension::D2
            }
            TextureType::Texture3D => wgpu::TextureDimension::D3,
        }
    }
}

impl IntoWgpu<wgpu::TextureViewDimension> for TextureType {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            TextureType::Texture2D => wgpu::TextureViewDimension::D2,
            TextureType::Texture3D => wgpu::TextureViewDimension::D3,
            TextureType::TextureCube => wgpu::TextureViewDimension::Cube,
            TextureType::Texture2DArray => wgpu::TextureViewDimension::D2Array,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for TextureFilter {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::MipmapFilterMode> for TextureFilter {
    fn into_wgpu(self) -> wgpu::MipmapFilterMode {
        match self {
            TextureFilter::Nearest => wgpu::MipmapFilterMode::Nearest,
            TextureFilter::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for TextureWrap {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            TextureWrap::Repeat => wgpu::AddressMode::Repeat,
            TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
            TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            TextureWrap::ClampToBorder => wgpu::AddressMode::ClampToBorder,
        }
    }
}

// --- Pipeline state ---

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveType {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
            PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
            PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

/// Blend state of the color targets; `None` writes opaque.
impl IntoWgpu<Option<wgpu::BlendState>> for BlendMode {
    fn into_wgpu(self) -> Option<wgpu::BlendState> {
        let component = |src_factor, dst_factor| wgpu::BlendComponent {
            src_factor,
            dst_factor,
            operation: wgpu::BlendOperation::Add,
        };
        let uniform = |src, dst| {
            Some(wgpu::BlendState {
                color: component(src, dst),
                alpha: component(src, dst),
            })
        };
        match self {
            BlendMode::Opaque => None,
            BlendMode::AlphaBlend => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Additive => uniform(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
            BlendMode::Multiply => uniform(wgpu::BlendFactor::Dst, wgpu::BlendFactor::Zero),
            BlendMode::PremultipliedAlpha => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for DepthFunc {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            DepthFunc::Never => wgpu::CompareFunction::Never,
            DepthFunc::Less => wgpu::CompareFunction::Less,
            DepthFunc::Equal => wgpu::CompareFunction::Equal,
            DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
            DepthFunc::Greater => wgpu::CompareFunction::Greater,
            DepthFunc::NotEqual => wgpu::CompareFunction::NotEqual,
            DepthFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            DepthFunc::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Culled face. Pipeline state objects cannot cull both faces, so
/// `FrontAndBack` disables culling here and the device drops the draw.
impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None | CullMode::FrontAndBack => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

// --- Vertex input ---

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }
}

impl IntoWgpu<wgpu::VertexStepMode> for VertexStepMode {
    fn into_wgpu(self) -> wgpu::VertexStepMode {
        match self {
            VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
        }
    }
}

// --- Root signatures ---

impl IntoWgpu<wgpu::ShaderStages> for ShaderStage {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
            ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
        }
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStageFlags {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        self.stages()
            .fold(wgpu::ShaderStages::NONE, |acc, stage| acc | stage.into_wgpu())
    }
}

/// Descriptor type of a declared binding. Textures are sampled as
/// filterable 2D float views.
impl IntoWgpu<wgpu::BindingType> for BindingKind {
    fn into_wgpu(self) -> wgpu::BindingType {
        match self {
            BindingKind::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::StorageBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Texture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            BindingKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn distinct<T: Copy, U: std::hash::Hash + Eq>(all: &[T], f: impl Fn(T) -> U) -> usize {
        all.iter().map(|&v| f(v)).collect::<HashSet<_>>().len()
    }

    #[test]
    fn one_to_one_tables_have_no_collisions() {
        let format = |v: TextureFormat| IntoWgpu::<wgpu::TextureFormat>::into_wgpu(v);
        assert_eq!(distinct(&TextureFormat::ALL, format), TextureFormat::ALL.len());
        let view = |v: TextureType| IntoWgpu::<wgpu::TextureViewDimension>::into_wgpu(v);
        assert_eq!(distinct(&TextureType::ALL, view), TextureType::ALL.len());
        let wrap = |v: TextureWrap| IntoWgpu::<wgpu::AddressMode>::into_wgpu(v);
        assert_eq!(distinct(&TextureWrap::ALL, wrap), TextureWrap::ALL.len());
        let topology = |v: PrimitiveType| IntoWgpu::<wgpu::PrimitiveTopology>::into_wgpu(v);
        assert_eq!(distinct(&PrimitiveType::ALL, topology), PrimitiveType::ALL.len());
        let compare = |v: DepthFunc| IntoWgpu::<wgpu::CompareFunction>::into_wgpu(v);
        assert_eq!(distinct(&DepthFunc::ALL, compare), DepthFunc::ALL.len());
        let vertex = |v: VertexFormat| IntoWgpu::<wgpu::VertexFormat>::into_wgpu(v);
        assert_eq!(distinct(&VertexFormat::ALL, vertex), VertexFormat::ALL.len());
        let usage = |v: BufferType| IntoWgpu::<wgpu::BufferUsages>::into_wgpu(v).bits();
        assert_eq!(distinct(&BufferType::ALL, usage), BufferType::ALL.len());
    }

    #[test]
    fn every_abstract_value_has_a_native_value() {
        for usage in BufferUsage::ALL {
            let _: BufferHeap = buffer_heap(usage);
        }
        for ty in BufferType::ALL {
            assert!(!IntoWgpu::<wgpu::BufferUsages>::into_wgpu(ty).is_empty());
        }
        for format in TextureFormat::ALL {
            let _: wgpu::TextureFormat = format.into_wgpu();
        }
        for stage in ShaderStage::ALL {
            let native: wgpu::ShaderStages = stage.into_wgpu();
            assert!(!native.is_empty(), "{stage:?}");
        }
        for primitive in PrimitiveType::ALL {
            let _: wgpu::PrimitiveTopology = primitive.into_wgpu();
        }
        for mode in BlendMode::ALL {
            let _: Option<wgpu::BlendState> = mode.into_wgpu();
        }
        for func in DepthFunc::ALL {
            let _: wgpu::CompareFunction = func.into_wgpu();
        }
        for mode in CullMode::ALL {
            let _: Option<wgpu::Face> = mode.into_wgpu();
        }
    }

    #[test]
    fn only_static_buffers_stay_gpu_local() {
        assert_eq!(buffer_heap(BufferUsage::Static), BufferHeap::Default);
        assert_eq!(buffer_heap(BufferUsage::Dynamic), BufferHeap::Upload);
        assert_eq!(buffer_heap(BufferUsage::Stream), BufferHeap::Upload);
    }

    #[test]
    fn depth_formats_stay_depth_formats() {
        for format in TextureFormat::ALL {
            let native: wgpu::TextureFormat = format.into_wgpu();
            assert_eq!(native.is_depth_stencil_format(), format.is_depth(), "{format:?}");
            assert_eq!(from_wgpu_format(native), Some(format));
        }
        assert_eq!(from_wgpu_format(wgpu::TextureFormat::Rgb10a2Unorm), None);
    }

    #[test]
    fn only_opaque_disables_blending() {
        for mode in BlendMode::ALL {
            let blend: Option<wgpu::BlendState> = mode.into_wgpu();
            assert_eq!(blend.is_none(), mode == BlendMode::Opaque);
        }
    }

    #[test]
    fn stage_flags_fold_into_shader_stages() {
        let stages: wgpu::ShaderStages = ShaderStageFlags::VERTEX_FRAGMENT.into_wgpu();
        assert_eq!(stages, wgpu::ShaderStages::VERTEX_FRAGMENT);
        let none: wgpu::ShaderStages = ShaderStageFlags::NONE.into_wgpu();
        assert!(none.is_empty());
    }

    #[test]
    fn every_buffer_can_be_written() {
        for ty in BufferType::ALL {
            let usage: wgpu::BufferUsages = ty.into_wgpu();
            assert!(usage.contains(wgpu::BufferUsages::COPY_DST));
        }
    }
}

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

//! Texture descriptors and texture resource objects.

use super::resource::{Bindable, BindingCategory, GpuResource, NativeHandle, StagingArea, Uploadable};
use super::util::{TextureFilter, TextureFormat, TextureType, TextureWrap};
use crate::error::ResourceError;

/// Sampling parameters carried by every texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    /// Minification filter.
    pub min_filter: TextureFilter,
    /// Magnification filter.
    pub mag_filter: TextureFilter,
    /// Addressing along U.
    pub wrap_u: TextureWrap,
    /// Addressing along V.
    pub wrap_v: TextureWrap,
    /// Addressing along W.
    pub wrap_w: TextureWrap,
}

/// A descriptor used to create a [`Texture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug name, forwarded to native debug labels.
    pub debug_name: String,
    /// Dimensionality.
    pub texture_type: TextureType,
    /// Texel format.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (3D textures only, 1 otherwise).
    pub depth: u32,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
    /// Number of array layers (6 for cube maps).
    pub array_size: u32,
    /// Sampling parameters.
    pub sampler: SamplerDesc,
    /// Tightly packed texels of mip level 0.
    pub initial_data: Option<Vec<u8>>,
    /// Whether the texture can be attached to a framebuffer.
    pub render_target: bool,
}

impl TextureDesc {
    /// Describes a single-level 2D texture.
    pub fn new_2d(debug_name: impl Into<String>, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            debug_name: debug_name.into(),
            texture_type: TextureType::Texture2D,
            format,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            sampler: SamplerDesc::default(),
            initial_data: None,
            render_target: false,
        }
    }

    /// Describes a 2D texture usable as a color or depth attachment.
    pub fn render_target(debug_name: impl Into<String>, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            render_target: true,
            ..Self::new_2d(debug_name, format, width, height)
        }
    }

    /// Sets the contents of mip level 0.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Sets the sampling parameters.
    pub fn with_sampler(mut self, sampler: SamplerDesc) -> Self {
        self.sampler = sampler;
        self
    }

    /// Bytes of one array layer of mip level 0.
    pub fn level0_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64 * self.format.bytes_per_pixel() as u64
    }

    /// Bytes of the whole mip chain across all layers.
    pub fn total_size(&self) -> u64 {
        let mut total = 0u64;
        let (mut w, mut h, mut d) = (self.width as u64, self.height as u64, self.depth as u64);
        for _ in 0..self.mip_levels.max(1) {
            total += w * h * d * self.format.bytes_per_pixel() as u64;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            d = (d / 2).max(1);
        }
        total * self.array_size.max(1) as u64
    }

    /// Checks the descriptor before any native call is made.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let fail = |why: String| Err(ResourceError::InvalidDescriptor(format!("texture '{}': {why}", self.debug_name)));
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return fail(format!("extent {}x{}x{} has a zero dimension", self.width, self.height, self.depth));
        }
        if self.mip_levels == 0 || self.array_size == 0 {
            return fail("mip level and array layer counts must be at least 1".to_string());
        }
        let max_mips = 32 - self.width.max(self.height).leading_zeros();
        if self.mip_levels > max_mips {
            return fail(format!("{} mip levels exceed the {max_mips} the extent allows", self.mip_levels));
        }
        if self.texture_type == TextureType::TextureCube && self.array_size != 6 {
            return fail(format!("cube maps need 6 layers, got {}", self.array_size));
        }
        if self.texture_type != TextureType::Texture3D && self.depth != 1 {
            return fail("only 3D textures may have a depth greater than 1".to_string());
        }
        if let Some(data) = &self.initial_data {
            let expected = self.level0_size() * self.array_size as u64;
            if data.len() as u64 != expected {
                return fail(format!("initial data is {} bytes, expected {expected}", data.len()));
            }
        }
        Ok(())
    }
}

/// A GPU texture.
#[derive(Debug)]
pub struct Texture {
    desc: TextureDesc,
    native: NativeHandle,
    staging: StagingArea,
}

impl Texture {
    /// Wraps a native texture created from `desc`.
    pub fn new(desc: TextureDesc, native: NativeHandle) -> Self {
        Self {
            desc,
            native,
            staging: StagingArea::default(),
        }
    }

    /// The descriptor the texture was created from.
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    /// Width and height of mip level 0.
    pub fn extent(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }
}

impl GpuResource for Texture {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

impl Bindable for Texture {
    fn binding_category(&self) -> BindingCategory {
        BindingCategory::Texture
    }
}

/// Staged texture writes address mip level 0 of layer 0 as a tightly packed
/// byte range.
impl Uploadable for Texture {
    fn capacity(&self) -> u64 {
        self.desc.level0_size()
    }

    fn staging(&self) -> &StagingArea {
        &self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_size_covers_mip_chain() {
        let mut desc = TextureDesc::new_2d("albedo", TextureFormat::Rgba8Unorm, 4, 4);
        desc.mip_levels = 3;
        // 4x4 + 2x2 + 1x1 texels of 4 bytes
        assert_eq!(desc.total_size(), (16 + 4 + 1) * 4);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn too_many_mips_are_rejected() {
        let mut desc = TextureDesc::new_2d("tiny", TextureFormat::R8Unorm, 2, 2);
        desc.mip_levels = 3;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn initial_data_must_match_level0() {
        let desc = TextureDesc::new_2d("white", TextureFormat::Rgba8Unorm, 1, 1).with_data(vec![255; 4]);
        assert!(desc.validate().is_ok());
        let desc = TextureDesc::new_2d("short", TextureFormat::Rgba8Unorm, 2, 2).with_data(vec![255; 4]);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn cube_maps_need_six_layers() {
        let mut desc = TextureDesc::new_2d("sky", TextureFormat::Rgba16Float, 64, 64);
        desc.texture_type = TextureType::TextureCube;
        assert!(desc.validate().is_err());
        desc.array_size = 6;
        assert!(desc.validate().is_ok());
    }
}

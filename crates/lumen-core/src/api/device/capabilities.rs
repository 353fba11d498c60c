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

//! Device capability snapshot.

use crate::api::backend::GraphicsApi;
use crate::api::util::MatrixLayout;

/// Limits and features of a device, queried once at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsCapabilities {
    /// The native API.
    pub api: GraphicsApi,
    /// Largest 2D texture dimension.
    pub max_texture_size: u32,
    /// Largest number of simultaneous color attachments.
    pub max_color_attachments: u32,
    /// Largest number of vertex attributes.
    pub max_vertex_attributes: u32,
    /// Largest uniform buffer binding in bytes.
    pub max_uniform_buffer_size: u32,
    /// Required alignment of constant buffer offsets and sizes.
    pub constant_buffer_alignment: u32,
    /// Number of texture slots usable by `bind_texture`.
    pub max_texture_slots: u32,
    /// Whether command lists may be recorded on other threads and executed
    /// through the device.
    pub supports_multithreading: bool,
    /// Whether compute pipelines are available.
    pub supports_compute: bool,
    /// Matrix majorness the backend's shaders expect in uniform data.
    pub matrix_layout: MatrixLayout,
}

impl GraphicsCapabilities {
    /// Conservative limits for `api`, used before a native query and by
    /// devices that cannot query.
    pub fn baseline(api: GraphicsApi) -> Self {
        Self {
            api,
            max_texture_size: 2048,
            max_color_attachments: 4,
            max_vertex_attributes: 16,
            max_uniform_buffer_size: 16 * 1024,
            constant_buffer_alignment: 256,
            max_texture_slots: 16,
            supports_multithreading: false,
            supports_compute: false,
            matrix_layout: MatrixLayout::ColumnMajor,
        }
    }

    /// Rounds `size` up to the constant buffer alignment.
    pub fn align_constant_size(&self, size: u64) -> u64 {
        align_up(size, self.constant_buffer_alignment.max(1) as u64)
    }
}

/// Rounds `value` up to a multiple of `alignment`.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_sizes_round_up_to_256() {
        let caps = GraphicsCapabilities::baseline(GraphicsApi::Dx12);
        assert_eq!(caps.align_constant_size(1), 256);
        assert_eq!(caps.align_constant_size(256), 256);
        assert_eq!(caps.align_constant_size(257), 512);
        assert_eq!(caps.align_constant_size(0), 0);
    }
}

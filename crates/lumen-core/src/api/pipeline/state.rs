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

//! Fixed-function state applied with a pipeline.

use crate::api::util::{BlendMode, CullMode, DepthFunc, SampleCount};

/// Fixed-function state of a pipeline.
///
/// A plain value: devices compare it against the currently applied state and
/// only touch native state that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    /// Color blending preset.
    pub blend_mode: BlendMode,
    /// Whether the depth test runs.
    pub depth_test: bool,
    /// Whether passing fragments write depth.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_func: DepthFunc,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Rasterize polygons as lines.
    pub wireframe: bool,
    /// Multisampling level.
    pub msaa_samples: SampleCount,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Opaque,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            cull_mode: CullMode::Back,
            wireframe: false,
            msaa_samples: SampleCount::X1,
        }
    }
}

impl RenderState {
    /// State for alpha-blended geometry: blending on, depth read-only.
    pub fn transparent() -> Self {
        Self {
            blend_mode: BlendMode::AlphaBlend,
            depth_write: false,
            ..Self::default()
        }
    }

    /// State for full-screen passes: no depth, no culling.
    pub fn overlay() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            cull_mode: CullMode::None,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_from_default_only_where_intended() {
        let base = RenderState::default();
        let transparent = RenderState::transparent();
        assert_eq!(transparent.depth_func, base.depth_func);
        assert!(!transparent.depth_write);
        assert_ne!(transparent, base);
        assert_eq!(RenderState::overlay().cull_mode, CullMode::None);
    }
}

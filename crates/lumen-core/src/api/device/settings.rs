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

//! Device creation settings.

use crate::api::backend::GraphicsApi;
use crate::api::util::MatrixLayout;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`DeviceConfig::api`].
pub const ENV_GRAPHICS_API: &str = "LUMEN_GRAPHICS_API";
/// Environment variable overriding [`DeviceConfig::headless`].
pub const ENV_HEADLESS: &str = "LUMEN_HEADLESS";

/// Settings read by the device factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// The requested API. Falls back to OpenGL when unavailable.
    pub api: GraphicsApi,
    /// Run on in-memory drivers without a window or GPU.
    pub headless: bool,
    /// Back buffer width when no window provides one.
    pub width: u32,
    /// Back buffer height when no window provides one.
    pub height: u32,
    /// Synchronize presentation with the display.
    pub vsync: bool,
    /// Frames the descriptor-table backend keeps in flight (1 to 3).
    pub frames_in_flight: u32,
    /// Bytes of the per-frame constant ring of the descriptor-table backend.
    pub constant_ring_size: u64,
    /// Descriptor tables reserved per pipeline and frame.
    pub max_draws_per_pipeline: u32,
    /// Matrix majorness the headless descriptor-table driver reports.
    pub matrix_layout: MatrixLayout,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            api: GraphicsApi::platform_default(),
            headless: false,
            width: 1280,
            height: 720,
            vsync: true,
            frames_in_flight: 2,
            constant_ring_size: 1024 * 1024,
            max_draws_per_pipeline: 256,
            matrix_layout: MatrixLayout::ColumnMajor,
        }
    }
}

impl DeviceConfig {
    /// A headless configuration for `api`.
    pub fn headless(api: GraphicsApi) -> Self {
        Self {
            api,
            headless: true,
            ..Self::default()
        }
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Applies `LUMEN_GRAPHICS_API` and `LUMEN_HEADLESS` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`. Unparsable values are logged
    /// and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_GRAPHICS_API) {
            match value.parse::<GraphicsApi>() {
                Ok(api) => self.api = api,
                Err(err) => log::warn!("DeviceConfig: ignoring {ENV_GRAPHICS_API}: {err}"),
            }
        }
        if let Some(value) = lookup(ENV_HEADLESS) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.headless = true,
                "0" | "false" | "no" | "off" => self.headless = false,
                other => log::warn!("DeviceConfig: ignoring {ENV_HEADLESS}='{other}'"),
            }
        }
        self
    }

    /// `frames_in_flight` clamped to the supported range.
    pub fn frame_count(&self) -> usize {
        self.frames_in_flight.clamp(1, 3) as usize
    }
}

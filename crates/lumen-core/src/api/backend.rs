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

//! Identification of the native graphics APIs a device can run on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A native graphics API a [`Device`](crate::traits::Device) can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    /// Immediate-mode OpenGL. Available wherever a GL context exists.
    OpenGl,
    /// Descriptor-table model (root signatures, descriptor heaps, fences).
    Dx12,
    /// Reserved; not implemented.
    Vulkan,
}

impl GraphicsApi {
    /// Every API known to the factory.
    pub const ALL: [GraphicsApi; 3] = [GraphicsApi::OpenGl, GraphicsApi::Dx12, GraphicsApi::Vulkan];

    /// The API picked when the configuration does not name one.
    pub fn platform_default() -> Self {
        #[cfg(target_os = "windows")]
        {
            GraphicsApi::Dx12
        }
        #[cfg(not(target_os = "windows"))]
        {
            GraphicsApi::OpenGl
        }
    }

    /// The API every platform falls back to.
    pub const fn fallback() -> Self {
        GraphicsApi::OpenGl
    }
}

impl Default for GraphicsApi {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphicsApi::OpenGl => "OpenGL",
            GraphicsApi::Dx12 => "DX12",
            GraphicsApi::Vulkan => "Vulkan",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an unknown API name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGraphicsApi(pub String);

impl fmt::Display for UnknownGraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown graphics API '{}'", self.0)
    }
}

impl std::error::Error for UnknownGraphicsApi {}

impl FromStr for GraphicsApi {
    type Err = UnknownGraphicsApi;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opengl" | "gl" => Ok(GraphicsApi::OpenGl),
            "dx12" | "d3d12" | "directx12" => Ok(GraphicsApi::Dx12),
            "vulkan" | "vk" => Ok(GraphicsApi::Vulkan),
            _ => Err(UnknownGraphicsApi(s.to_string())),
        }
    }
}

/// Identification strings reported by a native adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Renderer / adapter name.
    pub device_name: String,
    /// Vendor string.
    pub vendor_name: String,
    /// Driver version string.
    pub driver_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("GL".parse::<GraphicsApi>(), Ok(GraphicsApi::OpenGl));
        assert_eq!(" d3d12 ".parse::<GraphicsApi>(), Ok(GraphicsApi::Dx12));
        assert_eq!("vk".parse::<GraphicsApi>(), Ok(GraphicsApi::Vulkan));
        assert!("metal".parse::<GraphicsApi>().is_err());
    }

    #[test]
    fn fallback_is_opengl() {
        assert_eq!(GraphicsApi::fallback(), GraphicsApi::OpenGl);
        assert_eq!(GraphicsApi::OpenGl.to_string(), "OpenGL");
    }
}

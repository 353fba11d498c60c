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

//! Backend selection with fallback to OpenGL.

use super::gl::{GlDevice, GlowApi};
use super::table::{TableDevice, WgpuTableDriver};
use super::vulkan::VulkanDevice;
use anyhow::{anyhow, bail, Result};
use lumen_core::{Device, DeviceConfig, DeviceError, GraphicsApi, WindowSurface};
use std::sync::Arc;

/// Creates the device a [`DeviceConfig`] asks for.
///
/// The requested API is probed by creating it. When that fails the factory
/// logs a notice and creates the fallback API instead; only a failure of the
/// fallback is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceFactory;

impl DeviceFactory {
    /// Creates a device for `config.api`, falling back to
    /// [`GraphicsApi::fallback`].
    pub fn create(
        config: &DeviceConfig,
        window: Option<Arc<dyn WindowSurface>>,
    ) -> Result<Box<dyn Device>, DeviceError> {
        Self::create_with_notice(config, window).map(|(device, _)| device)
    }

    /// Like [`create`](Self::create), also returning why the requested API
    /// was skipped when the fallback was used.
    pub fn create_with_notice(
        config: &DeviceConfig,
        window: Option<Arc<dyn WindowSurface>>,
    ) -> Result<(Box<dyn Device>, Option<DeviceError>), DeviceError> {
        let requested = config.api;
        let reason = match Self::try_create(requested, config, window.clone()) {
            Ok(device) => {
                log::info!(
                    "DeviceFactory: created {requested} device '{}'",
                    device.device_name()
                );
                return Ok((device, None));
            }
            Err(err) => err,
        };

        let fallback = GraphicsApi::fallback();
        if requested == fallback {
            log::error!("DeviceFactory: {requested} device creation failed: {reason:#}");
            return Err(DeviceError::NoUsableBackend(format!("{requested}: {reason:#}")));
        }

        let notice = DeviceError::BackendUnavailable {
            api: requested,
            reason: format!("{reason:#}"),
        };
        log::warn!("DeviceFactory: {notice}; falling back to {fallback}");

        match Self::try_create(fallback, config, window) {
            Ok(device) => {
                log::info!(
                    "DeviceFactory: created fallback {fallback} device '{}'",
                    device.device_name()
                );
                Ok((device, Some(notice)))
            }
            Err(err) => {
                log::error!("DeviceFactory: fallback {fallback} device creation failed: {err:#}");
                Err(DeviceError::NoUsableBackend(format!(
                    "{requested}: {reason:#}; {fallback}: {err:#}"
                )))
            }
        }
    }

    fn try_create(
        api: GraphicsApi,
        config: &DeviceConfig,
        window: Option<Arc<dyn WindowSurface>>,
    ) -> Result<Box<dyn Device>> {
        match api {
            GraphicsApi::OpenGl => {
                if config.headless {
                    return Ok(Box::new(GlDevice::headless(config)?));
                }
                let window = window.ok_or_else(|| anyhow!("OpenGL needs a window with a current context"))?;
                let gl = GlowApi::from_window(window.as_ref())?;
                Ok(Box::new(GlDevice::new(gl, Some(window), config)?))
            }
            GraphicsApi::Dx12 => {
                if config.headless {
                    return Ok(Box::new(TableDevice::headless(config)?));
                }
                if !cfg!(target_os = "windows") {
                    bail!("DX12 is only available on Windows");
                }
                let window = window.ok_or_else(|| anyhow!("DX12 needs a window to present to"))?;
                let driver = WgpuTableDriver::new(Some(Arc::clone(&window)), config)?;
                Ok(Box::new(TableDevice::new(driver, Some(window), config)?))
            }
            GraphicsApi::Vulkan => Ok(Box::new(VulkanDevice::probe(config, window.as_ref())?)),
        }
    }
}

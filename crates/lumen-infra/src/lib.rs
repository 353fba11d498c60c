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

//! # Lumen Infra
//!
//! Concrete backends for the `lumen-core` contracts.
//!
//! - [`graphics::gl`]: the immediate backend over OpenGL (`glow`), plus an
//!   in-memory driver for headless runs.
//! - [`graphics::table`]: the descriptor-table backend, driven through `wgpu`
//!   on DX12, plus an in-memory driver.
//! - [`graphics::vulkan`]: the reserved backend, which fails closed.
//! - [`graphics::DeviceFactory`]: picks a backend and falls back to OpenGL.
//! - [`graphics::NagaReflector`]: shader reflection on top of `naga`.

#![warn(missing_docs)]

pub mod graphics;
pub mod logging;

pub use graphics::{DeviceFactory, NagaReflector};

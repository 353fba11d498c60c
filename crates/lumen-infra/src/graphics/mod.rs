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

//! Concrete render backends and the factory that picks one.
//!
//! - [`gl`]: the immediate backend, OpenGL through `glow`.
//! - [`table`]: the descriptor-table backend, executed through `wgpu` on DX12.
//! - [`vulkan`]: a stub that fails closed.
//!
//! Each backend is generic over a narrow driver trait with a native and an
//! in-memory (headless) implementation.

pub mod factory;
pub mod gl;
pub mod reflection;
pub mod table;
pub mod vulkan;

pub use self::factory::DeviceFactory;
pub use self::reflection::NagaReflector;

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

//! Immediate-mode OpenGL backend.
//!
//! [`GlDevice`] holds the device logic and talks to OpenGL through the
//! [`GlApi`] trait. [`GlowApi`] drives a real context loaded with `glow`;
//! [`HeadlessGl`] stands in for it in tests and on machines without a GPU.

mod api;
mod conversions;
mod device;
mod glow_api;
mod headless;
mod state;

pub use self::api::{GlApi, GlAttribute, GlBlit, GlTextureSpec, GlVertexBuffer};
pub use self::conversions::{min_filter, GlFormat, GlVertexFormat, IntoGl};
pub use self::device::GlDevice;
pub use self::glow_api::GlowApi;
pub use self::headless::{GlCallCounts, HeadlessGl};

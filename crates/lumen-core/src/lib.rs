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

//! # Lumen Core
//!
//! Backend-agnostic contracts of the Lumen render hardware interface.
//!
//! This crate owns the descriptor and resource model, the pipeline object and
//! its parameter cache, the closed command set with its command lists and
//! queue, the render thread pool and the per-frame worker handshake. Concrete
//! backends live in `lumen-infra` and plug in through the [`Device`] and
//! [`ShaderReflector`] traits.

#![warn(missing_docs)]

pub mod api;
pub mod error;
pub mod threading;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use api::*;
pub use error::*;
pub use threading::*;
pub use traits::*;

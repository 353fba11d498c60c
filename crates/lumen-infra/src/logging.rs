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

//! Logger bootstrap for applications and tests.

use env_logger::{Builder, Env};
use log::LevelFilter;

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder
        .filter_module("wgpu_core", LevelFilter::Warn)
        .filter_module("wgpu_hal", LevelFilter::Warn)
        .filter_module("naga", LevelFilter::Warn);
    builder
}

/// Installs the global logger. `RUST_LOG` overrides the default `info`
/// level. Panics if a logger is already installed.
pub fn init() {
    builder().init();
}

/// Installs the global logger unless one is already installed. Returns
/// whether this call installed it.
pub fn try_init() -> bool {
    builder().is_test(cfg!(test)).try_init().is_ok()
}

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

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_void;

/// A window a device can present to.
///
/// Any windowing library can implement this. The window and display handles
/// come from `raw-window-handle`; the GL entry points are only used by the
/// immediate backend, which needs a context created by the window owner.
pub trait WindowSurface: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Physical size of the drawable area in pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Presents the GL back buffer.
    fn swap_buffers(&self) {}

    /// Resolves a GL function pointer from the window's current context.
    /// Returns null when the window has no GL context.
    fn gl_proc_address(&self, name: &str) -> *const c_void {
        let _ = name;
        std::ptr::null()
    }

    /// Whether the window owns a current GL context.
    fn has_gl_context(&self) -> bool {
        false
    }
}

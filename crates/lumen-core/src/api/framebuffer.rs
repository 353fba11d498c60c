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

//! Off-screen render targets.

use super::resource::{Bindable, BindingCategory, GpuResource, NativeHandle};
use super::texture::Texture;
use crate::error::ResourceError;
use std::sync::Arc;

/// A descriptor used to create a [`Framebuffer`].
#[derive(Debug, Clone)]
pub struct FramebufferDesc {
    /// Debug name.
    pub debug_name: String,
    /// Color attachments, in attachment-index order.
    pub color_attachments: Vec<Arc<Texture>>,
    /// Optional depth (or depth/stencil) attachment.
    pub depth_attachment: Option<Arc<Texture>>,
}

impl FramebufferDesc {
    /// A framebuffer without attachments.
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    /// Appends a color attachment.
    pub fn with_color(mut self, texture: Arc<Texture>) -> Self {
        self.color_attachments.push(texture);
        self
    }

    /// Sets the depth attachment.
    pub fn with_depth(mut self, texture: Arc<Texture>) -> Self {
        self.depth_attachment = Some(texture);
        self
    }

    /// Checks attachment formats and extents against each other.
    pub fn validate(&self, max_color_attachments: u32) -> Result<(), ResourceError> {
        let fail = |why: String| {
            Err(ResourceError::InvalidDescriptor(format!(
                "framebuffer '{}': {why}",
                self.debug_name
            )))
        };
        if self.color_attachments.len() > max_color_attachments as usize {
            return fail(format!(
                "{} color attachments exceed the device limit of {max_color_attachments}",
                self.color_attachments.len()
            ));
        }
        for color in &self.color_attachments {
            if color.format().is_depth() {
                return fail(format!("'{}' has a depth format", color.debug_name()));
            }
            if !color.desc().render_target {
                return fail(format!("'{}' was not created as a render target", color.debug_name()));
            }
        }
        if let Some(depth) = &self.depth_attachment {
            if !depth.format().is_depth() {
                return fail(format!("'{}' is not a depth format", depth.debug_name()));
            }
        }
        let mut extents = self
            .color_attachments
            .iter()
            .chain(self.depth_attachment.iter())
            .map(|t| t.extent());
        if let Some(first) = extents.next() {
            if extents.any(|e| e != first) {
                return fail("attachments have different extents".to_string());
            }
        }
        Ok(())
    }
}

/// An off-screen render target made of texture attachments.
#[derive(Debug)]
pub struct Framebuffer {
    desc: FramebufferDesc,
    native: NativeHandle,
}

impl Framebuffer {
    /// Wraps a native framebuffer created from `desc`.
    pub fn new(desc: FramebufferDesc, native: NativeHandle) -> Self {
        Self { desc, native }
    }

    /// The descriptor the framebuffer was created from.
    pub fn desc(&self) -> &FramebufferDesc {
        &self.desc
    }

    /// Extent of the attachments, if there are any.
    pub fn extent(&self) -> Option<(u32, u32)> {
        self.desc
            .color_attachments
            .first()
            .or(self.desc.depth_attachment.as_ref())
            .map(|t| t.extent())
    }
}

impl GpuResource for Framebuffer {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

impl Bindable for Framebuffer {
    fn binding_category(&self) -> BindingCategory {
        BindingCategory::Framebuffer
    }
}

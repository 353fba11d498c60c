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

//! Vertex arrays: vertex buffers plus their input layout and an optional
//! index buffer.

use super::buffer::Buffer;
use super::pipeline::VertexBufferLayout;
use super::resource::{Bindable, BindingCategory, GpuResource, NativeHandle};
use super::util::{BufferType, IndexFormat};
use crate::error::ResourceError;
use std::sync::Arc;

/// A descriptor used to create a [`VertexArray`].
#[derive(Debug, Clone)]
pub struct VertexArrayDesc {
    /// Debug name.
    pub debug_name: String,
    /// Vertex buffers with the layout of their contents, in slot order.
    pub vertex_buffers: Vec<(Arc<Buffer>, VertexBufferLayout)>,
    /// Optional index buffer.
    pub index_buffer: Option<(Arc<Buffer>, IndexFormat)>,
}

impl VertexArrayDesc {
    /// An empty vertex array, for attribute-less draws.
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            vertex_buffers: Vec::new(),
            index_buffer: None,
        }
    }

    /// Appends a vertex buffer slot.
    pub fn with_vertex_buffer(mut self, buffer: Arc<Buffer>, layout: VertexBufferLayout) -> Self {
        self.vertex_buffers.push((buffer, layout));
        self
    }

    /// Sets the index buffer.
    pub fn with_index_buffer(mut self, buffer: Arc<Buffer>, format: IndexFormat) -> Self {
        self.index_buffer = Some((buffer, format));
        self
    }

    /// Checks buffer roles.
    pub fn validate(&self) -> Result<(), ResourceError> {
        for (buffer, _) in &self.vertex_buffers {
            if buffer.desc().buffer_type != BufferType::Vertex {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "vertex array '{}': '{}' is not a vertex buffer",
                    self.debug_name,
                    buffer.debug_name()
                )));
            }
        }
        if let Some((buffer, _)) = &self.index_buffer {
            if buffer.desc().buffer_type != BufferType::Index {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "vertex array '{}': '{}' is not an index buffer",
                    self.debug_name,
                    buffer.debug_name()
                )));
            }
        }
        Ok(())
    }
}

/// Bound vertex input state.
#[derive(Debug)]
pub struct VertexArray {
    desc: VertexArrayDesc,
    native: NativeHandle,
}

impl VertexArray {
    /// Wraps a native vertex array created from `desc`.
    pub fn new(desc: VertexArrayDesc, native: NativeHandle) -> Self {
        Self { desc, native }
    }

    /// The descriptor the vertex array was created from.
    pub fn desc(&self) -> &VertexArrayDesc {
        &self.desc
    }

    /// The index buffer and its format.
    pub fn index_buffer(&self) -> Option<&(Arc<Buffer>, IndexFormat)> {
        self.desc.index_buffer.as_ref()
    }
}

impl GpuResource for VertexArray {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

impl Bindable for VertexArray {
    fn binding_category(&self) -> BindingCategory {
        BindingCategory::VertexArray
    }
}

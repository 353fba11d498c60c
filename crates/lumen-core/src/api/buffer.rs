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

//! Buffer descriptors and buffer resource objects.

use super::resource::{GpuResource, NativeHandle, StagingArea, Uploadable};
use super::util::{BufferType, BufferUsage};
use crate::error::ResourceError;

/// A descriptor used to create a [`Buffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug name, forwarded to native debug labels.
    pub debug_name: String,
    /// Role of the buffer.
    pub buffer_type: BufferType,
    /// Update-frequency hint.
    pub usage: BufferUsage,
    /// Size in bytes.
    pub size: u64,
    /// Contents uploaded at creation. Must not exceed `size`.
    pub initial_data: Option<Vec<u8>>,
}

impl BufferDesc {
    /// Describes an uninitialized buffer.
    pub fn new(debug_name: impl Into<String>, buffer_type: BufferType, size: u64) -> Self {
        Self {
            debug_name: debug_name.into(),
            buffer_type,
            usage: BufferUsage::Static,
            size,
            initial_data: None,
        }
    }

    /// Describes a buffer created from `data`; the size is the length of `data`.
    pub fn with_data(debug_name: impl Into<String>, buffer_type: BufferType, data: &[u8]) -> Self {
        Self {
            debug_name: debug_name.into(),
            buffer_type,
            usage: BufferUsage::Static,
            size: data.len() as u64,
            initial_data: Some(data.to_vec()),
        }
    }

    /// Sets the usage hint.
    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Checks the descriptor before any native call is made.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.size == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "buffer '{}' has a size of zero",
                self.debug_name
            )));
        }
        if let Some(data) = &self.initial_data {
            if data.len() as u64 > self.size {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "buffer '{}': {} bytes of initial data exceed size {}",
                    self.debug_name,
                    data.len(),
                    self.size
                )));
            }
        }
        Ok(())
    }
}

/// A GPU buffer.
#[derive(Debug)]
pub struct Buffer {
    desc: BufferDesc,
    native: NativeHandle,
    staging: StagingArea,
}

impl Buffer {
    /// Wraps a native buffer created from `desc`.
    pub fn new(desc: BufferDesc, native: NativeHandle) -> Self {
        Self {
            desc,
            native,
            staging: StagingArea::default(),
        }
    }

    /// The descriptor the buffer was created from.
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.desc.size
    }
}

impl GpuResource for Buffer {
    fn debug_name(&self) -> &str {
        &self.desc.debug_name
    }

    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

impl Uploadable for Buffer {
    fn capacity(&self) -> u64 {
        self.desc.size
    }

    fn staging(&self) -> &StagingArea {
        &self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_data_sizes_from_payload() {
        let desc = BufferDesc::with_data("quad", BufferType::Vertex, &[0u8; 48]);
        assert_eq!(desc.size, 48);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn zero_size_is_rejected() {
        let desc = BufferDesc::new("empty", BufferType::Uniform, 0);
        assert!(matches!(desc.validate(), Err(ResourceError::InvalidDescriptor(_))));
    }

    #[test]
    fn oversized_initial_data_is_rejected() {
        let mut desc = BufferDesc::new("small", BufferType::Index, 4);
        desc.initial_data = Some(vec![0; 8]);
        assert!(desc.validate().is_err());
    }
}

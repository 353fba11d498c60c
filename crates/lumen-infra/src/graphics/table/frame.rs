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

//! Per-frame resources of the descriptor-table backend.

use lumen_core::{align_up, ReleasedResource};

/// Default number of frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// A linear allocator over one constant buffer, reset once the frame that
/// used it has retired.
#[derive(Debug)]
pub struct ConstantRing {
    buffer: u64,
    size: u64,
    alignment: u64,
    head: u64,
}

impl ConstantRing {
    /// A ring over `buffer`, `size` bytes long.
    pub fn new(buffer: u64, size: u64, alignment: u64) -> Self {
        Self {
            buffer,
            size,
            alignment: alignment.max(1),
            head: 0,
        }
    }

    /// The backing buffer object.
    pub fn buffer(&self) -> u64 {
        self.buffer
    }

    /// Reserves `len` bytes, returning the aligned offset and the aligned
    /// view size, or `None` when the ring is full.
    pub fn allocate(&mut self, len: u64) -> Option<(u64, u64)> {
        let view = align_up(len.max(1), self.alignment);
        let offset = self.head;
        if offset + view > self.size {
            return None;
        }
        self.head = offset + view;
        Some((offset, view))
    }

    /// Bytes handed out since the last reset.
    pub fn used(&self) -> u64 {
        self.head
    }

    /// Makes the whole ring available again.
    pub fn reset(&mut self) {
        self.head = 0;
    }
}

/// Everything a frame slot owns until its fence is reached.
#[derive(Debug)]
pub struct FrameResources {
    /// Fence value signaled by the last submission from this slot.
    pub fence_value: u64,
    /// Constant data written while recording this slot.
    pub ring: ConstantRing,
    /// Objects released while this slot was recording.
    pub released: Vec<ReleasedResource>,
}

impl FrameResources {
    /// A slot whose ring lives in `ring_buffer`.
    pub fn new(ring_buffer: u64, ring_size: u64, alignment: u64) -> Self {
        Self {
            fence_value: 0,
            ring: ConstantRing::new(ring_buffer, ring_size, alignment),
            released: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_hands_out_aligned_views() {
        let mut ring = ConstantRing::new(3, 1024, 256);
        assert_eq!(ring.allocate(80), Some((0, 256)));
        assert_eq!(ring.allocate(257), Some((256, 512)));
        assert_eq!(ring.used(), 768);
        assert_eq!(ring.allocate(300), None);
        assert_eq!(ring.allocate(256), Some((768, 256)));
        ring.reset();
        assert_eq!(ring.allocate(1), Some((0, 256)));
    }
}

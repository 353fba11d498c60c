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

//! Descriptor heap regions.
//!
//! Each pipeline owns one heap split into one region per frame slot. Tables
//! are handed out linearly within the recording slot's region and the
//! region is rewound when the slot comes around again, after its fence.

/// Table allocator over a heap of `frames * tables_per_frame` tables.
#[derive(Debug)]
pub struct HeapRegions {
    tables_per_frame: u32,
    cursors: Vec<u32>,
}

impl HeapRegions {
    /// Regions for `frames` slots of `tables_per_frame` tables each.
    pub fn new(frames: usize, tables_per_frame: u32) -> Self {
        Self {
            tables_per_frame: tables_per_frame.max(1),
            cursors: vec![0; frames.max(1)],
        }
    }

    /// Total tables the heap must hold.
    pub fn capacity(&self) -> u32 {
        self.tables_per_frame * self.cursors.len() as u32
    }

    /// Next free table of `frame`'s region, or `None` once the region is
    /// exhausted.
    pub fn next(&mut self, frame: usize) -> Option<u32> {
        let cursor = self.cursors.get_mut(frame)?;
        if *cursor >= self.tables_per_frame {
            return None;
        }
        let table = frame as u32 * self.tables_per_frame + *cursor;
        *cursor += 1;
        Some(table)
    }

    /// Tables used from `frame`'s region.
    pub fn used(&self, frame: usize) -> u32 {
        self.cursors.get(frame).copied().unwrap_or(0)
    }

    /// Rewinds `frame`'s region.
    pub fn rewind(&mut self, frame: usize) {
        if let Some(cursor) = self.cursors.get_mut(frame) {
            *cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_do_not_overlap() {
        let mut regions = HeapRegions::new(2, 3);
        assert_eq!(regions.capacity(), 6);
        assert_eq!(regions.next(0), Some(0));
        assert_eq!(regions.next(1), Some(3));
        assert_eq!(regions.next(0), Some(1));
        assert_eq!(regions.next(0), Some(2));
        assert_eq!(regions.next(0), None);
        assert_eq!(regions.used(0), 3);
        regions.rewind(0);
        assert_eq!(regions.next(0), Some(0));
        assert_eq!(regions.next(5), None);
    }
}

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

//! Descriptor-table backend.
//!
//! [`TableDevice`] turns the immediate [`Device`](lumen_core::Device)
//! contract into root signatures, pipeline state objects, descriptor tables
//! and fenced frames. It drives any [`TableApi`]: [`WgpuTableDriver`]
//! executes on DX12 through `wgpu`, [`HeadlessTable`] bookkeeps in memory
//! and validates like a debug layer would.

mod api;
mod barrier;
mod conversions;
mod device;
mod frame;
mod headless;
mod heap;
mod wgpu_driver;

pub use self::api::{
    BufferHeap, DescriptorResource, DescriptorWrite, TableApi, TableCopy, TableLimits, TablePass, TablePipelineDesc,
    TableStage, TargetFormats, BACK_BUFFER,
};
pub use self::barrier::{StateTracker, Transition};
pub use self::conversions::{buffer_heap, from_wgpu_format, IntoWgpu};
pub use self::device::TableDevice;
pub use self::frame::{ConstantRing, FrameResources, FRAMES_IN_FLIGHT};
pub use self::headless::{HeadlessTable, TableCallCounts};
pub use self::heap::HeapRegions;
pub use self::wgpu_driver::WgpuTableDriver;

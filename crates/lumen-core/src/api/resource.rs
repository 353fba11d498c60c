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

//! Shared identity, lifetime and upload plumbing of GPU resource objects.
//!
//! Resource objects are handed out as `Arc`s. Each one owns a
//! [`NativeHandle`]; when the last reference goes away the handle posts a
//! [`ReleasedResource`] to the device that created it, and the device
//! destroys the native object at its next frame boundary.

use super::backend::GraphicsApi;
use super::util::ResourceKind;
use crate::error::ResourceError;
use crate::threading::lock;
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::Mutex;

/// A native object that must be destroyed by its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleasedResource {
    /// Kind of the dropped resource.
    pub kind: ResourceKind,
    /// Backend-specific native name.
    pub raw: u64,
    /// Bytes the resource accounted for in the device statistics.
    pub size_bytes: u64,
}

/// Backend-specific handle owned by a resource object.
pub struct NativeHandle {
    api: GraphicsApi,
    kind: ResourceKind,
    raw: u64,
    size_bytes: u64,
    release: Option<Sender<ReleasedResource>>,
}

impl NativeHandle {
    /// Creates a handle that notifies `release` when dropped.
    pub fn new(
        api: GraphicsApi,
        kind: ResourceKind,
        raw: u64,
        size_bytes: u64,
        release: Sender<ReleasedResource>,
    ) -> Self {
        Self {
            api,
            kind,
            raw,
            size_bytes,
            release: Some(release),
        }
    }

    /// Creates a handle whose native object is not owned (swapchain images,
    /// objects created by a host application).
    pub fn detached(api: GraphicsApi, kind: ResourceKind, raw: u64) -> Self {
        Self {
            api,
            kind,
            raw,
            size_bytes: 0,
            release: None,
        }
    }

    /// The API the native object belongs to.
    pub fn api(&self) -> GraphicsApi {
        self.api
    }

    /// The resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Backend-specific native name.
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Bytes accounted for this object.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("api", &self.api)
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .field("owned", &self.release.is_some())
            .finish()
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            // The receiver is gone once the device has shut down, in which
            // case the native object was destroyed with it.
            let _ = release.send(ReleasedResource {
                kind: self.kind,
                raw: self.raw,
                size_bytes: self.size_bytes,
            });
        }
    }
}

/// Channel collecting native objects whose last owner has gone away.
#[derive(Debug)]
pub struct ReleaseQueue {
    tx: Sender<ReleasedResource>,
    rx: Receiver<ReleasedResource>,
}

impl ReleaseQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// A sender to embed into new [`NativeHandle`]s.
    pub fn sender(&self) -> Sender<ReleasedResource> {
        self.tx.clone()
    }

    /// Takes every release posted so far.
    pub fn drain(&self) -> Vec<ReleasedResource> {
        self.rx.try_iter().collect()
    }
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity shared by every resource object.
pub trait GpuResource: Send + Sync {
    /// Debug name given at creation.
    fn debug_name(&self) -> &str;

    /// The native handle.
    fn native(&self) -> &NativeHandle;

    /// The resource kind.
    fn kind(&self) -> ResourceKind {
        self.native().kind()
    }

    /// Backend-specific native name.
    fn raw(&self) -> u64 {
        self.native().raw()
    }
}

/// Binding point a [`Bindable`] resource occupies while bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingCategory {
    /// The current pipeline.
    Pipeline,
    /// The current vertex input.
    VertexArray,
    /// The current render target.
    Framebuffer,
    /// A texture unit.
    Texture,
}

/// Resources a device can bind, tracked per [`BindingCategory`].
pub trait Bindable: GpuResource {
    /// Where the resource is bound.
    fn binding_category(&self) -> BindingCategory;

    /// Key identifying the binding in a device's state cache.
    fn binding_key(&self) -> (BindingCategory, u64) {
        (self.binding_category(), self.raw())
    }
}

/// A byte range waiting to be copied to the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Destination offset in bytes.
    pub offset: u64,
    /// Bytes to write.
    pub data: Vec<u8>,
}

/// CPU-side list of writes staged from any thread.
#[derive(Debug, Default)]
pub struct StagingArea {
    pending: Mutex<Vec<PendingWrite>>,
}

impl StagingArea {
    fn push(&self, write: PendingWrite) {
        lock(&self.pending).push(write);
    }

    fn take(&self) -> Vec<PendingWrite> {
        std::mem::take(&mut *lock(&self.pending))
    }

    fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }
}

/// Resources whose contents can be updated after creation.
///
/// Writes are staged on the CPU (from any thread) and copied by the owning
/// device when the resource is next bound or when
/// [`Device::flush_uploads`](crate::traits::Device::flush_uploads) runs.
pub trait Uploadable: GpuResource {
    /// Writable size in bytes.
    fn capacity(&self) -> u64;

    /// The staging list of this resource.
    fn staging(&self) -> &StagingArea;

    /// Stages `data` at `offset`.
    fn stage_write(&self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let len = data.len() as u64;
        let end = offset.checked_add(len);
        if end.is_none_or(|end| end > self.capacity()) {
            return Err(ResourceError::OutOfBounds {
                offset,
                len,
                size: self.capacity(),
            });
        }
        self.staging().push(PendingWrite {
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Removes and returns every staged write in staging order.
    fn take_pending(&self) -> Vec<PendingWrite> {
        self.staging().take()
    }

    /// Whether writes are waiting to be copied.
    fn has_pending(&self) -> bool {
        !self.staging().is_empty()
    }
}

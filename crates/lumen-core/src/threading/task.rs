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

//! Units of work run by the [`RenderThreadPool`](super::RenderThreadPool).

use crate::api::command::{CommandBuffer, CommandQueue};
use crate::api::resource::Uploadable;
use crate::error::RecordingError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A backend object private to one worker thread (a shared GL context, a
/// per-thread command allocator).
pub trait BackendContext: Send {
    /// Debug label.
    fn label(&self) -> &str;

    /// Returns the context as `Any` for downcasting by backend code.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Produces the [`BackendContext`] of worker `index`, or `None` when the
/// backend has nothing per-thread.
pub type BackendContextFactory = Arc<dyn Fn(usize) -> Option<Box<dyn BackendContext>> + Send + Sync>;

/// State owned by one worker thread and lent to each task it runs.
pub struct WorkerContext {
    index: usize,
    backend: Option<Box<dyn BackendContext>>,
    tasks_run: u64,
}

impl WorkerContext {
    /// Creates the context of worker `index`.
    pub fn new(index: usize, backend: Option<Box<dyn BackendContext>>) -> Self {
        Self {
            index,
            backend,
            tasks_run: 0,
        }
    }

    /// Index of the worker within its pool.
    pub fn worker_index(&self) -> usize {
        self.index
    }

    /// The worker's backend context, if any.
    pub fn backend(&mut self) -> Option<&mut (dyn BackendContext + 'static)> {
        self.backend.as_deref_mut()
    }

    /// Tasks this worker finished before the current one.
    pub fn tasks_run(&self) -> u64 {
        self.tasks_run
    }

    pub(crate) fn task_finished(&mut self) {
        self.tasks_run += 1;
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("index", &self.index)
            .field("backend", &self.backend.as_ref().map(|b| b.label().to_string()))
            .field("tasks_run", &self.tasks_run)
            .finish()
    }
}

/// A prioritized unit of work.
pub trait RenderTask: Send {
    /// Debug name.
    fn name(&self) -> &str;

    /// Higher runs first; equal priorities run in submission order.
    fn priority(&self) -> i32 {
        0
    }

    /// Runs the task on a worker thread.
    fn run(self: Box<Self>, ctx: &mut WorkerContext);
}

type RecordFn = Box<dyn FnOnce(&CommandBuffer, &mut WorkerContext) -> Result<(), RecordingError> + Send>;

/// Records a command buffer on a worker and optionally submits it.
pub struct CommandBufferTask {
    name: String,
    priority: i32,
    buffer: Arc<CommandBuffer>,
    record: RecordFn,
    queue: Option<Arc<CommandQueue>>,
}

impl CommandBufferTask {
    /// A task that records into `buffer` with `record`. The task calls
    /// `begin` and `end` around it.
    pub fn new<F>(buffer: Arc<CommandBuffer>, record: F) -> Self
    where
        F: FnOnce(&CommandBuffer, &mut WorkerContext) -> Result<(), RecordingError> + Send + 'static,
    {
        Self {
            name: format!("record '{}'", buffer.name()),
            priority: 0,
            buffer,
            record: Box::new(record),
            queue: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Submits the buffer to `queue` once recorded.
    pub fn submit_to(mut self, queue: Arc<CommandQueue>) -> Self {
        self.queue = Some(queue);
        self
    }
}

impl RenderTask for CommandBufferTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn run(self: Box<Self>, ctx: &mut WorkerContext) {
        let CommandBufferTask {
            name,
            buffer,
            record,
            queue,
            ..
        } = *self;

        if buffer.begin().is_err() {
            return;
        }
        if let Err(err) = record(&buffer, ctx) {
            log::warn!("RenderThreadPool: task {name} failed to record: {err}");
            let _ = buffer.reset();
            return;
        }
        if buffer.end().is_err() {
            return;
        }
        if let Some(queue) = queue {
            // Rejections are logged by the queue.
            let _ = queue.submit(buffer);
        }
    }
}

/// Stages bytes into a buffer or texture from a worker.
pub struct ResourceUpdateTask {
    name: String,
    priority: i32,
    target: Arc<dyn Uploadable>,
    offset: u64,
    data: Vec<u8>,
}

impl ResourceUpdateTask {
    /// Writes `data` at `offset` of `target`.
    pub fn new(target: Arc<dyn Uploadable>, offset: u64, data: Vec<u8>) -> Self {
        Self {
            name: format!("update '{}'", target.debug_name()),
            priority: 0,
            target,
            offset,
            data,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl RenderTask for ResourceUpdateTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn run(self: Box<Self>, _ctx: &mut WorkerContext) {
        if let Err(err) = self.target.stage_write(self.offset, &self.data) {
            log::error!("RenderThreadPool: task {} failed: {err}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::command::DrawParams;
    use crate::testing::RecordingDevice;

    #[test]
    fn command_buffer_task_records_and_submits() {
        let queue = Arc::new(CommandQueue::new());
        let buffer = queue.create_command_buffer("worker");
        let task = CommandBufferTask::new(Arc::clone(&buffer), |cb, _| cb.draw(DrawParams::new(3)))
            .submit_to(Arc::clone(&queue));
        Box::new(task).run(&mut WorkerContext::new(0, None));
        assert!(!buffer.is_recording());
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn failed_recording_leaves_an_empty_buffer() {
        let buffer = Arc::new(CommandBuffer::new("broken"));
        let task = CommandBufferTask::new(Arc::clone(&buffer), |cb, _| {
            cb.draw(DrawParams::new(3))?;
            cb.end()?;
            cb.draw(DrawParams::new(3))
        });
        Box::new(task).run(&mut WorkerContext::new(0, None));
        assert!(buffer.is_empty());
    }

    struct Scratch(u32);

    impl BackendContext for Scratch {
        fn label(&self) -> &str {
            "scratch"
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn backend_context_downcasts_to_its_type() {
        let mut ctx = WorkerContext::new(1, Some(Box::new(Scratch(0))));
        let scratch = ctx
            .backend()
            .and_then(|b| b.as_any_mut().downcast_mut::<Scratch>())
            .unwrap();
        scratch.0 += 1;
        assert_eq!(ctx.backend().unwrap().label(), "scratch");
        assert!(WorkerContext::new(0, None).backend().is_none());
    }

    #[test]
    fn resource_update_task_stages_bytes() {
        let mut device = RecordingDevice::default();
        let buffer = device.buffer("vbo", 16);
        let task = ResourceUpdateTask::new(buffer.clone(), 4, vec![9; 4]);
        Box::new(task).run(&mut WorkerContext::new(0, None));
        let writes = buffer.take_pending();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].offset, 4);
    }
}

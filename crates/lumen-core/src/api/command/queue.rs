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

//! Submission queue for finished command buffers.

use super::CommandBuffer;
use crate::error::QueueError;
use crate::threading::lock;
use crate::traits::Device;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// Collects recorded command buffers from any thread and executes them on
/// the thread that owns the device.
///
/// Execution is a serial drain on the calling thread: buffers run one after
/// the other in submission order.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<VecDeque<Arc<CommandBuffer>>>,
    executing: Mutex<bool>,
    idle: Condvar,
}

/// Ends a drain when dropped, so a panicking device does not leave the
/// queue marked as executing.
struct DrainGuard<'a>(&'a CommandQueue);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.0.executing) = false;
        self.0.idle.notify_all();
    }
}

impl CommandQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a command buffer meant to be submitted here.
    pub fn create_command_buffer(&self, name: impl Into<String>) -> Arc<CommandBuffer> {
        Arc::new(CommandBuffer::new(name))
    }

    /// Enqueues a recorded buffer.
    pub fn submit(&self, buffer: Arc<CommandBuffer>) -> Result<(), QueueError> {
        if buffer.is_recording() {
            let err = QueueError::StillRecording(buffer.name().to_string());
            log::warn!("CommandQueue: {err}");
            return Err(err);
        }
        if buffer.is_empty() {
            let err = QueueError::EmptyBuffer(buffer.name().to_string());
            log::warn!("CommandQueue: {err}");
            return Err(err);
        }
        lock(&self.pending).push_back(buffer);
        Ok(())
    }

    /// Number of buffers waiting for `execute_all`.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether a drain is in progress.
    pub fn is_executing(&self) -> bool {
        *lock(&self.executing)
    }

    /// Executes every buffer submitted so far, in submission order, and
    /// returns how many ran. Buffers submitted during the drain wait for the
    /// next call. Returns `0` immediately if another drain is in flight.
    pub fn execute_all(&self, device: &mut dyn Device) -> usize {
        {
            let mut executing = lock(&self.executing);
            if *executing {
                log::debug!("CommandQueue: execute_all while already executing; ignored");
                return 0;
            }
            *executing = true;
        }
        let _drain = DrainGuard(self);

        let batch: Vec<Arc<CommandBuffer>> = lock(&self.pending).drain(..).collect();
        let mut executed = 0;
        for buffer in &batch {
            match buffer.execute(device) {
                Ok(_) => executed += 1,
                Err(err) => log::warn!("CommandQueue: skipped buffer: {err}"),
            }
        }
        executed
    }

    /// Blocks until no drain is in progress.
    pub fn wait(&self) {
        let mut executing = lock(&self.executing);
        while *executing {
            executing = self.idle.wait(executing).unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::command::{ClearParams, CommandBufferState, DrawParams};
    use crate::testing::{Call, RecordingDevice};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn recorded(queue: &CommandQueue, name: &str, vertices: u32) -> Arc<CommandBuffer> {
        let cb = queue.create_command_buffer(name);
        cb.begin().unwrap();
        cb.draw(DrawParams::new(vertices)).unwrap();
        cb.end().unwrap();
        cb
    }

    #[test]
    fn empty_and_open_buffers_are_rejected() {
        let queue = CommandQueue::new();
        let empty = queue.create_command_buffer("empty");
        assert_eq!(queue.submit(empty), Err(QueueError::EmptyBuffer("empty".into())));

        let open = queue.create_command_buffer("open");
        open.begin().unwrap();
        open.clear(ClearParams::default()).unwrap();
        assert_eq!(queue.submit(open), Err(QueueError::StillRecording("open".into())));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn drain_runs_in_submission_order_once() {
        let queue = CommandQueue::new();
        queue.submit(recorded(&queue, "a", 1)).unwrap();
        queue.submit(recorded(&queue, "b", 2)).unwrap();
        queue.submit(recorded(&queue, "c", 3)).unwrap();

        let mut device = RecordingDevice::default();
        assert_eq!(queue.execute_all(&mut device), 3);
        assert_eq!(device.calls, vec![Call::Draw(1), Call::Draw(2), Call::Draw(3)]);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.execute_all(&mut device), 0);
    }

    #[test]
    fn concurrent_drain_returns_immediately_and_wait_blocks() {
        let queue = Arc::new(CommandQueue::new());
        queue.submit(recorded(&queue, "slow", 3)).unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let drainer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut device = RecordingDevice::default();
                device.on_draw = Some(Box::new(move || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                }));
                queue.execute_all(&mut device)
            })
        };

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(queue.is_executing());
        let mut other = RecordingDevice::default();
        assert_eq!(queue.execute_all(&mut other), 0);
        assert!(other.calls.is_empty());

        release_tx.send(()).unwrap();
        queue.wait();
        assert!(!queue.is_executing());
        assert_eq!(drainer.join().unwrap(), 1);
    }

    #[test]
    fn a_panicking_device_ends_the_drain() {
        let queue = CommandQueue::new();
        let buffer = recorded(&queue, "doomed", 3);
        queue.submit(Arc::clone(&buffer)).unwrap();

        let mut device = RecordingDevice::default();
        device.on_draw = Some(Box::new(|| panic!("device lost")));
        let result = panic::catch_unwind(AssertUnwindSafe(|| queue.execute_all(&mut device)));
        assert!(result.is_err());

        assert!(!queue.is_executing());
        queue.wait();
        assert_eq!(buffer.state(), CommandBufferState::Idle);
        queue.submit(buffer).unwrap();
        assert_eq!(queue.execute_all(&mut RecordingDevice::default()), 1);
    }
}

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

//! Per-frame worker thread synchronized with the thread owning the device.

use super::lock;
use crate::error::PoolError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct HandshakeState {
    frame_ready: bool,
    frame_done: bool,
    shutdown: bool,
    exited: bool,
    frames_completed: u64,
}

#[derive(Debug, Default)]
struct Handshake {
    state: Mutex<HandshakeState>,
    ready: Condvar,
    done: Condvar,
}

/// A dedicated thread running one job per frame.
///
/// The owning thread calls [`signal_frame_ready`](Self::signal_frame_ready),
/// does its own work, then blocks in
/// [`wait_for_worker_complete`](Self::wait_for_worker_complete). The job
/// receives the index of the frame it runs for.
#[derive(Debug)]
pub struct RenderWorker {
    name: String,
    shared: Arc<Handshake>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawns the worker thread.
    pub fn spawn<F>(name: impl Into<String>, mut job: F) -> Result<Self, PoolError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Handshake::default());
        let thread_shared = Arc::clone(&shared);
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let shared = thread_shared;
                loop {
                    let frame = {
                        let mut state = lock(&shared.state);
                        while !state.frame_ready && !state.shutdown {
                            state = shared.ready.wait(state).unwrap_or_else(|e| e.into_inner());
                        }
                        if state.shutdown {
                            break;
                        }
                        state.frame_ready = false;
                        state.frames_completed
                    };

                    if panic::catch_unwind(AssertUnwindSafe(|| job(frame))).is_err() {
                        log::error!("RenderWorker '{thread_name}': job panicked on frame {frame}");
                    }

                    let mut state = lock(&shared.state);
                    state.frame_done = true;
                    state.frames_completed += 1;
                    shared.done.notify_all();
                }

                lock(&shared.state).exited = true;
                shared.done.notify_all();
                log::debug!("RenderWorker '{thread_name}': stopped");
            })
            .map_err(|e| PoolError::SpawnFailed(e.to_string()))?;

        Ok(Self {
            name,
            shared,
            handle: Some(handle),
        })
    }

    /// The thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lets the worker run its job for the next frame.
    pub fn signal_frame_ready(&self) {
        let mut state = lock(&self.shared.state);
        if state.shutdown {
            log::warn!("RenderWorker '{}': frame signalled after shutdown", self.name);
            return;
        }
        state.frame_ready = true;
        state.frame_done = false;
        self.shared.ready.notify_one();
    }

    /// Blocks until the job of the signalled frame has finished. Returns
    /// immediately once the worker has exited.
    pub fn wait_for_worker_complete(&self) {
        let mut state = lock(&self.shared.state);
        while !state.frame_done && !state.exited {
            state = self.shared.done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.frame_done = false;
    }

    /// Like [`wait_for_worker_complete`](Self::wait_for_worker_complete) with
    /// a deadline. Returns `false` on timeout.
    pub fn wait_for_worker_complete_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.shared.state);
        while !state.frame_done && !state.exited {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .shared
                .done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
        }
        state.frame_done = false;
        true
    }

    /// Frames whose job has run.
    pub fn frames_completed(&self) -> u64 {
        lock(&self.shared.state).frames_completed
    }

    /// Wakes the worker, lets it leave its loop and joins it.
    pub fn shutdown(&mut self) {
        {
            let mut state = lock(&self.shared.state);
            state.shutdown = true;
            self.shared.ready.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn one_job_per_signalled_frame() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        let mut worker = RenderWorker::spawn("frame-worker", move |frame| {
            assert_eq!(seen.load(Ordering::SeqCst), frame);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for expected in 1..=5 {
            worker.signal_frame_ready();
            worker.wait_for_worker_complete();
            assert_eq!(counter.load(Ordering::SeqCst), expected);
        }
        assert_eq!(worker.frames_completed(), 5);
        worker.shutdown();
    }

    #[test]
    fn wait_times_out_without_a_signal() {
        let worker = RenderWorker::spawn("idle-worker", |_| {}).unwrap();
        assert!(!worker.wait_for_worker_complete_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn shutdown_releases_waiters() {
        let mut worker = RenderWorker::spawn("stopping-worker", |_| {}).unwrap();
        worker.shutdown();
        worker.wait_for_worker_complete();
        worker.signal_frame_ready();
        assert_eq!(worker.frames_completed(), 0);
    }
}

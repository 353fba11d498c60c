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

//! Prioritized render task pool.
//!
//! Tasks enter through a bounded channel and are ordered by a dispatcher
//! thread in a binary heap keyed by `(priority, submission order)`. The
//! dispatcher only pops a task when a worker is ready to receive it on a
//! rendezvous channel, so a late high-priority task still overtakes earlier
//! low-priority ones that have not started.

use super::task::{BackendContextFactory, RenderTask, WorkerContext};
use super::{lock, PoolConfig};
use crate::error::PoolError;
use crossbeam_channel::{Receiver, Select, Sender};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

struct Queued {
    priority: i32,
    seq: u64,
    task: Box<dyn RenderTask>,
}

impl Queued {
    fn key(&self) -> (i32, Reverse<u64>) {
        (self.priority, Reverse(self.seq))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    unfinished: Mutex<usize>,
    idle: Condvar,
}

impl Counters {
    fn task_done(&self) {
        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
        let mut unfinished = lock(&self.unfinished);
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.idle.notify_all();
        }
    }

    fn task_dropped(&self) {
        let mut unfinished = lock(&self.unfinished);
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.idle.notify_all();
        }
    }
}

/// A fixed set of worker threads running [`RenderTask`]s by priority.
pub struct RenderThreadPool {
    intake: Mutex<Option<Sender<Queued>>>,
    next_seq: AtomicUsize,
    counters: Arc<Counters>,
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderThreadPool {
    /// Starts a pool without per-worker backend contexts.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_backend_factory(config, None)
    }

    /// Starts a pool whose workers each ask `factory` for a private
    /// backend context.
    pub fn with_backend_factory(
        config: PoolConfig,
        factory: Option<BackendContextFactory>,
    ) -> Result<Self, PoolError> {
        let worker_count = config.worker_count.max(1);
        let (intake_tx, intake_rx) = crossbeam_channel::bounded::<Queued>(config.queue_capacity.max(1));
        let (work_tx, work_rx) = crossbeam_channel::bounded::<Box<dyn RenderTask>>(0);
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let work_rx = work_rx.clone();
            let counters = Arc::clone(&counters);
            let factory = factory.clone();
            let handle = thread::Builder::new()
                .name(format!("lumen-render-{index}"))
                .spawn(move || worker_loop(index, work_rx, counters, factory))
                .map_err(|e| PoolError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }
        drop(work_rx);

        let dispatcher = {
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("lumen-render-dispatch".to_string())
                .spawn(move || dispatch_loop(intake_rx, work_tx, counters))
                .map_err(|e| PoolError::SpawnFailed(e.to_string()))?
        };

        log::info!("RenderThreadPool: started {worker_count} workers");
        Ok(Self {
            intake: Mutex::new(Some(intake_tx)),
            next_seq: AtomicUsize::new(0),
            counters,
            dispatcher: Some(dispatcher),
            workers,
        })
    }

    /// Queues a task. Blocks while the submission channel is full.
    pub fn submit(&self, task: impl RenderTask + 'static) -> Result<(), PoolError> {
        self.submit_boxed(Box::new(task))
    }

    /// Queues an already boxed task.
    pub fn submit_boxed(&self, task: Box<dyn RenderTask>) -> Result<(), PoolError> {
        let sender = lock(&self.intake).clone().ok_or(PoolError::ShutDown)?;
        let queued = Queued {
            priority: task.priority(),
            seq: self.next_seq.fetch_add(1, AtomicOrdering::SeqCst) as u64,
            task,
        };
        *lock(&self.counters.unfinished) += 1;
        if sender.send(queued).is_err() {
            self.counters.task_dropped();
            return Err(PoolError::ShutDown);
        }
        Ok(())
    }

    /// Tasks waiting in the priority queue.
    pub fn queued_len(&self) -> usize {
        self.counters.queued.load(AtomicOrdering::SeqCst)
    }

    /// Tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(AtomicOrdering::SeqCst)
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Blocks until every submitted task has finished.
    pub fn wait_idle(&self) {
        let mut unfinished = lock(&self.counters.unfinished);
        while *unfinished > 0 {
            unfinished = self
                .counters
                .idle
                .wait(unfinished)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Stops accepting tasks, runs those already queued and joins every
    /// thread.
    pub fn shutdown(&mut self) {
        let Some(intake) = lock(&self.intake).take() else {
            return;
        };
        drop(intake);
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::info!("RenderThreadPool: shut down");
    }
}

impl Drop for RenderThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_loop(intake: Receiver<Queued>, work: Sender<Box<dyn RenderTask>>, counters: Arc<Counters>) {
    let mut heap: BinaryHeap<Queued> = BinaryHeap::new();
    let mut intake_open = true;

    let enqueue = |heap: &mut BinaryHeap<Queued>, queued: Queued| {
        heap.push(queued);
        counters.queued.fetch_add(1, AtomicOrdering::SeqCst);
    };

    loop {
        if heap.is_empty() {
            if !intake_open {
                break;
            }
            match intake.recv() {
                Ok(queued) => enqueue(&mut heap, queued),
                Err(_) => intake_open = false,
            }
            continue;
        }

        while let Ok(queued) = intake.try_recv() {
            enqueue(&mut heap, queued);
        }

        let mut select = Select::new();
        let intake_index = if intake_open { Some(select.recv(&intake)) } else { None };
        let work_index = select.send(&work);
        let operation = select.select();

        if Some(operation.index()) == intake_index {
            match operation.recv(&intake) {
                Ok(queued) => enqueue(&mut heap, queued),
                Err(_) => intake_open = false,
            }
        } else if operation.index() == work_index {
            let Some(next) = heap.pop() else {
                continue;
            };
            counters.queued.fetch_sub(1, AtomicOrdering::SeqCst);
            counters.in_flight.fetch_add(1, AtomicOrdering::SeqCst);
            if operation.send(&work, next.task).is_err() {
                counters.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
                counters.task_dropped();
                break;
            }
        }
    }

    // Workers exit once the rendezvous channel closes.
    for leftover in heap.drain() {
        log::warn!("RenderThreadPool: dropping task {} at shutdown", leftover.task.name());
        counters.queued.fetch_sub(1, AtomicOrdering::SeqCst);
        counters.task_dropped();
    }
}

fn worker_loop(
    index: usize,
    work: Receiver<Box<dyn RenderTask>>,
    counters: Arc<Counters>,
    factory: Option<BackendContextFactory>,
) {
    let backend = factory.and_then(|make| make(index));
    let mut ctx = WorkerContext::new(index, backend);
    log::debug!("RenderThreadPool: worker {index} started");

    while let Ok(task) = work.recv() {
        let name = task.name().to_string();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(&mut ctx)));
        if outcome.is_err() {
            log::error!("RenderThreadPool: task {name} panicked on worker {index}");
        }
        ctx.task_finished();
        counters.task_done();
    }
    log::debug!("RenderThreadPool: worker {index} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threading::task::BackendContext;
    use std::any::Any;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    struct FnTask<F> {
        name: String,
        priority: i32,
        body: F,
    }

    impl<F: FnOnce(&mut WorkerContext) + Send> RenderTask for FnTask<F> {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn run(self: Box<Self>, ctx: &mut WorkerContext) {
            (self.body)(ctx)
        }
    }

    fn task<F: FnOnce(&mut WorkerContext) + Send>(name: &str, priority: i32, body: F) -> FnTask<F> {
        FnTask {
            name: name.to_string(),
            priority,
            body,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn higher_priority_runs_first_and_ties_keep_submission_order() {
        let mut pool = RenderThreadPool::new(PoolConfig::with_workers(1)).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let order = Arc::new(Mutex::new(Vec::new()));

        pool.submit(task("blocker", 100, move |_| {
            release_rx.recv().unwrap();
        }))
        .unwrap();
        wait_until(|| pool.in_flight() == 1);

        for (name, priority) in [("low", 1), ("high", 10), ("mid-a", 5), ("mid-b", 5)] {
            let order = Arc::clone(&order);
            pool.submit(task(name, priority, move |_| order.lock().unwrap().push(name)))
                .unwrap();
        }
        wait_until(|| pool.queued_len() == 4);

        release_tx.send(()).unwrap();
        pool.wait_idle();
        assert_eq!(*order.lock().unwrap(), vec!["high", "mid-a", "mid-b", "low"]);
        pool.shutdown();
    }

    #[test]
    fn wait_idle_covers_every_task() {
        let pool = RenderThreadPool::new(PoolConfig::with_workers(3)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(task(&format!("t{i}"), i % 3, move |_| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            }))
            .unwrap();
        }
        pool.wait_idle();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 50);
        assert_eq!(pool.queued_len(), 0);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.worker_count(), 3);
    }

    #[test]
    fn a_panicking_task_does_not_kill_its_worker() {
        let pool = RenderThreadPool::new(PoolConfig::with_workers(1)).unwrap();
        pool.submit(task("boom", 0, |_| panic!("boom"))).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        pool.submit(task("after", 0, move |_| {
            flag.fetch_add(1, AtomicOrdering::SeqCst);
        }))
        .unwrap();
        pool.wait_idle();
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let mut pool = RenderThreadPool::new(PoolConfig::with_workers(1)).unwrap();
        pool.shutdown();
        assert_eq!(pool.submit(task("late", 0, |_| {})), Err(PoolError::ShutDown));
    }

    struct Tagged(String);

    impl BackendContext for Tagged {
        fn label(&self) -> &str {
            &self.0
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn workers_receive_their_backend_context() {
        let factory: BackendContextFactory =
            Arc::new(|index| Some(Box::new(Tagged(format!("ctx-{index}"))) as Box<dyn BackendContext>));
        let pool = RenderThreadPool::with_backend_factory(PoolConfig::with_workers(2), Some(factory)).unwrap();
        let labels = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let labels = Arc::clone(&labels);
            pool.submit(task(&format!("t{i}"), 0, move |ctx| {
                let index = ctx.worker_index();
                let label = ctx.backend().map(|b| b.label().to_string());
                assert_eq!(label, Some(format!("ctx-{index}")));
                labels.lock().unwrap().push(index);
            }))
            .unwrap();
        }
        pool.wait_idle();
        assert_eq!(labels.lock().unwrap().len(), 4);
    }
}

//! Background encode scheduler.
//!
//! A bounded pool of worker threads consuming a double-ended task queue.
//! `High` priority tasks are pushed to the front, `Low` priority tasks to the
//! back; workers always pop from the front. With zero workers every task runs
//! synchronously on the submitting thread.
//!
//! # Lifecycle
//!
//! Created → Running → Stopped. `stop()` raises the shared stop flag, wakes
//! idle workers, joins them and discards whatever is still queued; discarded
//! tasks never run (their captured state is dropped). There is no way back
//! to Running. Dropping a scheduler that still has live workers is a
//! precondition violation: asserted in debug builds, workers are stopped
//! best-effort in release builds.

use parking_lot::{Condvar, Mutex};
use scenecast_core::{ExportError, ExportResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Priority levels for background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Heavy array encodes; queued at the back
    Low,
    /// Jumps the queue
    High,
}

/// Per-execution context handed to every task.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    worker: usize,
    stop: &'a AtomicBool,
}

impl<'a> TaskContext<'a> {
    /// Index of the executing worker (0 for inline execution)
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Live read of the scheduler's stop flag, for cooperative cancellation
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

type Task = Box<dyn FnOnce(TaskContext<'_>) + Send>;

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of tasks waiting in the queue.
    pub queue_depth: usize,
    /// Number of tasks currently being executed by workers.
    pub active_tasks: usize,
    /// Total number of tasks completed since scheduler creation.
    pub tasks_completed: u64,
    /// Tasks dropped unexecuted by `stop()`.
    pub tasks_discarded: u64,
    /// Number of worker threads.
    pub worker_count: usize,
}

struct SchedulerInner {
    queue: Mutex<VecDeque<Task>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    stop: AtomicBool,
    queue_depth: AtomicUsize,
    active_tasks: AtomicUsize,
    max_queue_depth: usize,
    tasks_completed: AtomicU64,
    tasks_discarded: AtomicU64,
}

/// Bounded worker pool with a front/back priority queue.
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
    stopped: AtomicBool,
}

impl TaskScheduler {
    /// Create a scheduler with `num_threads` workers.
    ///
    /// Workers are named `scenecast-enc-0`, `scenecast-enc-1`, etc.
    /// `num_threads == 0` selects synchronous inline execution.
    pub fn new(num_threads: usize, max_queue_depth: usize) -> ExportResult<Self> {
        let scheduler = Self::unstarted(num_threads, max_queue_depth);

        for i in 0..num_threads {
            let inner_clone = Arc::clone(&scheduler.inner);
            let spawned = std::thread::Builder::new()
                .name(format!("scenecast-enc-{}", i))
                .spawn(move || worker_loop(&inner_clone, i));
            match spawned {
                Ok(handle) => scheduler.workers.lock().push(handle),
                Err(e) => {
                    scheduler.stop();
                    return Err(ExportError::Io(e));
                }
            }
        }

        debug!(target: "scenecast::scheduler", workers = num_threads, "task scheduler started");
        Ok(scheduler)
    }

    /// Create a scheduler that runs every task inline on the caller
    pub fn inline() -> Self {
        Self::unstarted(0, 0)
    }

    fn unstarted(num_threads: usize, max_queue_depth: usize) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue: Mutex::new(VecDeque::new()),
                work_ready: Condvar::new(),
                drain_cond: Condvar::new(),
                stop: AtomicBool::new(false),
                queue_depth: AtomicUsize::new(0),
                active_tasks: AtomicUsize::new(0),
                max_queue_depth,
                tasks_completed: AtomicU64::new(0),
                tasks_discarded: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
            stopped: AtomicBool::new(false),
        }
    }

    /// Number of worker threads (0 = inline)
    pub fn worker_count(&self) -> usize {
        self.num_threads
    }

    /// Whether `stop()` has been called
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Submit a task.
    ///
    /// With zero workers the task runs before this call returns. Returns
    /// `Err(SchedulerStopped)` after `stop()` and `Err(QueueFull)` when the
    /// queue is at capacity; in both cases the task is dropped unexecuted.
    pub fn submit(
        &self,
        priority: TaskPriority,
        work: impl FnOnce(TaskContext<'_>) + Send + 'static,
    ) -> ExportResult<()> {
        if self.inner.stop.load(Ordering::Acquire) {
            return Err(ExportError::SchedulerStopped);
        }

        if self.num_threads == 0 {
            run_task(&self.inner, Box::new(work), 0);
            return Ok(());
        }

        {
            // Stop and capacity are re-checked under the lock `stop()` drains with.
            let mut queue = self.inner.queue.lock();
            if self.inner.stop.load(Ordering::Acquire) {
                return Err(ExportError::SchedulerStopped);
            }
            if queue.len() >= self.inner.max_queue_depth {
                return Err(ExportError::QueueFull);
            }
            match priority {
                TaskPriority::High => queue.push_front(Box::new(work)),
                TaskPriority::Low => queue.push_back(Box::new(work)),
            }
            self.inner.queue_depth.fetch_add(1, Ordering::Release);
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Block until all queued and in-flight tasks have completed.
    ///
    /// Returns immediately once the scheduler is stopped.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while !self.inner.stop.load(Ordering::Acquire)
            && (self.inner.queue_depth.load(Ordering::Acquire) > 0
                || self.inner.active_tasks.load(Ordering::Acquire) > 0)
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Stop the scheduler: raise the stop flag, wake and join every worker,
    /// then discard whatever is still queued.
    ///
    /// Calling `stop()` twice is a programming error (asserted in debug
    /// builds, ignored in release builds).
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            if cfg!(debug_assertions) {
                panic!("task scheduler stopped twice");
            }
            warn!(target: "scenecast::scheduler", "task scheduler stopped twice; ignoring");
            return;
        }
        self.shutdown_workers();
    }

    /// Return a snapshot of scheduler metrics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_tasks: self.inner.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            tasks_discarded: self.inner.tasks_discarded.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }

    fn shutdown_workers(&self) {
        self.inner.stop.store(true, Ordering::Release);

        // Notify under the queue lock: a worker between its stop check and
        // its condvar wait holds this lock, so the wakeup cannot be lost.
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        drop(workers);

        // Dropped outside the lock: task captures may run arbitrary Drop code.
        let discarded: Vec<Task> = {
            let mut queue = self.inner.queue.lock();
            self.inner.queue_depth.store(0, Ordering::Release);
            self.inner.drain_cond.notify_all();
            queue.drain(..).collect()
        };
        if !discarded.is_empty() {
            debug!(
                target: "scenecast::scheduler",
                count = discarded.len(),
                "discarding queued tasks at stop"
            );
            self.inner
                .tasks_discarded
                .fetch_add(discarded.len() as u64, Ordering::Relaxed);
        }
        drop(discarded);
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        if self.stopped.load(Ordering::Acquire) || self.workers.lock().is_empty() {
            return;
        }
        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!("task scheduler dropped with live workers; call stop() first");
        }
        warn!(
            target: "scenecast::scheduler",
            "task scheduler dropped with live workers; stopping them"
        );
        self.stopped.store(true, Ordering::Release);
        self.shutdown_workers();
    }
}

/// RAII guard that decrements `active_tasks` and notifies drain waiters on drop.
///
/// Keeps the bookkeeping correct even if a task panics.
struct ActiveTaskGuard<'a> {
    inner: &'a SchedulerInner,
}

impl<'a> Drop for ActiveTaskGuard<'a> {
    fn drop(&mut self) {
        let prev_active = self.inner.active_tasks.fetch_sub(1, Ordering::Release);
        self.inner.tasks_completed.fetch_add(1, Ordering::Relaxed);

        // Lock before notifying so a concurrent drain() cannot miss the wakeup.
        if prev_active == 1 && self.inner.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn run_task(inner: &SchedulerInner, task: Task, worker: usize) {
    inner.active_tasks.fetch_add(1, Ordering::Release);
    let _guard = ActiveTaskGuard { inner };

    let ctx = TaskContext {
        worker,
        stop: &inner.stop,
    };
    // A panicking task must not take the worker (or the caller) down with it.
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || task(ctx))) {
        error!(
            target: "scenecast::scheduler",
            worker,
            "background task panicked: {:?}",
            e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
        );
    }
}

fn worker_loop(inner: &SchedulerInner, worker: usize) {
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if inner.stop.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    break task;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        run_task(inner, task, worker);
    }
}

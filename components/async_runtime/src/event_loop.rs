//! Event loop implementation.
//!
//! This module provides a host loop that coordinates task and microtask
//! execution following the JavaScript event loop model. The promise core
//! does not need it; it is one way to honour the scheduler's contract of
//! draining microtasks between coarser units of work.

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::promise::Promise;
use crate::rejection::UnhandledRejection;
use crate::scheduler::{DrainReport, Scheduler};
use crate::task_queue::{MicroTask, Task, TaskQueue};
use core_types::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Enqueues tasks onto an [`EventLoop`] from inside tasks or handlers.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    tasks: Rc<RefCell<TaskQueue>>,
}

impl TaskSpawner {
    /// Adds a task to the end of the task queue.
    pub fn spawn(&self, task: Task) {
        self.tasks.borrow_mut().enqueue(task);
    }

    /// Adds a closure as a task.
    pub fn spawn_fn<F>(&self, f: F)
    where
        F: FnOnce() -> Result<(), Value> + 'static,
    {
        self.spawn(Task::new(f));
    }
}

/// The host event loop.
///
/// Each iteration (turn) of the loop:
/// 1. Takes the oldest task from the task queue and executes it
/// 2. Drains all microtasks (a microtask checkpoint)
/// 3. Reports rejections that are still unhandled
/// 4. Repeats
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, Task};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
/// let (promise, resolvers) = Promise::with_resolvers_in(event_loop.scheduler());
///
/// event_loop.enqueue_task(Task::new(move || {
///     resolvers.resolve(Value::Smi(7));
///     Ok(())
/// }));
///
/// let outcome = event_loop.run_until_settled(&promise).unwrap();
/// assert_eq!(outcome, Ok(Value::Smi(7)));
/// ```
#[derive(Debug)]
pub struct EventLoop {
    tasks: Rc<RefCell<TaskQueue>>,
    scheduler: Scheduler,
    unhandled: Vec<UnhandledRejection>,
}

impl EventLoop {
    /// Creates an event loop driving the current thread's scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::current())
    }

    /// Creates an event loop driving `scheduler`.
    ///
    /// Turns on unhandled rejection tracking unless the scheduler's
    /// configuration set it explicitly.
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        if scheduler.config().track_rejections.is_none() {
            scheduler.set_rejection_tracking(true);
        }
        Self {
            tasks: Rc::new(RefCell::new(TaskQueue::new())),
            scheduler,
            unhandled: Vec::new(),
        }
    }

    /// Creates an event loop with a fresh scheduler built from `config`.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_scheduler(Scheduler::with_config(config))
    }

    /// The scheduler whose microtasks this loop drains.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns a handle for enqueueing tasks later.
    pub fn spawner(&self) -> TaskSpawner {
        TaskSpawner {
            tasks: self.tasks.clone(),
        }
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&mut self, task: Task) {
        self.tasks.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the scheduler's queue.
    pub fn enqueue_microtask(&mut self, microtask: MicroTask) {
        self.scheduler.enqueue(microtask);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// New microtasks added during execution are also processed before this
    /// method returns.
    pub fn run_all_microtasks(&mut self) -> RuntimeResult<DrainReport> {
        self.scheduler.run_microtasks()
    }

    /// Runs all tasks in the queue without processing microtasks between them.
    ///
    /// This is primarily for testing purposes.
    pub fn run_all_tasks(&mut self) -> RuntimeResult<()> {
        loop {
            let task = self.tasks.borrow_mut().dequeue();
            match task {
                Some(task) => task.run().map_err(RuntimeError::TaskFailed)?,
                None => return Ok(()),
            }
        }
    }

    /// Processes one complete cycle: one task followed by all microtasks.
    pub fn process_one_cycle(&mut self) -> RuntimeResult<()> {
        let task = self.tasks.borrow_mut().dequeue();
        if let Some(task) = task {
            task.run().map_err(RuntimeError::TaskFailed)?;
        }
        self.microtask_checkpoint()
    }

    /// Runs the event loop until all tasks and microtasks are processed.
    pub fn run_until_done(&mut self) -> RuntimeResult<()> {
        while !self.is_task_queue_empty() || !self.is_microtask_queue_empty() {
            self.process_one_cycle()?;
        }
        Ok(())
    }

    /// Runs cycles until `promise` settles and returns its outcome.
    ///
    /// The promise counts as handled, so a rejection returned here is not
    /// also reported as unhandled. If the promise belongs to another
    /// scheduler, that scheduler is drained too whenever it has work.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Stalled`] if every queue empties out first, plus any
    /// error from the cycles themselves.
    pub fn run_until_settled(&mut self, promise: &Promise) -> RuntimeResult<Result<Value, Value>> {
        promise.mark_handled();
        let own = promise.scheduler();
        let foreign = (!own.ptr_eq(&self.scheduler)).then_some(own);
        loop {
            if let Some(outcome) = promise.state().into_outcome() {
                return Ok(outcome);
            }
            if let Some(other) = foreign.filter(|s| !s.is_idle() && !s.is_draining()) {
                other.run_microtasks()?;
                continue;
            }
            if self.is_task_queue_empty() && self.is_microtask_queue_empty() {
                return Err(RuntimeError::Stalled(promise.id()));
            }
            self.process_one_cycle()?;
        }
    }

    /// Rejections reported as unhandled so far.
    pub fn unhandled_rejections(&self) -> &[UnhandledRejection] {
        &self.unhandled
    }

    /// Returns and clears the rejections reported as unhandled so far.
    pub fn take_unhandled_rejections(&mut self) -> Vec<UnhandledRejection> {
        std::mem::take(&mut self.unhandled)
    }

    fn microtask_checkpoint(&mut self) -> RuntimeResult<()> {
        self.scheduler.run_microtasks()?;
        for rejection in self.scheduler.take_unhandled_rejections() {
            tracing::warn!(
                promise = %rejection.promise,
                reason = %rejection.reason,
                "unhandled promise rejection"
            );
            self.unhandled.push(rejection);
        }
        Ok(())
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

//! The microtask scheduler.
//!
//! A [`Scheduler`] owns one FIFO microtask queue. Every promise continuation
//! runs as a microtask on the scheduler its promise was created on, never
//! inline. The host decides when to drain; a drain keeps popping from the
//! head until the queue is empty, so microtasks queued by running microtasks
//! still run before [`Scheduler::run_microtasks`] returns.
//!
//! Each thread has a default scheduler, returned by [`Scheduler::current`].
//! Tests and embedders that want isolation create their own and pass it to
//! the `*_in` constructors.
//!
//! ```
//! use async_runtime::Scheduler;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let scheduler = Scheduler::new();
//! let order = Rc::new(RefCell::new(Vec::new()));
//!
//! let o = order.clone();
//! let inner = scheduler.clone();
//! scheduler.queue_microtask(move || {
//!     o.borrow_mut().push(1);
//!     let o = o.clone();
//!     inner.queue_microtask(move || o.borrow_mut().push(3));
//! });
//! let o = order.clone();
//! scheduler.queue_microtask(move || o.borrow_mut().push(2));
//!
//! let report = scheduler.run_microtasks().unwrap();
//! assert_eq!(report.ran, 3);
//! assert_eq!(*order.borrow(), vec![1, 2, 3]);
//! ```

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::promise::PromiseId;
use crate::rejection::{RejectionTracker, UnhandledRejection};
use crate::task_queue::{MicroTask, MicrotaskQueue};
use core_types::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

thread_local! {
    static CURRENT: Scheduler = Scheduler::new();
}

/// Counts from one call to [`Scheduler::run_microtasks`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Microtasks that ran
    pub ran: usize,
    /// Microtasks among them that panicked
    pub panicked: usize,
}

/// Handle to a single-threaded microtask queue.
///
/// Cloning the handle shares the queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

struct SchedulerInner {
    queue: RefCell<MicrotaskQueue>,
    draining: Cell<bool>,
    tracking: Cell<bool>,
    rejections: RefCell<RejectionTracker>,
    config: RuntimeConfig,
}

/// Clears the draining flag even if a drain exits early.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    /// Creates a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(MicrotaskQueue::new()),
                draining: Cell::new(false),
                tracking: Cell::new(config.track_rejections.unwrap_or(false)),
                rejections: RefCell::new(RejectionTracker::default()),
                config,
            }),
        }
    }

    /// Returns this thread's default scheduler.
    pub fn current() -> Self {
        CURRENT.with(Scheduler::clone)
    }

    /// Returns the configuration this scheduler was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Appends a microtask to the tail of the queue.
    pub fn enqueue(&self, microtask: MicroTask) {
        self.inner.queue.borrow_mut().enqueue(microtask);
    }

    /// Appends a closure to the tail of the queue.
    pub fn queue_microtask<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.enqueue(MicroTask::new(f));
    }

    /// Number of queued microtasks.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Returns true if no microtask is queued.
    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Returns true while a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.get()
    }

    /// Returns true if both handles share one queue.
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs microtasks from the head of the queue until it is empty.
    ///
    /// A panicking microtask is logged and counted; the drain carries on with
    /// the next one. Calling this from inside a microtask returns an empty
    /// report at once and leaves the work to the drain already running.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::MicrotaskBudgetExhausted`] if a budget is configured
    /// and this drain used it up with work still queued. The remaining
    /// microtasks stay queued in order.
    pub fn run_microtasks(&self) -> RuntimeResult<DrainReport> {
        if self.inner.draining.replace(true) {
            tracing::trace!("nested drain request ignored");
            return Ok(DrainReport::default());
        }
        let _guard = DrainGuard(&self.inner.draining);

        let mut report = DrainReport::default();
        loop {
            if let Some(budget) = self.inner.config.microtask_budget {
                let remaining = self.pending();
                if report.ran >= budget && remaining > 0 {
                    tracing::warn!(budget, remaining, "microtask budget exhausted");
                    return Err(RuntimeError::MicrotaskBudgetExhausted { budget, remaining });
                }
            }

            let Some(microtask) = self.inner.queue.borrow_mut().dequeue() else {
                break;
            };
            report.ran += 1;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| microtask.run())) {
                report.panicked += 1;
                tracing::warn!(panic = %panic_message(payload.as_ref()), "microtask panicked");
            }
        }

        tracing::debug!(
            ran = report.ran,
            panicked = report.panicked,
            "microtask queue drained"
        );
        Ok(report)
    }

    /// Returns true if rejections without a handler are being recorded.
    pub fn tracks_rejections(&self) -> bool {
        self.inner.tracking.get()
    }

    /// Turns unhandled rejection recording on or off.
    ///
    /// Turning it off discards the records collected so far.
    pub fn set_rejection_tracking(&self, enabled: bool) {
        let was_enabled = self.inner.tracking.replace(enabled);
        if was_enabled && !enabled {
            self.inner.rejections.borrow_mut().take();
        }
    }

    /// Returns and clears the rejections that still have no handler.
    ///
    /// Nothing is recorded unless tracking is on; see
    /// [`RuntimeConfig::track_rejections`].
    pub fn take_unhandled_rejections(&self) -> Vec<UnhandledRejection> {
        self.inner.rejections.borrow_mut().take()
    }

    pub(crate) fn track_rejection(&self, promise: PromiseId, reason: Value) {
        if self.inner.tracking.get() {
            self.inner.rejections.borrow_mut().rejected(promise, reason);
        }
    }

    pub(crate) fn rejection_handled(&self, promise: PromiseId) {
        if self.inner.rejections.borrow_mut().handled(promise) {
            tracing::trace!(%promise, "late handler attached to rejected promise");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("draining", &self.is_draining())
            .field("unhandled", &self.inner.rejections.borrow().len())
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

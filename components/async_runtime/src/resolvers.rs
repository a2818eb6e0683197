//! Producer capabilities for settling a promise.
//!
//! [`Resolvers`] is the pair of functions a promise executor receives. All
//! clones share one "already resolved" flag: the first call to either
//! function wins and later calls are ignored, even while the promise is
//! still pending because it is following a thenable.

use crate::promise::{Handler, Promise};
use core_types::{JsError, Thenable, Value};
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// The resolve/reject capabilities of one promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{Promise, PromiseState, Scheduler};
/// use core_types::Value;
///
/// let scheduler = Scheduler::new();
/// let (promise, resolvers) = Promise::with_resolvers_in(&scheduler);
///
/// resolvers.resolve(Value::Smi(1));
/// resolvers.reject(Value::from("ignored"));
/// assert_eq!(promise.state(), PromiseState::Fulfilled(Value::Smi(1)));
/// ```
#[derive(Clone)]
pub struct Resolvers {
    promise: Promise,
    already_resolved: Rc<Cell<bool>>,
}

impl Resolvers {
    pub(crate) fn new(promise: Promise) -> Self {
        Self {
            promise,
            already_resolved: Rc::new(Cell::new(false)),
        }
    }

    /// The promise these functions settle.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Returns true once either function has been called.
    pub fn is_resolved(&self) -> bool {
        self.already_resolved.get()
    }

    /// Fulfills the promise with `value`.
    ///
    /// A thenable `value` is not stored: the promise follows it and settles
    /// with its eventual outcome instead.
    pub fn resolve(&self, value: Value) {
        if self.already_resolved.replace(true) {
            tracing::trace!(promise = %self.promise.id(), "resolve ignored: already resolved");
            return;
        }
        resolve_promise(&self.promise, value);
    }

    /// Rejects the promise with `reason`. The reason is never unwrapped.
    pub fn reject(&self, reason: Value) {
        if self.already_resolved.replace(true) {
            tracing::trace!(promise = %self.promise.id(), "reject ignored: already resolved");
            return;
        }
        self.promise.settle(Err(reason));
    }
}

impl fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvers")
            .field("promise", &self.promise.id())
            .field("already_resolved", &self.already_resolved.get())
            .finish()
    }
}

fn resolve_promise(promise: &Promise, value: Value) {
    let thenable = match value {
        Value::Thenable(thenable) => thenable,
        value => return promise.settle(Ok(value)),
    };

    if let Some(source) = thenable.as_any().downcast_ref::<Promise>() {
        if source.ptr_eq(promise) {
            let cycle = JsError::type_error("Chaining cycle detected for promise");
            return promise.settle(Err(cycle.into()));
        }
        follow_promise(source, promise);
        return;
    }

    // Foreign code only runs from the queue, never inside the caller.
    let adopt = Resolvers::new(promise.clone());
    promise
        .scheduler()
        .queue_microtask(move || follow_thenable(thenable, adopt));
}

fn follow_promise(source: &Promise, target: &Promise) {
    let on_fulfilled = Resolvers::new(target.clone());
    let on_rejected = on_fulfilled.clone();
    source.then(
        Some(Handler::new(move |value| {
            on_fulfilled.resolve(value);
            Ok(Value::Undefined)
        })),
        Some(Handler::new(move |reason| {
            on_rejected.reject(reason);
            Ok(Value::Undefined)
        })),
    );
}

fn follow_thenable(thenable: Rc<dyn Thenable>, adopt: Resolvers) {
    let on_fulfilled = adopt.clone();
    let on_rejected = adopt.clone();
    let subscribed = panic::catch_unwind(AssertUnwindSafe(|| {
        thenable.subscribe(
            Box::new(move |value| on_fulfilled.resolve(value)),
            Box::new(move |reason| on_rejected.reject(reason)),
        )
    }));

    match subscribed {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => adopt.reject(reason),
        Err(payload) => {
            let message = crate::scheduler::panic_message(payload.as_ref());
            adopt.reject(JsError::internal(message).into());
        }
    }
}

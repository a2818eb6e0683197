//! Promise implementation.
//!
//! A [`Promise`] is a single-assignment container for an eventual result.
//! It starts pending and is settled at most once, either fulfilled with a
//! value or rejected with a reason. Consumers register continuations with
//! [`Promise::then`]; each registration returns a new promise settled from
//! the handler's outcome. Handlers always run as microtasks on the promise's
//! [`Scheduler`], never inside the call that settled or registered.
//!
//! Only the holder of the [`Resolvers`] can settle a promise.

use crate::resolvers::Resolvers;
use crate::scheduler::{panic_message, Scheduler};
use crate::task_queue::MicroTask;
use core_types::{JsError, SettleFn, Thenable, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a handler: `Ok` when it returns normally, `Err` when it throws.
pub type HandlerResult = Result<Value, Value>;

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a Promise.
///
/// Promises only ever move from `Pending` to one of the settled states.
/// Once settled, a Promise cannot change state.
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been fulfilled with a value.
    Fulfilled(Value),
    /// The promise has been rejected with a reason.
    Rejected(Value),
}

impl PromiseState {
    /// Returns true if the promise has not settled.
    pub fn is_pending(&self) -> bool {
        matches!(self, PromiseState::Pending)
    }

    /// Returns true if the promise was fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, PromiseState::Fulfilled(_))
    }

    /// Returns true if the promise was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, PromiseState::Rejected(_))
    }

    /// Converts a settled state into `Ok(value)` / `Err(reason)`.
    pub fn into_outcome(self) -> Option<Result<Value, Value>> {
        match self {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(value) => Some(Ok(value)),
            PromiseState::Rejected(reason) => Some(Err(reason)),
        }
    }
}

/// A continuation handler.
///
/// Handlers receive the settled value (or reason) and either return a value
/// to fulfill the derived promise, or an `Err` to reject it. A handler that
/// panics rejects the derived promise with an `InternalError`.
pub struct Handler {
    callback: Box<dyn FnOnce(Value) -> HandlerResult>,
}

impl Handler {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> HandlerResult + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the handler with the settled value or reason.
    pub fn call(self, argument: Value) -> HandlerResult {
        (self.callback)(argument)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

/// A reaction to be triggered when a Promise settles.
///
/// This represents the handlers registered via `.then()` together with the
/// promise they settle.
struct PromiseReaction {
    derived: Promise,
    on_fulfilled: Option<Handler>,
    on_rejected: Option<Handler>,
}

impl PromiseReaction {
    fn into_microtask(self, outcome: Result<Value, Value>) -> MicroTask {
        MicroTask::new(move || self.run(outcome))
    }

    fn run(self, outcome: Result<Value, Value>) {
        let result = match (outcome, self.on_fulfilled, self.on_rejected) {
            (Ok(value), Some(handler), _) => invoke(handler, value),
            (Ok(value), None, _) => Ok(value),
            (Err(reason), _, Some(handler)) => invoke(handler, reason),
            (Err(reason), _, None) => Err(reason),
        };

        let resolvers = Resolvers::new(self.derived);
        match result {
            Ok(value) => resolvers.resolve(value),
            Err(reason) => resolvers.reject(reason),
        }
    }
}

fn invoke(handler: Handler, argument: Value) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(move || handler.call(argument)))
        .unwrap_or_else(|payload| Err(JsError::internal(panic_message(payload.as_ref())).into()))
}

struct PromiseInner {
    id: PromiseId,
    state: PromiseState,
    reactions: Vec<PromiseReaction>,
    is_handled: bool,
}

// A pending promise owns its reactions, and each reaction owns a derived
// promise or a handler holding a follower's resolvers. Reactions of a
// dropped promise are released from a flat loop so that abandoning a long
// chain does not recurse once per link.
impl Drop for PromiseInner {
    fn drop(&mut self) {
        if self.reactions.is_empty() {
            return;
        }
        let reactions = std::mem::take(&mut self.reactions);
        // Fails only during thread teardown; the reactions then drop in place.
        let _ = ABANDONED.try_with(move |abandoned| abandoned.release(reactions));
    }
}

thread_local! {
    static ABANDONED: Abandoned = Abandoned::default();
}

/// Reactions of dropped promises waiting to be released.
#[derive(Default)]
struct Abandoned {
    releasing: Cell<bool>,
    pending: RefCell<Vec<PromiseReaction>>,
}

/// Clears the releasing flag even if a captured value panics on drop.
struct ReleaseGuard<'a>(&'a Cell<bool>);

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Abandoned {
    fn release(&self, reactions: Vec<PromiseReaction>) {
        self.pending.borrow_mut().extend(reactions);
        if self.releasing.replace(true) {
            // An outer release further up the stack picks these up.
            return;
        }
        let _guard = ReleaseGuard(&self.releasing);
        loop {
            let next = self.pending.borrow_mut().pop();
            match next {
                Some(reaction) => drop(reaction),
                None => break,
            }
        }
    }
}

/// A deferred value.
///
/// `Promise` is a shared handle: clones refer to the same promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{Handler, Promise, PromiseState, Scheduler};
/// use core_types::Value;
///
/// let scheduler = Scheduler::new();
/// let (promise, resolvers) = Promise::with_resolvers_in(&scheduler);
/// let doubled = promise.then(
///     Some(Handler::new(|v| match v {
///         Value::Smi(n) => Ok(Value::Smi(n * 2)),
///         other => Err(other),
///     })),
///     None,
/// );
///
/// resolvers.resolve(Value::Smi(21));
/// assert!(doubled.is_pending());
///
/// scheduler.run_microtasks().unwrap();
/// assert_eq!(doubled.state(), PromiseState::Fulfilled(Value::Smi(42)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
    scheduler: Scheduler,
}

impl Promise {
    pub(crate) fn pending_in(scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: PromiseId::next(),
                state: PromiseState::Pending,
                reactions: Vec::new(),
                is_handled: false,
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Creates a promise on the current thread's scheduler and runs
    /// `executor` synchronously with its resolvers.
    ///
    /// If the executor returns `Err` or panics, the promise is rejected with
    /// that reason, unless the executor already resolved it.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolvers) -> Result<(), Value>,
    {
        Self::new_in(&Scheduler::current(), executor)
    }

    /// Like [`Promise::new`], on an explicit scheduler.
    pub fn new_in<F>(scheduler: &Scheduler, executor: F) -> Self
    where
        F: FnOnce(Resolvers) -> Result<(), Value>,
    {
        let (promise, resolvers) = Self::with_resolvers_in(scheduler);
        let on_error = resolvers.clone();
        match panic::catch_unwind(AssertUnwindSafe(move || executor(resolvers))) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => on_error.reject(reason),
            Err(payload) => {
                on_error.reject(JsError::internal(panic_message(payload.as_ref())).into())
            }
        }
        promise
    }

    /// Creates a pending promise and hands back its resolvers.
    pub fn with_resolvers() -> (Self, Resolvers) {
        Self::with_resolvers_in(&Scheduler::current())
    }

    /// Like [`Promise::with_resolvers`], on an explicit scheduler.
    pub fn with_resolvers_in(scheduler: &Scheduler) -> (Self, Resolvers) {
        let promise = Self::pending_in(scheduler);
        let resolvers = Resolvers::new(promise.clone());
        (promise, resolvers)
    }

    /// Returns a promise resolved with `value`.
    ///
    /// A value that already holds a `Promise` is returned unchanged; any
    /// other thenable is adopted.
    pub fn resolve(value: Value) -> Self {
        Self::resolve_in(&Scheduler::current(), value)
    }

    /// Like [`Promise::resolve`], on an explicit scheduler.
    pub fn resolve_in(scheduler: &Scheduler, value: Value) -> Self {
        if let Some(promise) = Self::from_value(&value) {
            return promise;
        }
        let (promise, resolvers) = Self::with_resolvers_in(scheduler);
        resolvers.resolve(value);
        promise
    }

    /// Returns a promise rejected with `reason`.
    pub fn reject(reason: Value) -> Self {
        Self::reject_in(&Scheduler::current(), reason)
    }

    /// Like [`Promise::reject`], on an explicit scheduler.
    pub fn reject_in(scheduler: &Scheduler, reason: Value) -> Self {
        let (promise, resolvers) = Self::with_resolvers_in(scheduler);
        resolvers.reject(reason);
        promise
    }

    /// Recovers the promise stored in `value`, if it holds one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Thenable(thenable) => thenable.as_any().downcast_ref::<Promise>().cloned(),
            _ => None,
        }
    }

    /// Returns this promise's identity.
    pub fn id(&self) -> PromiseId {
        self.inner.borrow().id
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state.clone()
    }

    /// Returns true if the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().state.is_pending()
    }

    /// Returns true once any continuation has been registered.
    pub fn is_handled(&self) -> bool {
        self.inner.borrow().is_handled
    }

    /// Checks if there are continuations waiting for settlement.
    pub fn has_pending_reactions(&self) -> bool {
        !self.inner.borrow().reactions.is_empty()
    }

    /// The scheduler this promise's continuations run on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers handlers for fulfillment and/or rejection.
    ///
    /// Returns a new promise settled from whichever handler runs. A missing
    /// handler passes the value or reason through unchanged. If this promise
    /// has already settled, the matching handler is queued right away; it
    /// still runs only when the scheduler drains.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let derived = Promise::pending_in(&self.scheduler);
        let reaction = PromiseReaction {
            derived: derived.clone(),
            on_fulfilled,
            on_rejected,
        };

        let mut inner = self.inner.borrow_mut();
        let was_handled = std::mem::replace(&mut inner.is_handled, true);
        let Some(outcome) = inner.state.clone().into_outcome() else {
            inner.reactions.push(reaction);
            return derived;
        };
        let id = inner.id;
        drop(inner);

        if outcome.is_err() && !was_handled {
            self.scheduler.rejection_handled(id);
        }
        tracing::trace!(promise = %id, "reaction queued on settled promise");
        self.scheduler.enqueue(reaction.into_microtask(outcome));
        derived
    }

    /// Registers a rejection handler; fulfillment passes through.
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(Value) -> HandlerResult + 'static,
    {
        self.then(None, Some(Handler::new(on_rejected)))
    }

    /// Runs `on_settled` on either outcome, then passes the original outcome
    /// through.
    ///
    /// If `on_settled` fails, its reason replaces the outcome. If it returns
    /// a thenable, the outcome is passed through once that thenable fulfills.
    pub fn finally<F>(&self, on_settled: F) -> Promise
    where
        F: FnOnce() -> HandlerResult + 'static,
    {
        let callback = Rc::new(RefCell::new(Some(on_settled)));
        let on_fulfilled = {
            let callback = callback.clone();
            let scheduler = self.scheduler.clone();
            Handler::new(move |value| run_finally(&*callback, &scheduler, Ok(value)))
        };
        let scheduler = self.scheduler.clone();
        let on_rejected =
            Handler::new(move |reason| run_finally(&*callback, &scheduler, Err(reason)));
        self.then(Some(on_fulfilled), Some(on_rejected))
    }

    /// Marks the promise as observed without registering a continuation.
    pub(crate) fn mark_handled(&self) {
        let (id, was_handled) = {
            let mut inner = self.inner.borrow_mut();
            (inner.id, std::mem::replace(&mut inner.is_handled, true))
        };
        if !was_handled {
            self.scheduler.rejection_handled(id);
        }
    }

    /// Moves a pending promise to its settled state and queues its waiters.
    ///
    /// Does nothing if the promise has already settled.
    pub(crate) fn settle(&self, outcome: Result<Value, Value>) {
        let (id, is_handled, reactions) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = match &outcome {
                Ok(value) => PromiseState::Fulfilled(value.clone()),
                Err(reason) => PromiseState::Rejected(reason.clone()),
            };
            (inner.id, inner.is_handled, std::mem::take(&mut inner.reactions))
        };

        match &outcome {
            Ok(_) => tracing::trace!(promise = %id, waiters = reactions.len(), "promise fulfilled"),
            Err(reason) => {
                tracing::trace!(promise = %id, waiters = reactions.len(), %reason, "promise rejected");
                if !is_handled {
                    self.scheduler.track_rejection(id, reason.clone());
                }
            }
        }

        for reaction in reactions {
            self.scheduler.enqueue(reaction.into_microtask(outcome.clone()));
        }
    }
}

fn run_finally<F>(
    callback: &RefCell<Option<F>>,
    scheduler: &Scheduler,
    outcome: HandlerResult,
) -> HandlerResult
where
    F: FnOnce() -> HandlerResult,
{
    let Some(on_settled) = callback.borrow_mut().take() else {
        return outcome;
    };
    let result = on_settled()?;
    if !result.is_thenable() {
        return outcome;
    }

    let awaited = Promise::resolve_in(scheduler, result);
    let passthrough = awaited.then(Some(Handler::new(move |_| outcome)), None);
    Ok(passthrough.into())
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Promise")
            .field("id", &inner.id)
            .field("state", &inner.state)
            .field("reactions", &inner.reactions.len())
            .finish()
    }
}

impl Thenable for Promise {
    fn subscribe(&self, on_fulfilled: SettleFn, on_rejected: SettleFn) -> Result<(), Value> {
        self.then(
            Some(Handler::new(move |value| {
                on_fulfilled(value);
                Ok(Value::Undefined)
            })),
            Some(Handler::new(move |reason| {
                on_rejected(reason);
                Ok(Value::Undefined)
            })),
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Self {
        Value::Thenable(Rc::new(promise))
    }
}

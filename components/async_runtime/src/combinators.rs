//! Aggregate operations over collections of promises.
//!
//! Each combinator converts its inputs with [`Promise::resolve`], registers
//! one continuation per input, and settles a single result promise. The only
//! state they keep is a remaining-count and a result buffer sized to the
//! input, so results land in input order no matter which input settles
//! first.
//!
//! Inputs are collected eagerly before any continuation is registered.
//!
//! # Examples
//!
//! ```
//! use async_runtime::{all_in, Promise, PromiseState, Scheduler};
//! use core_types::Value;
//!
//! let scheduler = Scheduler::new();
//! let (slow, resolve_slow) = Promise::with_resolvers_in(&scheduler);
//! let fast = Promise::resolve_in(&scheduler, Value::Smi(2));
//!
//! let both = all_in(&scheduler, vec![Value::from(slow), Value::from(fast)]);
//! scheduler.run_microtasks().unwrap();
//! assert!(both.is_pending());
//!
//! resolve_slow.resolve(Value::Smi(1));
//! scheduler.run_microtasks().unwrap();
//! assert_eq!(
//!     both.state(),
//!     PromiseState::Fulfilled(Value::Array(vec![Value::Smi(1), Value::Smi(2)]))
//! );
//! ```

use crate::promise::{Handler, HandlerResult, Promise};
use crate::resolvers::Resolvers;
use crate::scheduler::Scheduler;
use core_types::{JsError, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// The outcome of one input to [`all_settled`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettledOutcome {
    /// The input fulfilled with this value
    Fulfilled(Value),
    /// The input rejected with this reason
    Rejected(Value),
}

impl SettledOutcome {
    /// Reads an outcome record produced by [`all_settled`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.get("status") {
            Some(Value::String(status)) if status == "fulfilled" => {
                Some(SettledOutcome::Fulfilled(value.get("value")?.clone()))
            }
            Some(Value::String(status)) if status == "rejected" => {
                Some(SettledOutcome::Rejected(value.get("reason")?.clone()))
            }
            _ => None,
        }
    }
}

/// Outcome records are `{ status: "fulfilled", value }` or
/// `{ status: "rejected", reason }`.
impl From<SettledOutcome> for Value {
    fn from(outcome: SettledOutcome) -> Self {
        let mut record = BTreeMap::new();
        match outcome {
            SettledOutcome::Fulfilled(value) => {
                record.insert("status".to_string(), Value::from("fulfilled"));
                record.insert("value".to_string(), value);
            }
            SettledOutcome::Rejected(reason) => {
                record.insert("status".to_string(), Value::from("rejected"));
                record.insert("reason".to_string(), reason);
            }
        }
        Value::Object(record)
    }
}

/// Shared bookkeeping for the counting combinators.
struct Aggregate {
    resolvers: Resolvers,
    remaining: Cell<usize>,
    slots: RefCell<Vec<Value>>,
}

impl Aggregate {
    fn new(resolvers: Resolvers, len: usize) -> Rc<Self> {
        Rc::new(Self {
            resolvers,
            remaining: Cell::new(len),
            slots: RefCell::new(vec![Value::Undefined; len]),
        })
    }

    /// Stores `value` at `index`; returns the full buffer once every slot
    /// has been written.
    fn record(&self, index: usize, value: Value) -> Option<Vec<Value>> {
        self.slots.borrow_mut()[index] = value;
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        (remaining == 0).then(|| self.slots.take())
    }
}

fn collect_inputs<I>(scheduler: &Scheduler, inputs: I) -> Vec<Promise>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    inputs
        .into_iter()
        .map(|input| Promise::resolve_in(scheduler, input.into()))
        .collect()
}

fn done() -> HandlerResult {
    Ok(Value::Undefined)
}

/// Fulfills with every input's value, in input order, once all have
/// fulfilled; rejects with the first rejection reason.
///
/// Uses the current thread's scheduler.
pub fn all<I>(inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    all_in(&Scheduler::current(), inputs)
}

/// Like [`all`], on an explicit scheduler.
pub fn all_in<I>(scheduler: &Scheduler, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let (result, resolvers) = Promise::with_resolvers_in(scheduler);
    let inputs = collect_inputs(scheduler, inputs);
    if inputs.is_empty() {
        resolvers.resolve(Value::Array(Vec::new()));
        return result;
    }

    let aggregate = Aggregate::new(resolvers.clone(), inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let on_fulfilled = {
            let aggregate = aggregate.clone();
            Handler::new(move |value| {
                if let Some(values) = aggregate.record(index, value) {
                    aggregate.resolvers.resolve(Value::Array(values));
                }
                done()
            })
        };
        let on_rejected = {
            let resolvers = resolvers.clone();
            Handler::new(move |reason| {
                resolvers.reject(reason);
                done()
            })
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    result
}

/// Fulfills once every input has settled, with one outcome record per
/// input in input order. Never rejects.
///
/// Uses the current thread's scheduler.
pub fn all_settled<I>(inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    all_settled_in(&Scheduler::current(), inputs)
}

/// Like [`all_settled`], on an explicit scheduler.
pub fn all_settled_in<I>(scheduler: &Scheduler, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let (result, resolvers) = Promise::with_resolvers_in(scheduler);
    let inputs = collect_inputs(scheduler, inputs);
    if inputs.is_empty() {
        resolvers.resolve(Value::Array(Vec::new()));
        return result;
    }

    let aggregate = Aggregate::new(resolvers, inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let on_fulfilled = {
            let aggregate = aggregate.clone();
            Handler::new(move |value| {
                settle_outcome(&aggregate, index, SettledOutcome::Fulfilled(value));
                done()
            })
        };
        let on_rejected = {
            let aggregate = aggregate.clone();
            Handler::new(move |reason| {
                settle_outcome(&aggregate, index, SettledOutcome::Rejected(reason));
                done()
            })
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    result
}

fn settle_outcome(aggregate: &Aggregate, index: usize, outcome: SettledOutcome) {
    if let Some(records) = aggregate.record(index, outcome.into()) {
        aggregate.resolvers.resolve(Value::Array(records));
    }
}

/// Settles like whichever input settles first, in scheduling order. Ties
/// go to the lower input index. With no inputs, never settles.
///
/// Uses the current thread's scheduler.
pub fn race<I>(inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    race_in(&Scheduler::current(), inputs)
}

/// Like [`race`], on an explicit scheduler.
pub fn race_in<I>(scheduler: &Scheduler, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let (result, resolvers) = Promise::with_resolvers_in(scheduler);
    for input in collect_inputs(scheduler, inputs) {
        let on_fulfilled = resolvers.clone();
        let on_rejected = resolvers.clone();
        input.then(
            Some(Handler::new(move |value| {
                on_fulfilled.resolve(value);
                done()
            })),
            Some(Handler::new(move |reason| {
                on_rejected.reject(reason);
                done()
            })),
        );
    }
    result
}

/// Fulfills with the first input to fulfill. If every input rejects,
/// rejects with an `AggregateError` holding all reasons in input order.
/// With no inputs, rejects with an empty `AggregateError`.
///
/// Uses the current thread's scheduler.
pub fn any<I>(inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    any_in(&Scheduler::current(), inputs)
}

/// Like [`any`], on an explicit scheduler.
pub fn any_in<I>(scheduler: &Scheduler, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let (result, resolvers) = Promise::with_resolvers_in(scheduler);
    let inputs = collect_inputs(scheduler, inputs);
    if inputs.is_empty() {
        resolvers.reject(JsError::aggregate(Vec::new()).into());
        return result;
    }

    let aggregate = Aggregate::new(resolvers.clone(), inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let on_fulfilled = {
            let resolvers = resolvers.clone();
            Handler::new(move |value| {
                resolvers.resolve(value);
                done()
            })
        };
        let on_rejected = {
            let aggregate = aggregate.clone();
            Handler::new(move |reason| {
                if let Some(reasons) = aggregate.record(index, reason) {
                    aggregate
                        .resolvers
                        .reject(JsError::aggregate(reasons).into());
                }
                done()
            })
        };
        input.then(Some(on_fulfilled), Some(on_rejected));
    }
    result
}

//! Deferred values with cooperative microtask scheduling.
//!
//! This crate provides the async core of the runtime:
//! - Promise with `then`/`catch`/`finally` chaining and thenable adoption
//! - Microtask scheduler with drain-until-empty semantics
//! - The `all`, `all_settled`, `race` and `any` combinators
//! - A reference event loop hosting the scheduler
//!
//! # Overview
//!
//! - [`Promise`] - Single-assignment container for an eventual result
//! - [`Resolvers`] - The capabilities that settle a promise
//! - [`Scheduler`] - FIFO microtask queue with an explicit drain
//! - [`EventLoop`] - Task loop with a microtask checkpoint after every task
//!
//! Everything here is single-threaded: promises and schedulers are `Rc`
//! handles and are neither `Send` nor `Sync`.
//!
//! # Examples
//!
//! ## Chaining
//!
//! ```
//! use async_runtime::{Handler, Promise, PromiseState, Scheduler};
//! use core_types::Value;
//!
//! let scheduler = Scheduler::new();
//! let recovered = Promise::reject_in(&scheduler, Value::from("boom"))
//!     .then(Some(Handler::new(|_| Ok(Value::from("skipped")))), None)
//!     .catch(|reason| Ok(Value::from(format!("recovered from {}", reason))));
//!
//! scheduler.run_microtasks().unwrap();
//! assert_eq!(
//!     recovered.state(),
//!     PromiseState::Fulfilled(Value::from("recovered from boom"))
//! );
//! ```
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{EventLoop, Task};
//!
//! let mut event_loop = EventLoop::new();
//! event_loop.enqueue_task(Task::new(|| Ok(())));
//! event_loop.run_until_done().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod rejection;
pub mod resolvers;
pub mod scheduler;
pub mod task_queue;

// Re-export main types at crate root
pub use combinators::{
    all, all_in, all_settled, all_settled_in, any, any_in, race, race_in, SettledOutcome,
};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use event_loop::{EventLoop, TaskSpawner};
pub use promise::{Handler, HandlerResult, Promise, PromiseId, PromiseState};
pub use rejection::UnhandledRejection;
pub use resolvers::Resolvers;
pub use scheduler::{DrainReport, Scheduler};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};

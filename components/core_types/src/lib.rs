//! Core value types shared by deferred-value producers and consumers.
//!
//! This crate provides the payload vocabulary of the async runtime: the
//! values promises are settled with, the error values used as rejection
//! reasons, and the capability trait that lets a value be adopted by a
//! promise.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of settled payloads
//! - [`JsError`] - Error values, including aggregate errors
//! - [`ErrorKind`] - Types of errors
//! - [`Thenable`] - Register-continuation capability
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let reason: Value = JsError::new(ErrorKind::TypeError, "not a function").into();
//! assert_eq!(reason.to_string(), "TypeError: not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod thenable;
mod value;

pub use error::{ErrorKind, JsError};
pub use thenable::{SettleFn, Thenable};
pub use value::Value;

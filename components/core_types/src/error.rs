//! JavaScript error types used as rejection reasons.
//!
//! This module provides error values that correspond to JavaScript's built-in
//! error types. Errors travel through the runtime as ordinary [`Value`]s, so a
//! rejection reason may be a `JsError` or any other payload.

use crate::Value;
use std::fmt;
use thiserror::Error;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic `Error`
    Error,
    /// Type error (e.g., a promise resolved with itself)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Several rejection reasons bundled into one error
    AggregateError,
    /// Internal engine error (e.g., a handler panicked)
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// A JavaScript error with a message and, for aggregate errors, the
/// individual reasons it bundles.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError, Value};
///
/// let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
///
/// let aggregate = JsError::aggregate(vec![Value::Smi(1), Value::Smi(2)]);
/// assert_eq!(aggregate.errors.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Inner reasons, in input order (only populated for `AggregateError`)
    pub errors: Vec<Value>,
}

impl JsError {
    /// Creates an error of the given kind with no inner reasons.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates an `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Creates an `AggregateError` carrying `errors` in the order given.
    pub fn aggregate(errors: Vec<Value>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: "All promises were rejected".to_string(),
            errors,
        }
    }

    /// Returns true if this is an `AggregateError`.
    pub fn is_aggregate(&self) -> bool {
        self.kind == ErrorKind::AggregateError
    }
}

impl From<JsError> for Value {
    fn from(error: JsError) -> Self {
        Value::Error(error)
    }
}

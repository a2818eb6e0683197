//! The register-continuation capability shared by deferred values.
//!
//! Any type that can deliver an eventual result to a pair of callbacks can
//! implement [`Thenable`] and be stored in a [`Value`]. A promise resolved
//! with such a value adopts its outcome instead of wrapping it.

use crate::Value;
use std::any::Any;

/// Callback receiving a settled value or reason.
pub type SettleFn = Box<dyn FnOnce(Value)>;

/// A value exposing a `then`-shaped capability.
///
/// Implementors must eventually call at most one of the two callbacks, at
/// most once. Returning `Err` from [`Thenable::subscribe`] reports that the
/// subscription itself failed; the adopting promise is rejected with it.
///
/// # Examples
///
/// ```
/// use core_types::{SettleFn, Thenable, Value};
/// use std::any::Any;
/// use std::rc::Rc;
///
/// /// A thenable that is always fulfilled with the same value.
/// struct Ready(Value);
///
/// impl Thenable for Ready {
///     fn subscribe(&self, on_fulfilled: SettleFn, _on_rejected: SettleFn) -> Result<(), Value> {
///         on_fulfilled(self.0.clone());
///         Ok(())
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let value = Value::Thenable(Rc::new(Ready(Value::Smi(1))));
/// assert!(value.is_thenable());
/// ```
pub trait Thenable: 'static {
    /// Registers callbacks for the eventual outcome.
    fn subscribe(&self, on_fulfilled: SettleFn, on_rejected: SettleFn) -> Result<(), Value>;

    /// Returns `self` as `Any` so callers can recognise concrete types.
    fn as_any(&self) -> &dyn Any;
}

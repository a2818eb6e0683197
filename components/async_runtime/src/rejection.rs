//! Unhandled rejection tracking.
//!
//! A promise that rejects before any continuation is registered on it is
//! recorded here. Registering a continuation later withdraws the record, so
//! whatever is left when the host inspects the tracker (normally right after
//! a microtask checkpoint) was never handled.

use crate::promise::PromiseId;
use core_types::Value;

/// A rejection that had no handler when the host last looked.
#[derive(Debug, Clone, PartialEq)]
pub struct UnhandledRejection {
    /// The rejected promise
    pub promise: PromiseId,
    /// Its rejection reason
    pub reason: Value,
}

/// Pending unhandled rejections, in rejection order.
#[derive(Debug, Default)]
pub(crate) struct RejectionTracker {
    pending: Vec<UnhandledRejection>,
}

impl RejectionTracker {
    pub(crate) fn rejected(&mut self, promise: PromiseId, reason: Value) {
        self.pending.push(UnhandledRejection { promise, reason });
    }

    /// Withdraws the record for `promise`. Returns true if one existed.
    pub(crate) fn handled(&mut self, promise: PromiseId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|r| r.promise != promise);
        self.pending.len() != before
    }

    pub(crate) fn take(&mut self) -> Vec<UnhandledRejection> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

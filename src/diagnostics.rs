//! The bridge's diagnostic channel for integrity errors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::IntegrityPolicy;
use crate::error::IntegrityError;

/// Logs integrity errors, keeps the most recent ones, and applies the
/// configured [`IntegrityPolicy`].
#[derive(Debug)]
pub struct Diagnostics {
    policy: IntegrityPolicy,
    capacity: usize,
    journal: Mutex<VecDeque<IntegrityError>>,
    total: AtomicUsize,
}

impl Diagnostics {
    pub fn new(policy: IntegrityPolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity,
            journal: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            total: AtomicUsize::new(0),
        }
    }

    /// Report an integrity error. Under [`IntegrityPolicy::Abort`] this does
    /// not return.
    pub fn report(&self, error: IntegrityError) {
        tracing::error!(handle = ?error.handle(), "integrity error: {error}");
        self.total.fetch_add(1, Ordering::Relaxed);
        {
            let mut journal = self.journal.lock();
            if self.capacity > 0 {
                if journal.len() == self.capacity {
                    journal.pop_front();
                }
                journal.push_back(error);
            }
        }
        if self.policy == IntegrityPolicy::Abort {
            std::process::abort();
        }
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    /// Errors reported since creation, including ones evicted from the journal.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// The most recent errors, oldest first.
    pub fn recent(&self) -> Vec<IntegrityError> {
        self.journal.lock().iter().cloned().collect()
    }

    /// Drain the journal.
    pub fn take(&self) -> Vec<IntegrityError> {
        self.journal.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_core::NativeHandle;

    fn unknown(addr: usize) -> IntegrityError {
        IntegrityError::UnknownHandle {
            handle: NativeHandle::from_addr(addr).unwrap(),
        }
    }

    #[test]
    fn journal_is_bounded() {
        let diagnostics = Diagnostics::new(IntegrityPolicy::Report, 2);
        diagnostics.report(unknown(1));
        diagnostics.report(unknown(2));
        diagnostics.report(unknown(3));
        assert_eq!(diagnostics.total(), 3);
        assert_eq!(diagnostics.recent(), vec![unknown(2), unknown(3)]);
        assert_eq!(diagnostics.take().len(), 2);
        assert!(diagnostics.recent().is_empty());
    }
}

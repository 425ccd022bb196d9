//! Run-time plumbing shared by parsers and generators: cancellation,
//! event delivery and the three-way run outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::log::LogRecord;

/// Shared interruption flag.
///
/// Clones refer to the same flag, so a handle can be given to another thread
/// (or a UI callback) while a parse or generation runs. Runs check it once per
/// input line or once per curve.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the "not interrupted" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests interruption of the run observing this token.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clears a previous interruption request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Caller-supplied sink for run events, invoked synchronously.
///
/// Every method has a no-op default so sinks only implement what they need.
pub trait Observer {
    /// A log record was produced.
    fn log(&mut self, _record: LogRecord) {}

    /// A named operation started; progress that follows belongs to it.
    fn started(&mut self, _operation: &str) {}

    /// Progress of the current operation. `done` never decreases within an
    /// operation and the last report has `done == total`.
    fn progress(&mut self, _done: u64, _total: u64) {}

    /// The run finished successfully.
    fn finished(&mut self) {}
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The run went through the whole input.
    Completed(T),
    /// The run stopped early because its [`CancelToken`] was set.
    Interrupted,
}

impl<T> Outcome<T> {
    /// Whether the run was interrupted.
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// The completed value, `None` when interrupted.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Interrupted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_interrupted());
        handle.interrupt();
        assert!(token.is_interrupted());
        token.reset();
        assert!(!handle.is_interrupted());
    }

    #[test]
    fn outcome_accessors() {
        assert_eq!(Outcome::Completed(3).completed(), Some(3));
        assert!(Outcome::<()>::Interrupted.is_interrupted());
        assert_eq!(Outcome::<u8>::Interrupted.completed(), None);
    }
}

use std::fmt::{self, Debug, Formatter};
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::CallbackFailure;

/// Receives every death-callback failure, as it happens
pub type FailureReporter = Arc<dyn Fn(&CallbackFailure) + Send + Sync>;

/// Tuning for a `WeakContext`. Swap it at any time with `WeakContext::configure`.
#[derive(Clone)]
pub struct Config {
    turn_budget: Option<NonZeroUsize>,
    failure_reporter: FailureReporter,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `budget` deaths per `run_finalizers` call. The rest stay queued for the next
    /// call. `None` means drain the queue completely.
    #[must_use]
    pub fn turn_budget(mut self, budget: Option<NonZeroUsize>) -> Self {
        self.turn_budget = budget;
        self
    }

    /// Replace the default reporter (which logs at error level). A reporter that panics is
    /// logged and otherwise ignored.
    #[must_use]
    pub fn failure_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&CallbackFailure) + Send + Sync + 'static,
    {
        self.failure_reporter = Arc::new(reporter);
        self
    }

    #[must_use]
    pub fn get_turn_budget(&self) -> Option<NonZeroUsize> {
        self.turn_budget
    }

    /// Hand `failure` to the reporter. A panicking reporter must not cut the delivery short, so
    /// its panic is caught and logged.
    pub(crate) fn report(&self, failure: &CallbackFailure) {
        if catch_unwind(AssertUnwindSafe(|| (self.failure_reporter)(failure))).is_err() {
            error!("Failure reporter panicked while reporting: {}", failure);
        }
    }
}

fn log_failure(failure: &CallbackFailure) {
    error!("{}", failure);
}

impl Default for Config {
    fn default() -> Self {
        Self {
            turn_budget: None,
            failure_reporter: Arc::new(log_failure),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("turn_budget", &self.turn_budget)
            .field("failure_reporter", &"<SNIP>")
            .finish()
    }
}

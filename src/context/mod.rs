mod config;
mod notifier;
mod registry;

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::context::notifier::{Message, Notifier};
use crate::context::registry::Registry;
use crate::error::{CallbackFailure, WeakError};
use crate::finalize::{Finalization, ReclaimHooks};
use crate::handle::{Callback, WeakRef};
use crate::object::Obj;
use crate::value::Value;

pub use config::{Config, FailureReporter};

/// Owns the bookkeeping for a set of weak references: which targets they observe, and the queue of
/// deaths waiting to be delivered.
///
/// Create one per host (or per test) and share it by reference. Deaths reported by the
/// finalization capability only queue up; they are delivered, and callbacks run, when the owner
/// calls `run_finalizers`.
///
/// Dropping a context abandons its pending deaths. Weak references created from it keep working
/// as weak references, but their callbacks will never run.
pub struct WeakContext {
    registry: Registry,
    notifier: Notifier,
    finalization: Arc<dyn Finalization>,
    config: ArcSwap<Config>,
    // Held for the whole of a delivery turn
    turn_lock: Mutex<()>,
}

/// What one `run_finalizers` call delivered
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotificationReport {
    /// Reclaimed targets whose deaths were delivered
    pub targets: usize,
    /// Weak references marked dead
    pub handles: usize,
    /// Callbacks invoked, including the ones that failed
    pub callbacks_run: usize,
    pub failures: Vec<CallbackFailure>,
}

impl NotificationReport {
    /// Did this turn deliver nothing at all?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets == 0
    }
}

impl WeakContext {
    /// A context over reference counted objects, with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_finalization(ReclaimHooks, config)
    }

    /// A context that learns about deaths from a custom finalization capability
    pub fn with_finalization<F>(finalization: F, config: Config) -> Self
    where
        F: Finalization + 'static,
    {
        Self {
            registry: Registry::default(),
            notifier: Notifier::new(),
            finalization: Arc::new(finalization),
            config: ArcSwap::from_pointee(config),
            turn_lock: Mutex::new(()),
        }
    }

    /// Create a weak reference to `target`, optionally with a first death callback.
    ///
    /// Given a weak reference, the new reference observes that reference's target.
    ///
    /// # Errors
    /// `InvalidArgument` if `target` is a primitive, or a weak reference whose target is gone.
    pub fn create(
        &self,
        target: &Value,
        callback: Option<Callback>,
    ) -> Result<WeakRef, WeakError> {
        let obj = match target {
            Value::Object(o) => o.clone(),
            Value::Weak(w) => w.target().ok_or_else(|| {
                WeakError::InvalidArgument(
                    "target should be an object, got a dead weak reference".to_string(),
                )
            })?,
            other => {
                return Err(WeakError::InvalidArgument(format!(
                    "target should be an object, got {}",
                    other.type_name()
                )))
            }
        };

        let handle = self.weaken(&obj);
        if let Some(callback) = callback {
            handle.add_callback(callback);
        }
        Ok(handle)
    }

    /// Create a weak reference to `target`
    pub fn weaken(&self, target: &Obj) -> WeakRef {
        let handle = WeakRef::new(target);
        let target_id = target.id();

        self.registry
            .insert(target_id, handle.info().clone(), || {
                self.finalization
                    .register(target, self.notifier.hook_for(target_id));
            });

        trace!("Created {} observing {}", handle.id(), target_id);
        handle
    }

    /// Deliver queued deaths: mark every weak reference of each reclaimed target dead and run its
    /// callbacks, in order.
    ///
    /// This is the only place callbacks run. A failing callback is reported (to the configured
    /// reporter, and in the returned report) and delivery carries on. Deaths caused by callbacks
    /// are delivered in the same call, budget permitting. Calling this from inside a callback does
    /// nothing.
    pub fn run_finalizers(&self) -> NotificationReport {
        let mut report = NotificationReport::default();
        let _turn = match self.turn_lock.try_lock() {
            Some(guard) => guard,
            None => {
                trace!("Ignoring re-entrant run_finalizers");
                return report;
            }
        };

        let config = self.config.load_full();
        let report_failure = |failure: &CallbackFailure| config.report(failure);

        trace!("Beginning notification turn");
        while config
            .get_turn_budget()
            .map_or(true, |budget| report.targets < budget.get())
        {
            let target_id = match self.notifier.try_next() {
                Some(Message::Reclaimed(id)) => id,
                None => break,
            };

            let handles = self.registry.take(target_id);
            trace!(
                "Delivering death of {} to {} weak reference(s)",
                target_id,
                handles.len()
            );
            report.targets += 1;

            for info in handles {
                let delivery = WeakRef::from_info(info).deliver_death(&report_failure);
                report.handles += 1;
                report.callbacks_run += delivery.callbacks_run;
                report.failures.extend(delivery.failures);
            }
        }
        trace!("Notification turn finished");

        report
    }

    /// Deaths reported but not yet delivered
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.notifier.pending()
    }

    /// Targets with at least one weak reference waiting on them
    #[must_use]
    pub fn tracked_target_count(&self) -> usize {
        self.registry.target_count()
    }

    /// Weak references waiting on a target
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.registry.handle_count()
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    /// Replace the configuration. Takes effect from the next `run_finalizers` call.
    pub fn configure(&self, config: Config) {
        self.config.store(Arc::new(config));
    }
}

impl Default for WeakContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for WeakContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContext")
            .field("tracked_targets", &self.tracked_target_count())
            .field("handles", &self.handle_count())
            .field("pending", &self.pending_notifications())
            .field("config", &*self.config.load_full())
            .finish()
    }
}

/// The context behind the crate-level functions (`weakref::create` and friends)
pub(crate) static DEFAULT_CONTEXT: Lazy<WeakContext> = Lazy::new(WeakContext::new);

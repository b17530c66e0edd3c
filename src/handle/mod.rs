mod callback;
mod forward;

use std::fmt::{self, Debug, Display, Formatter};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::CallbackFailure;
use crate::object::{Obj, ObjectId, WeakObj};
use crate::value::Value;

pub use callback::{Callback, CallbackResult};

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a weak reference
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl Display for HandleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "weak#{}", self.0)
    }
}

/// A weak reference to a host object, with death callbacks.
///
/// A `WeakRef` does not keep its target alive. While the target lives, every `ObjectProtocol`
/// operation on the `WeakRef` is forwarded to it. Once the target has been reclaimed the
/// reference is dead for good: reads give `Undefined`, writes and deletes quietly do nothing, and
/// key listings are empty.
///
/// When the death is delivered (see `WeakContext::run_finalizers`) every callback registered by
/// then runs exactly once, in registration order.
///
/// Cloning a `WeakRef` gives another pointer to the same reference (same callbacks, same
/// identity). Use `WeakContext::create` again for an independent one.
#[derive(Clone)]
pub struct WeakRef {
    info: Arc<HandleInfo>,
}

/// The shared record behind a `WeakRef`. The context's registry holds these too, so callbacks
/// still fire after every `WeakRef` clone has been dropped.
pub(crate) struct HandleInfo {
    unique_id: HandleId,
    target_id: ObjectId,
    state: Mutex<HandleState>,
}

struct HandleState {
    /// `None` once the target is known to be gone. Never becomes `Some` again.
    target: Option<WeakObj>,
    callbacks: Vec<Callback>,
    /// Has the death been delivered to this reference?
    notified: bool,
    /// Tracked separately from the target so "not extensible" survives the target's death
    extensible: bool,
}

/// What happened when a death was delivered to one weak reference
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    pub(crate) callbacks_run: usize,
    pub(crate) failures: Vec<CallbackFailure>,
}

impl WeakRef {
    pub(crate) fn new(target: &Obj) -> Self {
        Self {
            info: Arc::new(HandleInfo {
                unique_id: HandleId(HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed)),
                target_id: target.id(),
                state: Mutex::new(HandleState {
                    target: Some(target.downgrade()),
                    callbacks: Vec::new(),
                    notified: false,
                    extensible: true,
                }),
            }),
        }
    }

    pub(crate) fn from_info(info: Arc<HandleInfo>) -> Self {
        Self { info }
    }

    pub(crate) fn info(&self) -> &Arc<HandleInfo> {
        &self.info
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.info.unique_id
    }

    /// Identity of the object this reference was created for (alive or not)
    #[must_use]
    pub fn target_id(&self) -> ObjectId {
        self.info.target_id
    }

    /// A strong handle to the target, if it is still alive.
    ///
    /// Holding the returned `Obj` keeps the target alive, like any other `Obj`.
    #[must_use]
    pub fn target(&self) -> Option<Obj> {
        let mut state = self.info.state.lock();
        let target = state.target.as_ref().and_then(WeakObj::upgrade);
        if target.is_none() {
            state.target = None;
        }
        target
    }

    /// The target as a value: `Value::Object` while alive, `Value::Undefined` after
    #[must_use]
    pub fn target_value(&self) -> Value {
        self.target().map_or(Value::Undefined, Value::Object)
    }

    /// Has the target been reclaimed? Once this returns `true` it always will.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.target().is_none()
    }

    /// Has the death already been delivered (and the callbacks run)?
    #[must_use]
    pub fn is_notified(&self) -> bool {
        self.info.state.lock().notified
    }

    /// A snapshot of the registered callbacks, in the order they will run
    #[must_use]
    pub fn callbacks(&self) -> Vec<Callback> {
        self.info.state.lock().callbacks.clone()
    }

    /// Register another death callback. The same callback may be added more than once, and then
    /// runs once per registration.
    ///
    /// After the death has been delivered there is nothing left to wait for, so the callback is
    /// discarded.
    pub fn add_callback(&self, callback: Callback) {
        let mut state = self.info.state.lock();
        if state.notified {
            debug!(
                "Discarding callback added to {} after its death was delivered",
                self.info.unique_id
            );
            return;
        }
        state.callbacks.push(callback);
    }

    /// Unregister the earliest registration of `callback`. Returns whether there was one.
    pub fn remove_callback(&self, callback: &Callback) -> bool {
        let mut state = self.info.state.lock();
        match state.callbacks.iter().position(|c| c.ptr_eq(callback)) {
            Some(i) => {
                state.callbacks.remove(i);
                true
            }
            None => false,
        }
    }

    /// Unregister every callback
    pub fn remove_callbacks(&self) {
        self.info.state.lock().callbacks.clear();
    }

    /// Are these two pointers to the same weak reference?
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.info, &other.info)
    }

    /// Mark the reference dead and run its callbacks. Only the first call does anything.
    pub(crate) fn deliver_death(&self, report: &dyn Fn(&CallbackFailure)) -> Delivery {
        let callbacks = {
            let mut state = self.info.state.lock();
            if state.notified {
                return Delivery::default();
            }
            state.notified = true;
            state.target = None;
            mem::take(&mut state.callbacks)
        };

        // No lock held from here on, so callbacks may use this reference freely
        let mut delivery = Delivery::default();
        for (index, callback) in callbacks.iter().enumerate() {
            delivery.callbacks_run += 1;
            if let Err(message) = callback.invoke(self) {
                let failure = CallbackFailure {
                    handle: self.info.unique_id,
                    index,
                    message,
                };
                report(&failure);
                delivery.failures.push(failure);
            }
        }
        delivery
    }
}

impl Debug for WeakRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("id", &self.info.unique_id)
            .field("target", &self.info.target_id)
            .field("dead", &self.is_dead())
            .finish()
    }
}

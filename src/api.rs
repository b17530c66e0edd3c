//! The dynamic, module-level interface, as a script would see it.
//!
//! Everything here takes and returns `Value`s and works against the process-wide default context.
//! Handle operations check at runtime that they were given a weak reference.

use crate::context::{NotificationReport, WeakContext, DEFAULT_CONTEXT};
use crate::error::WeakError;
use crate::handle::{Callback, WeakRef};
use crate::value::Value;

/// The context used by the functions in this module
#[must_use]
pub fn default_context() -> &'static WeakContext {
    &DEFAULT_CONTEXT
}

fn as_weak_ref(value: &Value) -> Result<&WeakRef, WeakError> {
    value.as_weak().ok_or(WeakError::TypeMismatch {
        found: value.type_name(),
    })
}

/// Create a weak reference to `target` in the default context, optionally with a death callback
///
/// # Example
/// ```
/// use weakref::{Callback, Obj, Value};
///
/// let target = Obj::new();
/// let weak = weakref::create(&Value::from(target.clone()), Some(Callback::new(|_| {}))).unwrap();
/// assert!(weakref::is_weak_ref(&weak));
/// assert!(!weakref::is_dead(&weak).unwrap());
///
/// drop(target);
/// weakref::run_finalizers();
/// assert!(weakref::is_dead(&weak).unwrap());
/// ```
///
/// # Errors
/// `InvalidArgument` if `target` is not an object (or is a weak reference whose target is gone).
pub fn create(target: &Value, callback: Option<Callback>) -> Result<Value, WeakError> {
    DEFAULT_CONTEXT.create(target, callback).map(Value::Weak)
}

/// The older name for `create`
///
/// # Errors
/// Same as `create`.
pub fn weaken(target: &Value, callback: Option<Callback>) -> Result<Value, WeakError> {
    create(target, callback)
}

/// The target of a weak reference, or `Undefined` once it has been reclaimed
///
/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn get(handle: &Value) -> Result<Value, WeakError> {
    as_weak_ref(handle).map(WeakRef::target_value)
}

/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn is_dead(handle: &Value) -> Result<bool, WeakError> {
    as_weak_ref(handle).map(WeakRef::is_dead)
}

/// Was `value` made by `create`?
#[must_use]
pub fn is_weak_ref(value: &Value) -> bool {
    value.as_weak().is_some()
}

/// Always `false`. Kept so callers of the old interface keep working.
#[must_use]
pub fn is_near_death(_value: &Value) -> bool {
    false
}

/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn callbacks(handle: &Value) -> Result<Vec<Callback>, WeakError> {
    as_weak_ref(handle).map(WeakRef::callbacks)
}

/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn add_callback(handle: &Value, callback: Callback) -> Result<(), WeakError> {
    as_weak_ref(handle)?.add_callback(callback);
    Ok(())
}

/// Remove the earliest registration of `callback`, if there is one
///
/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn remove_callback(handle: &Value, callback: &Callback) -> Result<(), WeakError> {
    as_weak_ref(handle)?.remove_callback(callback);
    Ok(())
}

/// # Errors
/// `TypeMismatch` if `handle` is not a weak reference.
pub fn remove_callbacks(handle: &Value) -> Result<(), WeakError> {
    as_weak_ref(handle)?.remove_callbacks();
    Ok(())
}

/// Deliver the default context's queued deaths (see `WeakContext::run_finalizers`)
#[allow(clippy::must_use_candidate)]
pub fn run_finalizers() -> NotificationReport {
    DEFAULT_CONTEXT.run_finalizers()
}

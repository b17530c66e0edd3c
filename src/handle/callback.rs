use std::any::Any;
use std::error::Error;
use std::fmt::{self, Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::handle::WeakRef;

/// What a death callback returns. An `Err` is reported, but never stops other callbacks.
pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;

type CallbackFn = dyn Fn(&WeakRef) -> CallbackResult + Send + Sync;

/// A death callback.
///
/// Callbacks are compared by identity: clones of one `Callback` are equal, two separately built
/// callbacks never are (even from the same closure). That identity is what `remove_callback` goes
/// by.
///
/// The callback receives the weak reference it was registered on. By the time it runs that
/// reference is already dead, so `target_value` returns `Undefined`.
#[derive(Clone)]
pub struct Callback {
    f: Arc<CallbackFn>,
}

impl Callback {
    /// A callback that cannot fail (other than by panicking)
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&WeakRef) + Send + Sync + 'static,
    {
        Self::fallible(move |handle| {
            f(handle);
            Ok(())
        })
    }

    /// A callback that may report an error
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&WeakRef) -> CallbackResult + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        // Compare data pointers only; vtable pointers are not guaranteed unique
        Arc::as_ptr(&self.f).cast::<u8>() == Arc::as_ptr(&other.f).cast::<u8>()
    }

    /// Run the callback, turning both errors and panics into a message
    pub(crate) fn invoke(&self, handle: &WeakRef) -> Result<(), String> {
        match catch_unwind(AssertUnwindSafe(|| (self.f)(handle))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Callback {}

impl Debug for Callback {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.f).cast::<u8>())
            .finish()
    }
}

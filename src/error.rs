use thiserror::Error;

use crate::handle::HandleId;

/// Everything that can go wrong when working with weak references
#[derive(Clone, Debug, Error)]
pub enum WeakError {
    /// Only object-like values can be observed by a weak reference
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A weak-reference operation was handed something that is not a weak reference
    #[error("expected a weak reference, found {found}")]
    TypeMismatch { found: &'static str },
    /// The target is gone, and this operation cannot pretend to succeed on nothing
    #[error("cannot {operation} through a weak reference whose target was reclaimed")]
    VoidTargetMutation { operation: &'static str },
    /// The (live) target said no
    #[error("target refused {operation}")]
    Refused { operation: &'static str },
    /// A death callback failed while a death was being delivered
    #[error(transparent)]
    CallbackFailure(#[from] CallbackFailure),
}

/// A death callback that returned an error or panicked.
///
/// These are never returned from the operation a caller invoked. They show up in
/// `NotificationReport::failures` and are handed to the configured failure reporter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("death callback #{index} of weak reference {handle} failed: {message}")]
pub struct CallbackFailure {
    /// The weak reference whose callback failed
    pub handle: HandleId,
    /// Position of the callback in the handle's list at the time of delivery
    pub index: usize,
    /// The error message, or the panic payload when it was a string
    pub message: String,
}

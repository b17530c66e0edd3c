//! # weakref
//!
//! `weakref` gives a scripting object model weak references with death callbacks: hold on to an
//! object without keeping it alive, and find out (exactly once) when it is reclaimed.
//!
//! A `WeakRef` is transparent while its target lives. Every structural operation of
//! `ObjectProtocol` is forwarded to the target, so code holding the weak reference works as if it
//! held the object. Once the target is gone the weak reference turns into an inert empty object.
//! Reads give `Undefined`, writes and deletes do nothing, and there are no keys.
//!
//! `weakref` has the following features:
//! - callbacks: any number per weak reference, run in registration order, exactly once
//! - independent references: several weak references to one object each get their own callbacks
//! - isolated failures: a callback that errors or panics is reported, and everything else still runs
//! - one delivery point: deaths may be noticed on any thread, but callbacks only run in
//!   `WeakContext::run_finalizers`
//! - pluggable finalization: reference counting by default, or bring your own `Finalization`
//!
//! `weakref` has the following limitations:
//! - no cycle collection: objects kept alive by a strong cycle of `Obj`s are never reclaimed
//! - data properties only: the host object model has no accessors and no callable objects
//!
//! # Example
//! ```
//! use weakref::{Callback, Obj, ObjectProtocol, PropertyKey, Value, WeakContext};
//!
//! let ctx = WeakContext::new();
//! let target = Obj::from_properties(vec![("a", 1)]);
//! let weak = ctx.weaken(&target);
//! weak.add_callback(Callback::new(|_| println!("gone!")));
//!
//! assert_eq!(weak.get(PropertyKey::from("a")), Value::from(1));
//!
//! drop(target);
//! assert_eq!(ctx.run_finalizers().callbacks_run, 1);
//! assert!(weak.is_dead());
//! assert_eq!(weak.get(PropertyKey::from("a")), Value::Undefined);
//! ```

// We love docs here
// #![deny(missing_docs)]
// Clippy configuration:
// I'd like the most pedantic warning level
#![warn(
    clippy::cargo,
    clippy::needless_borrow,
    clippy::pedantic,
    clippy::redundant_clone
)]
// But I don't care about these ones
#![allow(
    clippy::module_name_repetitions, // Sometimes clear naming calls for repetition
    clippy::multiple_crate_versions  // There is no way to easily fix this without modifying our dependencies
)]

#[macro_use]
extern crate log;

mod api;
mod context;
mod error;
mod finalize;
mod handle;
mod object;
mod protocol;
mod value;

pub use api::{
    add_callback, callbacks, create, default_context, get, is_dead, is_near_death, is_weak_ref,
    remove_callback, remove_callbacks, run_finalizers, weaken,
};
pub use context::{Config, FailureReporter, NotificationReport, WeakContext};
pub use error::{CallbackFailure, WeakError};
pub use finalize::{Finalization, FinalizeHook, ReclaimHooks};
pub use handle::{Callback, CallbackResult, HandleId, WeakRef};
pub use object::{Obj, ObjectId, ObjectKind, PropertyDescriptor};
pub use protocol::ObjectProtocol;
pub use value::{PropertyKey, Symbol, Value};

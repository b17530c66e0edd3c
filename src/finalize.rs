use crate::object::Obj;

/// A one-shot notification that some object was reclaimed.
///
/// The hook is deliberately opaque: it gets no access to the reclaimed object, so it cannot
/// revive it or read its contents.
pub type FinalizeHook = Box<dyn FnOnce() + Send + 'static>;

/// The memory manager's finalization capability: "tell me when this object is gone."
///
/// `WeakContext` relies on it to learn when a target dies. Implementations promise that:
///
/// 1) Each registered hook runs at most once.
///
/// 2) A hook never runs while its target is still reachable. (It may run arbitrarily later than
/// the moment the target became unreachable, or from another thread.)
///
/// The hook itself does nothing more than post a message, so it is fine to call it from a
/// destructor, a collector thread, or anywhere else.
pub trait Finalization: Send + Sync {
    /// Arrange for `hook` to run once `target` has been reclaimed
    fn register(&self, target: &Obj, hook: FinalizeHook);
}

/// Finalization for reference counted objects: hooks run from the object's destructor, when the
/// last `Obj` handle is dropped.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReclaimHooks;

impl Finalization for ReclaimHooks {
    fn register(&self, target: &Obj, hook: FinalizeHook) {
        target.attach_reclaim_hook(hook);
    }
}

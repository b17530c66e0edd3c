use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handle::HandleInfo;
use crate::object::ObjectId;

/// Which weak references are waiting on which targets.
///
/// Keyed by target identity only, so the registry never keeps a target alive. It does keep the
/// handle records alive: a weak reference nobody holds anymore still gets its callbacks run.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<ObjectId, Vec<Arc<HandleInfo>>>>,
}

impl Registry {
    /// Record `handle` as observing `target`.
    ///
    /// `on_first_handle` runs (under the registry lock) when this is the first handle for the
    /// target, which is when a finalization hook needs registering.
    pub(crate) fn insert<F: FnOnce()>(
        &self,
        target: ObjectId,
        handle: Arc<HandleInfo>,
        on_first_handle: F,
    ) {
        let mut entries = self.entries.lock();
        match entries.entry(target) {
            Entry::Vacant(v) => {
                on_first_handle();
                v.insert(vec![handle]);
            }
            Entry::Occupied(mut o) => o.get_mut().push(handle),
        }
    }

    /// Remove and return every handle observing `target`, in creation order.
    ///
    /// A target's handles can only be taken once, however many deaths get reported for it.
    pub(crate) fn take(&self, target: ObjectId) -> Vec<Arc<HandleInfo>> {
        self.entries.lock().remove(&target).unwrap_or_default()
    }

    pub(crate) fn target_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn handle_count(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }
}

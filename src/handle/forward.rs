use crate::error::WeakError;
use crate::handle::WeakRef;
use crate::object::{Obj, PropertyDescriptor};
use crate::protocol::ObjectProtocol;
use crate::value::{PropertyKey, Value};

// Every operation takes one strong handle to the target up front and works on that. The target
// therefore cannot die halfway through an operation: each one sees either a live target or none.
impl ObjectProtocol for WeakRef {
    fn get(&self, key: PropertyKey) -> Value {
        self.target().map_or(Value::Undefined, |t| t.get(key))
    }

    fn set(&self, key: PropertyKey, value: Value) -> bool {
        if let Some(t) = self.target() {
            t.set(key, value);
        }
        true
    }

    fn delete(&self, key: PropertyKey) -> bool {
        if let Some(t) = self.target() {
            t.delete(key);
        }
        true
    }

    fn has(&self, key: PropertyKey) -> bool {
        self.target().map_or(false, |t| t.has(key))
    }

    fn own_keys(&self) -> Vec<PropertyKey> {
        self.target().map_or_else(Vec::new, |t| t.own_keys())
    }

    fn get_own_property(&self, key: PropertyKey) -> Option<PropertyDescriptor> {
        self.target().and_then(|t| t.get_own_property(key))
    }

    fn define_property(
        &self,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<(), WeakError> {
        match self.target() {
            Some(t) => t.define_property(key, desc),
            None => Err(WeakError::VoidTargetMutation {
                operation: "defineProperty",
            }),
        }
    }

    fn get_prototype_of(&self) -> Option<Obj> {
        self.target().and_then(|t| t.get_prototype_of())
    }

    fn set_prototype_of(&self, prototype: Option<Obj>) -> Result<(), WeakError> {
        match self.target() {
            Some(t) => t.set_prototype_of(prototype),
            None => Err(WeakError::VoidTargetMutation {
                operation: "setPrototypeOf",
            }),
        }
    }

    fn is_extensible(&self) -> bool {
        let target = self.target();
        let mut state = self.info.state.lock();
        // Once we've answered "no" we must never answer "yes" again, dead or alive
        if state.extensible && target.map_or(false, |t| !t.is_extensible()) {
            state.extensible = false;
        }
        state.extensible
    }

    fn prevent_extensions(&self) -> bool {
        if let Some(t) = self.target() {
            t.prevent_extensions();
        }
        self.info.state.lock().extensible = false;
        true
    }

    // The provided helpers make several protocol calls in a row, so they go to the target as a
    // whole instead of upgrading once per call

    fn keys(&self) -> Vec<PropertyKey> {
        self.target().map_or_else(Vec::new, |t| t.keys())
    }

    fn length(&self) -> u32 {
        self.target().map_or(0, |t| t.length())
    }

    fn get_index(&self, index: u32) -> Value {
        self.target().map_or(Value::Undefined, |t| t.get_index(index))
    }

    /// Appends to the target. A dead reference has nothing to append to, and reports length 0.
    fn push(&self, value: Value) -> u32 {
        self.target().map_or(0, |t| t.push(value))
    }
}

use crate::error::WeakError;
use crate::object::{Obj, PropertyDescriptor};
use crate::value::{PropertyKey, Value};

/// The structural operations of a script object.
///
/// `Obj` implements these directly. `WeakRef` implements them by forwarding to its target while
/// the target is alive, and by acting like an empty object once it has been reclaimed. Code
/// written against this trait cannot tell the two apart, except for what happens after death.
pub trait ObjectProtocol {
    /// Read a property, walking the prototype chain. Missing properties are `Undefined`.
    fn get(&self, key: PropertyKey) -> Value;

    /// Assign a property. Returns `false` if the object refused the write.
    fn set(&self, key: PropertyKey, value: Value) -> bool;

    /// Remove an own property. Returns `false` if the property is non-configurable.
    fn delete(&self, key: PropertyKey) -> bool;

    /// Is this key present on the object or anywhere on its prototype chain?
    fn has(&self, key: PropertyKey) -> bool;

    /// All own keys, enumerable or not: array indices ascending, then other strings in insertion
    /// order, then symbols in insertion order
    fn own_keys(&self) -> Vec<PropertyKey>;

    /// The complete descriptor of an own property
    fn get_own_property(&self, key: PropertyKey) -> Option<PropertyDescriptor>;

    /// Create or redefine an own property from a (possibly partial) descriptor
    ///
    /// # Errors
    /// `Refused` if the object's invariants forbid the definition. Weak references whose target is
    /// gone fail with `VoidTargetMutation`.
    fn define_property(&self, key: PropertyKey, desc: PropertyDescriptor)
        -> Result<(), WeakError>;

    fn get_prototype_of(&self) -> Option<Obj>;

    /// # Errors
    /// `Refused` on non-extensible objects or when it would create a prototype cycle. Weak
    /// references whose target is gone fail with `VoidTargetMutation`.
    fn set_prototype_of(&self, prototype: Option<Obj>) -> Result<(), WeakError>;

    fn is_extensible(&self) -> bool;

    /// Forbid new properties from now on. Always succeeds.
    fn prevent_extensions(&self) -> bool;

    /// Own enumerable string keys, in `own_keys` order
    fn keys(&self) -> Vec<PropertyKey> {
        self.own_keys()
            .into_iter()
            .filter(|k| !k.is_symbol())
            .filter(|k| {
                self.get_own_property(k.clone())
                    .and_then(|desc| desc.enumerable)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The numeric `length` property, or 0 if there isn't a usable one
    fn length(&self) -> u32 {
        match self.get(PropertyKey::from("length")) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Value::Number(n) if n.is_finite() && n >= 0.0 => n.min(f64::from(u32::MAX)) as u32,
            _ => 0,
        }
    }

    fn get_index(&self, index: u32) -> Value {
        self.get(PropertyKey::from(index))
    }

    /// Append `value` at `length` and bump `length`, returning the length afterwards.
    ///
    /// Works on anything with a `length`, and through weak references (where it writes through to
    /// the target). If the object refuses the element, nothing changes and the old length comes
    /// back.
    fn push(&self, value: Value) -> u32 {
        let len = self.length();
        if self.set(PropertyKey::from(len), value) {
            self.set(PropertyKey::from("length"), Value::from(len.saturating_add(1)));
        }
        self.length()
    }
}

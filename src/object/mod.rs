mod property;

use std::fmt::{self, Debug, Display, Formatter};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{self as stdsync, Arc};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::WeakError;
use crate::finalize::FinalizeHook;
use crate::protocol::ObjectProtocol;
use crate::value::{PropertyKey, Value};

pub use property::PropertyDescriptor;
pub(crate) use property::Property;

static OBJECT_COUNTER: AtomicU64 = AtomicU64::new(1);

// Prototype mutation walks other objects' prototype chains; doing all of it under one lock keeps
// two concurrent `set_prototype_of` calls from building a cycle between them
static PROTOTYPE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Process-unique identity of a host object
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Ordinary,
    /// An object with a self-maintaining `length`
    Array,
}

/// A strong, reference counted handle to a host object.
///
/// Cloning is cheap and shares the object. The object is reclaimed when the last `Obj` pointing
/// at it is dropped, and any reclaim hooks attached to it run at that moment. Weak references
/// (`WeakRef`) do not count.
///
/// Strong reference cycles (an object reachable from its own properties or prototype) are never
/// reclaimed.
#[derive(Clone)]
pub struct Obj {
    data: Arc<ObjectData>,
}

pub(crate) struct ObjectData {
    unique_id: ObjectId,
    kind: ObjectKind,
    state: RwLock<ObjectState>,
    reclaim_hooks: Mutex<Vec<FinalizeHook>>,
}

struct ObjectState {
    properties: IndexMap<PropertyKey, Property>,
    prototype: Option<Obj>,
    extensible: bool,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        let hooks = mem::take(self.reclaim_hooks.get_mut());
        for hook in hooks {
            hook();
        }
    }
}

/// A non-owning pointer to a host object
#[derive(Clone)]
pub(crate) struct WeakObj(stdsync::Weak<ObjectData>);

impl WeakObj {
    pub(crate) fn upgrade(&self) -> Option<Obj> {
        self.0.upgrade().map(|data| Obj { data })
    }
}

impl Obj {
    /// A new, empty, extensible ordinary object with no prototype
    #[must_use]
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Ordinary, None, IndexMap::new())
    }

    /// A new, empty ordinary object inheriting from `prototype`
    #[must_use]
    pub fn with_prototype(prototype: Obj) -> Self {
        Self::with_kind(ObjectKind::Ordinary, Some(prototype), IndexMap::new())
    }

    /// A new ordinary object holding the given properties as plain data properties
    pub fn from_properties<K, V, I>(properties: I) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), Property::plain(v.into())))
            .collect();
        Self::with_kind(ObjectKind::Ordinary, None, properties)
    }

    /// A new array holding `elements` at indices `0..elements.len()`
    #[must_use]
    pub fn array(elements: Vec<Value>) -> Self {
        let mut properties = IndexMap::with_capacity(elements.len() + 1);

        #[allow(clippy::cast_precision_loss)]
        let length = Property {
            value: Value::Number(elements.len() as f64),
            writable: true,
            enumerable: false,
            configurable: false,
        };
        properties.insert(PropertyKey::from("length"), length);

        for (i, v) in elements.into_iter().enumerate() {
            properties.insert(PropertyKey::from(i), Property::plain(v));
        }

        Self::with_kind(ObjectKind::Array, None, properties)
    }

    fn with_kind(
        kind: ObjectKind,
        prototype: Option<Obj>,
        properties: IndexMap<PropertyKey, Property>,
    ) -> Self {
        Self {
            data: Arc::new(ObjectData {
                unique_id: ObjectId(OBJECT_COUNTER.fetch_add(1, Ordering::Relaxed)),
                kind,
                state: RwLock::new(ObjectState {
                    properties,
                    prototype,
                    extensible: true,
                }),
                reclaim_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.data.unique_id
    }

    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.data.kind
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.data.kind == ObjectKind::Array
    }

    /// Do these two handles point at the same object?
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// How many `Obj` handles keep this object alive right now
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    pub(crate) fn downgrade(&self) -> WeakObj {
        WeakObj(Arc::downgrade(&self.data))
    }

    /// Run `hook` (once) when this object is reclaimed
    pub(crate) fn attach_reclaim_hook(&self, hook: FinalizeHook) {
        self.data.reclaim_hooks.lock().push(hook);
    }

    /// Find `key` on this object or its prototype chain
    fn find_property(&self, key: &PropertyKey) -> Option<Property> {
        let mut current = self.clone();
        loop {
            let next = {
                let state = current.data.state.read();
                if let Some(p) = state.properties.get(key) {
                    return Some(p.clone());
                }
                state.prototype.clone()
            };
            current = next?;
        }
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("id", &self.data.unique_id)
            .field("kind", &self.data.kind)
            .finish()
    }
}

impl ObjectState {
    fn array_length(&self) -> u32 {
        self.properties
            .get(&PropertyKey::from("length"))
            .and_then(|p| to_array_length(&p.value))
            .unwrap_or(0)
    }

    fn length_writable(&self) -> bool {
        self.properties
            .get(&PropertyKey::from("length"))
            .map_or(false, |p| p.writable)
    }

    /// Grow `length` so `index` is inside the array
    fn cover_index(&mut self, index: u32) {
        if index >= self.array_length() {
            if let Some(length) = self.properties.get_mut(&PropertyKey::from("length")) {
                length.value = Value::from(index.saturating_add(1));
            }
        }
    }

    /// Drop every index at or past `new_length`
    fn truncate(&mut self, new_length: u32) {
        self.properties
            .retain(|k, _| k.as_index().map_or(true, |i| i < new_length));
    }

    fn ordered_keys(&self) -> Vec<PropertyKey> {
        let mut indices = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();

        for key in self.properties.keys() {
            if let Some(i) = key.as_index() {
                indices.push((i, key.clone()));
            } else if key.is_symbol() {
                symbols.push(key.clone());
            } else {
                strings.push(key.clone());
            }
        }
        indices.sort_by_key(|(i, _)| *i);

        indices
            .into_iter()
            .map(|(_, k)| k)
            .chain(strings)
            .chain(symbols)
            .collect()
    }
}

fn is_length(key: &PropertyKey) -> bool {
    key.as_str() == Some("length")
}

/// A valid array length is a non-negative integer that fits in 32 bits
fn to_array_length(v: &Value) -> Option<u32> {
    match v {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            Some(*n as u32)
        }
        _ => None,
    }
}

impl ObjectProtocol for Obj {
    fn get(&self, key: PropertyKey) -> Value {
        self.find_property(&key)
            .map_or(Value::Undefined, |p| p.value)
    }

    fn set(&self, key: PropertyKey, value: Value) -> bool {
        let is_array = self.is_array();
        {
            let mut state = self.data.state.write();
            if let Some(prop) = state.properties.get_mut(&key) {
                if !prop.writable {
                    return false;
                }
                if is_array && is_length(&key) {
                    let new_length = match to_array_length(&value) {
                        Some(l) => l,
                        None => return false,
                    };
                    prop.value = value;
                    state.truncate(new_length);
                    return true;
                }
                prop.value = value;
                return true;
            }
        }

        // Not an own property; an inherited read-only property still blocks the write
        let prototype = self.data.state.read().prototype.clone();
        if let Some(prototype) = prototype {
            if prototype.find_property(&key).map_or(false, |p| !p.writable) {
                return false;
            }
        }

        let mut state = self.data.state.write();
        if !state.extensible {
            return false;
        }
        if is_array {
            if let Some(index) = key.as_index() {
                if index >= state.array_length() && !state.length_writable() {
                    return false;
                }
                state.properties.insert(key, Property::plain(value));
                state.cover_index(index);
                return true;
            }
        }
        state.properties.insert(key, Property::plain(value));
        true
    }

    fn delete(&self, key: PropertyKey) -> bool {
        let mut state = self.data.state.write();
        let configurable = match state.properties.get(&key) {
            None => return true,
            Some(p) => p.configurable,
        };
        if configurable {
            state.properties.shift_remove(&key);
        }
        configurable
    }

    fn has(&self, key: PropertyKey) -> bool {
        self.find_property(&key).is_some()
    }

    fn own_keys(&self) -> Vec<PropertyKey> {
        self.data.state.read().ordered_keys()
    }

    fn get_own_property(&self, key: PropertyKey) -> Option<PropertyDescriptor> {
        self.data
            .state
            .read()
            .properties
            .get(&key)
            .map(Property::to_descriptor)
    }

    fn define_property(
        &self,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<(), WeakError> {
        let refused = WeakError::Refused {
            operation: "defineProperty",
        };
        let is_array = self.is_array();
        let mut state = self.data.state.write();

        if is_array && is_length(&key) {
            let new_length = match &desc.value {
                Some(v) => Some(to_array_length(v).ok_or_else(|| refused.clone())?),
                None => None,
            };
            let length = state
                .properties
                .get_mut(&key)
                .ok_or_else(|| refused.clone())?;
            if !length.redefine(&desc) {
                return Err(refused);
            }
            if let Some(new_length) = new_length {
                state.truncate(new_length);
            }
            return Ok(());
        }

        if let Some(current) = state.properties.get_mut(&key) {
            return if current.redefine(&desc) {
                Ok(())
            } else {
                Err(refused)
            };
        }

        if !state.extensible {
            return Err(refused);
        }
        let index = if is_array { key.as_index() } else { None };
        if let Some(index) = index {
            if index >= state.array_length() && !state.length_writable() {
                return Err(refused);
            }
        }
        state.properties.insert(key, Property::from_descriptor(&desc));
        if let Some(index) = index {
            state.cover_index(index);
        }
        Ok(())
    }

    fn get_prototype_of(&self) -> Option<Obj> {
        self.data.state.read().prototype.clone()
    }

    fn set_prototype_of(&self, prototype: Option<Obj>) -> Result<(), WeakError> {
        let refused = WeakError::Refused {
            operation: "setPrototypeOf",
        };
        let _guard = PROTOTYPE_LOCK.lock();

        {
            let state = self.data.state.read();
            let unchanged = match (&state.prototype, &prototype) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            };
            if unchanged {
                return Ok(());
            }
            if !state.extensible {
                return Err(refused);
            }
        }

        // Walk the new chain (without ever locking ourselves) looking for a cycle
        let mut cursor = prototype.clone();
        while let Some(p) = cursor {
            if p.ptr_eq(self) {
                return Err(refused);
            }
            cursor = p.data.state.read().prototype.clone();
        }

        self.data.state.write().prototype = prototype;
        Ok(())
    }

    fn is_extensible(&self) -> bool {
        self.data.state.read().extensible
    }

    fn prevent_extensions(&self) -> bool {
        self.data.state.write().extensible = false;
        true
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{Obj, PropertyDescriptor};
    use crate::{ObjectProtocol, PropertyKey, Symbol, Value};

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn own_keys_are_ordered_like_a_script_engine() {
        let sym = Symbol::new(Some("s"));
        let o = Obj::new();
        o.set(key("b"), Value::from(1));
        o.set(PropertyKey::from(&sym), Value::from(2));
        o.set(key("10"), Value::from(3));
        o.set(key("a"), Value::from(4));
        o.set(key("2"), Value::from(5));

        assert_eq!(
            o.own_keys(),
            vec![key("2"), key("10"), key("b"), key("a"), PropertyKey::from(sym)]
        );
    }

    #[test]
    fn reads_walk_the_prototype_chain() {
        let proto = Obj::from_properties(vec![("greeting", "hello")]);
        let o = Obj::with_prototype(proto.clone());

        assert_eq!(o.get(key("greeting")), Value::from("hello"));
        assert!(o.has(key("greeting")));
        assert!(o.get_own_property(key("greeting")).is_none());
        assert!(o.keys().is_empty());

        // Writing shadows rather than mutating the prototype
        assert!(o.set(key("greeting"), Value::from("hi")));
        assert_eq!(proto.get(key("greeting")), Value::from("hello"));
        assert_eq!(o.get(key("greeting")), Value::from("hi"));
    }

    #[test]
    fn inherited_read_only_blocks_assignment() {
        let proto = Obj::new();
        proto
            .define_property(key("fixed"), PropertyDescriptor::new().value(1))
            .unwrap();
        let o = Obj::with_prototype(proto);
        assert!(!o.set(key("fixed"), Value::from(2)));
        assert_eq!(o.get(key("fixed")), Value::from(1));
    }

    #[test]
    fn non_extensible_objects_reject_new_keys() {
        let o = Obj::from_properties(vec![("a", 1)]);
        assert!(o.prevent_extensions());
        assert!(!o.is_extensible());

        assert!(!o.set(key("b"), Value::from(2)));
        assert!(o.define_property(key("c"), PropertyDescriptor::data(3)).is_err());
        // Existing keys stay writable
        assert!(o.set(key("a"), Value::from(5)));
        assert_eq!(o.get(key("a")), Value::from(5));
    }

    #[test]
    fn non_configurable_properties_cannot_be_deleted() {
        let o = Obj::new();
        o.define_property(
            key("pinned"),
            PropertyDescriptor::new().value(1).writable(true),
        )
        .unwrap();
        assert!(!o.delete(key("pinned")));
        assert!(o.delete(key("never-existed")));
        assert!(o.has(key("pinned")));
    }

    #[test]
    fn prototype_cycles_are_refused() {
        let a = Obj::new();
        let b = Obj::with_prototype(a.clone());
        assert!(a.set_prototype_of(Some(b.clone())).is_err());
        assert!(a.set_prototype_of(Some(a.clone())).is_err());
        assert!(a.get_prototype_of().is_none());

        // Unchanged prototypes are fine even when frozen
        b.prevent_extensions();
        assert!(b.set_prototype_of(Some(a.clone())).is_ok());
        assert!(b.set_prototype_of(None).is_err());
    }

    #[test]
    fn array_length_tracks_indices() {
        let arr = Obj::array(vec![Value::from("x")]);
        assert_eq!(arr.length(), 1);
        assert_eq!(arr.get_index(0), Value::from("x"));

        assert!(arr.set(PropertyKey::from(4_u32), Value::from("far")));
        assert_eq!(arr.length(), 5);
        assert_eq!(arr.get_index(2), Value::Undefined);

        assert_eq!(arr.push(Value::from("y")), 6);
        assert_eq!(arr.get_index(5), Value::from("y"));

        assert!(arr.set(key("length"), Value::from(1)));
        assert_eq!(arr.own_keys(), vec![key("0"), key("length")]);
        assert_eq!(arr.keys(), vec![key("0")]);

        assert!(!arr.set(key("length"), Value::from(-1)));
        assert!(!arr.set(key("length"), Value::from(1.5)));
        assert!(!arr.delete(key("length")));
    }

    #[test]
    fn array_with_read_only_length_cannot_grow() {
        let arr = Obj::array(vec![Value::from(1)]);
        arr.define_property(key("length"), PropertyDescriptor::new().writable(false))
            .unwrap();
        assert!(!arr.set(PropertyKey::from(1_u32), Value::from(2)));
        assert!(arr.set(PropertyKey::from(0_u32), Value::from(3)));
        // The refused element is not appended, and the length reported is the real one
        assert_eq!(arr.push(Value::from(4)), 1);
        assert_eq!(arr.length(), 1);
        assert_eq!(arr.get_index(1), Value::Undefined);
    }

    #[test]
    fn reclaim_hooks_run_once_on_last_drop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let o = Obj::new();
        let r = runs.clone();
        o.attach_reclaim_hook(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));

        let other = o.clone();
        drop(o);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        drop(other);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn downgraded_pointers_do_not_keep_objects_alive() {
        let o = Obj::new();
        let weak = o.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&o));
        drop(o);
        assert!(weak.upgrade().is_none());
    }
}

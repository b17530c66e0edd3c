use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::handle::WeakRef;
use crate::object::Obj;
use crate::protocol::ObjectProtocol;

/// A script value.
///
/// Primitives are held by value. `Object` holds a strong reference to a host object, which keeps
/// it alive. `Weak` holds a weak reference, which does not.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(Symbol),
    Object(Obj),
    Weak(WeakRef),
}

impl Value {
    /// The `typeof`-style name of this value, used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) => "object",
            Value::Weak(_) => "weak reference",
        }
    }

    /// Objects and weak references are object-like, everything else is a primitive
    #[must_use]
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Weak(_))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_weak(&self) -> Option<&WeakRef> {
        match self {
            Value::Weak(w) => Some(w),
            _ => None,
        }
    }

    /// View an object-like value through the object protocol, so a weak reference can be used
    /// anywhere the object itself could
    #[must_use]
    pub fn as_object(&self) -> Option<&dyn ObjectProtocol> {
        match self {
            Value::Object(o) => Some(o),
            Value::Weak(w) => Some(w),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

// Strict equality: primitives compare by value, objects and weak references by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Weak(a), Value::Weak(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Value::Object(v)
    }
}

impl From<WeakRef> for Value {
    fn from(v: WeakRef) -> Self {
        Value::Weak(v)
    }
}

static SYMBOL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A unique, optionally described, property key
#[derive(Clone)]
pub struct Symbol {
    inner: Arc<SymbolInner>,
}

struct SymbolInner {
    unique_id: u64,
    description: Option<String>,
}

impl Symbol {
    #[must_use]
    pub fn new(description: Option<&str>) -> Self {
        Self {
            inner: Arc::new(SymbolInner {
                unique_id: SYMBOL_COUNTER.fetch_add(1, Ordering::Relaxed),
                description: description.map(str::to_owned),
            }),
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.inner.unique_id == other.inner.unique_id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.unique_id.hash(state);
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

/// The key of an object property: a string or a symbol.
///
/// Array indices are ordinary string keys in canonical decimal form ("0", "1", ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Arc<str>),
    Symbol(Symbol),
}

/// Largest valid array index is 2^32 - 2
const MAX_ARRAY_INDEX: u64 = (1 << 32) - 2;

impl PropertyKey {
    /// Returns the array index this key names, if it is a canonical array index
    #[must_use]
    pub fn as_index(&self) -> Option<u32> {
        let s = match self {
            PropertyKey::String(s) => s,
            PropertyKey::Symbol(_) => return None,
        };

        // "0" is canonical, "00" and "01" are not
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        match s.parse::<u64>() {
            #[allow(clippy::cast_possible_truncation)]
            Ok(n) if n <= MAX_ARRAY_INDEX => Some(n as u32),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }
}

impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => f.write_str(s),
            PropertyKey::Symbol(sym) => Debug::fmt(sym, f),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(v: &str) -> Self {
        PropertyKey::String(Arc::from(v))
    }
}

impl From<String> for PropertyKey {
    fn from(v: String) -> Self {
        PropertyKey::String(Arc::from(v))
    }
}

impl From<u32> for PropertyKey {
    fn from(v: u32) -> Self {
        PropertyKey::from(v.to_string())
    }
}

impl From<usize> for PropertyKey {
    fn from(v: usize) -> Self {
        PropertyKey::from(v.to_string())
    }
}

impl From<Symbol> for PropertyKey {
    fn from(v: Symbol) -> Self {
        PropertyKey::Symbol(v)
    }
}

impl From<&Symbol> for PropertyKey {
    fn from(v: &Symbol) -> Self {
        PropertyKey::Symbol(v.clone())
    }
}

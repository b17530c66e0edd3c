use crate::value::Value;

/// A (possibly partial) data property descriptor.
///
/// Fields left as `None` mean "unspecified": when defining a property they keep the current
/// attribute (or default to `false`/`undefined` for a brand new property). Descriptors handed
/// out by `get_own_property` are always complete.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// An empty descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A complete descriptor for a writable, enumerable, configurable data property, which is what
    /// a plain assignment creates
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(true),
        }
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    #[must_use]
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    #[must_use]
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }
}

/// A stored data property. Unlike `PropertyDescriptor`, every attribute is present.
#[derive(Clone, Debug)]
pub(crate) struct Property {
    pub(crate) value: Value,
    pub(crate) writable: bool,
    pub(crate) enumerable: bool,
    pub(crate) configurable: bool,
}

impl Property {
    pub(crate) fn plain(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub(crate) fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        Self {
            value: desc.value.clone().unwrap_or_default(),
            writable: desc.writable.unwrap_or(false),
            enumerable: desc.enumerable.unwrap_or(false),
            configurable: desc.configurable.unwrap_or(false),
        }
    }

    pub(crate) fn to_descriptor(&self) -> PropertyDescriptor {
        PropertyDescriptor {
            value: Some(self.value.clone()),
            writable: Some(self.writable),
            enumerable: Some(self.enumerable),
            configurable: Some(self.configurable),
        }
    }

    /// Checks `desc` against this property's attributes and, if it is allowed, applies it.
    /// Returns whether the change was allowed.
    pub(crate) fn redefine(&mut self, desc: &PropertyDescriptor) -> bool {
        if !self.configurable {
            if desc.configurable == Some(true) {
                return false;
            }
            if desc.enumerable.map_or(false, |e| e != self.enumerable) {
                return false;
            }
            if !self.writable {
                if desc.writable == Some(true) {
                    return false;
                }
                if let Some(v) = &desc.value {
                    if !same_value(v, &self.value) {
                        return false;
                    }
                }
            }
        }

        if let Some(v) = &desc.value {
            self.value = v.clone();
        }
        if let Some(w) = desc.writable {
            self.writable = w;
        }
        if let Some(e) = desc.enumerable {
            self.enumerable = e;
        }
        if let Some(c) = desc.configurable {
            self.configurable = c;
        }
        true
    }
}

/// Like strict equality, except NaN is the same as NaN and 0 is not the same as -0
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod test {
    use super::{same_value, Property, PropertyDescriptor};
    use crate::Value;

    #[test]
    fn frozen_property_rejects_changes() {
        let mut p = Property::from_descriptor(&PropertyDescriptor::new().value(1));
        assert!(!p.writable && !p.enumerable && !p.configurable);

        assert!(!p.redefine(&PropertyDescriptor::new().value(2)));
        assert!(!p.redefine(&PropertyDescriptor::new().writable(true)));
        assert!(!p.redefine(&PropertyDescriptor::new().configurable(true)));
        assert!(!p.redefine(&PropertyDescriptor::new().enumerable(true)));

        // Restating what is already there is fine
        assert!(p.redefine(&PropertyDescriptor::new().value(1).writable(false)));
        assert_eq!(p.value, Value::from(1));
    }

    #[test]
    fn non_configurable_but_writable_can_still_change_value() {
        let mut p = Property::from_descriptor(&PropertyDescriptor::new().value(1).writable(true));
        assert!(p.redefine(&PropertyDescriptor::new().value(5)));
        assert!(p.redefine(&PropertyDescriptor::new().writable(false)));
        assert!(!p.redefine(&PropertyDescriptor::new().value(6)));
        assert_eq!(p.value, Value::from(5));
    }

    #[test]
    fn same_value_edges() {
        assert!(same_value(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!same_value(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(same_value(&Value::from("a"), &Value::from("a")));
    }

    #[test]
    fn plain_is_fully_open() {
        let p = Property::plain(Value::Null);
        assert_eq!(p.to_descriptor(), PropertyDescriptor::data(Value::Null));
    }
}

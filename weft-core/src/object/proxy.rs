//! Reactive Objects
//!
//! A [`ReactiveObject`] wraps a JSON-like object and routes every property
//! access through the [`Registry`](super::Registry): reads subscribe the
//! running computation to that property, writes that change a property
//! notify whoever read it.
//!
//! Unlike [`Signal::set`](crate::Signal::set), a property write compares the
//! old and new value and stays silent when they are equal. Comparison is
//! structural for arrays and nested objects, and numbers compare by value, so
//! `1` and `1.0` are equal. Tracking is shallow: reading a nested object
//! returns a plain copy.
//!
//! The registry holds the effects and memos that read an object, so a
//! computation whose closure owns a clone of the object keeps it alive until
//! the computation is disposed. Closures should capture
//! [`ReactiveObject::downgrade`] instead; the object and its registry entry
//! then go away with the last handle the host holds.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use serde_json::json;
//! use weft_core::{reactive, Effect};
//!
//! let product = reactive(json!({ "price": 5, "quantity": 3 })).unwrap();
//! let total = Arc::new(Mutex::new(0));
//!
//! let (p, t) = (product.downgrade(), total.clone());
//! let _effect = Effect::new(move || {
//!     let Some(p) = p.upgrade() else { return };
//!     let price = p.get_as::<i64>("price").unwrap().unwrap_or(0);
//!     let quantity = p.get_as::<i64>("quantity").unwrap().unwrap_or(0);
//!     *t.lock().unwrap() = price * quantity;
//! })
//! .unwrap();
//!
//! product.set("quantity", 4).unwrap();
//! assert_eq!(*total.lock().unwrap(), 20);
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::registry::{registry, TargetId};
use crate::error::{ReactiveError, Result};

/// Which writes an object still accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    /// Every write is applied.
    #[default]
    Open,

    /// Existing properties may change; new ones are rejected.
    Sealed,

    /// Every write is rejected.
    Frozen,
}

/// A transparently tracked object.
///
/// Cloning yields another handle to the same object.
pub struct ReactiveObject {
    inner: Arc<TargetCell>,
}

struct TargetCell {
    id: TargetId,
    fields: RwLock<Map<String, Value>>,
    mutability: RwLock<Mutability>,
}

impl Drop for TargetCell {
    fn drop(&mut self) {
        registry().release(self.id);
    }
}

impl ReactiveObject {
    /// Wrap `target`, which must be a JSON object.
    pub fn new(target: Value) -> Result<Self> {
        match target {
            Value::Object(fields) => Ok(Self {
                inner: Arc::new(TargetCell {
                    id: TargetId::new(),
                    fields: RwLock::new(fields),
                    mutability: RwLock::new(Mutability::Open),
                }),
            }),
            other => Err(ReactiveError::InvalidTarget {
                found: kind_of(&other),
            }),
        }
    }

    /// Wrap any value that serializes to an object.
    pub fn from_serialize<T>(value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Self::new(serde_json::to_value(value)?)
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Read a property, subscribing the running computation to it.
    ///
    /// Reading a missing property still subscribes, so a later write that
    /// creates it is observed.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.inner.fields.read().get(key).cloned();
        registry().track(self.inner.id, key);
        value
    }

    /// Read a property and deserialize it.
    pub fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(ReactiveError::from)
    }

    /// Write a property.
    ///
    /// Returns `Ok(false)` when the object rejects the write (sealed or
    /// frozen); nothing is notified then. Otherwise the write is applied and,
    /// if the value changed, every computation that read `key` re-runs before
    /// this returns. Their errors are returned here.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();

        let changed = {
            let mut fields = self.inner.fields.write();
            let accepts = match self.mutability() {
                Mutability::Open => true,
                Mutability::Sealed => fields.contains_key(key),
                Mutability::Frozen => false,
            };
            if !accepts {
                tracing::debug!(object = ?self.inner.id, key, "write rejected");
                return Ok(false);
            }

            let old = fields.insert(key.to_owned(), value.clone());
            !old.is_some_and(|old| same_value(&old, &value))
        };

        if changed {
            registry().trigger(self.inner.id, key)?;
        }
        Ok(true)
    }

    /// Serialize `value` and write it as a property.
    pub fn set_serialize<T>(&self, key: &str, value: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.set(key, serde_json::to_value(value)?)
    }

    /// Property names, without tracking.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// A copy of the whole object, without tracking.
    pub fn to_value(&self) -> Value {
        Value::Object(self.inner.fields.read().clone())
    }

    /// Reject new properties from now on.
    pub fn seal(&self) {
        let mut mutability = self.inner.mutability.write();
        if *mutability == Mutability::Open {
            *mutability = Mutability::Sealed;
        }
    }

    /// Reject every write from now on.
    pub fn freeze(&self) {
        *self.inner.mutability.write() = Mutability::Frozen;
    }

    pub fn mutability(&self) -> Mutability {
        *self.inner.mutability.read()
    }

    /// Number of computations subscribed to `key`.
    pub fn dependent_count(&self, key: &str) -> usize {
        registry().dependent_count(self.inner.id, key)
    }

    /// A handle that does not keep the object alive.
    pub fn downgrade(&self) -> WeakReactiveObject {
        WeakReactiveObject {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning handle to a [`ReactiveObject`], for closures of the
/// computations that read it.
#[derive(Clone)]
pub struct WeakReactiveObject {
    id: TargetId,
    inner: Weak<TargetCell>,
}

impl WeakReactiveObject {
    /// The object, if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<ReactiveObject> {
        self.inner.upgrade().map(|inner| ReactiveObject { inner })
    }

    pub fn id(&self) -> TargetId {
        self.id
    }
}

impl fmt::Debug for WeakReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakReactiveObject")
            .field("id", &self.id)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Clone for ReactiveObject {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("mutability", &self.mutability())
            .field("fields", &*self.inner.fields.read())
            .finish()
    }
}

/// Make `target` reactive.
///
/// Fails with [`ReactiveError::InvalidTarget`] unless `target` is an object.
pub fn reactive(target: Value) -> Result<ReactiveObject> {
    ReactiveObject::new(target)
}

/// Whether writing `new` over `old` leaves the property unchanged.
///
/// `Value` equality, except that numbers compare by value across integer and
/// float representations.
fn same_value(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => {
            a == b || ((a.is_f64() || b.is_f64()) && a.as_f64() == b.as_f64())
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| same_value(x, y)))
        }
        _ => old == new,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn non_objects_are_rejected() {
        for (value, kind) in [
            (json!(null), "null"),
            (json!(true), "boolean"),
            (json!(3), "number"),
            (json!("text"), "string"),
            (json!([1, 2]), "array"),
        ] {
            let err = reactive(value).unwrap_err();
            assert!(matches!(err, ReactiveError::InvalidTarget { found } if found == kind));
        }
    }

    #[test]
    fn reads_and_writes_pass_through() {
        let obj = reactive(json!({ "count": 1 })).unwrap();

        assert_eq!(obj.get("count"), Some(json!(1)));
        assert_eq!(obj.get("missing"), None);

        assert!(obj.set("count", 2).unwrap());
        assert!(obj.set("label", "hi").unwrap());
        assert_eq!(obj.to_value(), json!({ "count": 2, "label": "hi" }));
    }

    #[test]
    fn from_serialize_accepts_structs() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }

        let obj = ReactiveObject::from_serialize(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(obj.get_as::<i32>("y").unwrap(), Some(2));

        obj.set_serialize("x", &Point { x: 3, y: 4 }).unwrap();
        assert_eq!(
            obj.get_as::<Point>("x").unwrap(),
            Some(Point { x: 3, y: 4 })
        );
        assert!(obj.get_as::<String>("y").is_err());

        assert!(ReactiveObject::from_serialize(&5).is_err());
    }

    #[test]
    fn equal_write_does_not_notify() {
        let obj = reactive(json!({ "count": 0 })).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let (o, l) = (obj.clone(), log.clone());
        let _effect = Effect::new(move || l.lock().push(o.get("count"))).unwrap();

        assert!(obj.set("count", 0).unwrap());
        assert_eq!(log.lock().len(), 1);

        obj.set("count", 5).unwrap();
        assert_eq!(*log.lock(), vec![Some(json!(0)), Some(json!(5))]);
    }

    #[test]
    fn numbers_compare_by_value() {
        let obj = reactive(json!({ "n": 1, "nested": { "xs": [1, 2] } })).unwrap();
        let runs = Arc::new(Mutex::new(0));

        let (o, r) = (obj.downgrade(), runs.clone());
        let _effect = Effect::new(move || {
            if let Some(o) = o.upgrade() {
                o.get("n");
                o.get("nested");
            }
            *r.lock() += 1;
        })
        .unwrap();

        obj.set("n", 1.0).unwrap();
        obj.set("nested", json!({ "xs": [1.0, 2] })).unwrap();
        assert_eq!(*runs.lock(), 1);

        obj.set("n", 1.5).unwrap();
        assert_eq!(*runs.lock(), 2);

        // Large integers are not conflated through floats
        obj.set("n", 9_007_199_254_740_993_u64).unwrap();
        obj.set("n", 9_007_199_254_740_992_u64).unwrap();
        assert_eq!(*runs.lock(), 4);
    }

    #[test]
    fn weak_handle_does_not_keep_the_object() {
        let obj = reactive(json!({ "n": 1 })).unwrap();
        let weak = obj.downgrade();

        assert_eq!(weak.id(), obj.id());
        assert_eq!(weak.upgrade().unwrap().get("n"), Some(json!(1)));

        drop(obj);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn creating_a_read_property_notifies() {
        let obj = reactive(json!({})).unwrap();
        let runs = Arc::new(Mutex::new(0));

        let (o, r) = (obj.clone(), runs.clone());
        let _effect = Effect::new(move || {
            o.get("later");
            *r.lock() += 1;
        })
        .unwrap();

        obj.set("later", Value::Null).unwrap();
        assert_eq!(*runs.lock(), 2);
    }

    #[test]
    fn frozen_object_rejects_writes_silently() {
        let obj = reactive(json!({ "count": 0 })).unwrap();
        let runs = Arc::new(Mutex::new(0));

        let (o, r) = (obj.clone(), runs.clone());
        let _effect = Effect::new(move || {
            o.get("count");
            *r.lock() += 1;
        })
        .unwrap();

        obj.freeze();
        assert!(!obj.set("count", 1).unwrap());
        assert_eq!(obj.get("count"), Some(json!(0)));
        assert_eq!(*runs.lock(), 1);
    }

    #[test]
    fn sealed_object_rejects_new_keys_only() {
        let obj = reactive(json!({ "count": 0 })).unwrap();
        obj.seal();

        assert_eq!(obj.mutability(), Mutability::Sealed);
        assert!(obj.set("count", 1).unwrap());
        assert!(!obj.set("extra", 1).unwrap());
        assert_eq!(obj.keys(), vec!["count".to_string()]);

        // Sealing never loosens a frozen object
        obj.freeze();
        obj.seal();
        assert_eq!(obj.mutability(), Mutability::Frozen);
    }

    #[test]
    fn property_tracking_is_per_key() {
        let obj = reactive(json!({ "a": 1, "b": 2 })).unwrap();
        let runs = Arc::new(Mutex::new(0));

        let (o, r) = (obj.clone(), runs.clone());
        let _effect = Effect::new(move || {
            o.get("a");
            *r.lock() += 1;
        })
        .unwrap();

        obj.set("b", 3).unwrap();
        assert_eq!(*runs.lock(), 1);
        assert_eq!(obj.dependent_count("a"), 1);
        assert_eq!(obj.dependent_count("b"), 0);
    }

    #[test]
    fn clones_share_the_target() {
        let obj = reactive(json!({ "n": 1 })).unwrap();
        let other = obj.clone();

        other.set("n", 2).unwrap();
        assert_eq!(obj.get("n"), Some(json!(2)));
        assert_eq!(obj.id(), other.id());
    }
}

#![forbid(unsafe_code)]

//! Raw composite objects.
//!
//! A [`RawObject`] is the application-supplied data a wrapper observes. It
//! knows nothing about tracking: every operation here is the plain,
//! unobserved behavior the trap sets build on.
//!
//! # Storage
//!
//! Own properties keep insertion order. Arrays additionally keep sparse
//! element storage keyed by index (a hole is an absent index) next to an
//! explicit `length`, exposed as an own property that can be written to
//! truncate or extend them. Any valid index or length is representable
//! without allocating for the gap.
//!
//! # Prototype chain
//!
//! An object may inherit from another object or from a wrapper. Reads and
//! containment checks walk the chain; writes follow ordinary-set semantics:
//! an existing own property is written in place, a missing one is looked up
//! the chain and finally defined on the *receiver* (the value the write was
//! issued against). When the chain passes through a wrapper, its set trap
//! runs with that receiver, which is how a wrapper tells "a write landed on
//! me" apart from "a write passed through me".
//!
//! # Metadata
//!
//! Freeze state and policy tags live on the object itself as
//! [`ObjectFlags`]; there is no side table.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{ObjectError, ObjectResult};
use crate::tracker::TargetId;
use crate::value::{PropertyKey, Value};

/// Runtime kind of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Record,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
    Date,
    RegExp,
    Function,
}

impl ObjectKind {
    /// Kinds the classifier is willing to wrap.
    #[must_use]
    pub const fn is_observable(self) -> bool {
        matches!(
            self,
            Self::Record | Self::Array | Self::Map | Self::Set | Self::WeakMap | Self::WeakSet
        )
    }

    /// Built-in keyed/set containers, intercepted by container trap sets.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Map | Self::Set | Self::WeakMap | Self::WeakSet)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Record => "Object",
            Self::Array => "Array",
            Self::Map => "Map",
            Self::Set => "Set",
            Self::WeakMap => "WeakMap",
            Self::WeakSet => "WeakSet",
            Self::Date => "Date",
            Self::RegExp => "RegExp",
            Self::Function => "Function",
        }
    }
}

bitflags! {
    /// Per-object state and policy tags.
    ///
    /// Policy tags are irreversible: there is no API that removes them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u8 {
        /// No property may be added, changed or removed.
        const FROZEN = 1 << 0;
        /// `reactive()` hands out a readonly view instead.
        const MARK_READONLY = 1 << 1;
        /// Never wrapped.
        const MARK_NON_REACTIVE = 1 << 2;
        /// Framework-owned object (component instance, virtual node).
        const FRAMEWORK_INTERNAL = 1 << 3;
    }
}

#[derive(Default)]
struct Slots {
    /// Array elements by index. Unused for non-arrays.
    elements: BTreeMap<u32, Value>,
    /// Array length; always greater than every key of `elements`.
    length: u32,
    props: Vec<(PropertyKey, Value)>,
}

impl Slots {
    fn prop_position(&self, key: &PropertyKey) -> Option<usize> {
        self.props.iter().position(|(k, _)| k == key)
    }

    fn upsert(&mut self, key: PropertyKey, value: Value) -> Option<Value> {
        match self.prop_position(&key) {
            Some(pos) => Some(std::mem::replace(&mut self.props[pos].1, value)),
            None => {
                self.props.push((key, value));
                None
            }
        }
    }
}

struct ObjectInner {
    id: TargetId,
    kind: ObjectKind,
    flags: Cell<ObjectFlags>,
    proto: RefCell<Option<Value>>,
    slots: RefCell<Slots>,
}

/// A raw composite value. Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct RawObject {
    inner: Rc<ObjectInner>,
}

impl RawObject {
    // ── Constructors ─────────────────────────────────────────────────

    /// Create an empty object of the given kind.
    #[must_use]
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: TargetId::next(),
                kind,
                flags: Cell::new(ObjectFlags::empty()),
                proto: RefCell::new(None),
                slots: RefCell::new(Slots::default()),
            }),
        }
    }

    /// Create an empty record.
    #[must_use]
    pub fn record() -> Self {
        Self::new(ObjectKind::Record)
    }

    /// Create an empty array.
    #[must_use]
    pub fn array() -> Self {
        Self::new(ObjectKind::Array)
    }

    /// Create a record from key/value pairs, in order.
    #[must_use]
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let obj = Self::record();
        {
            let mut slots = obj.inner.slots.borrow_mut();
            for (key, value) in entries {
                slots.upsert(key.into(), value.into());
            }
        }
        obj
    }

    /// Create an array from its elements.
    #[must_use]
    pub fn array_from<V: Into<Value>>(elements: impl IntoIterator<Item = V>) -> Self {
        let obj = Self::array();
        {
            let mut slots = obj.inner.slots.borrow_mut();
            for (i, value) in (0u32..).zip(elements) {
                slots.elements.insert(i, value.into());
                slots.length = i + 1;
            }
        }
        obj
    }

    // ── Identity & metadata ──────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.inner.kind
    }

    #[must_use]
    pub fn flags(&self) -> ObjectFlags {
        self.inner.flags.get()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.flags().contains(ObjectFlags::FROZEN)
    }

    /// Freeze the object. Irreversible.
    pub fn freeze(&self) {
        self.insert_flags(ObjectFlags::FROZEN);
    }

    /// Tag the object as framework-owned; it will never be wrapped.
    pub fn mark_internal(&self) {
        self.insert_flags(ObjectFlags::FRAMEWORK_INTERNAL);
    }

    pub(crate) fn insert_flags(&self, flags: ObjectFlags) {
        self.inner.flags.set(self.inner.flags.get() | flags);
    }

    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    // ── Prototype ────────────────────────────────────────────────────

    #[must_use]
    pub fn prototype(&self) -> Option<Value> {
        self.inner.proto.borrow().clone()
    }

    /// Set (or clear) the prototype.
    ///
    /// The prototype must be a raw object or a wrapper, and the chain must
    /// not loop back to this object.
    pub fn set_prototype(&self, proto: Option<Value>) -> ObjectResult<()> {
        if let Some(proto) = &proto {
            let mut cursor = proto.raw_target().cloned();
            if cursor.is_none() {
                return Err(ObjectError::InvalidPrototype);
            }
            while let Some(obj) = cursor {
                if Self::ptr_eq(&obj, self) {
                    return Err(ObjectError::InvalidPrototype);
                }
                cursor = obj.prototype().and_then(|p| p.raw_target().cloned());
            }
        }
        *self.inner.proto.borrow_mut() = proto;
        Ok(())
    }

    // ── Own properties ───────────────────────────────────────────────

    /// Whether `key` is an own property.
    #[must_use]
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        let slots = self.inner.slots.borrow();
        if self.kind() == ObjectKind::Array {
            match key {
                PropertyKey::Index(i) => {
                    return slots.elements.contains_key(i);
                }
                _ if key.is_name("length") => return true,
                _ => {}
            }
        }
        slots.prop_position(key).is_some()
    }

    /// Read an own property, without consulting the prototype chain.
    #[must_use]
    pub fn get_own(&self, key: &PropertyKey) -> Option<Value> {
        let slots = self.inner.slots.borrow();
        if self.kind() == ObjectKind::Array {
            match key {
                PropertyKey::Index(i) => {
                    return slots.elements.get(i).cloned();
                }
                _ if key.is_name("length") => {
                    return Some(Value::Number(f64::from(slots.length)));
                }
                _ => {}
            }
        }
        slots
            .prop_position(key)
            .map(|pos| slots.props[pos].1.clone())
    }

    /// Own keys: indices ascending, then names, then symbols (each in
    /// insertion order). Arrays list `length` after their indices.
    #[must_use]
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let slots = self.inner.slots.borrow();
        let mut indices: Vec<u32> = slots
            .props
            .iter()
            .filter_map(|(k, _)| match k {
                PropertyKey::Index(i) => Some(*i),
                _ => None,
            })
            .collect();
        let mut keys = Vec::with_capacity(slots.elements.len() + slots.props.len() + 1);
        if self.kind() == ObjectKind::Array {
            keys.extend(slots.elements.keys().copied().map(PropertyKey::Index));
        }
        indices.sort_unstable();
        keys.extend(indices.into_iter().map(PropertyKey::Index));
        if self.kind() == ObjectKind::Array {
            keys.push(PropertyKey::length_key());
        }
        keys.extend(
            slots
                .props
                .iter()
                .filter(|(k, _)| matches!(k, PropertyKey::Name(_)))
                .map(|(k, _)| k.clone()),
        );
        keys.extend(
            slots
                .props
                .iter()
                .filter(|(k, _)| matches!(k, PropertyKey::Symbol(_)))
                .map(|(k, _)| k.clone()),
        );
        keys
    }

    /// Define or overwrite an own property, bypassing the prototype chain.
    pub fn insert(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> ObjectResult<()> {
        self.define_own(&key.into(), value.into())
    }

    /// Remove every own property and element.
    ///
    /// Raw graphs are reference counted; clearing is how an application
    /// breaks a cycle it created.
    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.inner.slots.borrow_mut());
        drop(old);
    }

    fn define_own(&self, key: &PropertyKey, value: Value) -> ObjectResult<()> {
        if self.is_frozen() {
            return Err(if self.has_own(key) {
                ObjectError::Frozen { key: key.clone() }
            } else {
                ObjectError::NotExtensible { key: key.clone() }
            });
        }
        let replaced = {
            let mut slots = self.inner.slots.borrow_mut();
            if self.kind() == ObjectKind::Array {
                match key {
                    PropertyKey::Index(i) => {
                        // Indices stop at u32::MAX - 1, so this cannot overflow.
                        slots.length = slots.length.max(*i + 1);
                        slots.elements.insert(*i, value)
                    }
                    _ if key.is_name("length") => {
                        let len = array_length(&value)?;
                        let removed = slots.elements.split_off(&len);
                        slots.length = len;
                        drop(slots);
                        drop(removed);
                        return Ok(());
                    }
                    _ => slots.upsert(key.clone(), value),
                }
            } else {
                slots.upsert(key.clone(), value)
            }
        };
        // Old values may hold wrappers whose drop hook touches the registry;
        // release them outside the slot borrow.
        drop(replaced);
        Ok(())
    }

    // ── Chain-aware operations ───────────────────────────────────────

    /// Read a property, walking the prototype chain.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Value {
        if let Some(value) = self.get_own(key) {
            return value;
        }
        match self.prototype() {
            Some(proto) => proto.get(key),
            None => Value::Undefined,
        }
    }

    /// Whether `key` is present on this object or its prototype chain.
    #[must_use]
    pub fn has(&self, key: &PropertyKey) -> bool {
        if self.has_own(key) {
            return true;
        }
        match self.prototype() {
            Some(proto) => proto.has(key),
            None => false,
        }
    }

    /// Ordinary set: write `value` under `key` on behalf of `receiver`.
    ///
    /// An own property is written in place when `receiver` is this object,
    /// otherwise defined on the receiver. A missing property is delegated up
    /// the prototype chain and, at the end of the chain, defined on the
    /// receiver.
    pub fn set(&self, key: &PropertyKey, value: Value, receiver: &Value) -> ObjectResult<bool> {
        if self.has_own(key) {
            if self.is_frozen() {
                return Err(ObjectError::Frozen { key: key.clone() });
            }
            return define_on_receiver(receiver, key, value);
        }
        match self.prototype() {
            Some(Value::Object(proto)) => proto.set(key, value, receiver),
            Some(Value::Proxy(proto)) => proto.set(key, value, receiver),
            _ => define_on_receiver(receiver, key, value),
        }
    }

    /// Delete an own property. Deleting a missing key succeeds.
    pub fn delete(&self, key: &PropertyKey) -> ObjectResult<bool> {
        if !self.has_own(key) {
            return Ok(true);
        }
        if self.is_frozen() {
            return Err(ObjectError::Frozen { key: key.clone() });
        }
        let removed = {
            let mut slots = self.inner.slots.borrow_mut();
            if self.kind() == ObjectKind::Array {
                match key {
                    PropertyKey::Index(i) => slots.elements.remove(i),
                    _ if key.is_name("length") => {
                        return Err(ObjectError::NonConfigurable { key: key.clone() });
                    }
                    _ => slots
                        .prop_position(key)
                        .map(|pos| slots.props.remove(pos).1),
                }
            } else {
                slots
                    .prop_position(key)
                    .map(|pos| slots.props.remove(pos).1)
            }
        };
        drop(removed);
        Ok(true)
    }
}

fn define_on_receiver(receiver: &Value, key: &PropertyKey, value: Value) -> ObjectResult<bool> {
    let target = receiver
        .raw_target()
        .ok_or_else(|| ObjectError::NotAnObject { key: key.clone() })?;
    target.define_own(key, value)?;
    Ok(true)
}

fn array_length(value: &Value) -> ObjectResult<u32> {
    match value.as_number() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(n as u32),
        _ => Err(ObjectError::InvalidArrayLength),
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for RawObject {}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("flags", &self.flags())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn record_keeps_insertion_order_with_indices_first() {
        let obj = RawObject::record();
        obj.insert("b", 1).unwrap();
        obj.insert("2", 2).unwrap();
        obj.insert("a", 3).unwrap();
        obj.insert("0", 4).unwrap();
        let sym = crate::value::Symbol::new("s");
        obj.insert(sym.clone(), 5).unwrap();
        assert_eq!(
            obj.own_keys(),
            vec![
                PropertyKey::Index(0),
                PropertyKey::Index(2),
                key("b"),
                key("a"),
                PropertyKey::Symbol(sym),
            ]
        );
    }

    #[test]
    fn array_elements_and_length() {
        let arr = RawObject::array_from([1, 2, 3]);
        assert_eq!(arr.get(&key("length")), Value::from(3));
        assert_eq!(arr.get(&PropertyKey::Index(1)), Value::from(2));

        let recv = Value::from(arr.clone());
        arr.set(&PropertyKey::Index(5), Value::from(9), &recv).unwrap();
        assert_eq!(arr.get(&key("length")), Value::from(6));
        assert!(!arr.has_own(&PropertyKey::Index(4)));
        assert!(arr.has_own(&PropertyKey::Index(5)));

        arr.set(&key("length"), Value::from(2), &recv).unwrap();
        assert_eq!(
            arr.own_keys(),
            vec![PropertyKey::Index(0), PropertyKey::Index(1), key("length")]
        );

        assert_eq!(
            arr.set(&key("length"), Value::from(-1), &recv),
            Err(ObjectError::InvalidArrayLength)
        );
        assert_eq!(
            arr.delete(&key("length")),
            Err(ObjectError::NonConfigurable { key: key("length") })
        );
    }

    #[test]
    fn array_extremes_stay_sparse() {
        let arr = RawObject::array();
        let recv = Value::from(arr.clone());
        let last = PropertyKey::from(4_294_967_294u32);
        assert_eq!(last, PropertyKey::Index(u32::MAX - 1));

        arr.set(&last, Value::from(1), &recv).unwrap();
        assert_eq!(arr.get(&key("length")), Value::from(f64::from(u32::MAX)));
        assert_eq!(arr.get(&last), Value::from(1));
        assert!(!arr.has_own(&PropertyKey::Index(0)));
        assert_eq!(arr.own_keys(), vec![last.clone(), key("length")]);

        arr.set(&key("length"), Value::from(f64::from(u32::MAX)), &recv)
            .unwrap();
        assert!(arr.has_own(&last));

        arr.set(&key("length"), Value::from(1), &recv).unwrap();
        assert!(!arr.has_own(&last));
        assert_eq!(arr.own_keys(), vec![key("length")]);

        // Growing the length only moves the bound.
        arr.set(&key("length"), Value::from(f64::from(u32::MAX)), &recv)
            .unwrap();
        assert_eq!(arr.own_keys(), vec![key("length")]);
        assert_eq!(
            arr.set(&key("length"), Value::from(f64::from(u32::MAX) + 1.0), &recv),
            Err(ObjectError::InvalidArrayLength)
        );
    }

    #[test]
    fn delete_leaves_hole_in_array() {
        let arr = RawObject::array_from(["a", "b"]);
        assert_eq!(arr.delete(&PropertyKey::Index(0)), Ok(true));
        assert!(!arr.has_own(&PropertyKey::Index(0)));
        assert_eq!(arr.get(&key("length")), Value::from(2));
    }

    #[test]
    fn delete_missing_key_succeeds() {
        let obj = RawObject::record();
        assert_eq!(obj.delete(&key("nope")), Ok(true));
    }

    #[test]
    fn prototype_reads_and_receiver_writes() {
        let parent = RawObject::from_entries([("inherited", 1)]);
        let child = RawObject::record();
        child
            .set_prototype(Some(Value::from(parent.clone())))
            .unwrap();

        assert_eq!(child.get(&key("inherited")), Value::from(1));
        assert!(child.has(&key("inherited")));
        assert!(!child.has_own(&key("inherited")));

        // A write through the child lands on the child, shadowing the parent.
        let recv = Value::from(child.clone());
        child.set(&key("inherited"), Value::from(2), &recv).unwrap();
        assert_eq!(child.get_own(&key("inherited")), Some(Value::from(2)));
        assert_eq!(parent.get_own(&key("inherited")), Some(Value::from(1)));
    }

    #[test]
    fn prototype_cycles_are_rejected() {
        let a = RawObject::record();
        let b = RawObject::record();
        a.set_prototype(Some(Value::from(b.clone()))).unwrap();
        assert_eq!(
            b.set_prototype(Some(Value::from(a.clone()))),
            Err(ObjectError::InvalidPrototype)
        );
        assert_eq!(
            a.set_prototype(Some(Value::from(1))),
            Err(ObjectError::InvalidPrototype)
        );
        a.set_prototype(None).unwrap();
        assert!(a.prototype().is_none());
    }

    #[test]
    fn frozen_objects_reject_mutation() {
        let obj = RawObject::from_entries([("a", 1)]);
        obj.freeze();
        let recv = Value::from(obj.clone());
        assert_eq!(
            obj.set(&key("a"), Value::from(2), &recv),
            Err(ObjectError::Frozen { key: key("a") })
        );
        assert_eq!(
            obj.set(&key("b"), Value::from(2), &recv),
            Err(ObjectError::NotExtensible { key: key("b") })
        );
        assert_eq!(
            obj.delete(&key("a")),
            Err(ObjectError::Frozen { key: key("a") })
        );
        assert_eq!(obj.get(&key("a")), Value::from(1));
    }

    #[test]
    fn flags_accumulate() {
        let obj = RawObject::record();
        assert_eq!(obj.flags(), ObjectFlags::empty());
        obj.insert_flags(ObjectFlags::MARK_READONLY);
        obj.mark_internal();
        assert!(obj.flags().contains(ObjectFlags::MARK_READONLY));
        assert!(obj.flags().contains(ObjectFlags::FRAMEWORK_INTERNAL));
        assert!(!obj.is_frozen());
    }
}

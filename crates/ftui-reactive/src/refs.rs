#![forbid(unsafe_code)]

//! Refs: single-slot reactive boxes.
//!
//! A [`Ref`] is a reactive value that lives on its own rather than inside a
//! wrapped object. There are two shapes:
//!
//! - **Slot refs** ([`Reactivity::ref_value`]) own their payload. Reading
//!   tracks `(ref, Get, "value")`; writing stores the payload (composites are
//!   converted to their reactive wrapper) and triggers `(ref, Set, "value")`.
//!   Every write notifies, including writes of an equal value.
//! - **Field refs** ([`Reactivity::to_refs`]) own nothing: reads and writes
//!   delegate to a property of an object, so tracking and notification come
//!   from that object's traps. They give callers a stable handle to one
//!   field that survives destructuring.
//!
//! Stored inside a reactive object, a ref is transparent: reading the
//! property yields the payload, and writing a non-ref value into the property
//! writes into the ref instead of replacing it.
//!
//! [`Reactivity::ref_value`]: crate::Reactivity::ref_value
//! [`Reactivity::to_refs`]: crate::Reactivity::to_refs

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ObjectResult;
use crate::reactive::Reactivity;
use crate::tracker::{ChangeInfo, TargetId, TrackOp, TriggerOp};
use crate::value::{PropertyKey, Value};

enum RefKind {
    Slot {
        value: RefCell<Value>,
        runtime: Reactivity,
    },
    Field {
        object: Value,
        key: PropertyKey,
    },
}

struct RefInner {
    id: TargetId,
    kind: RefKind,
}

/// A reactive box. Cloning yields another handle to the same ref.
#[derive(Clone)]
pub struct Ref {
    inner: Rc<RefInner>,
}

impl Ref {
    pub(crate) fn slot(runtime: Reactivity, value: Value) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: TargetId::next(),
                kind: RefKind::Slot {
                    value: RefCell::new(value),
                    runtime,
                },
            }),
        }
    }

    pub(crate) fn field(object: Value, key: PropertyKey) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: TargetId::next(),
                kind: RefKind::Field { object, key },
            }),
        }
    }

    /// Identity under which this ref is tracked.
    #[must_use]
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether this ref projects a field of another object.
    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self.inner.kind, RefKind::Field { .. })
    }

    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Read the payload.
    pub fn get(&self) -> Value {
        match &self.inner.kind {
            RefKind::Slot { value, runtime } => {
                runtime.track(self.id(), TrackOp::Get, Some(&PropertyKey::value_key()));
                value.borrow().clone()
            }
            RefKind::Field { object, key } => object.get(key),
        }
    }

    /// Write the payload.
    ///
    /// Slot refs always succeed. Field refs report whatever the underlying
    /// property write reports.
    pub fn set(&self, value: impl Into<Value>) -> ObjectResult<bool> {
        let value = value.into();
        match &self.inner.kind {
            RefKind::Slot {
                value: slot,
                runtime,
            } => {
                let old = slot.replace(runtime.convert(&value));
                drop(old);
                runtime.trigger(
                    self.id(),
                    TriggerOp::Set,
                    Some(&PropertyKey::value_key()),
                    || ChangeInfo {
                        old_value: None,
                        new_value: Some(value),
                    },
                );
                Ok(true)
            }
            RefKind::Field { object, key } => object.set(key, value),
        }
    }
}

/// Whether `value` is a ref.
#[must_use]
pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Ref {}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Ref");
        s.field("id", &self.id());
        if let RefKind::Field { key, .. } = &self.inner.kind {
            s.field("field", key);
        }
        s.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

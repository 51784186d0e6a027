#![forbid(unsafe_code)]

//! Wrappers: interception views over raw objects.
//!
//! A [`Proxy`] pairs a raw target with a trap set ([`ProxyHandler`]) and the
//! [`Reactivity`] context that created it. Every property operation issued
//! against the wrapper is routed to the trap set, which reads or mutates the
//! target and reports to the dependency collaborator.
//!
//! # Ownership
//!
//! The wrapper holds its target and its context strongly; the context's
//! registry holds the wrapper weakly. When the last handle to a wrapper is
//! released its drop hook removes the registry entries, so a later wrap call
//! for the same target builds a fresh wrapper.

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ObjectResult;
use crate::handlers::ProxyHandler;
use crate::object::RawObject;
use crate::reactive::Reactivity;
use crate::value::{PropertyKey, Value};

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u64);

impl ProxyId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Which view a wrapper provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Tracks reads, notifies on writes.
    Reactive,
    /// Tracks reads, rejects writes unless the mutation gate is open.
    Readonly,
    /// Readonly view for component inputs: top-level refs are not unwrapped.
    ReadonlyProps,
}

impl Flavor {
    #[must_use]
    pub const fn is_readonly(self) -> bool {
        matches!(self, Self::Readonly | Self::ReadonlyProps)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reactive => "reactive",
            Self::Readonly => "readonly",
            Self::ReadonlyProps => "readonly-props",
        }
    }
}

struct ProxyInner {
    id: ProxyId,
    flavor: Flavor,
    target: RawObject,
    handler: Rc<dyn ProxyHandler>,
    runtime: Reactivity,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        self.runtime
            .release_wrapper(self.id, self.target.id(), self.flavor);
    }
}

/// An interception view over a raw object.
///
/// Cloning yields another handle to the same wrapper.
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

/// Non-owning handle to a [`Proxy`].
#[derive(Clone)]
pub(crate) struct WeakProxy {
    inner: Weak<ProxyInner>,
}

impl WeakProxy {
    pub(crate) fn upgrade(&self) -> Option<Proxy> {
        self.inner.upgrade().map(|inner| Proxy { inner })
    }
}

impl Proxy {
    pub(crate) fn new(
        runtime: Reactivity,
        target: RawObject,
        flavor: Flavor,
        handler: Rc<dyn ProxyHandler>,
    ) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                id: ProxyId::next(),
                flavor,
                target,
                handler,
                runtime,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.inner.flavor
    }

    /// The raw object this wrapper intercepts.
    #[must_use]
    pub fn target(&self) -> &RawObject {
        &self.inner.target
    }

    /// The context that created this wrapper.
    #[must_use]
    pub fn runtime(&self) -> &Reactivity {
        &self.inner.runtime
    }

    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakProxy {
        WeakProxy {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Trap dispatch ────────────────────────────────────────────────

    pub(crate) fn get(&self, key: &PropertyKey) -> Value {
        let inner = &self.inner;
        inner.handler.get(&inner.runtime, &inner.target, key)
    }

    pub(crate) fn set(&self, key: &PropertyKey, value: Value, receiver: &Value) -> ObjectResult<bool> {
        let inner = &self.inner;
        inner
            .handler
            .set(&inner.runtime, &inner.target, key, value, receiver)
    }

    pub(crate) fn delete(&self, key: &PropertyKey) -> ObjectResult<bool> {
        let inner = &self.inner;
        inner.handler.delete_property(&inner.runtime, &inner.target, key)
    }

    pub(crate) fn has(&self, key: &PropertyKey) -> bool {
        let inner = &self.inner;
        inner.handler.has(&inner.runtime, &inner.target, key)
    }

    pub(crate) fn own_keys(&self) -> Vec<PropertyKey> {
        let inner = &self.inner;
        inner.handler.own_keys(&inner.runtime, &inner.target)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id())
            .field("flavor", &self.flavor())
            .field("target", &self.target().id())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Raw↔wrapper identity tables.
//!
//! Four weak tables guarantee at most one wrapper of each flavor per raw
//! object:
//!
//! | table              | key         | value        |
//! |--------------------|-------------|--------------|
//! | `raw_to_reactive`  | `TargetId`  | weak wrapper |
//! | `reactive_to_raw`  | `ProxyId`   | weak wrapper |
//! | `raw_to_readonly`  | `TargetId`  | weak wrapper |
//! | `readonly_to_raw`  | `ProxyId`   | weak wrapper |
//!
//! The reverse tables answer "is this a wrapper of mine, and of which
//! flavor"; the raw object itself is reached through the wrapper's own target
//! handle.
//!
//! Nothing here is ever the reason an object or wrapper stays alive. A
//! wrapper unregisters itself when its last handle is released; entries whose
//! wrapper died without reaching that hook (the registry was busy at the
//! time) are pruned lazily on lookup.

use ahash::AHashMap;

use crate::object::RawObject;
use crate::proxy::{Flavor, Proxy, ProxyId, WeakProxy};
use crate::tracker::TargetId;

#[derive(Default)]
pub(crate) struct IdentityRegistry {
    raw_to_reactive: AHashMap<TargetId, (ProxyId, WeakProxy)>,
    reactive_to_raw: AHashMap<ProxyId, WeakProxy>,
    raw_to_readonly: AHashMap<TargetId, (ProxyId, WeakProxy)>,
    readonly_to_raw: AHashMap<ProxyId, WeakProxy>,
}

impl IdentityRegistry {
    fn forward(&mut self, flavor: Flavor) -> &mut AHashMap<TargetId, (ProxyId, WeakProxy)> {
        match flavor {
            Flavor::Reactive => &mut self.raw_to_reactive,
            Flavor::Readonly | Flavor::ReadonlyProps => &mut self.raw_to_readonly,
        }
    }

    fn reverse(&mut self, readonly: bool) -> &mut AHashMap<ProxyId, WeakProxy> {
        if readonly {
            &mut self.readonly_to_raw
        } else {
            &mut self.reactive_to_raw
        }
    }

    /// The cached wrapper of `flavor` for `raw`, if it is still alive.
    pub(crate) fn lookup(&mut self, raw: &RawObject, flavor: Flavor) -> Option<Proxy> {
        let table = self.forward(flavor);
        let upgraded = table.get(&raw.id())?.1.upgrade();
        if upgraded.is_none() {
            table.remove(&raw.id());
        }
        upgraded
    }

    /// Whether `proxy` is a live entry of the reactive (or readonly) reverse
    /// table.
    pub(crate) fn contains(&mut self, proxy: &Proxy, readonly: bool) -> bool {
        self.reverse(readonly).contains_key(&proxy.id())
    }

    /// Record `proxy` as a wrapper of `raw`.
    ///
    /// `cache` controls whether later wrap calls for `raw` are handed this
    /// wrapper; the reverse entry is always recorded.
    pub(crate) fn register(&mut self, raw: &RawObject, proxy: &Proxy, cache: bool) {
        let flavor = proxy.flavor();
        if cache {
            self.forward(flavor)
                .insert(raw.id(), (proxy.id(), proxy.downgrade()));
        }
        self.reverse(flavor.is_readonly())
            .insert(proxy.id(), proxy.downgrade());
    }

    /// Drop every entry belonging to the wrapper `proxy_id`.
    pub(crate) fn unregister(&mut self, proxy_id: ProxyId, raw_id: TargetId, flavor: Flavor) {
        let forward = self.forward(flavor);
        if forward.get(&raw_id).is_some_and(|(id, _)| *id == proxy_id) {
            forward.remove(&raw_id);
        }
        self.reverse(flavor.is_readonly()).remove(&proxy_id);
    }

    /// Number of live wrappers (reactive, readonly).
    pub(crate) fn live_counts(&self) -> (usize, usize) {
        let live = |table: &AHashMap<ProxyId, WeakProxy>| {
            table.values().filter(|w| w.upgrade().is_some()).count()
        };
        (live(&self.reactive_to_raw), live(&self.readonly_to_raw))
    }
}

// Behavior is exercised through `Reactivity` (wrappers need a runtime to
// exist); see `reactive.rs` and `tests/`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Reactivity;
    use crate::value::Value;

    #[test]
    fn register_lookup_unregister() {
        let rx = Reactivity::new();
        let raw = RawObject::record();
        let Value::Proxy(proxy) = rx.reactive(&Value::from(raw.clone())) else {
            panic!("record should be wrapped");
        };

        let mut reg = IdentityRegistry::default();
        reg.register(&raw, &proxy, true);
        assert!(reg.contains(&proxy, false));
        assert!(!reg.contains(&proxy, true));
        assert!(Proxy::ptr_eq(
            &reg.lookup(&raw, Flavor::Reactive).unwrap(),
            &proxy
        ));
        assert!(reg.lookup(&raw, Flavor::Readonly).is_none());
        assert_eq!(reg.live_counts(), (1, 0));

        reg.unregister(proxy.id(), raw.id(), Flavor::Reactive);
        assert!(!reg.contains(&proxy, false));
        assert!(reg.lookup(&raw, Flavor::Reactive).is_none());
    }

    #[test]
    fn uncached_registration_is_reverse_only() {
        let rx = Reactivity::new();
        let raw = RawObject::record();
        let Value::Proxy(props) = rx.readonly_props(&Value::from(raw.clone())) else {
            panic!("record should be wrapped");
        };

        let mut reg = IdentityRegistry::default();
        reg.register(&raw, &props, false);
        assert!(reg.contains(&props, true));
        assert!(reg.lookup(&raw, Flavor::Readonly).is_none());
    }

    #[test]
    fn dead_wrappers_are_pruned_on_lookup() {
        let rx = Reactivity::new();
        let raw = RawObject::record();
        let mut reg = IdentityRegistry::default();
        {
            let Value::Proxy(proxy) = rx.reactive(&Value::from(raw.clone())) else {
                panic!("record should be wrapped");
            };
            reg.register(&raw, &proxy, true);
        }
        assert!(reg.lookup(&raw, Flavor::Reactive).is_none());
        assert_eq!(reg.live_counts(), (0, 0));
    }

    #[test]
    fn unregister_ignores_foreign_forward_entry() {
        let rx = Reactivity::new();
        let raw = RawObject::record();
        let Value::Proxy(proxy) = rx.reactive(&Value::from(raw.clone())) else {
            panic!("record should be wrapped");
        };
        let mut reg = IdentityRegistry::default();
        reg.register(&raw, &proxy, true);

        reg.unregister(ProxyId::next(), raw.id(), Flavor::Reactive);
        assert!(reg.lookup(&raw, Flavor::Reactive).is_some());
    }
}

#![forbid(unsafe_code)]

//! The runtime context.
//!
//! [`Reactivity`] owns everything wrappers share: the identity registry, the
//! mutation gate, the dependency collaborator, the configuration and the
//! installed trap sets. Cloning is cheap and yields another handle to the
//! same context; every wrapper and slot ref holds one.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use ftui_reactive::{RawObject, Reactivity, RecordingTracker, Value};
//!
//! let tracker = Rc::new(RecordingTracker::new());
//! let rx = Reactivity::with_tracker(tracker.clone());
//!
//! let state = rx.reactive(&Value::from(RawObject::from_entries([("count", 0)])));
//! assert_eq!(state.get("count"), Value::from(0));
//!
//! state.set("count", 1).unwrap();
//! assert_eq!(tracker.trigger_count(), 1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::classify::{TrapKind, can_observe, trap_kind};
use crate::config::ReactiveConfig;
use crate::gate::MutationGate;
use crate::handlers::{BaseHandler, ProxyHandler};
use crate::object::{ObjectFlags, ObjectKind, RawObject};
use crate::proxy::{Flavor, Proxy, ProxyId};
use crate::refs::Ref;
use crate::registry::IdentityRegistry;
use crate::tracker::{ChangeInfo, DepTracker, NoopTracker, TargetId, TrackOp, TriggerOp};
use crate::value::{PropertyKey, Value};

// ─── Handler sets ────────────────────────────────────────────────────────────

struct HandlerSet {
    mutable: Rc<dyn ProxyHandler>,
    readonly: Rc<dyn ProxyHandler>,
    props: Rc<dyn ProxyHandler>,
    container_mutable: Rc<dyn ProxyHandler>,
    container_readonly: Rc<dyn ProxyHandler>,
}

impl HandlerSet {
    fn new(container: Option<(Rc<dyn ProxyHandler>, Rc<dyn ProxyHandler>)>) -> Self {
        let mutable: Rc<dyn ProxyHandler> = Rc::new(BaseHandler::MUTABLE);
        let readonly: Rc<dyn ProxyHandler> = Rc::new(BaseHandler::READONLY);
        let (container_mutable, container_readonly) =
            container.unwrap_or_else(|| (mutable.clone(), readonly.clone()));
        Self {
            mutable,
            readonly,
            props: Rc::new(BaseHandler::READONLY_PROPS),
            container_mutable,
            container_readonly,
        }
    }

    fn select(&self, flavor: Flavor, kind: ObjectKind) -> Rc<dyn ProxyHandler> {
        let handler = match (trap_kind(kind), flavor) {
            (TrapKind::Record, Flavor::Reactive) => &self.mutable,
            (TrapKind::Record, Flavor::Readonly) => &self.readonly,
            (TrapKind::Record, Flavor::ReadonlyProps) => &self.props,
            (TrapKind::Container, Flavor::Reactive) => &self.container_mutable,
            (TrapKind::Container, Flavor::Readonly | Flavor::ReadonlyProps) => {
                &self.container_readonly
            }
        };
        Rc::clone(handler)
    }
}

// ─── Context ─────────────────────────────────────────────────────────────────

struct Core {
    registry: RefCell<IdentityRegistry>,
    gate: MutationGate,
    tracker: Rc<dyn DepTracker>,
    config: ReactiveConfig,
    handlers: HandlerSet,
}

/// A reactivity context: creates wrappers and refs and routes their
/// track/trigger calls to one dependency collaborator.
///
/// Not `Send`: a context and everything it creates live on one thread.
#[derive(Clone)]
pub struct Reactivity {
    core: Rc<Core>,
}

/// Builder for [`Reactivity`].
#[derive(Default)]
pub struct ReactivityBuilder {
    config: Option<ReactiveConfig>,
    tracker: Option<Rc<dyn DepTracker>>,
    container: Option<(Rc<dyn ProxyHandler>, Rc<dyn ProxyHandler>)>,
}

impl ReactivityBuilder {
    /// Use `config` instead of [`ReactiveConfig::from_env`].
    #[must_use]
    pub fn config(mut self, config: ReactiveConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Route track/trigger calls to `tracker` instead of dropping them.
    #[must_use]
    pub fn tracker(mut self, tracker: Rc<dyn DepTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Install trap sets for keyed/set containers (`Map`, `Set`, `WeakMap`,
    /// `WeakSet`). Without them containers get the record traps.
    #[must_use]
    pub fn container_handlers(
        mut self,
        mutable: Rc<dyn ProxyHandler>,
        readonly: Rc<dyn ProxyHandler>,
    ) -> Self {
        self.container = Some((mutable, readonly));
        self
    }

    #[must_use]
    pub fn build(self) -> Reactivity {
        Reactivity {
            core: Rc::new(Core {
                registry: RefCell::new(IdentityRegistry::default()),
                gate: MutationGate::new(),
                tracker: self.tracker.unwrap_or_else(|| Rc::new(NoopTracker)),
                config: self.config.unwrap_or_else(ReactiveConfig::from_env),
                handlers: HandlerSet::new(self.container),
            }),
        }
    }
}

impl Default for Reactivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactivity {
    /// A context with no dependency collaborator and environment-derived
    /// configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn with_tracker(tracker: Rc<dyn DepTracker>) -> Self {
        Self::builder().tracker(tracker).build()
    }

    #[must_use]
    pub fn builder() -> ReactivityBuilder {
        ReactivityBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &ReactiveConfig {
        &self.core.config
    }

    /// The gate shared by this context's readonly wrappers.
    #[must_use]
    pub fn gate(&self) -> &MutationGate {
        &self.core.gate
    }

    /// Run `f` with the mutation gate open.
    pub fn with_unlocked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _open = self.core.gate.open();
        f()
    }

    // ── Wrapping ─────────────────────────────────────────────────────

    /// The reactive view of `value`.
    ///
    /// - a readonly wrapper, from any context, is returned unchanged;
    /// - a raw object tagged with [`mark_readonly`](Self::mark_readonly) gets
    ///   its readonly view instead;
    /// - ineligible values (primitives, refs, opted-out or frozen objects,
    ///   opaque kinds) are returned unchanged.
    ///
    /// Repeated calls for the same raw object return the same wrapper for as
    /// long as it is alive.
    pub fn reactive(&self, value: &Value) -> Value {
        if let Value::Proxy(proxy) = value
            && proxy.flavor().is_readonly()
        {
            return value.clone();
        }
        if let Some(raw) = value.raw_target()
            && raw.flags().contains(ObjectFlags::MARK_READONLY)
        {
            return self.readonly(value);
        }
        self.create(value, Flavor::Reactive)
    }

    /// The readonly view of `value`.
    ///
    /// A reactive wrapper is first resolved to its raw object, so
    /// `readonly(reactive(x))` and `readonly(x)` are the same wrapper.
    pub fn readonly(&self, value: &Value) -> Value {
        if let Value::Proxy(proxy) = value
            && proxy.flavor() == Flavor::Reactive
        {
            return self.create(&Value::Object(proxy.target().clone()), Flavor::Readonly);
        }
        self.create(value, Flavor::Readonly)
    }

    /// A readonly view for component inputs.
    ///
    /// Refs stored directly on the object are handed out as refs; nested
    /// composites are still wrapped readonly. Every call builds a fresh
    /// wrapper.
    pub fn readonly_props(&self, value: &Value) -> Value {
        if let Value::Proxy(proxy) = value
            && proxy.flavor() == Flavor::Reactive
        {
            return self.create(
                &Value::Object(proxy.target().clone()),
                Flavor::ReadonlyProps,
            );
        }
        self.create(value, Flavor::ReadonlyProps)
    }

    fn create(&self, value: &Value, flavor: Flavor) -> Value {
        let cache = flavor != Flavor::ReadonlyProps;
        let raw = match value {
            Value::Object(raw) => raw.clone(),
            // Callers only pass wrappers that are already of the requested
            // access kind; a foreign one is re-wrapped over its target.
            Value::Proxy(proxy) => {
                if self.owns(proxy, flavor.is_readonly()) {
                    return value.clone();
                }
                proxy.target().clone()
            }
            _ => {
                if !value.is_ref() && self.core.config.dev_diagnostics {
                    warn!(
                        value = ?value,
                        "value cannot be made {}: {}",
                        flavor.as_str(),
                        value.type_name()
                    );
                }
                return value.clone();
            }
        };

        if cache {
            let cached = self.core.registry.borrow_mut().lookup(&raw, flavor);
            if let Some(existing) = cached {
                return Value::Proxy(existing);
            }
        }
        if !can_observe(&raw) {
            return value.clone();
        }

        let handler = self.core.handlers.select(flavor, raw.kind());
        let proxy = Proxy::new(self.clone(), raw.clone(), flavor, handler);
        self.core
            .registry
            .borrow_mut()
            .register(&raw, &proxy, cache);
        self.core.tracker.register_target(raw.id());
        debug!(
            target_id = raw.id().raw(),
            proxy_id = proxy.id().raw(),
            flavor = flavor.as_str(),
            kind = raw.kind().as_str(),
            "created wrapper"
        );
        Value::Proxy(proxy)
    }

    fn owns(&self, proxy: &Proxy, readonly: bool) -> bool {
        self.core.registry.borrow_mut().contains(proxy, readonly)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whether `value` is a wrapper created by this context, of any flavor.
    #[must_use]
    pub fn is_reactive(&self, value: &Value) -> bool {
        matches!(
            value,
            Value::Proxy(proxy) if self.owns(proxy, false) || self.owns(proxy, true)
        )
    }

    /// Whether `value` is a readonly (or props) wrapper, whichever context
    /// created it.
    #[must_use]
    pub fn is_readonly(&self, value: &Value) -> bool {
        matches!(value, Value::Proxy(proxy) if proxy.flavor().is_readonly())
    }

    /// The raw object behind a wrapper; anything else unchanged.
    #[must_use]
    pub fn to_raw(&self, value: &Value) -> Value {
        match value {
            Value::Proxy(proxy) => Value::Object(proxy.target().clone()),
            _ => value.clone(),
        }
    }

    // ── Policy tags ──────────────────────────────────────────────────

    /// Tag the raw object so that `reactive` hands out its readonly view.
    /// Irreversible.
    pub fn mark_readonly(&self, value: &Value) -> Value {
        self.tag(value, ObjectFlags::MARK_READONLY)
    }

    /// Tag the raw object so that it is never wrapped. Irreversible.
    pub fn mark_non_reactive(&self, value: &Value) -> Value {
        self.tag(value, ObjectFlags::MARK_NON_REACTIVE)
    }

    fn tag(&self, value: &Value, flags: ObjectFlags) -> Value {
        if let Some(raw) = value.raw_target() {
            raw.insert_flags(flags);
        }
        value.clone()
    }

    // ── Refs ─────────────────────────────────────────────────────────

    /// A slot ref holding `value`. A ref is returned as-is.
    pub fn ref_value(&self, value: impl Into<Value>) -> Ref {
        match value.into() {
            Value::Ref(r) => r,
            other => Ref::slot(self.clone(), self.convert(&other)),
        }
    }

    /// One ref per enumerable key of `object`, each reading and writing
    /// through to the object.
    ///
    /// Keys come from the object itself, then from each prototype in turn;
    /// a shadowed key is listed once. `object` is expected to be a wrapper;
    /// otherwise the refs still work but nothing is tracked. A property that
    /// already holds a ref yields that ref. Symbol keys are skipped, as is an
    /// array's `length`.
    pub fn to_refs(&self, object: &Value) -> Vec<(PropertyKey, Ref)> {
        if self.core.config.dev_diagnostics && !self.is_reactive(object) {
            warn!(
                value = ?object,
                "to_refs() expects a reactive object but received a plain one"
            );
        }
        if object.raw_target().is_none() {
            return Vec::new();
        }
        enumerable_keys(object)
            .into_iter()
            .map(|key| {
                let r = match object.get(&key) {
                    Value::Ref(existing) => existing,
                    _ => Ref::field(object.clone(), key.clone()),
                };
                (key, r)
            })
            .collect()
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Number of live wrappers (reactive, readonly) created by this context.
    #[must_use]
    pub fn live_wrappers(&self) -> (usize, usize) {
        self.core.registry.borrow().live_counts()
    }

    // ── Plumbing for traps and refs ──────────────────────────────────

    /// Composites become their reactive view; everything else is unchanged.
    pub(crate) fn convert(&self, value: &Value) -> Value {
        if value.is_object() {
            self.reactive(value)
        } else {
            value.clone()
        }
    }

    pub(crate) fn track(&self, target: TargetId, op: TrackOp, key: Option<&PropertyKey>) {
        trace!(target_id = target.raw(), op = op.as_str(), key = ?key, "track");
        self.core.tracker.track(target, op, key);
    }

    pub(crate) fn trigger(
        &self,
        target: TargetId,
        op: TriggerOp,
        key: Option<&PropertyKey>,
        info: impl FnOnce() -> ChangeInfo,
    ) {
        trace!(target_id = target.raw(), op = op.as_str(), key = ?key, "trigger");
        if self.core.config.change_info {
            let info = info();
            self.core.tracker.trigger(target, op, key, Some(&info));
        } else {
            self.core.tracker.trigger(target, op, key, None);
        }
    }

    /// Drop hook of a wrapper.
    pub(crate) fn release_wrapper(&self, proxy: ProxyId, target: TargetId, flavor: Flavor) {
        // A busy registry means the drop happened inside a registry call;
        // the stale entry is pruned on the next lookup instead.
        if let Ok(mut registry) = self.core.registry.try_borrow_mut() {
            registry.unregister(proxy, target, flavor);
        }
    }
}

/// String-keyed properties visible on `object`: own keys first, then each
/// prototype's. Prototype chains are acyclic, so the walk ends.
fn enumerable_keys(object: &Value) -> Vec<PropertyKey> {
    let mut keys: Vec<PropertyKey> = Vec::new();
    let mut level = Some(object.clone());
    while let Some(current) = level {
        let is_array = current
            .raw_target()
            .is_some_and(|raw| raw.kind() == ObjectKind::Array);
        for key in current.own_keys() {
            let skip = matches!(key, PropertyKey::Symbol(_))
                || (is_array && key.is_name("length"))
                || keys.contains(&key);
            if !skip {
                keys.push(key);
            }
        }
        level = current.raw_target().and_then(RawObject::prototype);
    }
    keys
}

impl fmt::Debug for Reactivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (reactive, readonly) = self.live_wrappers();
        f.debug_struct("Reactivity")
            .field("config", &self.core.config)
            .field("gate_open", &self.core.gate.is_open())
            .field("live_reactive", &reactive)
            .field("live_readonly", &readonly)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

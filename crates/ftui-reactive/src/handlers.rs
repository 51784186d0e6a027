#![forbid(unsafe_code)]

//! Trap sets: the interception layer.
//!
//! A [`ProxyHandler`] receives every property operation issued against a
//! wrapper. [`BaseHandler`] is the record trap set, parameterized by:
//!
//! - `readonly`: writes and deletes consult the [`MutationGate`] and nested
//!   composites are wrapped readonly;
//! - `unwrap_refs`: a ref stored directly in a property reads as its payload.
//!
//! # Read rules
//!
//! | raw value                | result                          | tracked |
//! |--------------------------|---------------------------------|---------|
//! | under a built-in symbol  | as-is                           | no      |
//! | ref (`unwrap_refs`)      | the ref's payload               | by ref  |
//! | composite                | wrapped lazily, same flavor     | yes     |
//! | anything else            | as-is                           | yes     |
//!
//! # Write rules
//!
//! The incoming value is stored in raw form; a wrapper is never stored as a
//! property value. Writing a non-ref over a ref writes *into* the ref. A key
//! that was not an own property fires `Add`; an existing one fires `Set` only
//! if [`has_changed`]. Neither fires when the write merely passed through
//! this target on its way up a prototype chain.
//!
//! [`MutationGate`]: crate::gate::MutationGate

use tracing::warn;

use crate::error::ObjectResult;
use crate::object::RawObject;
use crate::reactive::Reactivity;
use crate::tracker::{ChangeInfo, TrackOp, TriggerOp};
use crate::value::{PropertyKey, Value, has_changed};

/// A set of traps intercepting property operations on a wrapper.
///
/// Container-specific trap sets implement this trait and are installed with
/// [`ReactivityBuilder::container_handlers`](crate::ReactivityBuilder::container_handlers).
pub trait ProxyHandler {
    /// Intercept a property read.
    fn get(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey) -> Value;

    /// Intercept a property write issued against `receiver`.
    ///
    /// `Ok(false)` reports a write rejected by policy.
    fn set(
        &self,
        rx: &Reactivity,
        target: &RawObject,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> ObjectResult<bool>;

    /// Intercept a property delete. `Ok(false)` reports a rejected delete.
    fn delete_property(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey)
    -> ObjectResult<bool>;

    /// Intercept an existence check.
    fn has(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey) -> bool;

    /// Intercept key enumeration.
    fn own_keys(&self, rx: &Reactivity, target: &RawObject) -> Vec<PropertyKey>;
}

/// The record trap set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHandler {
    readonly: bool,
    unwrap_refs: bool,
}

impl BaseHandler {
    /// Traps for reactive wrappers.
    pub const MUTABLE: Self = Self::new(false, true);
    /// Traps for readonly wrappers.
    pub const READONLY: Self = Self::new(true, true);
    /// Traps for component-input wrappers: readonly, top-level refs kept.
    pub const READONLY_PROPS: Self = Self::new(true, false);

    #[must_use]
    pub const fn new(readonly: bool, unwrap_refs: bool) -> Self {
        Self {
            readonly,
            unwrap_refs,
        }
    }

    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    #[must_use]
    pub const fn unwraps_refs(&self) -> bool {
        self.unwrap_refs
    }

    fn wrap_nested(&self, rx: &Reactivity, value: Value) -> Value {
        if !value.is_object() {
            return value;
        }
        if self.readonly {
            rx.readonly(&value)
        } else {
            rx.reactive(&value)
        }
    }

    fn warn_rejected(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey, op: &str) {
        if rx.config().dev_diagnostics {
            warn!(
                key = %key,
                target_id = target.id().raw(),
                "{op} operation on key \"{key}\" failed: target is readonly"
            );
        }
    }
}

impl ProxyHandler for BaseHandler {
    fn get(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey) -> Value {
        let res = target.get(key);
        if key.is_builtin_symbol() {
            return res;
        }
        if self.unwrap_refs
            && let Value::Ref(r) = &res
        {
            let inner = r.get();
            return self.wrap_nested(rx, inner);
        }
        rx.track(target.id(), TrackOp::Get, Some(key));
        self.wrap_nested(rx, res)
    }

    fn set(
        &self,
        rx: &Reactivity,
        target: &RawObject,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> ObjectResult<bool> {
        if self.readonly && !rx.gate().is_open() {
            self.warn_rejected(rx, target, key, "set");
            return Ok(false);
        }
        set_tracked(rx, target, key, value, receiver)
    }

    fn delete_property(
        &self,
        rx: &Reactivity,
        target: &RawObject,
        key: &PropertyKey,
    ) -> ObjectResult<bool> {
        if self.readonly && !rx.gate().is_open() {
            self.warn_rejected(rx, target, key, "delete");
            return Ok(false);
        }
        delete_tracked(rx, target, key)
    }

    fn has(&self, rx: &Reactivity, target: &RawObject, key: &PropertyKey) -> bool {
        let result = target.has(key);
        rx.track(target.id(), TrackOp::Has, Some(key));
        result
    }

    fn own_keys(&self, rx: &Reactivity, target: &RawObject) -> Vec<PropertyKey> {
        rx.track(target.id(), TrackOp::Iterate, None);
        target.own_keys()
    }
}

/// The mutable write path, shared by reactive wrappers and readonly wrappers
/// with the gate open.
pub fn set_tracked(
    rx: &Reactivity,
    target: &RawObject,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> ObjectResult<bool> {
    let value = rx.to_raw(&value);
    let old_value = target.get(key);
    if let Value::Ref(old_ref) = &old_value
        && !value.is_ref()
    {
        // The ref's own setter notifies its subscribers.
        old_ref.set(value)?;
        return Ok(true);
    }

    let had_key = target.has_own(key);
    let result = target.set(key, value.clone(), receiver)?;

    let landed_here = receiver
        .raw_target()
        .is_some_and(|raw| RawObject::ptr_eq(raw, target));
    if landed_here {
        if !had_key {
            rx.trigger(target.id(), TriggerOp::Add, Some(key), || ChangeInfo {
                old_value: None,
                new_value: Some(value),
            });
        } else if has_changed(&value, &old_value) {
            rx.trigger(target.id(), TriggerOp::Set, Some(key), || ChangeInfo {
                old_value: Some(old_value),
                new_value: Some(value),
            });
        }
    }
    Ok(result)
}

/// The mutable delete path.
pub fn delete_tracked(rx: &Reactivity, target: &RawObject, key: &PropertyKey) -> ObjectResult<bool> {
    let had_key = target.has_own(key);
    let old_value = target.get_own(key);
    let result = target.delete(key)?;
    if result && had_key {
        rx.trigger(target.id(), TriggerOp::Delete, Some(key), || ChangeInfo {
            old_value,
            new_value: None,
        });
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::config::ReactiveConfig;
    use crate::tracker::{RecordingTracker, TrackerEvent};
    use crate::value::{Symbol, WellKnownSymbol};

    fn setup() -> (Reactivity, Rc<RecordingTracker>) {
        let tracker = Rc::new(RecordingTracker::new());
        let rx = Reactivity::builder()
            .config(ReactiveConfig::development())
            .tracker(tracker.clone())
            .build();
        (rx, tracker)
    }

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn builtin_symbol_reads_are_untracked() {
        let (rx, tracker) = setup();
        let raw = RawObject::record();
        let iter = PropertyKey::from(WellKnownSymbol::Iterator);
        raw.insert(iter.clone(), RawObject::record()).unwrap();
        let w = rx.reactive(&Value::from(raw));
        tracker.clear();

        let res = w.get(iter);
        assert!(matches!(res, Value::Object(_)), "returned unwrapped");
        assert!(tracker.events().is_empty());

        // A user symbol is an ordinary key.
        let own = Symbol::new("own");
        w.get(own.clone());
        assert_eq!(tracker.tracks().len(), 1);
    }

    #[test]
    fn has_tracks_with_has_op() {
        let (rx, tracker) = setup();
        let w = rx.reactive(&Value::from(RawObject::from_entries([("a", 1)])));
        tracker.clear();
        assert!(w.has("a"));
        assert!(!w.has("b"));
        let ops: Vec<_> = tracker
            .tracks()
            .into_iter()
            .map(|e| match e {
                TrackerEvent::Track { op, .. } => op,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ops, vec![TrackOp::Has, TrackOp::Has]);
    }

    #[test]
    fn own_keys_tracks_iterate_without_key() {
        let (rx, tracker) = setup();
        let raw = RawObject::from_entries([("a", 1), ("b", 2)]);
        let w = rx.reactive(&Value::from(raw.clone()));
        tracker.clear();
        assert_eq!(w.own_keys(), vec![key("a"), key("b")]);
        assert_eq!(
            tracker.events(),
            vec![TrackerEvent::Track {
                target: raw.id(),
                op: TrackOp::Iterate,
                key: None,
            }]
        );
    }

    #[test]
    fn wrappers_are_stored_raw() {
        let (rx, _) = setup();
        let parent = RawObject::record();
        let child = RawObject::record();
        let w = rx.reactive(&Value::from(parent.clone()));
        let wrapped_child = rx.reactive(&Value::from(child.clone()));
        w.set("child", wrapped_child.clone()).unwrap();

        let stored = parent.get_own(&key("child")).unwrap();
        assert_eq!(stored, Value::from(child));
        assert_eq!(w.get("child"), wrapped_child);
    }

    #[test]
    fn delete_reports_old_value() {
        let (rx, tracker) = setup();
        let raw = RawObject::from_entries([("a", 7)]);
        let w = rx.reactive(&Value::from(raw.clone()));
        tracker.clear();
        assert_eq!(w.delete("a"), Ok(true));
        assert_eq!(
            tracker.triggers(),
            vec![TrackerEvent::Trigger {
                target: raw.id(),
                op: TriggerOp::Delete,
                key: Some(key("a")),
                info: Some(ChangeInfo {
                    old_value: Some(Value::from(7)),
                    new_value: None,
                }),
            }]
        );
    }

    #[test]
    fn change_info_is_omitted_when_disabled() {
        let tracker = Rc::new(RecordingTracker::new());
        let rx = Reactivity::builder()
            .config(ReactiveConfig::production())
            .tracker(tracker.clone())
            .build();
        let w = rx.reactive(&Value::from(RawObject::record()));
        w.set("a", 1).unwrap();
        assert!(matches!(
            tracker.triggers().as_slice(),
            [TrackerEvent::Trigger { info: None, .. }]
        ));
    }

    #[test]
    fn readonly_rejection_does_not_touch_target() {
        let (rx, tracker) = setup();
        let raw = RawObject::from_entries([("a", 1)]);
        let r = rx.readonly(&Value::from(raw.clone()));
        tracker.clear();

        assert_eq!(r.set("a", 2), Ok(false));
        assert_eq!(r.set("b", 2), Ok(false));
        assert_eq!(r.delete("a"), Ok(false));
        assert_eq!(raw.get_own(&key("a")), Some(Value::from(1)));
        assert!(!raw.has_own(&key("b")));
        assert_eq!(tracker.trigger_count(), 0);
    }

    #[test]
    fn raw_failures_propagate_through_traps() {
        let (rx, tracker) = setup();
        let raw = RawObject::from_entries([("a", 1)]);
        let w = rx.reactive(&Value::from(raw.clone()));
        raw.freeze();
        tracker.clear();

        assert!(w.set("a", 2).is_err());
        assert!(w.delete("a").is_err());
        assert_eq!(tracker.trigger_count(), 0);
    }

    #[test]
    fn handler_parameters() {
        assert!(!BaseHandler::MUTABLE.is_readonly());
        assert!(BaseHandler::MUTABLE.unwraps_refs());
        assert!(BaseHandler::READONLY.is_readonly());
        assert!(!BaseHandler::READONLY_PROPS.unwraps_refs());
    }
}

#![forbid(unsafe_code)]

//! Wrap eligibility and trap-set selection.
//!
//! A raw object can be observed when:
//!
//! 1. its kind is whitelisted ([`ObjectKind::is_observable`]),
//! 2. it is not frozen,
//! 3. it carries neither `MARK_NON_REACTIVE` nor `FRAMEWORK_INTERNAL`.
//!
//! Keyed/set containers get the container trap set; everything else gets the
//! record trap set.

use crate::object::{ObjectFlags, ObjectKind, RawObject};

/// Which trap set intercepts a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Record,
    Container,
}

/// Whether `obj` may receive a wrapper.
#[must_use]
pub fn can_observe(obj: &RawObject) -> bool {
    let opted_out = ObjectFlags::FROZEN
        | ObjectFlags::MARK_NON_REACTIVE
        | ObjectFlags::FRAMEWORK_INTERNAL;
    obj.kind().is_observable() && !obj.flags().intersects(opted_out)
}

#[must_use]
pub fn trap_kind(kind: ObjectKind) -> TrapKind {
    if kind.is_container() {
        TrapKind::Container
    } else {
        TrapKind::Record
    }
}

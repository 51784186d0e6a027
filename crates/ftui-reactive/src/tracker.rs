#![forbid(unsafe_code)]

//! The seam to the dependency collaborator.
//!
//! This crate decides *when* a read is observed and *when* a write is a
//! change; what to do about it belongs to a [`DepTracker`]. The effect engine
//! that records the active computation as a subscriber and re-runs
//! subscribers on change implements this trait.
//!
//! Targets are referenced by [`TargetId`] only. Raw objects and refs draw
//! ids from the same sequence, so an id names exactly one target for the
//! lifetime of the process.
//!
//! Two trackers ship with the crate:
//!
//! - [`NoopTracker`]: discards everything (the default).
//! - [`RecordingTracker`]: keeps an ordered event log; used by tests and
//!   handy when debugging why something did or did not re-run.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;

use crate::value::{PropertyKey, Value};

// ─── Target ids ──────────────────────────────────────────────────────────────

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a trackable target (a raw object or a ref).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─── Operation kinds ─────────────────────────────────────────────────────────

/// Kind of observed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    /// A property value was read.
    Get,
    /// A property's existence was checked. Invalidated by add/delete even
    /// when no value was read.
    Has,
    /// The key list was enumerated. Invalidated by add/delete, not by set.
    Iterate,
}

impl TrackOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Has => "has",
            Self::Iterate => "iterate",
        }
    }
}

/// Kind of observed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    /// A key appeared on the target.
    Add,
    /// An existing key's value changed.
    Set,
    /// A key was removed from the target.
    Delete,
}

impl TriggerOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Set => "set",
            Self::Delete => "delete",
        }
    }
}

/// Development-time detail attached to a trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeInfo {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

// ─── Collaborator trait ──────────────────────────────────────────────────────

/// Consumer of track/trigger calls.
///
/// Calls arrive synchronously from inside trap execution. Implementations
/// may re-enter the reactive API (read other wrappers, create refs); no
/// interior borrow is held across these calls.
pub trait DepTracker {
    /// A target was wrapped for the first time; make sure it has an entry.
    fn register_target(&self, _target: TargetId) {}

    /// An observed read.
    fn track(&self, target: TargetId, op: TrackOp, key: Option<&PropertyKey>);

    /// An observed mutation.
    fn trigger(
        &self,
        target: TargetId,
        op: TriggerOp,
        key: Option<&PropertyKey>,
        info: Option<&ChangeInfo>,
    );
}

/// Tracker that ignores every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl DepTracker for NoopTracker {
    fn track(&self, _target: TargetId, _op: TrackOp, _key: Option<&PropertyKey>) {}

    fn trigger(
        &self,
        _target: TargetId,
        _op: TriggerOp,
        _key: Option<&PropertyKey>,
        _info: Option<&ChangeInfo>,
    ) {
    }
}

// ─── Recording tracker ───────────────────────────────────────────────────────

/// One call received by a [`RecordingTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Register {
        target: TargetId,
    },
    Track {
        target: TargetId,
        op: TrackOp,
        key: Option<PropertyKey>,
    },
    Trigger {
        target: TargetId,
        op: TriggerOp,
        key: Option<PropertyKey>,
        info: Option<ChangeInfo>,
    },
}

impl TrackerEvent {
    #[must_use]
    pub fn target(&self) -> TargetId {
        match self {
            Self::Register { target }
            | Self::Track { target, .. }
            | Self::Trigger { target, .. } => *target,
        }
    }

    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger { .. })
    }

    #[must_use]
    pub fn is_track(&self) -> bool {
        matches!(self, Self::Track { .. })
    }
}

/// Tracker that records every call, in order.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    events: RefCell<Vec<TrackerEvent>>,
    registered: RefCell<AHashSet<TargetId>>,
}

impl RecordingTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<TrackerEvent> {
        self.events.borrow().clone()
    }

    /// Drain the event log. Registrations are kept.
    pub fn take(&self) -> Vec<TrackerEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Forget all events. Registrations are kept.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    #[must_use]
    pub fn tracks(&self) -> Vec<TrackerEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.is_track())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn triggers(&self) -> Vec<TrackerEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.is_trigger())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.events.borrow().iter().filter(|e| e.is_trigger()).count()
    }

    /// Whether `target` has a dependency entry.
    #[must_use]
    pub fn is_registered(&self, target: TargetId) -> bool {
        self.registered.borrow().contains(&target)
    }

    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registered.borrow().len()
    }
}

impl DepTracker for RecordingTracker {
    fn register_target(&self, target: TargetId) {
        if self.registered.borrow_mut().insert(target) {
            self.events
                .borrow_mut()
                .push(TrackerEvent::Register { target });
        }
    }

    fn track(&self, target: TargetId, op: TrackOp, key: Option<&PropertyKey>) {
        self.events.borrow_mut().push(TrackerEvent::Track {
            target,
            op,
            key: key.cloned(),
        });
    }

    fn trigger(
        &self,
        target: TargetId,
        op: TriggerOp,
        key: Option<&PropertyKey>,
        info: Option<&ChangeInfo>,
    ) {
        self.events.borrow_mut().push(TrackerEvent::Trigger {
            target,
            op,
            key: key.cloned(),
            info: info.cloned(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Reactive and readonly object wrappers for FrankenTUI.
//!
//! This crate turns plain composite data into observable values. Wrapping an
//! object produces an interception view that reports every read to a
//! dependency collaborator ("track") and every effective change ("trigger"),
//! so derived computations can be re-run exactly when their inputs change.
//!
//! - [`Reactivity`]: the context. Creates wrappers ([`Reactivity::reactive`],
//!   [`Reactivity::readonly`], [`Reactivity::readonly_props`]) and refs
//!   ([`Reactivity::ref_value`], [`Reactivity::to_refs`]).
//! - [`Value`]: the dynamic value all property access goes through.
//! - [`RawObject`]: the application-owned composite behind a wrapper.
//! - [`Proxy`]: a wrapper. [`Ref`]: a single-slot reactive box.
//! - [`DepTracker`]: the seam to the dependency graph.
//! - [`MutationGate`]: lets privileged code write through readonly views.
//!
//! # Invariants
//!
//! 1. Wrapping is idempotent: one reactive and one readonly wrapper per raw
//!    object, for as long as the wrapper is alive.
//! 2. `reactive` on a readonly wrapper returns it unchanged.
//! 3. `readonly(reactive(x))` is `readonly(x)`.
//! 4. Only eligible composites are wrapped; everything else passes through.
//! 5. Writing a non-ref over a property holding a ref writes into the ref.
//! 6. `Add` fires only when a key first appears on the object written to;
//!    `Set` fires only when the value actually changed.
//!
//! # Architecture
//!
//! Everything is single-threaded and `Rc`-based. The registry holds wrappers
//! weakly and a wrapper unregisters itself when its last handle is released.
//! Nested composites are wrapped on read, never up front, so cyclic graphs
//! are safe to wrap.

pub mod classify;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod object;
pub mod proxy;
pub mod reactive;
pub mod refs;
mod registry;
pub mod tracker;
pub mod value;

pub use classify::{TrapKind, can_observe};
pub use config::ReactiveConfig;
pub use error::{ObjectError, ObjectResult};
pub use gate::{GateGuard, MutationGate};
pub use handlers::{BaseHandler, ProxyHandler};
pub use object::{ObjectFlags, ObjectKind, RawObject};
pub use proxy::{Flavor, Proxy, ProxyId};
pub use reactive::{Reactivity, ReactivityBuilder};
pub use refs::{Ref, is_ref};
pub use tracker::{
    ChangeInfo, DepTracker, NoopTracker, RecordingTracker, TargetId, TrackOp, TrackerEvent,
    TriggerOp,
};
pub use value::{PropertyKey, Symbol, Value, WellKnownSymbol, has_changed};

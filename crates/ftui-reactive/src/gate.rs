#![forbid(unsafe_code)]

//! The readonly mutation gate.
//!
//! Readonly wrappers reject writes and deletes. Framework code that owns the
//! data behind a readonly view (a component updating the props it handed to
//! a child, for instance) opens the gate for the duration of the update:
//! while it is open, readonly wrappers behave exactly like reactive ones.
//!
//! The gate belongs to one [`Reactivity`](crate::Reactivity) context and is
//! only ever opened through a [`GateGuard`], which restores the previous
//! state when it goes out of scope, including during unwinding. Guards nest.

use std::cell::Cell;

/// Toggle permitting privileged writes through readonly wrappers.
///
/// Closed by default.
#[derive(Debug, Default)]
pub struct MutationGate {
    open: Cell<bool>,
}

impl MutationGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether writes through readonly wrappers currently go through.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Open the gate until the returned guard is dropped.
    #[must_use = "the gate closes again as soon as the guard is dropped"]
    pub fn open(&self) -> GateGuard<'_> {
        GateGuard {
            gate: self,
            previous: self.open.replace(true),
        }
    }

    /// Close the gate until the returned guard is dropped.
    ///
    /// Lets a privileged section hand control to untrusted code without
    /// lending it write access.
    #[must_use = "the previous state is restored as soon as the guard is dropped"]
    pub fn close(&self) -> GateGuard<'_> {
        GateGuard {
            gate: self,
            previous: self.open.replace(false),
        }
    }
}

/// RAII guard restoring the gate's previous state on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a MutationGate,
    previous: bool,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.open.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_by_default() {
        assert!(!MutationGate::new().is_open());
    }

    #[test]
    fn guard_restores_on_drop() {
        let gate = MutationGate::new();
        {
            let _open = gate.open();
            assert!(gate.is_open());
        }
        assert!(!gate.is_open());
    }

    #[test]
    fn guards_nest() {
        let gate = MutationGate::new();
        let outer = gate.open();
        {
            let _inner = gate.close();
            assert!(!gate.is_open());
            {
                let _again = gate.open();
                assert!(gate.is_open());
            }
            assert!(!gate.is_open());
        }
        assert!(gate.is_open());
        drop(outer);
        assert!(!gate.is_open());
    }

    #[test]
    fn guard_restores_during_unwind() {
        let gate = MutationGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _open = gate.open();
            panic!("privileged section failed");
        }));
        assert!(result.is_err());
        assert!(!gate.is_open());
    }
}

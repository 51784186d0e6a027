#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Defaults follow the build profile: debug builds get development
//! diagnostics and change details on every trigger, release builds get
//! neither. Environment variables override the defaults:
//!
//! | variable                     | field             |
//! |------------------------------|-------------------|
//! | `FTUI_REACTIVE_DEV_WARNINGS` | `dev_diagnostics` |
//! | `FTUI_REACTIVE_CHANGE_INFO`  | `change_info`     |
//!
//! Accepted values are `1`/`0`/`true`/`false`/`on`/`off` (case-insensitive);
//! anything else leaves the default in place.

use std::env;

/// Environment variable toggling development diagnostics.
pub const ENV_DEV_WARNINGS: &str = "FTUI_REACTIVE_DEV_WARNINGS";
/// Environment variable toggling change details on triggers.
pub const ENV_CHANGE_INFO: &str = "FTUI_REACTIVE_CHANGE_INFO";

/// Configuration for a [`Reactivity`](crate::Reactivity) context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveConfig {
    /// Emit `tracing` warnings for ineligible wrap calls, rejected readonly
    /// writes, and `to_refs` misuse.
    pub dev_diagnostics: bool,
    /// Attach old/new values to triggers.
    pub change_info: bool,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            dev_diagnostics: cfg!(debug_assertions),
            change_info: cfg!(debug_assertions),
        }
    }
}

impl ReactiveConfig {
    /// Diagnostics and change details on.
    #[must_use]
    pub const fn development() -> Self {
        Self {
            dev_diagnostics: true,
            change_info: true,
        }
    }

    /// Diagnostics and change details off.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            dev_diagnostics: false,
            change_info: false,
        }
    }

    /// Defaults overridden by `FTUI_REACTIVE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup(ENV_DEV_WARNINGS)
            && let Some(on) = parse_flag(&val)
        {
            config.dev_diagnostics = on;
        }
        if let Some(val) = lookup(ENV_CHANGE_INFO)
            && let Some(on) = parse_flag(&val)
        {
            config.change_info = on;
        }
        config
    }

    #[must_use]
    pub const fn with_dev_diagnostics(mut self, on: bool) -> Self {
        self.dev_diagnostics = on;
        self
    }

    #[must_use]
    pub const fn with_change_info(mut self, on: bool) -> Self {
        self.change_info = on;
        self
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    let val = val.trim();
    if val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("on") {
        Some(true)
    } else if val == "0" || val.eq_ignore_ascii_case("false") || val.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        None
    }
}

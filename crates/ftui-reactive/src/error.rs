#![forbid(unsafe_code)]

//! Errors from raw object operations.
//!
//! Policy outcomes are not errors: wrapping an ineligible value returns it
//! unchanged, and a readonly wrapper rejecting a write reports `Ok(false)`.
//! An [`ObjectError`] only ever originates in the raw object itself and is
//! propagated through the traps unmodified.

use thiserror::Error;

use crate::value::PropertyKey;

pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("cannot assign to property {key}: object is frozen")]
    Frozen { key: PropertyKey },

    #[error("cannot add property {key}: object is not extensible")]
    NotExtensible { key: PropertyKey },

    #[error("cannot delete non-configurable property {key}")]
    NonConfigurable { key: PropertyKey },

    #[error("invalid array length")]
    InvalidArrayLength,

    #[error("cannot access property {key} of a non-object value")]
    NotAnObject { key: PropertyKey },

    #[error("prototype must be an object and must not create a cycle")]
    InvalidPrototype,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_key() {
        let err = ObjectError::Frozen {
            key: PropertyKey::from("count"),
        };
        assert_eq!(err.to_string(), "cannot assign to property count: object is frozen");

        let err = ObjectError::NonConfigurable {
            key: PropertyKey::Index(3),
        };
        assert!(err.to_string().contains('3'));
    }
}

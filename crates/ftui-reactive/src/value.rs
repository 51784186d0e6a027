#![forbid(unsafe_code)]

//! Dynamic values, property keys, and the change-detection rule.
//!
//! Every operation on reactive data is expressed in terms of [`Value`]: a
//! small dynamic value that is either a primitive, a raw composite
//! ([`RawObject`]), an interception view over one ([`Proxy`]), or a
//! reactive box ([`Ref`]).
//!
//! Property access is routed through [`Value::get`], [`Value::set`],
//! [`Value::delete`], [`Value::has`] and [`Value::own_keys`]. On a raw object
//! these act directly on its storage; on a wrapper they run the wrapper's
//! trap set, which is where tracking and notification happen.
//!
//! # Equality
//!
//! [`Value::strict_equals`] is identity for composites, refs and symbols,
//! content equality for strings, and IEEE comparison for numbers (so `NaN`
//! is never strictly equal to itself). [`has_changed`] is the rule writes use
//! to decide whether a `Set` notification fires: strict inequality, except
//! that `NaN` is considered unchanged when overwritten with `NaN`.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ObjectError, ObjectResult};
use crate::object::RawObject;
use crate::proxy::Proxy;
use crate::refs::Ref;

// ─── Symbols ─────────────────────────────────────────────────────────────────

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// Built-in symbols reserved by the host language.
///
/// Reads of these keys through a wrapper bypass tracking and lazy wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    AsyncIterator,
    HasInstance,
    IsConcatSpreadable,
    Iterator,
    Match,
    Replace,
    Search,
    Species,
    Split,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

impl WellKnownSymbol {
    /// Every well-known symbol, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::AsyncIterator,
        Self::HasInstance,
        Self::IsConcatSpreadable,
        Self::Iterator,
        Self::Match,
        Self::Replace,
        Self::Search,
        Self::Species,
        Self::Split,
        Self::ToPrimitive,
        Self::ToStringTag,
        Self::Unscopables,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::HasInstance => "Symbol.hasInstance",
            Self::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            Self::Iterator => "Symbol.iterator",
            Self::Match => "Symbol.match",
            Self::Replace => "Symbol.replace",
            Self::Search => "Symbol.search",
            Self::Species => "Symbol.species",
            Self::Split => "Symbol.split",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::ToStringTag => "Symbol.toStringTag",
            Self::Unscopables => "Symbol.unscopables",
        }
    }
}

/// A symbol: a property key with identity.
///
/// Two user symbols created with the same description are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// One of the host's built-in symbols.
    WellKnown(WellKnownSymbol),
    /// A user-created symbol.
    Unique { id: u64, description: Rc<str> },
}

impl Symbol {
    /// Create a fresh symbol, distinct from every other symbol.
    #[must_use]
    pub fn new(description: impl Into<Rc<str>>) -> Self {
        Self::Unique {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// Whether this symbol is one of the built-in markers.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        matches!(self, Self::WellKnown(_))
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::WellKnown(sym) => sym.as_str(),
            Self::Unique { description, .. } => description,
        }
    }
}

impl From<WellKnownSymbol> for Symbol {
    fn from(sym: WellKnownSymbol) -> Self {
        Self::WellKnown(sym)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description())
    }
}

// ─── Property keys ───────────────────────────────────────────────────────────

/// Largest canonical array index (2^32 - 2).
const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// A property key.
///
/// Strings that spell a canonical array index (`"0"`, `"17"`, but not `"01"`
/// or `"-1"`) normalize to [`PropertyKey::Index`], so `"3"` and `3` name the
/// same property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(u32),
    Name(Rc<str>),
    Symbol(Symbol),
}

impl PropertyKey {
    /// The key refs expose their payload under.
    #[must_use]
    pub fn value_key() -> Self {
        Self::Name(Rc::from("value"))
    }

    /// The key arrays expose their length under.
    #[must_use]
    pub fn length_key() -> Self {
        Self::Name(Rc::from("length"))
    }

    #[must_use]
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Self::Name(n) if &**n == name)
    }

    #[must_use]
    pub fn is_builtin_symbol(&self) -> bool {
        matches!(self, Self::Symbol(sym) if sym.is_builtin())
    }

    fn parse_index(s: &str) -> Option<u32> {
        let bytes = s.as_bytes();
        match bytes {
            [] => None,
            [b'0'] => Some(0),
            [b'0', ..] => None,
            _ if bytes.iter().all(u8::is_ascii_digit) => {
                s.parse::<u32>().ok().filter(|&i| i <= MAX_ARRAY_INDEX)
            }
            _ => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match Self::parse_index(s) {
            Some(index) => Self::Index(index),
            None => Self::Name(Rc::from(s)),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        if index <= MAX_ARRAY_INDEX {
            Self::Index(index)
        } else {
            Self::Name(Rc::from(index.to_string()))
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(i) => Self::from(i),
            Err(_) => Self::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<Symbol> for PropertyKey {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(sym: WellKnownSymbol) -> Self {
        Self::Symbol(Symbol::WellKnown(sym))
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
            Self::Symbol(sym) => write!(f, "{sym}"),
        }
    }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Symbol(Symbol),
    /// A raw composite, unobserved.
    Object(RawObject),
    /// An interception view (reactive, readonly or props) over a raw object.
    Proxy(Proxy),
    /// A reactive box.
    Ref(Ref),
}

impl Value {
    /// Whether this value is composite (a raw object or a wrapper).
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Proxy(_))
    }

    #[must_use]
    pub const fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Number(n) if n.is_nan())
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ref_box(&self) -> Option<&Ref> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The raw object behind a composite: itself, or a wrapper's target.
    #[must_use]
    pub fn raw_target(&self) -> Option<&RawObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::Proxy(proxy) => Some(proxy.target()),
            _ => None,
        }
    }

    /// Short type label used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(obj) => obj.kind().as_str(),
            Self::Proxy(_) => "proxy",
            Self::Ref(_) => "ref",
        }
    }

    /// Strict (`===`) equality.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => RawObject::ptr_eq(a, b),
            (Self::Proxy(a), Self::Proxy(b)) => Proxy::ptr_eq(a, b),
            (Self::Ref(a), Self::Ref(b)) => Ref::ptr_eq(a, b),
            _ => false,
        }
    }

    // ── Property access ──────────────────────────────────────────────

    /// Read a property.
    ///
    /// Primitives have no properties and read as `Undefined`. A ref exposes
    /// its payload under `"value"`.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        let key = key.into();
        match self {
            Self::Object(obj) => obj.get(&key),
            Self::Proxy(proxy) => proxy.get(&key),
            Self::Ref(r) if key.is_name("value") => r.get(),
            _ => Value::Undefined,
        }
    }

    /// Write a property.
    ///
    /// Returns `Ok(false)` when a readonly wrapper rejected the write.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> ObjectResult<bool> {
        let key = key.into();
        let value = value.into();
        match self {
            Self::Object(obj) => obj.set(&key, value, self),
            Self::Proxy(proxy) => proxy.set(&key, value, self),
            Self::Ref(r) if key.is_name("value") => r.set(value),
            _ => Err(ObjectError::NotAnObject { key }),
        }
    }

    /// Delete an own property.
    ///
    /// Deleting a missing key succeeds. Returns `Ok(false)` when a readonly
    /// wrapper rejected the delete.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> ObjectResult<bool> {
        let key = key.into();
        match self {
            Self::Object(obj) => obj.delete(&key),
            Self::Proxy(proxy) => proxy.delete(&key),
            Self::Ref(_) if key.is_name("value") => Err(ObjectError::NonConfigurable { key }),
            Self::Ref(_) => Ok(true),
            _ => Err(ObjectError::NotAnObject { key }),
        }
    }

    /// Whether the key is present, own or inherited.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        match self {
            Self::Object(obj) => obj.has(&key),
            Self::Proxy(proxy) => proxy.has(&key),
            Self::Ref(_) => key.is_name("value"),
            _ => false,
        }
    }

    /// Own property keys, in enumeration order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        match self {
            Self::Object(obj) => obj.own_keys(),
            Self::Proxy(proxy) => proxy.own_keys(),
            Self::Ref(_) => vec![PropertyKey::value_key()],
            _ => Vec::new(),
        }
    }
}

/// Whether a write of `value` over `old` counts as a change.
///
/// Strict inequality, except that `NaN` overwriting `NaN` is no change.
/// Composites compare by identity, so a structurally equal but distinct
/// object is a change.
#[must_use]
pub fn has_changed(value: &Value, old: &Value) -> bool {
    !value.strict_equals(old) && !(value.is_nan() && old.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Composites print by identity only; object graphs may be cyclic.
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Symbol(sym) => write!(f, "{sym}"),
            Self::Object(obj) => write!(f, "{obj:?}"),
            Self::Proxy(proxy) => write!(f, "{proxy:?}"),
            Self::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<RawObject> for Value {
    fn from(obj: RawObject) -> Self {
        Self::Object(obj)
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

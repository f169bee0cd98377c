//! Read-only state inspection.
//!
//! Hosts and debuggers address machine state by dotted paths such as
//! `cpu.pc` or `ula.phase`. Queries never affect emulation state.

use std::fmt;

/// A dynamically-typed query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U64(u64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// A component whose state can be queried by path.
pub trait Observable {
    /// Query one property. `None` when the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// The fixed paths accepted by [`Observable::query`]. Parameterised
    /// paths (such as `memory.<addr>`) are listed by their prefix.
    fn query_paths(&self) -> &'static [&'static str];
}

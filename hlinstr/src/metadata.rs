//! Generic, untyped metadata trees.
//!
//! Metadata is how layers above the IR attach facts the IR itself does not
//! understand. A [`Metadata`] node is either a leaf (integer, float, string,
//! raw data, or a reference to a module value) or a tuple of nodes. Modules
//! carry *named* metadata (a list of nodes under a well-known string key);
//! functions and SSA values carry keyed attachments.
//!
//! The IR never interprets these trees. Transforms that delete a global or a
//! function leave dangling [`ValueRef`]s behind, which is why readers must
//! validate references against the module before trusting them.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::{
    module::{FunctionId, GlobalId},
    types::Typeref,
};

/// A reference from metadata to a module-level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueRef {
    Function(FunctionId),
    Global(GlobalId),
    /// An `undef` value of the given type; used to name a type from metadata.
    Undef(Typeref),
}

/// A node of a metadata tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Metadata {
    Null,
    Int(u64),
    /// Raw `f64` bits.
    Float(u64),
    String(String),
    /// Constant byte array.
    Data(Vec<u8>),
    Value(ValueRef),
    Tuple(Vec<Metadata>),
}

impl Metadata {
    pub fn int(value: impl Into<u64>) -> Self {
        Metadata::Int(value.into())
    }

    pub fn bool(value: bool) -> Self {
        Metadata::Int(value as u64)
    }

    pub fn float(value: f64) -> Self {
        Metadata::Float(value.to_bits())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Metadata::String(value.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = Metadata>) -> Self {
        Metadata::Tuple(items.into_iter().collect())
    }

    /// A tuple, or [`Metadata::Null`] when there is nothing to put in it.
    pub fn tuple_or_null(items: impl IntoIterator<Item = Metadata>) -> Self {
        let items: Vec<_> = items.into_iter().collect();
        if items.is_empty() {
            Metadata::Null
        } else {
            Metadata::Tuple(items)
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Metadata::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Metadata::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Metadata::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Metadata]> {
        match self {
            Metadata::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<ValueRef> {
        match self {
            Metadata::Value(value) => Some(*value),
            _ => None,
        }
    }

    /// Short human readable name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Metadata::Null => "null",
            Metadata::Int(_) => "int",
            Metadata::Float(_) => "float",
            Metadata::String(_) => "string",
            Metadata::Data(_) => "data",
            Metadata::Value(_) => "value",
            Metadata::Tuple(_) => "tuple",
        }
    }
}

impl From<ValueRef> for Metadata {
    fn from(value: ValueRef) -> Self {
        Metadata::Value(value)
    }
}

impl std::fmt::Display for ValueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueRef::Function(id) => write!(f, "@{:?}", id),
            ValueRef::Global(id) => write!(f, "@{:?}", id),
            ValueRef::Undef(ty) => write!(f, "undef {}", ty),
        }
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metadata::Null => write!(f, "null"),
            Metadata::Int(value) => write!(f, "i64 {}", value),
            Metadata::Float(bits) => write!(f, "double {:?}", f64::from_bits(*bits)),
            Metadata::String(value) => write!(f, "!{:?}", value),
            Metadata::Data(bytes) => {
                write!(f, "c\"")?;
                for byte in bytes {
                    write!(f, "\\{:02X}", byte)?;
                }
                write!(f, "\"")
            }
            Metadata::Value(value) => std::fmt::Display::fmt(value, f),
            Metadata::Tuple(items) => {
                write!(f, "!{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    std::fmt::Display::fmt(item, f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

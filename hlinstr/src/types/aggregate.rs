//! Aggregate types
//!
//! Composite types built from `Typeref` references stored in the central
//! `TypeRegistry`:
//! - `ArrayType`: a fixed-size array of elements.
//! - `StructType`: an optionally named sequence of element types. Named
//!   structs are how front-ends spell opaque object types such as
//!   `class.Texture2D<float4>`; the name is part of the type identity.
use std::{collections::BTreeMap, fmt::Debug};

use crate::types::{AnyType, Typeref};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Array type
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrayType {
    pub ty: Typeref,
    pub num_elements: usize,
}

impl ArrayType {
    pub(super) fn write(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        types: &BTreeMap<Uuid, AnyType>,
    ) -> std::fmt::Result {
        write!(f, "[ {} x ", self.num_elements)?;
        AnyType::write_ref(f, self.ty, types)?;
        write!(f, " ]")
    }
}

/// Structure type
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructType {
    pub name: Option<String>,
    pub element_types: Vec<Typeref>,
}

impl StructType {
    pub(super) fn write(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        types: &BTreeMap<Uuid, AnyType>,
    ) -> std::fmt::Result {
        if let Some(name) = &self.name {
            return write!(f, "%\"{}\"", name);
        }

        write!(f, "{{ ")?;
        for (i, typeref) in self.element_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            AnyType::write_ref(f, *typeref, types)?;
        }
        write!(f, " }}")
    }
}

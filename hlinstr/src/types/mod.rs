//! Interned IR types.
//!
//! Scalars and pointers live in [`primary`], arrays and structures in
//! [`aggregate`]. Every type is interned by a [`TypeRegistry`], which hands
//! out [`Typeref`] handles.
//!
//! A [`Typeref`] is the *identity* of a type: two structurally identical types
//! always intern to the same reference, which is what lets side tables key
//! per-type facts on it.
use std::{
    collections::BTreeMap,
    hash::{DefaultHasher, Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

use log::{debug, info};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use uuid::Uuid;

use crate::types::{
    aggregate::{ArrayType, StructType},
    primary::PrimaryType,
};
pub mod aggregate;
pub mod primary;

/// Handle of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Typeref(Uuid);

impl Typeref {
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for Typeref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type#{}", self.0.simple())
    }
}

/// Any type the registry can intern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyType {
    /// Void, integers, floats and pointers.
    Primary(PrimaryType),

    /// Fixed-length array.
    Array(ArrayType),

    /// Structure, possibly named.
    Struct(StructType),
}

impl<S: Into<PrimaryType>> From<S> for AnyType {
    fn from(value: S) -> Self {
        AnyType::Primary(value.into())
    }
}

impl From<ArrayType> for AnyType {
    fn from(value: ArrayType) -> Self {
        AnyType::Array(value)
    }
}

impl From<StructType> for AnyType {
    fn from(value: StructType) -> Self {
        AnyType::Struct(value)
    }
}

impl AnyType {
    fn write(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        types: &BTreeMap<Uuid, AnyType>,
    ) -> std::fmt::Result {
        match self {
            AnyType::Primary(primary) => std::fmt::Display::fmt(primary, f),
            AnyType::Array(array) => array.write(f, types),
            AnyType::Struct(st) => st.write(f, types),
        }
    }

    fn write_ref(
        f: &mut std::fmt::Formatter<'_>,
        typeref: Typeref,
        types: &BTreeMap<Uuid, AnyType>,
    ) -> std::fmt::Result {
        match types.get(&typeref.0) {
            Some(ty) => ty.write(f, types),
            None => write!(f, "<unknown type {}>", typeref.0),
        }
    }
}

/// Interning table for [`AnyType`] values. Safe to share between threads.
///
/// ```rust
/// # use hlinstr::types::{TypeRegistry, primary::IType};
/// let reg = TypeRegistry::new([0u8; 6]);
/// let typeref = reg.search_or_insert(IType::I8.into());
/// assert_eq!(reg.search_or_insert(IType::I8.into()), typeref);
/// assert_eq!(reg.get(typeref).as_deref(), Some(&IType::I8.into()));
/// ```
pub struct TypeRegistry {
    array: RwLock<BTreeMap<Uuid, AnyType>>,
    inverse_lookup: RwLock<BTreeMap<u64, SmallVec<Uuid, 1>>>,
    counter: AtomicU64,
    node_id: [u8; 6],
}

impl TypeRegistry {
    fn hash_ty(ty: &AnyType) -> u64 {
        let mut hasher = DefaultHasher::new();
        ty.hash(&mut hasher);
        hasher.finish()
    }

    /// Allocation is a node-id prefix followed by a monotonically increasing
    /// counter, so references are deterministic for a given insertion order.
    fn next_uuid(&self) -> Uuid {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 16];
        bytes[..6].copy_from_slice(&self.node_id);
        bytes[8..].copy_from_slice(&counter.to_be_bytes());
        Uuid::new_v8(bytes)
    }

    /// `node_id` prefixes every identifier this registry allocates.
    pub fn new(node_id: [u8; 6]) -> Self {
        Self {
            array: Default::default(),
            inverse_lookup: Default::default(),
            counter: AtomicU64::new(0),
            node_id,
        }
    }

    /// The type behind `typeref`, if this registry interned it.
    ///
    /// The guard holds a read lock; drop it before interning more types.
    pub fn get(&self, typeref: Typeref) -> Option<MappedRwLockReadGuard<'_, AnyType>> {
        let array_lock = self.array.read_recursive();
        RwLockReadGuard::try_map(array_lock, |map| map.get(&typeref.0)).ok()
    }

    /// Intern `ty`. Structurally equal types share one handle.
    pub fn search_or_insert(&self, ty: AnyType) -> Typeref {
        let hash = Self::hash_ty(&ty);

        // `array` is always locked before `inverse_lookup`.
        let mut array_lock = self.array.write();
        let mut inverse_lookup_lock = self.inverse_lookup.write();

        if let Some(candidates) = inverse_lookup_lock.get(&hash) {
            for uuid in candidates {
                if array_lock.get(uuid) == Some(&ty) {
                    return Typeref(*uuid);
                }
            }
        }

        let new_uuid = self.next_uuid();
        match inverse_lookup_lock.get_mut(&hash) {
            Some(list) => {
                info!(
                    "Type hash 0x{:016x} shared by {} interned types",
                    hash,
                    list.len() + 1
                );
                list.push(new_uuid);
            }
            None => {
                debug!("Interned type {}", new_uuid);
                inverse_lookup_lock.insert(hash, smallvec![new_uuid]);
            }
        }

        array_lock.insert(new_uuid, ty);
        Typeref(new_uuid)
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.array.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display adapter resolving `typeref` through this registry.
    pub fn fmt(&self, typeref: Typeref) -> impl std::fmt::Display + '_ {
        struct Fmt<'a> {
            registry: &'a TypeRegistry,
            typeref: Typeref,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let types = self.registry.array.read_recursive();
                AnyType::write_ref(f, self.typeref, &types)
            }
        }

        Fmt {
            registry: self,
            typeref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::primary::{FType, IType};

    #[test]
    fn identical_structs_intern_to_the_same_ref() {
        let reg = TypeRegistry::new([1; 6]);
        let f32_ty = reg.search_or_insert(FType::Fp32.into());
        let tex_a = reg.search_or_insert(
            StructType {
                name: Some("class.Texture2D".to_string()),
                element_types: vec![f32_ty],
            }
            .into(),
        );
        let tex_b = reg.search_or_insert(
            StructType {
                name: Some("class.Texture2D".to_string()),
                element_types: vec![f32_ty],
            }
            .into(),
        );
        let buf = reg.search_or_insert(
            StructType {
                name: Some("class.Buffer".to_string()),
                element_types: vec![f32_ty],
            }
            .into(),
        );

        assert_eq!(tex_a, tex_b);
        assert_ne!(tex_a, buf);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn formats_nested_aggregates() {
        let reg = TypeRegistry::new([0; 6]);
        let i32_ty = reg.search_or_insert(IType::I32.into());
        let arr = reg.search_or_insert(
            ArrayType {
                ty: i32_ty,
                num_elements: 8,
            }
            .into(),
        );

        assert_eq!(format!("{}", reg.fmt(arr)), "[ 8 x i32 ]");
    }
}

//! Debug descriptors.
//!
//! A deliberately small model of source-level debug information: global
//! variable descriptors and the type descriptors they point at. Descriptors
//! live in arenas owned by [`DebugInfo`] and are addressed by slotmap handles,
//! so a descriptor keeps its identity while being edited in place.
//!
//! Every mutating accessor bumps [`DebugInfo::generation`]. Caches built over
//! the descriptors compare generations to know when they went stale.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use strum::{EnumIs, IntoStaticStr};

use crate::module::GlobalId;

new_key_type! {
    /// Handle to a [`DIGlobalVariable`].
    pub struct DiGlobalId;
    /// Handle to a [`DIType`].
    pub struct DiTypeId;
}

/// Source file a descriptor was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DIFile {
    pub filename: String,
    pub directory: String,
}

/// Aggregate flavour of a composite type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompositeTag {
    #[strum(serialize = "DW_TAG_array_type")]
    Array,
    #[strum(serialize = "DW_TAG_structure_type")]
    Structure,
}

/// Type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DIType {
    Basic {
        name: String,
        size_in_bits: u64,
        align_in_bits: u64,
        /// DWARF base type encoding (`DW_ATE_*`).
        encoding: u32,
    },
    Composite {
        tag: CompositeTag,
        name: String,
        file: DIFile,
        line: u32,
        size_in_bits: u64,
        align_in_bits: u64,
        base: Option<DiTypeId>,
        elements: Vec<DiTypeId>,
    },
    /// A bit-range view into a parent type (`DW_TAG_member`).
    Member {
        name: String,
        file: DIFile,
        line: u32,
        size_in_bits: u64,
        align_in_bits: u64,
        offset_in_bits: u64,
        base: DiTypeId,
    },
}

impl DIType {
    pub fn name(&self) -> &str {
        match self {
            DIType::Basic { name, .. }
            | DIType::Composite { name, .. }
            | DIType::Member { name, .. } => name,
        }
    }

    pub fn size_in_bits(&self) -> u64 {
        match self {
            DIType::Basic { size_in_bits, .. }
            | DIType::Composite { size_in_bits, .. }
            | DIType::Member { size_in_bits, .. } => *size_in_bits,
        }
    }

    pub fn align_in_bits(&self) -> u64 {
        match self {
            DIType::Basic { align_in_bits, .. }
            | DIType::Composite { align_in_bits, .. }
            | DIType::Member { align_in_bits, .. } => *align_in_bits,
        }
    }

    /// Offset inside the parent aggregate; zero for anything but members.
    pub fn offset_in_bits(&self) -> u64 {
        match self {
            DIType::Member { offset_in_bits, .. } => *offset_in_bits,
            _ => 0,
        }
    }
}

/// Global variable descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DIGlobalVariable {
    /// Enclosing scope (compile unit or namespace) name.
    pub scope: String,
    pub name: String,
    pub linkage_name: String,
    pub file: DIFile,
    pub line: u32,
    pub ty: DiTypeId,
    pub is_local: bool,
    pub is_definition: bool,
    /// The IR global this descriptor describes, if any.
    pub variable: Option<GlobalId>,
}

/// Debug descriptors of a module.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugInfo {
    global_variables: SlotMap<DiGlobalId, DIGlobalVariable>,
    types: SlotMap<DiTypeId, DIType>,
    generation: u64,
}

impl DebugInfo {
    /// Monotonic counter bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.global_variables.is_empty() && self.types.is_empty()
    }

    pub fn add_type(&mut self, ty: DIType) -> DiTypeId {
        self.generation += 1;
        self.types.insert(ty)
    }

    pub fn add_global_variable(&mut self, gv: DIGlobalVariable) -> DiGlobalId {
        self.generation += 1;
        self.global_variables.insert(gv)
    }

    pub fn ty(&self, id: DiTypeId) -> Option<&DIType> {
        self.types.get(id)
    }

    pub fn global_variable(&self, id: DiGlobalId) -> Option<&DIGlobalVariable> {
        self.global_variables.get(id)
    }

    /// Mutable access to a descriptor. Counts as a mutation even if the
    /// caller ends up not writing anything.
    pub fn global_variable_mut(&mut self, id: DiGlobalId) -> Option<&mut DIGlobalVariable> {
        self.generation += 1;
        self.global_variables.get_mut(id)
    }

    pub fn remove_global_variable(&mut self, id: DiGlobalId) -> Option<DIGlobalVariable> {
        self.generation += 1;
        self.global_variables.remove(id)
    }

    pub fn global_variables(&self) -> impl Iterator<Item = (DiGlobalId, &DIGlobalVariable)> {
        self.global_variables.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = (DiTypeId, &DIType)> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mutation_bumps_the_generation() {
        let mut info = DebugInfo::default();
        assert_eq!(info.generation(), 0);

        let ty = info.add_type(DIType::Basic {
            name: "float".to_string(),
            size_in_bits: 32,
            align_in_bits: 32,
            encoding: 4,
        });
        let gv = info.add_global_variable(DIGlobalVariable {
            scope: "cu".to_string(),
            name: "g".to_string(),
            linkage_name: "g".to_string(),
            file: DIFile::default(),
            line: 3,
            ty,
            is_local: false,
            is_definition: true,
            variable: None,
        });
        assert_eq!(info.generation(), 2);

        let _ = info.global_variable(gv);
        assert_eq!(info.generation(), 2);

        info.global_variable_mut(gv).expect("descriptor exists").line = 4;
        assert_eq!(info.generation(), 3);
        assert_eq!(info.global_variable(gv).map(|g| g.line), Some(4));
    }
}

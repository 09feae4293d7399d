//! Resource type annotations.
//!
//! Resource handles are legalized to plain structure types early on. This
//! table remembers which resource class and shape each such type stood for.
use std::collections::BTreeMap;

use hlinstr::types::Typeref;
use log::trace;

use crate::dxil::{ResourceClass, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeAnnotationTable {
    entries: BTreeMap<Typeref, (ResourceClass, ResourceKind)>,
}

impl TypeAnnotationTable {
    /// Annotate `ty`, overwriting any previous annotation.
    pub fn add(&mut self, ty: Typeref, class: ResourceClass, kind: ResourceKind) {
        trace!("Annotated {} as {} {}", ty, class, kind);
        self.entries.insert(ty, (class, kind));
    }

    /// `ResourceClass::Invalid` when `ty` is not annotated.
    pub fn class(&self, ty: Typeref) -> ResourceClass {
        self.entries
            .get(&ty)
            .map_or(ResourceClass::Invalid, |(class, _)| *class)
    }

    /// `ResourceKind::Invalid` when `ty` is not annotated.
    pub fn kind(&self, ty: Typeref) -> ResourceKind {
        self.entries
            .get(&ty)
            .map_or(ResourceKind::Invalid, |(_, kind)| *kind)
    }

    pub fn contains(&self, ty: Typeref) -> bool {
        self.entries.contains_key(&ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Typeref, ResourceClass, ResourceKind)> + '_ {
        self.entries
            .iter()
            .map(|(ty, (class, kind))| (*ty, *class, *kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use hlinstr::types::{TypeRegistry, aggregate::StructType};

    use super::*;

    #[test]
    fn unannotated_types_yield_sentinels_and_readd_overwrites() {
        let registry = TypeRegistry::new([0; 6]);
        let texture = registry.search_or_insert(
            StructType {
                name: Some("Texture2D<float4>".to_string()),
                element_types: Vec::new(),
            }
            .into(),
        );
        let mut table = TypeAnnotationTable::default();

        assert_eq!(table.class(texture), ResourceClass::Invalid);
        assert_eq!(table.kind(texture), ResourceKind::Invalid);

        table.add(texture, ResourceClass::SRV, ResourceKind::Texture2D);
        table.add(texture, ResourceClass::UAV, ResourceKind::Texture2DArray);

        assert_eq!(table.len(), 1);
        assert_eq!(table.class(texture), ResourceClass::UAV);
        assert_eq!(table.kind(texture), ResourceKind::Texture2DArray);
    }
}

//! Debug-info continuity for split and replaced globals.
//!
//! When an aggregate global is broken up into one global per element, the
//! aggregate's descriptor no longer describes any live variable. Each element
//! gets a fresh descriptor whose type is a member view (size, alignment and
//! offset) into the original aggregate type, so debuggers can still present
//! the elements as parts of the source-level variable.
use std::collections::BTreeMap;

use hlinstr::{
    debug::{DIGlobalVariable, DIType, DebugInfo, DiGlobalId},
    module::{GlobalId, Module},
};
use log::{debug, trace};

use crate::utils::{
    error::{HlError, HlResult},
    lazy::LazyContainer,
};

/// Bit layout of an element inside its parent aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    pub size_in_bits: u64,
    pub align_in_bits: u64,
    pub offset_in_bits: u64,
}

/// Lookup from IR globals to the descriptors describing them.
///
/// The index is built on first use and rebuilt whenever the debug info it was
/// built from has been mutated by someone else. Mutations performed through
/// the index patch it in place.
#[derive(Debug, Default)]
pub struct DebugInfoIndex {
    by_global: LazyContainer<BTreeMap<GlobalId, DiGlobalId>>,
}

fn build(
    debug_info: &DebugInfo,
    previous: Option<BTreeMap<GlobalId, DiGlobalId>>,
) -> BTreeMap<GlobalId, DiGlobalId> {
    let mut map = previous.unwrap_or_default();
    map.clear();
    for (id, gv) in debug_info.global_variables() {
        if let Some(variable) = gv.variable {
            map.entry(variable).or_insert(id);
        }
    }
    trace!("Indexed {} global variable descriptors", map.len());
    map
}

impl DebugInfoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the index; the next query rebuilds it.
    pub fn invalidate(&mut self) {
        self.by_global.dirtify();
    }

    /// Descriptor of `global`, if it has one.
    pub fn find(&mut self, debug_info: &DebugInfo, global: GlobalId) -> Option<DiGlobalId> {
        self.by_global
            .get(debug_info.generation(), |prev| build(debug_info, prev))
            .get(&global)
            .copied()
    }

    /// Describe `element`, one piece of the aggregate described by `original`.
    ///
    /// The new descriptor is named `element_name`, takes its linkage name from
    /// the element global, and inherits scope, file and line from `original`.
    /// Its type is a member of the original type named after the original type
    /// followed by `element_name`.
    pub fn create_element_descriptor(
        &mut self,
        module: &mut Module,
        original: DiGlobalId,
        element: GlobalId,
        layout: ElementLayout,
        element_name: &str,
    ) -> HlResult<DiGlobalId> {
        let linkage_name = module
            .global(element)
            .ok_or_else(|| HlError::NotFound(format!("global {:?}", element)))?
            .name
            .clone();
        let debug_info = &mut module.debug_info;
        let parent = debug_info
            .global_variable(original)
            .cloned()
            .ok_or_else(|| {
                HlError::NotFound(format!("global variable descriptor {:?}", original))
            })?;
        let parent_ty_name = debug_info
            .ty(parent.ty)
            .map(|ty| ty.name().to_string())
            .unwrap_or_default();

        let was_clean = self.by_global.is_clean(debug_info.generation());
        let stamp = debug_info.generation();

        let member = debug_info.add_type(DIType::Member {
            name: format!("{}{}", parent_ty_name, element_name),
            file: parent.file.clone(),
            line: parent.line,
            size_in_bits: layout.size_in_bits,
            align_in_bits: layout.align_in_bits,
            offset_in_bits: layout.offset_in_bits,
            base: parent.ty,
        });
        let descriptor = debug_info.add_global_variable(DIGlobalVariable {
            scope: parent.scope,
            name: element_name.to_string(),
            linkage_name,
            file: parent.file,
            line: parent.line,
            ty: member,
            is_local: parent.is_local,
            is_definition: parent.is_definition,
            variable: Some(element),
        });

        if was_clean {
            if let Some(map) = self.by_global.get_mut_if_clean(stamp) {
                map.entry(element).or_insert(descriptor);
            }
            self.by_global.restamp(debug_info.generation());
        }
        debug!(
            "Created descriptor `{}` at bit offset {}",
            element_name, layout.offset_in_bits
        );
        Ok(descriptor)
    }

    /// Point the descriptor of `old` at `new`. Returns `false` when `old` has
    /// no descriptor.
    pub fn relink(&mut self, debug_info: &mut DebugInfo, old: GlobalId, new: GlobalId) -> bool {
        let Some(descriptor) = self.find(debug_info, old) else {
            return false;
        };
        let stamp = debug_info.generation();

        if let Some(gv) = debug_info.global_variable_mut(descriptor) {
            gv.variable = Some(new);
        }

        if let Some(map) = self.by_global.get_mut_if_clean(stamp) {
            map.remove(&old);
            map.entry(new).or_insert(descriptor);
        }
        self.by_global.restamp(debug_info.generation());
        true
    }
}

#[cfg(test)]
mod tests {
    use hlinstr::{
        debug::DIFile,
        module::GlobalVariable,
        types::{TypeRegistry, primary::FType},
    };

    use super::*;

    fn describe(module: &mut Module, global: GlobalId, name: &str) -> DiGlobalId {
        let ty = module.debug_info.add_type(DIType::Basic {
            name: "float".to_string(),
            size_in_bits: 32,
            align_in_bits: 32,
            encoding: 4,
        });
        module.debug_info.add_global_variable(DIGlobalVariable {
            scope: "cu".to_string(),
            name: name.to_string(),
            linkage_name: name.to_string(),
            file: DIFile {
                filename: "shader.hlsl".to_string(),
                directory: "/src".to_string(),
            },
            line: 12,
            ty,
            is_local: false,
            is_definition: true,
            variable: Some(global),
        })
    }

    #[test]
    fn index_follows_external_mutations() {
        let registry = TypeRegistry::new([0; 6]);
        let f32_ty = registry.search_or_insert(FType::Fp32.into());
        let mut module = Module::new("m");
        let a = module.add_global(GlobalVariable::new("a", f32_ty));
        let b = module.add_global(GlobalVariable::new("b", f32_ty));
        let mut index = DebugInfoIndex::new();

        let da = describe(&mut module, a, "a");
        assert_eq!(index.find(&module.debug_info, a), Some(da));
        assert_eq!(index.find(&module.debug_info, b), None);

        let db = describe(&mut module, b, "b");
        assert_eq!(index.find(&module.debug_info, b), Some(db));
    }

    #[test]
    fn relink_repoints_in_place() {
        let registry = TypeRegistry::new([0; 6]);
        let f32_ty = registry.search_or_insert(FType::Fp32.into());
        let mut module = Module::new("m");
        let old = module.add_global(GlobalVariable::new("old", f32_ty));
        let new = module.add_global(GlobalVariable::new("new", f32_ty));
        let mut index = DebugInfoIndex::new();
        let descriptor = describe(&mut module, old, "v");

        assert!(index.relink(&mut module.debug_info, old, new));
        assert!(!index.relink(&mut module.debug_info, old, new));

        assert_eq!(index.find(&module.debug_info, new), Some(descriptor));
        assert_eq!(index.find(&module.debug_info, old), None);
        let gv = module
            .debug_info
            .global_variable(descriptor)
            .expect("descriptor kept");
        assert_eq!(gv.name, "v");
        assert_eq!(gv.variable, Some(new));
    }
}

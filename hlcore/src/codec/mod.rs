//! Translation between the [`HlModule`](crate::module::HlModule) model and
//! the named metadata trees of the host module.
//!
//! The metadata is the durable form of the model between compilation stages.
//! Emission is deterministic and overwrites previous trees. Loading validates
//! every node against the schema and every value reference against the host
//! module, and produces a complete [`Decoded`] model or an error; callers
//! never observe a partially loaded model.
use hlinstr::module::{FunctionId, Module};
use log::info;

use crate::{
    annotation::TypeAnnotationTable,
    config::{HlOptions, SchemaVersion},
    dxil::ShaderModel,
    magic::HL_NAMED_METADATA,
    props::FunctionPropsTable,
    resource::ResourceRegistry,
    signature::SignatureSet,
};

mod emit;
mod load;
pub(crate) mod reader;

/// A model reconstructed from metadata.
#[derive(Debug, Default)]
pub struct Decoded {
    pub version: SchemaVersion,
    pub shader_model: Option<ShaderModel>,
    pub entry_function: Option<FunctionId>,
    pub entry_name: String,
    pub signatures: SignatureSet,
    pub resources: ResourceRegistry,
    /// Properties of the entry function and of every other function that has
    /// some.
    pub function_props: FunctionPropsTable,
    pub options: HlOptions,
    pub annotations: TypeAnnotationTable,
    pub root_signature: Option<Vec<u8>>,
    pub llvm_used: Vec<hlinstr::module::GlobalId>,
}

/// Reader and writer of one schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataCodec {
    schema: SchemaVersion,
}

impl MetadataCodec {
    pub fn new(schema: SchemaVersion) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// Remove every tree owned by the high-level layer. Removing trees that
    /// are already gone is a no-op.
    pub fn clear(module: &mut Module) -> usize {
        let removed = HL_NAMED_METADATA
            .iter()
            .filter_map(|name| module.remove_named_metadata(name))
            .count();
        if removed > 0 {
            info!(
                "Cleared {} high-level metadata trees from `{}`",
                removed, module.name
            );
        }
        removed
    }
}

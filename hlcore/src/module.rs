//! The high-level shader module.
//!
//! [`HlModule`] is the shader-specific side table of a host [`Module`]: it
//! names the entry point and describes its resources, signatures and stage
//! properties. The model references host entities only through slotmap
//! handles, and reaches the host module only through explicit `&Module` /
//! `&mut Module` arguments.
use hlinstr::{
    debug::DiGlobalId,
    module::{AddressSpace, FunctionId, GlobalId, Module},
    operand::Name,
};
use log::{debug, info};

use crate::{
    annotation::TypeAnnotationTable,
    codec::MetadataCodec,
    config::{HlModuleCreateInfo, HlOptions, SchemaVersion},
    debug::{DebugInfoIndex, ElementLayout},
    dxil::ShaderModel,
    precise,
    props::{FunctionPropsTable, ShaderProps},
    resource::{CBuffer, HlResource, ResourceRegistry, Sampler},
    signature::{Signature, SignatureSet},
    utils::error::{HlError, HlResult},
};

#[derive(Debug)]
pub struct HlModule {
    pub(crate) entry_function: Option<FunctionId>,
    pub(crate) entry_name: String,
    pub(crate) shader_model: Option<ShaderModel>,
    pub(crate) options: HlOptions,
    pub(crate) resources: ResourceRegistry,
    pub(crate) signatures: SignatureSet,
    pub(crate) function_props: FunctionPropsTable,
    pub(crate) annotations: TypeAnnotationTable,
    pub(crate) root_signature: Option<Vec<u8>>,
    /// Thread-group shared memory globals.
    pub(crate) tgsm: Vec<GlobalId>,
    /// Globals that must survive dead-global elimination.
    pub(crate) llvm_used: Vec<GlobalId>,
    debug_index: DebugInfoIndex,
    codec: MetadataCodec,
}

impl Default for HlModule {
    fn default() -> Self {
        Self::new(HlModuleCreateInfo::default())
    }
}

impl HlModule {
    pub fn new(create_info: HlModuleCreateInfo) -> Self {
        Self {
            entry_function: None,
            entry_name: create_info.entry_name.unwrap_or_default(),
            shader_model: create_info.shader_model,
            options: create_info.options,
            resources: ResourceRegistry::default(),
            signatures: SignatureSet::default(),
            function_props: FunctionPropsTable::default(),
            annotations: TypeAnnotationTable::default(),
            root_signature: None,
            tgsm: Vec::new(),
            llvm_used: Vec::new(),
            debug_index: DebugInfoIndex::new(),
            codec: MetadataCodec::new(create_info.schema_version),
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.codec.schema()
    }

    // Entry point

    pub fn entry_function(&self) -> Option<FunctionId> {
        self.entry_function
    }

    pub fn set_entry_function(&mut self, function: Option<FunctionId>) {
        self.entry_function = function;
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn set_entry_name(&mut self, name: impl Into<String>) {
        self.entry_name = name.into();
    }

    pub fn shader_model(&self) -> Option<ShaderModel> {
        self.shader_model
    }

    pub fn set_shader_model(&mut self, shader_model: ShaderModel) {
        self.shader_model = Some(shader_model);
    }

    pub fn options(&self) -> HlOptions {
        self.options
    }

    pub fn set_options(&mut self, options: HlOptions) {
        self.options = options;
    }

    // Resources

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    pub fn add_cbuffer(&mut self, cbuffer: CBuffer) -> u32 {
        self.resources.add_cbuffer(cbuffer)
    }

    pub fn add_sampler(&mut self, sampler: Sampler) -> u32 {
        self.resources.add_sampler(sampler)
    }

    pub fn add_srv(&mut self, srv: HlResource) -> u32 {
        self.resources.add_srv(srv)
    }

    pub fn add_uav(&mut self, uav: HlResource) -> u32 {
        self.resources.add_uav(uav)
    }

    /// See [`ResourceRegistry::remove_resources`].
    pub fn remove_resources(&mut self, module: &mut Module, globals: &[GlobalId]) -> usize {
        self.resources.remove_resources(module, globals)
    }

    // Signatures

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn input_signature(&mut self) -> HlResult<&mut Signature> {
        self.signatures.input()
    }

    pub fn output_signature(&mut self) -> HlResult<&mut Signature> {
        self.signatures.output()
    }

    pub fn patch_constant_signature(&mut self) -> HlResult<&mut Signature> {
        self.signatures.patch_constant()
    }

    pub fn release_input_signature(&mut self) -> HlResult<Signature> {
        self.signatures.release_input()
    }

    pub fn release_output_signature(&mut self) -> HlResult<Signature> {
        self.signatures.release_output()
    }

    pub fn release_patch_constant_signature(&mut self) -> HlResult<Signature> {
        self.signatures.release_patch_constant()
    }

    // Function properties

    pub fn has_function_props(&self, function: FunctionId) -> bool {
        self.function_props.has(function)
    }

    pub fn add_function_props(&mut self, function: FunctionId, props: ShaderProps) -> HlResult<()> {
        self.function_props.add(function, props)
    }

    /// Like [`add_function_props`](Self::add_function_props) but overwrites.
    pub fn replace_function_props(
        &mut self,
        function: FunctionId,
        props: ShaderProps,
    ) -> Option<ShaderProps> {
        self.function_props.replace(function, props)
    }

    pub fn function_props(&self, function: FunctionId) -> HlResult<&ShaderProps> {
        self.function_props.get(function)
    }

    pub fn function_props_mut(&mut self, function: FunctionId) -> HlResult<&mut ShaderProps> {
        self.function_props.get_mut(function)
    }

    pub fn function_props_table(&self) -> &FunctionPropsTable {
        &self.function_props
    }

    // Type annotations

    pub fn type_annotations(&self) -> &TypeAnnotationTable {
        &self.annotations
    }

    pub fn type_annotations_mut(&mut self) -> &mut TypeAnnotationTable {
        &mut self.annotations
    }

    // Root signature

    pub fn root_signature(&self) -> Option<&[u8]> {
        self.root_signature.as_deref()
    }

    pub fn set_root_signature(&mut self, blob: Vec<u8>) {
        self.root_signature = Some(blob);
    }

    /// Hand the root signature over to the caller.
    pub fn release_root_signature(&mut self) -> HlResult<Vec<u8>> {
        self.root_signature
            .take()
            .ok_or(HlError::NullReference("root signature"))
    }

    // Thread-group shared memory and keep-alive globals

    pub fn add_group_shared(&mut self, global: GlobalId) {
        if !self.tgsm.contains(&global) {
            self.tgsm.push(global);
        }
    }

    pub fn group_shared(&self) -> &[GlobalId] {
        &self.tgsm
    }

    pub fn add_llvm_used(&mut self, global: GlobalId) {
        if !self.llvm_used.contains(&global) {
            self.llvm_used.push(global);
        }
    }

    pub fn llvm_used(&self) -> &[GlobalId] {
        &self.llvm_used
    }

    /// Write the keep-alive list into `module`.
    pub fn emit_llvm_used(&self, module: &mut Module) {
        MetadataCodec::emit_llvm_used(self, module);
    }

    // Host entity removal

    /// Detach `global` from `module` and forget every reference the model
    /// holds to it. Resources bound to it are removed as well.
    pub fn remove_global(&mut self, module: &mut Module, global: GlobalId) {
        self.resources.remove_resources(module, &[global]);
        self.tgsm.retain(|g| *g != global);
        self.llvm_used.retain(|g| *g != global);
        self.function_props.purge_global(global);
        module.remove_global(global);
    }

    /// Detach `function` from `module` and forget every reference the model
    /// holds to it.
    pub fn remove_function(&mut self, module: &mut Module, function: FunctionId) {
        self.function_props.purge_function(function);
        if self.entry_function == Some(function) {
            self.entry_function = None;
        }
        module.remove_function(function);
    }

    // Precise

    pub fn mark_precise_via_call(
        &self,
        module: &mut Module,
        function: FunctionId,
        value: Name,
    ) -> HlResult<()> {
        precise::mark_via_call(module, function, value)
    }

    pub fn mark_precise_pointer_via_calls(
        &self,
        module: &mut Module,
        function: FunctionId,
        pointer: Name,
    ) -> HlResult<usize> {
        precise::mark_pointer_via_calls(module, function, pointer)
    }

    pub fn resolve_precise_marker_calls(&self, module: &mut Module) -> usize {
        precise::resolve_marker_calls(module)
    }

    // Debug info

    pub fn find_debug_info(&mut self, module: &Module, global: GlobalId) -> Option<DiGlobalId> {
        self.debug_index.find(&module.debug_info, global)
    }

    pub fn create_element_debug_info(
        &mut self,
        module: &mut Module,
        original: DiGlobalId,
        element: GlobalId,
        layout: ElementLayout,
        element_name: &str,
    ) -> HlResult<DiGlobalId> {
        self.debug_index
            .create_element_descriptor(module, original, element, layout, element_name)
    }

    pub fn relink_debug_info(&mut self, module: &mut Module, old: GlobalId, new: GlobalId) -> bool {
        self.debug_index.relink(&mut module.debug_info, old, new)
    }

    pub fn invalidate_debug_info(&mut self) {
        self.debug_index.invalidate();
    }

    // Metadata

    /// Serialize the model into the named metadata of `module`.
    pub fn emit(&self, module: &mut Module) {
        self.codec.emit(self, module);
    }

    /// Replace the model with the one recorded in `module`. On error the
    /// model is left untouched.
    pub fn load(&mut self, module: &Module) -> HlResult<()> {
        let decoded = self.codec.load(module)?;

        self.entry_function = decoded.entry_function;
        self.entry_name = decoded.entry_name;
        self.shader_model = decoded.shader_model;
        self.options = decoded.options;
        self.resources = decoded.resources;
        self.signatures = decoded.signatures;
        self.function_props = decoded.function_props;
        self.annotations = decoded.annotations;
        self.root_signature = decoded.root_signature;
        self.llvm_used = decoded.llvm_used;
        self.tgsm = module
            .globals
            .iter()
            .filter(|(_, gv)| gv.address_space == AddressSpace::GroupShared)
            .map(|(id, _)| id)
            .collect();
        self.debug_index.invalidate();

        debug!(
            "Model of `{}` loaded from schema {}",
            module.name, decoded.version
        );
        Ok(())
    }

    /// Remove every high-level tree from `module`.
    pub fn clear_hl_metadata(module: &mut Module) {
        let removed = MetadataCodec::clear(module);
        if removed == 0 {
            info!("No high-level metadata to clear in `{}`", module.name);
        }
    }
}

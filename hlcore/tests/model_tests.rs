use hlcore::{
    config::{HlModuleCreateInfo, HlOptions},
    dxil::{ResourceClass, ResourceKind, SamplerKind, ShaderKind},
    module::HlModule,
    props::{ComputeProps, HullProps, ShaderProps, VertexProps},
    resource::{CBuffer, HlResource, ResourceBase, Sampler},
    utils::error::HlError,
};
use hlinstr::{
    module::{Function, GlobalId, GlobalVariable, Module},
    types::{TypeRegistry, primary::IType},
};

fn module_with_globals(count: usize) -> (Module, Vec<GlobalId>) {
    let registry = TypeRegistry::new([0; 6]);
    let i32_ty = registry.search_or_insert(IType::I32.into());
    let mut module = Module::new("resources");
    let globals = (0..count)
        .map(|i| module.add_global(GlobalVariable::new(format!("g{}", i), i32_ty)))
        .collect();
    (module, globals)
}

#[test]
fn indices_are_stable_across_removal() {
    let (mut module, globals) = module_with_globals(3);
    let mut model = HlModule::default();

    let ids: Vec<u32> = globals
        .iter()
        .map(|g| model.add_cbuffer(CBuffer::new(ResourceBase::new(*g, "cb"), 16)))
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    assert_eq!(model.remove_resources(&mut module, &[globals[1]]), 1);
    assert!(module.global(globals[1]).is_none());

    assert_eq!(
        model.resources().cbuffer(2).expect("index 2 survives").base.global,
        globals[2]
    );
    assert_eq!(
        model.resources().cbuffer(1),
        Err(HlError::IndexOutOfRange {
            what: "CBuffer",
            index: 1,
            len: 3,
        })
    );
    assert_eq!(model.resources().cbuffers().live_count(), 2);

    let (_, spare) = module_with_globals(1);
    let id = model.add_cbuffer(CBuffer::new(ResourceBase::new(spare[0], "late"), 16));
    assert_eq!(id, 3);
}

#[test]
fn removal_skips_unknown_globals() {
    let (mut module, globals) = module_with_globals(5);
    let mut model = HlModule::default();
    model.add_srv(HlResource::new(
        ResourceBase::new(globals[0], "t0"),
        ResourceKind::Texture2D,
    ));
    model.add_uav(HlResource::new(
        ResourceBase::new(globals[1], "u0"),
        ResourceKind::RawBuffer,
    ));
    model.add_sampler(Sampler::new(
        ResourceBase::new(globals[2], "s0"),
        SamplerKind::Default,
    ));

    let removed = model.remove_resources(&mut module, &globals);
    assert_eq!(removed, 3);
    assert!(module.global(globals[0]).is_none());
    assert!(module.global(globals[2]).is_none());
    assert!(module.global(globals[3]).is_some());
    assert!(module.global(globals[4]).is_some());

    assert_eq!(model.remove_resources(&mut module, &globals[3..]), 0);
    assert!(module.global(globals[3]).is_some());
}

#[test]
fn resource_lookups_by_class() {
    let (_, globals) = module_with_globals(2);
    let mut model = HlModule::default();
    model.add_uav(HlResource::new(
        ResourceBase::new(globals[0], "u0").with_binding(2, 5, u32::MAX),
        ResourceKind::TypedBuffer,
    ));

    let base = model
        .resources()
        .base(ResourceClass::UAV, 0)
        .expect("UAV 0");
    assert!(base.is_unbounded());
    assert_eq!(base.upper_bound(), None);
    assert!(model.resources().references(globals[0]));
    assert!(!model.resources().references(globals[1]));
    assert!(model.resources().base(ResourceClass::SRV, 0).is_err());

    model
        .resources_mut()
        .uav_mut(0)
        .expect("UAV 0")
        .globally_coherent = true;
    assert!(model.resources().uav(0).expect("UAV 0").globally_coherent);
}

#[test]
fn signatures_can_be_released_once() {
    let mut model = HlModule::default();
    let released = model.release_output_signature().expect("first release");
    assert!(released.is_empty());

    assert_eq!(
        model.output_signature().map(|_| ()),
        Err(HlError::NullReference("output signature"))
    );
    assert!(model.release_output_signature().is_err());
    assert!(model.input_signature().is_ok());
}

#[test]
fn function_props_are_added_once() {
    let mut module = Module::new("props");
    let f = module.add_function(Function::new("cs", Vec::new()));
    let mut model = HlModule::default();

    assert!(!model.has_function_props(f));
    assert!(matches!(
        model.function_props(f),
        Err(HlError::NotFound(_))
    ));

    let props = ShaderProps::Compute(ComputeProps {
        num_threads: [64, 1, 1],
    });
    model.add_function_props(f, props).expect("first add");
    assert!(matches!(
        model.add_function_props(f, props),
        Err(HlError::DuplicateEntry(_))
    ));

    let compute = model
        .function_props_mut(f)
        .expect("props exist")
        .compute_mut()
        .expect("compute props");
    compute.num_threads[1] = 2;
    assert_eq!(
        model.function_props(f).expect("props exist").kind(),
        ShaderKind::Compute
    );
    assert!(model.function_props(f).expect("props exist").hull().is_err());

    let previous = model.replace_function_props(f, ShaderProps::Hull(HullProps::default()));
    assert_eq!(
        previous,
        Some(ShaderProps::Compute(ComputeProps {
            num_threads: [64, 2, 1],
        }))
    );
}

#[test]
fn removing_host_entities_drops_model_references() {
    let (mut module, globals) = module_with_globals(2);
    let entry = module.add_function(Function::new("main", Vec::new()));
    let patch = module.add_function(Function::new("patch", Vec::new()));
    let mut model = HlModule::default();
    model.set_entry_function(Some(entry));

    let mut clip_planes = [None; 6];
    clip_planes[2] = Some(globals[0]);
    model
        .add_function_props(entry, ShaderProps::Vertex(VertexProps { clip_planes }))
        .expect("vertex props");
    model
        .add_function_props(
            patch,
            ShaderProps::Hull(HullProps {
                patch_constant_fn: Some(patch),
                ..HullProps::default()
            }),
        )
        .expect("hull props");
    model.add_llvm_used(globals[0]);
    model.add_group_shared(globals[1]);

    model.remove_global(&mut module, globals[0]);
    assert!(model.llvm_used().is_empty());
    let vertex = model
        .function_props(entry)
        .expect("props exist")
        .vertex()
        .expect("vertex props");
    assert_eq!(vertex.clip_planes[2], None);

    model.remove_global(&mut module, globals[1]);
    assert!(model.group_shared().is_empty());

    model.remove_function(&mut module, entry);
    assert_eq!(model.entry_function(), None);
    assert!(!model.has_function_props(entry));
    assert!(module.function(entry).is_none());

    model.remove_function(&mut module, patch);
    assert!(model.function_props_table().is_empty());
}

#[test]
fn root_signature_is_released_once() {
    let mut model = HlModule::default();
    assert_eq!(
        model.release_root_signature(),
        Err(HlError::NullReference("root signature"))
    );
    model.set_root_signature(vec![1, 2, 3]);
    assert_eq!(model.release_root_signature(), Ok(vec![1, 2, 3]));
    assert_eq!(model.root_signature(), None);
}

#[test]
fn create_info_from_toml() {
    let info = HlModuleCreateInfo::from_toml_str(
        r#"
        entry_name = "PSMain"
        shader_model = "ps_6_4"
        options = "DEFAULT_ROW_MAJOR | ALL_RESOURCES_BOUND"
        "#,
    )
    .expect("valid configuration");
    let model = HlModule::new(info);

    assert_eq!(model.entry_name(), "PSMain");
    let sm = model.shader_model().expect("shader model");
    assert_eq!(sm.to_string(), "ps_6_4");
    assert_eq!(
        model.options(),
        HlOptions::DEFAULT_ROW_MAJOR | HlOptions::ALL_RESOURCES_BOUND
    );
    assert_eq!(model.schema_version().to_string(), "1.0");
}

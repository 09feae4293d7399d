use hlcore::{
    config::{HlModuleCreateInfo, HlOptions, SchemaVersion},
    dxil::{
        CompType, InputPrimitive, PrimitiveTopology, ResourceClass, ResourceKind, SamplerKind,
        SemanticKind, ShaderKind, ShaderModel, TessellatorDomain, TessellatorOutputPrimitive,
        TessellatorPartitioning,
    },
    magic::{HL_NAMED_METADATA, MD_ENTRY_POINTS, MD_LLVM_USED, MD_SHADER_MODEL, MD_VERSION},
    module::HlModule,
    props::{ComputeProps, GeometryProps, HullProps, PixelProps, ShaderProps, VertexProps},
    resource::{CBuffer, HlResource, ResourceBase, Sampler},
    signature::SignatureElement,
    utils::error::HlError,
};
use hlinstr::{
    metadata::{Metadata, ValueRef},
    module::{AddressSpace, Function, FunctionId, GlobalId, GlobalVariable, Module},
    types::{TypeRegistry, Typeref, primary::FType},
};

struct Fixture {
    module: Module,
    model: HlModule,
    main: FunctionId,
    patch: FunctionId,
    texture: GlobalId,
    buffer: GlobalId,
    constants: GlobalId,
    sampler: GlobalId,
    shared: GlobalId,
    texture_ty: Typeref,
}

fn fixture() -> Fixture {
    let registry = TypeRegistry::new([0; 6]);
    let f32_ty = registry.search_or_insert(FType::Fp32.into());
    let texture_ty = registry.search_or_insert(
        hlinstr::types::aggregate::StructType {
            name: Some("Texture2D<float4>".to_string()),
            element_types: vec![f32_ty],
        }
        .into(),
    );

    let mut module = Module::new("shader");
    let main = module.add_function(Function::new("main", Vec::new()));
    let patch = module.add_function(Function::new("patch_constants", Vec::new()));
    let texture = module.add_global(GlobalVariable::new("tex", texture_ty));
    let buffer = module.add_global(GlobalVariable::new("buf", f32_ty));
    let constants = module.add_global(GlobalVariable::new("cb", f32_ty));
    let sampler = module.add_global(GlobalVariable::new("samp", f32_ty));
    let shared = module.add_global(
        GlobalVariable::new("tile", f32_ty).with_address_space(AddressSpace::GroupShared),
    );

    let mut model = HlModule::new(HlModuleCreateInfo {
        entry_name: Some("main".to_string()),
        shader_model: Some(ShaderModel::new(ShaderKind::Hull, 6, 2)),
        ..HlModuleCreateInfo::default()
    });
    model.set_entry_function(Some(main));
    model.set_options(HlOptions::DEFAULT_ROW_MAJOR | HlOptions::IEEE_STRICT);

    model.add_srv(HlResource {
        comp_type: CompType::F32,
        ..HlResource::new(
            ResourceBase::new(texture, "tex").with_binding(0, 3, 1),
            ResourceKind::Texture2D,
        )
    });
    model.add_uav(HlResource {
        stride: 16,
        has_counter: true,
        ..HlResource::new(
            ResourceBase::new(buffer, "buf").with_binding(1, 0, 4),
            ResourceKind::StructuredBuffer,
        )
    });
    model.add_cbuffer(CBuffer::new(ResourceBase::new(constants, "cb"), 256));
    model.add_sampler(Sampler::new(
        ResourceBase::new(sampler, "samp"),
        SamplerKind::Comparison,
    ));

    let input = model.input_signature().expect("input signature");
    input.append_element(SignatureElement::new(
        "POSITION",
        SemanticKind::Arbitrary,
        CompType::F32,
        1,
        4,
    ));
    let mut texcoord =
        SignatureElement::new("TEXCOORD", SemanticKind::Arbitrary, CompType::F32, 2, 2);
    texcoord.set_location(1, 0);
    input.append_element(texcoord);
    model
        .output_signature()
        .expect("output signature")
        .append_element(SignatureElement::new(
            "SV_Position",
            SemanticKind::Position,
            CompType::F32,
            1,
            4,
        ));
    model
        .patch_constant_signature()
        .expect("patch constant signature")
        .append_element(SignatureElement::new(
            "SV_TessFactor",
            SemanticKind::TessFactor,
            CompType::F32,
            3,
            1,
        ));

    model
        .add_function_props(
            main,
            ShaderProps::Hull(HullProps {
                patch_constant_fn: Some(patch),
                domain: TessellatorDomain::Tri,
                partitioning: TessellatorPartitioning::FractionalOdd,
                output_primitive: TessellatorOutputPrimitive::TriangleCW,
                input_control_points: 3,
                output_control_points: 3,
                max_tess_factor: 15.5,
            }),
        )
        .expect("first props of main");
    model
        .add_function_props(
            patch,
            ShaderProps::Compute(ComputeProps {
                num_threads: [8, 8, 1],
            }),
        )
        .expect("first props of patch");

    model.type_annotations_mut().add(
        texture_ty,
        ResourceClass::SRV,
        ResourceKind::Texture2D,
    );
    model.set_root_signature(vec![0xde, 0xad, 0xbe, 0xef]);
    model.add_group_shared(shared);
    model.add_llvm_used(constants);

    Fixture {
        module,
        model,
        main,
        patch,
        texture,
        buffer,
        constants,
        sampler,
        shared,
        texture_ty,
    }
}

#[test]
fn emit_then_load_reproduces_the_model() {
    let Fixture {
        mut module,
        model,
        main,
        patch,
        texture,
        buffer,
        constants,
        shared,
        texture_ty,
        ..
    } = fixture();
    model.emit(&mut module);
    model.emit_llvm_used(&mut module);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("well-formed metadata");

    assert_eq!(loaded.entry_function(), Some(main));
    assert_eq!(loaded.entry_name(), "main");
    assert_eq!(loaded.shader_model(), model.shader_model());
    assert_eq!(loaded.options(), model.options());
    assert_eq!(loaded.resources(), model.resources());
    assert_eq!(loaded.signatures(), model.signatures());
    assert_eq!(loaded.function_props(main), model.function_props(main));
    assert_eq!(loaded.function_props(patch), model.function_props(patch));
    assert_eq!(loaded.root_signature(), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
    assert_eq!(loaded.llvm_used(), &[constants]);
    assert_eq!(loaded.group_shared(), &[shared]);

    assert_eq!(loaded.type_annotations().class(texture_ty), ResourceClass::SRV);
    assert_eq!(
        loaded.type_annotations().kind(texture_ty),
        ResourceKind::Texture2D
    );

    let srv = loaded.resources().srv(0).expect("SRV 0");
    assert_eq!(srv.base.global, texture);
    assert_eq!(srv.base.lower_bound, 3);
    assert_eq!(srv.comp_type, CompType::F32);
    let uav = loaded.resources().uav(0).expect("UAV 0");
    assert_eq!(uav.base.global, buffer);
    assert_eq!(uav.base.upper_bound(), Some(3));
    assert_eq!(uav.stride, 16);
    assert!(uav.has_counter);

    let texcoord = loaded
        .signatures()
        .get(hlcore::signature::SignatureKind::Input)
        .expect("input signature")
        .element(1)
        .expect("element 1");
    assert_eq!(texcoord.semantic_indices, vec![0, 1]);
    assert_eq!((texcoord.start_row, texcoord.start_col), (1, 0));
}

#[test]
fn emission_is_deterministic() {
    let Fixture {
        mut module, model, ..
    } = fixture();

    model.emit(&mut module);
    let first = module.named_metadata.clone();
    model.emit(&mut module);
    assert_eq!(module.named_metadata, first);

    let mut reloaded = HlModule::default();
    reloaded.load(&module).expect("well-formed metadata");
    reloaded.emit(&mut module);
    assert_eq!(module.named_metadata, first);
}

#[test]
fn unbound_entries_emit_null_slots() {
    let mut module = Module::new("empty");
    let model = HlModule::default();
    model.emit(&mut module);

    let entry = &module.named_metadata(MD_ENTRY_POINTS).expect("entry tree")[0];
    let operands = entry.as_tuple().expect("entry tuple");
    assert_eq!(operands.len(), 5);
    assert!(operands[0].is_null());
    assert!(operands[2].is_null());
    assert!(operands[3].is_null());
    assert!(operands[4].is_null());
    assert!(module.named_metadata(MD_SHADER_MODEL).is_none());

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("well-formed metadata");
    assert_eq!(loaded.entry_function(), None);
    assert!(loaded.resources().is_empty());
}

#[test]
fn clearing_is_idempotent_and_spares_foreign_trees() {
    let Fixture {
        mut module, model, ..
    } = fixture();
    model.emit(&mut module);
    model.emit_llvm_used(&mut module);
    module.set_named_metadata("llvm.ident", vec![Metadata::string("hlc")]);

    HlModule::clear_hl_metadata(&mut module);
    for name in HL_NAMED_METADATA {
        assert!(module.named_metadata(name).is_none(), "{} survived", name);
    }
    assert!(module.named_metadata("llvm.ident").is_some());
    assert!(module.named_metadata(MD_LLVM_USED).is_some());

    assert_eq!(hlcore::codec::MetadataCodec::clear(&mut module), 0);
}

#[test]
fn loading_a_cleared_module_yields_an_empty_model() {
    let Fixture {
        mut module, model, ..
    } = fixture();
    model.emit(&mut module);
    HlModule::clear_hl_metadata(&mut module);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("no metadata is valid metadata");
    assert_eq!(loaded.entry_function(), None);
    assert_eq!(loaded.shader_model(), None);
    assert!(loaded.resources().is_empty());
    assert!(loaded.function_props_table().is_empty());
    assert_eq!(loaded.root_signature(), None);
}

#[test]
fn newer_major_schema_is_rejected_without_side_effects() {
    let Fixture {
        mut module,
        model,
        main,
        ..
    } = fixture();
    model.emit(&mut module);
    module.set_named_metadata(
        MD_VERSION,
        vec![Metadata::tuple([Metadata::int(2u32), Metadata::int(0u32)])],
    );

    let mut target = HlModule::new(HlModuleCreateInfo {
        entry_name: Some("untouched".to_string()),
        ..HlModuleCreateInfo::default()
    });
    let err = target.load(&module).expect_err("major 2 is unsupported");
    assert!(matches!(err, HlError::SchemaVersionMismatch { .. }));
    assert_eq!(target.entry_name(), "untouched");
    assert_eq!(target.entry_function(), None);
    assert!(!target.has_function_props(main));
}

#[test]
fn newer_minor_schema_is_accepted() {
    let Fixture {
        mut module, model, ..
    } = fixture();
    model.emit(&mut module);
    module.set_named_metadata(
        MD_VERSION,
        vec![Metadata::tuple([Metadata::int(1u32), Metadata::int(3u32)])],
    );

    let mut loaded = HlModule::new(HlModuleCreateInfo {
        schema_version: SchemaVersion::new(1, 0),
        ..HlModuleCreateInfo::default()
    });
    loaded.load(&module).expect("minor skew is tolerated");
    assert_eq!(loaded.entry_name(), "main");
}

#[test]
fn wrong_arity_is_malformed() {
    let Fixture {
        mut module, model, ..
    } = fixture();
    model.emit(&mut module);
    module.set_named_metadata(
        MD_ENTRY_POINTS,
        vec![Metadata::tuple([Metadata::Null, Metadata::string("main")])],
    );

    let mut loaded = HlModule::default();
    assert!(matches!(
        loaded.load(&module),
        Err(HlError::MalformedMetadata { .. })
    ));
}

#[test]
fn dangling_references_are_malformed() {
    let Fixture {
        mut module,
        model,
        sampler,
        ..
    } = fixture();
    model.emit(&mut module);
    module.remove_global(sampler);

    let mut loaded = HlModule::default();
    match loaded.load(&module) {
        Err(HlError::MalformedMetadata { node, .. }) => assert_eq!(node, "Sampler"),
        other => panic!("expected a malformed sampler, got {:?}", other),
    }
}

#[test]
fn deleted_llvm_used_globals_are_dropped() {
    let Fixture {
        mut module,
        model,
        constants,
        ..
    } = fixture();
    model.emit_llvm_used(&mut module);
    module.remove_global(constants);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("dangling llvm.used entries are skipped");
    assert!(loaded.llvm_used().is_empty());
}

#[test]
fn unknown_extra_tags_are_ignored() {
    let mut module = Module::new("m");
    let registry = TypeRegistry::new([0; 6]);
    let f32_ty = registry.search_or_insert(FType::Fp32.into());
    let texture = module.add_global(GlobalVariable::new("tex", f32_ty));

    let srv = Metadata::tuple([
        Metadata::int(0u32),
        Metadata::Value(ValueRef::Global(texture)),
        Metadata::string("tex"),
        Metadata::int(0u32),
        Metadata::int(0u32),
        Metadata::int(1u32),
        Metadata::int(ResourceKind::TypedBuffer as u32),
        Metadata::int(0u32),
        Metadata::tuple([
            Metadata::int(0u32),
            Metadata::int(CompType::U32 as u32),
            Metadata::int(42u32),
            Metadata::int(7u32),
        ]),
    ]);
    module.set_named_metadata(
        MD_ENTRY_POINTS,
        vec![Metadata::tuple([
            Metadata::Null,
            Metadata::string(""),
            Metadata::Null,
            Metadata::tuple([
                Metadata::tuple([srv]),
                Metadata::Null,
                Metadata::Null,
                Metadata::Null,
                Metadata::tuple([1u32, 0, 0, 0].map(Metadata::int)),
            ]),
            Metadata::Null,
        ])],
    );

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("unknown tags are skipped");
    let srv = loaded.resources().srv(0).expect("SRV 0");
    assert_eq!(srv.comp_type, CompType::U32);
    assert_eq!(srv.kind, ResourceKind::TypedBuffer);
}

#[test]
fn stage_properties_survive_per_kind() {
    let mut module = Module::new("stages");
    let registry = TypeRegistry::new([0; 6]);
    let f32_ty = registry.search_or_insert(FType::Fp32.into());
    let plane = module.add_global(GlobalVariable::new("clip0", f32_ty));
    let gs = module.add_function(Function::new("gs", Vec::new()));
    let vs = module.add_function(Function::new("vs", Vec::new()));
    let ps = module.add_function(Function::new("ps", Vec::new()));

    let mut model = HlModule::default();
    let geometry = ShaderProps::Geometry(GeometryProps {
        input_primitive: InputPrimitive::ControlPointPatch(16),
        max_vertex_count: 12,
        instance_count: 2,
        stream_topologies: [
            PrimitiveTopology::TriangleStrip,
            PrimitiveTopology::PointList,
            PrimitiveTopology::Undefined,
            PrimitiveTopology::Undefined,
        ],
    });
    let mut clip_planes = [None; 6];
    clip_planes[0] = Some(plane);
    let vertex = ShaderProps::Vertex(VertexProps { clip_planes });
    let pixel = ShaderProps::Pixel(PixelProps {
        early_depth_stencil: true,
    });
    model.add_function_props(gs, geometry).expect("gs props");
    model.add_function_props(vs, vertex).expect("vs props");
    model.add_function_props(ps, pixel).expect("ps props");
    model.emit(&mut module);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("well-formed metadata");
    assert_eq!(loaded.function_props(gs), Ok(&geometry));
    assert_eq!(loaded.function_props(vs), Ok(&vertex));
    assert_eq!(loaded.function_props(ps), Ok(&pixel));
}

#[test]
fn duplicate_resource_ids_are_malformed() {
    let Fixture {
        mut module,
        mut model,
        texture,
        ..
    } = fixture();
    model.add_srv(HlResource::new(
        ResourceBase::new(texture, "tex_again"),
        ResourceKind::Texture2D,
    ));
    model.emit(&mut module);

    // Renumber the second SRV onto the first.
    let entry = module
        .named_metadata
        .get_mut(MD_ENTRY_POINTS)
        .expect("entry tree");
    let second_srv = match &mut entry[0] {
        Metadata::Tuple(entry) => match &mut entry[3] {
            Metadata::Tuple(lists) => match &mut lists[0] {
                Metadata::Tuple(srvs) => &mut srvs[1],
                other => panic!("unexpected SRV list {:?}", other),
            },
            other => panic!("unexpected resource lists {:?}", other),
        },
        other => panic!("unexpected entry {:?}", other),
    };
    match second_srv {
        Metadata::Tuple(fields) => fields[0] = Metadata::int(0u32),
        other => panic!("unexpected SRV {:?}", other),
    }

    let mut loaded = HlModule::default();
    assert!(matches!(
        loaded.load(&module),
        Err(HlError::MalformedMetadata { .. })
    ));
}

#[test]
fn removed_resources_keep_their_indices_across_reload() {
    let Fixture {
        mut module,
        mut model,
        texture_ty,
        ..
    } = fixture();
    let extra: Vec<_> = (1..4)
        .map(|i| module.add_global(GlobalVariable::new(format!("cb{}", i), texture_ty)))
        .collect();
    for (i, global) in extra.iter().enumerate() {
        let id = model.add_cbuffer(CBuffer::new(ResourceBase::new(*global, "cb"), 16));
        assert_eq!(id, i as u32 + 1);
    }

    // One interior and one trailing cbuffer.
    assert_eq!(model.remove_resources(&mut module, &[extra[0], extra[2]]), 2);
    model.emit(&mut module);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("well-formed metadata");
    assert_eq!(loaded.resources(), model.resources());

    let cbuffers = loaded.resources().cbuffers();
    assert_eq!(cbuffers.len(), 4);
    assert_eq!(cbuffers.live_count(), 2);
    for removed in [1, 3] {
        assert_eq!(
            loaded.resources().cbuffer(removed),
            Err(HlError::IndexOutOfRange {
                what: "CBuffer",
                index: removed,
                len: 4
            })
        );
    }
    assert_eq!(
        loaded.resources().cbuffer(2).expect("cbuffer 2").base.global,
        extra[1]
    );
    assert_eq!(
        loaded.add_cbuffer(CBuffer::new(ResourceBase::new(extra[1], "cb"), 16)),
        4
    );
}

#[test]
fn resource_lists_emptied_by_removal_still_reload() {
    let Fixture {
        mut module,
        mut model,
        texture,
        buffer,
        constants,
        sampler,
        ..
    } = fixture();
    assert_eq!(
        model.remove_resources(&mut module, &[texture, buffer, constants, sampler]),
        4
    );
    model.emit(&mut module);

    let mut loaded = HlModule::default();
    loaded.load(&module).expect("well-formed metadata");
    assert!(!loaded.resources().is_empty());
    assert_eq!(loaded.resources().samplers().len(), 1);
    assert_eq!(loaded.resources().samplers().live_count(), 0);
}

/// Set the ID of the first cbuffer record, or the allocated length of the
/// cbuffer list when `allocated` is set.
fn patch_cbuffer_list(module: &mut Module, value: u32, allocated: bool) {
    let entry = module
        .named_metadata
        .get_mut(MD_ENTRY_POINTS)
        .expect("entry tree");
    let lists = match &mut entry[0] {
        Metadata::Tuple(entry) => match &mut entry[3] {
            Metadata::Tuple(lists) => lists,
            other => panic!("unexpected resource lists {:?}", other),
        },
        other => panic!("unexpected entry {:?}", other),
    };
    let target = if allocated {
        match &mut lists[4] {
            Metadata::Tuple(counts) => &mut counts[ResourceClass::CBuffer as usize],
            other => panic!("unexpected allocated lengths {:?}", other),
        }
    } else {
        match &mut lists[ResourceClass::CBuffer as usize] {
            Metadata::Tuple(cbuffers) => match &mut cbuffers[0] {
                Metadata::Tuple(fields) => &mut fields[0],
                other => panic!("unexpected cbuffer {:?}", other),
            },
            other => panic!("unexpected cbuffer list {:?}", other),
        }
    };
    *target = Metadata::int(value);
}

#[test]
fn resource_ids_beyond_the_allocated_range_are_malformed() {
    for (value, allocated) in [(50_000_000, false), (u32::MAX, false), (u32::MAX, true)] {
        let Fixture {
            mut module, model, ..
        } = fixture();
        model.emit(&mut module);
        patch_cbuffer_list(&mut module, value, allocated);

        let mut loaded = HlModule::default();
        assert!(
            matches!(
                loaded.load(&module),
                Err(HlError::MalformedMetadata { .. })
            ),
            "value {} (allocated: {}) was accepted",
            value,
            allocated
        );
        assert!(loaded.resources().is_empty());
    }
}

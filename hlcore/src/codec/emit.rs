use hlinstr::{
    metadata::{Metadata, ValueRef},
    module::{FunctionId, GlobalId, Module},
};
use log::debug;

use crate::{
    codec::MetadataCodec,
    dxil::CompType,
    magic::{
        MD_ENTRY_POINTS, MD_FUNCTION_PROPS, MD_LLVM_USED, MD_OPTIONS,
        MD_RESOURCE_TYPE_ANNOTATIONS, MD_ROOT_SIGNATURE, MD_SHADER_MODEL, MD_VERSION,
        RESOURCE_TAG_ELEMENT_TYPE, RESOURCE_TAG_STRUCTURED_STRIDE, SIGNATURE_TAG_OUTPUT_STREAM,
    },
    module::HlModule,
    props::ShaderProps,
    resource::{CBuffer, HlResource, ResourceBase, Sampler},
    signature::{Signature, SignatureElement},
};

fn global(id: GlobalId) -> Metadata {
    Metadata::Value(ValueRef::Global(id))
}

fn function(id: FunctionId) -> Metadata {
    Metadata::Value(ValueRef::Function(id))
}

fn optional<T>(value: Option<T>, encode: impl FnOnce(T) -> Metadata) -> Metadata {
    value.map_or(Metadata::Null, encode)
}

/// Tag/value pairs, or null when there are none.
fn extra(pairs: impl IntoIterator<Item = (u32, Metadata)>) -> Metadata {
    Metadata::tuple_or_null(
        pairs
            .into_iter()
            .flat_map(|(tag, value)| [Metadata::int(tag), value]),
    )
}

fn signature_element(element: &SignatureElement) -> Metadata {
    let extra = extra(
        (element.output_stream != 0)
            .then(|| (SIGNATURE_TAG_OUTPUT_STREAM, Metadata::int(element.output_stream))),
    );
    Metadata::tuple([
        Metadata::int(element.id),
        Metadata::string(&element.name),
        Metadata::int(element.comp_type as u32),
        Metadata::int(element.kind as u32),
        Metadata::tuple(element.semantic_indices.iter().map(|i| Metadata::int(*i))),
        Metadata::int(element.interpolation as u32),
        Metadata::int(element.rows),
        Metadata::int(element.cols),
        Metadata::int(element.start_row as u32),
        Metadata::int(element.start_col as u32),
        extra,
    ])
}

fn signature(signature: Option<&Signature>) -> Metadata {
    Metadata::tuple_or_null(
        signature
            .into_iter()
            .flat_map(Signature::elements)
            .map(signature_element),
    )
}

fn resource_base(base: &ResourceBase) -> [Metadata; 6] {
    [
        Metadata::int(base.id),
        global(base.global),
        Metadata::string(&base.name),
        Metadata::int(base.space),
        Metadata::int(base.lower_bound),
        Metadata::int(base.range_size),
    ]
}

fn view_extra(view: &HlResource) -> Metadata {
    let element_type = (view.comp_type != CompType::Invalid).then(|| {
        (
            RESOURCE_TAG_ELEMENT_TYPE,
            Metadata::int(view.comp_type as u32),
        )
    });
    let stride = (view.stride != 0)
        .then(|| (RESOURCE_TAG_STRUCTURED_STRIDE, Metadata::int(view.stride)));
    extra(element_type.into_iter().chain(stride))
}

fn srv(view: &HlResource) -> Metadata {
    Metadata::tuple(resource_base(&view.base).into_iter().chain([
        Metadata::int(view.kind as u32),
        Metadata::int(view.sample_count),
        view_extra(view),
    ]))
}

fn uav(view: &HlResource) -> Metadata {
    Metadata::tuple(resource_base(&view.base).into_iter().chain([
        Metadata::int(view.kind as u32),
        Metadata::bool(view.globally_coherent),
        Metadata::bool(view.has_counter),
        Metadata::bool(view.rov),
        view_extra(view),
    ]))
}

fn cbuffer(cbuffer: &CBuffer) -> Metadata {
    Metadata::tuple(
        resource_base(&cbuffer.base)
            .into_iter()
            .chain([Metadata::int(cbuffer.size_in_bytes), Metadata::Null]),
    )
}

fn sampler(sampler: &Sampler) -> Metadata {
    Metadata::tuple(
        resource_base(&sampler.base)
            .into_iter()
            .chain([Metadata::int(sampler.sampler_kind as u32), Metadata::Null]),
    )
}

/// Shader kind followed by the stage-specific fields.
pub(super) fn shader_props(props: &ShaderProps) -> Vec<Metadata> {
    let mut fields = vec![Metadata::int(props.kind() as u32)];
    match props {
        ShaderProps::Compute(cs) => {
            fields.extend(cs.num_threads.iter().map(|n| Metadata::int(*n)));
        }
        ShaderProps::Geometry(gs) => {
            fields.extend([
                Metadata::int(gs.input_primitive.to_repr()),
                Metadata::int(gs.max_vertex_count),
                Metadata::int(gs.instance_count),
            ]);
            fields.extend(
                gs.stream_topologies
                    .iter()
                    .map(|topology| Metadata::int(*topology as u32)),
            );
        }
        ShaderProps::Hull(hs) => {
            fields.extend([
                optional(hs.patch_constant_fn, function),
                Metadata::int(hs.domain as u32),
                Metadata::int(hs.partitioning as u32),
                Metadata::int(hs.output_primitive as u32),
                Metadata::int(hs.input_control_points),
                Metadata::int(hs.output_control_points),
                Metadata::float(f64::from(hs.max_tess_factor)),
            ]);
        }
        ShaderProps::Domain(ds) => {
            fields.extend([
                Metadata::int(ds.domain as u32),
                Metadata::int(ds.input_control_points),
            ]);
        }
        ShaderProps::Vertex(vs) => {
            fields.extend(vs.clip_planes.iter().map(|plane| optional(*plane, global)));
        }
        ShaderProps::Pixel(ps) => {
            fields.push(Metadata::bool(ps.early_depth_stencil));
        }
    }
    fields
}

fn set_or_remove(module: &mut Module, name: &str, operands: Vec<Metadata>) {
    if operands.is_empty() {
        module.remove_named_metadata(name);
    } else {
        module.set_named_metadata(name, operands);
    }
}

impl MetadataCodec {
    /// Write `model` into the named metadata of `module`, replacing any
    /// previous high-level trees.
    pub fn emit(&self, model: &HlModule, module: &mut Module) {
        module.set_named_metadata(
            MD_VERSION,
            vec![Metadata::tuple([
                Metadata::int(self.schema.major),
                Metadata::int(self.schema.minor),
            ])],
        );

        let shader_model = model.shader_model.map(|sm| {
            Metadata::tuple([
                Metadata::string(sm.kind.to_string()),
                Metadata::int(sm.major),
                Metadata::int(sm.minor),
            ])
        });
        set_or_remove(module, MD_SHADER_MODEL, shader_model.into_iter().collect());

        let signatures = model
            .signatures
            .iter()
            .map(|(_, sig)| signature(sig))
            .collect::<Vec<_>>();
        let signatures = if signatures.iter().all(Metadata::is_null) {
            Metadata::Null
        } else {
            Metadata::tuple(signatures)
        };

        let registry = &model.resources;
        let resources = if registry.is_empty() {
            Metadata::Null
        } else {
            // Allocated index counts, removed indices included.
            let allocated = [
                registry.srvs().len(),
                registry.uavs().len(),
                registry.cbuffers().len(),
                registry.samplers().len(),
            ];
            Metadata::tuple([
                Metadata::tuple_or_null(registry.srvs().iter().map(srv)),
                Metadata::tuple_or_null(registry.uavs().iter().map(uav)),
                Metadata::tuple_or_null(registry.cbuffers().iter().map(cbuffer)),
                Metadata::tuple_or_null(registry.samplers().iter().map(sampler)),
                Metadata::tuple(allocated.map(|len| Metadata::int(len as u32))),
            ])
        };

        let entry_props = model
            .entry_function
            .and_then(|entry| model.function_props.get(entry).ok())
            .map_or(Metadata::Null, |props| Metadata::tuple(shader_props(props)));

        module.set_named_metadata(
            MD_ENTRY_POINTS,
            vec![Metadata::tuple([
                optional(model.entry_function, function),
                Metadata::string(&model.entry_name),
                signatures,
                resources,
                entry_props,
            ])],
        );

        let fnprops = model
            .function_props
            .iter()
            .filter(|(id, _)| Some(*id) != model.entry_function)
            .map(|(id, props)| {
                Metadata::tuple(std::iter::once(function(id)).chain(shader_props(props)))
            })
            .collect();
        set_or_remove(module, MD_FUNCTION_PROPS, fnprops);

        module.set_named_metadata(
            MD_OPTIONS,
            vec![Metadata::tuple([Metadata::int(model.options.bits())])],
        );

        let annotations = model
            .annotations
            .iter()
            .map(|(ty, class, kind)| {
                Metadata::tuple([
                    Metadata::Value(ValueRef::Undef(ty)),
                    Metadata::int(class as u32),
                    Metadata::int(kind as u32),
                ])
            })
            .collect();
        set_or_remove(module, MD_RESOURCE_TYPE_ANNOTATIONS, annotations);

        let root_signature = model
            .root_signature
            .as_ref()
            .map(|blob| Metadata::tuple([Metadata::Data(blob.clone())]));
        set_or_remove(module, MD_ROOT_SIGNATURE, root_signature.into_iter().collect());

        debug!(
            "Emitted high-level metadata (schema {}) into `{}`",
            self.schema, module.name
        );
    }

    /// Write the keep-alive list of `model` as `llvm.used`.
    pub fn emit_llvm_used(model: &HlModule, module: &mut Module) {
        let used = model.llvm_used.iter().map(|id| global(*id)).collect();
        set_or_remove(module, MD_LLVM_USED, used);
    }
}

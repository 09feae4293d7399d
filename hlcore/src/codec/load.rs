use std::str::FromStr;

use hlinstr::{
    metadata::{Metadata, ValueRef},
    module::{FunctionId, Module},
};
use log::{info, trace, warn};

use crate::{
    codec::{Decoded, MetadataCodec, reader::TupleReader},
    config::{HlOptions, SchemaVersion},
    dxil::{
        CompType, InputPrimitive, InterpolationMode, NUM_CLIP_PLANES, NUM_OUTPUT_STREAMS,
        PrimitiveTopology, ResourceClass, ResourceKind, SamplerKind, SemanticKind, ShaderKind,
        ShaderModel, TessellatorDomain, TessellatorOutputPrimitive, TessellatorPartitioning,
    },
    magic::{
        MD_ENTRY_POINTS, MD_FUNCTION_PROPS, MD_LLVM_USED, MD_OPTIONS,
        MD_RESOURCE_TYPE_ANNOTATIONS, MD_ROOT_SIGNATURE, MD_SHADER_MODEL, MD_VERSION,
        RESOURCE_TAG_ELEMENT_TYPE, RESOURCE_TAG_STRUCTURED_STRIDE, SIGNATURE_TAG_OUTPUT_STREAM,
    },
    props::{
        ComputeProps, DomainProps, GeometryProps, HullProps, PixelProps, ShaderProps, VertexProps,
    },
    resource::{AsResourceBase, CBuffer, HlResource, ResourceBase, ResourceList, Sampler},
    signature::{Signature, SignatureElement, SignatureKind},
    utils::error::{HlError, HlResult},
};

const NODE_SIGNATURE_ELEMENT: &str = "signature element";
const NODE_SRV: &str = "SRV";
const NODE_UAV: &str = "UAV";
const NODE_CBUFFER: &str = "CBuffer";
const NODE_SAMPLER: &str = "Sampler";
const NODE_RESOURCES: &str = "resource lists";
const NODE_EXTRA: &str = "extended properties";
const NODE_SHADER_PROPS: &str = "shader properties";

const ARITY_SIGNATURE_ELEMENT: usize = 11;
const ARITY_RESOURCE_BASE: usize = 6;
const ARITY_SRV: usize = ARITY_RESOURCE_BASE + 3;
const ARITY_UAV: usize = ARITY_RESOURCE_BASE + 5;
const ARITY_CBUFFER: usize = ARITY_RESOURCE_BASE + 2;
const ARITY_SAMPLER: usize = ARITY_RESOURCE_BASE + 2;

/// The only operand of a named tree holding a single tuple, if present.
fn single<'a>(module: &'a Module, name: &'static str) -> HlResult<Option<&'a Metadata>> {
    match module.named_metadata(name) {
        None | Some([]) => Ok(None),
        Some([md]) => Ok(Some(md)),
        Some(many) => Err(HlError::malformed(
            name,
            format!("expected a single operand, found {}", many.len()),
        )),
    }
}

/// Decode a tag/value list, handing each known pair to `apply`.
fn extra(
    md: &[Metadata],
    mut apply: impl FnMut(u32, &TupleReader<'_>, usize) -> HlResult<bool>,
) -> HlResult<()> {
    let reader = TupleReader::from_slice(NODE_EXTRA, md);
    if reader.len() % 2 != 0 {
        return Err(reader.error("tags and values are not paired"));
    }
    for index in (0..reader.len()).step_by(2) {
        let tag = reader.u32(index)?;
        if !apply(tag, &reader, index + 1)? {
            warn!("Ignoring unknown {} tag {}", NODE_EXTRA, tag);
        }
    }
    Ok(())
}

fn signature_element(md: &Metadata) -> HlResult<SignatureElement> {
    let r = TupleReader::exact(NODE_SIGNATURE_ELEMENT, md, ARITY_SIGNATURE_ELEMENT)?;
    let indices = TupleReader::from_slice(NODE_SIGNATURE_ELEMENT, r.list(4)?);
    let cols = u8::try_from(r.u32(7)?).map_err(|_| r.error("column count does not fit 8 bits"))?;

    let mut element = SignatureElement {
        id: r.u32(0)?,
        name: r.string(1)?.to_string(),
        comp_type: r.enumeration(2, "component type", CompType::from_repr)?,
        kind: r.enumeration(3, "semantic kind", SemanticKind::from_repr)?,
        semantic_indices: (0..indices.len())
            .map(|i| indices.u32(i))
            .collect::<HlResult<_>>()?,
        interpolation: r.enumeration(5, "interpolation mode", InterpolationMode::from_repr)?,
        rows: r.u32(6)?,
        cols,
        start_row: r.i32(8)?,
        start_col: r.i32(9)?,
        output_stream: 0,
    };

    extra(r.list(10)?, |tag, pairs, at| match tag {
        SIGNATURE_TAG_OUTPUT_STREAM => {
            element.output_stream = pairs.u32(at)?;
            Ok(true)
        }
        _ => Ok(false),
    })?;
    Ok(element)
}

fn signature(kind: SignatureKind, items: &[Metadata]) -> HlResult<Signature> {
    let mut signature = Signature::new(kind);
    for md in items {
        let element = signature_element(md)?;
        let expected = signature.len() as u32;
        if element.id != expected {
            return Err(HlError::malformed(
                NODE_SIGNATURE_ELEMENT,
                format!(
                    "`{}` has ID {} but is element {} of the {}",
                    element.name, element.id, expected, kind
                ),
            ));
        }
        signature.append_element(element);
    }
    Ok(signature)
}

fn resource_base(r: &TupleReader<'_>, module: &Module) -> HlResult<ResourceBase> {
    Ok(ResourceBase {
        id: r.u32(0)?,
        global: r.global(1, module)?,
        name: r.string(2)?.to_string(),
        space: r.u32(3)?,
        lower_bound: r.u32(4)?,
        range_size: r.u32(5)?,
    })
}

fn view_extra(view: &mut HlResource, md: &[Metadata]) -> HlResult<()> {
    extra(md, |tag, pairs, at| match tag {
        RESOURCE_TAG_ELEMENT_TYPE => {
            view.comp_type = pairs.enumeration(at, "component type", CompType::from_repr)?;
            Ok(true)
        }
        RESOURCE_TAG_STRUCTURED_STRIDE => {
            view.stride = pairs.u32(at)?;
            Ok(true)
        }
        _ => Ok(false),
    })
}

fn srv(md: &Metadata, module: &Module) -> HlResult<HlResource> {
    let r = TupleReader::exact(NODE_SRV, md, ARITY_SRV)?;
    let mut view = HlResource::new(
        resource_base(&r, module)?,
        r.enumeration(6, "resource kind", ResourceKind::from_repr)?,
    );
    view.sample_count = r.u32(7)?;
    view_extra(&mut view, r.list(8)?)?;
    Ok(view)
}

fn uav(md: &Metadata, module: &Module) -> HlResult<HlResource> {
    let r = TupleReader::exact(NODE_UAV, md, ARITY_UAV)?;
    let mut view = HlResource::new(
        resource_base(&r, module)?,
        r.enumeration(6, "resource kind", ResourceKind::from_repr)?,
    );
    view.globally_coherent = r.bool(7)?;
    view.has_counter = r.bool(8)?;
    view.rov = r.bool(9)?;
    view_extra(&mut view, r.list(10)?)?;
    Ok(view)
}

fn cbuffer(md: &Metadata, module: &Module) -> HlResult<CBuffer> {
    let r = TupleReader::exact(NODE_CBUFFER, md, ARITY_CBUFFER)?;
    let cbuffer = CBuffer::new(resource_base(&r, module)?, r.u32(6)?);
    extra(r.list(7)?, |_, _, _| Ok(false))?;
    Ok(cbuffer)
}

fn sampler(md: &Metadata, module: &Module) -> HlResult<Sampler> {
    let r = TupleReader::exact(NODE_SAMPLER, md, ARITY_SAMPLER)?;
    let sampler = Sampler::new(
        resource_base(&r, module)?,
        r.enumeration(6, "sampler kind", SamplerKind::from_repr)?,
    );
    extra(r.list(7)?, |_, _, _| Ok(false))?;
    Ok(sampler)
}

/// Restore every decoded resource at its recorded index, within the
/// `allocated` indices the list had handed out.
fn restore_all<T: AsResourceBase>(
    list: &mut ResourceList<T>,
    allocated: u32,
    items: &[Metadata],
    module: &Module,
    decode: impl Fn(&Metadata, &Module) -> HlResult<T>,
) -> HlResult<()> {
    if allocated == u32::MAX {
        return Err(HlError::malformed(
            NODE_RESOURCES,
            format!("{} list leaves no index to allocate", list.class()),
        ));
    }
    list.reset_allocated(allocated);
    for md in items {
        let resource = decode(md, module)?;
        let id = resource.base().id;
        list.restore(resource)?;
        trace!("Decoded {} #{}", list.class(), id);
    }
    Ok(())
}

/// Decode a shader kind followed by its stage-specific fields.
pub(super) fn shader_props(items: &[Metadata], module: &Module) -> HlResult<ShaderProps> {
    let r = TupleReader::from_slice(NODE_SHADER_PROPS, items);
    let kind = r.enumeration(0, "shader kind", ShaderKind::from_repr)?;
    let check_arity = |arity: usize| {
        if r.len() == arity {
            Ok(())
        } else {
            Err(r.error(format!(
                "`{}` properties take {} operands, found {}",
                kind,
                arity,
                r.len()
            )))
        }
    };

    let props = match kind {
        ShaderKind::Compute => {
            check_arity(4)?;
            ShaderProps::Compute(ComputeProps {
                num_threads: [r.u32(1)?, r.u32(2)?, r.u32(3)?],
            })
        }
        ShaderKind::Geometry => {
            check_arity(4 + NUM_OUTPUT_STREAMS)?;
            let mut stream_topologies = [PrimitiveTopology::Undefined; NUM_OUTPUT_STREAMS];
            for (stream, topology) in stream_topologies.iter_mut().enumerate() {
                *topology =
                    r.enumeration(4 + stream, "primitive topology", PrimitiveTopology::from_repr)?;
            }
            ShaderProps::Geometry(GeometryProps {
                input_primitive: r.enumeration(1, "input primitive", InputPrimitive::from_repr)?,
                max_vertex_count: r.u32(2)?,
                instance_count: r.u32(3)?,
                stream_topologies,
            })
        }
        ShaderKind::Hull => {
            check_arity(8)?;
            ShaderProps::Hull(HullProps {
                patch_constant_fn: r.optional_function(1, module)?,
                domain: r.enumeration(2, "tessellator domain", TessellatorDomain::from_repr)?,
                partitioning: r.enumeration(
                    3,
                    "tessellator partitioning",
                    TessellatorPartitioning::from_repr,
                )?,
                output_primitive: r.enumeration(
                    4,
                    "tessellator output primitive",
                    TessellatorOutputPrimitive::from_repr,
                )?,
                input_control_points: r.u32(5)?,
                output_control_points: r.u32(6)?,
                max_tess_factor: r.f64(7)? as f32,
            })
        }
        ShaderKind::Domain => {
            check_arity(3)?;
            ShaderProps::Domain(DomainProps {
                domain: r.enumeration(1, "tessellator domain", TessellatorDomain::from_repr)?,
                input_control_points: r.u32(2)?,
            })
        }
        ShaderKind::Vertex => {
            check_arity(1 + NUM_CLIP_PLANES)?;
            let mut clip_planes = [None; NUM_CLIP_PLANES];
            for (index, plane) in clip_planes.iter_mut().enumerate() {
                *plane = r.optional_global(1 + index, module)?;
            }
            ShaderProps::Vertex(VertexProps { clip_planes })
        }
        ShaderKind::Pixel => {
            check_arity(2)?;
            ShaderProps::Pixel(PixelProps {
                early_depth_stencil: r.bool(1)?,
            })
        }
        ShaderKind::Library | ShaderKind::Invalid => {
            return Err(r.error(format!("`{}` functions carry no properties", kind)));
        }
    };
    Ok(props)
}

impl MetadataCodec {
    fn load_version(&self, module: &Module) -> HlResult<SchemaVersion> {
        let Some(md) = single(module, MD_VERSION)? else {
            return Ok(self.schema);
        };
        let r = TupleReader::exact(MD_VERSION, md, 2)?;
        let found = SchemaVersion::new(r.u32(0)?, r.u32(1)?);

        if !self.schema.accepts(found) {
            return Err(HlError::SchemaVersionMismatch {
                found: found.into(),
                supported: self.schema.into(),
            });
        }
        if found.minor != self.schema.minor {
            warn!(
                "Loading high-level metadata of schema {} with a schema {} reader",
                found, self.schema
            );
        }
        Ok(found)
    }

    fn load_shader_model(module: &Module) -> HlResult<Option<ShaderModel>> {
        let Some(md) = single(module, MD_SHADER_MODEL)? else {
            return Ok(None);
        };
        let r = TupleReader::exact(MD_SHADER_MODEL, md, 3)?;
        let name = r.string(0)?;
        let kind = ShaderKind::from_str(name)
            .map_err(|_| r.error(format!("unknown shader kind `{}`", name)))?;
        Ok(Some(ShaderModel::new(kind, r.u32(1)?, r.u32(2)?)))
    }

    fn load_entry(module: &Module, decoded: &mut Decoded) -> HlResult<()> {
        let Some(md) = single(module, MD_ENTRY_POINTS)? else {
            return Ok(());
        };
        let r = TupleReader::exact(MD_ENTRY_POINTS, md, 5)?;
        decoded.entry_function = r.optional_function(0, module)?;
        decoded.entry_name = r.string(1)?.to_string();

        if !r.is_null(2) {
            let sigs = r.tuple(2, 3)?;
            for (index, kind) in [
                SignatureKind::Input,
                SignatureKind::Output,
                SignatureKind::PatchConstant,
            ]
            .into_iter()
            .enumerate()
            {
                decoded.signatures.install(signature(kind, sigs.list(index)?)?);
            }
        }

        if !r.is_null(3) {
            let res = r.tuple(3, 5)?;
            let allocated = res.tuple(4, 4)?;
            let allocated = |class: ResourceClass| allocated.u32(class as usize);
            let lists = |class: ResourceClass| res.list(class as usize);

            let (srvs, uavs, cbuffers, samplers) = decoded.resources.lists_mut();
            let class = ResourceClass::SRV;
            restore_all(srvs, allocated(class)?, lists(class)?, module, srv)?;
            let class = ResourceClass::UAV;
            restore_all(uavs, allocated(class)?, lists(class)?, module, uav)?;
            let class = ResourceClass::CBuffer;
            restore_all(cbuffers, allocated(class)?, lists(class)?, module, cbuffer)?;
            let class = ResourceClass::Sampler;
            restore_all(samplers, allocated(class)?, lists(class)?, module, sampler)?;
        }

        let props = r.list(4)?;
        if !props.is_empty() {
            let Some(entry) = decoded.entry_function else {
                return Err(r.error("shader properties without an entry function"));
            };
            decoded
                .function_props
                .add(entry, shader_props(props, module)?)?;
        }
        Ok(())
    }

    fn load_function_props(module: &Module, decoded: &mut Decoded) -> HlResult<()> {
        for md in module.named_metadata(MD_FUNCTION_PROPS).unwrap_or(&[]) {
            let r = TupleReader::at_least(MD_FUNCTION_PROPS, md, 2)?;
            let function: FunctionId = r.function(0, module)?;
            let props = shader_props(r.rest(1), module)?;
            decoded
                .function_props
                .add(function, props)
                .map_err(|err| r.error(err.to_string()))?;
        }
        Ok(())
    }

    fn load_options(module: &Module) -> HlResult<HlOptions> {
        let Some(md) = single(module, MD_OPTIONS)? else {
            return Ok(HlOptions::empty());
        };
        let r = TupleReader::exact(MD_OPTIONS, md, 1)?;
        Ok(HlOptions::from_bits_retain(r.u32(0)?))
    }

    fn load_annotations(module: &Module, decoded: &mut Decoded) -> HlResult<()> {
        for md in module
            .named_metadata(MD_RESOURCE_TYPE_ANNOTATIONS)
            .unwrap_or(&[])
        {
            let r = TupleReader::exact(MD_RESOURCE_TYPE_ANNOTATIONS, md, 3)?;
            decoded.annotations.add(
                r.typeref(0, module)?,
                r.enumeration(1, "resource class", ResourceClass::from_repr)?,
                r.enumeration(2, "resource kind", ResourceKind::from_repr)?,
            );
        }
        Ok(())
    }

    fn load_root_signature(module: &Module) -> HlResult<Option<Vec<u8>>> {
        let Some(md) = single(module, MD_ROOT_SIGNATURE)? else {
            return Ok(None);
        };
        let r = TupleReader::exact(MD_ROOT_SIGNATURE, md, 1)?;
        Ok(Some(r.data(0)?.to_vec()))
    }

    /// Globals deleted since `llvm.used` was written are skipped.
    fn load_llvm_used(module: &Module, decoded: &mut Decoded) -> HlResult<()> {
        for md in module.named_metadata(MD_LLVM_USED).unwrap_or(&[]) {
            match md.as_value() {
                Some(ValueRef::Global(id)) if module.contains(ValueRef::Global(id)) => {
                    decoded.llvm_used.push(id);
                }
                Some(ValueRef::Global(id)) => {
                    warn!("Dropping deleted global {:?} from `{}`", id, MD_LLVM_USED);
                }
                _ => {
                    return Err(HlError::malformed(
                        MD_LLVM_USED,
                        format!("expected a global reference, found {}", md.kind_name()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Reconstruct a model from the named metadata of `module`. Trees that
    /// are absent read as empty.
    pub fn load(&self, module: &Module) -> HlResult<Decoded> {
        let mut decoded = Decoded {
            version: self.load_version(module)?,
            shader_model: Self::load_shader_model(module)?,
            options: Self::load_options(module)?,
            root_signature: Self::load_root_signature(module)?,
            ..Decoded::default()
        };
        Self::load_entry(module, &mut decoded)?;
        Self::load_function_props(module, &mut decoded)?;
        Self::load_annotations(module, &mut decoded)?;
        Self::load_llvm_used(module, &mut decoded)?;

        info!(
            "Loaded high-level metadata of `{}`: {} resources, {} function properties, {} annotations",
            module.name,
            decoded.resources.srvs().live_count()
                + decoded.resources.uavs().live_count()
                + decoded.resources.cbuffers().live_count()
                + decoded.resources.samplers().live_count(),
            decoded.function_props.len(),
            decoded.annotations.len()
        );
        Ok(decoded)
    }
}

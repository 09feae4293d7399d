//! Per-function shader stage properties.
use std::collections::BTreeMap;

use hlinstr::module::{FunctionId, GlobalId};
use log::debug;
use strum::EnumIs;

use crate::{
    dxil::{
        InputPrimitive, NUM_CLIP_PLANES, NUM_OUTPUT_STREAMS, PrimitiveTopology, ShaderKind,
        TessellatorDomain, TessellatorOutputPrimitive, TessellatorPartitioning,
    },
    utils::error::{HlError, HlResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputeProps {
    pub num_threads: [u32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryProps {
    pub input_primitive: InputPrimitive,
    pub max_vertex_count: u32,
    pub instance_count: u32,
    /// Output topology of each stream; `Undefined` for unused streams.
    pub stream_topologies: [PrimitiveTopology; NUM_OUTPUT_STREAMS],
}

impl Default for GeometryProps {
    fn default() -> Self {
        Self {
            input_primitive: InputPrimitive::Undefined,
            max_vertex_count: 0,
            instance_count: 1,
            stream_topologies: [PrimitiveTopology::Undefined; NUM_OUTPUT_STREAMS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullProps {
    pub patch_constant_fn: Option<FunctionId>,
    pub domain: TessellatorDomain,
    pub partitioning: TessellatorPartitioning,
    pub output_primitive: TessellatorOutputPrimitive,
    pub input_control_points: u32,
    pub output_control_points: u32,
    pub max_tess_factor: f32,
}

impl Default for HullProps {
    fn default() -> Self {
        Self {
            patch_constant_fn: None,
            domain: TessellatorDomain::Undefined,
            partitioning: TessellatorPartitioning::Undefined,
            output_primitive: TessellatorOutputPrimitive::Undefined,
            input_control_points: 0,
            output_control_points: 0,
            max_tess_factor: 64.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainProps {
    pub domain: TessellatorDomain,
    pub input_control_points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexProps {
    /// Globals holding the user clip planes, by plane index.
    pub clip_planes: [Option<GlobalId>; NUM_CLIP_PLANES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelProps {
    pub early_depth_stencil: bool,
}

/// Stage-specific properties of a function.
#[derive(Debug, Clone, Copy, PartialEq, EnumIs)]
pub enum ShaderProps {
    Compute(ComputeProps),
    Geometry(GeometryProps),
    Hull(HullProps),
    Domain(DomainProps),
    Vertex(VertexProps),
    Pixel(PixelProps),
}

macro_rules! checked_accessors {
    ($($variant:ident => $payload:ty, $get:ident, $get_mut:ident);* $(;)?) => {
        $(
            pub fn $get(&self) -> HlResult<&$payload> {
                match self {
                    ShaderProps::$variant(props) => Ok(props),
                    other => Err(other.mismatch(ShaderKind::$variant)),
                }
            }

            pub fn $get_mut(&mut self) -> HlResult<&mut $payload> {
                match self {
                    ShaderProps::$variant(props) => Ok(props),
                    other => Err(other.mismatch(ShaderKind::$variant)),
                }
            }
        )*
    };
}

impl ShaderProps {
    pub fn kind(&self) -> ShaderKind {
        match self {
            ShaderProps::Compute(_) => ShaderKind::Compute,
            ShaderProps::Geometry(_) => ShaderKind::Geometry,
            ShaderProps::Hull(_) => ShaderKind::Hull,
            ShaderProps::Domain(_) => ShaderKind::Domain,
            ShaderProps::Vertex(_) => ShaderKind::Vertex,
            ShaderProps::Pixel(_) => ShaderKind::Pixel,
        }
    }

    fn mismatch(&self, requested: ShaderKind) -> HlError {
        HlError::NotFound(format!(
            "`{}` properties on a `{}` record",
            requested,
            self.kind()
        ))
    }

    checked_accessors! {
        Compute => ComputeProps, compute, compute_mut;
        Geometry => GeometryProps, geometry, geometry_mut;
        Hull => HullProps, hull, hull_mut;
        Domain => DomainProps, domain, domain_mut;
        Vertex => VertexProps, vertex, vertex_mut;
        Pixel => PixelProps, pixel, pixel_mut;
    }
}

/// Shader properties keyed by function. Iteration follows function handle
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionPropsTable {
    props: BTreeMap<FunctionId, ShaderProps>,
}

impl FunctionPropsTable {
    pub fn has(&self, function: FunctionId) -> bool {
        self.props.contains_key(&function)
    }

    /// Attach `props` to `function`. A function has at most one record.
    pub fn add(&mut self, function: FunctionId, props: ShaderProps) -> HlResult<()> {
        if self.has(function) {
            return Err(HlError::DuplicateEntry(format!(
                "shader properties of function {:?}",
                function
            )));
        }
        debug!("Attached `{}` properties to {:?}", props.kind(), function);
        self.props.insert(function, props);
        Ok(())
    }

    /// Attach `props` to `function`, returning the record it replaces.
    pub fn replace(&mut self, function: FunctionId, props: ShaderProps) -> Option<ShaderProps> {
        self.props.insert(function, props)
    }

    pub fn get(&self, function: FunctionId) -> HlResult<&ShaderProps> {
        self.props.get(&function).ok_or_else(|| not_found(function))
    }

    pub fn get_mut(&mut self, function: FunctionId) -> HlResult<&mut ShaderProps> {
        self.props
            .get_mut(&function)
            .ok_or_else(|| not_found(function))
    }

    pub fn remove(&mut self, function: FunctionId) -> Option<ShaderProps> {
        self.props.remove(&function)
    }

    /// Drop every reference to `function`: its own record and any hull
    /// record naming it as patch-constant function.
    pub fn purge_function(&mut self, function: FunctionId) {
        self.props.remove(&function);
        for props in self.props.values_mut() {
            if let ShaderProps::Hull(hull) = props {
                if hull.patch_constant_fn == Some(function) {
                    hull.patch_constant_fn = None;
                }
            }
        }
    }

    /// Forget clip planes bound to `global`.
    pub fn purge_global(&mut self, global: GlobalId) {
        for props in self.props.values_mut() {
            if let ShaderProps::Vertex(vertex) = props {
                for plane in vertex.clip_planes.iter_mut() {
                    if *plane == Some(global) {
                        *plane = None;
                    }
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &ShaderProps)> {
        self.props.iter().map(|(id, props)| (*id, props))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn clear(&mut self) {
        self.props.clear();
    }
}

fn not_found(function: FunctionId) -> HlError {
    HlError::NotFound(format!("shader properties of function {:?}", function))
}
